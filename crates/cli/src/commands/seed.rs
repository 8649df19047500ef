//! Seed reference data.
//!
//! Always makes sure the default category exists. With `--demo`, also adds a
//! handful of sample products to it when the catalogue is empty.

use rust_decimal::Decimal;

use souq_admin::db::{CategoryRepository, DEFAULT_CATEGORY_NAME, NewProduct, ProductRepository};
use souq_admin::services::images::PLACEHOLDER_IMAGE;
use souq_core::CategoryId;

use super::{CliError, connect};

/// Sample products as (name, description, price, discount %, stock).
const DEMO_PRODUCTS: [(&str, &str, i64, i64, i32); 4] = [
    ("سماعة لاسلكية", "سماعة بلوتوث مع علبة شحن", 850, 10, 25),
    ("ساعة ذكية", "شاشة لمس وقياس نبض القلب", 1_450, 0, 12),
    ("شاحن سريع 20 وات", "منفذ USB-C متوافق مع معظم الهواتف", 320, 15, 40),
    ("حقيبة ظهر", "مقاومة للماء مع جيب للابتوب", 600, 0, 0),
];

fn demo_products(category_id: CategoryId) -> Vec<NewProduct> {
    DEMO_PRODUCTS
        .iter()
        .map(|&(name, description, price, discount, stock)| NewProduct {
            name: name.to_owned(),
            description: description.to_owned(),
            price: Decimal::from(price),
            discount: Decimal::from(discount),
            stock,
            image: PLACEHOLDER_IMAGE.to_owned(),
            category_id,
        })
        .collect()
}

/// Run the seed.
///
/// # Errors
///
/// Returns `CliError` if the database is unreachable or an insert fails.
pub async fn run(demo: bool) -> Result<(), CliError> {
    let pool = connect().await?;
    let categories = CategoryRepository::new(&pool);

    if categories.ensure_default().await? {
        tracing::info!("Default category created");
    } else {
        tracing::info!("Default category already present");
    }

    if !demo {
        return Ok(());
    }

    let products = ProductRepository::new(&pool);
    if products.count().await? > 0 {
        tracing::warn!("Catalogue is not empty, skipping demo products");
        return Ok(());
    }

    let Some(category) = categories
        .list()
        .await?
        .into_iter()
        .find(|c| c.name == DEFAULT_CATEGORY_NAME)
    else {
        tracing::warn!("Default category missing after seeding");
        return Ok(());
    };

    for product in demo_products(category.id) {
        let created = products.create(&product).await?;
        tracing::info!(product_id = %created.id, name = %created.name, "Demo product added");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_products_use_category_and_placeholder() {
        let products = demo_products(CategoryId::new(3));
        assert_eq!(products.len(), DEMO_PRODUCTS.len());
        assert!(products.iter().all(|p| p.category_id == CategoryId::new(3)));
        assert!(products.iter().all(|p| p.image == PLACEHOLDER_IMAGE));
    }

    #[test]
    fn test_demo_discounts_are_percentages() {
        let products = demo_products(CategoryId::new(1));
        assert!(
            products
                .iter()
                .all(|p| p.discount >= Decimal::ZERO && p.discount <= Decimal::ONE_HUNDRED)
        );
        assert!(products.iter().any(|p| p.stock == 0));
    }
}
