//! Catalog queries: products, categories and home page banners.

use std::str::FromStr;

use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};

use souq_core::models::{BannerSlide, Category, Product, ProductAttribute, ProductImage};
use souq_core::{CategoryId, ProductId};

use super::RepositoryError;

const PRODUCT_COLUMNS: &str =
    "id, name, description, price, discount, stock, image, views, category_id, created_at";

/// Sort order of the shop listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShopSort {
    NameAsc,
    NameDesc,
    PriceAsc,
    PriceDesc,
    #[default]
    Newest,
}

impl ShopSort {
    /// Parse the `sort` query parameter. Unknown values sort newest first.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "name-asc" => Self::NameAsc,
            "name-desc" => Self::NameDesc,
            "price-asc" => Self::PriceAsc,
            "price-desc" => Self::PriceDesc,
            _ => Self::Newest,
        }
    }

    const fn order_by(self) -> &'static str {
        match self {
            Self::NameAsc => "name ASC, id ASC",
            Self::NameDesc => "name DESC, id DESC",
            Self::PriceAsc => "price ASC, id ASC",
            Self::PriceDesc => "price DESC, id DESC",
            Self::Newest => "created_at DESC, id DESC",
        }
    }
}

/// Price constraint from the `price` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceFilter {
    /// `"200+"`
    AtLeast(Decimal),
    /// `"100-200"`, inclusive.
    Between(Decimal, Decimal),
    /// `"150"`
    Exactly(Decimal),
}

impl PriceFilter {
    /// Parse a price filter. Returns `None` for anything malformed.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if let Some(min) = raw.strip_suffix('+') {
            return Decimal::from_str(min.trim()).ok().map(Self::AtLeast);
        }
        if let Some((low, high)) = raw.split_once('-') {
            let low = Decimal::from_str(low.trim()).ok()?;
            let high = Decimal::from_str(high.trim()).ok()?;
            return Some(Self::Between(low, high));
        }
        Decimal::from_str(raw).ok().map(Self::Exactly)
    }
}

/// Filters for the shop listing.
#[derive(Debug, Clone, Default)]
pub struct ShopFilter {
    pub search: Option<String>,
    pub category: Option<CategoryId>,
    pub price: Option<PriceFilter>,
    pub sort: ShopSort,
}

impl ShopFilter {
    fn push_conditions(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", escape_like(search));
            qb.push(" AND (name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR description ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(category) = self.category {
            qb.push(" AND category_id = ").push_bind(category);
        }
        match self.price {
            Some(PriceFilter::AtLeast(min)) => {
                qb.push(" AND price >= ").push_bind(min);
            }
            Some(PriceFilter::Between(low, high)) => {
                qb.push(" AND price BETWEEN ")
                    .push_bind(low)
                    .push(" AND ")
                    .push_bind(high);
            }
            Some(PriceFilter::Exactly(price)) => {
                qb.push(" AND price = ").push_bind(price);
            }
            None => {}
        }
    }
}

fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Repository for catalog reads.
pub struct CatalogRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CatalogRepository<'a> {
    /// Create a new catalog repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All categories in creation order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn categories(&self) -> Result<Vec<Category>, RepositoryError> {
        let rows = sqlx::query_as::<_, Category>(
            "SELECT id, name, description, created_at FROM categories ORDER BY id",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Newest products first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn latest(&self, limit: i64) -> Result<Vec<Product>, RepositoryError> {
        let sql =
            format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY created_at DESC, id DESC LIMIT $1");
        let rows = sqlx::query_as::<_, Product>(&sql)
            .bind(limit)
            .fetch_all(self.pool)
            .await?;
        Ok(rows)
    }

    /// Most viewed products first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn most_viewed(&self, limit: i64) -> Result<Vec<Product>, RepositoryError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY views DESC, id DESC LIMIT $1");
        let rows = sqlx::query_as::<_, Product>(&sql)
            .bind(limit)
            .fetch_all(self.pool)
            .await?;
        Ok(rows)
    }

    /// Discounted products that are in stock, biggest discount first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn on_sale(&self) -> Result<Vec<Product>, RepositoryError> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE discount > 0 AND stock > 0 \
             ORDER BY discount DESC, id DESC"
        );
        let rows = sqlx::query_as::<_, Product>(&sql)
            .fetch_all(self.pool)
            .await?;
        Ok(rows)
    }

    /// A page of the filtered shop listing plus the total number of matches.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn search(
        &self,
        filter: &ShopFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Product>, i64), RepositoryError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products WHERE TRUE");
        filter.push_conditions(&mut count);
        let total: i64 = count.build_query_scalar().fetch_one(self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE TRUE"
        ));
        filter.push_conditions(&mut select);
        select
            .push(" ORDER BY ")
            .push(filter.sort.order_by())
            .push(" LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        let products = select
            .build_query_as::<Product>()
            .fetch_all(self.pool)
            .await?;

        Ok((products, total))
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        let row = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// Bump a product's view counter.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn record_view(&self, id: ProductId) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE products SET views = views + 1 WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Random products other than `exclude`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn random_except(
        &self,
        exclude: ProductId,
        limit: i64,
    ) -> Result<Vec<Product>, RepositoryError> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id <> $1 ORDER BY random() LIMIT $2"
        );
        let rows = sqlx::query_as::<_, Product>(&sql)
            .bind(exclude)
            .bind(limit)
            .fetch_all(self.pool)
            .await?;
        Ok(rows)
    }

    /// Gallery images of a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn images(&self, id: ProductId) -> Result<Vec<ProductImage>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductImage>(
            "SELECT id, product_id, image, created_at FROM product_images \
             WHERE product_id = $1 ORDER BY id",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Attribute rows of a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn attributes(&self, id: ProductId) -> Result<Vec<ProductAttribute>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductAttribute>(
            "SELECT id, product_id, key, value FROM product_attributes \
             WHERE product_id = $1 ORDER BY id",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Active hero slides in display order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn active_banners(&self) -> Result<Vec<BannerSlide>, RepositoryError> {
        let rows = sqlx::query_as::<_, BannerSlide>(
            "SELECT id, image_url, title, subtitle, description, link_url, \
                    highlight_regular_price, highlight_sale_price, highlight_discount, \
                    sort_order, is_active, created_at \
             FROM banner_slides WHERE is_active ORDER BY sort_order, id",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_price_filter_forms() {
        assert_eq!(
            PriceFilter::parse("200+"),
            Some(PriceFilter::AtLeast(Decimal::from(200)))
        );
        assert_eq!(
            PriceFilter::parse("100-200"),
            Some(PriceFilter::Between(Decimal::from(100), Decimal::from(200)))
        );
        assert_eq!(
            PriceFilter::parse("150.5"),
            Some(PriceFilter::Exactly(Decimal::new(1505, 1)))
        );
    }

    #[test]
    fn test_price_filter_malformed() {
        assert_eq!(PriceFilter::parse("cheap"), None);
        assert_eq!(PriceFilter::parse("100-"), None);
        assert_eq!(PriceFilter::parse("abc+"), None);
    }

    #[test]
    fn test_shop_sort_defaults_to_newest() {
        assert_eq!(ShopSort::parse("price-desc"), ShopSort::PriceDesc);
        assert_eq!(ShopSort::parse("rating-asc"), ShopSort::Newest);
        assert_eq!(ShopSort::parse(""), ShopSort::Newest);
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
    }
}
