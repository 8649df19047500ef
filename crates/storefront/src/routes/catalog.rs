//! Catalog pages: home, shop listing, product detail and static pages.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use souq_core::models::{BannerSlide, Product, ProductAttribute, ProductImage};
use souq_core::{CategoryId, ProductId};

use crate::db::{CatalogRepository, PriceFilter, ShopFilter, ShopSort};
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::GuestContext;
use crate::page::PageContext;
use crate::state::AppState;

const HOME_SECTION_SIZE: i64 = 8;
const DEFAULT_PER_PAGE: i64 = 9;
const MAX_PER_PAGE: i64 = 60;
const RELATED_PRODUCTS: i64 = 6;

/// Parse a numeric path segment, treating anything else as a missing page.
pub(crate) fn parse_id(raw: &str) -> Result<i32> {
    raw.parse::<i32>()
        .map_err(|_| AppError::NotFound(format!("no such page: {raw}")))
}

// =============================================================================
// Home
// =============================================================================

#[derive(Template, WebTemplate)]
#[template(path = "catalog/home.html")]
pub struct HomeTemplate {
    pub page: PageContext,
    pub banners: Vec<BannerSlide>,
    pub latest: Vec<Product>,
    pub most_viewed: Vec<Product>,
    pub on_sale: Vec<Product>,
}

/// Home page.
#[instrument(skip(state, session, guest))]
pub async fn home(
    State(state): State<AppState>,
    session: Session,
    guest: GuestContext,
) -> Result<HomeTemplate> {
    let catalog = CatalogRepository::new(state.pool());
    let latest = catalog.latest(HOME_SECTION_SIZE).await?;
    let most_viewed = catalog.most_viewed(HOME_SECTION_SIZE).await?;
    let on_sale = catalog.on_sale().await?;
    let banners = catalog.active_banners().await?;

    Ok(HomeTemplate {
        page: PageContext::load(&state, &session, &guest).await?,
        banners,
        latest,
        most_viewed,
        on_sale,
    })
}

// =============================================================================
// Shop listing
// =============================================================================

/// Shop query parameters. Everything arrives as text and is parsed leniently.
#[derive(Debug, Default, Deserialize)]
pub struct ShopQuery {
    pub page: Option<String>,
    pub per_page: Option<String>,
    pub sort: Option<String>,
    pub search: Option<String>,
    pub category: Option<String>,
    pub price: Option<String>,
}

/// Pagination data for the listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
    pub pages: i64,
}

impl Pagination {
    #[must_use]
    pub fn new(page: i64, per_page: i64, total: i64) -> Self {
        let pages = if total == 0 {
            1
        } else {
            (total + per_page - 1) / per_page
        };
        Self {
            page,
            per_page,
            total,
            pages,
        }
    }

    #[must_use]
    pub const fn offset(&self) -> i64 {
        (self.page - 1) * self.per_page
    }

    #[must_use]
    pub const fn has_prev(&self) -> bool {
        self.page > 1
    }

    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.page < self.pages
    }

    #[must_use]
    pub const fn prev(&self) -> i64 {
        self.page - 1
    }

    #[must_use]
    pub const fn next(&self) -> i64 {
        self.page + 1
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "catalog/shop.html")]
pub struct ShopTemplate {
    pub page: PageContext,
    pub products: Vec<Product>,
    pub pagination: Pagination,
    pub search: String,
    pub sort: String,
    pub price: String,
    pub category: Option<CategoryId>,
    /// Query string without `page`, for pagination links.
    pub filter_query: String,
}

impl ShopTemplate {
    fn is_selected_category(&self, id: &CategoryId) -> bool {
        self.category.as_ref() == Some(id)
    }
}

fn positive(raw: Option<&str>, default: i64) -> i64 {
    raw.and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|v| *v >= 1)
        .unwrap_or(default)
}

fn shop_filter(query: &ShopQuery) -> ShopFilter {
    let price = query
        .price
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .and_then(|raw| {
            let parsed = PriceFilter::parse(raw);
            if parsed.is_none() {
                tracing::warn!(price = %raw, "Ignoring malformed price filter");
            }
            parsed
        });

    ShopFilter {
        search: query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned),
        category: query
            .category
            .as_deref()
            .and_then(|c| c.trim().parse::<i32>().ok())
            .map(CategoryId::new),
        price,
        sort: ShopSort::parse(query.sort.as_deref().unwrap_or_default()),
    }
}

fn filter_query(query: &ShopQuery, per_page: i64) -> String {
    let mut out = url::form_urlencoded::Serializer::new(String::new());
    out.append_pair("per_page", &per_page.to_string());
    for (key, value) in [
        ("sort", &query.sort),
        ("search", &query.search),
        ("category", &query.category),
        ("price", &query.price),
    ] {
        if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
            out.append_pair(key, value);
        }
    }
    out.finish()
}

/// Product listing with search, filters, sorting and pages.
#[instrument(skip(state, session, guest))]
pub async fn shop(
    State(state): State<AppState>,
    session: Session,
    guest: GuestContext,
    Query(query): Query<ShopQuery>,
) -> Result<ShopTemplate> {
    let filter = shop_filter(&query);
    let per_page = positive(query.per_page.as_deref(), DEFAULT_PER_PAGE).min(MAX_PER_PAGE);
    let requested = positive(query.page.as_deref(), 1);

    let catalog = CatalogRepository::new(state.pool());
    let offset = (requested - 1) * per_page;
    let (products, total) = catalog.search(&filter, per_page, offset).await?;

    Ok(ShopTemplate {
        page: PageContext::load(&state, &session, &guest).await?,
        products,
        pagination: Pagination::new(requested, per_page, total),
        search: filter.search.clone().unwrap_or_default(),
        sort: query.sort.clone().unwrap_or_default(),
        price: query.price.clone().unwrap_or_default(),
        category: filter.category,
        filter_query: filter_query(&query, per_page),
    })
}

// =============================================================================
// Product detail
// =============================================================================

#[derive(Template, WebTemplate)]
#[template(path = "catalog/product.html")]
pub struct ProductTemplate {
    pub page: PageContext,
    pub product: Product,
    pub images: Vec<ProductImage>,
    pub attributes: Vec<ProductAttribute>,
    pub related: Vec<Product>,
}

/// Product page. Each visit counts as a view.
#[instrument(skip(state, session, guest))]
pub async fn product(
    State(state): State<AppState>,
    session: Session,
    guest: GuestContext,
    Path(product_id): Path<String>,
) -> Result<ProductTemplate> {
    let id = ProductId::new(parse_id(&product_id)?);
    let catalog = CatalogRepository::new(state.pool());
    let product = catalog
        .product(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;

    catalog.record_view(id).await?;
    let images = catalog.images(id).await?;
    let attributes = catalog.attributes(id).await?;
    let related = catalog.random_except(id, RELATED_PRODUCTS).await?;

    Ok(ProductTemplate {
        page: PageContext::load(&state, &session, &guest).await?,
        product,
        images,
        attributes,
        related,
    })
}

// =============================================================================
// Static pages
// =============================================================================

#[derive(Template, WebTemplate)]
#[template(path = "pages/about.html")]
pub struct AboutTemplate {
    pub page: PageContext,
}

#[derive(Template, WebTemplate)]
#[template(path = "pages/return_policy.html")]
pub struct ReturnPolicyTemplate {
    pub page: PageContext,
}

/// About page with the shop's WhatsApp number.
#[instrument(skip(state, session, guest))]
pub async fn about(
    State(state): State<AppState>,
    session: Session,
    guest: GuestContext,
) -> Result<AboutTemplate> {
    Ok(AboutTemplate {
        page: PageContext::load(&state, &session, &guest).await?,
    })
}

/// Return policy page.
#[instrument(skip(state, session, guest))]
pub async fn return_policy(
    State(state): State<AppState>,
    session: Session,
    guest: GuestContext,
) -> Result<ReturnPolicyTemplate> {
    Ok(ReturnPolicyTemplate {
        page: PageContext::load(&state, &session, &guest).await?,
    })
}

/// Fallback for unknown paths.
pub async fn not_found() -> AppError {
    AppError::NotFound("no route".to_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_pagination_bounds() {
        let p = Pagination::new(1, 9, 20);
        assert_eq!(p.pages, 3);
        assert!(!p.has_prev());
        assert!(p.has_next());
        assert_eq!(p.offset(), 0);

        let last = Pagination::new(3, 9, 20);
        assert!(last.has_prev());
        assert!(!last.has_next());
        assert_eq!(last.offset(), 18);
    }

    #[test]
    fn test_pagination_empty_listing_has_one_page() {
        let p = Pagination::new(1, 9, 0);
        assert_eq!(p.pages, 1);
        assert!(!p.has_next());
    }

    #[test]
    fn test_shop_filter_ignores_malformed_price() {
        let query = ShopQuery {
            price: Some("cheap".to_owned()),
            category: Some("4".to_owned()),
            search: Some("  زيت ".to_owned()),
            sort: Some("price-desc".to_owned()),
            ..ShopQuery::default()
        };
        let filter = shop_filter(&query);
        assert_eq!(filter.price, None);
        assert_eq!(filter.category, Some(CategoryId::new(4)));
        assert_eq!(filter.search.as_deref(), Some("زيت"));
        assert_eq!(filter.sort, ShopSort::PriceDesc);
    }

    #[test]
    fn test_shop_filter_price_range() {
        let query = ShopQuery {
            price: Some("100-200".to_owned()),
            ..ShopQuery::default()
        };
        assert_eq!(
            shop_filter(&query).price,
            Some(PriceFilter::Between(Decimal::from(100), Decimal::from(200)))
        );
    }

    #[test]
    fn test_positive_falls_back_on_garbage() {
        assert_eq!(positive(Some("abc"), 9), 9);
        assert_eq!(positive(Some("0"), 9), 9);
        assert_eq!(positive(Some("3"), 9), 3);
        assert_eq!(positive(None, 1), 1);
    }

    #[test]
    fn test_filter_query_keeps_filters_only() {
        let query = ShopQuery {
            page: Some("2".to_owned()),
            search: Some("oil".to_owned()),
            price: Some(String::new()),
            ..ShopQuery::default()
        };
        assert_eq!(filter_query(&query, 9), "per_page=9&search=oil");
    }

    #[test]
    fn test_parse_id_rejects_non_numeric() {
        assert_eq!(parse_id("12").unwrap(), 12);
        assert!(matches!(parse_id("favicon.ico"), Err(AppError::NotFound(_))));
    }
}
