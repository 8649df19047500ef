//! Dropshipping: scrape a product page from another retailer, review it,
//! then import it into the catalog.

use std::str::FromStr;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use souq_core::models::{Category, DropshipProduct, Product};
use souq_core::{CategoryId, DropshipProductId};

use crate::db::{CategoryRepository, DropshipRepository, NewProduct, ProductRepository, is_stale};
use crate::error::{AppError, Result};
use crate::filters;
use crate::flash::{self, FlashKind};
use crate::middleware::RequireAdminAuth;
use crate::page::AdminPage;
use crate::routes::{IdPath, non_empty, products};
use crate::services::ScrapedProduct;
use crate::services::images::{PLACEHOLDER_IMAGE, download_image};
use crate::services::scraper::{normalize_url, source_site};
use crate::state::AppState;

const DROPSHIPPING_PATH: &str = "/admin/dropshipping";

/// Gallery images downloaded on import.
const MAX_IMPORTED_IMAGES: usize = 5;
const DEFAULT_STOCK: i32 = 10;
const DEFAULT_CATEGORY_ID: i32 = 1;

const MSG_URL_REQUIRED: &str = "الرجاء إدخال رابط المنتج";
const MSG_API_URL_REQUIRED: &str = "الرجاء إدخال رابط";
const MSG_ALREADY_IMPORTED: &str = "هذا المنتج تم استيراده مسبقاً";
const MSG_REMOVED: &str = "تم حذف المنتج من قائمة الدروب شوبينج";

#[derive(Template, WebTemplate)]
#[template(path = "dropshipping/index.html")]
pub struct DropshippingTemplate {
    pub page: AdminPage,
    pub items: Vec<DropshipProduct>,
    pub categories: Vec<Category>,
}

#[instrument(skip(state, session, admin))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(admin): RequireAdminAuth,
) -> Result<DropshippingTemplate> {
    Ok(DropshippingTemplate {
        items: DropshipRepository::new(state.pool()).list().await?,
        categories: CategoryRepository::new(state.pool()).list().await?,
        page: AdminPage::load(&session, admin, DROPSHIPPING_PATH).await?,
    })
}

// =============================================================================
// Scrape
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ScrapeForm {
    pub url: Option<String>,
}

/// Scrape a product page into a pending record.
#[instrument(skip(state, session, _admin, form))]
pub async fn scrape(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(_admin): RequireAdminAuth,
    Form(form): Form<ScrapeForm>,
) -> Result<Redirect> {
    let Some(raw) = non_empty(form.url.as_deref()) else {
        return Ok(flash::danger(&session, MSG_URL_REQUIRED, DROPSHIPPING_PATH).await);
    };
    let url = normalize_url(raw);
    let repo = DropshipRepository::new(state.pool());

    if let Some(existing) = repo.find_by_source_url(&url).await? {
        if !is_stale(&existing) {
            return Ok(flash::redirect(
                &session,
                FlashKind::Warning,
                MSG_ALREADY_IMPORTED,
                DROPSHIPPING_PATH,
            )
            .await);
        }
        tracing::info!(dropship_id = %existing.id, "Replacing stale dropship record");
        repo.delete(existing.id).await?;
    }

    match state.scraper().scrape(&url).await {
        Ok(scraped) => {
            repo.create_pending(&url, &scraped).await?;
            let message = format!("تم جلب بيانات المنتج \"{}\" بنجاح!", scraped.name);
            Ok(flash::success(&session, message, DROPSHIPPING_PATH).await)
        }
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "Product scrape failed");
            let site = url::Url::parse(&url).ok().map(|u| source_site(&u));
            repo.create_error(&url, site.as_deref(), &e.to_string()).await?;
            let message = format!("فشل جلب بيانات المنتج: {e}");
            Ok(flash::danger(&session, message, DROPSHIPPING_PATH).await)
        }
    }
}

// =============================================================================
// Import
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ImportForm {
    pub name: Option<String>,
    pub price: Option<String>,
    pub discount: Option<String>,
    pub stock: Option<String>,
    pub category_id: Option<String>,
    pub description: Option<String>,
}

/// Form values with the scraped record filling the gaps.
#[derive(Debug, PartialEq, Eq)]
struct ImportFields {
    name: String,
    price: Decimal,
    discount: Decimal,
    stock: i32,
    category_id: CategoryId,
    description: String,
}

fn import_fields(
    form: &ImportForm,
    item: &DropshipProduct,
) -> std::result::Result<ImportFields, String> {
    let number = |raw: Option<&str>, default: Decimal| {
        non_empty(raw).map_or(Ok(default), |v| {
            Decimal::from_str(v).map_err(|e| format!("{v}: {e}"))
        })
    };
    let integer = |raw: Option<&str>, default: i32| {
        non_empty(raw).map_or(Ok(default), |v| v.parse::<i32>().map_err(|e| format!("{v}: {e}")))
    };

    Ok(ImportFields {
        name: non_empty(form.name.as_deref())
            .or_else(|| item.name.as_deref())
            .unwrap_or_default()
            .to_owned(),
        price: number(form.price.as_deref(), item.price.unwrap_or(Decimal::ZERO))?,
        discount: number(form.discount.as_deref(), Decimal::ZERO)?,
        stock: integer(form.stock.as_deref(), DEFAULT_STOCK)?,
        category_id: CategoryId::new(integer(form.category_id.as_deref(), DEFAULT_CATEGORY_ID)?),
        description: form
            .description
            .as_deref()
            .or(item.description.as_deref())
            .unwrap_or_default()
            .trim()
            .to_owned(),
    })
}

/// Download the scraped images and create the catalog product.
async fn import_product(
    state: &AppState,
    item: &DropshipProduct,
    fields: ImportFields,
) -> Result<Product> {
    let uploads = state.config().uploads_dir();

    let image = match item.image_url.as_deref() {
        Some(url) => match download_image(state.http(), url, &uploads).await {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(url, error = %e, "Main image download failed");
                PLACEHOLDER_IMAGE.to_owned()
            }
        },
        None => PLACEHOLDER_IMAGE.to_owned(),
    };

    let repo = ProductRepository::new(state.pool());
    let product = repo
        .create(&NewProduct {
            name: fields.name,
            description: fields.description,
            price: fields.price,
            discount: fields.discount,
            stock: fields.stock,
            image,
            category_id: fields.category_id,
        })
        .await?;

    for url in item.gallery().iter().take(MAX_IMPORTED_IMAGES) {
        match download_image(state.http(), url, &uploads).await {
            Ok(stored) => repo.add_image(product.id, &stored).await?,
            Err(e) => tracing::warn!(url = %url, error = %e, "Gallery image download failed"),
        }
    }

    DropshipRepository::new(state.pool())
        .mark_imported(item.id, product.id)
        .await?;
    Ok(product)
}

/// Turn a scraped record into a catalog product.
#[instrument(skip(state, session, _admin, form))]
pub async fn import(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(_admin): RequireAdminAuth,
    IdPath(id): IdPath<i32>,
    Form(form): Form<ImportForm>,
) -> Result<Redirect> {
    let id = DropshipProductId::new(id);
    let item = DropshipRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("dropship product {id}")))?;

    let result = match import_fields(&form, &item) {
        Ok(fields) => import_product(&state, &item, fields)
            .await
            .map_err(|e| e.to_string()),
        Err(e) => Err(e),
    };

    match result {
        Ok(product) => {
            tracing::info!(dropship_id = %id, product_id = %product.id, "Dropship product imported");
            let message = format!("تم استيراد المنتج \"{}\" بنجاح كمنتج في متجرك!", product.name);
            Ok(flash::success(&session, message, DROPSHIPPING_PATH).await)
        }
        Err(e) => {
            tracing::error!(dropship_id = %id, error = %e, "Dropship import failed");
            let message = format!("حدث خطأ أثناء الاستيراد: {e}");
            Ok(flash::danger(&session, message, DROPSHIPPING_PATH).await)
        }
    }
}

/// Remove a record together with the product imported from it.
#[instrument(skip(state, session, _admin))]
pub async fn delete(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(_admin): RequireAdminAuth,
    IdPath(id): IdPath<i32>,
) -> Result<Redirect> {
    let id = DropshipProductId::new(id);
    let repo = DropshipRepository::new(state.pool());
    let item = repo
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("dropship product {id}")))?;

    repo.delete(id).await?;
    if let Some(product) = item.imported_product_id {
        products::delete_with_media(&state, product).await?;
    }

    Ok(flash::success(&session, MSG_REMOVED, DROPSHIPPING_PATH).await)
}

// =============================================================================
// API
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ScrapeRequest {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct ScrapeResponse {
    pub success: bool,
    #[serde(flatten)]
    pub product: Option<ScrapedProduct>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Scrape preview; nothing is stored.
#[instrument(skip(state, _admin, request))]
pub async fn api_scrape(
    State(state): State<AppState>,
    RequireAdminAuth(_admin): RequireAdminAuth,
    Json(request): Json<ScrapeRequest>,
) -> Response {
    let Some(raw) = non_empty(Some(&request.url)) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ScrapeResponse {
                success: false,
                product: None,
                error: Some(MSG_API_URL_REQUIRED.to_owned()),
            }),
        )
            .into_response();
    };

    let response = match state.scraper().scrape(&normalize_url(raw)).await {
        Ok(product) => ScrapeResponse {
            success: true,
            product: Some(product),
            error: None,
        },
        Err(e) => ScrapeResponse {
            success: false,
            product: None,
            error: Some(e.to_string()),
        },
    };
    Json(response).into_response()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use souq_core::DropshipStatus;

    use super::*;

    fn item() -> DropshipProduct {
        DropshipProduct {
            id: DropshipProductId::new(1),
            source_url: "https://www.noon.com/x".to_string(),
            source_site: Some("noon.com".to_string()),
            name: Some("زيت الأرغان".to_string()),
            price: Some(Decimal::from(320)),
            description: Some("وصف".to_string()),
            image_url: None,
            additional_images: serde_json::json!([]),
            status: DropshipStatus::Pending,
            imported_product_id: None,
            error_message: None,
            created_at: Utc::now(),
        }
    }

    fn empty_form() -> ImportForm {
        ImportForm {
            name: None,
            price: None,
            discount: None,
            stock: None,
            category_id: None,
            description: None,
        }
    }

    #[test]
    fn test_import_fields_default_to_record() {
        let fields = import_fields(&empty_form(), &item());
        assert_eq!(
            fields,
            Ok(ImportFields {
                name: "زيت الأرغان".to_string(),
                price: Decimal::from(320),
                discount: Decimal::ZERO,
                stock: DEFAULT_STOCK,
                category_id: CategoryId::new(DEFAULT_CATEGORY_ID),
                description: "وصف".to_string(),
            })
        );
    }

    #[test]
    fn test_import_fields_reject_bad_numbers() {
        let form = ImportForm {
            stock: Some("كثير".to_string()),
            ..empty_form()
        };
        assert!(import_fields(&form, &item()).is_err());
    }

    #[test]
    fn test_scrape_response_shape() {
        let body = serde_json::to_value(ScrapeResponse {
            success: false,
            product: None,
            error: Some(MSG_API_URL_REQUIRED.to_string()),
        });
        assert_eq!(
            body.ok(),
            Some(serde_json::json!({"success": false, "error": "الرجاء إدخال رابط"}))
        );
    }
}
