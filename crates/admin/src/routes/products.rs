//! Product route handlers.

use std::str::FromStr;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Json,
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use rust_decimal::Decimal;
use serde::Serialize;
use tower_sessions::Session;
use tracing::instrument;

use souq_core::models::{Category, Product, ProductImage};
use souq_core::{CategoryId, ProductId, ProductImageId};

use crate::db::{CategoryRepository, NewProduct, ProductRepository, ProductUpdate};
use crate::error::{AppError, Result};
use crate::filters;
use crate::flash;
use crate::middleware::{RequireAdminAuth, csrf_token};
use crate::page::AdminPage;
use crate::routes::{IdPath, MultipartForm, UploadedFile, non_empty};
use crate::services::images::{
    self, EDIT_EXTENSIONS, UPLOAD_EXTENSIONS, allowed_extension, is_missing_image,
    save_upload, timestamped_upload_name, unique_upload_name,
};
use crate::state::AppState;

const PRODUCTS_PATH: &str = "/admin/products";

const MSG_NAME_REQUIRED: &str = "اسم المنتج مطلوب";
const MSG_INVALID_PRICE: &str = "السعر غير صالح";
const MSG_INVALID_DISCOUNT: &str = "نسبة الخصم غير صالحة";
const MSG_INVALID_QUANTITY: &str = "الكمية غير صالحة";
const MSG_INVALID_CATEGORY: &str = "التصنيف غير صالح";
const MSG_IMAGE_REQUIRED: &str = "الصورة الرئيسية مطلوبة";
const MSG_IMAGE_NOT_SELECTED: &str = "لم يتم اختيار صورة رئيسية";
const MSG_IMAGE_TYPE: &str = "نوع الملف غير مسموح به للصورة الرئيسية";
const MSG_ADDED: &str = "تمت إضافة المنتج بنجاح!";

const MSG_EDIT_NAME_REQUIRED: &str = "اسم المنتج مطلوب!";
const MSG_EDIT_PRICE_REQUIRED: &str = "سعر المنتج مطلوب!";
const MSG_EDIT_QUANTITY_REQUIRED: &str = "كمية المنتج مطلوبة!";
const MSG_EDIT_CATEGORY_REQUIRED: &str = "تصنيف المنتج مطلوب!";
const MSG_EDIT_NUMBERS: &str = "خطأ في البيانات المدخلة! تأكد من صحة الأرقام المدخلة.";
const MSG_EDIT_IMAGE_TYPE: &str =
    "نوع الملف غير مدعوم! يرجى اختيار صورة بصيغة PNG, JPG, JPEG, GIF, أو WEBP";
const MSG_EDITED: &str = "تم تعديل المنتج بنجاح!";

const MSG_DELETED: &str = "تم حذف المنتج بنجاح!";
const MSG_IMAGE_DELETED: &str = "تم حذف الصورة بنجاح";

// =============================================================================
// List
// =============================================================================

#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsTemplate {
    pub page: AdminPage,
    pub products: Vec<Product>,
    pub categories: Vec<Category>,
}

/// Product list with the add form.
#[instrument(skip(state, session, admin))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(admin): RequireAdminAuth,
) -> Result<ProductsTemplate> {
    let products = ProductRepository::new(state.pool()).list().await?;
    let categories = CategoryRepository::new(state.pool()).list().await?;

    Ok(ProductsTemplate {
        page: AdminPage::load(&session, admin, PRODUCTS_PATH).await?,
        products,
        categories,
    })
}

// =============================================================================
// Add
// =============================================================================

/// Validated scalar fields of the add form.
#[derive(Debug, PartialEq, Eq)]
struct ProductFields {
    name: String,
    description: String,
    price: Decimal,
    discount: Decimal,
    stock: i32,
    category_id: CategoryId,
}

fn parse_new_product(form: &MultipartForm) -> std::result::Result<ProductFields, &'static str> {
    let name = non_empty(form.field("name")).ok_or(MSG_NAME_REQUIRED)?;
    let price = non_empty(form.field("price"))
        .and_then(|v| Decimal::from_str(v).ok())
        .filter(|p| *p >= Decimal::ZERO)
        .ok_or(MSG_INVALID_PRICE)?;
    let discount = match non_empty(form.field("discount")) {
        None => Decimal::ZERO,
        Some(v) => Decimal::from_str(v)
            .ok()
            .filter(|d| (Decimal::ZERO..=Decimal::ONE_HUNDRED).contains(d))
            .ok_or(MSG_INVALID_DISCOUNT)?,
    };
    let stock = non_empty(form.field("quantity"))
        .and_then(|v| v.parse::<i32>().ok())
        .filter(|q| *q >= 0)
        .ok_or(MSG_INVALID_QUANTITY)?;
    let category_id = non_empty(form.field("category"))
        .and_then(|v| v.parse::<i32>().ok())
        .map(CategoryId::new)
        .ok_or(MSG_INVALID_CATEGORY)?;

    Ok(ProductFields {
        name: name.to_owned(),
        description: form.field("description").unwrap_or_default().trim().to_owned(),
        price,
        discount,
        stock,
        category_id,
    })
}

/// The main image of the add form, checked for presence and type.
fn main_image(form: &MultipartForm) -> std::result::Result<&UploadedFile, &'static str> {
    if !form.has_part("image") {
        return Err(MSG_IMAGE_REQUIRED);
    }
    let file = form.file("image").ok_or(MSG_IMAGE_NOT_SELECTED)?;
    if !allowed_extension(&file.file_name, UPLOAD_EXTENSIONS) {
        return Err(MSG_IMAGE_TYPE);
    }
    Ok(file)
}

/// Save every allowed file of the `additional_images` input to the gallery.
async fn save_gallery(
    state: &AppState,
    product: ProductId,
    files: &[UploadedFile],
    allowed: &[&str],
) -> Result<()> {
    let repo = ProductRepository::new(state.pool());
    let uploads = state.config().uploads_dir();
    for file in files {
        if !allowed_extension(&file.file_name, allowed) {
            tracing::warn!(file = %file.file_name, "Skipping gallery file with disallowed type");
            continue;
        }
        let stored = save_upload(&uploads, &unique_upload_name(&file.file_name), &file.bytes).await?;
        repo.add_image(product, &stored).await?;
    }
    Ok(())
}

/// Create a product from the multipart add form.
#[instrument(skip(state, session, _admin, multipart))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(_admin): RequireAdminAuth,
    multipart: Multipart,
) -> Result<Redirect> {
    let form = MultipartForm::read(multipart).await?;

    let fields = match parse_new_product(&form) {
        Ok(fields) => fields,
        Err(message) => return Ok(flash::danger(&session, message, PRODUCTS_PATH).await),
    };
    if CategoryRepository::new(state.pool())
        .get(fields.category_id)
        .await?
        .is_none()
    {
        return Ok(flash::danger(&session, MSG_INVALID_CATEGORY, PRODUCTS_PATH).await);
    }
    let image = match main_image(&form) {
        Ok(image) => image,
        Err(message) => return Ok(flash::danger(&session, message, PRODUCTS_PATH).await),
    };

    let stored = save_upload(
        &state.config().uploads_dir(),
        &unique_upload_name(&image.file_name),
        &image.bytes,
    )
    .await?;

    let product = ProductRepository::new(state.pool())
        .create(&NewProduct {
            name: fields.name,
            description: fields.description,
            price: fields.price,
            discount: fields.discount,
            stock: fields.stock,
            image: stored,
            category_id: fields.category_id,
        })
        .await?;

    save_gallery(&state, product.id, form.files("additional_images"), UPLOAD_EXTENSIONS).await?;

    tracing::info!(product_id = %product.id, "Product created");
    Ok(flash::success(&session, MSG_ADDED, PRODUCTS_PATH).await)
}

// =============================================================================
// Edit
// =============================================================================

#[derive(Template, WebTemplate)]
#[template(path = "products/edit.html")]
pub struct EditProductTemplate {
    pub product: Product,
    pub categories: Vec<Category>,
    pub images: Vec<ProductImage>,
    pub csrf_token: String,
}

/// Edit form fragment, loaded into the product list.
#[instrument(skip(state, session, _admin))]
pub async fn edit_form(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(_admin): RequireAdminAuth,
    IdPath(id): IdPath<i32>,
) -> Result<EditProductTemplate> {
    let id = ProductId::new(id);
    let repo = ProductRepository::new(state.pool());
    let product = repo
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;

    Ok(EditProductTemplate {
        images: repo.images(id).await?,
        categories: CategoryRepository::new(state.pool()).list().await?,
        csrf_token: csrf_token(&session).await?,
        product,
    })
}

fn parse_product_update(form: &MultipartForm) -> std::result::Result<ProductFields, &'static str> {
    let name = non_empty(form.field("name")).ok_or(MSG_EDIT_NAME_REQUIRED)?;
    let price = non_empty(form.field("price")).ok_or(MSG_EDIT_PRICE_REQUIRED)?;
    let quantity = non_empty(form.field("quantity")).ok_or(MSG_EDIT_QUANTITY_REQUIRED)?;
    let category = non_empty(form.field("category")).ok_or(MSG_EDIT_CATEGORY_REQUIRED)?;

    let price = Decimal::from_str(price).map_err(|_| MSG_EDIT_NUMBERS)?;
    let discount = match non_empty(form.field("discount")) {
        None => Decimal::ZERO,
        Some(v) => Decimal::from_str(v).map_err(|_| MSG_EDIT_NUMBERS)?,
    };
    let stock = quantity.parse::<i32>().map_err(|_| MSG_EDIT_NUMBERS)?;
    let category_id = category
        .parse::<i32>()
        .map(CategoryId::new)
        .map_err(|_| MSG_EDIT_NUMBERS)?;

    Ok(ProductFields {
        name: name.to_owned(),
        description: form.field("description").unwrap_or_default().trim().to_owned(),
        price,
        discount,
        stock,
        category_id,
    })
}

/// Update a product from the multipart edit form.
#[instrument(skip(state, session, _admin, multipart))]
pub async fn edit(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(_admin): RequireAdminAuth,
    IdPath(id): IdPath<i32>,
    multipart: Multipart,
) -> Result<Redirect> {
    let id = ProductId::new(id);
    let repo = ProductRepository::new(state.pool());
    let product = repo
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;
    let form = MultipartForm::read(multipart).await?;

    let fields = match parse_product_update(&form) {
        Ok(fields) => fields,
        Err(message) => return Ok(flash::danger(&session, message, PRODUCTS_PATH).await),
    };

    let image = match form.file("image") {
        Some(file) if !allowed_extension(&file.file_name, EDIT_EXTENSIONS) => {
            return Ok(flash::danger(&session, MSG_EDIT_IMAGE_TYPE, PRODUCTS_PATH).await);
        }
        Some(file) => Some(
            save_upload(
                &state.config().uploads_dir(),
                &timestamped_upload_name(&file.file_name),
                &file.bytes,
            )
            .await?,
        ),
        None => None,
    };
    let replaced = image.is_some();

    repo.update(
        id,
        &ProductUpdate {
            name: fields.name,
            description: fields.description,
            price: fields.price,
            discount: fields.discount,
            stock: fields.stock,
            category_id: fields.category_id,
            image,
        },
    )
    .await?;

    if replaced {
        images::remove_media(&state.config().media_root, &product.image).await;
    }
    save_gallery(&state, id, form.files("additional_images"), EDIT_EXTENSIONS).await?;

    tracing::info!(product_id = %id, "Product updated");
    Ok(flash::success(&session, MSG_EDITED, PRODUCTS_PATH).await)
}

// =============================================================================
// Delete
// =============================================================================

/// Delete a product with its gallery files.
#[instrument(skip(state, session, _admin))]
pub async fn delete(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(_admin): RequireAdminAuth,
    IdPath(id): IdPath<i32>,
) -> Result<Redirect> {
    let id = ProductId::new(id);
    if !delete_with_media(&state, id).await? {
        return Err(AppError::NotFound(format!("product {id}")));
    }
    Ok(flash::success(&session, MSG_DELETED, PRODUCTS_PATH).await)
}

/// Delete a product row and then its image files.
///
/// Returns whether the product existed.
pub(crate) async fn delete_with_media(state: &AppState, id: ProductId) -> Result<bool> {
    let repo = ProductRepository::new(state.pool());
    let Some(product) = repo.get(id).await? else {
        return Ok(false);
    };
    let gallery = repo.images(id).await?;

    repo.delete(id).await?;

    let media_root = &state.config().media_root;
    images::remove_media(media_root, &product.image).await;
    for image in &gallery {
        images::remove_media(media_root, &image.image).await;
    }

    tracing::info!(product_id = %id, "Product deleted");
    Ok(true)
}

#[derive(Debug, Serialize)]
pub struct ImageDeleted {
    pub success: bool,
    pub message: &'static str,
}

/// Delete one gallery image (called from the edit form script).
#[instrument(skip(state, _admin))]
pub async fn delete_additional_image(
    State(state): State<AppState>,
    RequireAdminAuth(_admin): RequireAdminAuth,
    IdPath(id): IdPath<i32>,
) -> Result<Response> {
    let id = ProductImageId::new(id);
    let repo = ProductRepository::new(state.pool());
    let Some(image) = repo.image(id).await? else {
        return Ok((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"success": false})),
        )
            .into_response());
    };

    repo.delete_image(id).await?;
    images::remove_media(&state.config().media_root, &image.image).await;

    Ok(Json(ImageDeleted {
        success: true,
        message: MSG_IMAGE_DELETED,
    })
    .into_response())
}

// =============================================================================
// Missing images
// =============================================================================

#[derive(Template, WebTemplate)]
#[template(path = "products/missing_images.html")]
pub struct MissingImagesTemplate {
    pub page: AdminPage,
    pub products: Vec<Product>,
    pub total_products: usize,
}

/// Products whose image is empty, a placeholder, or a missing file.
#[instrument(skip(state, session, admin))]
pub async fn missing_images(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(admin): RequireAdminAuth,
) -> Result<MissingImagesTemplate> {
    let all = ProductRepository::new(state.pool()).list().await?;
    let total_products = all.len();
    let media_root = &state.config().media_root;
    let products = all
        .into_iter()
        .filter(|p| is_missing_image(&p.image, media_root))
        .collect();

    Ok(MissingImagesTemplate {
        page: AdminPage::load(&session, admin, PRODUCTS_PATH).await?,
        products,
        total_products,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn form(fields: &[(&str, &str)]) -> MultipartForm {
        MultipartForm::from_parts(
            fields
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect::<HashMap<_, _>>(),
            HashMap::new(),
        )
    }

    #[test]
    fn test_parse_new_product() {
        let fields = parse_new_product(&form(&[
            ("name", " سيروم "),
            ("price", "250"),
            ("discount", "10"),
            ("quantity", "4"),
            ("category", "2"),
        ]));
        assert_eq!(
            fields,
            Ok(ProductFields {
                name: "سيروم".to_string(),
                description: String::new(),
                price: Decimal::from(250),
                discount: Decimal::TEN,
                stock: 4,
                category_id: CategoryId::new(2),
            })
        );
    }

    #[test]
    fn test_parse_new_product_messages() {
        let base = [("name", "x"), ("price", "1"), ("quantity", "1"), ("category", "1")];
        let with = |key: &'static str, value: &'static str| {
            let mut fields = base.to_vec();
            fields.retain(|(k, _)| *k != key);
            fields.push((key, value));
            parse_new_product(&form(&fields))
        };

        assert_eq!(with("name", "").err(), Some(MSG_NAME_REQUIRED));
        assert_eq!(with("price", "abc").err(), Some(MSG_INVALID_PRICE));
        assert_eq!(with("discount", "150").err(), Some(MSG_INVALID_DISCOUNT));
        assert_eq!(with("quantity", "-1").err(), Some(MSG_INVALID_QUANTITY));
        assert_eq!(with("category", "x").err(), Some(MSG_INVALID_CATEGORY));
    }

    #[test]
    fn test_main_image_checks() {
        let empty = form(&[]);
        assert_eq!(main_image(&empty).err(), Some(MSG_IMAGE_REQUIRED));

        let not_selected = form(&[("image", "")]);
        assert_eq!(main_image(&not_selected).err(), Some(MSG_IMAGE_NOT_SELECTED));

        let mut files = HashMap::new();
        files.insert(
            "image".to_string(),
            vec![UploadedFile {
                file_name: "a.webp".to_string(),
                bytes: vec![1, 2, 3],
            }],
        );
        let webp = MultipartForm::from_parts(HashMap::new(), files);
        assert_eq!(main_image(&webp).err(), Some(MSG_IMAGE_TYPE));
    }

    #[test]
    fn test_parse_product_update_messages() {
        assert_eq!(
            parse_product_update(&form(&[("price", "1")])).err(),
            Some(MSG_EDIT_NAME_REQUIRED)
        );
        assert_eq!(
            parse_product_update(&form(&[("name", "x"), ("quantity", "1"), ("category", "1")]))
                .err(),
            Some(MSG_EDIT_PRICE_REQUIRED)
        );
        assert_eq!(
            parse_product_update(&form(&[
                ("name", "x"),
                ("price", "1.5"),
                ("quantity", "two"),
                ("category", "1"),
            ]))
            .err(),
            Some(MSG_EDIT_NUMBERS)
        );
    }
}
