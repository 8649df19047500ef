//! Category route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::Redirect,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use souq_core::CategoryId;
use souq_core::models::Category;

use crate::db::{CategoryRepository, RepositoryError};
use crate::error::{AppError, Result};
use crate::filters;
use crate::flash;
use crate::middleware::RequireAdminAuth;
use crate::page::AdminPage;
use crate::routes::{IdPath, non_empty};
use crate::state::AppState;

const CATEGORIES_PATH: &str = "/admin/categories";

const MSG_NAME_REQUIRED: &str = "اسم التصنيف مطلوب!";
const MSG_DUPLICATE: &str = "تصنيف بهذا الاسم موجود بالفعل!";
const MSG_ADDED: &str = "تمت إضافة التصنيف بنجاح!";
const MSG_DELETED: &str = "تم حذف القسم بنجاح!";
const MSG_EDITED: &str = "تم تعديل القسم بنجاح!";

/// Refusal shown when a category still has products.
fn not_empty_message(name: &str, products: i64) -> String {
    format!("لا يمكن حذف التصنيف \"{name}\" لأنه يحتوي على {products} منتج. قم بنقل المنتجات أولاً.")
}

#[derive(Template, WebTemplate)]
#[template(path = "categories/index.html")]
pub struct CategoriesTemplate {
    pub page: AdminPage,
    pub categories: Vec<Category>,
}

/// Category list, newest first.
#[instrument(skip(state, session, admin))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(admin): RequireAdminAuth,
) -> Result<CategoriesTemplate> {
    Ok(CategoriesTemplate {
        categories: CategoryRepository::new(state.pool()).list().await?,
        page: AdminPage::load(&session, admin, CATEGORIES_PATH).await?,
    })
}

#[derive(Debug, Deserialize)]
pub struct CategoryForm {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[instrument(skip(state, session, _admin, form))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(_admin): RequireAdminAuth,
    Form(form): Form<CategoryForm>,
) -> Result<Redirect> {
    let Some(name) = non_empty(form.name.as_deref()) else {
        return Ok(flash::danger(&session, MSG_NAME_REQUIRED, CATEGORIES_PATH).await);
    };
    let description = form.description.as_deref().unwrap_or_default().trim();

    match CategoryRepository::new(state.pool())
        .create(name, description)
        .await
    {
        Ok(category) => {
            tracing::info!(category_id = %category.id, "Category created");
            Ok(flash::success(&session, MSG_ADDED, CATEGORIES_PATH).await)
        }
        Err(RepositoryError::Conflict(_)) => {
            Ok(flash::danger(&session, MSG_DUPLICATE, CATEGORIES_PATH).await)
        }
        Err(e) => Err(e.into()),
    }
}

/// Delete a category that has no products.
#[instrument(skip(state, session, _admin))]
pub async fn delete(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(_admin): RequireAdminAuth,
    IdPath(id): IdPath<i32>,
) -> Result<Redirect> {
    let id = CategoryId::new(id);
    let repo = CategoryRepository::new(state.pool());
    let category = repo
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("category {id}")))?;

    let products = repo.product_count(id).await?;
    if products > 0 {
        let message = not_empty_message(&category.name, products);
        return Ok(flash::danger(&session, message, CATEGORIES_PATH).await);
    }

    repo.delete(id).await?;
    Ok(flash::success(&session, MSG_DELETED, CATEGORIES_PATH).await)
}

/// Rename a category or change its description.
#[instrument(skip(state, session, _admin, form))]
pub async fn edit(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(_admin): RequireAdminAuth,
    IdPath(id): IdPath<i32>,
    Form(form): Form<CategoryForm>,
) -> Result<Redirect> {
    let id = CategoryId::new(id);
    let repo = CategoryRepository::new(state.pool());
    if repo.get(id).await?.is_none() {
        return Err(AppError::NotFound(format!("category {id}")));
    }

    let name = non_empty(form.name.as_deref());
    let description = form.description.as_deref().map(str::trim);
    match repo.update(id, name, description).await {
        Ok(()) => Ok(flash::success(&session, MSG_EDITED, CATEGORIES_PATH).await),
        Err(RepositoryError::Conflict(_)) => {
            Ok(flash::danger(&session, MSG_DUPLICATE, CATEGORIES_PATH).await)
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_empty_message() {
        assert_eq!(
            not_empty_message("زيوت", 3),
            "لا يمكن حذف التصنيف \"زيوت\" لأنه يحتوي على 3 منتج. قم بنقل المنتجات أولاً."
        );
    }
}
