//! Home page banner slides.

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

use souq_core::BannerId;
use souq_core::models::BannerSlide;

use crate::db::{BannerInput, BannerRepository};
use crate::error::{AppError, Result};
use crate::filters;
use crate::flash;
use crate::middleware::RequireAdminAuth;
use crate::page::AdminPage;
use crate::routes::{IdPath, non_empty};
use crate::state::AppState;

const BANNERS_PATH: &str = "/admin/banners";

const MSG_IMAGE_REQUIRED: &str = "رابط صورة البانر مطلوب";
const MSG_ADDED: &str = "تمت إضافة البانر بنجاح!";
const MSG_EDITED: &str = "تم تعديل البانر بنجاح!";
const MSG_DELETED: &str = "تم حذف البانر بنجاح!";
const MSG_ACTIVATED: &str = "تم تفعيل البانر";
const MSG_DEACTIVATED: &str = "تم إيقاف البانر";

#[derive(Template, WebTemplate)]
#[template(path = "banners/index.html")]
pub struct BannersTemplate {
    pub page: AdminPage,
    pub banners: Vec<BannerSlide>,
}

#[instrument(skip(state, session, admin))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(admin): RequireAdminAuth,
) -> Result<BannersTemplate> {
    Ok(BannersTemplate {
        banners: BannerRepository::new(state.pool()).list().await?,
        page: AdminPage::load(&session, admin, BANNERS_PATH).await?,
    })
}

#[derive(Debug, Default, Deserialize)]
pub struct BannerForm {
    pub image_url: Option<String>,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub link_url: Option<String>,
    pub highlight_regular_price: Option<String>,
    pub highlight_sale_price: Option<String>,
    pub highlight_discount: Option<String>,
    pub sort_order: Option<String>,
    pub is_active: Option<String>,
}

fn checkbox(value: Option<&str>, default: bool) -> bool {
    value.map_or(default, |v| {
        matches!(v.trim().to_ascii_lowercase().as_str(), "on" | "true" | "1" | "yes")
    })
}

impl BannerForm {
    /// Slide fields with `image_url` falling back to `current_image`.
    fn input(&self, current_image: Option<&str>, active_by_default: bool) -> Option<BannerInput> {
        let text = |v: &Option<String>| non_empty(v.as_deref()).map(str::to_owned);
        let image_url = non_empty(self.image_url.as_deref()).or(current_image)?;

        Some(BannerInput {
            image_url: image_url.to_owned(),
            title: text(&self.title),
            subtitle: text(&self.subtitle),
            description: text(&self.description),
            link_url: text(&self.link_url),
            highlight_regular_price: text(&self.highlight_regular_price),
            highlight_sale_price: text(&self.highlight_sale_price),
            highlight_discount: text(&self.highlight_discount),
            sort_order: non_empty(self.sort_order.as_deref())
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            is_active: checkbox(self.is_active.as_deref(), active_by_default),
        })
    }
}

#[instrument(skip(state, session, _admin, form))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(_admin): RequireAdminAuth,
    Form(form): Form<BannerForm>,
) -> Result<Redirect> {
    let Some(input) = form.input(None, true) else {
        return Ok(flash::danger(&session, MSG_IMAGE_REQUIRED, BANNERS_PATH).await);
    };
    let banner = BannerRepository::new(state.pool()).create(&input).await?;
    tracing::info!(banner_id = %banner.id, "Banner created");
    Ok(flash::success(&session, MSG_ADDED, BANNERS_PATH).await)
}

/// Replace a slide's fields; an empty image URL keeps the current image.
#[instrument(skip(state, session, _admin, form))]
pub async fn edit(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(_admin): RequireAdminAuth,
    IdPath(id): IdPath<i32>,
    Form(form): Form<BannerForm>,
) -> Result<Redirect> {
    let id = BannerId::new(id);
    let repo = BannerRepository::new(state.pool());
    let banner = repo
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("banner {id}")))?;

    let Some(input) = form.input(Some(&banner.image_url), false) else {
        return Ok(flash::danger(&session, MSG_IMAGE_REQUIRED, BANNERS_PATH).await);
    };
    repo.update(id, &input).await?;
    Ok(flash::success(&session, MSG_EDITED, BANNERS_PATH).await)
}

#[instrument(skip(state, session, _admin))]
pub async fn delete(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(_admin): RequireAdminAuth,
    IdPath(id): IdPath<i32>,
) -> Result<Redirect> {
    let id = BannerId::new(id);
    if !BannerRepository::new(state.pool()).delete(id).await? {
        return Err(AppError::NotFound(format!("banner {id}")));
    }
    Ok(flash::success(&session, MSG_DELETED, BANNERS_PATH).await)
}

#[instrument(skip(state, session, _admin))]
pub async fn toggle(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(_admin): RequireAdminAuth,
    IdPath(id): IdPath<i32>,
) -> Result<Redirect> {
    let id = BannerId::new(id);
    let active = BannerRepository::new(state.pool())
        .toggle(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("banner {id}")))?;

    let message = if active { MSG_ACTIVATED } else { MSG_DEACTIVATED };
    Ok(flash::success(&session, message, BANNERS_PATH).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_requires_image() {
        let form = BannerForm {
            title: Some("بلا صورة".to_string()),
            image_url: Some("  ".to_string()),
            ..BannerForm::default()
        };
        assert!(form.input(None, true).is_none());
    }

    #[test]
    fn test_add_defaults_active() {
        let form = BannerForm {
            image_url: Some("https://cdn.example/b.jpg".to_string()),
            sort_order: Some("2".to_string()),
            highlight_discount: Some(String::new()),
            ..BannerForm::default()
        };
        let input = form.input(None, true);
        assert!(input.as_ref().is_some_and(|i| i.is_active));
        assert_eq!(input.as_ref().map(|i| i.sort_order), Some(2));
        assert_eq!(input.and_then(|i| i.highlight_discount), None);
    }

    #[test]
    fn test_edit_keeps_image_and_reads_checkbox() {
        let form = BannerForm {
            title: Some("بعد التعديل".to_string()),
            ..BannerForm::default()
        };
        let input = form.input(Some("static/uploads/old.jpg"), false);
        assert_eq!(
            input.as_ref().map(|i| i.image_url.as_str()),
            Some("static/uploads/old.jpg")
        );
        assert!(input.is_some_and(|i| !i.is_active));
        assert!(checkbox(Some("on"), false));
        assert!(!checkbox(Some("off"), true));
    }
}
