//! Session-backed notices for the next rendered admin page.

use axum::response::Redirect;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

const FLASH_KEY: &str = "_admin_flashes";

/// Notice category; doubles as the `alert-*` CSS class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashKind {
    Success,
    Danger,
    Warning,
    Info,
}

impl FlashKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Danger => "danger",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

/// Queue a notice. Session failures are logged and the notice dropped.
pub async fn push(session: &Session, kind: FlashKind, message: impl Into<String>) {
    let mut pending: Vec<Flash> = session.get(FLASH_KEY).await.ok().flatten().unwrap_or_default();
    pending.push(Flash {
        kind,
        message: message.into(),
    });
    if let Err(e) = session.insert(FLASH_KEY, pending).await {
        tracing::warn!(error = %e, "Failed to store admin flash");
    }
}

/// Remove and return every queued notice.
pub async fn take(session: &Session) -> Vec<Flash> {
    session
        .remove::<Vec<Flash>>(FLASH_KEY)
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to read admin flashes");
            None
        })
        .unwrap_or_default()
}

/// Queue a notice and redirect to `to`.
pub async fn redirect(
    session: &Session,
    kind: FlashKind,
    message: impl Into<String>,
    to: &str,
) -> Redirect {
    push(session, kind, message).await;
    Redirect::to(to)
}

/// Shorthand for a success notice followed by a redirect.
pub async fn success(session: &Session, message: impl Into<String>, to: &str) -> Redirect {
    redirect(session, FlashKind::Success, message, to).await
}

/// Shorthand for an error notice followed by a redirect.
pub async fn danger(session: &Session, message: impl Into<String>, to: &str) -> Redirect {
    redirect(session, FlashKind::Danger, message, to).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flash_kind_css_class() {
        assert_eq!(FlashKind::Danger.as_str(), "danger");
        assert_eq!(
            serde_json::to_string(&FlashKind::Warning).ok().as_deref(),
            Some("\"warning\"")
        );
    }
}
