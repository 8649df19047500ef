//! One-shot messages shown on the next rendered page.
//!
//! Messages live in the session until a page template drains them.

use axum::response::Redirect;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

const FLASH_KEY: &str = "_flashes";

/// Message category, also used as the CSS modifier.
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

/// Queue a message. A session failure loses the message and is logged.
pub async fn push(session: &Session, kind: FlashKind, message: impl Into<String>) {
    let mut pending: Vec<Flash> = session.get(FLASH_KEY).await.ok().flatten().unwrap_or_default();
    pending.push(Flash {
        kind,
        message: message.into(),
    });
    if let Err(e) = session.insert(FLASH_KEY, pending).await {
        tracing::warn!(error = %e, "Failed to store flash message");
    }
}

/// Drain the queued messages.
pub async fn take(session: &Session) -> Vec<Flash> {
    match session.remove::<Vec<Flash>>(FLASH_KEY).await {
        Ok(pending) => pending.unwrap_or_default(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read flash messages");
            Vec::new()
        }
    }
}

/// Queue a message and redirect.
pub async fn redirect(
    session: &Session,
    kind: FlashKind,
    message: impl Into<String>,
    to: &str,
) -> Redirect {
    push(session, kind, message).await;
    Redirect::to(to)
}
