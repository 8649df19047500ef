//! Admin login and logout.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::flash::{self, Flash};
use crate::middleware::{LOGIN_PATH, clear_current_admin, csrf_token, set_current_admin};
use crate::models::CurrentAdmin;
use crate::services::{AdminAuthService, AuthError};
use crate::state::AppState;

const MSG_BOOTSTRAPPED: &str = "تم إنشاء حساب المشرف بنجاح!";
const MSG_MISSING_CREDENTIALS: &str = "الرجاء إدخال البريد الإلكتروني وكلمة المرور";
const MSG_INVALID_CREDENTIALS: &str = "البريد الإلكتروني أو كلمة المرور غير صحيحة";
const MSG_LOGIN_FAILED: &str = "حدث خطأ أثناء تسجيل الدخول";

#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub flashes: Vec<Flash>,
    pub csrf_token: String,
}

/// Login form.
#[instrument(skip(session))]
pub async fn login_page(session: Session) -> Result<LoginTemplate> {
    Ok(LoginTemplate {
        csrf_token: csrf_token(&session).await?,
        flashes: flash::take(&session).await,
    })
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Check the credentials, creating the bootstrap account first when the
/// admins table is still empty.
#[instrument(skip(state, session, form), fields(email = %form.username))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    let auth = AdminAuthService::new(state.pool());

    if let Some(bootstrap) = &state.config().bootstrap {
        match auth.bootstrap(bootstrap).await {
            Ok(Some(_)) => {
                return Ok(flash::success(&session, MSG_BOOTSTRAPPED, LOGIN_PATH)
                    .await
                    .into_response());
            }
            Ok(None) => {}
            Err(e) => {
                tracing::error!(error = %e, "Failed to create bootstrap admin");
                return Ok(flash::danger(&session, MSG_LOGIN_FAILED, LOGIN_PATH)
                    .await
                    .into_response());
            }
        }
    }

    let message = match auth.login(form.username.trim(), &form.password).await {
        Ok(admin) => {
            let current = CurrentAdmin::from(&admin);
            set_current_admin(&session, &current).await?;
            set_sentry_user(current.id.as_i32(), Some(&current.email));
            tracing::info!(admin_id = %current.id, "Admin logged in");
            return Ok(Redirect::to("/admin/").into_response());
        }
        Err(AuthError::MissingCredentials) => MSG_MISSING_CREDENTIALS,
        Err(AuthError::InvalidCredentials) => {
            tracing::warn!("Failed admin login attempt");
            MSG_INVALID_CREDENTIALS
        }
        Err(e) => {
            tracing::error!(error = %e, "Admin login error");
            MSG_LOGIN_FAILED
        }
    };

    Ok(flash::danger(&session, message, LOGIN_PATH).await.into_response())
}

/// Forget the session admin.
#[instrument(skip(session))]
pub async fn logout(session: Session) -> Result<Redirect> {
    clear_current_admin(&session).await?;
    clear_sentry_user();
    Ok(Redirect::to(LOGIN_PATH))
}
