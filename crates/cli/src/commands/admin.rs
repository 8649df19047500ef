//! Admin user management commands.
//!
//! ```bash
//! souq-cli admin create -e admin@example.com -n "Admin Name" -p "long password"
//! ```

use secrecy::SecretString;
use souq_admin::services::AdminAuthService;

use super::{CliError, connect};

/// Basic shape check before touching the database.
fn validate_email(email: &str) -> Result<(), CliError> {
    let valid = email
        .split_once('@')
        .is_some_and(|(user, domain)| !user.is_empty() && domain.contains('.'));
    if valid {
        Ok(())
    } else {
        Err(CliError::InvalidEmail(email.to_owned()))
    }
}

/// Create a new admin user with an Argon2 password hash.
///
/// # Returns
///
/// The ID of the created admin user.
///
/// # Errors
///
/// Returns `CliError::InvalidEmail` for a malformed address,
/// `CliError::Auth` for a weak password or an email already in use.
pub async fn create_user(email: &str, name: &str, password: String) -> Result<i32, CliError> {
    validate_email(email)?;
    let email = email.trim().to_lowercase();
    let password = SecretString::from(password);

    let pool = connect().await?;
    tracing::info!("Creating admin user: {}", email);

    let admin = AdminAuthService::new(&pool)
        .create_admin(name.trim(), &email, &password)
        .await?;

    tracing::info!(
        "Admin user created successfully! ID: {}, Email: {}",
        admin.id,
        admin.email
    );
    Ok(admin.id.as_i32())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("admin@souq.eg").is_ok());
        assert!(validate_email("@souq.eg").is_err());
        assert!(validate_email("admin@localhost").is_err());
        assert!(validate_email("admin").is_err());
    }
}
