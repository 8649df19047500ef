//! Souq CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Apply migrations from migrations/
//! souq-cli migrate
//!
//! # Make sure the default category exists, optionally with sample products
//! souq-cli seed --demo
//!
//! # Create an admin account
//! souq-cli admin create -e admin@example.com -n "Admin Name" -p "long password"
//!
//! # Pull cities, zones and districts from Bosta
//! souq-cli geography sync
//!
//! # Preview what the dropshipping scraper reads from a page
//! souq-cli dropship scrape https://www.noon.com/egypt-en/...
//! ```
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` (or `ADMIN_DATABASE_URL`) - `PostgreSQL` connection string
//! - `BOSTA_API_KEY` - courier key, required by `geography sync`

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Debug, Parser)]
#[command(name = "souq-cli")]
#[command(author, version, about = "Souq CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed reference data
    Seed {
        /// Also insert sample products
        #[arg(long)]
        demo: bool,
    },
    /// Manage admin users
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Shipping geography
    Geography {
        #[command(subcommand)]
        action: GeographyAction,
    },
    /// Dropshipping tools
    Dropship {
        #[command(subcommand)]
        action: DropshipAction,
    },
}

#[derive(Debug, Subcommand)]
enum AdminAction {
    /// Create a new admin user
    Create {
        /// Admin email address
        #[arg(short, long)]
        email: String,

        /// Admin display name
        #[arg(short, long)]
        name: String,

        /// Initial password (at least 8 characters)
        #[arg(short, long)]
        password: String,
    },
}

#[derive(Debug, Subcommand)]
enum GeographyAction {
    /// Upsert cities, zones and districts from the courier
    Sync,
}

#[derive(Debug, Subcommand)]
enum DropshipAction {
    /// Scrape a product page and print the result as JSON
    Scrape {
        /// Product page URL
        url: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CliError> {
    dotenvy::dotenv().ok();

    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed { demo } => commands::seed::run(demo).await?,
        Commands::Admin { action } => match action {
            AdminAction::Create {
                email,
                name,
                password,
            } => {
                commands::admin::create_user(&email, &name, password).await?;
            }
        },
        Commands::Geography { action } => match action {
            GeographyAction::Sync => commands::geography::sync().await?,
        },
        Commands::Dropship { action } => match action {
            DropshipAction::Scrape { url } => commands::dropship::scrape(&url).await?,
        },
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_admin_create() {
        let cli = Cli::try_parse_from([
            "souq-cli", "admin", "create", "-e", "a@b.co", "-n", "Sara", "-p", "secret123",
        ])
        .unwrap();
        let Commands::Admin {
            action: AdminAction::Create { email, name, password },
        } = cli.command
        else {
            panic!("expected admin create");
        };
        assert_eq!(email, "a@b.co");
        assert_eq!(name, "Sara");
        assert_eq!(password, "secret123");
    }

    #[test]
    fn test_parse_seed_demo_flag() {
        let cli = Cli::try_parse_from(["souq-cli", "seed", "--demo"]).unwrap();
        assert!(matches!(cli.command, Commands::Seed { demo: true }));

        let cli = Cli::try_parse_from(["souq-cli", "seed"]).unwrap();
        assert!(matches!(cli.command, Commands::Seed { demo: false }));
    }

    #[test]
    fn test_parse_dropship_scrape_requires_url() {
        assert!(Cli::try_parse_from(["souq-cli", "dropship", "scrape"]).is_err());
        let cli =
            Cli::try_parse_from(["souq-cli", "dropship", "scrape", "https://noon.com/x"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Dropship { action: DropshipAction::Scrape { .. } }
        ));
    }

    #[test]
    fn test_admin_create_requires_password() {
        assert!(
            Cli::try_parse_from(["souq-cli", "admin", "create", "-e", "a@b.co", "-n", "Sara"])
                .is_err()
        );
    }
}
