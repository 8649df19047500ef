//! Business logic services for admin.
//!
//! # Services
//!
//! - `auth` - Admin login with Argon2 password hashes
//! - `bosta` - Bosta courier API client
//! - `export` - Order and income spreadsheets
//! - `images` - Upload and download of product images
//! - `scraper` - Product page scraper for dropshipping

pub mod auth;
pub mod bosta;
pub mod export;
pub mod images;
pub mod scraper;

pub use auth::{AdminAuthService, AuthError};
pub use bosta::{BostaClient, BostaError, DeliveryRequest};
pub use export::ExportError;
pub use images::ImageError;
pub use scraper::{ProductScraper, ScrapeError, ScrapedProduct};
