//! Scrape preview for dropshipping.

use souq_admin::services::ProductScraper;

use super::CliError;

/// Scrape `url` and print the product as pretty JSON.
///
/// # Errors
///
/// Returns `CliError::Scrape` if the page cannot be fetched or parsed.
pub async fn scrape(url: &str) -> Result<(), CliError> {
    let scraper = ProductScraper::new()?;
    let product = scraper.scrape(url).await?;
    tracing::info!(site = %product.source_site, "Scraped product");

    let json = serde_json::to_string_pretty(&product)?;
    #[allow(clippy::print_stdout)]
    {
        println!("{json}");
    }
    Ok(())
}
