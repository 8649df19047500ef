//! Shipping geography sync from the Bosta API.
//!
//! Cities, zones and districts are upserted by courier id. Names follow the
//! courier; shipping costs are left alone.

use souq_admin::config::BostaConfig;
use souq_admin::db::GeographyRepository;
use souq_admin::services::{BostaClient, BostaError};

use super::{CliError, connect};

/// Counts of rows touched by a sync.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub cities: usize,
    pub zones: usize,
    pub districts: usize,
}

/// Pull every city with its zones and districts.
///
/// # Errors
///
/// Returns `CliError::Bosta` when `BOSTA_API_KEY` is missing or a request
/// fails, `CliError::Repository` if an upsert fails.
pub async fn sync() -> Result<(), CliError> {
    let bosta = BostaClient::new(&BostaConfig::from_env())?;
    if !bosta.is_configured() {
        return Err(BostaError::NotConfigured.into());
    }

    let pool = connect().await?;
    let geography = GeographyRepository::new(&pool);
    let mut summary = SyncSummary::default();

    for city in bosta.cities().await? {
        geography.upsert_city(&city.id, &city.name).await?;
        summary.cities += 1;

        for zone in bosta.zones(&city.id).await? {
            geography.upsert_zone(&city.id, &zone.id, &zone.name).await?;
            summary.zones += 1;
        }
        for district in bosta.districts(&city.id).await? {
            geography
                .upsert_district(&city.id, &district.id, &district.name)
                .await?;
            summary.districts += 1;
        }
        tracing::info!(city = %city.name, "City synced");
    }

    tracing::info!(
        cities = summary.cities,
        zones = summary.zones,
        districts = summary.districts,
        "Geography sync complete!"
    );
    Ok(())
}
