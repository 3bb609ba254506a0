use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::Result;
use crate::fetcher::bounded::Lenient;
use crate::fetcher::transport::Transport;
use crate::fetcher::{Access, DocumentFetcher};
use crate::sync::fields;
use crate::sync::medals::canonical_code;
use crate::types::{MedalCounts, SportCounts, SportSweep, WINTER_SPORTS};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSportRow {
    #[serde(default, deserialize_with = "fields::text")]
    country_code: String,
    #[serde(default, deserialize_with = "fields::count")]
    gold: u16,
    #[serde(default, deserialize_with = "fields::count")]
    silver: u16,
    #[serde(default, deserialize_with = "fields::count")]
    bronze: u16,
}

/// Favorite country's medals in one sport; zeros when it is not listed.
pub fn fetch_sport_counts_one<T: Transport>(
    fetcher: &DocumentFetcher<T>,
    url_prefix: &str,
    sport_code: &str,
    favorite: &str,
) -> Result<MedalCounts> {
    let url = format!("{url_prefix}{sport_code}");
    let rows: Vec<Lenient<RawSportRow>> = fetcher.fetch_json(&url, Access::Authenticated)?;

    let favorite = canonical_code(favorite);
    Ok(rows
        .into_iter()
        .filter_map(Lenient::into_option)
        .find(|row| canonical_code(&row.country_code) == favorite)
        .map(|row| MedalCounts::new(row.gold, row.silver, row.bronze))
        .unwrap_or_default())
}

/// One pass over every winter sport, `pause` apart.
///
/// A sport that fails contributes zeros and marks the sweep incomplete; the
/// remaining sports are still fetched.
pub fn fetch_favorite_sport_counts<T: Transport>(
    fetcher: &DocumentFetcher<T>,
    url_prefix: &str,
    favorite: &str,
    pause: Duration,
) -> SportSweep {
    let mut counts: SportCounts = Default::default();
    let mut complete = true;

    for (slot, sport) in counts.iter_mut().zip(WINTER_SPORTS.iter()) {
        match fetch_sport_counts_one(fetcher, url_prefix, sport.code, favorite) {
            Ok(c) => *slot = c,
            Err(e) => {
                warn!(sport = sport.code, error = %e, "Sport medal fetch failed: {}", sport.name);
                complete = false;
            }
        }
        if !pause.is_zero() {
            std::thread::sleep(pause);
        }
    }

    debug!(complete, favorite, "Sport sweep finished");
    SportSweep { counts, complete }
}
