use heapless::Vec as BoundedVec;
use serde::Deserialize;
use tracing::debug;

use crate::config::MAX_MEDAL_ROWS;
use crate::error::Result;
use crate::fetcher::bounded::{Admit, Capped, Lenient};
use crate::fetcher::transport::Transport;
use crate::fetcher::{Access, DocumentFetcher};
use crate::sync::fields;
use crate::types::{FavoriteView, MedalRow, MedalTableSnapshot};

/// One country in the standings resource, restricted to the fields we keep.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMedalRow {
    #[serde(default, deserialize_with = "fields::text")]
    country_name: String,
    #[serde(default, deserialize_with = "fields::text")]
    country_code: String,
    #[serde(default, deserialize_with = "fields::count")]
    gold: u16,
    #[serde(default, deserialize_with = "fields::count")]
    silver: u16,
    #[serde(default, deserialize_with = "fields::count")]
    bronze: u16,
    #[serde(default, deserialize_with = "fields::count")]
    medal_total: u16,
    #[serde(default, deserialize_with = "fields::count")]
    medal_rank: u16,
    #[serde(default)]
    flag_url: Option<Lenient<RawFlagUrl>>,
}

#[derive(Deserialize, Default)]
struct RawFlagUrl {
    #[serde(default, deserialize_with = "fields::text")]
    small: String,
    #[serde(default, deserialize_with = "fields::text")]
    medium: String,
}

impl Admit for RawMedalRow {
    type Row = MedalRow;

    fn admit(self) -> Option<MedalRow> {
        let flags = self
            .flag_url
            .and_then(Lenient::into_option)
            .unwrap_or_default();
        Some(MedalRow {
            country_code: canonical_code(&self.country_code),
            country_name: self.country_name,
            flag_url_small: non_empty(flags.small),
            flag_url_medium: non_empty(flags.medium),
            gold: self.gold,
            silver: self.silver,
            bronze: self.bronze,
            total: self.medal_total,
            rank: self.medal_rank,
        })
    }
}

/// Trimmed, upper-cased country code.
pub fn canonical_code(code: &str) -> String {
    code.trim().to_uppercase()
}

fn non_empty(s: String) -> Option<String> {
    (!s.is_empty()).then_some(s)
}

/// Fetch the country standings and build a snapshot of at most
/// `MAX_MEDAL_ROWS` rows, with the favorite country's view filled in.
pub fn fetch_medal_table<T: Transport>(
    fetcher: &DocumentFetcher<T>,
    url: &str,
    favorite: &str,
) -> Result<MedalTableSnapshot> {
    let table: Capped<Lenient<RawMedalRow>, MAX_MEDAL_ROWS> =
        fetcher.fetch_json(url, Access::Authenticated)?;
    if table.skipped > 0 {
        debug!(kept = table.rows.len(), skipped = table.skipped, "Medal table truncated");
    }
    Ok(build_snapshot(table.rows, favorite))
}

/// Wrap received rows into a valid snapshot. The favorite is the first row
/// whose code matches `favorite` case-insensitively.
pub fn build_snapshot(
    rows: BoundedVec<MedalRow, MAX_MEDAL_ROWS>,
    favorite: &str,
) -> MedalTableSnapshot {
    let favorite_code = canonical_code(favorite);
    let favorite = rows
        .iter()
        .position(|row| row.country_code == favorite_code)
        .map(|index| {
            let row = &rows[index];
            FavoriteView {
                index,
                gold: row.gold,
                silver: row.silver,
                bronze: row.bronze,
                total: row.total,
            }
        });

    MedalTableSnapshot {
        valid: true,
        rows,
        favorite,
    }
}
