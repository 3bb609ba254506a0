use serde::de::IgnoredAny;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::MAX_SCHEDULE_ROWS;
use crate::error::{AppError, Result};
use crate::fetcher::bounded::{Admit, Capped, Lenient};
use crate::fetcher::transport::Transport;
use crate::fetcher::{Access, DocumentFetcher};
use crate::sync::fields;
use crate::types::{
    CompetitionRow, ScheduleSnapshot, DEFAULT_SPORT_CODE, DEFAULT_SPORT_NAME, SPORT_CODE_LEN,
};

/// Shortest date key accepted (`YYYYMMDD`).
const MIN_DATE_LEN: usize = 8;

#[derive(Deserialize)]
struct RawSchedule {
    #[serde(default)]
    data: Option<Capped<Lenient<RawScheduleItem>, MAX_SCHEDULE_ROWS>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawScheduleItem {
    #[serde(default)]
    single_event: Option<Lenient<RawSingleEvent>>,
    #[serde(default)]
    sports: Option<RawSports>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSingleEvent {
    #[serde(default, deserialize_with = "fields::text")]
    title: String,
    #[serde(default, deserialize_with = "fields::text")]
    short_title: String,
    #[serde(default, deserialize_with = "fields::epoch")]
    start_date: i64,
    #[serde(default, deserialize_with = "fields::text")]
    status: String,
    #[serde(default, deserialize_with = "fields::flag")]
    is_medal_session: bool,
    #[serde(default, deserialize_with = "fields::text")]
    game_type: String,
}

/// `sports` arrives as an array, a lone object, or something unusable.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawSports {
    Many(Vec<Lenient<RawSport>>),
    One(RawSport),
    Other(IgnoredAny),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSport {
    #[serde(default, deserialize_with = "fields::text")]
    code: String,
    #[serde(default, deserialize_with = "fields::text")]
    short_display_title: String,
    #[serde(default, deserialize_with = "fields::text")]
    title: String,
}

impl RawSports {
    fn first(self) -> Option<RawSport> {
        match self {
            RawSports::Many(list) => list.into_iter().next()?.into_option(),
            RawSports::One(sport) => Some(sport),
            RawSports::Other(_) => None,
        }
    }
}

impl Admit for RawScheduleItem {
    type Row = CompetitionRow;

    fn admit(self) -> Option<CompetitionRow> {
        let event = self.single_event?.into_option()?;
        if !is_olympic_game_type(&event.game_type) || event.start_date <= 0 {
            return None;
        }

        let sport = self.sports.and_then(RawSports::first);
        let (sport_code, sport_name) = match sport {
            Some(sport) => (
                sport_code(&sport.code),
                first_non_empty([sport.short_display_title, sport.title])
                    .unwrap_or_else(|| DEFAULT_SPORT_NAME.to_string()),
            ),
            None => (DEFAULT_SPORT_CODE.to_string(), DEFAULT_SPORT_NAME.to_string()),
        };
        let title =
            first_non_empty([event.short_title, event.title]).unwrap_or_else(|| sport_name.clone());

        Some(CompetitionRow {
            start_epoch: event.start_date,
            status: event.status,
            sport_code,
            sport_name,
            title,
            is_medal_session: event.is_medal_session,
        })
    }
}

fn is_olympic_game_type(game_type: &str) -> bool {
    let game_type = game_type.trim();
    game_type.is_empty() || game_type.eq_ignore_ascii_case("olympics")
}

/// Upper-cased code of at most `SPORT_CODE_LEN` characters, or the default.
fn sport_code(raw: &str) -> String {
    let code: String = raw.trim().chars().take(SPORT_CODE_LEN).collect();
    if code.is_empty() {
        DEFAULT_SPORT_CODE.to_string()
    } else {
        code.to_uppercase()
    }
}

fn first_non_empty<const N: usize>(candidates: [String; N]) -> Option<String> {
    candidates.into_iter().find(|s| !s.is_empty())
}

/// Fetch the competitions for `date_ymd` into a snapshot sorted by start time.
///
/// A request that fails or does not parse is retried once with the hyphens
/// removed from the date, unless that would send the same key again. A parsed
/// document without `data` is not retried.
pub fn fetch_daily_schedule<T: Transport>(
    fetcher: &DocumentFetcher<T>,
    url_prefix: &str,
    date_ymd: &str,
) -> Result<ScheduleSnapshot> {
    if date_ymd.len() < MIN_DATE_LEN {
        return Err(AppError::InvalidDate(date_ymd.to_string()));
    }

    let compact: String = date_ymd.chars().filter(|&c| c != '-').collect();
    let url = format!("{url_prefix}{date_ymd}");
    let raw: RawSchedule = match fetcher.fetch_json(&url, Access::Public) {
        Ok(raw) => raw,
        Err(e) if compact != date_ymd => {
            warn!(date = date_ymd, error = %e, "Schedule fetch failed, retrying with {compact}");
            fetcher.fetch_json(&format!("{url_prefix}{compact}"), Access::Public)?
        }
        Err(e) => return Err(e),
    };
    build_schedule(raw, date_ymd)
}

fn build_schedule(raw: RawSchedule, date_ymd: &str) -> Result<ScheduleSnapshot> {
    let data = raw.data.ok_or(AppError::MissingField("data"))?;
    if data.skipped > 0 {
        debug!(kept = data.rows.len(), skipped = data.skipped, "Schedule truncated");
    }

    let mut rows = data.rows;
    // Stable: rows sharing a start time keep their source order.
    rows.sort_by_key(|row| row.start_epoch);

    Ok(ScheduleSnapshot {
        valid: true,
        date_ymd: date_ymd.to_string(),
        rows,
    })
}
