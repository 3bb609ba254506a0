use chrono::FixedOffset;

use crate::error::{AppError, Result};

pub const MEDALS_COUNTRY_URL: &str =
    "https://sdf.nbcolympics.com/v1/widget/medals/country?competitionCode=OWG2026";
pub const MEDALS_SPORT_URL_PREFIX: &str =
    "https://sdf.nbcolympics.com/v1/widget/medals/sport?competitionCode=OWG2026&sportCode=";
pub const SCHEDULE_URL_PREFIX: &str =
    "https://schedules.nbcolympics.com/api/v1/schedule?startDate=";

/// Public widget key the medal endpoints expect in `x-olyapiauth`.
pub const MEDALS_API_AUTH: &str = "daaacddd-1513-46a3-8b79-ac3584258f5b";
pub const MEDALS_AUTH_HEADER: &str = "x-olyapiauth";
pub const USER_AGENT: &str = "olympic-scoreboard";

/// Connect/read/write timeout for every fetch (seconds).
pub const HTTP_TIMEOUT_SECS: u64 = 12;

/// Redirect hops followed before a fetch is abandoned.
pub const MAX_REDIRECTS: usize = 5;

/// Deepest JSON nesting accepted from any resource.
pub const JSON_NESTING_LIMIT: usize = 24;

/// Longest chunk-size line (including extensions) the chunked decoder reads.
pub const MAX_CHUNK_HEADER_LEN: usize = 64;

/// Snapshot capacities. Rows beyond these are dropped, never grown into.
pub const MAX_MEDAL_ROWS: usize = 24;
pub const MAX_SCHEDULE_ROWS: usize = 40;
pub const WINTER_SPORT_COUNT: usize = 16;
pub const ALERT_QUEUE_CAPACITY: usize = 4;

/// Pause between per-sport fetches in an attribution sweep (milliseconds).
pub const SPORT_SWEEP_PAUSE_MS: u64 = 10;

/// Scheduler timing, all in milliseconds of the monotonic clock.
pub mod timing {
    pub const MEDALS_POLL_INTERVAL_MS: u64 = 30_000;
    pub const SCHEDULE_POLL_INTERVAL_MS: u64 = 60_000;
    pub const PAGE_ROTATE_INTERVAL_MS: u64 = 18_000;
    pub const STALE_AFTER_MS: u64 = 90_000;
    pub const ALERT_POPUP_MS: u64 = 6_000;
    pub const ALERT_AUDIO_MS: u64 = 8_000;
    pub const TIME_SYNC_RETRY_MS: u64 = 15_000;
    pub const LOOP_PAUSE_MS: u64 = 20;
}

/// Epochs at or before 2020-01-01T00:00:00Z mean the wall clock was never synced.
pub const PLAUSIBLE_EPOCH_SECS: i64 = 1_577_836_800;

pub const FALLBACK_SCHEDULE_DATE: &str = "2026-02-11";
pub const CONNECTIVITY_TARGET: &str = "sdf.nbcolympics.com:443";

/// Reachability results are reused for this long before probing again (milliseconds).
pub const CONNECTIVITY_CACHE_MS: u64 = 5_000;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    /// Followed country, trimmed and upper-cased (FAVORITE_COUNTRY)
    pub favorite_country: String,
    pub medals_country_url: String,
    pub medals_sport_url_prefix: String,
    pub schedule_url_prefix: String,
    /// Value sent in the medal endpoints' auth header (MEDALS_API_AUTH)
    pub medals_api_auth: String,
    pub http_timeout_secs: u64,
    /// Fixed offset used to derive today's schedule date; `None` uses the local zone.
    pub schedule_utc_offset: Option<FixedOffset>,
    /// Schedule date used until the wall clock is synced (FALLBACK_SCHEDULE_DATE)
    pub fallback_schedule_date: String,
    /// `host:port` dialed to decide connectivity (CONNECTIVITY_TARGET)
    pub connectivity_target: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let favorite_country = std::env::var("FAVORITE_COUNTRY")
            .unwrap_or_else(|_| "CAN".to_string())
            .trim()
            .to_uppercase();
        if favorite_country.is_empty() {
            return Err(AppError::Config("FAVORITE_COUNTRY must not be empty".to_string()));
        }

        let schedule_utc_offset = match std::env::var("SCHEDULE_UTC_OFFSET_MINUTES") {
            Ok(raw) => Some(parse_utc_offset(&raw)?),
            Err(_) => None,
        };

        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            favorite_country,
            medals_country_url: std::env::var("MEDALS_COUNTRY_URL")
                .unwrap_or_else(|_| MEDALS_COUNTRY_URL.to_string()),
            medals_sport_url_prefix: std::env::var("MEDALS_SPORT_URL_PREFIX")
                .unwrap_or_else(|_| MEDALS_SPORT_URL_PREFIX.to_string()),
            schedule_url_prefix: std::env::var("SCHEDULE_URL_PREFIX")
                .unwrap_or_else(|_| SCHEDULE_URL_PREFIX.to_string()),
            medals_api_auth: std::env::var("MEDALS_API_AUTH")
                .unwrap_or_else(|_| MEDALS_API_AUTH.to_string()),
            http_timeout_secs: std::env::var("HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|_| HTTP_TIMEOUT_SECS.to_string())
                .parse::<u64>()
                .map_err(|_| {
                    AppError::Config("HTTP_TIMEOUT_SECS must be a whole number".to_string())
                })?,
            schedule_utc_offset,
            fallback_schedule_date: std::env::var("FALLBACK_SCHEDULE_DATE")
                .unwrap_or_else(|_| FALLBACK_SCHEDULE_DATE.to_string()),
            connectivity_target: std::env::var("CONNECTIVITY_TARGET")
                .unwrap_or_else(|_| CONNECTIVITY_TARGET.to_string()),
        })
    }
}

fn parse_utc_offset(raw: &str) -> Result<FixedOffset> {
    let minutes = raw.trim().parse::<i32>().map_err(|_| {
        AppError::Config(
            "SCHEDULE_UTC_OFFSET_MINUTES must be a whole number of minutes".to_string(),
        )
    })?;
    FixedOffset::east_opt(minutes * 60).ok_or_else(|| {
        AppError::Config(format!("SCHEDULE_UTC_OFFSET_MINUTES out of range: {minutes}"))
    })
}
