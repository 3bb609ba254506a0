pub mod fields;
pub mod medals;
pub mod schedule;
pub mod sports;

use std::time::Duration;

use crate::config::{Config, SPORT_SWEEP_PAUSE_MS};
use crate::error::Result;
use crate::fetcher::transport::Transport;
use crate::fetcher::DocumentFetcher;
use crate::types::{MedalTableSnapshot, ScheduleSnapshot, SportSweep};

/// Where the scoreboard reads its data from.
///
/// The scheduler and the alert builder only see this trait, so tests can
/// drive them with scripted snapshots instead of HTTP.
pub trait ScoreSource {
    fn fetch_medal_table(&self, favorite: &str) -> Result<MedalTableSnapshot>;

    fn fetch_daily_schedule(&self, date_ymd: &str) -> Result<ScheduleSnapshot>;

    /// Per-sport counts for `favorite`. Never fails as a whole; see
    /// `SportSweep::complete`.
    fn fetch_favorite_sport_counts(&self, favorite: &str) -> SportSweep;
}

#[derive(Debug, Clone)]
pub struct Endpoints {
    pub medals_country_url: String,
    pub medals_sport_url_prefix: String,
    pub schedule_url_prefix: String,
}

impl Endpoints {
    pub fn from_config(config: &Config) -> Self {
        Self {
            medals_country_url: config.medals_country_url.clone(),
            medals_sport_url_prefix: config.medals_sport_url_prefix.clone(),
            schedule_url_prefix: config.schedule_url_prefix.clone(),
        }
    }
}

/// `ScoreSource` backed by the upstream medal and schedule resources.
pub struct ScoreboardClient<T> {
    fetcher: DocumentFetcher<T>,
    endpoints: Endpoints,
    sweep_pause: Duration,
}

impl<T: Transport> ScoreboardClient<T> {
    pub fn new(fetcher: DocumentFetcher<T>, endpoints: Endpoints) -> Self {
        Self {
            fetcher,
            endpoints,
            sweep_pause: Duration::from_millis(SPORT_SWEEP_PAUSE_MS),
        }
    }

    #[cfg(test)]
    pub fn with_sweep_pause(mut self, pause: Duration) -> Self {
        self.sweep_pause = pause;
        self
    }
}

impl<T: Transport> ScoreSource for ScoreboardClient<T> {
    fn fetch_medal_table(&self, favorite: &str) -> Result<MedalTableSnapshot> {
        medals::fetch_medal_table(&self.fetcher, &self.endpoints.medals_country_url, favorite)
    }

    fn fetch_daily_schedule(&self, date_ymd: &str) -> Result<ScheduleSnapshot> {
        schedule::fetch_daily_schedule(&self.fetcher, &self.endpoints.schedule_url_prefix, date_ymd)
    }

    fn fetch_favorite_sport_counts(&self, favorite: &str) -> SportSweep {
        sports::fetch_favorite_sport_counts(
            &self.fetcher,
            &self.endpoints.medals_sport_url_prefix,
            favorite,
            self.sweep_pause,
        )
    }
}
