use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, FixedOffset, Local};
use tracing::{debug, info, warn};

use crate::config::timing::{
    ALERT_AUDIO_MS, ALERT_POPUP_MS, LOOP_PAUSE_MS, MEDALS_POLL_INTERVAL_MS, PAGE_ROTATE_INTERVAL_MS,
    SCHEDULE_POLL_INTERVAL_MS, STALE_AFTER_MS, TIME_SYNC_RETRY_MS,
};
use crate::config::{Config, PLAUSIBLE_EPOCH_SECS};
use crate::detector::build_favorite_medal_alert;
use crate::device::Device;
use crate::state::{AlertQueue, SportBaseline};
use crate::sync::ScoreSource;
use crate::types::{MedalAlertEvent, MedalTableSnapshot, ScheduleSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Medals,
    Schedule,
}

impl std::fmt::Display for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Page::Medals => "medals",
            Page::Schedule => "schedule",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub favorite: String,
    pub schedule_utc_offset: Option<FixedOffset>,
    pub fallback_schedule_date: String,
}

impl SchedulerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            favorite: config.favorite_country.clone(),
            schedule_utc_offset: config.schedule_utc_offset,
            fallback_schedule_date: config.fallback_schedule_date.clone(),
        }
    }
}

struct ActiveAlert {
    event: MedalAlertEvent,
    expires_at: u64,
}

/// The cooperative control loop: polling, alert dispatch, page rotation.
///
/// All times are milliseconds of a monotonic clock supplied by the caller.
/// Every piece of engine state lives here and is only touched from `tick`.
pub struct Scheduler<S> {
    source: S,
    device: Device,
    settings: SchedulerSettings,

    medals: MedalTableSnapshot,
    schedule: ScheduleSnapshot,
    baseline: SportBaseline,
    queue: AlertQueue,

    page: Page,
    alert: Option<ActiveAlert>,
    needs_render: bool,
    connected: bool,

    // `None` means due now.
    last_medal_attempt: Option<u64>,
    last_schedule_attempt: Option<u64>,
    last_time_sync_request: Option<u64>,
    // `None` means never, which counts as stale.
    last_medal_success: Option<u64>,
    last_schedule_success: Option<u64>,
    last_rotate: u64,
}

impl<S: ScoreSource> Scheduler<S> {
    pub fn new(source: S, device: Device, settings: SchedulerSettings) -> Self {
        Self {
            source,
            device,
            settings,
            medals: MedalTableSnapshot::default(),
            schedule: ScheduleSnapshot::default(),
            baseline: SportBaseline::new(),
            queue: AlertQueue::new(),
            page: Page::Medals,
            alert: None,
            needs_render: false,
            connected: false,
            last_medal_attempt: None,
            last_schedule_attempt: None,
            last_time_sync_request: None,
            last_medal_success: None,
            last_schedule_success: None,
            last_rotate: 0,
        }
    }

    /// Run until `shutdown` is raised.
    pub fn run(&mut self, shutdown: &AtomicBool) {
        let started = Instant::now();
        let now = || started.elapsed().as_millis() as u64;

        self.boot(now());
        info!(favorite = %self.settings.favorite, "Scoreboard running");
        while !shutdown.load(Ordering::Relaxed) {
            self.tick(now());
            std::thread::sleep(Duration::from_millis(LOOP_PAUSE_MS));
        }
        info!("Scoreboard stopped");
    }

    /// First polls and the initial medals page.
    pub fn boot(&mut self, now: u64) {
        self.connected = self.device.connectivity.is_connected();
        if self.connected {
            self.ensure_time_synced(now);
            if !self.poll_medals(now) {
                self.last_medal_attempt = None;
            }
            if !self.poll_schedule(now) {
                self.last_schedule_attempt = None;
            }
        } else {
            warn!("Booting without network");
        }

        self.page = Page::Medals;
        self.render_current_page(now);
        self.last_rotate = now;
    }

    /// One pass of the control loop.
    pub fn tick(&mut self, now: u64) {
        let connected = self.device.connectivity.is_connected();
        let connectivity_changed = connected != self.connected;
        self.connected = connected;

        if connected {
            self.ensure_time_synced(now);
            if is_due(self.last_medal_attempt, now, MEDALS_POLL_INTERVAL_MS) {
                self.poll_medals(now);
            }
            if is_due(self.last_schedule_attempt, now, SCHEDULE_POLL_INTERVAL_MS) {
                self.poll_schedule(now);
            }
        }

        self.maybe_show_alert(now);

        if let Some(active) = self.alert.as_ref().filter(|a| now >= a.expires_at) {
            debug!(
                medal = %active.event.medal_type,
                sport = %active.event.sport_code,
                page = %self.page,
                "Alert finished"
            );
            self.alert = None;
            self.render_current_page(now);
            self.last_rotate = now;
        }

        if connectivity_changed && self.alert.is_none() {
            self.needs_render = true;
        }

        if self.alert.is_none() {
            if is_due(Some(self.last_rotate), now, PAGE_ROTATE_INTERVAL_MS) {
                self.toggle_page(now);
            } else if self.needs_render {
                self.render_current_page(now);
            }
        }
    }

    /// Fetch the medal table. On success, compare with the previous table,
    /// queue any alert, and prime the sport baseline if it is not yet primed.
    pub fn poll_medals(&mut self, now: u64) -> bool {
        self.last_medal_attempt = Some(now);
        let favorite = self.settings.favorite.as_str();

        let snapshot = match self.source.fetch_medal_table(favorite) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "Medal poll failed: {e}");
                return false;
            }
        };

        if self.medals.valid {
            let alert = build_favorite_medal_alert(
                &self.medals,
                &snapshot,
                favorite,
                &mut self.baseline,
                &self.source,
            );
            if let Some(event) = alert {
                if let Some(dropped) = self.queue.enqueue(event) {
                    warn!(
                        medal = %dropped.medal_type,
                        sport = %dropped.sport_code,
                        "Alert queue full, dropped oldest alert"
                    );
                }
            }
        }

        let counts = snapshot.favorite_counts();
        debug!(
            rows = snapshot.rows.len(),
            gold = counts.gold,
            silver = counts.silver,
            bronze = counts.bronze,
            "Medal poll ok"
        );
        self.medals = snapshot;
        self.last_medal_success = Some(now);

        if !self.baseline.is_primed() {
            self.baseline.prime(&self.source, favorite);
        }
        if self.alert.is_none() {
            self.needs_render = true;
        }
        true
    }

    pub fn poll_schedule(&mut self, now: u64) -> bool {
        self.last_schedule_attempt = Some(now);
        let date = today_ymd(
            self.device.clock.epoch_secs(),
            self.settings.schedule_utc_offset,
            &self.settings.fallback_schedule_date,
        );

        match self.source.fetch_daily_schedule(&date) {
            Ok(snapshot) => {
                debug!(date = %date, rows = snapshot.rows.len(), "Schedule poll ok");
                self.schedule = snapshot;
                self.last_schedule_success = Some(now);
                if self.alert.is_none() {
                    self.needs_render = true;
                }
                true
            }
            Err(e) => {
                warn!(date = %date, error = %e, "Schedule poll failed: {e}");
                false
            }
        }
    }

    /// Whether the wall clock is trustworthy. Requests a sync, at most every
    /// `TIME_SYNC_RETRY_MS`, while it is not.
    pub fn ensure_time_synced(&mut self, now: u64) -> bool {
        if self.device.clock.epoch_secs() > PLAUSIBLE_EPOCH_SECS {
            return true;
        }
        if is_due(self.last_time_sync_request, now, TIME_SYNC_RETRY_MS) {
            info!("Wall clock not set, requesting time sync");
            self.device.clock.request_sync();
            self.last_time_sync_request = Some(now);
        }
        false
    }

    /// Show the next queued alert if none is on screen.
    pub fn maybe_show_alert(&mut self, now: u64) {
        if self.alert.is_some() {
            return;
        }
        let Some(event) = self.queue.dequeue() else {
            return;
        };

        let favorite = self.settings.favorite.as_str();
        info!(
            medal = %event.medal_type,
            delta = event.delta,
            sport = %event.sport_code,
            "Showing medal alert"
        );
        if !self.queue.is_empty() {
            debug!(pending = self.queue.len(), "More alerts waiting");
        }
        self.device.renderer.render_alert(&event, favorite);
        if !self.device.sound.play_for_duration(ALERT_AUDIO_MS) {
            debug!("Alert sound unavailable");
        }
        self.alert = Some(ActiveAlert {
            event,
            expires_at: now + ALERT_POPUP_MS.max(ALERT_AUDIO_MS),
        });
    }

    fn toggle_page(&mut self, now: u64) {
        self.page = match self.page {
            Page::Medals => Page::Schedule,
            Page::Schedule => Page::Medals,
        };
        self.render_current_page(now);
        self.last_rotate = now;
    }

    fn render_current_page(&mut self, now: u64) {
        match self.page {
            Page::Medals => {
                let stale = self.medals_stale(now);
                self.device
                    .renderer
                    .render_medals(&self.medals, &self.settings.favorite, self.connected, stale);
            }
            Page::Schedule => {
                let stale = self.schedule_stale(now);
                self.device
                    .renderer
                    .render_schedule(&self.schedule, self.connected, stale);
            }
        }
        self.needs_render = false;
    }

    pub fn medals_stale(&self, now: u64) -> bool {
        is_stale(self.last_medal_success, now)
    }

    pub fn schedule_stale(&self, now: u64) -> bool {
        is_stale(self.last_schedule_success, now)
    }

    pub fn page(&self) -> Page {
        self.page
    }

    #[cfg(test)]
    fn medals(&self) -> &MedalTableSnapshot {
        &self.medals
    }

    #[cfg(test)]
    fn baseline(&self) -> &SportBaseline {
        &self.baseline
    }

    #[cfg(test)]
    fn active_alert(&self) -> Option<&MedalAlertEvent> {
        self.alert.as_ref().map(|a| &a.event)
    }

    #[cfg(test)]
    fn pending_alerts(&self) -> usize {
        self.queue.len()
    }

    #[cfg(test)]
    fn source(&self) -> &S {
        &self.source
    }
}

fn is_due(last: Option<u64>, now: u64, interval_ms: u64) -> bool {
    last.map_or(true, |at| now.saturating_sub(at) >= interval_ms)
}

fn is_stale(last_success: Option<u64>, now: u64) -> bool {
    last_success.map_or(true, |at| now.saturating_sub(at) > STALE_AFTER_MS)
}

/// Calendar date (`YYYY-MM-DD`) of `epoch_secs` in the given zone, or the
/// local zone. Before the clock is synced this is `fallback`.
pub fn today_ymd(epoch_secs: i64, offset: Option<FixedOffset>, fallback: &str) -> String {
    if epoch_secs <= PLAUSIBLE_EPOCH_SECS {
        return fallback.to_string();
    }
    let Some(utc) = DateTime::from_timestamp(epoch_secs, 0) else {
        return fallback.to_string();
    };
    match offset {
        Some(offset) => utc.with_timezone(&offset).format("%Y-%m-%d").to_string(),
        None => utc.with_timezone(&Local).format("%Y-%m-%d").to_string(),
    }
}
