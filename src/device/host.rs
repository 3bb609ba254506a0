//! Workstation stand-ins for the device collaborators.

use std::io::Write;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, FixedOffset, Local};
use tracing::{debug, info, warn};

use crate::device::{AlertSound, Connectivity, Renderer, WallClock};
use crate::types::{MedalAlertEvent, MedalTableSnapshot, ScheduleSnapshot};

// ---------------------------------------------------------------------------
// Connectivity
// ---------------------------------------------------------------------------

/// Reachability by opening a TCP connection to `target`, reused for `cache`.
pub struct TcpReachability {
    target: String,
    timeout: Duration,
    cache: Duration,
    last: Option<(Instant, bool)>,
}

impl TcpReachability {
    pub fn new(target: String, timeout: Duration, cache: Duration) -> Self {
        Self {
            target,
            timeout,
            cache,
            last: None,
        }
    }

    fn try_connect(&self) -> bool {
        let addr = match self.target.to_socket_addrs().map(|mut a| a.next()) {
            Ok(Some(addr)) => addr,
            Ok(None) => return false,
            Err(e) => {
                debug!(target = %self.target, error = %e, "Connectivity target did not resolve");
                return false;
            }
        };
        TcpStream::connect_timeout(&addr, self.timeout).is_ok()
    }
}

impl Connectivity for TcpReachability {
    fn is_connected(&mut self) -> bool {
        if let Some((at, connected)) = self.last {
            if at.elapsed() < self.cache {
                return connected;
            }
        }
        let connected = self.try_connect();
        let previous = self.last.map(|(_, c)| c);
        if previous != Some(connected) {
            if connected {
                info!(target = %self.target, "Network reachable");
            } else {
                warn!(target = %self.target, "Network unreachable");
            }
        }
        self.last = Some((Instant::now(), connected));
        connected
    }
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// Renders pages as structured log lines.
pub struct LogRenderer {
    utc_offset: Option<FixedOffset>,
}

impl LogRenderer {
    pub fn new(utc_offset: Option<FixedOffset>) -> Self {
        Self { utc_offset }
    }

    /// `HH:MM` start time in the configured zone, or the local zone.
    pub fn format_start(&self, epoch: i64) -> String {
        let Some(utc) = DateTime::from_timestamp(epoch, 0) else {
            return "--:--".to_string();
        };
        match self.utc_offset {
            Some(offset) => utc.with_timezone(&offset).format("%H:%M").to_string(),
            None => utc.with_timezone(&Local).format("%H:%M").to_string(),
        }
    }
}

impl Renderer for LogRenderer {
    fn render_medals(
        &mut self,
        snapshot: &MedalTableSnapshot,
        favorite: &str,
        connected: bool,
        stale: bool,
    ) {
        let counts = snapshot.favorite_counts();
        let favorite_row = snapshot.favorite_row();
        info!(
            page = "medals",
            rows = snapshot.rows.len(),
            connected,
            stale,
            favorite,
            rank = favorite_row.map_or(0, |row| row.rank),
            gold = counts.gold,
            silver = counts.silver,
            bronze = counts.bronze,
            total = snapshot.favorite_total(),
            "Medal table{}",
            if stale { " (stale)" } else { "" }
        );
        for row in &snapshot.rows {
            let is_favorite = favorite_row.is_some_and(|fav| std::ptr::eq(fav, row));
            let marker = if is_favorite { "*" } else { " " };
            info!(
                "{marker}{:>3} {:<4} {:>3} {:>3} {:>3} {:>4}",
                row.rank, row.country_code, row.gold, row.silver, row.bronze, row.total
            );
        }
    }

    fn render_schedule(&mut self, snapshot: &ScheduleSnapshot, connected: bool, stale: bool) {
        info!(
            page = "schedule",
            date = %snapshot.date_ymd,
            rows = snapshot.rows.len(),
            connected,
            stale,
            "Schedule{}",
            if stale { " (stale)" } else { "" }
        );
        for row in &snapshot.rows {
            let live = if row.is_live() { "LIVE" } else { "" };
            let medal = if row.is_medal_session { "M" } else { " " };
            info!(
                "{} {medal} {:<4} {} {live}",
                self.format_start(row.start_epoch),
                row.sport_code,
                row.title
            );
        }
    }

    fn render_alert(&mut self, event: &MedalAlertEvent, favorite: &str) {
        info!(
            page = "alert",
            favorite,
            medal = %event.medal_type,
            delta = event.delta,
            sport = %event.sport_code,
            "{}",
            alert_headline(event, favorite)
        );
    }
}

fn alert_headline(event: &MedalAlertEvent, favorite: &str) -> String {
    if event.is_attributed() {
        format!("{favorite} +{} {} in {}", event.delta, event.medal_type, event.sport_name)
    } else {
        format!("{favorite} +{} {} ({})", event.delta, event.medal_type, event.sport_name)
    }
}

// ---------------------------------------------------------------------------
// Sound
// ---------------------------------------------------------------------------

/// Rings the terminal bell once per alert.
#[derive(Default)]
pub struct TerminalBell;

impl AlertSound for TerminalBell {
    fn play_for_duration(&mut self, max_ms: u64) -> bool {
        let mut err = std::io::stderr();
        match err.write_all(b"\x07").and_then(|_| err.flush()) {
            Ok(()) => {
                debug!(max_ms, "Alert bell");
                true
            }
            Err(e) => {
                debug!(error = %e, "Alert bell failed");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Wall clock
// ---------------------------------------------------------------------------

/// The host system clock. Sync is left to the operating system.
#[derive(Default)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn epoch_secs(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }

    fn request_sync(&mut self) {
        debug!("Time sync requested; host clock is managed by the OS");
    }
}
