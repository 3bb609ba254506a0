//! Collaborators outside the engine: network status, display, sound and
//! wall clock. The scheduler drives them only through these traits.

pub mod host;

use crate::types::{MedalAlertEvent, MedalTableSnapshot, ScheduleSnapshot};

pub trait Connectivity {
    fn is_connected(&mut self) -> bool;
}

/// Draws pages and the alert overlay. Borrowed data must not be retained
/// past the call.
pub trait Renderer {
    fn render_medals(
        &mut self,
        snapshot: &MedalTableSnapshot,
        favorite: &str,
        connected: bool,
        stale: bool,
    );

    fn render_schedule(&mut self, snapshot: &ScheduleSnapshot, connected: bool, stale: bool);

    fn render_alert(&mut self, event: &MedalAlertEvent, favorite: &str);
}

pub trait AlertSound {
    /// Best effort; returns whether anything was played.
    fn play_for_duration(&mut self, max_ms: u64) -> bool;
}

pub trait WallClock {
    /// Seconds since the Unix epoch as the device currently believes it.
    fn epoch_secs(&self) -> i64;

    /// Ask for a time sync. Does not wait for it.
    fn request_sync(&mut self);
}

/// Every collaborator the scheduler talks to.
pub struct Device {
    pub connectivity: Box<dyn Connectivity + Send>,
    pub renderer: Box<dyn Renderer + Send>,
    pub sound: Box<dyn AlertSound + Send>,
    pub clock: Box<dyn WallClock + Send>,
}
