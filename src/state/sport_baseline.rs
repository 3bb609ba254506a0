use tracing::{debug, info};

use crate::sync::ScoreSource;
use crate::types::{MedalType, SportCounts, SportSweep, WinterSport, WINTER_SPORTS};

/// Last observed per-sport counts for the favorite country.
///
/// Unprimed until the first complete sweep lands. After that it is only ever
/// replaced, never cleared.
#[derive(Debug, Default)]
pub struct SportBaseline {
    counts: Option<SportCounts>,
}

impl SportBaseline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_primed(&self) -> bool {
        self.counts.is_some()
    }

    #[cfg(test)]
    pub fn counts(&self) -> Option<&SportCounts> {
        self.counts.as_ref()
    }

    /// Run one sweep and keep it only if every sport answered.
    pub fn prime<S: ScoreSource + ?Sized>(&mut self, source: &S, favorite: &str) -> bool {
        let sweep = source.fetch_favorite_sport_counts(favorite);
        if !sweep.complete {
            debug!(favorite, "Sport baseline not primed: sweep incomplete");
            return false;
        }
        self.counts = Some(sweep.counts);
        info!(favorite, "Sport baseline primed");
        true
    }

    /// Find the sport whose `medal` count grew most since the baseline, then
    /// adopt `sweep` as the new baseline.
    ///
    /// Attribution needs a primed baseline and a complete sweep; on ties the
    /// earlier sport wins. The baseline is replaced either way.
    pub fn attribute_and_replace(
        &mut self,
        medal: MedalType,
        sweep: &SportSweep,
    ) -> Option<&'static WinterSport> {
        let winner = match (&self.counts, sweep.complete) {
            (Some(baseline), true) => largest_gain(baseline, &sweep.counts, medal),
            _ => None,
        };
        self.counts = Some(sweep.counts);
        winner
    }
}

fn largest_gain(
    baseline: &SportCounts,
    latest: &SportCounts,
    medal: MedalType,
) -> Option<&'static WinterSport> {
    let mut best: Option<(usize, i32)> = None;
    for (i, (before, after)) in baseline.iter().zip(latest.iter()).enumerate() {
        let gain = i32::from(after.get(medal)) - i32::from(before.get(medal));
        if gain > 0 && best.map_or(true, |(_, b)| gain > b) {
            best = Some((i, gain));
        }
    }
    best.map(|(i, _)| &WINTER_SPORTS[i])
}
