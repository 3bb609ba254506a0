use heapless::Vec as BoundedVec;

use crate::config::{MAX_MEDAL_ROWS, MAX_SCHEDULE_ROWS, WINTER_SPORT_COUNT};

// ---------------------------------------------------------------------------
// Medal categories and counts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MedalType {
    Gold,
    Silver,
    Bronze,
}

impl std::fmt::Display for MedalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MedalType::Gold => "gold",
            MedalType::Silver => "silver",
            MedalType::Bronze => "bronze",
        };
        write!(f, "{s}")
    }
}

/// Gold/silver/bronze for one country, either overall or within one sport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MedalCounts {
    pub gold: u16,
    pub silver: u16,
    pub bronze: u16,
}

impl MedalCounts {
    pub const fn new(gold: u16, silver: u16, bronze: u16) -> Self {
        Self { gold, silver, bronze }
    }

    /// Count for one category.
    pub fn get(&self, medal: MedalType) -> u16 {
        match medal {
            MedalType::Gold => self.gold,
            MedalType::Silver => self.silver,
            MedalType::Bronze => self.bronze,
        }
    }
}

// ---------------------------------------------------------------------------
// Medal table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MedalRow {
    /// Upper-cased, trimmed NOC code. Unique within a snapshot.
    pub country_code: String,
    pub country_name: String,
    pub flag_url_small: Option<String>,
    pub flag_url_medium: Option<String>,
    pub gold: u16,
    pub silver: u16,
    pub bronze: u16,
    pub total: u16,
    pub rank: u16,
}

/// Denormalized copy of the favorite country's row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FavoriteView {
    /// Position of the favorite in `MedalTableSnapshot::rows`.
    pub index: usize,
    pub gold: u16,
    pub silver: u16,
    pub bronze: u16,
    pub total: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MedalTableSnapshot {
    pub valid: bool,
    /// Rank order as received.
    pub rows: BoundedVec<MedalRow, MAX_MEDAL_ROWS>,
    /// `None` when the favorite country is not in `rows`.
    pub favorite: Option<FavoriteView>,
}

impl MedalTableSnapshot {
    /// Favorite country's medals, zero when it has none listed.
    pub fn favorite_counts(&self) -> MedalCounts {
        self.favorite
            .map(|f| MedalCounts::new(f.gold, f.silver, f.bronze))
            .unwrap_or_default()
    }

    pub fn favorite_total(&self) -> u16 {
        self.favorite.map(|f| f.total).unwrap_or(0)
    }

    pub fn favorite_row(&self) -> Option<&MedalRow> {
        self.favorite.and_then(|f| self.rows.get(f.index))
    }
}

// ---------------------------------------------------------------------------
// Daily schedule
// ---------------------------------------------------------------------------

pub const DEFAULT_SPORT_CODE: &str = "---";
pub const DEFAULT_SPORT_NAME: &str = "Olympics";

/// Longest sport code kept on a schedule row.
pub const SPORT_CODE_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompetitionRow {
    /// Unix seconds, always > 0.
    pub start_epoch: i64,
    pub status: String,
    pub sport_code: String,
    pub sport_name: String,
    pub title: String,
    pub is_medal_session: bool,
}

impl CompetitionRow {
    pub fn is_live(&self) -> bool {
        self.status.eq_ignore_ascii_case("live")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleSnapshot {
    pub valid: bool,
    /// Date key the snapshot was requested for.
    pub date_ymd: String,
    /// Ascending by `start_epoch`.
    pub rows: BoundedVec<CompetitionRow, MAX_SCHEDULE_ROWS>,
}

// ---------------------------------------------------------------------------
// Winter sports used for attribution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WinterSport {
    pub code: &'static str,
    pub name: &'static str,
}

pub static WINTER_SPORTS: [WinterSport; WINTER_SPORT_COUNT] = [
    WinterSport { code: "ALP", name: "Alpine Skiing" },
    WinterSport { code: "BTH", name: "Biathlon" },
    WinterSport { code: "BOB", name: "Bobsled" },
    WinterSport { code: "CCS", name: "Cross-Country Skiing" },
    WinterSport { code: "CUR", name: "Curling" },
    WinterSport { code: "FSK", name: "Figure Skating" },
    WinterSport { code: "FRS", name: "Freestyle Skiing" },
    WinterSport { code: "IHO", name: "Hockey" },
    WinterSport { code: "LUG", name: "Luge" },
    WinterSport { code: "NCB", name: "Nordic Combined" },
    WinterSport { code: "SBD", name: "Snowboarding" },
    WinterSport { code: "SKN", name: "Skeleton" },
    WinterSport { code: "SJP", name: "Ski Jumping" },
    WinterSport { code: "SMT", name: "Ski Mountaineering" },
    WinterSport { code: "SSK", name: "Speed Skating" },
    WinterSport { code: "STK", name: "Short Track" },
];

/// Per-sport counts for the favorite country, indexed like `WINTER_SPORTS`.
pub type SportCounts = [MedalCounts; WINTER_SPORT_COUNT];

/// Result of one pass over every per-sport resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SportSweep {
    pub counts: SportCounts,
    /// False if any single sport failed; its slot then holds zeros.
    pub complete: bool,
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

pub const PLACEHOLDER_SPORT_CODE: &str = "---";
pub const PLACEHOLDER_SPORT_NAME: &str = "Olympic Event";

/// A detected medal increase for the favorite country. Only built when one
/// happened, so there is no invalid state to carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MedalAlertEvent {
    pub medal_type: MedalType,
    /// New medals of `medal_type` since the previous poll.
    pub delta: u16,
    pub sport_code: String,
    pub sport_name: String,
}

impl MedalAlertEvent {
    pub fn unattributed(medal_type: MedalType, delta: u16) -> Self {
        Self {
            medal_type,
            delta,
            sport_code: PLACEHOLDER_SPORT_CODE.to_string(),
            sport_name: PLACEHOLDER_SPORT_NAME.to_string(),
        }
    }

    pub fn attribute_to(&mut self, sport: &WinterSport) {
        self.sport_code = sport.code.to_string();
        self.sport_name = sport.name.to_string();
    }

    pub fn is_attributed(&self) -> bool {
        self.sport_code != PLACEHOLDER_SPORT_CODE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn favorite_counts_are_zero_without_favorite() {
        let snap = MedalTableSnapshot { valid: true, ..Default::default() };
        assert_eq!(snap.favorite_counts(), MedalCounts::default());
        assert_eq!(snap.favorite_total(), 0);
        assert!(snap.favorite_row().is_none());
    }

    #[test]
    fn live_status_is_case_insensitive() {
        let row = CompetitionRow {
            start_epoch: 1,
            status: "LIVE".to_string(),
            sport_code: "CUR".to_string(),
            sport_name: "Curling".to_string(),
            title: "Curling".to_string(),
            is_medal_session: false,
        };
        assert!(row.is_live());
    }

    #[test]
    fn attribution_replaces_placeholder() {
        let mut ev = MedalAlertEvent::unattributed(MedalType::Gold, 1);
        assert!(!ev.is_attributed());
        ev.attribute_to(&WINTER_SPORTS[4]);
        assert_eq!(ev.sport_code, "CUR");
        assert_eq!(ev.sport_name, "Curling");
        assert!(ev.is_attributed());
    }
}
