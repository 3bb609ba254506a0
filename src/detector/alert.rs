use tracing::{debug, info};

use crate::detector::classifier::classify;
use crate::state::SportBaseline;
use crate::sync::ScoreSource;
use crate::types::{MedalAlertEvent, MedalTableSnapshot};

/// Build the alert for a favorite-country medal gain between two polls.
///
/// When there is a gain, one sport sweep is run to attribute it and the
/// sweep then becomes the new baseline, whether or not attribution worked.
/// Without a gain nothing is fetched.
pub fn build_favorite_medal_alert<S: ScoreSource + ?Sized>(
    prev: &MedalTableSnapshot,
    curr: &MedalTableSnapshot,
    favorite: &str,
    baseline: &mut SportBaseline,
    source: &S,
) -> Option<MedalAlertEvent> {
    let (medal, delta) = classify(prev, curr)?;
    let mut event = MedalAlertEvent::unattributed(medal, delta);

    let sweep = source.fetch_favorite_sport_counts(favorite);
    match baseline.attribute_and_replace(medal, &sweep) {
        Some(sport) => event.attribute_to(sport),
        None => debug!(
            favorite,
            complete = sweep.complete,
            "No single sport explains the {medal} gain"
        ),
    }

    info!(
        favorite,
        medal = %medal,
        delta,
        sport = %event.sport_code,
        "{favorite} won {delta} {medal} ({})",
        event.sport_name
    );
    Some(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::types::{
        FavoriteView, MedalCounts, MedalType, ScheduleSnapshot, SportCounts, SportSweep,
        PLACEHOLDER_SPORT_CODE, PLACEHOLDER_SPORT_NAME,
    };
    use std::cell::RefCell;

    /// Hands out queued sweeps in order.
    struct Sweeps(RefCell<Vec<SportSweep>>);

    impl Sweeps {
        fn new(mut sweeps: Vec<SportSweep>) -> Self {
            sweeps.reverse();
            Self(RefCell::new(sweeps))
        }

        fn remaining(&self) -> usize {
            self.0.borrow().len()
        }
    }

    impl ScoreSource for Sweeps {
        fn fetch_medal_table(&self, _: &str) -> Result<MedalTableSnapshot> {
            unreachable!()
        }
        fn fetch_daily_schedule(&self, _: &str) -> Result<ScheduleSnapshot> {
            unreachable!()
        }
        fn fetch_favorite_sport_counts(&self, _: &str) -> SportSweep {
            self.0.borrow_mut().pop().expect("unexpected sweep")
        }
    }

    fn table(gold: u16, silver: u16, bronze: u16) -> MedalTableSnapshot {
        MedalTableSnapshot {
            valid: true,
            rows: Default::default(),
            favorite: Some(FavoriteView {
                index: 0,
                gold,
                silver,
                bronze,
                total: gold + silver + bronze,
            }),
        }
    }

    fn sweep(entries: &[(usize, MedalCounts)], complete: bool) -> SportSweep {
        let mut counts: SportCounts = Default::default();
        for &(i, c) in entries {
            counts[i] = c;
        }
        SportSweep { counts, complete }
    }

    #[test]
    fn curling_gold_is_attributed() {
        let source = Sweeps::new(vec![
            sweep(&[(4, MedalCounts::new(0, 0, 0))], true),
            sweep(&[(4, MedalCounts::new(1, 0, 0))], true),
        ]);
        let mut baseline = SportBaseline::new();
        assert!(baseline.prime(&source, "CAN"));

        let (prev, curr) = (table(0, 0, 0), table(1, 0, 0));
        let event =
            build_favorite_medal_alert(&prev, &curr, "CAN", &mut baseline, &source).unwrap();
        assert_eq!(event.medal_type, MedalType::Gold);
        assert_eq!(event.delta, 1);
        assert_eq!(event.sport_code, "CUR");
        assert_eq!(event.sport_name, "Curling");
        assert_eq!(baseline.counts().unwrap()[4], MedalCounts::new(1, 0, 0));
    }

    #[test]
    fn unprimed_baseline_gives_placeholder() {
        let source = Sweeps::new(vec![sweep(&[(4, MedalCounts::new(1, 0, 0))], true)]);
        let mut baseline = SportBaseline::new();

        let (prev, curr) = (table(0, 0, 0), table(1, 0, 0));
        let event =
            build_favorite_medal_alert(&prev, &curr, "CAN", &mut baseline, &source).unwrap();
        assert_eq!(event.sport_code, PLACEHOLDER_SPORT_CODE);
        assert_eq!(event.sport_name, PLACEHOLDER_SPORT_NAME);
        assert!(baseline.is_primed());
    }

    #[test]
    fn incomplete_sweep_gives_placeholder_and_still_replaces() {
        let source = Sweeps::new(vec![
            sweep(&[], true),
            sweep(&[(4, MedalCounts::new(0, 1, 0))], false),
        ]);
        let mut baseline = SportBaseline::new();
        assert!(baseline.prime(&source, "CAN"));

        let (prev, curr) = (table(0, 0, 0), table(0, 1, 0));
        let event =
            build_favorite_medal_alert(&prev, &curr, "CAN", &mut baseline, &source).unwrap();
        assert!(!event.is_attributed());
        assert_eq!(event.medal_type, MedalType::Silver);
        assert_eq!(baseline.counts().unwrap()[4], MedalCounts::new(0, 1, 0));
    }

    #[test]
    fn tie_goes_to_earlier_sport() {
        let source = Sweeps::new(vec![
            sweep(&[], true),
            sweep(&[(1, MedalCounts::new(0, 0, 1)), (3, MedalCounts::new(0, 0, 1))], true),
        ]);
        let mut baseline = SportBaseline::new();
        assert!(baseline.prime(&source, "CAN"));

        let (prev, curr) = (table(0, 0, 0), table(0, 0, 2));
        let event =
            build_favorite_medal_alert(&prev, &curr, "CAN", &mut baseline, &source).unwrap();
        assert_eq!(event.sport_code, "BTH");
        assert_eq!(event.delta, 2);
    }

    #[test]
    fn no_gain_fetches_nothing() {
        let source = Sweeps::new(vec![sweep(&[], true)]);
        let mut baseline = SportBaseline::new();
        let counts = table(1, 1, 1);
        let alert = build_favorite_medal_alert(&counts, &counts, "CAN", &mut baseline, &source);
        assert!(alert.is_none());
        assert_eq!(source.remaining(), 1);
        assert!(!baseline.is_primed());
    }
}
