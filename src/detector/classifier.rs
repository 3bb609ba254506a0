use crate::types::{MedalTableSnapshot, MedalType};

/// Classify the favorite country's change between two polls.
///
/// Returns the highest-priority category (gold, then silver, then bronze)
/// whose count went up, with that category's own increase. Gains in lower
/// categories during the same poll are not reported. `None` when either
/// snapshot is invalid or nothing went up.
pub fn classify(prev: &MedalTableSnapshot, curr: &MedalTableSnapshot) -> Option<(MedalType, u16)> {
    if !prev.valid || !curr.valid {
        return None;
    }
    let before = prev.favorite_counts();
    let after = curr.favorite_counts();

    [MedalType::Gold, MedalType::Silver, MedalType::Bronze]
        .into_iter()
        .find_map(|medal| {
            let delta = after.get(medal).saturating_sub(before.get(medal));
            (delta > 0).then_some((medal, delta))
        })
}
