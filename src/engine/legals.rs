use serde::{Deserialize, Serialize};

use super::types::Chips;

/// Legal-action summary for the acting seat. Ranges are inclusive `to`
/// amounts (the player's total committed this street after the action).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegalActions {
    pub may_fold: bool,
    pub may_check: bool,
    pub call_amount: Option<Chips>,
    pub bet_to_range: Option<std::ops::RangeInclusive<Chips>>,
    pub raise_to_range: Option<std::ops::RangeInclusive<Chips>>,
}

impl LegalActions {
    pub fn none() -> Self {
        Self::default()
    }
}
