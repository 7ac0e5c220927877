use serde::{Deserialize, Serialize};

use super::types::Chips;

/// Client-submitted action. Canonical tags are `bet_to`/`raise_to` with a
/// to-amount; the short forms `bet`/`raise` are accepted on input for
/// clients speaking the plain action vocabulary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PlayerAction {
    Fold,
    Check, // only when price_to_call == 0
    Call,  // match current price (or go short all-in)
    #[serde(alias = "bet")]
    BetTo { to: Chips }, // first bet this round (unopened pot)
    #[serde(alias = "raise")]
    RaiseTo { to: Chips },
    AllIn, // engine normalizes to bet/raise/call
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_action_tags_are_accepted_on_input() {
        let bet: PlayerAction = serde_json::from_str(r#"{"action":"bet","to":10}"#).unwrap();
        assert_eq!(bet, PlayerAction::BetTo { to: 10 });
        let raise: PlayerAction = serde_json::from_str(r#"{"action":"raise","to":40}"#).unwrap();
        assert_eq!(raise, PlayerAction::RaiseTo { to: 40 });
        // canonical tags still round-trip
        let json = serde_json::to_string(&PlayerAction::RaiseTo { to: 40 }).unwrap();
        assert_eq!(serde_json::from_str::<PlayerAction>(&json).unwrap(), raise);
    }
}
