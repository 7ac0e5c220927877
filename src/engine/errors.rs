use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("hand is already complete")]
    HandAlreadyComplete,
    #[error("not this seat's turn to act")]
    NotYourTurn,
    #[error("actor cannot act (folded or all-in)")]
    ActorCannotAct,
    #[error("action is not legal in the current state")]
    InvalidAction,
    #[error("cannot check while facing a bet")]
    CannotCheckFacingBet,
    #[error("cannot bet once the pot is opened")]
    CannotBetWhenOpened,
    #[error("raise is below the legal minimum")]
    RaiseBelowMinimum,
    #[error("raise cap for this street has been reached")]
    RaiseCapReached,
    #[error("amount exceeds the legal maximum for this betting mode")]
    AmountOutOfRange,
    #[error("insufficient chips")]
    InsufficientChips,
    #[error("unknown seat")]
    UnknownSeat,
}

impl ActionError {
    /// Stable wire code reported to clients.
    pub fn code(&self) -> &'static str {
        match self {
            ActionError::HandAlreadyComplete => "HAND_ALREADY_COMPLETE",
            ActionError::NotYourTurn => "NOT_YOUR_TURN",
            ActionError::ActorCannotAct => "ACTOR_CANNOT_ACT",
            ActionError::InvalidAction => "INVALID_ACTION",
            ActionError::CannotCheckFacingBet => "INVALID_ACTION",
            ActionError::CannotBetWhenOpened => "INVALID_ACTION",
            ActionError::RaiseBelowMinimum => "INVALID_ACTION",
            ActionError::RaiseCapReached => "RAISE_CAP_REACHED",
            ActionError::AmountOutOfRange => "INVALID_ACTION",
            ActionError::InsufficientChips => "INSUFFICIENT_CHIPS",
            ActionError::UnknownSeat => "INVALID_ACTION",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("invalid state transition")]
    InvalidTransition,
    #[error("need at least two players to start a hand")]
    NotEnoughPlayers,
    #[error("deck exhausted")]
    DeckExhausted,
    #[error("invariant violation: {0}")]
    InvariantViolation(&'static str),
}

pub trait InvariantCheck {
    fn validate_invariants(&self) -> Result<(), StateError>;
}
