use thiserror::Error;

#[derive(Debug, Error)]
pub enum TradeError {
    #[error("trade session not found")]
    NotFound,
    #[error("participants must be within {0} world units to initiate a trade")]
    TooFarApart(f64),
    #[error("a participant already holds a non-terminal trade session")]
    AlreadyTrading,
    #[error("trade is not in a state that allows this operation")]
    InvalidState,
    #[error("caller is not a participant in this trade")]
    NotAParticipant,
    #[error("insufficient credits to cover the offer")]
    InsufficientCredits,
    #[error("insufficient item quantity to cover the offer")]
    InsufficientItems,
    #[error("trade session has expired")]
    Expired,
}
