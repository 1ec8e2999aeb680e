use thiserror::Error;

/// Errors surfaced by the surety core. Every variant is a synchronous,
/// local rejection of the offending command; no partial state change
/// survives a failure.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SuretyError {
    // Admission errors
    #[error("Funding amount is below the minimum participation fee")]
    InsufficientFunding,
    #[error("Caller is not a registered and funded airline")]
    UnauthorizedAirline,
    #[error("Airline has already been proposed or registered")]
    DuplicateAirline,
    #[error("No such airline candidate")]
    UnknownAirline,
    #[error("Airline is not awaiting votes")]
    AirlineNotPending,
    #[error("Voter has already voted for this candidate")]
    DuplicateVote,

    // Lookup errors
    #[error("No flight registered under this key")]
    FlightNotFound,
    #[error("Flight is already registered")]
    DuplicateFlight,
    #[error("Flight status has already been resolved")]
    FlightAlreadyResolved,

    // Bounds errors
    #[error("Premium must be positive and no greater than the maximum")]
    PremiumOutOfRange,
    #[error("Status code is not a valid flight status")]
    InvalidStatusCode,

    // Oracle protocol errors
    #[error("Caller is not a registered oracle")]
    UnregisteredOracle,
    #[error("Request index is not among the oracle's assigned indexes")]
    IndexMismatch,
    #[error("Oracle has already responded to this request")]
    DuplicateResponse,
    #[error("No open status request matches this index and flight")]
    RequestNotFound,
    #[error("Status request has already reached a terminal state")]
    RequestClosed,

    // Ledger errors
    #[error("Account balance is lower than the requested amount")]
    InsufficientCredit,
    #[error("External payment transfer failed: {0}")]
    PaymentFailed(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
