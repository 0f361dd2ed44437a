use thiserror::Error;

/// Outcomes of trade planning that are not a remote failure.
///
/// `NoViableTrade` and `NoRoute` mean "nothing to do" and are expected during normal operation.
/// `Data` means the market or ship data we were given cannot be reasoned about.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TradeError {
    #[error("invalid data: {0}")]
    Data(String),

    #[error("no viable trade: {0}")]
    NoViableTrade(String),

    #[error("no route: {0}")]
    NoRoute(String),
}
