//! Error types for the exchange core.

use crate::dec::Dec;
use crate::types::{Address, Amount, Coin};

/// Stable categorical classification of errors, independent of variant names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed denom, non-positive quantity, price out of range, bad route.
    InvalidArgument,
    /// Market, order or route does not exist.
    NotFound,
    /// Duplicate market pair.
    AlreadyExists,
    /// Cancel by someone other than the orderer.
    Unauthorized,
    /// Caller or escrow cannot be debited.
    InsufficientFunds,
    /// Swap output below the requested minimum.
    InsufficientOutput,
    /// Empty opposite side. Market orders report it as zero execution, so no
    /// error carries this kind today.
    NoLiquidity,
    /// Host metering budget exhausted; the host rolls the request back.
    OutOfGas,
    /// Invariant violation.
    Internal,
}

/// Errors returned by exchange operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExchangeError {
    #[error("invalid denom: {0}")]
    InvalidDenom(String),

    #[error("invalid coin: {0}")]
    InvalidCoin(String),

    #[error("invalid pair: {0}")]
    InvalidPair(String),

    #[error("market {market_id} already exists for {base_denom}/{quote_denom}")]
    DuplicateMarket {
        market_id: u64,
        base_denom: String,
        quote_denom: String,
    },

    #[error("market not found: {0}")]
    MarketNotFound(u64),

    #[error("order not found: {0}")]
    OrderNotFound(u64),

    #[error("{sender} is not the orderer of order {order_id}")]
    Unauthorized { order_id: u64, sender: Address },

    #[error("insufficient funds: {address} has {available}{denom}, needs {required}{denom}")]
    InsufficientFunds {
        address: Address,
        denom: String,
        available: Amount,
        required: Amount,
    },

    #[error("price out of range: {0}")]
    InvalidPrice(Dec),

    #[error("quantity must be positive: {0}")]
    InvalidQuantity(Amount),

    #[error("lifespan must be positive")]
    InvalidLifespan,

    #[error("invalid route: {0}")]
    InvalidRoute(String),

    #[error("no possible routes: {0}")]
    RouteNotFound(String),

    #[error("insufficient output: {output} < {min_output}")]
    InsufficientOutput { output: Coin, min_output: Coin },

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("arithmetic overflow computing {0}")]
    Overflow(&'static str),

    #[error("out of gas: limit {limit}, wanted {wanted}")]
    OutOfGas { limit: u64, wanted: u64 },

    #[error("internal error: {0}")]
    Internal(String),
}

impl ExchangeError {
    /// The categorical kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExchangeError::InvalidDenom(_)
            | ExchangeError::InvalidCoin(_)
            | ExchangeError::InvalidPair(_)
            | ExchangeError::InvalidPrice(_)
            | ExchangeError::InvalidQuantity(_)
            | ExchangeError::InvalidLifespan
            | ExchangeError::InvalidRoute(_)
            | ExchangeError::InvalidParams(_)
            | ExchangeError::InvalidRequest(_)
            | ExchangeError::Overflow(_) => ErrorKind::InvalidArgument,
            ExchangeError::MarketNotFound(_)
            | ExchangeError::OrderNotFound(_)
            | ExchangeError::RouteNotFound(_) => ErrorKind::NotFound,
            ExchangeError::DuplicateMarket { .. } => ErrorKind::AlreadyExists,
            ExchangeError::Unauthorized { .. } => ErrorKind::Unauthorized,
            ExchangeError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            ExchangeError::InsufficientOutput { .. } => ErrorKind::InsufficientOutput,
            ExchangeError::OutOfGas { .. } => ErrorKind::OutOfGas,
            ExchangeError::Internal(_) => ErrorKind::Internal,
        }
    }
}

pub type Result<T, E = ExchangeError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::U256;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            ExchangeError::InvalidQuantity(U256::ZERO).kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(ExchangeError::MarketNotFound(7).kind(), ErrorKind::NotFound);
        assert_eq!(
            ExchangeError::DuplicateMarket {
                market_id: 1,
                base_denom: "uatom".into(),
                quote_denom: "uusd".into(),
            }
            .kind(),
            ErrorKind::AlreadyExists
        );
        assert_eq!(
            ExchangeError::InsufficientOutput {
                output: Coin::from_u128("uusd", 1),
                min_output: Coin::from_u128("uusd", 2),
            }
            .kind(),
            ErrorKind::InsufficientOutput
        );
        assert_eq!(
            ExchangeError::OutOfGas { limit: 1, wanted: 2 }.kind(),
            ErrorKind::OutOfGas
        );
    }

    #[test]
    fn test_error_display() {
        let err = ExchangeError::InsufficientOutput {
            output: Coin::from_u128("uusdc", 8),
            min_output: Coin::from_u128("uusdc", 9),
        };
        assert_eq!(err.to_string(), "insufficient output: 8uusdc < 9uusdc");
    }
}
