use std::sync::Arc;
use time::Date;

/// Invalid strategy parameters or mismatched input series. Always raised before
/// the first period is processed.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("weight for asset A must be within [0, 1], got {0}")]
    WeightOutOfRange(f64),

    #[error("contribution amount must be positive, got {0}")]
    NonPositiveAmount(f64),

    #[error("rebalance frequency must be at least one period")]
    InvalidFrequency,

    #[error("unknown rebalance frequency '{0}'")]
    UnknownFrequency(String),

    #[error("unknown rebalance anchor '{0}'")]
    UnknownAnchor(String),

    #[error("invalid scenario '{0}', expected AMOUNT:WEIGHT_A[:FREQUENCY]")]
    InvalidScenario(String),

    #[error("series lengths differ: {len_a} periods for A, {len_b} for B")]
    LengthMismatch { len_a: usize, len_b: usize },

    #[error("dates differ at period {period}: {date_a} for A, {date_b} for B")]
    DateMismatch {
        period: usize,
        date_a: Date,
        date_b: Date,
    },

    #[error("series '{asset_a}' and '{asset_b}' have no dates in common")]
    NoOverlap { asset_a: Arc<str>, asset_b: Arc<str> },

    #[error("dates of '{asset}' are not strictly increasing at {date}")]
    UnorderedDates { asset: Arc<str>, date: Date },
}

/// A price that cannot be traded on, found while scanning periods.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DataError {
    #[error("non-positive price {price} for '{asset}' on {date}")]
    NonPositivePrice {
        asset: Arc<str>,
        date: Date,
        price: f64,
    },

    #[error("missing price for '{asset}' on {date}")]
    MissingPrice { asset: Arc<str>, date: Date },
}

impl DataError {
    /// Date of the offending period.
    pub fn date(&self) -> Date {
        match self {
            DataError::NonPositivePrice { date, .. } | DataError::MissingPrice { date, .. } => *date,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SimulationError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("data error: {0}")]
    Data(#[from] DataError),
}

pub type Result<T> = std::result::Result<T, SimulationError>;
