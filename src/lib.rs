//! Dollar-cost-averaging simulation over two assets with optional calendar
//! rebalancing.
//!
//! Price histories are loaded and gap-filled with polars ([`input_handler`],
//! [`gap_fill`]), segmented into monthly periods ([`periods`]) and fed to the
//! [`simulator`], which produces one [`PortfolioSnapshot`] per period.

pub mod config;
pub mod error;
pub mod gap_fill;
pub mod input_handler;
pub mod metrics;
pub mod periods;
pub mod rebalancer;
pub mod simulator;

#[cfg(feature = "python")]
mod python;

pub use config::{parse_frequency, RebalanceAnchor, StrategyConfig};
pub use error::{ConfigurationError, DataError, SimulationError};
pub use gap_fill::FillMethod;
pub use metrics::DcaMetrics;
pub use rebalancer::Rebalancer;
pub use simulator::{
    simulate, DcaSimulator, Holdings, PortfolioSnapshot, PricePoint, PriceSeries,
};
