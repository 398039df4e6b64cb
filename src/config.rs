use std::fmt;
use std::str::FromStr;

use crate::error::ConfigurationError;

/// Which periods count toward the rebalance interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RebalanceAnchor {
    /// Periods N, 2N, 3N, ... (period N itself is the first rebalance).
    #[default]
    EveryNth,
    /// Periods 1, 1 + N, 1 + 2N, ...
    FromFirst,
}

impl FromStr for RebalanceAnchor {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "every_nth" | "every-nth" => Ok(RebalanceAnchor::EveryNth),
            "from_first" | "from-first" => Ok(RebalanceAnchor::FromFirst),
            other => Err(ConfigurationError::UnknownAnchor(other.to_string())),
        }
    }
}

/// Parses a rebalance frequency into a count of monthly periods.
///
/// Accepts the calendar names `monthly`, `quarterly`, `semiannually` and
/// `annually`, or a bare positive integer.
pub fn parse_frequency(s: &str) -> Result<usize, ConfigurationError> {
    let s = s.trim().to_ascii_lowercase();
    let periods = match s.as_str() {
        "monthly" => 1,
        "quarterly" => 3,
        "semiannually" => 6,
        "annually" => 12,
        other => other
            .parse::<usize>()
            .map_err(|_| ConfigurationError::UnknownFrequency(other.to_string()))?,
    };
    if periods == 0 {
        return Err(ConfigurationError::InvalidFrequency);
    }
    Ok(periods)
}

/// Immutable description of one DCA scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyConfig {
    /// Amount invested every period, split between the two assets.
    pub contribution_amount: f64,
    /// Target weight of asset A; asset B receives `1 - weight_a`.
    pub weight_a: f64,
    pub rebalance_enabled: bool,
    /// Rebalance interval in periods. Ignored when rebalancing is disabled.
    pub rebalance_frequency: usize,
    pub rebalance_anchor: RebalanceAnchor,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            contribution_amount: 100.0,
            weight_a: 0.5,
            rebalance_enabled: false,
            rebalance_frequency: 1,
            rebalance_anchor: RebalanceAnchor::EveryNth,
        }
    }
}

impl StrategyConfig {
    pub fn new(contribution_amount: f64, weight_a: f64) -> Self {
        Self {
            contribution_amount,
            weight_a,
            ..Self::default()
        }
    }

    /// Enables rebalancing every `frequency` periods.
    pub fn with_rebalance(mut self, frequency: usize) -> Self {
        self.rebalance_enabled = true;
        self.rebalance_frequency = frequency;
        self
    }

    pub fn with_anchor(mut self, anchor: RebalanceAnchor) -> Self {
        self.rebalance_anchor = anchor;
        self
    }

    pub fn weight_b(&self) -> f64 {
        1.0 - self.weight_a
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !self.weight_a.is_finite() || !(0.0..=1.0).contains(&self.weight_a) {
            return Err(ConfigurationError::WeightOutOfRange(self.weight_a));
        }
        if !self.contribution_amount.is_finite() || self.contribution_amount <= 0.0 {
            return Err(ConfigurationError::NonPositiveAmount(
                self.contribution_amount,
            ));
        }
        if self.rebalance_enabled && self.rebalance_frequency == 0 {
            return Err(ConfigurationError::InvalidFrequency);
        }
        Ok(())
    }

    /// Whether the 1-based `period` is a rebalance period.
    pub fn rebalance_due(&self, period: usize) -> bool {
        if !self.rebalance_enabled || self.rebalance_frequency == 0 || period == 0 {
            return false;
        }
        match self.rebalance_anchor {
            RebalanceAnchor::EveryNth => period % self.rebalance_frequency == 0,
            RebalanceAnchor::FromFirst => (period - 1) % self.rebalance_frequency == 0,
        }
    }
}

/// Scenario strings have the form `AMOUNT:WEIGHT_A[:FREQUENCY]`, e.g.
/// `300:0.5` or `300:0.6:quarterly`.
impl FromStr for StrategyConfig {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigurationError::InvalidScenario(s.to_string());
        let mut parts = s.split(':');
        let amount = parts
            .next()
            .and_then(|p| p.trim().parse::<f64>().ok())
            .ok_or_else(invalid)?;
        let weight_a = parts
            .next()
            .and_then(|p| p.trim().parse::<f64>().ok())
            .ok_or_else(invalid)?;
        let mut config = StrategyConfig::new(amount, weight_a);
        if let Some(freq) = parts.next() {
            config = config.with_rebalance(parse_frequency(freq)?);
        }
        if parts.next().is_some() {
            return Err(invalid());
        }
        config.validate()?;
        Ok(config)
    }
}

impl fmt::Display for StrategyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "${} per period, A: {:.1}%, B: {:.1}%",
            self.contribution_amount,
            self.weight_a * 100.0,
            self.weight_b() * 100.0
        )?;
        if self.rebalance_enabled {
            write!(f, ", rebalance every {} period(s)", self.rebalance_frequency)
        } else {
            write!(f, ", no rebalance")
        }
    }
}
