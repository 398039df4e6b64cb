use std::sync::Arc;
use time::Date;
use tracing::{debug, info};

use crate::config::StrategyConfig;
use crate::error::{ConfigurationError, DataError, Result};
use crate::rebalancer::Rebalancer;

/// A single observation of an asset's price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    pub date: Date,
    pub price: f64,
}

/// Ordered price history of one asset, one point per period.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    pub name: Arc<str>,
    pub points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn new(name: impl Into<Arc<str>>, points: Vec<PricePoint>) -> Self {
        Self {
            name: name.into(),
            points,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_date(&self) -> Option<Date> {
        self.points.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<Date> {
        self.points.last().map(|p| p.date)
    }

    /// Fails on the first date that does not strictly follow its predecessor.
    pub fn check_ordered(&self) -> std::result::Result<(), ConfigurationError> {
        match self.points.windows(2).find(|w| w[1].date <= w[0].date) {
            Some(w) => Err(ConfigurationError::UnorderedDates {
                asset: self.name.clone(),
                date: w[1].date,
            }),
            None => Ok(()),
        }
    }
}

/// The two prices in effect for one period.
#[derive(Debug, Clone, Copy)]
pub struct PeriodPrices<'a> {
    pub date: Date,
    pub asset_a: &'a Arc<str>,
    pub price_a: f64,
    pub asset_b: &'a Arc<str>,
    pub price_b: f64,
}

/// Checks that `price` can be used as a divisor for share purchases.
fn check_price(asset: &Arc<str>, date: Date, price: f64) -> std::result::Result<f64, DataError> {
    if !price.is_finite() {
        return Err(DataError::MissingPrice {
            asset: asset.clone(),
            date,
        });
    }
    if price <= 0.0 {
        return Err(DataError::NonPositivePrice {
            asset: asset.clone(),
            date,
            price,
        });
    }
    Ok(price)
}

impl PeriodPrices<'_> {
    /// Both prices, or the data error describing the first unusable one.
    pub fn checked(&self) -> std::result::Result<(f64, f64), DataError> {
        let a = check_price(self.asset_a, self.date, self.price_a)?;
        let b = check_price(self.asset_b, self.date, self.price_b)?;
        Ok((a, b))
    }
}

/// Shares held of each asset. Starts empty and is only changed by
/// contributions and rebalances.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Holdings {
    pub shares_a: f64,
    pub shares_b: f64,
}

impl Holdings {
    /// Splits `amount` by `weight_a` and buys shares of both assets at the
    /// period's prices.
    pub fn contribute(
        &mut self,
        amount: f64,
        weight_a: f64,
        prices: &PeriodPrices<'_>,
    ) -> std::result::Result<(), DataError> {
        let (price_a, price_b) = prices.checked()?;
        self.shares_a += amount * weight_a / price_a;
        self.shares_b += amount * (1.0 - weight_a) / price_b;
        Ok(())
    }

    pub fn value_a(&self, price_a: f64) -> f64 {
        self.shares_a * price_a
    }

    pub fn value_b(&self, price_b: f64) -> f64 {
        self.shares_b * price_b
    }

    pub fn total_value(&self, price_a: f64, price_b: f64) -> f64 {
        self.value_a(price_a) + self.value_b(price_b)
    }
}

/// Valuation of the portfolio at the end of one period.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioSnapshot {
    pub date: Date,
    /// Prices the period was valued at, for charting next to the values.
    pub price_a: f64,
    pub price_b: f64,
    pub shares_a: f64,
    pub shares_b: f64,
    pub value_a: f64,
    pub value_b: f64,
    pub total_value: f64,
    /// Sum of all contributions up to and including this period.
    pub total_invested: f64,
    /// Whether holdings were rebalanced in this period.
    pub rebalanced: bool,
}

/// Dollar-cost-averaging simulation over two aligned price series.
pub struct DcaSimulator {
    pub series_a: PriceSeries,
    pub series_b: PriceSeries,
    pub config: StrategyConfig,
}

impl DcaSimulator {
    pub fn new(series_a: PriceSeries, series_b: PriceSeries, config: StrategyConfig) -> Self {
        Self {
            series_a,
            series_b,
            config,
        }
    }

    /// Checks everything that can be checked before the first period: the
    /// strategy parameters, both series' ordering, and that the two series
    /// cover exactly the same dates.
    pub fn validate(&self) -> std::result::Result<(), ConfigurationError> {
        self.config.validate()?;
        self.series_a.check_ordered()?;
        self.series_b.check_ordered()?;
        if self.series_a.len() != self.series_b.len() {
            return Err(ConfigurationError::LengthMismatch {
                len_a: self.series_a.len(),
                len_b: self.series_b.len(),
            });
        }
        for (i, (a, b)) in self
            .series_a
            .points
            .iter()
            .zip(&self.series_b.points)
            .enumerate()
        {
            if a.date != b.date {
                return Err(ConfigurationError::DateMismatch {
                    period: i + 1,
                    date_a: a.date,
                    date_b: b.date,
                });
            }
        }
        Ok(())
    }

    /// Runs the simulation.
    ///
    /// Each period buys `contribution_amount` worth of the two assets split by
    /// the target weight, rebalances when the schedule says so, and records a
    /// snapshot. Any invalid price aborts the run; no partial trajectory is
    /// returned.
    pub fn run(&self) -> Result<Vec<PortfolioSnapshot>> {
        self.validate()?;

        let config = &self.config;
        let rebalancer = Rebalancer::new(config.weight_a);
        let mut holdings = Holdings::default();
        let mut total_invested = 0.0;
        let mut snapshots = Vec::with_capacity(self.series_a.len());

        for (i, (a, b)) in self
            .series_a
            .points
            .iter()
            .zip(&self.series_b.points)
            .enumerate()
        {
            let period = i + 1;
            let prices = PeriodPrices {
                date: a.date,
                asset_a: &self.series_a.name,
                price_a: a.price,
                asset_b: &self.series_b.name,
                price_b: b.price,
            };

            holdings.contribute(config.contribution_amount, config.weight_a, &prices)?;
            total_invested += config.contribution_amount;

            let rebalanced = config.rebalance_due(period);
            if rebalanced {
                rebalancer.rebalance(&mut holdings, &prices)?;
            }

            let value_a = holdings.value_a(a.price);
            let value_b = holdings.value_b(b.price);
            let total_value = value_a + value_b;

            debug!(
                rebalanced,
                "period {} ({}): {} ${:.2}, {} ${:.2}, invested ${:.2}, total ${:.2}",
                period,
                a.date,
                self.series_a.name,
                value_a,
                self.series_b.name,
                value_b,
                total_invested,
                total_value
            );

            snapshots.push(PortfolioSnapshot {
                date: a.date,
                price_a: a.price,
                price_b: b.price,
                shares_a: holdings.shares_a,
                shares_b: holdings.shares_b,
                value_a,
                value_b,
                total_value,
                total_invested,
                rebalanced,
            });
        }

        if let Some(last) = snapshots.last() {
            info!(
                "DCA scenario ({}): invested ${:.2}, final value ${:.2}",
                config, last.total_invested, last.total_value
            );
        }
        Ok(snapshots)
    }
}

/// Simulates `config` over two aligned price series.
pub fn simulate(
    series_a: PriceSeries,
    series_b: PriceSeries,
    config: StrategyConfig,
) -> Result<Vec<PortfolioSnapshot>> {
    DcaSimulator::new(series_a, series_b, config).run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimulationError;
    use time::macros::date;
    use time::Duration;

    /// Helper method to create a monthly-ish series from raw prices.
    fn make_series(name: &str, start: Date, prices: &[f64]) -> PriceSeries {
        let points = prices
            .iter()
            .enumerate()
            .map(|(i, &price)| PricePoint {
                date: start + Duration::days(30 * i as i64),
                price,
            })
            .collect();
        PriceSeries::new(name, points)
    }

    fn start() -> Date {
        date!(2020 - 01 - 31)
    }

    #[test]
    fn test_period_prices_checked() {
        let (a, b): (Arc<str>, Arc<str>) = (Arc::from("A"), Arc::from("B"));
        let prices = |price_a, price_b| PeriodPrices {
            date: start(),
            asset_a: &a,
            price_a,
            asset_b: &b,
            price_b,
        };
        assert_eq!(prices(100.0, 50.0).checked(), Ok((100.0, 50.0)));
        // Asset A is checked first, so its error wins when both are bad.
        assert_eq!(
            prices(-1.0, f64::NAN).checked(),
            Err(DataError::NonPositivePrice {
                asset: a.clone(),
                date: start(),
                price: -1.0
            })
        );
        assert_eq!(
            prices(100.0, f64::INFINITY).checked(),
            Err(DataError::MissingPrice {
                asset: b.clone(),
                date: start()
            })
        );
    }

    #[test]
    fn test_dca_without_rebalance() {
        let a = make_series("A", start(), &[100.0, 100.0, 100.0]);
        let b = make_series("B", start(), &[50.0, 50.0, 50.0]);
        let snapshots = simulate(a, b, StrategyConfig::new(300.0, 0.5)).unwrap();

        assert_eq!(snapshots.len(), 3);
        for (i, snap) in snapshots.iter().enumerate() {
            let n = (i + 1) as f64;
            assert!((snap.shares_a - 1.5 * n).abs() < 1e-10);
            assert!((snap.shares_b - 3.0 * n).abs() < 1e-10);
            assert!((snap.total_invested - 300.0 * n).abs() < 1e-10);
            assert!(!snap.rebalanced);
        }
        let last = snapshots.last().unwrap();
        assert_eq!((last.price_a, last.price_b), (100.0, 50.0));
        assert!((last.value_a - 450.0).abs() < 1e-10);
        assert!((last.value_b - 450.0).abs() < 1e-10);
        assert!((last.total_value - 900.0).abs() < 1e-10);
    }

    #[test]
    fn test_dca_with_rebalance_every_period() {
        let a = make_series("A", start(), &[100.0, 200.0, 100.0]);
        let b = make_series("B", start(), &[50.0, 50.0, 50.0]);
        let config = StrategyConfig::new(300.0, 0.5).with_rebalance(1);
        let snapshots = simulate(a, b, config).unwrap();

        // Period 1 buys 150 / 100 = 1.5 A and 150 / 50 = 3 B, already on target.
        // Period 2 adds 0.75 A and 3 B, so before the rebalance
        // A = 2.25 * 200 = 450 and B = 6 * 50 = 300. The 750 total splits 375 / 375.
        let p2 = &snapshots[1];
        assert!(p2.rebalanced);
        assert!((p2.total_value - 750.0).abs() < 1e-10);
        assert!((p2.value_a - p2.total_value / 2.0).abs() < 1e-10);
        assert!((p2.value_b - p2.total_value / 2.0).abs() < 1e-10);
        assert!((p2.shares_a - 375.0 / 200.0).abs() < 1e-10);
        assert!((p2.shares_b - 375.0 / 50.0).abs() < 1e-10);
    }

    #[test]
    fn test_rebalance_only_on_due_periods() {
        let a = make_series("A", start(), &[100.0, 200.0, 100.0, 150.0]);
        let b = make_series("B", start(), &[50.0, 50.0, 50.0, 50.0]);
        let config = StrategyConfig::new(300.0, 0.5).with_rebalance(2);
        let snapshots = simulate(a, b, config).unwrap();

        // Every 2nd period counting from period 2.
        let flags: Vec<bool> = snapshots.iter().map(|s| s.rebalanced).collect();
        assert_eq!(flags, vec![false, true, false, true]);
        let p4 = &snapshots[3];
        assert!((p4.value_a - p4.value_b).abs() < 1e-9);
    }

    #[test]
    fn test_output_follows_input_dates() {
        let prices: Vec<f64> = (1..=24).map(|i| 10.0 + i as f64).collect();
        let a = make_series("A", start(), &prices);
        let b = make_series("B", start(), &prices);
        let dates: Vec<Date> = a.points.iter().map(|p| p.date).collect();
        let snapshots = simulate(a, b, StrategyConfig::new(100.0, 0.3).with_rebalance(3)).unwrap();

        assert_eq!(snapshots.len(), 24);
        let out: Vec<Date> = snapshots.iter().map(|s| s.date).collect();
        assert_eq!(out, dates);
    }

    #[test]
    fn test_simulation_is_deterministic() {
        let a = make_series("A", start(), &[13.0, 17.5, 11.2, 19.9, 15.0]);
        let b = make_series("B", start(), &[101.0, 95.3, 120.7, 99.9, 130.1]);
        let config = StrategyConfig::new(123.45, 0.37).with_rebalance(2);
        let first = simulate(a.clone(), b.clone(), config.clone()).unwrap();
        let second = simulate(a, b, config).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let a = make_series("A", start(), &[100.0]);
        let b = make_series("B", start(), &[50.0]);
        let err = simulate(a.clone(), b.clone(), StrategyConfig::new(300.0, 1.5)).unwrap_err();
        assert!(matches!(
            err,
            SimulationError::Configuration(ConfigurationError::WeightOutOfRange(_))
        ));
        let err = simulate(a, b, StrategyConfig::new(0.0, 0.5)).unwrap_err();
        assert!(matches!(
            err,
            SimulationError::Configuration(ConfigurationError::NonPositiveAmount(_))
        ));
    }

    #[test]
    fn test_mismatched_series_rejected() {
        let a = make_series("A", start(), &[100.0, 100.0]);
        let b = make_series("B", start(), &[50.0]);
        let err = simulate(a.clone(), b, StrategyConfig::new(300.0, 0.5)).unwrap_err();
        assert_eq!(
            err,
            SimulationError::Configuration(ConfigurationError::LengthMismatch { len_a: 2, len_b: 1 })
        );

        let shifted = make_series("B", start() + Duration::days(1), &[50.0, 50.0]);
        let err = simulate(a, shifted, StrategyConfig::new(300.0, 0.5)).unwrap_err();
        assert!(matches!(
            err,
            SimulationError::Configuration(ConfigurationError::DateMismatch { period: 1, .. })
        ));
    }

    #[test]
    fn test_unordered_dates_rejected() {
        let mut a = make_series("A", start(), &[100.0, 100.0]);
        a.points.swap(0, 1);
        let mut b = make_series("B", start(), &[50.0, 50.0]);
        b.points.swap(0, 1);
        let err = simulate(a, b, StrategyConfig::new(300.0, 0.5)).unwrap_err();
        assert!(matches!(
            err,
            SimulationError::Configuration(ConfigurationError::UnorderedDates { .. })
        ));
    }

    #[test]
    fn test_bad_prices_fail_at_offending_period() {
        let a = make_series("A", start(), &[100.0, 0.0, 100.0]);
        let b = make_series("B", start(), &[50.0, 50.0, 50.0]);
        let bad_date = a.points[1].date;
        let err = simulate(a, b.clone(), StrategyConfig::new(300.0, 0.5)).unwrap_err();
        match err {
            SimulationError::Data(DataError::NonPositivePrice { asset, date, price }) => {
                assert_eq!(&*asset, "A");
                assert_eq!(date, bad_date);
                assert_eq!(price, 0.0);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let a = make_series("A", start(), &[100.0, f64::NAN, 100.0]);
        let err = simulate(a, b, StrategyConfig::new(300.0, 0.5)).unwrap_err();
        assert!(matches!(
            err,
            SimulationError::Data(DataError::MissingPrice { .. })
        ));
    }

    #[test]
    fn test_full_weight_to_one_asset() {
        let a = make_series("A", start(), &[100.0, 50.0]);
        let b = make_series("B", start(), &[10.0, 20.0]);
        let snapshots = simulate(a, b, StrategyConfig::new(100.0, 1.0).with_rebalance(1)).unwrap();
        let last = snapshots.last().unwrap();
        assert_eq!(last.shares_b, 0.0);
        assert!((last.shares_a - 3.0).abs() < 1e-10);
        assert!((last.total_value - 150.0).abs() < 1e-10);
    }

    #[test]
    fn test_empty_series_yield_no_snapshots() {
        let a = PriceSeries::new("A", Vec::new());
        let b = PriceSeries::new("B", Vec::new());
        let snapshots = simulate(a, b, StrategyConfig::new(100.0, 0.5)).unwrap();
        assert!(snapshots.is_empty());
    }
}
