use crate::error::DataError;
use crate::simulator::{Holdings, PeriodPrices};

/// Moves holdings back to the target value split without adding or removing
/// value.
#[derive(Debug, Clone, Copy)]
pub struct Rebalancer {
    weight_a: f64,
}

impl Rebalancer {
    pub fn new(weight_a: f64) -> Self {
        Self { weight_a }
    }

    /// Replaces `holdings` so that asset A makes up exactly `weight_a` of the
    /// current total value.
    ///
    /// # Errors
    /// Returns a [`DataError`] if either price is missing or not strictly
    /// positive; `holdings` is left untouched in that case.
    pub fn rebalance(
        &self,
        holdings: &mut Holdings,
        prices: &PeriodPrices<'_>,
    ) -> Result<(), DataError> {
        let (price_a, price_b) = prices.checked()?;
        let total = holdings.total_value(price_a, price_b);
        holdings.shares_a = total * self.weight_a / price_a;
        holdings.shares_b = total * (1.0 - self.weight_a) / price_b;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use time::macros::date;

    fn prices<'a>(a: &'a Arc<str>, b: &'a Arc<str>, price_a: f64, price_b: f64) -> PeriodPrices<'a> {
        PeriodPrices {
            date: date!(2021 - 06 - 30),
            asset_a: a,
            price_a,
            asset_b: b,
            price_b,
        }
    }

    #[test]
    fn test_rebalance_preserves_value_and_hits_weight() {
        let (a, b): (Arc<str>, Arc<str>) = (Arc::from("A"), Arc::from("B"));
        let cases = [
            (2.25, 6.0, 200.0, 50.0, 0.5),
            (10.0, 0.0, 13.7, 2.1, 0.3),
            (0.0, 4.0, 99.0, 1234.5, 0.85),
            (7.3, 1.1, 0.01, 5000.0, 0.0),
            (7.3, 1.1, 42.0, 17.0, 1.0),
        ];
        for (shares_a, shares_b, price_a, price_b, weight_a) in cases {
            let mut holdings = Holdings { shares_a, shares_b };
            let before = holdings.total_value(price_a, price_b);
            Rebalancer::new(weight_a)
                .rebalance(&mut holdings, &prices(&a, &b, price_a, price_b))
                .unwrap();
            let after = holdings.total_value(price_a, price_b);
            assert!((after - before).abs() < 1e-9 * before.max(1.0));
            assert!((holdings.value_a(price_a) / after - weight_a).abs() < 1e-12);
            assert!(holdings.shares_a >= 0.0 && holdings.shares_b >= 0.0);
        }
    }

    #[test]
    fn test_rebalance_rejects_bad_prices() {
        let (a, b): (Arc<str>, Arc<str>) = (Arc::from("A"), Arc::from("B"));
        let original = Holdings {
            shares_a: 1.0,
            shares_b: 2.0,
        };
        let rebalancer = Rebalancer::new(0.5);

        let mut holdings = original;
        let err = rebalancer
            .rebalance(&mut holdings, &prices(&a, &b, 0.0, 10.0))
            .unwrap_err();
        assert!(matches!(err, DataError::NonPositivePrice { .. }));
        assert_eq!(holdings, original);

        let err = rebalancer
            .rebalance(&mut holdings, &prices(&a, &b, 10.0, f64::NAN))
            .unwrap_err();
        assert_eq!(
            err,
            DataError::MissingPrice {
                asset: b.clone(),
                date: date!(2021 - 06 - 30)
            }
        );
        assert_eq!(holdings, original);
    }
}
