use crate::simulator::PortfolioSnapshot;

/// Summary statistics for one simulated DCA trajectory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DcaMetrics {
    pub num_periods: usize,
    pub total_invested: f64,
    pub final_value: f64,
    /// Final value minus total invested.
    pub total_gain: f64,
    /// Gain as a fraction of the amount invested (0.1 means +10%).
    pub total_return: f64,
    /// Largest peak-to-trough fall of total value, as a positive fraction.
    pub max_drawdown: f64,
    pub num_rebalances: usize,
}

impl DcaMetrics {
    /// Computes the metrics of `snapshots`. An empty trajectory yields all zeros.
    pub fn from_snapshots(snapshots: &[PortfolioSnapshot]) -> Self {
        let Some(last) = snapshots.last() else {
            return Self::default();
        };

        let mut peak = f64::MIN;
        let mut max_drawdown: f64 = 0.0;
        for snap in snapshots {
            peak = peak.max(snap.total_value);
            if peak > 0.0 {
                max_drawdown = max_drawdown.max((peak - snap.total_value) / peak);
            }
        }

        let total_gain = last.total_value - last.total_invested;
        let total_return = if last.total_invested > 0.0 {
            total_gain / last.total_invested
        } else {
            0.0
        };

        Self {
            num_periods: snapshots.len(),
            total_invested: last.total_invested,
            final_value: last.total_value,
            total_gain,
            total_return,
            max_drawdown,
            num_rebalances: snapshots.iter().filter(|s| s.rebalanced).count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn snap(total_value: f64, total_invested: f64, rebalanced: bool) -> PortfolioSnapshot {
        PortfolioSnapshot {
            date: date!(2022 - 01 - 31),
            price_a: 1.0,
            price_b: 1.0,
            shares_a: 0.0,
            shares_b: 0.0,
            value_a: total_value,
            value_b: 0.0,
            total_value,
            total_invested,
            rebalanced,
        }
    }

    #[test]
    fn test_metrics_from_snapshots() {
        let snapshots = vec![
            snap(100.0, 100.0, false),
            snap(250.0, 200.0, true),
            snap(200.0, 300.0, false),
            snap(440.0, 400.0, true),
        ];
        let metrics = DcaMetrics::from_snapshots(&snapshots);
        assert_eq!(metrics.num_periods, 4);
        assert_eq!(metrics.num_rebalances, 2);
        assert!((metrics.total_invested - 400.0).abs() < 1e-10);
        assert!((metrics.final_value - 440.0).abs() < 1e-10);
        assert!((metrics.total_gain - 40.0).abs() < 1e-10);
        assert!((metrics.total_return - 0.1).abs() < 1e-10);
        // Peak 250 falls to 200.
        assert!((metrics.max_drawdown - 0.2).abs() < 1e-10);
    }

    #[test]
    fn test_metrics_empty() {
        assert_eq!(DcaMetrics::from_snapshots(&[]), DcaMetrics::default());
    }
}
