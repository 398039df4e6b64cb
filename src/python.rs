use polars::prelude::*;
use pyo3::prelude::*;
use pyo3::types::PyDict;
use pyo3_polars::PyDataFrame;

use crate::config::{parse_frequency, RebalanceAnchor, StrategyConfig};
use crate::gap_fill::FillMethod;
use crate::input_handler::{parse_price_df, snapshots_to_df};
use crate::metrics::DcaMetrics;
use crate::periods::prepare_monthly;
use crate::simulator::DcaSimulator;

fn value_error(context: &str, e: impl std::fmt::Display) -> PyErr {
    PyErr::new::<pyo3::exceptions::PyValueError, _>(format!("{}: {}", context, e))
}

/// Python wrapper for the Rust DCA simulator
#[pyclass]
struct PyDcaSimulator {
    config: StrategyConfig,
    fill_method: FillMethod,
    date_format: String,
}

#[pymethods]
impl PyDcaSimulator {
    /// Create a simulator investing `contribution_amount` each month with
    /// `weight_a` going to asset A.
    ///
    /// `rebalance_frequency` is a period count or one of "monthly",
    /// "quarterly", "semiannually", "annually"; None disables rebalancing.
    #[new]
    #[pyo3(signature = (contribution_amount, weight_a, rebalance_frequency=None, anchor="every_nth", fill_method="linear", date_format="[month]/[day]/[year]"))]
    fn new(
        contribution_amount: f64,
        weight_a: f64,
        rebalance_frequency: Option<&str>,
        anchor: &str,
        fill_method: &str,
        date_format: &str,
    ) -> PyResult<Self> {
        let mut config = StrategyConfig::new(contribution_amount, weight_a);
        if let Some(freq) = rebalance_frequency {
            let periods = parse_frequency(freq).map_err(|e| value_error("Invalid frequency", e))?;
            config = config.with_rebalance(periods);
        }
        let anchor = anchor
            .parse::<RebalanceAnchor>()
            .map_err(|e| value_error("Invalid anchor", e))?;
        config = config.with_anchor(anchor);
        config
            .validate()
            .map_err(|e| value_error("Invalid strategy", e))?;

        Ok(PyDcaSimulator {
            config,
            fill_method: fill_method
                .parse::<FillMethod>()
                .map_err(|e| value_error("Invalid fill method", e))?,
            date_format: date_format.to_string(),
        })
    }

    /// Run the simulation using daily price data from Python
    ///
    /// Args:
    ///     prices_a_df: Polars DataFrame with a "timestamp" column and a "price" column
    ///     prices_b_df: Polars DataFrame with a "timestamp" column and a "price" column
    ///
    /// Returns:
    ///     Tuple containing:
    ///     - Polars DataFrame with one row per month
    ///     - Dictionary with summary metrics
    #[pyo3(text_signature = "(self, prices_a_df, prices_b_df)")]
    fn run<'py>(
        &self,
        py: Python<'py>,
        prices_a_df: PyDataFrame,
        prices_b_df: PyDataFrame,
    ) -> PyResult<(PyDataFrame, Py<PyDict>)> {
        let prices_a_df: DataFrame = prices_a_df.as_ref().clone();
        let prices_b_df: DataFrame = prices_b_df.as_ref().clone();

        let series_a = parse_price_df(&prices_a_df, "A", "timestamp", "price", &self.date_format)
            .map_err(|e| value_error("Error parsing price data for A", e))?;
        let series_b = parse_price_df(&prices_b_df, "B", "timestamp", "price", &self.date_format)
            .map_err(|e| value_error("Error parsing price data for B", e))?;

        let (monthly_a, monthly_b) =
            prepare_monthly(&series_a, &series_b, self.fill_method, None)
                .map_err(|e| value_error("Error aligning prices", e))?;

        let simulator = DcaSimulator::new(monthly_a, monthly_b, self.config.clone());
        let snapshots = simulator.run().map_err(|e| {
            PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(format!(
                "Error running simulation: {}",
                e
            ))
        })?;
        let results_df = snapshots_to_df(&snapshots).map_err(|e| {
            PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(format!(
                "Error building results: {}",
                e
            ))
        })?;

        let metrics = DcaMetrics::from_snapshots(&snapshots);
        let metrics_dict = PyDict::new(py);
        metrics_dict.set_item("num_periods", metrics.num_periods)?;
        metrics_dict.set_item("total_invested", metrics.total_invested)?;
        metrics_dict.set_item("final_value", metrics.final_value)?;
        metrics_dict.set_item("total_gain", metrics.total_gain)?;
        metrics_dict.set_item("total_return", metrics.total_return)?;
        metrics_dict.set_item("max_drawdown", metrics.max_drawdown)?;
        metrics_dict.set_item("num_rebalances", metrics.num_rebalances)?;

        Ok((PyDataFrame(results_df), metrics_dict.into()))
    }
}

/// A Python module implemented in Rust using PyO3.
#[pymodule]
fn dca_backtester(_py: Python<'_>, m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyDcaSimulator>()?;
    Ok(())
}
