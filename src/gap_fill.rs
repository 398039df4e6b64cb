use polars::prelude::*;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use time::Date;
use tracing::{info, warn};

use crate::input_handler::{format_dates, numeric_column, parse_dates};
use crate::simulator::{PricePoint, PriceSeries};

/// How missing days are filled after reindexing to a daily calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillMethod {
    /// Straight line between the nearest known values on either side.
    #[default]
    Linear,
    /// Carry the last known value forward.
    Ffill,
    /// Carry the next known value backward.
    Bfill,
    /// Replace with the column mean of the known values.
    Mean,
}

impl FromStr for FillMethod {
    type Err = PolarsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear" => Ok(FillMethod::Linear),
            "ffill" => Ok(FillMethod::Ffill),
            "bfill" => Ok(FillMethod::Bfill),
            "mean" => Ok(FillMethod::Mean),
            other => Err(PolarsError::ComputeError(
                format!("Unknown fill method: {}", other).into(),
            )),
        }
    }
}

impl fmt::Display for FillMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FillMethod::Linear => "linear",
            FillMethod::Ffill => "ffill",
            FillMethod::Bfill => "bfill",
            FillMethod::Mean => "mean",
        };
        f.write_str(name)
    }
}

/// Count, mean and range of the known values of a column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnSummary {
    pub count: usize,
    pub missing: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

impl ColumnSummary {
    pub fn of(values: &[Option<f64>]) -> Self {
        let known: Vec<f64> = values.iter().flatten().copied().collect();
        let count = known.len();
        let mean = if count > 0 {
            known.iter().sum::<f64>() / count as f64
        } else {
            f64::NAN
        };
        Self {
            count,
            missing: values.len() - count,
            mean,
            min: known.iter().copied().fold(f64::NAN, f64::min),
            max: known.iter().copied().fold(f64::NAN, f64::max),
        }
    }
}

impl fmt::Display for ColumnSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "count={} missing={} mean={:.4} min={:.4} max={:.4}",
            self.count, self.missing, self.mean, self.min, self.max
        )
    }
}

/// Fills every `None` in `values` in place.
///
/// The chosen method runs first; whatever it leaves (leading gaps for
/// `Linear` and `Ffill`, trailing gaps for `Bfill`) is back-filled and then
/// forward-filled. A column without any known value stays empty.
pub fn fill_values(values: &mut [Option<f64>], method: FillMethod) {
    match method {
        FillMethod::Linear => interpolate_linear(values),
        FillMethod::Ffill => forward_fill(values),
        FillMethod::Bfill => backward_fill(values),
        FillMethod::Mean => {
            let mean = ColumnSummary::of(values).mean;
            if mean.is_finite() {
                values.iter_mut().filter(|v| v.is_none()).for_each(|v| *v = Some(mean));
            }
        }
    }
    backward_fill(values);
    forward_fill(values);
}

fn forward_fill(values: &mut [Option<f64>]) {
    let mut last = None;
    for v in values.iter_mut() {
        match v {
            Some(x) => last = Some(*x),
            None => *v = last,
        }
    }
}

fn backward_fill(values: &mut [Option<f64>]) {
    let mut next = None;
    for v in values.iter_mut().rev() {
        match v {
            Some(x) => next = Some(*x),
            None => *v = next,
        }
    }
}

fn interpolate_linear(values: &mut [Option<f64>]) {
    let mut prev: Option<(usize, f64)> = None;
    for i in 0..values.len() {
        let Some(current) = values[i] else {
            continue;
        };
        if let Some((j, start)) = prev {
            let span = (i - j) as f64;
            for (k, slot) in values.iter_mut().enumerate().take(i).skip(j + 1) {
                let t = (k - j) as f64 / span;
                *slot = Some(start + (current - start) * t);
            }
        }
        prev = Some((i, current));
    }
}

/// A table reindexed to one row per calendar day.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyTable {
    pub dates: Vec<Date>,
    pub columns: Vec<Vec<Option<f64>>>,
    /// Number of input rows whose date occurred more than once.
    pub duplicate_rows: usize,
}

/// Collapses duplicate dates by averaging each column's known values, then
/// reindexes to every day between the first and last date. New days are
/// `None` in every column.
pub fn reindex_daily(dates: &[Date], columns: &[Vec<Option<f64>>]) -> DailyTable {
    let mut grouped: BTreeMap<Date, (usize, Vec<(f64, usize)>)> = BTreeMap::new();
    for (row, date) in dates.iter().enumerate() {
        let (rows, sums) = grouped
            .entry(*date)
            .or_insert_with(|| (0, vec![(0.0, 0); columns.len()]));
        *rows += 1;
        for (c, column) in columns.iter().enumerate() {
            if let Some(v) = column.get(row).copied().flatten() {
                sums[c].0 += v;
                sums[c].1 += 1;
            }
        }
    }
    let duplicate_rows: usize = grouped
        .values()
        .filter(|(rows, _)| *rows > 1)
        .map(|(rows, _)| rows)
        .sum();

    let mut table = DailyTable {
        dates: Vec::new(),
        columns: vec![Vec::new(); columns.len()],
        duplicate_rows,
    };
    let (Some(first), Some(last)) = (
        grouped.keys().next().copied(),
        grouped.keys().next_back().copied(),
    ) else {
        return table;
    };

    let mut day = first;
    loop {
        let row = grouped.get(&day);
        for (c, column) in table.columns.iter_mut().enumerate() {
            let value = row.and_then(|(_, sums)| {
                let (sum, n) = sums[c];
                (n > 0).then(|| sum / n as f64)
            });
            column.push(value);
        }
        table.dates.push(day);
        if day >= last {
            break;
        }
        match day.next_day() {
            Some(next) => day = next,
            None => break,
        }
    }
    table
}

/// Gap-fills one price series: duplicate dates are averaged, every missing
/// calendar day is inserted and all missing prices are filled with `method`.
pub fn fill_series(series: &PriceSeries, method: FillMethod) -> PriceSeries {
    let dates: Vec<Date> = series.points.iter().map(|p| p.date).collect();
    let prices: Vec<Option<f64>> = series
        .points
        .iter()
        .map(|p| Some(p.price).filter(|x| x.is_finite()))
        .collect();
    let before = ColumnSummary::of(&prices);

    let mut table = reindex_daily(&dates, &[prices]);
    if table.duplicate_rows > 0 {
        warn!(
            "{} duplicates found in '{}', averaged",
            table.duplicate_rows, series.name
        );
    }
    let mut filled = table.columns.pop().unwrap_or_default();
    fill_values(&mut filled, method);
    info!(
        "Filled '{}' with {}: before [{}], after [{}]",
        series.name,
        method,
        before,
        ColumnSummary::of(&filled)
    );

    let points = table
        .dates
        .into_iter()
        .zip(filled)
        .map(|(date, price)| PricePoint {
            date,
            price: price.unwrap_or(f64::NAN),
        })
        .collect();
    PriceSeries::new(series.name.clone(), points)
}

/// Gap-fills every non-date column of `df`.
///
/// The result has one row per calendar day between the earliest and latest
/// date, dates written as `output_format`, and every other column as floats.
pub fn fill_missing_dates(
    df: &DataFrame,
    date_col: &str,
    date_format: &str,
    output_format: &str,
    method: FillMethod,
) -> PolarsResult<DataFrame> {
    let dates = parse_dates(df, date_col, date_format)?;
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|n| n.to_string())
        .filter(|n| n != date_col)
        .collect();
    let mut columns = Vec::with_capacity(names.len());
    for name in &names {
        let values = numeric_column(df, name)?;
        info!("Original data '{}': {}", name, ColumnSummary::of(&values));
        columns.push(values);
    }

    let mut table = reindex_daily(&dates, &columns);
    if table.duplicate_rows > 0 {
        warn!(
            "{} duplicates found in the date column, averaged",
            table.duplicate_rows
        );
    }

    let mut out: Vec<Column> = Vec::with_capacity(names.len() + 1);
    out.push(Series::new(date_col.into(), format_dates(&table.dates, output_format)?).into());
    for (name, values) in names.iter().zip(table.columns.iter_mut()) {
        fill_values(values, method);
        info!("Filled data '{}': {}", name, ColumnSummary::of(values));
        out.push(Series::new(name.as_str().into(), values.as_slice()).into());
    }
    DataFrame::new(out)
}
