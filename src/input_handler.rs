use polars::prelude::*;
use std::path::Path;
use time::format_description;
use time::Date;
use tracing::{info, warn};

use crate::simulator::{PortfolioSnapshot, PricePoint, PriceSeries};

/// ISO dates, e.g. "2023-01-15". Used for everything this crate writes.
pub const ISO_DATE_FORMAT: &str = "[year]-[month]-[day]";
/// m/d/y dates, e.g. "01/15/2023".
pub const US_DATE_FORMAT: &str = "[month]/[day]/[year]";
/// d/m/y dates with or without zero padding, e.g. "1/2/2023" or "01/02/2023".
pub const DAY_FIRST_DATE_FORMAT: &str = "[day padding:none]/[month padding:none]/[year]";

/// Reads a CSV file with a header row. Column names are stripped of
/// surrounding whitespace.
pub fn read_csv(path: &Path) -> PolarsResult<DataFrame> {
    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    trim_column_names(&mut df)?;
    info!(
        "Loaded {} with columns {:?} ({} rows)",
        path.display(),
        df.get_column_names(),
        df.height()
    );
    Ok(df)
}

/// Writes `df` as CSV with a header row.
pub fn write_csv(df: &mut DataFrame, path: &Path) -> PolarsResult<()> {
    let mut file = std::fs::File::create(path)?;
    CsvWriter::new(&mut file).include_header(true).finish(df)?;
    info!("Wrote {} rows to {}", df.height(), path.display());
    Ok(())
}

pub fn trim_column_names(df: &mut DataFrame) -> PolarsResult<()> {
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.trim().to_string())
        .collect();
    df.set_column_names(names)
}

/// Parses the string column `date_col` using a `time` format description
/// such as [`ISO_DATE_FORMAT`].
///
/// # Errors
/// Returns an error if the column is missing, is not a string column, or holds
/// a null or unparseable value.
pub fn parse_dates(df: &DataFrame, date_col: &str, date_format: &str) -> PolarsResult<Vec<Date>> {
    let ts_chunked = df.column(date_col)?.str()?;
    let format = format_description::parse(date_format).map_err(|e| {
        PolarsError::ComputeError(format!("Error creating date format: {:?}", e).into())
    })?;

    let mut dates = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let ts_str = ts_chunked
            .get(i)
            .ok_or_else(|| PolarsError::ComputeError("Missing date value".into()))?;
        let date = Date::parse(ts_str.trim(), &format).map_err(|e| {
            PolarsError::ComputeError(format!("Error parsing date '{}': {:?}", ts_str, e).into())
        })?;
        dates.push(date);
    }
    Ok(dates)
}

pub fn format_dates(dates: &[Date], date_format: &str) -> PolarsResult<Vec<String>> {
    let format = format_description::parse(date_format).map_err(|e| {
        PolarsError::ComputeError(format!("Error creating date format: {:?}", e).into())
    })?;
    dates
        .iter()
        .map(|date| {
            date.format(&format).map_err(|e| {
                PolarsError::ComputeError(format!("Error formatting date: {:?}", e).into())
            })
        })
        .collect()
}

/// Reads column `name` as floats. Nulls, values that fail to cast and
/// non-finite values all come back as `None`.
pub fn numeric_column(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<f64>>> {
    let series = df
        .column(name)?
        .as_materialized_series()
        .cast(&DataType::Float64)?;
    let values = series
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| x.is_finite()))
        .collect();
    Ok(values)
}

/// Parses one asset's prices out of a DataFrame into a [`PriceSeries`].
///
/// Rows are sorted by date and only the first row of each date is kept.
/// Missing prices become `NaN` so that gap filling can replace them; any that
/// survive are reported by the simulator.
pub fn parse_price_df(
    df: &DataFrame,
    name: &str,
    date_col: &str,
    price_col: &str,
    date_format: &str,
) -> PolarsResult<PriceSeries> {
    let dates = parse_dates(df, date_col, date_format)?;
    let prices = numeric_column(df, price_col)?;

    let mut points: Vec<PricePoint> = dates
        .into_iter()
        .zip(prices)
        .map(|(date, price)| PricePoint {
            date,
            price: price.unwrap_or(f64::NAN),
        })
        .collect();
    points.sort_by_key(|p| p.date);
    let before = points.len();
    points.dedup_by_key(|p| p.date);
    if points.len() < before {
        warn!(
            "Dropped {} duplicate dates from '{}'",
            before - points.len(),
            name
        );
    }
    Ok(PriceSeries::new(name, points))
}

/// Loads one asset's price series from a CSV file.
pub fn load_price_csv(
    path: &Path,
    name: &str,
    date_col: &str,
    price_col: &str,
    date_format: &str,
) -> PolarsResult<PriceSeries> {
    let df = read_csv(path)?;
    parse_price_df(&df, name, date_col, price_col, date_format)
}

/// Converts a simulated trajectory into a DataFrame that a charting layer can
/// consume directly.
pub fn snapshots_to_df(snapshots: &[PortfolioSnapshot]) -> PolarsResult<DataFrame> {
    let dates: Vec<Date> = snapshots.iter().map(|s| s.date).collect();
    df!(
        "date" => format_dates(&dates, ISO_DATE_FORMAT)?,
        "price_a" => snapshots.iter().map(|s| s.price_a).collect::<Vec<f64>>(),
        "price_b" => snapshots.iter().map(|s| s.price_b).collect::<Vec<f64>>(),
        "shares_a" => snapshots.iter().map(|s| s.shares_a).collect::<Vec<f64>>(),
        "shares_b" => snapshots.iter().map(|s| s.shares_b).collect::<Vec<f64>>(),
        "value_a" => snapshots.iter().map(|s| s.value_a).collect::<Vec<f64>>(),
        "value_b" => snapshots.iter().map(|s| s.value_b).collect::<Vec<f64>>(),
        "total_value" => snapshots.iter().map(|s| s.total_value).collect::<Vec<f64>>(),
        "total_invested" => snapshots.iter().map(|s| s.total_invested).collect::<Vec<f64>>(),
        "rebalanced" => snapshots.iter().map(|s| s.rebalanced).collect::<Vec<bool>>()
    )
}
