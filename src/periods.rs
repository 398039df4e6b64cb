use time::Date;
use tracing::info;

use crate::error::ConfigurationError;
use crate::gap_fill::{fill_series, FillMethod};
use crate::simulator::{PricePoint, PriceSeries};

fn retain_between(series: &PriceSeries, from: Date, to: Date) -> PriceSeries {
    let points = series
        .points
        .iter()
        .filter(|p| p.date >= from && p.date <= to)
        .copied()
        .collect();
    PriceSeries::new(series.name.clone(), points)
}

/// Restricts both series to the dates they have in common.
///
/// Points before `start` are dropped first; when `start` itself has no
/// observation this begins at the next available date. Both series are then
/// clipped to the range between the later of their first dates and the
/// earlier of their last dates.
pub fn align(
    series_a: &PriceSeries,
    series_b: &PriceSeries,
    start: Option<Date>,
) -> Result<(PriceSeries, PriceSeries), ConfigurationError> {
    let no_overlap = || ConfigurationError::NoOverlap {
        asset_a: series_a.name.clone(),
        asset_b: series_b.name.clone(),
    };
    let start = start.unwrap_or(Date::MIN);
    let first_after = |s: &PriceSeries| s.points.iter().map(|p| p.date).find(|d| *d >= start);

    let from = first_after(series_a)
        .zip(first_after(series_b))
        .map(|(a, b)| a.max(b))
        .ok_or_else(no_overlap)?;
    let to = series_a
        .last_date()
        .zip(series_b.last_date())
        .map(|(a, b)| a.min(b))
        .ok_or_else(no_overlap)?;
    if from > to {
        return Err(no_overlap());
    }

    info!("Aligned date range: {} to {}", from, to);
    Ok((
        retain_between(series_a, from, to),
        retain_between(series_b, from, to),
    ))
}

fn month_end(date: Date) -> Date {
    let mut end = date;
    while let Some(next) = end.next_day().filter(|d| d.month() == date.month()) {
        end = next;
    }
    end
}

/// Segments an ordered series into calendar months.
///
/// Each month becomes one point dated on its last day, priced at the mean of
/// that month's finite prices. A month without any finite price is `NaN`.
pub fn monthly_means(series: &PriceSeries) -> PriceSeries {
    let mut points: Vec<PricePoint> = Vec::new();
    let mut sum = 0.0;
    let mut count = 0usize;
    let mut current: Option<Date> = None;

    let mut flush = |month: Date, sum: f64, count: usize| {
        let price = if count > 0 { sum / count as f64 } else { f64::NAN };
        points.push(PricePoint {
            date: month_end(month),
            price,
        });
    };

    for point in &series.points {
        match current {
            Some(month)
                if month.year() == point.date.year() && month.month() == point.date.month() => {}
            Some(month) => {
                flush(month, sum, count);
                sum = 0.0;
                count = 0;
                current = Some(point.date);
            }
            None => current = Some(point.date),
        }
        if point.price.is_finite() {
            sum += point.price;
            count += 1;
        }
    }
    if let Some(month) = current {
        flush(month, sum, count);
    }

    PriceSeries::new(series.name.clone(), points)
}

/// Turns two raw daily histories into aligned monthly periods: both are
/// gap-filled with `method`, clipped to their common range from `start`, and
/// averaged per calendar month.
pub fn prepare_monthly(
    series_a: &PriceSeries,
    series_b: &PriceSeries,
    method: FillMethod,
    start: Option<Date>,
) -> Result<(PriceSeries, PriceSeries), ConfigurationError> {
    let filled_a = fill_series(series_a, method);
    let filled_b = fill_series(series_b, method);
    let (aligned_a, aligned_b) = align(&filled_a, &filled_b, start)?;
    Ok((monthly_means(&aligned_a), monthly_means(&aligned_b)))
}
