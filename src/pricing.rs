//! Price series model and the aggregation pipeline behind the three chart
//! views: latest-hour price, per-day min/max/average, per-hour-of-day average.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raw hourly day-ahead series as the upstream API returns it.
///
/// `price[i]` is hour `i` counted from the start of the requested range, 24
/// entries per calendar day. The upstream emits `null` for hours it has no
/// quote for, hence `Option<f64>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub unix_seconds: Vec<i64>,
    pub price: Vec<Option<f64>>,
    pub unit: String,
    pub license_info: String,
    pub deprecated: bool,
}

/// Average price for one hour-of-day across the requested range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyAverage {
    pub hour: String,
    pub avg_price: f64,
}

/// Min/max/mean of one calendar day's hourly prices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyStats {
    pub date: String,
    pub max: f64,
    pub min: f64,
    pub avg: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RangeError {
    #[error("start date {start} is after end date {end}")]
    StartAfterEnd { start: NaiveDate, end: NaiveDate },
    #[error("start date {start} is in the future")]
    StartInFuture { start: NaiveDate },
    #[error("end date {end} is in the future")]
    EndInFuture { end: NaiveDate },
}

/// Price for the given wall-clock hour, falling back to noon when that hour
/// is missing. `None` means the series has no usable entry at either index
/// and the caller renders a no-data state.
pub fn select_latest(prices: &[Option<f64>], hour_of_day: usize) -> Option<f64> {
    prices
        .get(hour_of_day)
        .copied()
        .flatten()
        .or_else(|| prices.get(12).copied().flatten())
}

/// Buckets every entry into hour-of-day `i mod 24` and averages each bucket.
///
/// Always returns 24 entries, hours ascending. A bucket with no samples
/// reports 0. Missing entries are not filtered here; they feed NaN into
/// their bucket, matching the daily-prices chart contract.
pub fn aggregate_hourly(prices: &[Option<f64>]) -> Vec<HourlyAverage> {
    let mut sums = [0.0f64; 24];
    let mut counts = [0u32; 24];

    for (idx, entry) in prices.iter().copied().enumerate() {
        let hour = idx % 24;
        sums[hour] += entry.unwrap_or(f64::NAN);
        counts[hour] += 1;
    }

    (0..24)
        .map(|hour| HourlyAverage {
            hour: format!("{hour}:00"),
            avg_price: if counts[hour] > 0 {
                round2(sums[hour] / f64::from(counts[hour]))
            } else {
                0.0
            },
        })
        .collect()
}

/// Per-day min/max/mean over contiguous 24-entry windows offset from the
/// range start.
///
/// The day axis advances one calendar day at a time; the index arithmetic is
/// deliberately calendar-naive (a day is always 24 slots, DST days are not
/// 23/25 slots wide), matching how the upstream packs the series. Days whose
/// window has no numeric entry are omitted rather than zero-filled.
pub fn aggregate_daily(
    prices: &[Option<f64>],
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<DailyStats> {
    let mut out = Vec::new();
    let mut day = start;

    while day <= end {
        let day_index = (day - start).num_days() as usize;
        let lo = day_index.saturating_mul(24).min(prices.len());
        let hi = lo.saturating_add(24).min(prices.len());

        let valid: Vec<f64> = prices[lo..hi]
            .iter()
            .filter_map(|entry| *entry)
            .filter(|value| !value.is_nan())
            .collect();

        if !valid.is_empty() {
            let max = valid.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let min = valid.iter().copied().fold(f64::INFINITY, f64::min);
            let avg = valid.iter().sum::<f64>() / valid.len() as f64;
            out.push(DailyStats {
                date: day.format("%Y-%m-%d").to_string(),
                max,
                min,
                avg,
            });
        }

        day = match day.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }

    out
}

/// Gate applied before any detail fetch: `start <= end`, neither in the
/// future. The relay endpoint itself never applies this.
pub fn validate_range(
    start: NaiveDate,
    end: NaiveDate,
    today: NaiveDate,
) -> Result<(), RangeError> {
    if start > end {
        return Err(RangeError::StartAfterEnd { start, end });
    }
    if start > today {
        return Err(RangeError::StartInFuture { start });
    }
    if end > today {
        return Err(RangeError::EndInFuture { end });
    }
    Ok(())
}

/// Round half away from zero to two decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid test date")
    }

    #[test]
    fn round2_is_half_away_from_zero() {
        assert_eq!(round2(10.005), 10.01);
        assert_eq!(round2(-10.005), -10.01);
        assert_eq!(round2(3.14159), 3.14);
    }

    #[test]
    fn select_latest_prefers_current_hour_over_noon() {
        let prices: Vec<Option<f64>> = (0..24).map(|h| Some(f64::from(h))).collect();
        assert_eq!(select_latest(&prices, 5), Some(5.0));
        assert_eq!(select_latest(&prices, 23), Some(23.0));
    }

    #[test]
    fn select_latest_falls_back_to_noon_on_missing_hour() {
        let mut prices: Vec<Option<f64>> = vec![Some(1.0); 24];
        prices[5] = None;
        assert_eq!(select_latest(&prices, 5), Some(1.0));

        let short = vec![Some(10.0); 6];
        assert_eq!(select_latest(&short, 7), None);
    }

    #[test]
    fn hourly_buckets_do_not_filter_missing_entries() {
        let mut prices: Vec<Option<f64>> = vec![Some(10.0); 48];
        prices[3] = None;

        let averages = aggregate_hourly(&prices);
        assert_eq!(averages.len(), 24);
        assert!(averages[3].avg_price.is_nan());
        assert_eq!(averages[4].avg_price, 10.0);
    }

    #[test]
    fn hourly_bucket_without_samples_reports_zero() {
        let averages = aggregate_hourly(&[Some(50.0), Some(60.0)]);
        assert_eq!(averages[0].avg_price, 50.0);
        assert_eq!(averages[1].avg_price, 60.0);
        assert_eq!(averages[2].avg_price, 0.0);
        assert_eq!(averages[23].avg_price, 0.0);
    }

    #[test]
    fn daily_stats_tolerate_truncated_series() {
        // Two-day range but only one day of data: the second day is omitted.
        let prices: Vec<Option<f64>> = vec![Some(5.0); 24];
        let stats = aggregate_daily(&prices, date(2024, 3, 1), date(2024, 3, 2));

        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].date, "2024-03-01");
        assert_eq!(stats[0].avg, 5.0);
    }

    #[test]
    fn daily_stats_empty_when_start_after_end() {
        let prices: Vec<Option<f64>> = vec![Some(5.0); 24];
        assert!(aggregate_daily(&prices, date(2024, 3, 2), date(2024, 3, 1)).is_empty());
    }

    #[test]
    fn validator_rejects_future_and_inverted_ranges() {
        let today = date(2024, 6, 15);
        assert!(validate_range(date(2024, 6, 1), date(2024, 6, 10), today).is_ok());
        assert_eq!(
            validate_range(date(2024, 6, 16), date(2024, 6, 20), today),
            Err(RangeError::StartInFuture { start: date(2024, 6, 16) })
        );
        assert_eq!(
            validate_range(date(2024, 6, 10), date(2024, 6, 5), today),
            Err(RangeError::StartAfterEnd {
                start: date(2024, 6, 10),
                end: date(2024, 6, 5),
            })
        );
        assert_eq!(
            validate_range(date(2024, 6, 10), date(2024, 6, 16), today),
            Err(RangeError::EndInFuture { end: date(2024, 6, 16) })
        );
    }
}
