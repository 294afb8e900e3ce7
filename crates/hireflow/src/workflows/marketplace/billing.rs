//! Invoice interval arithmetic.
//!
//! A job of `duration` hours is billed in `invoice_interval`-hour slices; the last slice covers
//! whatever remains and may be shorter.

use serde::Serialize;

use super::domain::Job;
use super::error::{MarketplaceError, StateViolation};

/// Number of invoices a job may produce: `ceil(duration / interval)`.
pub fn max_intervals(duration: u32, interval: u32) -> u32 {
    if interval == 0 {
        return 0;
    }

    let full = duration / interval;
    if duration % interval == 0 {
        full
    } else {
        full + 1
    }
}

/// Billable hours for the given 1-based interval.
pub fn hours_for_interval(duration: u32, interval: u32, interval_number: u32) -> u32 {
    let remainder = if interval == 0 { 0 } else { duration % interval };
    if remainder != 0 && interval_number == max_intervals(duration, interval) {
        remainder
    } else {
        interval
    }
}

/// `rate * hours + adjustment`, floored at zero.
pub fn invoice_value(rate: u64, hours: u32, adjustment: i64) -> u64 {
    let gross = i128::from(rate) * i128::from(hours) + i128::from(adjustment);
    u64::try_from(gross.max(0)).unwrap_or(u64::MAX)
}

/// Figures for the next invoice of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IntervalQuote {
    pub interval_number: u32,
    pub max_intervals: u32,
    pub hours: u32,
    pub value: u64,
}

/// Quotes the interval after `last_interval`, or fails once the job is fully billed.
pub fn quote_next_interval(
    job: &Job,
    last_interval: u32,
    adjustment: i64,
) -> Result<IntervalQuote, MarketplaceError> {
    let max_intervals = max_intervals(job.duration, job.invoice_interval);
    let interval_number = last_interval.saturating_add(1);
    if interval_number > max_intervals {
        return Err(StateViolation::IntervalExceeded { max_intervals }.into());
    }

    let hours = hours_for_interval(job.duration, job.invoice_interval, interval_number);
    Ok(IntervalQuote {
        interval_number,
        max_intervals,
        hours,
        value: invoice_value(job.rate, hours, adjustment),
    })
}
