use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc, Weekday};
use std::collections::BTreeMap;

use super::compliance::{CALL_WINDOW_END_HOUR, CALL_WINDOW_START_HOUR};
use crate::workflows::nurture::domain::{ContactTimezone, EngagementEvent};

/// Fallback hour when the lead has no engagement history to learn from.
const DEFAULT_CALL_HOUR: u32 = 10;

/// Compute when to place a call: an explicit preference wins, otherwise the
/// lead's historical peak engagement hour on the next business day. The
/// candidate is then clamped into the permitted window and rolled off
/// weekends. All arithmetic happens in the lead's local offset.
pub fn optimal_call_time(
    timezone: &ContactTimezone,
    engagement: &[EngagementEvent],
    preferred: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    let offset = timezone.fixed_offset();

    let mut local = match preferred {
        Some(time) => time.with_timezone(&offset),
        None => {
            let hour = peak_engagement_hour(engagement, timezone).unwrap_or(DEFAULT_CALL_HOUR);
            let day = next_business_day(now.with_timezone(&offset).date_naive());
            at_hour(day, hour, timezone)
        }
    };

    if local.hour() < CALL_WINDOW_START_HOUR {
        local = at_hour(local.date_naive(), CALL_WINDOW_START_HOUR, timezone);
    } else if local.hour() > CALL_WINDOW_END_HOUR {
        local = at_hour(
            local.date_naive() + Duration::days(1),
            CALL_WINDOW_START_HOUR,
            timezone,
        );
    }

    match local.weekday() {
        Weekday::Sun => local += Duration::days(1),
        Weekday::Sat => local += Duration::days(2),
        _ => {}
    }

    local.with_timezone(&Utc)
}

/// Mode of the local hour-of-day across the engagement history; ties resolve
/// to the earlier hour.
pub fn peak_engagement_hour(
    engagement: &[EngagementEvent],
    timezone: &ContactTimezone,
) -> Option<u32> {
    if engagement.is_empty() {
        return None;
    }

    let offset = timezone.fixed_offset();
    let mut counts: BTreeMap<u32, usize> = BTreeMap::new();
    for event in engagement {
        let hour = event.occurred_at.with_timezone(&offset).hour();
        *counts.entry(hour).or_default() += 1;
    }

    counts
        .into_iter()
        .max_by(|(hour_a, count_a), (hour_b, count_b)| {
            count_a.cmp(count_b).then(hour_b.cmp(hour_a))
        })
        .map(|(hour, _)| hour)
}

fn next_business_day(date: NaiveDate) -> NaiveDate {
    let next = date + Duration::days(1);
    match next.weekday() {
        Weekday::Sun => next + Duration::days(1),
        Weekday::Sat => next + Duration::days(2),
        _ => next,
    }
}

fn at_hour(
    date: NaiveDate,
    hour: u32,
    timezone: &ContactTimezone,
) -> DateTime<chrono::FixedOffset> {
    let naive = date
        .and_hms_opt(hour, 0, 0)
        .expect("hour within 0..24 is a valid wall-clock time");
    timezone
        .fixed_offset()
        .from_local_datetime(&naive)
        .single()
        .expect("fixed offsets are unambiguous")
}
