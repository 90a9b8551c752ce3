use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;

use super::metrics::mean_view_minutes;
use super::types::{DailyHistoryRow, DetectionEvent, Period, VisitEvent};

#[derive(Default)]
struct DayBucket<'a> {
    detections: Vec<&'a DetectionEvent>,
    visitors: HashSet<&'a str>,
}

/// One row per UTC calendar day of `period`, including days without activity.
/// Events outside the period are ignored.
pub fn build_daily_history(
    period: &Period,
    detections: &[DetectionEvent],
    visits: &[VisitEvent],
) -> Vec<DailyHistoryRow> {
    let mut buckets: BTreeMap<NaiveDate, DayBucket<'_>> = period
        .calendar_days()
        .map(|day| (day, DayBucket::default()))
        .collect();

    for event in detections {
        if let Some(bucket) = buckets.get_mut(&event.detected_at.date_naive()) {
            bucket.detections.push(event);
        }
    }
    for visit in visits {
        if let Some(bucket) = buckets.get_mut(&visit.visited_at.date_naive()) {
            bucket.visitors.insert(visit.viewer_identity.as_str());
        }
    }

    buckets
        .into_iter()
        .map(|(date, bucket)| {
            let viewers = bucket
                .detections
                .iter()
                .map(|event| event.viewer_identity.as_str())
                .collect::<HashSet<_>>()
                .len() as u64;
            DailyHistoryRow {
                date,
                day_of_week: date.format("%A").to_string(),
                viewers,
                customers: bucket.visitors.len() as u64,
                average_view_time: mean_view_minutes(bucket.detections.iter().copied()).round()
                    as i64,
            }
        })
        .collect()
}
