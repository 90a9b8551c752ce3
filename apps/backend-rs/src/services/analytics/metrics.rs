use std::collections::{HashMap, HashSet};

use super::types::{DetectionEvent, SummaryMetrics, VisitEvent};

/// Raw records of one aggregation window.
#[derive(Debug, Clone, Copy)]
pub struct WindowEvents<'a> {
    pub detections: &'a [DetectionEvent],
    pub visits: &'a [VisitEvent],
    /// Identities detected at least once before the window started.
    pub returning_viewers: &'a HashSet<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct WindowMetrics {
    viewers: u64,
    new_viewers: u64,
    customers: u64,
    average_view_time: i64,
}

pub fn compute_summary(
    current: WindowEvents<'_>,
    prior: WindowEvents<'_>,
    customer_visit_threshold: u32,
) -> SummaryMetrics {
    let now = window_metrics(current, customer_visit_threshold);
    let before = window_metrics(prior, customer_visit_threshold);

    SummaryMetrics {
        total_viewers: now.viewers,
        difference_total_viewers_percentage: percentage_change(
            now.viewers as f64,
            before.viewers as f64,
        ),
        total_new_viewers: now.new_viewers,
        total_customers: now.customers,
        difference_total_customers_percentage: percentage_change(
            now.customers as f64,
            before.customers as f64,
        ),
        average_view_time: now.average_view_time,
        difference_average_view_time: percentage_change(
            now.average_view_time as f64,
            before.average_view_time as f64,
        ),
    }
}

/// `round(100 * (current - prior) / prior)`, or 0 when there is no prior value.
pub fn percentage_change(current: f64, prior: f64) -> i64 {
    if prior <= 0.0 {
        return 0;
    }
    (100.0 * (current - prior) / prior).round() as i64
}

pub fn distinct_viewers(detections: &[DetectionEvent]) -> HashSet<&str> {
    detections
        .iter()
        .map(|event| event.viewer_identity.as_str())
        .collect()
}

/// Identities with at least `threshold` visits among `visits`.
pub fn customers(visits: &[VisitEvent], threshold: u32) -> HashSet<&str> {
    let mut counts: HashMap<&str, u32> = HashMap::new();
    for visit in visits {
        *counts.entry(visit.viewer_identity.as_str()).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .filter(|(_, count)| *count >= threshold)
        .map(|(identity, _)| identity)
        .collect()
}

/// Mean view duration in minutes, unrounded; 0 with no detections.
pub fn mean_view_minutes<'a, I>(detections: I) -> f64
where
    I: IntoIterator<Item = &'a DetectionEvent>,
{
    let (total, count) = detections
        .into_iter()
        .fold((0.0_f64, 0_u64), |(total, count), event| {
            (total + event.view_duration.max(0.0), count + 1)
        });
    if count == 0 {
        return 0.0;
    }
    total / count as f64 / 60.0
}

fn window_metrics(window: WindowEvents<'_>, threshold: u32) -> WindowMetrics {
    let viewers = distinct_viewers(window.detections);
    let new_viewers = viewers
        .iter()
        .filter(|identity| !window.returning_viewers.contains(**identity))
        .count() as u64;

    WindowMetrics {
        viewers: viewers.len() as u64,
        new_viewers,
        customers: customers(window.visits, threshold).len() as u64,
        average_view_time: mean_view_minutes(window.detections).round() as i64,
    }
}
