use std::collections::{BTreeSet, HashSet};

use super::daily::build_daily_history;
use super::metrics::{compute_summary, WindowEvents};
use super::ranking::build_ranking;
use super::types::{
    AnalyticsData, AnalyticsReport, DailyHistoryRow, DetectionEvent, Period, RankingRow,
    SummaryMetrics, VisitEvent,
};
use super::{AnalyticsError, ReportOptions};
use crate::repository::event_store::EventStore;

/// Fetches both windows for `org_id` and aggregates them into a report.
pub async fn generate_report(
    store: &dyn EventStore,
    org_id: &str,
    period: &Period,
    options: &ReportOptions,
) -> Result<AnalyticsReport, AnalyticsError> {
    let prior = period.preceding()?;

    let (detections, visits, prior_detections, prior_visits) = tokio::try_join!(
        store.get_detections(org_id, period.start, period.end),
        store.get_visits(org_id, period.start, period.end),
        store.get_detections(org_id, prior.start, prior.end),
        store.get_visits(org_id, prior.start, prior.end),
    )?;
    let detections = retain_detections_within(detections, period);
    let prior_detections = retain_detections_within(prior_detections, &prior);
    let visits = retain_visits(visits, period, options.min_visit_confidence);
    let prior_visits = retain_visits(prior_visits, &prior, options.min_visit_confidence);

    let viewer_ids = sorted_unique(detections.iter().map(|event| &event.viewer_identity));
    let billboard_ids = sorted_unique(detections.iter().map(|event| &event.billboard_id));
    let (returning_viewers, metadata) = tokio::try_join!(
        store.first_seen_before_many(org_id, &viewer_ids, period.start),
        store.get_billboard_metadata_many(&billboard_ids),
    )?;

    // Only current-window new viewers are reported.
    let no_history = HashSet::new();
    let summary = compute_summary(
        WindowEvents {
            detections: &detections,
            visits: &visits,
            returning_viewers: &returning_viewers,
        },
        WindowEvents {
            detections: &prior_detections,
            visits: &prior_visits,
            returning_viewers: &no_history,
        },
        options.customer_visit_threshold,
    );
    let daily_history = build_daily_history(period, &detections, &visits);
    let ranking = build_ranking(&detections, &metadata, options.ranking_limit);

    let report = assemble(org_id, period, summary, daily_history, ranking)?;
    tracing::info!(
        org_id,
        days = period.days,
        detections = detections.len(),
        visits = visits.len(),
        prior_detections = prior_detections.len(),
        ranked_billboards = report.data.ranking.len(),
        backend = store.backend_name(),
        "Analytics report generated"
    );
    Ok(report)
}

/// Composes the report; refuses a daily history that does not cover the period.
pub fn assemble(
    org_id: &str,
    period: &Period,
    summary: SummaryMetrics,
    daily_history: Vec<DailyHistoryRow>,
    ranking: Vec<RankingRow>,
) -> Result<AnalyticsReport, AnalyticsError> {
    if daily_history.len() as i64 != period.days {
        tracing::error!(
            org_id,
            expected = period.days,
            actual = daily_history.len(),
            "Daily history does not cover the report period"
        );
        return Err(AnalyticsError::InconsistentAggregation {
            expected: period.days,
            actual: daily_history.len(),
        });
    }

    Ok(AnalyticsReport {
        success: true,
        org_id: org_id.to_string(),
        period: *period,
        data: AnalyticsData {
            summary,
            daily_history,
            ranking,
        },
    })
}

fn retain_detections_within(
    mut detections: Vec<DetectionEvent>,
    window: &Period,
) -> Vec<DetectionEvent> {
    detections.retain(|event| window.contains(event.detected_at));
    detections
}

/// Keeps in-window visits scored at or above `min_confidence`.
fn retain_visits(
    mut visits: Vec<VisitEvent>,
    window: &Period,
    min_confidence: f64,
) -> Vec<VisitEvent> {
    visits.retain(|visit| {
        window.contains(visit.visited_at)
            && (min_confidence <= 0.0 || visit.confidence_score >= min_confidence)
    });
    visits
}

fn sorted_unique<'a, I>(values: I) -> Vec<String>
where
    I: Iterator<Item = &'a String>,
{
    values
        .collect::<BTreeSet<_>>()
        .into_iter()
        .cloned()
        .collect()
}
