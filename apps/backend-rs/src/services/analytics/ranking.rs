use std::collections::{HashMap, HashSet};

use super::metrics::mean_view_minutes;
use super::types::{BillboardMetadata, DetectionEvent, RankingRow};

/// Ranks billboards by detection count. Billboards without detections never
/// appear; unknown billboards are still ranked with empty metadata.
pub fn build_ranking(
    detections: &[DetectionEvent],
    metadata: &HashMap<String, BillboardMetadata>,
    limit: Option<usize>,
) -> Vec<RankingRow> {
    let mut by_billboard: HashMap<&str, Vec<&DetectionEvent>> = HashMap::new();
    for event in detections {
        by_billboard
            .entry(event.billboard_id.as_str())
            .or_default()
            .push(event);
    }

    let mut rows = by_billboard
        .into_iter()
        .filter(|(_, events)| !events.is_empty())
        .map(|(billboard_id, events)| {
            let views = events.len() as u64;
            let unique_viewers = events
                .iter()
                .map(|event| event.viewer_identity.as_str())
                .collect::<HashSet<_>>()
                .len();
            let meta = metadata.get(billboard_id).cloned().unwrap_or_default();
            RankingRow {
                rank: 0,
                billboard_id: billboard_id.to_string(),
                name: meta.name,
                location: meta.location,
                views,
                visit_by_view: visit_by_view(unique_viewers as u64, views),
                viewing_duration: round2(mean_view_minutes(events.iter().copied())),
            }
        })
        .collect::<Vec<_>>();

    rows.sort_by(|left, right| {
        right
            .views
            .cmp(&left.views)
            .then_with(|| left.billboard_id.cmp(&right.billboard_id))
    });
    if let Some(limit) = limit {
        rows.truncate(limit);
    }
    for (index, row) in rows.iter_mut().enumerate() {
        row.rank = index as u32 + 1;
    }
    rows
}

fn visit_by_view(unique_viewers: u64, views: u64) -> f64 {
    if views == 0 {
        return 0.0;
    }
    round3(unique_viewers as f64 / views as f64)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
