use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// One observed instance of a viewer facing a billboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionEvent {
    pub billboard_id: String,
    pub viewer_identity: String,
    pub detected_at: DateTime<Utc>,
    /// Seconds spent looking at the billboard.
    pub view_duration: f64,
}

/// One observed instance of a person present at a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitEvent {
    pub store_id: String,
    pub viewer_identity: String,
    pub visited_at: DateTime<Utc>,
    /// Seconds spent in the store.
    pub duration: f64,
    pub confidence_score: f64,
    #[serde(default)]
    pub had_billboard_exposure: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillboardMetadata {
    pub name: Option<String>,
    pub location: Option<String>,
}

/// Closed aggregation window in UTC. Build it through `period::resolve_*`
/// so that `start`/`end` sit on whole-day boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Period {
    #[serde(serialize_with = "serialize_instant")]
    pub start: DateTime<Utc>,
    #[serde(serialize_with = "serialize_instant")]
    pub end: DateTime<Utc>,
    pub days: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SummaryMetrics {
    pub total_viewers: u64,
    pub difference_total_viewers_percentage: i64,
    pub total_new_viewers: u64,
    pub total_customers: u64,
    pub difference_total_customers_percentage: i64,
    /// Minutes.
    pub average_view_time: i64,
    pub difference_average_view_time: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyHistoryRow {
    pub date: NaiveDate,
    pub day_of_week: String,
    pub viewers: u64,
    pub customers: u64,
    pub average_view_time: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingRow {
    pub rank: u32,
    pub billboard_id: String,
    pub name: Option<String>,
    pub location: Option<String>,
    pub views: u64,
    pub visit_by_view: f64,
    /// Minutes.
    pub viewing_duration: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsData {
    pub summary: SummaryMetrics,
    pub daily_history: Vec<DailyHistoryRow>,
    pub ranking: Vec<RankingRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsReport {
    pub success: bool,
    pub org_id: String,
    pub period: Period,
    pub data: AnalyticsData,
}

fn serialize_instant<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Secs, true))
}
