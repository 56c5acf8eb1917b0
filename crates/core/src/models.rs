use crate::SearchError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;

pub type PropertyBag = Map<String, Value>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum Modality {
    #[default]
    Image,
    Tabular,
    Pdf,
    Video,
}

impl Modality {
    /// Collections vectorized with the multi-modal bind module answer near-image queries.
    pub fn accepts_image_query(self) -> bool {
        matches!(self, Modality::Image | Modality::Video)
    }

    /// Sub directory of the data root holding the source files of this modality.
    pub fn data_subdir(self) -> Option<&'static str> {
        match self {
            Modality::Image => Some("images"),
            Modality::Pdf => Some("pdf"),
            Modality::Video => Some("videos"),
            Modality::Tabular => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultRecord {
    pub collection: String,
    pub modality: Modality,
    pub id: Option<String>,
    pub properties: PropertyBag,
    /// Similarity distance, lower is closer. Only set by near-text and near-image queries.
    pub distance: Option<f64>,
    /// Keyword or hybrid score, higher is better.
    pub score: Option<f64>,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
}

impl ResultRecord {
    pub fn new(collection: impl Into<String>, modality: Modality, properties: PropertyBag) -> Self {
        let created_at = timestamp_property(&properties, "date_created");
        let modified_at = timestamp_property(&properties, "date_modified");

        Self {
            collection: collection.into(),
            modality,
            id: None,
            properties,
            distance: None,
            score: None,
            created_at,
            modified_at,
        }
    }

    pub fn with_distance(mut self, distance: Option<f64>) -> Self {
        self.distance = distance.filter(|value| !value.is_nan());
        self
    }

    pub fn with_score(mut self, score: Option<f64>) -> Self {
        self.score = score.filter(|value| !value.is_nan());
        self
    }

    pub fn filename(&self) -> Option<&str> {
        self.properties.get("filename").and_then(Value::as_str)
    }

    pub fn title(&self) -> Option<&str> {
        self.properties.get("title").and_then(Value::as_str)
    }

    /// Filename for file-backed records, title for tabular rows.
    pub fn display_name(&self) -> &str {
        self.filename().or_else(|| self.title()).unwrap_or("<unnamed>")
    }
}

fn timestamp_property(properties: &PropertyBag, key: &str) -> Option<DateTime<Utc>> {
    properties
        .get(key)
        .and_then(Value::as_str)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|parsed| parsed.with_timezone(&Utc))
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum SortKey {
    #[default]
    Relevance,
    Date,
}

impl FromStr for SortKey {
    type Err = SearchError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "relevance" => Ok(SortKey::Relevance),
            "date" => Ok(SortKey::Date),
            other => Err(SearchError::Request(format!(
                "unknown sort key {other}; use relevance or date"
            ))),
        }
    }
}

/// Inclusive calendar-day bounds on `modified_at`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct DateRange {
    pub after: Option<NaiveDate>,
    pub before: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(after: Option<NaiveDate>, before: Option<NaiveDate>) -> Result<Self, SearchError> {
        if let (Some(start), Some(end)) = (after, before) {
            if start > end {
                return Err(SearchError::Request(format!(
                    "date range start {start} is after end {end}"
                )));
            }
        }
        Ok(Self { after, before })
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        let day = timestamp.date_naive();
        self.after.map_or(true, |start| day >= start) && self.before.map_or(true, |end| day <= end)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SortFilterCriteria {
    pub sort_key: SortKey,
    /// Keep records whose distance is present and `<=` this threshold.
    pub relevance_filter: Option<f64>,
    pub date_range: Option<DateRange>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum SearchMode {
    #[default]
    Vector,
    Keyword,
    Hybrid,
    Assisted,
}

impl FromStr for SearchMode {
    type Err = SearchError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "vector" | "near-text" => Ok(SearchMode::Vector),
            "keyword" | "bm25" => Ok(SearchMode::Keyword),
            "hybrid" => Ok(SearchMode::Hybrid),
            "assisted" | "llm" => Ok(SearchMode::Assisted),
            other => Err(SearchError::Request(format!(
                "unknown search mode {other}; use vector, keyword, hybrid or assisted"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryInput {
    pub text: Option<String>,
    pub image: Option<Vec<u8>>,
}

/// The query that will actually run once priorities are applied.
#[derive(Debug, Clone, PartialEq)]
pub enum EffectiveQuery<'a> {
    Image(&'a [u8]),
    Text(&'a str),
}

impl QueryInput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            image: None,
        }
    }

    pub fn image(bytes: Vec<u8>) -> Self {
        Self {
            text: None,
            image: Some(bytes),
        }
    }

    /// An image wins over text; blank text counts as absent.
    pub fn effective(&self) -> Option<EffectiveQuery<'_>> {
        if let Some(image) = self.image.as_deref().filter(|bytes| !bytes.is_empty()) {
            return Some(EffectiveQuery::Image(image));
        }

        self.text
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(EffectiveQuery::Text)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub query: QueryInput,
    pub mode: SearchMode,
    /// Target collections in visiting order. Empty means every registered collection.
    pub collections: Vec<String>,
    pub criteria: SortFilterCriteria,
}

#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub records: Vec<ResultRecord>,
    pub inferred_sort_override: Option<SortKey>,
    pub skipped: Vec<String>,
}

/// Request-scoped state handed to the search handlers.
#[derive(Debug, Clone)]
pub struct SearchContext {
    pub request: SearchRequest,
    pub page: usize,
    pub page_size: usize,
    pub data_root: PathBuf,
}

impl SearchContext {
    pub fn new(request: SearchRequest, data_root: impl Into<PathBuf>) -> Self {
        Self {
            request,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            data_root: data_root.into(),
        }
    }
}

pub const DEFAULT_PAGE_SIZE: usize = 9;
pub const DEFAULT_RESULT_LIMIT: usize = 6;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataObject {
    pub id: Uuid,
    pub properties: PropertyBag,
}

impl DataObject {
    /// Ids are derived from the source name so re-ingesting the same file replaces it.
    pub fn named(name: &str, properties: PropertyBag) -> Self {
        Self {
            id: Uuid::new_v5(&Uuid::NAMESPACE_DNS, name.as_bytes()),
            properties,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordError {
    pub index: usize,
    pub source: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub attempted: usize,
    pub inserted: usize,
    pub errors: Vec<RecordError>,
}

impl BatchReport {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct IngestionOptions {
    pub batch_size: usize,
    pub csv_row_limit: Option<usize>,
    pub abstract_heading: &'static str,
    pub abstract_fallback_blocks: usize,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            batch_size: 100,
            csv_row_limit: Some(5),
            abstract_heading: "Abstract",
            abstract_fallback_blocks: 20,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bag(value: Value) -> PropertyBag {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn record_parses_modified_timestamp_and_ignores_garbage() {
        let record = ResultRecord::new(
            "pdf",
            Modality::Pdf,
            bag(json!({
                "filename": "report.pdf",
                "date_modified": "2024-03-01T10:00:00+00:00",
                "date_created": "not a date",
            })),
        );

        assert!(record.modified_at.is_some());
        assert!(record.created_at.is_none());
        assert_eq!(record.display_name(), "report.pdf");
    }

    #[test]
    fn tabular_rows_fall_back_to_title() {
        let record = ResultRecord::new(
            "WineReviews",
            Modality::Tabular,
            bag(json!({"title": "Nicosia 2013 Vulkà Bianco (Etna)."})),
        );
        assert_eq!(record.display_name(), "Nicosia 2013 Vulkà Bianco (Etna).");
        assert!(record.modified_at.is_none());
    }

    #[test]
    fn image_takes_priority_over_text() {
        let query = QueryInput {
            text: Some("lions".to_string()),
            image: Some(vec![1, 2, 3]),
        };
        assert_eq!(query.effective(), Some(EffectiveQuery::Image(&[1, 2, 3])));
    }

    #[test]
    fn blank_text_without_image_is_no_query() {
        assert_eq!(QueryInput::text("   ").effective(), None);
        assert_eq!(QueryInput::default().effective(), None);
    }

    #[test]
    fn date_range_is_inclusive_and_rejects_inverted_bounds() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1);
        let end = NaiveDate::from_ymd_opt(2024, 1, 31);
        let range = DateRange::new(start, end).expect("valid range");

        let first_day = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .expect("timestamp")
            .with_timezone(&Utc);
        let last_day = DateTime::parse_from_rfc3339("2024-01-31T23:59:59Z")
            .expect("timestamp")
            .with_timezone(&Utc);
        assert!(range.contains(first_day));
        assert!(range.contains(last_day));
        assert!(DateRange::new(end, start).is_err());
    }

    #[test]
    fn single_bound_ranges_are_open_on_the_other_side() {
        let day = NaiveDate::from_ymd_opt(2024, 6, 15);
        let at = |text: &str| {
            DateTime::parse_from_rfc3339(text)
                .expect("timestamp")
                .with_timezone(&Utc)
        };

        let after_only = DateRange::new(day, None).expect("valid range");
        assert!(after_only.contains(at("2024-06-15T00:00:00Z")));
        assert!(after_only.contains(at("2099-01-01T12:00:00Z")));
        assert!(!after_only.contains(at("2024-06-14T23:59:59Z")));

        let before_only = DateRange::new(None, day).expect("valid range");
        assert!(before_only.contains(at("2024-06-15T23:59:59Z")));
        assert!(before_only.contains(at("1990-01-01T00:00:00Z")));
        assert!(!before_only.contains(at("2024-06-16T00:00:00Z")));
    }

    #[test]
    fn modes_and_sort_keys_parse_from_cli_strings() {
        assert_eq!("BM25".parse::<SearchMode>().ok(), Some(SearchMode::Keyword));
        assert_eq!("assisted".parse::<SearchMode>().ok(), Some(SearchMode::Assisted));
        assert_eq!("Date".parse::<SortKey>().ok(), Some(SortKey::Date));
        assert!("newest".parse::<SortKey>().is_err());
    }

    #[test]
    fn named_objects_have_stable_ids() {
        let first = DataObject::named("cat.jpg", PropertyBag::new());
        let second = DataObject::named("cat.jpg", PropertyBag::new());
        assert_eq!(first.id, second.id);
    }
}
