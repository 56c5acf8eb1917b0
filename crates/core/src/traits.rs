use crate::models::{BatchReport, DataObject, Modality, ResultRecord};
use crate::schema::CollectionSchema;
use crate::{HintError, SearchError, StructuredHint};
use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq)]
pub enum QueryKind {
    NearText { concepts: Vec<String> },
    /// Base64 encoded image bytes.
    NearImage { image: String },
    Bm25 { query: String },
    Hybrid { query: String, alpha: f32 },
}

impl QueryKind {
    /// Similarity queries report a distance, keyword and hybrid queries a score.
    pub fn reports_distance(&self) -> bool {
        matches!(self, QueryKind::NearText { .. } | QueryKind::NearImage { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollectionQuery {
    pub collection: String,
    pub modality: Modality,
    pub properties: Vec<String>,
    pub limit: usize,
    pub kind: QueryKind,
}

#[async_trait]
pub trait VectorDatabase {
    /// Removing a collection that does not exist is not an error.
    async fn delete_collection(&self, name: &str) -> Result<(), SearchError>;

    async fn create_collection(&self, schema: &CollectionSchema) -> Result<(), SearchError>;

    /// Inserts a batch; per-object failures are reported by position within `objects`.
    async fn insert_many(
        &self,
        collection: &str,
        objects: &[DataObject],
    ) -> Result<BatchReport, SearchError>;

    async fn count(&self, collection: &str) -> Result<u64, SearchError>;

    async fn query(&self, query: &CollectionQuery) -> Result<Vec<ResultRecord>, SearchError>;
}

#[async_trait]
pub trait HintExtractor {
    async fn extract_hint(&self, query: &str) -> Result<StructuredHint, HintError>;
}
