use crate::models::{
    EffectiveQuery, ResultRecord, SearchContext, SearchMode, SearchOutcome, SearchRequest,
    SortFilterCriteria, SortKey, DEFAULT_RESULT_LIMIT,
};
use crate::ranking::rank;
use crate::schema::{default_registry, CollectionSchema};
use crate::traits::{CollectionQuery, HintExtractor, QueryKind, VectorDatabase};
use crate::SearchError;
use base64::{engine::general_purpose::STANDARD, Engine};
use tracing::{debug, info, warn};

const HYBRID_ALPHA: f32 = 0.5;

/// Fans one query out to the registered collections and aggregates the answers
/// into a single ranked list.
pub struct SearchDispatcher<D, H>
where
    D: VectorDatabase,
    H: HintExtractor,
{
    database: D,
    hints: H,
    collections: Vec<CollectionSchema>,
    per_collection_limit: usize,
}

/// What each visited collection is asked, plus any sort override the query implied.
struct DispatchPlan {
    kind: QueryKind,
    image_only: bool,
    sort_override: Option<SortKey>,
}

impl<D, H> SearchDispatcher<D, H>
where
    D: VectorDatabase + Send + Sync,
    H: HintExtractor + Send + Sync,
{
    pub fn new(database: D, hints: H) -> Self {
        Self {
            database,
            hints,
            collections: default_registry(),
            per_collection_limit: DEFAULT_RESULT_LIMIT,
        }
    }

    pub fn with_collections(mut self, collections: Vec<CollectionSchema>) -> Self {
        self.collections = collections;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.per_collection_limit = limit.max(1);
        self
    }

    pub fn database(&self) -> &D {
        &self.database
    }

    pub async fn search_context(&self, context: &SearchContext) -> SearchOutcome {
        self.search(&context.request).await
    }

    pub async fn search(&self, request: &SearchRequest) -> SearchOutcome {
        let Some(effective) = request.query.effective() else {
            debug!("no usable query, skipping search");
            return SearchOutcome::default();
        };

        let plan = self.plan(effective, request.mode).await;
        let mut outcome = SearchOutcome {
            inferred_sort_override: plan.sort_override,
            ..Default::default()
        };

        for target in self.targets(request) {
            let schema = match self.schema(target) {
                Some(schema) => schema,
                None => {
                    warn!(collection = %target, "unknown collection skipped");
                    outcome.skipped.push(target.to_string());
                    continue;
                }
            };

            if plan.image_only && !schema.modality.accepts_image_query() {
                continue;
            }

            match self.query_collection(schema, &plan.kind).await {
                Ok(records) => {
                    debug!(collection = %schema.name, hits = records.len(), "collection answered");
                    outcome.records.extend(records);
                }
                Err(error) => {
                    warn!(collection = %schema.name, %error, "collection query failed, skipped");
                    outcome.skipped.push(schema.name.clone());
                }
            }
        }

        let criteria = SortFilterCriteria {
            sort_key: plan.sort_override.unwrap_or(request.criteria.sort_key),
            ..request.criteria.clone()
        };
        rank(&mut outcome.records, &criteria);

        info!(
            hits = outcome.records.len(),
            skipped = outcome.skipped.len(),
            sort = ?criteria.sort_key,
            "search complete"
        );
        outcome
    }

    async fn plan(&self, query: EffectiveQuery<'_>, mode: SearchMode) -> DispatchPlan {
        let text = match query {
            EffectiveQuery::Image(bytes) => {
                return DispatchPlan {
                    kind: QueryKind::NearImage {
                        image: STANDARD.encode(bytes),
                    },
                    image_only: true,
                    sort_override: None,
                };
            }
            EffectiveQuery::Text(text) => text,
        };

        let (kind, sort_override) = match mode {
            SearchMode::Vector => (near_text(text), None),
            SearchMode::Keyword => (
                QueryKind::Bm25 {
                    query: text.to_string(),
                },
                None,
            ),
            SearchMode::Hybrid => (
                QueryKind::Hybrid {
                    query: text.to_string(),
                    alpha: HYBRID_ALPHA,
                },
                None,
            ),
            SearchMode::Assisted => self.assisted(text).await,
        };

        DispatchPlan {
            kind,
            image_only: false,
            sort_override,
        }
    }

    async fn assisted(&self, text: &str) -> (QueryKind, Option<SortKey>) {
        match self.hints.extract_hint(text).await {
            Ok(hint) => {
                let keywords = hint.content_keywords();
                let sort_override = hint.requests_date_sort().then_some(SortKey::Date);
                debug!(?keywords, ?sort_override, "query hint extracted");

                let kind = if keywords.is_empty() {
                    near_text(text)
                } else {
                    QueryKind::NearText { concepts: keywords }
                };
                (kind, sort_override)
            }
            Err(error) => {
                warn!(%error, "query hint unavailable, searching raw text");
                (near_text(text), None)
            }
        }
    }

    fn targets<'a>(&'a self, request: &'a SearchRequest) -> Vec<&'a str> {
        if request.collections.is_empty() {
            self.collections
                .iter()
                .map(|schema| schema.name.as_str())
                .collect()
        } else {
            request.collections.iter().map(String::as_str).collect()
        }
    }

    fn schema(&self, name: &str) -> Option<&CollectionSchema> {
        self.collections.iter().find(|schema| schema.name == name)
    }

    async fn query_collection(
        &self,
        schema: &CollectionSchema,
        kind: &QueryKind,
    ) -> Result<Vec<ResultRecord>, SearchError> {
        let query = CollectionQuery {
            collection: schema.name.clone(),
            modality: schema.modality,
            properties: schema.returned_properties(),
            limit: self.per_collection_limit,
            kind: kind.clone(),
        };

        let mut records = self.database.query(&query).await?;
        for record in &mut records {
            record.collection = schema.name.clone();
            record.modality = schema.modality;
        }
        Ok(records)
    }
}

fn near_text(text: &str) -> QueryKind {
    QueryKind::NearText {
        concepts: vec![text.to_string()],
    }
}
