use crate::models::{BatchReport, DataObject, RecordError, ResultRecord};
use crate::schema::{class_name, CollectionSchema};
use crate::traits::{CollectionQuery, QueryKind, VectorDatabase};
use crate::SearchError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

const BACKEND: &str = "weaviate";

pub struct WeaviateStore {
    endpoint: Url,
    client: Client,
}

impl WeaviateStore {
    pub fn new(endpoint: &str) -> Result<Self, SearchError> {
        let mut endpoint = Url::parse(endpoint)?;
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }

        Ok(Self {
            endpoint,
            client: Client::new(),
        })
    }

    fn url(&self, path: &str) -> Result<Url, SearchError> {
        Ok(self.endpoint.join(path)?)
    }

    async fn graphql(&self, query: String) -> Result<Value, SearchError> {
        debug!(%query, "weaviate graphql");
        let response = self
            .client
            .post(self.url("v1/graphql")?)
            .json(&json!({ "query": query }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(backend_error(response.status().to_string()));
        }

        let body: Value = response.json().await?;
        check_graphql_errors(&body)?;
        Ok(body)
    }
}

#[async_trait]
impl VectorDatabase for WeaviateStore {
    async fn delete_collection(&self, name: &str) -> Result<(), SearchError> {
        let response = self
            .client
            .delete(self.url(&format!("v1/schema/{}", class_name(name)))?)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(());
        }

        Err(backend_error(status.to_string()))
    }

    async fn create_collection(&self, schema: &CollectionSchema) -> Result<(), SearchError> {
        let response = self
            .client
            .post(self.url("v1/schema")?)
            .json(&schema.to_class_definition())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(backend_error(format!("{status}: {body}")));
        }

        Ok(())
    }

    async fn insert_many(
        &self,
        collection: &str,
        objects: &[DataObject],
    ) -> Result<BatchReport, SearchError> {
        if objects.is_empty() {
            return Ok(BatchReport::default());
        }

        let class = class_name(collection);
        let payload = objects
            .iter()
            .map(|object| {
                json!({
                    "class": class,
                    "id": object.id,
                    "properties": object.properties,
                })
            })
            .collect::<Vec<_>>();

        let response = self
            .client
            .post(self.url("v1/batch/objects")?)
            .json(&json!({ "objects": payload }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(backend_error(response.status().to_string()));
        }

        let body: Value = response.json().await?;
        Ok(parse_batch_response(&body, objects))
    }

    async fn count(&self, collection: &str) -> Result<u64, SearchError> {
        let class = class_name(collection);
        let body = self
            .graphql(format!("{{ Aggregate {{ {class} {{ meta {{ count }} }} }} }}"))
            .await?;

        body.pointer(&format!("/data/Aggregate/{class}/0/meta/count"))
            .and_then(Value::as_u64)
            .ok_or_else(|| backend_error(format!("aggregate response had no count for {class}")))
    }

    async fn query(&self, query: &CollectionQuery) -> Result<Vec<ResultRecord>, SearchError> {
        let body = self.graphql(build_get_query(query)?).await?;
        parse_get_response(&body, query)
    }
}

fn backend_error(details: String) -> SearchError {
    SearchError::BackendResponse {
        backend: BACKEND.to_string(),
        details,
    }
}

fn check_graphql_errors(body: &Value) -> Result<(), SearchError> {
    let Some(errors) = body.pointer("/errors").and_then(Value::as_array) else {
        return Ok(());
    };
    let Some(first) = errors.first() else {
        return Ok(());
    };

    let message = first
        .pointer("/message")
        .and_then(Value::as_str)
        .unwrap_or("unknown graphql error")
        .to_string();

    // Querying a class that was never created fails schema validation.
    if message.starts_with("Cannot query field") {
        return Err(SearchError::NotFound(message));
    }

    Err(backend_error(message))
}

pub fn build_get_query(query: &CollectionQuery) -> Result<String, SearchError> {
    let operator = match &query.kind {
        QueryKind::NearText { concepts } => {
            format!("nearText: {{concepts: {}}}", serde_json::to_string(concepts)?)
        }
        QueryKind::NearImage { image } => {
            format!("nearImage: {{image: {}}}", serde_json::to_string(image)?)
        }
        QueryKind::Bm25 { query } => format!("bm25: {{query: {}}}", serde_json::to_string(query)?),
        QueryKind::Hybrid { query, alpha } => format!(
            "hybrid: {{query: {}, alpha: {alpha}}}",
            serde_json::to_string(query)?
        ),
    };

    let additional = if query.kind.reports_distance() {
        "id distance"
    } else {
        "id score"
    };

    Ok(format!(
        "{{ Get {{ {class}({operator}, limit: {limit}) {{ {fields} _additional {{ {additional} }} }} }} }}",
        class = class_name(&query.collection),
        limit = query.limit,
        fields = query.properties.join(" "),
    ))
}

pub fn parse_get_response(
    body: &Value,
    query: &CollectionQuery,
) -> Result<Vec<ResultRecord>, SearchError> {
    let class = class_name(&query.collection);
    let hits = body
        .pointer(&format!("/data/Get/{class}"))
        .and_then(Value::as_array)
        .ok_or_else(|| backend_error(format!("get response had no {class} results")))?;

    let mut records = Vec::with_capacity(hits.len());
    for hit in hits {
        let Some(object) = hit.as_object() else {
            continue;
        };

        let mut properties = object.clone();
        let additional = properties.remove("_additional").unwrap_or(Value::Null);
        properties.retain(|_, value| !value.is_null());

        let mut record = ResultRecord::new(&query.collection, query.modality, properties)
            .with_distance(additional.pointer("/distance").and_then(Value::as_f64))
            .with_score(additional.pointer("/score").and_then(numeric));
        record.id = additional
            .pointer("/id")
            .and_then(Value::as_str)
            .map(str::to_string);

        records.push(record);
    }

    Ok(records)
}

/// Scores come back as strings from some query operators.
fn numeric(value: &Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|raw| raw.parse().ok()))
}

fn parse_batch_response(body: &Value, objects: &[DataObject]) -> BatchReport {
    let mut errors = Vec::new();

    if let Some(results) = body.as_array() {
        for (index, result) in results.iter().enumerate() {
            let messages = result
                .pointer("/result/errors/error")
                .and_then(Value::as_array)
                .map(|entries| {
                    entries
                        .iter()
                        .filter_map(|entry| entry.pointer("/message").and_then(Value::as_str))
                        .collect::<Vec<_>>()
                        .join("; ")
                })
                .filter(|joined| !joined.is_empty());

            if let Some(message) = messages {
                errors.push(RecordError {
                    index,
                    source: objects
                        .get(index)
                        .map(|object| object.id.to_string())
                        .unwrap_or_default(),
                    message,
                });
            }
        }
    }

    BatchReport {
        attempted: objects.len(),
        inserted: objects.len().saturating_sub(errors.len()),
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Modality, PropertyBag};

    fn pdf_query(kind: QueryKind) -> CollectionQuery {
        CollectionQuery {
            collection: "pdf".to_string(),
            modality: Modality::Pdf,
            properties: vec!["filename".to_string(), "date_modified".to_string()],
            limit: 6,
            kind,
        }
    }

    #[test]
    fn near_text_query_asks_for_distance() {
        let query = pdf_query(QueryKind::NearText {
            concepts: vec!["home \"prices\"".to_string()],
        });
        let graphql = build_get_query(&query).expect("query should build");

        assert!(graphql.contains("Pdf(nearText: {concepts: [\"home \\\"prices\\\"\"]}, limit: 6)"));
        assert!(graphql.contains("filename date_modified _additional { id distance }"));
    }

    #[test]
    fn keyword_query_asks_for_score() {
        let graphql = build_get_query(&pdf_query(QueryKind::Bm25 {
            query: "tart wine".to_string(),
        }))
        .expect("query should build");

        assert!(graphql.contains("bm25: {query: \"tart wine\"}"));
        assert!(graphql.contains("_additional { id score }"));
    }

    #[test]
    fn get_response_becomes_records() {
        let body = json!({
            "data": {
                "Get": {
                    "Pdf": [
                        {
                            "filename": "a.pdf",
                            "date_modified": "2024-02-01T00:00:00Z",
                            "author": null,
                            "_additional": {"id": "abc", "distance": 0.25}
                        },
                        {
                            "filename": "b.pdf",
                            "_additional": {"id": "def"}
                        }
                    ]
                }
            }
        });

        let query = pdf_query(QueryKind::NearText {
            concepts: vec!["x".to_string()],
        });
        let records = parse_get_response(&body, &query).expect("response should parse");

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].collection, "pdf");
        assert_eq!(records[0].distance, Some(0.25));
        assert_eq!(records[0].id.as_deref(), Some("abc"));
        assert!(records[0].modified_at.is_some());
        assert!(!records[0].properties.contains_key("author"));
        assert_eq!(records[1].distance, None);
        assert!(records[1].modified_at.is_none());
    }

    #[test]
    fn string_scores_are_parsed() {
        let body = json!({
            "data": {"Get": {"Pdf": [{"filename": "a.pdf", "_additional": {"score": "0.75"}}]}}
        });
        let query = pdf_query(QueryKind::Hybrid {
            query: "x".to_string(),
            alpha: 0.5,
        });
        let records = parse_get_response(&body, &query).expect("response should parse");
        assert_eq!(records[0].score, Some(0.75));
        assert_eq!(records[0].distance, None);
    }

    #[test]
    fn missing_class_error_maps_to_not_found() {
        let body = json!({
            "errors": [{"message": "Cannot query field \"Videos\" on type \"GetObjectsObj\"."}]
        });
        assert!(matches!(
            check_graphql_errors(&body),
            Err(SearchError::NotFound(_))
        ));
    }

    #[test]
    fn batch_errors_are_reported_by_position() {
        let objects = (0..3)
            .map(|index| DataObject::named(&format!("file-{index}"), PropertyBag::new()))
            .collect::<Vec<_>>();
        let body = json!([
            {"result": {}},
            {"result": {"errors": {"error": [{"message": "invalid blob"}]}}},
            {"result": {}}
        ]);

        let report = parse_batch_response(&body, &objects);
        assert_eq!(report.attempted, 3);
        assert_eq!(report.inserted, 2);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].index, 1);
        assert_eq!(report.errors[0].message, "invalid blob");
    }

    #[test]
    fn endpoint_without_trailing_slash_keeps_prefix() {
        let store = WeaviateStore::new("http://localhost:8080/weaviate").expect("valid url");
        let url = store.url("v1/schema").expect("joinable");
        assert_eq!(url.as_str(), "http://localhost:8080/weaviate/v1/schema");
    }
}
