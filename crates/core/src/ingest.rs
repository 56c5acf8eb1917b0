use crate::extractor::{LopdfExtractor, PdfExtractor};
use crate::metadata::file_metadata;
use crate::models::{BatchReport, DataObject, IngestionOptions, PropertyBag, RecordError};
use crate::preamble::extract_section;
use crate::schema::{images_schema, pdf_schema, videos_schema, wine_reviews_schema, CollectionSchema};
use crate::traits::VectorDatabase;
use crate::IngestError;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Deserialize;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

/// One source modality: how to find its records and how to turn each into a
/// collection object.
pub trait SourceAdapter {
    type Item;

    fn schema(&self) -> &CollectionSchema;

    fn discover(&self, data_root: &Path) -> Result<Vec<Self::Item>, IngestError>;

    fn describe(&self, item: &Self::Item) -> String;

    fn to_object(&self, item: &Self::Item) -> Result<DataObject, IngestError>;
}

pub type PropertyMapper = fn(&Path, &IngestionOptions) -> Result<PropertyBag, IngestError>;

/// File-backed modality: a schema, a data sub directory, accepted extensions
/// and a mapping from file to properties.
pub struct FileAdapter {
    schema: CollectionSchema,
    subdir: &'static str,
    extensions: &'static [&'static str],
    mapper: PropertyMapper,
    options: IngestionOptions,
}

impl FileAdapter {
    pub fn new(
        schema: CollectionSchema,
        subdir: &'static str,
        extensions: &'static [&'static str],
        mapper: PropertyMapper,
        options: IngestionOptions,
    ) -> Self {
        Self {
            schema,
            subdir,
            extensions,
            mapper,
            options,
        }
    }
}

impl SourceAdapter for FileAdapter {
    type Item = PathBuf;

    fn schema(&self) -> &CollectionSchema {
        &self.schema
    }

    fn discover(&self, data_root: &Path) -> Result<Vec<PathBuf>, IngestError> {
        let folder = data_root.join(self.subdir);
        if !folder.is_dir() {
            return Err(IngestError::InvalidArgument(format!(
                "data directory not found: {}",
                folder.display()
            )));
        }
        Ok(discover_files(&folder, self.extensions))
    }

    fn describe(&self, item: &PathBuf) -> String {
        item.display().to_string()
    }

    fn to_object(&self, item: &PathBuf) -> Result<DataObject, IngestError> {
        let name = file_name(item)?;
        let properties = (self.mapper)(item, &self.options)?;
        Ok(DataObject::named(name, properties))
    }
}

pub fn images_adapter(options: IngestionOptions) -> FileAdapter {
    FileAdapter::new(
        images_schema(),
        "images",
        &["jpg", "jpeg", "png"],
        image_properties,
        options,
    )
}

pub fn pdf_adapter(options: IngestionOptions) -> FileAdapter {
    FileAdapter::new(pdf_schema(), "pdf", &["pdf"], pdf_properties, options)
}

pub fn videos_adapter(options: IngestionOptions) -> FileAdapter {
    FileAdapter::new(videos_schema(), "videos", &["mp4"], video_properties, options)
}

/// Top-level files of `folder` with one of `extensions`, sorted by path.
pub fn discover_files(folder: &Path, extensions: &[&str]) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .max_depth(1)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let accepted = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| extensions.iter().any(|wanted| ext.eq_ignore_ascii_case(wanted)));

        if accepted {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

fn file_name(path: &Path) -> Result<&str, IngestError> {
    path.file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| IngestError::MissingFileName(format!("path missing filename: {}", path.display())))
}

fn image_properties(path: &Path, _options: &IngestionOptions) -> Result<PropertyBag, IngestError> {
    let bytes = fs::read(path)?;
    let mut properties = PropertyBag::new();
    properties.insert("image".to_string(), Value::String(STANDARD.encode(bytes)));
    properties.insert("filename".to_string(), Value::String(file_name(path)?.to_string()));
    Ok(properties)
}

fn video_properties(path: &Path, _options: &IngestionOptions) -> Result<PropertyBag, IngestError> {
    let metadata = file_metadata(path)?;
    let bytes = fs::read(path)?;

    let mut properties = PropertyBag::new();
    properties.insert("video".to_string(), Value::String(STANDARD.encode(bytes)));
    properties.insert("filename".to_string(), Value::String(file_name(path)?.to_string()));
    metadata.write_into(&mut properties);
    Ok(properties)
}

fn pdf_properties(path: &Path, options: &IngestionOptions) -> Result<PropertyBag, IngestError> {
    let metadata = file_metadata(path)?;
    let content = LopdfExtractor.extract(path)?;
    let blocks = content.blocks();

    let extraction = extract_section(&blocks, options.abstract_heading);
    let summary = if extraction.text.trim().is_empty() {
        blocks
            .iter()
            .take(options.abstract_fallback_blocks)
            .map(|block| block.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    } else {
        extraction.text
    };

    let pages = content
        .pages
        .iter()
        .map(|page| page.text.trim().to_string())
        .collect::<Vec<_>>();

    let mut properties = PropertyBag::new();
    properties.insert("filename".to_string(), Value::String(file_name(path)?.to_string()));
    properties.insert("abstract".to_string(), Value::String(summary));
    properties.insert("num_pages".to_string(), json!(pages.len()));
    properties.insert("pages".to_string(), json!(pages));
    properties.insert(
        "author".to_string(),
        Value::String(content.author.unwrap_or_default()),
    );
    metadata.write_into(&mut properties);
    Ok(properties)
}

#[derive(Debug, Clone, Deserialize)]
pub struct WineReview {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct WineRow {
    pub line: u64,
    pub review: Result<WineReview, String>,
}

/// Tabular reviews from `wine_reviews.csv`. Rows carry a `title` instead of a filename.
pub struct WineReviewAdapter {
    schema: CollectionSchema,
    file: &'static str,
    row_limit: Option<usize>,
}

impl WineReviewAdapter {
    pub fn new(options: &IngestionOptions) -> Self {
        Self {
            schema: wine_reviews_schema(),
            file: "wine_reviews.csv",
            row_limit: options.csv_row_limit,
        }
    }
}

impl SourceAdapter for WineReviewAdapter {
    type Item = WineRow;

    fn schema(&self) -> &CollectionSchema {
        &self.schema
    }

    fn discover(&self, data_root: &Path) -> Result<Vec<WineRow>, IngestError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(data_root.join(self.file))?;

        let limit = self.row_limit.unwrap_or(usize::MAX);
        let rows = reader
            .deserialize::<WineReview>()
            .take(limit)
            .enumerate()
            .map(|(index, parsed)| WineRow {
                line: index as u64 + 2,
                review: parsed.map_err(|error| error.to_string()),
            })
            .collect();

        Ok(rows)
    }

    fn describe(&self, item: &WineRow) -> String {
        match &item.review {
            Ok(review) => format!("{} (line {})", review.title, item.line),
            Err(_) => format!("{} line {}", self.file, item.line),
        }
    }

    fn to_object(&self, item: &WineRow) -> Result<DataObject, IngestError> {
        let review = item
            .review
            .as_ref()
            .map_err(|reason| IngestError::InvalidArgument(format!("line {}: {reason}", item.line)))?;

        if review.title.trim().is_empty() {
            return Err(IngestError::InvalidArgument(format!(
                "line {}: review has no title",
                item.line
            )));
        }

        let mut properties = PropertyBag::new();
        properties.insert("title".to_string(), Value::String(format!("{}.", review.title)));
        properties.insert(
            "description".to_string(),
            Value::String(review.description.clone()),
        );

        Ok(DataObject::named(
            &format!("{}:{}", review.title, item.line),
            properties,
        ))
    }
}

/// Recreates the adapter's collection and loads every discovered record.
///
/// A record that cannot be mapped or is rejected by the database is reported
/// and the remaining records are still loaded. Database transport errors abort.
pub async fn ingest_collection<D, A>(
    database: &D,
    adapter: &A,
    data_root: &Path,
    options: &IngestionOptions,
) -> Result<BatchReport, IngestError>
where
    D: VectorDatabase + Sync,
    A: SourceAdapter,
{
    let schema = adapter.schema();
    let items = adapter.discover(data_root)?;

    database.delete_collection(&schema.name).await?;
    database.create_collection(schema).await?;

    let mut report = BatchReport::default();
    let mut objects = Vec::new();
    let mut origins = Vec::new();

    for (index, item) in items.iter().enumerate() {
        let source = adapter.describe(item);
        info!(collection = %schema.name, %source, "processing");

        match adapter.to_object(item) {
            Ok(object) => {
                objects.push(object);
                origins.push((index, source));
            }
            Err(error) => {
                warn!(collection = %schema.name, %source, %error, "skipped record");
                report.attempted += 1;
                report.errors.push(RecordError {
                    index,
                    source,
                    message: error.to_string(),
                });
            }
        }
    }

    let batch_size = options.batch_size.max(1);
    for (batch, batch_origins) in objects.chunks(batch_size).zip(origins.chunks(batch_size)) {
        let result = database.insert_many(&schema.name, batch).await?;
        report.attempted += result.attempted;
        report.inserted += result.inserted;

        for error in result.errors {
            let (index, source) = batch_origins
                .get(error.index)
                .cloned()
                .unwrap_or((error.index, error.source));
            report.errors.push(RecordError {
                index,
                source,
                message: error.message,
            });
        }
    }

    report.errors.sort_by_key(|error| error.index);
    info!(
        collection = %schema.name,
        inserted = report.inserted,
        errors = report.errors.len(),
        "collection loaded"
    );

    Ok(report)
}
