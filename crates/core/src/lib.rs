pub mod error;
pub mod extractor;
pub mod hints;
pub mod ingest;
pub mod metadata;
pub mod models;
pub mod orchestrator;
pub mod preamble;
pub mod preview;
pub mod ranking;
pub mod schema;
pub mod stores;
pub mod traits;

pub use error::{HintError, IngestError, SearchError};
pub use extractor::{extract_page_texts, LopdfExtractor, PageText, PdfContent, PdfExtractor};
pub use hints::{parse_hint_output, HintEndpointConfig, HttpHintExtractor, StructuredHint};
pub use ingest::{
    images_adapter, ingest_collection, pdf_adapter, videos_adapter, FileAdapter, SourceAdapter,
    WineReviewAdapter,
};
pub use metadata::{file_metadata, size_format, FileMetadataRecord};
pub use models::{
    BatchReport, DataObject, DateRange, IngestionOptions, Modality, QueryInput, RecordError,
    ResultRecord, SearchContext, SearchMode, SearchOutcome, SearchRequest, SortFilterCriteria,
    SortKey, DEFAULT_PAGE_SIZE, DEFAULT_RESULT_LIMIT,
};
pub use orchestrator::SearchDispatcher;
pub use preamble::{extract_abstract, extract_section, PreambleExtractor, SectionExtraction};
pub use preview::{page_count, page_offset, paginate, resolve_preview, Preview, PreviewKind};
pub use ranking::rank;
pub use schema::{default_registry, CollectionSchema, PDF_COLLECTION};
pub use stores::WeaviateStore;
pub use traits::{CollectionQuery, HintExtractor, QueryKind, VectorDatabase};
