use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{ArgAction, Parser, Subcommand};
use media_search_core::{
    images_adapter, ingest_collection, page_count, page_offset, paginate, pdf_adapter,
    resolve_preview, videos_adapter, DateRange, HintEndpointConfig, HttpHintExtractor,
    IngestionOptions, Modality, QueryInput, ResultRecord, SearchContext, SearchDispatcher,
    SearchMode, SearchRequest, SortFilterCriteria, SortKey, SourceAdapter, VectorDatabase,
    WeaviateStore, WineReviewAdapter, PDF_COLLECTION,
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "media-search", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Weaviate base URL
    #[arg(long, env = "WEAVIATE_URL", default_value = "http://localhost:8080")]
    weaviate_url: String,

    /// Endpoint of the served query hint model
    #[arg(long, env = "HINT_ENDPOINT")]
    hint_endpoint: Option<String>,

    /// Bearer token for the hint endpoint
    #[arg(long, env = "HINT_API_KEY", hide_env_values = true)]
    hint_api_key: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Recreate the collections and load them from the data directory.
    Ingest {
        /// Directory holding images/, pdf/, videos/ and wine_reviews.csv.
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
        /// Load data/images.
        #[arg(long, default_value_t = true, action = ArgAction::Set)]
        images: bool,
        /// Load data/videos.
        #[arg(long, default_value_t = true, action = ArgAction::Set)]
        videos: bool,
        /// Load data/pdf.
        #[arg(long, default_value_t = true, action = ArgAction::Set)]
        pdfs: bool,
        /// Load data/wine_reviews.csv.
        #[arg(long, default_value_t = true, action = ArgAction::Set)]
        csv: bool,
        /// Number of csv rows to load, 0 loads every row.
        #[arg(long, default_value_t = 5)]
        csv_limit: usize,
        /// Objects per batch request.
        #[arg(long, default_value_t = 100)]
        batch_size: usize,
        /// Run a hybrid query against the pdf collection once loading is done.
        #[arg(long)]
        demo_query: Option<String>,
    },
    /// Search every collection and print one page of ranked results.
    Search {
        /// Free text query
        #[arg(long)]
        query: Option<String>,
        /// Image file to search with; takes priority over --query.
        #[arg(long)]
        image: Option<PathBuf>,
        /// vector, keyword, hybrid or assisted
        #[arg(long, default_value = "vector")]
        mode: SearchMode,
        /// Comma separated collections, defaults to all.
        #[arg(long, value_delimiter = ',')]
        collections: Vec<String>,
        /// relevance or date
        #[arg(long, default_value = "relevance")]
        sort: SortKey,
        /// Keep results whose distance is at most this value.
        #[arg(long)]
        max_distance: Option<f64>,
        /// Keep results modified on or after this day (YYYY-MM-DD).
        #[arg(long)]
        after: Option<NaiveDate>,
        /// Keep results modified on or before this day (YYYY-MM-DD).
        #[arg(long)]
        before: Option<NaiveDate>,
        /// Results requested from each collection.
        #[arg(long, default_value_t = 6)]
        limit: usize,
        /// Page to print, starting at 1.
        #[arg(long, default_value_t = 1)]
        page: usize,
        /// Results per page.
        #[arg(long, default_value_t = 9)]
        page_size: usize,
        /// Directory used to resolve previews.
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        weaviate = %cli.weaviate_url,
        "media-search boot"
    );

    let store = WeaviateStore::new(&cli.weaviate_url)?;
    let hints = HttpHintExtractor::new(HintEndpointConfig::from_parts(
        cli.hint_endpoint.clone(),
        cli.hint_api_key.clone(),
    ));

    match cli.command {
        Command::Ingest {
            data_dir,
            images,
            videos,
            pdfs,
            csv,
            csv_limit,
            batch_size,
            demo_query,
        } => {
            let options = IngestionOptions {
                batch_size,
                csv_row_limit: (csv_limit > 0).then_some(csv_limit),
                ..Default::default()
            };

            let mut loaded = Vec::new();
            let mut failed = Vec::new();

            if images {
                load(
                    &store,
                    &images_adapter(options.clone()),
                    &data_dir,
                    &options,
                    &mut loaded,
                    &mut failed,
                )
                .await;
            }
            if csv {
                load(
                    &store,
                    &WineReviewAdapter::new(&options),
                    &data_dir,
                    &options,
                    &mut loaded,
                    &mut failed,
                )
                .await;
            }
            if pdfs {
                load(
                    &store,
                    &pdf_adapter(options.clone()),
                    &data_dir,
                    &options,
                    &mut loaded,
                    &mut failed,
                )
                .await;
            }
            if videos {
                load(
                    &store,
                    &videos_adapter(options.clone()),
                    &data_dir,
                    &options,
                    &mut loaded,
                    &mut failed,
                )
                .await;
            }

            for collection in &loaded {
                let count = store.count(collection).await?;
                println!("{collection}: {count} objects");
            }

            if let Some(text) = demo_query {
                let dispatcher = SearchDispatcher::new(store, hints);
                let request = SearchRequest {
                    query: QueryInput::text(text),
                    mode: SearchMode::Hybrid,
                    collections: vec![PDF_COLLECTION.to_string()],
                    criteria: SortFilterCriteria::default(),
                };
                let outcome = dispatcher.search(&request).await;
                for record in &outcome.records {
                    println!("{}", record.display_name());
                }
            }

            if !failed.is_empty() {
                anyhow::bail!("ingestion failed for: {}", failed.join(", "));
            }
        }
        Command::Search {
            query,
            image,
            mode,
            collections,
            sort,
            max_distance,
            after,
            before,
            limit,
            page,
            page_size,
            data_dir,
        } => {
            let image = match image {
                Some(path) => Some(
                    tokio::fs::read(&path)
                        .await
                        .with_context(|| format!("reading query image {}", path.display()))?,
                ),
                None => None,
            };

            let date_range = if after.is_some() || before.is_some() {
                Some(DateRange::new(after, before)?)
            } else {
                None
            };

            let request = SearchRequest {
                query: QueryInput { text: query, image },
                mode,
                collections,
                criteria: SortFilterCriteria {
                    sort_key: sort,
                    relevance_filter: max_distance,
                    date_range,
                },
            };
            let context = SearchContext {
                page,
                page_size,
                ..SearchContext::new(request, data_dir)
            };

            let dispatcher = SearchDispatcher::new(store, hints).with_limit(limit);
            let outcome = dispatcher.search_context(&context).await;

            println!(
                "mode={:?} sort={:?} max_distance={} after={} before={}",
                mode,
                outcome.inferred_sort_override.unwrap_or(sort),
                display_option(max_distance),
                display_option(after),
                display_option(before),
            );
            if outcome.inferred_sort_override.is_some() {
                println!("sort switched to date by the query hint");
            }
            for skipped in &outcome.skipped {
                println!("skipped collection: {skipped}");
            }

            let total = outcome.records.len();
            let shown = paginate(&outcome.records, context.page, context.page_size);
            let first_rank = page_offset(context.page, context.page_size);
            for (offset, record) in shown.iter().enumerate() {
                print_record(first_rank.saturating_add(offset + 1), record, &context.data_root);
            }

            println!(
                "page {}/{} ({total} results)",
                context.page,
                page_count(total, context.page_size)
            );
        }
    }

    Ok(())
}

async fn load<A: SourceAdapter>(
    store: &WeaviateStore,
    adapter: &A,
    data_dir: &Path,
    options: &IngestionOptions,
    loaded: &mut Vec<String>,
    failed: &mut Vec<String>,
) {
    let name = adapter.schema().name.clone();
    match ingest_collection(store, adapter, data_dir, options).await {
        Ok(report) => {
            println!("{} insertions complete.", report.inserted);
            if report.has_errors() {
                println!("{} errors within.", report.errors.len());
                for error in &report.errors {
                    println!("  {}: {}", error.source, error.message);
                }
            }
            loaded.push(name);
        }
        Err(error) => {
            warn!(collection = %name, %error, "collection not loaded");
            println!("{name}: {error}");
            failed.push(name);
        }
    }
}

fn print_record(rank: usize, record: &ResultRecord, data_root: &Path) {
    let relevance = match (record.distance, record.score) {
        (Some(distance), _) => format!("distance={distance:.4}"),
        (None, Some(score)) => format!("score={score:.4}"),
        (None, None) => "unranked".to_string(),
    };
    println!(
        "{rank}. [{}] {} {relevance}",
        record.collection,
        record.display_name()
    );

    if let Some(modified) = record.modified_at {
        println!("   modified={}", modified.to_rfc3339());
    }

    if record.modality == Modality::Tabular {
        if let Some(description) = record.properties.get("description").and_then(|value| value.as_str()) {
            println!("   {description}");
        }
        return;
    }

    match resolve_preview(data_root, record) {
        Some(preview) => {
            println!("   preview={} ({:?})", preview.path.display(), preview.kind);
            if let Some(excerpt) = preview.excerpt {
                println!("   {excerpt}");
            }
        }
        None => println!("   preview unavailable"),
    }
}

fn display_option<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |value| value.to_string())
}
