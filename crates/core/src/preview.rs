use crate::extractor::extract_page_texts;
use crate::models::{Modality, ResultRecord};
use std::path::{Path, PathBuf};
use tracing::debug;

const EXCERPT_CHARS: usize = 400;

/// Records on the 1-based `page`. Out of range pages are empty.
pub fn paginate(records: &[ResultRecord], page: usize, page_size: usize) -> &[ResultRecord] {
    if page == 0 || page_size == 0 {
        return &[];
    }

    let start = page_offset(page, page_size);
    if start >= records.len() {
        return &[];
    }
    let end = start.saturating_add(page_size).min(records.len());
    &records[start..end]
}

/// Number of records before the first one on the 1-based `page`.
pub fn page_offset(page: usize, page_size: usize) -> usize {
    page.saturating_sub(1).saturating_mul(page_size)
}

pub fn page_count(total: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 0;
    }
    total.div_ceil(page_size)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewKind {
    Image,
    Video,
    PdfPage,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Preview {
    pub kind: PreviewKind,
    pub path: PathBuf,
    /// First page text for pdf previews.
    pub excerpt: Option<String>,
}

/// Locates the source file behind a record under `data_root`. Tabular rows and
/// files that are not present locally have no preview.
pub fn resolve_preview(data_root: &Path, record: &ResultRecord) -> Option<Preview> {
    let subdir = record.modality.data_subdir()?;
    let filename = record.filename()?;

    // Stored filenames are plain names; anything path-like is not ours to open.
    if Path::new(filename).file_name()?.to_str()? != filename {
        return None;
    }

    let path = data_root.join(subdir).join(filename);
    if !path.is_file() {
        debug!(path = %path.display(), "preview source missing");
        return None;
    }

    let (kind, excerpt) = match record.modality {
        Modality::Image => (PreviewKind::Image, None),
        Modality::Video => (PreviewKind::Video, None),
        _ => (PreviewKind::PdfPage, first_page_excerpt(&path)),
    };

    Some(Preview {
        kind,
        path,
        excerpt,
    })
}

fn first_page_excerpt(path: &Path) -> Option<String> {
    match extract_page_texts(path) {
        Ok(pages) => pages.first().map(|page| excerpt(&page.text)),
        Err(error) => {
            debug!(path = %path.display(), %error, "no pdf excerpt");
            None
        }
    }
}

fn excerpt(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match collapsed.char_indices().nth(EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}...", &collapsed[..cut]),
        None => collapsed,
    }
}
