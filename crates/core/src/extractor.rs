use crate::error::IngestError;
use crate::preamble::{BlockCategory, TextBlock};
use lopdf::{Document, Object};
use std::path::Path;

#[derive(Debug, Clone)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct PdfContent {
    pub pages: Vec<PageText>,
    pub author: Option<String>,
}

impl PdfContent {
    pub fn blocks(&self) -> Vec<TextBlock> {
        self.pages
            .iter()
            .flat_map(|page| partition_text(&page.text))
            .collect()
    }
}

pub trait PdfExtractor {
    fn extract(&self, path: &Path) -> Result<PdfContent, IngestError>;
}

#[derive(Default)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract(&self, path: &Path) -> Result<PdfContent, IngestError> {
        let document = Document::load(path).map_err(|error| IngestError::PdfParse(error.to_string()))?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| IngestError::PdfParse(error.to_string()))?;

            if !text.trim().is_empty() {
                pages.push(PageText {
                    number: page_no,
                    text,
                });
            }
        }

        if pages.is_empty() {
            return Err(IngestError::PdfParse(format!(
                "pdf had no readable page text: {}",
                path.display()
            )));
        }

        Ok(PdfContent {
            pages,
            author: document_author(&document),
        })
    }
}

pub fn extract_page_texts(path: &Path) -> Result<Vec<PageText>, IngestError> {
    LopdfExtractor.extract(path).map(|content| content.pages)
}

fn document_author(document: &Document) -> Option<String> {
    let info_id = document
        .trailer
        .get(b"Info")
        .and_then(Object::as_reference)
        .ok()?;
    let info = document.get_dictionary(info_id).ok()?;
    let raw = info.get(b"Author").and_then(Object::as_str).ok()?;

    let author = decode_pdf_string(raw);
    let author = author.trim();
    if author.is_empty() {
        None
    } else {
        Some(author.to_string())
    }
}

fn decode_pdf_string(raw: &[u8]) -> String {
    if raw.starts_with(&[0xFE, 0xFF]) {
        let units = raw[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect::<Vec<_>>();
        String::from_utf16_lossy(&units)
    } else {
        String::from_utf8_lossy(raw).into_owned()
    }
}

const MAX_TITLE_CHARS: usize = 80;
const MAX_TITLE_WORDS: usize = 10;

/// Splits page text into labeled blocks. lopdf ends every text object with a
/// single newline, so blocks are built line by line: a short capitalised line
/// without closing punctuation is a heading when it does not continue an open
/// sentence, and the remaining lines are merged into paragraphs.
pub fn partition_text(text: &str) -> Vec<TextBlock> {
    let lines = text.lines().map(str::trim).collect::<Vec<_>>();
    let mut blocks = Vec::new();
    let mut paragraph: Vec<&str> = Vec::new();

    for (index, line) in lines.iter().copied().enumerate() {
        if line.is_empty() {
            flush_paragraph(&mut paragraph, &mut blocks);
            continue;
        }

        if is_list_item(line) {
            flush_paragraph(&mut paragraph, &mut blocks);
            blocks.push(TextBlock {
                category: BlockCategory::ListItem,
                text: line.to_string(),
            });
            continue;
        }

        let sentence_open = paragraph.last().is_some_and(|last| !ends_sentence(last));
        let continued = lines[index + 1..]
            .iter()
            .find(|next| !next.is_empty())
            .and_then(|next| next.chars().next())
            .is_some_and(char::is_lowercase);

        if looks_like_title(line) && !sentence_open && !continued {
            flush_paragraph(&mut paragraph, &mut blocks);
            blocks.push(TextBlock::title(line));
        } else {
            paragraph.push(line);
        }
    }

    flush_paragraph(&mut paragraph, &mut blocks);
    blocks
}

fn flush_paragraph(paragraph: &mut Vec<&str>, blocks: &mut Vec<TextBlock>) {
    if !paragraph.is_empty() {
        blocks.push(classify_body(&paragraph.join(" ")));
        paragraph.clear();
    }
}

fn ends_sentence(line: &str) -> bool {
    line.ends_with(['.', '?', '!', ':'])
}

fn looks_like_title(line: &str) -> bool {
    let starts_well = line
        .chars()
        .next()
        .is_some_and(|first| first.is_uppercase() || first.is_ascii_digit());
    let ends_open = !line.ends_with(['.', ',', ';', ':', '?', '!']);

    starts_well
        && ends_open
        && !is_list_item(line)
        && line.chars().count() <= MAX_TITLE_CHARS
        && line.split_whitespace().count() <= MAX_TITLE_WORDS
}

fn is_list_item(line: &str) -> bool {
    line.starts_with("- ") || line.starts_with("* ") || line.starts_with('\u{2022}')
}

fn classify_body(text: &str) -> TextBlock {
    let category = if is_list_item(text) {
        BlockCategory::ListItem
    } else if text.split_whitespace().count() >= 3 {
        BlockCategory::NarrativeText
    } else {
        BlockCategory::Uncategorized
    };

    TextBlock {
        category,
        text: text.to_string(),
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};
    use std::path::Path;

    /// Writes a one page pdf holding one text object per line.
    pub(crate) fn write_pdf(
        path: &Path,
        lines: &[&str],
        author: Option<&str>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let mut document = Document::with_version("1.5");
        let pages_id = document.new_object_id();
        let font_id = document.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = document.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut operations = Vec::new();
        for (index, line) in lines.iter().enumerate() {
            let baseline = 760 - 20 * index as i64;
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("Tf", vec!["F1".into(), 12.into()]));
            operations.push(Operation::new("Td", vec![72.into(), baseline.into()]));
            operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
            operations.push(Operation::new("ET", vec![]));
        }
        let content = Content { operations };
        let content_id = document.add_object(Stream::new(dictionary! {}, content.encode()?));

        let page_id = document.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        let kids: Vec<Object> = vec![page_id.into()];
        let media_box: Vec<Object> = vec![0.into(), 0.into(), 595.into(), 842.into()];
        document.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => 1,
                "Resources" => resources_id,
                "MediaBox" => media_box,
            }),
        );

        let catalog_id = document.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        document.trailer.set("Root", catalog_id);

        if let Some(author) = author {
            let info_id = document.add_object(dictionary! {
                "Author" => Object::string_literal(author),
            });
            document.trailer.set("Info", info_id);
        }

        document.save(path)?;
        Ok(())
    }
}
