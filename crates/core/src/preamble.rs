//! Isolates one named section (usually "Abstract") from an ordered list of
//! labeled text blocks.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockCategory {
    Title,
    NarrativeText,
    ListItem,
    Uncategorized,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextBlock {
    pub category: BlockCategory,
    pub text: String,
}

impl TextBlock {
    pub fn title(text: impl Into<String>) -> Self {
        Self {
            category: BlockCategory::Title,
            text: text.into(),
        }
    }

    pub fn narrative(text: impl Into<String>) -> Self {
        Self {
            category: BlockCategory::NarrativeText,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionState {
    Seeking,
    Collecting,
    Done,
}

/// What a single block does to the extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Move to `state`, remembering `section` as the current section title when set.
    Enter {
        state: ExtractionState,
        section: Option<String>,
    },
    Collect(String),
    Ignore,
}

/// Pure transition function of the section extractor.
pub fn step(state: ExtractionState, target: &str, block: &TextBlock) -> Transition {
    if state == ExtractionState::Done {
        return Transition::Ignore;
    }

    match block.category {
        BlockCategory::Title => {
            let section = Some(block.text.clone());
            let next = if block.text == target {
                ExtractionState::Collecting
            } else if state == ExtractionState::Collecting {
                ExtractionState::Done
            } else {
                state
            };
            Transition::Enter {
                state: next,
                section,
            }
        }
        BlockCategory::NarrativeText if state == ExtractionState::Collecting => {
            Transition::Collect(block.text.clone())
        }
        _ => Transition::Ignore,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionExtraction {
    pub text: String,
    /// True only when the section was closed by a following title.
    pub found: bool,
}

#[derive(Debug, Clone)]
pub struct PreambleExtractor {
    target: String,
    state: ExtractionState,
    current_section: Option<String>,
    collected_text: Vec<String>,
}

impl PreambleExtractor {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            state: ExtractionState::Seeking,
            current_section: None,
            collected_text: Vec::new(),
        }
    }

    pub fn state(&self) -> ExtractionState {
        self.state
    }

    pub fn current_section(&self) -> Option<&str> {
        self.current_section.as_deref()
    }

    /// Feeds one block. Returns false once the target section has closed.
    pub fn process(&mut self, block: &TextBlock) -> bool {
        match step(self.state, &self.target, block) {
            Transition::Enter { state, section } => {
                if let Some(section) = section {
                    debug!(section = %section, "current section");
                    self.current_section = Some(section);
                }
                self.state = state;
            }
            Transition::Collect(text) => {
                debug!(chars = text.len(), "section text collected");
                self.collected_text.push(text);
            }
            Transition::Ignore => {}
        }

        self.state != ExtractionState::Done
    }

    pub fn consume<'a, I>(&mut self, blocks: I)
    where
        I: IntoIterator<Item = &'a TextBlock>,
    {
        for block in blocks {
            if !self.process(block) {
                break;
            }
        }

        if self.state != ExtractionState::Done {
            warn!(target_section = %self.target, "no {} found in the given blocks", self.target);
        }
    }

    pub fn finish(self) -> SectionExtraction {
        SectionExtraction {
            found: self.state == ExtractionState::Done,
            text: self.collected_text.join("\n"),
        }
    }
}

pub fn extract_section(blocks: &[TextBlock], target: &str) -> SectionExtraction {
    let mut extractor = PreambleExtractor::new(target);
    extractor.consume(blocks);
    extractor.finish()
}

pub fn extract_abstract(blocks: &[TextBlock]) -> SectionExtraction {
    extract_section(blocks, "Abstract")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paper() -> Vec<TextBlock> {
        vec![
            TextBlock::title("Intro"),
            TextBlock::narrative("x"),
            TextBlock::title("Abstract"),
            TextBlock::narrative("A1"),
            TextBlock::narrative("A2"),
            TextBlock::title("Methods"),
            TextBlock::narrative("skip"),
        ]
    }

    #[test]
    fn abstract_is_collected_until_next_title() {
        let extraction = extract_abstract(&paper());
        assert_eq!(extraction.text, "A1\nA2");
        assert!(extraction.found);
    }

    #[test]
    fn missing_abstract_returns_empty_text() {
        let blocks = vec![
            TextBlock::title("Intro"),
            TextBlock::narrative("x"),
            TextBlock::title("Methods"),
        ];
        let extraction = extract_abstract(&blocks);
        assert_eq!(extraction.text, "");
        assert!(!extraction.found);
    }

    #[test]
    fn abstract_running_to_end_of_document_is_partial() {
        let blocks = vec![TextBlock::title("Abstract"), TextBlock::narrative("only")];
        let extraction = extract_abstract(&blocks);
        assert_eq!(extraction.text, "only");
        assert!(!extraction.found);
    }

    #[test]
    fn non_narrative_blocks_inside_section_are_ignored() {
        let blocks = vec![
            TextBlock::title("Abstract"),
            TextBlock {
                category: BlockCategory::ListItem,
                text: "- bullet".to_string(),
            },
            TextBlock::narrative("body"),
            TextBlock::title("Results"),
        ];
        assert_eq!(extract_abstract(&blocks).text, "body");
    }

    #[test]
    fn processing_stops_at_the_closing_title() {
        let mut extractor = PreambleExtractor::new("Abstract");
        let blocks = paper();
        let mut processed = 0;
        for block in &blocks {
            processed += 1;
            if !extractor.process(block) {
                break;
            }
        }
        assert_eq!(processed, 6);
        assert_eq!(extractor.state(), ExtractionState::Done);
        assert_eq!(extractor.current_section(), Some("Methods"));
    }

    #[test]
    fn step_is_pure_over_states() {
        let title = TextBlock::title("Abstract");
        let other = TextBlock::title("Methods");
        let body = TextBlock::narrative("text");

        assert_eq!(
            step(ExtractionState::Seeking, "Abstract", &title),
            Transition::Enter {
                state: ExtractionState::Collecting,
                section: Some("Abstract".to_string()),
            }
        );
        assert_eq!(
            step(ExtractionState::Collecting, "Abstract", &other),
            Transition::Enter {
                state: ExtractionState::Done,
                section: Some("Methods".to_string()),
            }
        );
        assert_eq!(step(ExtractionState::Seeking, "Abstract", &body), Transition::Ignore);
        assert_eq!(
            step(ExtractionState::Collecting, "Abstract", &body),
            Transition::Collect("text".to_string())
        );
        assert_eq!(step(ExtractionState::Done, "Abstract", &body), Transition::Ignore);
    }
}
