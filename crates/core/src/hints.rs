use crate::traits::HintExtractor;
use crate::HintError;
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

const PROMPT_MARKER: &str = "Now, please extract meta information from this user query:";

/// Filter hints a fine-tuned model extracts from a free-text query.
///
/// Date components are `[start, end]` pairs. `-1` marks a relative value
/// ("last summer") and `0` marks "the latest"; an empty list means the query
/// carried no date at all.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredHint {
    #[serde(default, alias = "date_year", deserialize_with = "null_as_empty")]
    pub year: Vec<i64>,
    #[serde(default, alias = "date_month", deserialize_with = "null_as_empty")]
    pub month: Vec<i64>,
    #[serde(default, alias = "date_day", deserialize_with = "null_as_empty")]
    pub day: Vec<i64>,
    #[serde(
        default,
        rename = "file content",
        alias = "file_content",
        deserialize_with = "null_as_empty"
    )]
    pub content: Vec<String>,
    #[serde(
        default,
        rename = "file type",
        alias = "file_type",
        deserialize_with = "null_as_empty"
    )]
    pub file_types: Vec<String>,
}

/// The model writes `None` for fields it has nothing for.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

impl StructuredHint {
    pub fn content_keywords(&self) -> Vec<String> {
        self.content
            .iter()
            .map(|keyword| keyword.trim())
            .filter(|keyword| !keyword.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn has_concrete_date(&self) -> bool {
        self.year.iter().any(|year| *year > 0)
    }

    pub fn wants_latest(&self) -> bool {
        !self.year.is_empty() && self.year.iter().all(|year| *year == 0)
    }

    /// A hint with nothing to search on, or one asking for the newest files, ranks by date.
    pub fn requests_date_sort(&self) -> bool {
        self.wants_latest() || (self.content_keywords().is_empty() && !self.has_concrete_date())
    }
}

/// Pulls the hint literal out of raw model output.
pub fn parse_hint_output(raw: &str) -> Result<StructuredHint, HintError> {
    let relevant = raw.rsplit(PROMPT_MARKER).next().unwrap_or(raw).trim();
    let information = Regex::new(r"###\s*information:\s*")
        .map_err(|error| HintError::Malformed(error.to_string()))?;

    let start = match information.find(relevant) {
        Some(found) => found.end(),
        None => relevant
            .find('{')
            .ok_or_else(|| HintError::Malformed("no information literal in output".to_string()))?,
    };
    let literal = balanced_literal(&relevant[start..])?;

    let json = literal_to_json(literal)?;
    Ok(serde_json::from_str(&json)?)
}

/// The `{...}` literal at the start of `text`, closed by its matching brace.
/// Braces inside quoted strings do not count.
fn balanced_literal(text: &str) -> Result<&str, HintError> {
    if !text.starts_with('{') {
        return Err(HintError::Malformed("information is not a dict literal".to_string()));
    }

    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (index, current) in text.char_indices() {
        if let Some(open) = quote {
            if escaped {
                escaped = false;
            } else if current == '\\' {
                escaped = true;
            } else if current == open {
                quote = None;
            }
            continue;
        }

        match current {
            '\'' | '"' => quote = Some(current),
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(&text[..=index]);
                }
            }
            _ => {}
        }
    }

    Err(HintError::Malformed("unterminated information literal".to_string()))
}

/// Converts a Python dict literal (single quotes, `None`, `True`, `False`) to JSON text.
fn literal_to_json(literal: &str) -> Result<String, HintError> {
    let mut output = String::with_capacity(literal.len() + 8);
    let mut chars = literal.chars().peekable();

    while let Some(current) = chars.next() {
        match current {
            '\'' | '"' => {
                let quote = current;
                let mut value = String::new();
                let mut closed = false;
                while let Some(next) = chars.next() {
                    match next {
                        '\\' => match chars.next() {
                            Some('n') => value.push('\n'),
                            Some('t') => value.push('\t'),
                            Some(escaped) => value.push(escaped),
                            None => break,
                        },
                        _ if next == quote => {
                            closed = true;
                            break;
                        }
                        _ => value.push(next),
                    }
                }
                if !closed {
                    return Err(HintError::Malformed("unterminated string literal".to_string()));
                }
                output.push_str(&serde_json::to_string(&value)?);
            }
            c if c.is_ascii_alphabetic() => {
                let mut word = String::from(c);
                while let Some(next) = chars.peek().copied().filter(char::is_ascii_alphanumeric) {
                    word.push(next);
                    chars.next();
                }
                match word.as_str() {
                    "None" => output.push_str("null"),
                    "True" => output.push_str("true"),
                    "False" => output.push_str("false"),
                    other => {
                        return Err(HintError::Malformed(format!("unexpected token {other}")));
                    }
                }
            }
            _ => output.push(current),
        }
    }

    Ok(output)
}

#[derive(Debug, Clone)]
pub struct HintEndpointConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
}

impl HintEndpointConfig {
    /// Blank values count as unset.
    pub fn from_parts(endpoint: Option<String>, api_key: Option<String>) -> Option<Self> {
        let endpoint = non_blank(endpoint)?;
        Some(Self {
            endpoint,
            api_key: non_blank(api_key),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|trimmed| !trimmed.is_empty())
}

/// Calls a served fine-tuned model. Without an endpoint every call reports `Unavailable`.
pub struct HttpHintExtractor {
    config: Option<HintEndpointConfig>,
    client: Client,
}

impl HttpHintExtractor {
    pub fn new(config: Option<HintEndpointConfig>) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }
}

#[async_trait]
impl HintExtractor for HttpHintExtractor {
    async fn extract_hint(&self, query: &str) -> Result<StructuredHint, HintError> {
        let cfg = self.config.as_ref().ok_or(HintError::Unavailable)?;

        let mut request = self
            .client
            .post(&cfg.endpoint)
            .json(&json!({ "query": query }));
        if let Some(api_key) = &cfg.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(HintError::Status(response.status().to_string()));
        }

        let body = response.text().await?;
        parse_hint_output(&generated_text(&body))
    }
}

/// Unwraps `{"generated_text": ...}` or `{"text": ...}` envelopes; anything else is taken verbatim.
fn generated_text(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => map
            .get("generated_text")
            .or_else(|| map.get("text"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| body.to_string()),
        Ok(Value::Array(items)) => items
            .first()
            .and_then(|item| item.pointer("/generated_text"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| body.to_string()),
        _ => body.to_string(),
    }
}
