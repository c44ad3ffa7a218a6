//! Listing page parsing: embedded JSON payload, field cleanup and page URLs

use chrono::{DateTime, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

static NEXT_DATA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)<script[^>]*id=["']__NEXT_DATA__["'][^>]*>(.*?)</script>"#).unwrap());
static LINE_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").unwrap());
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"</?[A-Za-z][^>]*>").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("page has no __NEXT_DATA__ payload")]
    MissingPayload,

    #[error("invalid payload JSON: {0}")]
    InvalidJson(String),

    #[error("unexpected listing shape: {0}")]
    InvalidListing(String),
}

/// One complaint as it appears in the listing payload
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Listing {
    pub id: Option<Value>,
    pub title: String,
    pub description: String,
    pub created: String,
    pub status: String,
    pub url: String,
    pub solved: bool,
    #[serde(alias = "finalConsideration")]
    pub final_consideration: Option<String>,
}

impl Listing {
    /// Source id as text; numbers and strings are both accepted
    pub fn source_id(&self) -> Option<String> {
        match &self.id {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// URL of listing page `page` (1-based) under `base_url`
pub fn page_url(base_url: &str, page: u32) -> String {
    let base = base_url.trim_end_matches('/');
    if page > 1 {
        format!("{}/lista-reclamacoes/?pagina={}", base, page)
    } else {
        format!("{}/lista-reclamacoes/", base)
    }
}

/// Public link of a listing slug, empty when the listing has none
pub fn public_link(base_url: &str, slug: &str) -> String {
    let slug = slug.trim().trim_start_matches('/');
    if slug.is_empty() {
        return String::new();
    }
    format!("{}/{}", base_url.trim_end_matches('/'), slug)
}

/// Extract listings from a page. An empty vector means the source is exhausted.
pub fn parse_listings(html: &str) -> Result<Vec<Listing>, ParseError> {
    let payload = NEXT_DATA
        .captures(html)
        .and_then(|caps| caps.get(1))
        .ok_or(ParseError::MissingPayload)?;

    let data: Value =
        serde_json::from_str(payload.as_str().trim()).map_err(|e| ParseError::InvalidJson(e.to_string()))?;

    match data.pointer("/props/pageProps/complaints/LAST") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                serde_json::from_value::<Listing>(item.clone())
                    .map_err(|e| ParseError::InvalidListing(e.to_string()))
            })
            .collect(),
        Some(other) => Err(ParseError::InvalidListing(format!(
            "expected an array of complaints, found {}",
            type_name(other)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Turn listing markup into plain text: `<br>` becomes a space, other tags go
pub fn strip_markup(text: &str) -> String {
    let spaced = LINE_BREAK.replace_all(text, " ");
    let untagged = TAG.replace_all(&spaced, "");
    decode_entities(&untagged)
}

fn decode_entities(text: &str) -> String {
    // `&amp;` last so that "&amp;lt;" stays "&lt;"
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

/// Date part of a listing timestamp (RFC 3339 or a leading `YYYY-MM-DD`)
pub fn parse_opened_at(created: &str) -> Option<NaiveDate> {
    let created = created.trim();
    if created.is_empty() {
        return None;
    }
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(created) {
        return Some(timestamp.date_naive());
    }
    created
        .get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
}
