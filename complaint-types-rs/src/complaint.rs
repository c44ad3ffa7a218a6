// complaint-types-rs/src/complaint.rs
// Complaint records as produced by the collector

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a complaint on the source site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplaintStatus {
    Open,
    InProgress,
    Resolved,
    Unresolved,
}

impl ComplaintStatus {
    /// Map a listing status code and its `solved` flag.
    ///
    /// A solved complaint is resolved whatever its code says. Unknown codes
    /// are treated as still open.
    pub fn from_listing(code: &str, solved: bool) -> Self {
        if solved {
            return ComplaintStatus::Resolved;
        }

        match code.trim().to_ascii_uppercase().as_str() {
            "PENDING" => ComplaintStatus::Open,
            "ANSWERED" => ComplaintStatus::InProgress,
            "EVALUATED" | "NOT_ANSWERED" => ComplaintStatus::Unresolved,
            _ => ComplaintStatus::Open,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ComplaintStatus::Open => "open",
            ComplaintStatus::InProgress => "in_progress",
            ComplaintStatus::Resolved => "resolved",
            ComplaintStatus::Unresolved => "unresolved",
        }
    }
}

impl fmt::Display for ComplaintStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One customer complaint.
///
/// `title`, `body` and `final_consideration` hold redacted text only. Records
/// are immutable once the collector has emitted them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Complaint {
    /// Stable identifier derived from the source listing id
    pub complaint_id: String,

    /// Position in collection order, gap-free within one run
    #[serde(default)]
    pub sequence: u64,

    #[serde(alias = "complaint_title")]
    pub title: String,

    #[serde(alias = "complaint_text")]
    pub body: String,

    #[serde(default)]
    pub opened_at: Option<NaiveDate>,

    pub status: ComplaintStatus,

    #[serde(default)]
    pub public_link: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_consideration: Option<String>,
}

impl Complaint {
    /// Render the complaint the way prompts present it
    pub fn prompt_text(&self) -> String {
        format!("Title: {}\nText: {}", self.title, self.body)
    }

    /// Same as `prompt_text` but with the body cut to `max_chars` characters
    pub fn excerpt(&self, max_chars: usize) -> String {
        let body: String = self.body.chars().take(max_chars).collect();
        format!("Title: {}\nText: {}", self.title, body)
    }
}

/// Marker payload written when a collection run is interrupted.
///
/// It lives next to the complete raw artifact under its own name, so a prior
/// complete artifact is never replaced by truncated data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialCollection {
    pub status: String,
    pub pages_completed: u32,
    pub complaints: Vec<Complaint>,
}

impl PartialCollection {
    pub const STATUS: &'static str = "partial";

    pub fn new(pages_completed: u32, complaints: Vec<Complaint>) -> Self {
        Self {
            status: Self::STATUS.to_string(),
            pages_completed,
            complaints,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("PENDING", false, ComplaintStatus::Open ; "pending")]
    #[test_case("ANSWERED", false, ComplaintStatus::InProgress ; "answered")]
    #[test_case("EVALUATED", false, ComplaintStatus::Unresolved ; "evaluated")]
    #[test_case("NOT_ANSWERED", false, ComplaintStatus::Unresolved ; "not answered")]
    #[test_case("EVALUATED", true, ComplaintStatus::Resolved ; "solved wins")]
    #[test_case("something-new", false, ComplaintStatus::Open ; "unknown code")]
    fn maps_listing_status(code: &str, solved: bool, expected: ComplaintStatus) {
        assert_eq!(ComplaintStatus::from_listing(code, solved), expected);
    }

    #[test]
    fn reads_legacy_field_names() {
        let json = r#"{
            "complaint_id": "COMPLAINT_1",
            "complaint_title": "Carro parado",
            "complaint_text": "Oficina sem peça",
            "opened_at": "2024-01-15",
            "status": "in_progress",
            "public_link": "https://example.test/x"
        }"#;

        let complaint: Complaint = serde_json::from_str(json).unwrap();
        assert_eq!(complaint.title, "Carro parado");
        assert_eq!(complaint.body, "Oficina sem peça");
        assert_eq!(complaint.sequence, 0);
        assert_eq!(complaint.opened_at, NaiveDate::from_ymd_opt(2024, 1, 15));
        assert!(complaint.final_consideration.is_none());
    }

    #[test]
    fn excerpt_cuts_on_char_boundary() {
        let complaint = Complaint {
            complaint_id: "COMPLAINT_1".into(),
            sequence: 1,
            title: "T".into(),
            body: "ação".into(),
            opened_at: None,
            status: ComplaintStatus::Open,
            public_link: String::new(),
            final_consideration: None,
        };
        assert_eq!(complaint.excerpt(2), "Title: T\nText: aç");
    }
}
