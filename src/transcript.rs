// 📄 Transcript Analysis - Upload validation and untrusted AI responses
//
// Flow:
//   1. validate_upload()      - mime + size checks, before any collaborator is called
//   2. extract_text()         - plain text decoded locally, PDFs handed to a TextExtractor
//   3. AnalysisRequest        - transcript + catalog summary + already-completed codes
//   4. TranscriptAnalyzer     - returns raw text (normally a JSON array)
//   5. parse_identified_courses() - sanitize the response into CompletedCourseRecords
//
// The resulting records are handed to Planner::apply_identified_courses.

use crate::catalog::{Catalog, DEFAULT_SEMESTER};
use crate::store::CompletedCourseRecord;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Credits used when the analyzer reports a value that cannot be read as a number
pub const FALLBACK_CREDITS: u32 = 3;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum UploadError {
    #[error("Please upload a PDF or text file (got {0})")]
    UnsupportedType(String),

    #[error("File size must be less than 10MB ({size} bytes)")]
    TooLarge { size: usize },

    #[error("Uploaded file is empty")]
    Empty,

    #[error("Text file is not valid UTF-8")]
    InvalidText,
}

#[derive(Debug, thiserror::Error)]
pub enum TranscriptError {
    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("Failed to extract text: {0}")]
    Extraction(String),

    #[error("Failed to analyze transcript: {0}")]
    Analysis(String),

    /// The analyzer answered with something other than a JSON array
    #[error("Failed to parse AI response")]
    MalformedResponse(String),
}

// ============================================================================
// UPLOAD
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UploadKind {
    Pdf,
    PlainText,
}

impl UploadKind {
    pub fn from_mime(mime: &str) -> Option<Self> {
        // Ignore parameters such as "; charset=utf-8"
        let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        match essence.as_str() {
            "application/pdf" => Some(UploadKind::Pdf),
            "text/plain" => Some(UploadKind::PlainText),
            _ => None,
        }
    }
}

pub fn validate_upload(mime: &str, size: usize) -> Result<UploadKind, UploadError> {
    let kind = UploadKind::from_mime(mime)
        .ok_or_else(|| UploadError::UnsupportedType(mime.to_string()))?;

    if size > MAX_UPLOAD_BYTES {
        return Err(UploadError::TooLarge { size });
    }
    if size == 0 {
        return Err(UploadError::Empty);
    }

    Ok(kind)
}

/// Converts PDF bytes to text
pub trait TextExtractor: Send + Sync {
    fn extract_text(&self, pdf: &[u8]) -> anyhow::Result<String>;
}

/// Turns an uploaded file into transcript text
pub fn extract_text(
    mime: &str,
    bytes: &[u8],
    extractor: &dyn TextExtractor,
) -> Result<String, TranscriptError> {
    match validate_upload(mime, bytes.len())? {
        UploadKind::PlainText => {
            let text = std::str::from_utf8(bytes).map_err(|_| UploadError::InvalidText)?;
            Ok(text.to_string())
        }
        UploadKind::Pdf => {
            let text = extractor
                .extract_text(bytes)
                .map_err(|e| TranscriptError::Extraction(format!("{:#}", e)))?;
            debug!(len = text.len(), "extracted transcript text from PDF");
            Ok(text)
        }
    }
}

// ============================================================================
// ANALYSIS REQUEST
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct CourseSummary {
    pub name: String,
    pub credits: u32,
}

/// Everything the analyzer needs to identify completed courses
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub transcript: String,
    /// Catalog courses by code
    pub catalog: BTreeMap<String, CourseSummary>,
    pub completed_courses: Vec<String>,
}

impl AnalysisRequest {
    pub fn new(transcript: &str, catalog: &Catalog, completed_courses: Vec<String>) -> Self {
        let catalog = catalog
            .categories
            .iter()
            .flat_map(|category| category.courses())
            .map(|course| {
                (
                    course.code.clone(),
                    CourseSummary {
                        name: course.name.clone(),
                        credits: course.credits,
                    },
                )
            })
            .collect();

        AnalysisRequest {
            transcript: transcript.to_string(),
            catalog,
            completed_courses,
        }
    }

    /// Instruction text sent to the language model
    pub fn prompt(&self) -> String {
        let catalog_json = serde_json::to_string_pretty(&self.catalog).unwrap_or_default();

        format!(
            r#"You analyze university transcripts and identify completed courses.

Transcript:
"""
{transcript}
"""

Match courses against these course codes:
{catalog}

Rules:
1. Only return courses that show a letter grade (A, B+, C, ...) or are marked PASSED.
2. Skip courses with no grade, or marked IN PROGRESS or CURRENT.
3. Course codes may appear as "01:198:111", "01-198-111" or "01 198 111".
4. If the code is missing but the course name matches, use the closest catalog code.
5. Skip courses the student already completed: {completed}
6. Return only a JSON array in this shape, with no other text:
[
  {{ "code": "01:198:111", "name": "Introduction to Computer Science", "credits": 4, "semester": "Fall 2024" }}
]"#,
            transcript = self.transcript,
            catalog = catalog_json,
            completed = self.completed_courses.join(", "),
        )
    }
}

/// Language-model collaborator; returns the raw response text
pub trait TranscriptAnalyzer: Send + Sync {
    fn analyze(&self, request: &AnalysisRequest) -> anyhow::Result<String>;
}

// ============================================================================
// RESPONSE SANITIZING
// ============================================================================

/// Parse an untrusted analyzer response into completed-course records.
///
/// The whole response is rejected unless it is a JSON array. Individual
/// elements without a code, a name, or a truthy credits value are dropped.
pub fn parse_identified_courses(raw: &str) -> Result<Vec<CompletedCourseRecord>, TranscriptError> {
    let value: Value = serde_json::from_str(raw.trim()).map_err(|e| {
        warn!(error = %e, "analyzer response is not valid JSON");
        TranscriptError::MalformedResponse(e.to_string())
    })?;

    let items = match value {
        Value::Array(items) => items,
        other => {
            warn!(kind = json_kind(&other), "analyzer response is not a JSON array");
            return Err(TranscriptError::MalformedResponse(format!(
                "expected an array, got {}",
                json_kind(&other)
            )));
        }
    };

    let total = items.len();
    let records: Vec<CompletedCourseRecord> = items.iter().filter_map(sanitize_course).collect();

    if records.len() < total {
        debug!(dropped = total - records.len(), "dropped incomplete analyzer entries");
    }
    info!(count = records.len(), "identified courses in transcript");

    Ok(records)
}

fn sanitize_course(item: &Value) -> Option<CompletedCourseRecord> {
    let code = non_empty_str(item.get("code")?)?;
    let name = non_empty_str(item.get("name")?)?;
    let credits = item.get("credits")?;

    if !is_truthy(credits) {
        return None;
    }

    let semester = item
        .get("semester")
        .and_then(non_empty_str)
        .unwrap_or(DEFAULT_SEMESTER);

    Some(CompletedCourseRecord::new(code, name, coerce_credits(credits), semester))
}

fn non_empty_str(value: &Value) -> Option<&str> {
    value.as_str().map(str::trim).filter(|s| !s.is_empty())
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Integer credits: numbers truncate, strings use their leading digits,
/// anything else (or a non-positive result) falls back to FALLBACK_CREDITS
pub fn coerce_credits(value: &Value) -> u32 {
    let parsed = match value {
        Value::Number(n) => n.as_f64().map(|f| f.trunc() as i64),
        Value::String(s) => leading_integer(s),
        _ => None,
    };

    match parsed {
        Some(n) if n > 0 => u32::try_from(n).unwrap_or(FALLBACK_CREDITS),
        _ => FALLBACK_CREDITS,
    }
}

fn leading_integer(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (sign, rest) = match s.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, s.strip_prefix('+').unwrap_or(s)),
    };

    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse::<i64>().ok().map(|n| sign * n)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// PIPELINE
// ============================================================================

/// Validate, extract, analyze and sanitize in one call
pub fn analyze_upload(
    mime: &str,
    bytes: &[u8],
    catalog: &Catalog,
    completed_courses: Vec<String>,
    extractor: &dyn TextExtractor,
    analyzer: &dyn TranscriptAnalyzer,
) -> Result<Vec<CompletedCourseRecord>, TranscriptError> {
    let transcript = extract_text(mime, bytes, extractor)?;
    let request = AnalysisRequest::new(&transcript, catalog, completed_courses);

    let raw = analyzer
        .analyze(&request)
        .map_err(|e| TranscriptError::Analysis(format!("{:#}", e)))?;

    parse_identified_courses(&raw)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use serde_json::json;

    struct NoPdf;

    impl TextExtractor for NoPdf {
        fn extract_text(&self, _pdf: &[u8]) -> anyhow::Result<String> {
            Err(anyhow!("pdf support not installed"))
        }
    }

    struct CannedAnalyzer(&'static str);

    impl TranscriptAnalyzer for CannedAnalyzer {
        fn analyze(&self, request: &AnalysisRequest) -> anyhow::Result<String> {
            assert!(request.prompt().contains(&request.transcript));
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn test_validate_upload() {
        assert_eq!(validate_upload("application/pdf", 1024), Ok(UploadKind::Pdf));
        assert_eq!(
            validate_upload("text/plain; charset=utf-8", 10),
            Ok(UploadKind::PlainText)
        );
        assert_eq!(
            validate_upload("image/png", 10),
            Err(UploadError::UnsupportedType("image/png".to_string()))
        );
        assert_eq!(
            validate_upload("application/pdf", MAX_UPLOAD_BYTES + 1),
            Err(UploadError::TooLarge { size: MAX_UPLOAD_BYTES + 1 })
        );
        assert_eq!(validate_upload("application/pdf", MAX_UPLOAD_BYTES), Ok(UploadKind::Pdf));
        assert_eq!(validate_upload("text/plain", 0), Err(UploadError::Empty));

        println!("✅ Upload validation test PASSED");
    }

    #[test]
    fn test_plain_text_skips_extractor() {
        let text = extract_text("text/plain", b"01:198:111 Intro 4.0 A", &NoPdf).unwrap();
        assert_eq!(text, "01:198:111 Intro 4.0 A");

        let err = extract_text("application/pdf", b"%PDF-1.4", &NoPdf).unwrap_err();
        assert!(matches!(err, TranscriptError::Extraction(_)));
    }

    #[test]
    fn test_credits_string_and_null_semester() {
        let raw = r#"[{"code": "01:198:111", "name": "Intro to CS", "credits": "4", "semester": null}]"#;

        let records = parse_identified_courses(raw).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].credits, 4);
        assert_eq!(records[0].semester, "Fall/Spring");
    }

    #[test]
    fn test_drops_incomplete_entries() {
        let raw = json!([
            {"code": "A", "name": "Kept", "credits": 3},
            {"code": "", "name": "No code", "credits": 3},
            {"code": "B", "credits": 3},
            {"code": "C", "name": "Zero credits", "credits": 0},
            {"code": "D", "name": "Null credits", "credits": null},
            "not an object"
        ])
        .to_string();

        let records = parse_identified_courses(&raw).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].code, "A");
    }

    #[test]
    fn test_credit_coercion() {
        assert_eq!(coerce_credits(&json!(4.9)), 4);
        assert_eq!(coerce_credits(&json!("3 credits")), 3);
        assert_eq!(coerce_credits(&json!(" 4")), 4);
        assert_eq!(coerce_credits(&json!("four")), FALLBACK_CREDITS);
        assert_eq!(coerce_credits(&json!("0")), FALLBACK_CREDITS);
        assert_eq!(coerce_credits(&json!(true)), FALLBACK_CREDITS);
    }

    #[test]
    fn test_rejects_non_array_response() {
        let err = parse_identified_courses(r#"{"courses": []}"#).unwrap_err();
        assert!(matches!(err, TranscriptError::MalformedResponse(_)));

        let err = parse_identified_courses("Sure! Here are your courses:").unwrap_err();
        assert!(matches!(err, TranscriptError::MalformedResponse(_)));
        assert_eq!(err.to_string(), "Failed to parse AI response");
    }

    #[test]
    fn test_analysis_request_lists_catalog() {
        let catalog = Catalog::builtin();
        let request = AnalysisRequest::new("transcript", &catalog, vec!["01:198:111".to_string()]);

        assert_eq!(request.catalog["01:198:112"].credits, 4);
        assert!(request.catalog.contains_key("01:750:194"));
        assert!(request.prompt().contains("already completed: 01:198:111"));
    }

    #[test]
    fn test_analyze_upload_pipeline() {
        let catalog = Catalog::builtin();
        let analyzer = CannedAnalyzer(
            r#"[{"code": "01:640:151", "name": "Calculus I", "credits": 4, "semester": "Fall 2024"}]"#,
        );

        let records = analyze_upload(
            "text/plain",
            b"01:640:151 CALC I 4.0 A",
            &catalog,
            vec![],
            &NoPdf,
            &analyzer,
        )
        .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].semester, "Fall 2024");

        let err = analyze_upload("image/png", b"x", &catalog, vec![], &NoPdf, &analyzer).unwrap_err();
        assert!(matches!(err, TranscriptError::Upload(UploadError::UnsupportedType(_))));
    }
}
