//! Boundary to the hosted multimodal model.
//!
//! Extraction turns a screenshot of the grade sheet into rows; a second,
//! optional call writes a one-sentence encouragement. Both sit behind traits
//! so the rest of the daemon never touches the network directly.

use crate::model::{ExtractedRow, ParsedGrades};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

pub const API_KEY_ENVS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];
pub const FIXTURE_ENV: &str = "GRADESYNC_EXTRACTION_FIXTURE";

const EXTRACTION_PROMPT: &str = "
Analyze the provided image of a student grade spreadsheet.
Extract the data into a JSON structure.

The columns typically correspond to:
1. Student Name (Nombre)
2. Trabajo Final -> Avances (advances)
3. Trabajo Final -> Replica (replica)
4. Trabajo Final -> Informe (report)
5. Nota Final Corte I 15% (final15)
6. Nota Final Corte I 20% (final20)
7. Corte (finalCut)

Ignore the row numbers. Ensure numerical values are parsed as numbers.
If a cell is empty or '-', treat it as 0.
";

const ROW_FIELDS: [&str; 7] = [
    "name", "advances", "replica", "report", "final15", "final20", "finalCut",
];

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("image is empty")]
    EmptyImage,

    #[error("API key not configured (set {})", API_KEY_ENVS.join(" or "))]
    MissingApiKey,

    #[error("request to model failed: {0}")]
    Transport(String),

    #[error("model returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("model returned no text")]
    EmptyResponse,

    #[error("model reply is not the expected JSON: {0}")]
    Parse(String),

    #[error("row {row}: {message}")]
    InvalidRow { row: usize, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    pub mime: &'static str,
}

impl ImageUpload {
    pub fn new(bytes: Vec<u8>) -> Self {
        let mime = sniff_mime(&bytes);
        Self { bytes, mime }
    }
}

/// Picks the MIME type from magic bytes. Unknown formats are sent as PNG.
pub fn sniff_mime(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        "image/png"
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "image/jpeg"
    } else if bytes.starts_with(b"GIF8") {
        "image/gif"
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "image/webp"
    } else {
        "image/png"
    }
}

pub trait GradeExtractor {
    fn extract(&self, image: &ImageUpload) -> Result<Vec<ExtractedRow>, ExtractError>;
}

pub trait Encourager {
    fn encourage(
        &self,
        student_name: &str,
        grade: f64,
        pass_threshold: f64,
    ) -> Result<String, ExtractError>;
}

/// Parses the model's JSON text and re-checks every row.
pub fn parse_grades_reply(text: &str) -> Result<Vec<ExtractedRow>, ExtractError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ExtractError::EmptyResponse);
    }
    let parsed: ParsedGrades =
        serde_json::from_str(text).map_err(|e| ExtractError::Parse(e.to_string()))?;
    for (i, row) in parsed.students.iter().enumerate() {
        if row.name.trim().is_empty() {
            return Err(ExtractError::InvalidRow {
                row: i + 1,
                message: "name is empty".into(),
            });
        }
        if let Some((field, _)) = row.numbers().iter().find(|(_, v)| !v.is_finite()) {
            return Err(ExtractError::InvalidRow {
                row: i + 1,
                message: format!("{} is not a finite number", field),
            });
        }
    }
    Ok(parsed.students)
}

fn resolve_api_key() -> Option<String> {
    API_KEY_ENVS
        .iter()
        .filter_map(|k| std::env::var(k).ok())
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

pub fn extraction_request_body(image: &ImageUpload) -> Value {
    let mut row_props = serde_json::Map::new();
    for field in ROW_FIELDS {
        let ty = if field == "name" { "STRING" } else { "NUMBER" };
        row_props.insert(field.to_string(), json!({ "type": ty }));
    }
    json!({
        "contents": [{
            "parts": [
                { "inlineData": { "mimeType": image.mime, "data": B64.encode(&image.bytes) } },
                { "text": EXTRACTION_PROMPT }
            ]
        }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": {
                "type": "OBJECT",
                "properties": {
                    "students": {
                        "type": "ARRAY",
                        "items": {
                            "type": "OBJECT",
                            "properties": row_props,
                            "required": ROW_FIELDS
                        }
                    }
                }
            }
        }
    })
}

/// The supportive/congratulatory split follows the configured pass mark.
pub fn encouragement_prompt(student_name: &str, grade: f64, pass_threshold: f64) -> String {
    format!(
        "Generate a very short (1 sentence), encouraging message for a student named {} who got a final grade of {}. If the grade is low (below {:.1}), be supportive. If high, be congratulatory. Language: Spanish.",
        student_name, grade, pass_threshold
    )
}

/// Concatenated text parts of the first candidate.
pub fn candidate_text(response: &Value) -> Option<String> {
    let parts = response
        .pointer("/candidates/0/content/parts")?
        .as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect();
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    api_key: Option<String>,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl GeminiClient {
    pub fn new(api_key: Option<String>, base_url: &str, model: &str, timeout: Duration) -> Self {
        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            timeout,
        }
    }

    pub fn from_env(base_url: &str, model: &str, timeout: Duration) -> Self {
        Self::new(resolve_api_key(), base_url, model, timeout)
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn generate(&self, body: &Value) -> Result<String, ExtractError> {
        let api_key = self.api_key.as_deref().ok_or(ExtractError::MissingApiKey)?;
        let endpoint = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| ExtractError::Transport(format!("could not build client: {e}")))?;
        debug!(endpoint = %endpoint, "calling model");
        let response = client
            .post(&endpoint)
            .header("x-goog-api-key", api_key)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .map_err(|e| ExtractError::Transport(e.without_url().to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .map_err(|e| {
                ExtractError::Transport(format!("could not read body: {}", e.without_url()))
            })?;
        if !status.is_success() {
            return Err(ExtractError::Status {
                status: status.as_u16(),
                body: text.trim().to_string(),
            });
        }
        let value: Value =
            serde_json::from_str(&text).map_err(|e| ExtractError::Parse(e.to_string()))?;
        candidate_text(&value).ok_or(ExtractError::EmptyResponse)
    }
}

impl GradeExtractor for GeminiClient {
    fn extract(&self, image: &ImageUpload) -> Result<Vec<ExtractedRow>, ExtractError> {
        if image.bytes.is_empty() {
            return Err(ExtractError::EmptyImage);
        }
        let reply = self.generate(&extraction_request_body(image))?;
        let rows = parse_grades_reply(&reply)?;
        info!(rows = rows.len(), model = %self.model, "grade sheet extracted");
        Ok(rows)
    }
}

impl Encourager for GeminiClient {
    fn encourage(
        &self,
        student_name: &str,
        grade: f64,
        pass_threshold: f64,
    ) -> Result<String, ExtractError> {
        let prompt = encouragement_prompt(student_name, grade, pass_threshold);
        let body = json!({ "contents": [{ "parts": [{ "text": prompt }] }] });
        Ok(self.generate(&body)?.trim().to_string())
    }
}

/// Replays a canned model reply from disk. Lets the daemon run without
/// network access.
#[derive(Debug, Clone)]
pub struct FixtureExtractor {
    path: PathBuf,
}

impl FixtureExtractor {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn from_env() -> Option<Self> {
        std::env::var(FIXTURE_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(Self::new)
    }
}

impl GradeExtractor for FixtureExtractor {
    fn extract(&self, image: &ImageUpload) -> Result<Vec<ExtractedRow>, ExtractError> {
        if image.bytes.is_empty() {
            return Err(ExtractError::EmptyImage);
        }
        let text = std::fs::read_to_string(&self.path)
            .map_err(|e| ExtractError::Transport(format!("{}: {e}", self.path.display())))?;
        parse_grades_reply(&text)
    }
}
