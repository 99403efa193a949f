use std::path::Path;
use std::time::SystemTime;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::fs;
use tracing::{debug, info, warn};
use trajedit_core::{Dialect, PromptStep, StepView};
use walkdir::WalkDir;

use crate::AppState;
use crate::error::{ApiError, ApiResult};

// ============================================================================
// Health
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub data_dir: String,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        data_dir: state.data_dir.display().to_string(),
    })
}

// ============================================================================
// Document edits
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ReplaceThoughtRequest {
    pub content: Option<Value>,
    pub original_index: Option<i64>,
    pub old_thought: Option<String>,
    pub new_thought: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RemoveStepRequest {
    pub content: Option<Value>,
    pub original_index: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ReplaceRequest {
    pub content: Option<Value>,
    pub search_term: Option<String>,
    pub replace_term: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ContentRequest {
    pub content: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct ModifiedResponse {
    pub modified_content: String,
}

#[derive(Debug, Serialize)]
pub struct ReplaceResponse {
    pub modified_content: String,
    pub replacements: usize,
}

#[derive(Debug, Serialize)]
pub struct StepsResponse {
    pub steps: Vec<StepView>,
    pub prompt: Vec<PromptStep>,
}

/// Rewrite one step's thought everywhere it is echoed.
pub async fn replace_thought(
    payload: Result<Json<ReplaceThoughtRequest>, JsonRejection>,
) -> ApiResult<Json<ModifiedResponse>> {
    let Json(req) = payload?;
    let doc = parse_document(req.content)?;
    let step = require_index(req.original_index)?;
    let new_thought = require_text(req.new_thought, "new_thought")?;
    let old_thought = req.old_thought.filter(|t| !t.is_empty());

    let updated =
        trajedit_core::replace_thought(&doc, step, old_thought.as_deref(), &new_thought)?;
    info!(step, "Replaced thought");

    Ok(Json(ModifiedResponse {
        modified_content: render(&updated)?,
    }))
}

/// Drop one step and all of its echoes.
pub async fn remove_step(
    payload: Result<Json<RemoveStepRequest>, JsonRejection>,
) -> ApiResult<Json<ModifiedResponse>> {
    let Json(req) = payload?;
    let doc = parse_document(req.content)?;
    let step = require_index(req.original_index)?;

    let updated = trajedit_core::remove_step(&doc, step)?;
    info!(step, "Removed step");

    Ok(Json(ModifiedResponse {
        modified_content: render(&updated)?,
    }))
}

/// Regex find/replace across the document history.
pub async fn replace(
    payload: Result<Json<ReplaceRequest>, JsonRejection>,
) -> ApiResult<Json<ReplaceResponse>> {
    let Json(req) = payload?;
    let doc = parse_document(req.content)?;
    let search_term = require_text(req.search_term, "search_term")?;
    let replace_term = req
        .replace_term
        .ok_or_else(|| ApiError::bad_request("Missing required field: replace_term"))?;

    let rewrite = trajedit_core::bulk_replace(&doc, &search_term, &replace_term)?;
    info!(replacements = rewrite.replacements, "Bulk replaced text");

    Ok(Json(ReplaceResponse {
        modified_content: render(&rewrite.document)?,
        replacements: rewrite.replacements,
    }))
}

/// Step list plus the sanitized prompt context for an LLM.
pub async fn steps(
    payload: Result<Json<ContentRequest>, JsonRejection>,
) -> ApiResult<Json<StepsResponse>> {
    let Json(req) = payload?;
    let doc = parse_document(req.content)?;

    Ok(Json(StepsResponse {
        steps: trajedit_core::project_steps(&doc)?,
        prompt: trajedit_core::prompt_steps(&doc)?,
    }))
}

// ============================================================================
// Storage
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SaveRequest {
    pub content: Option<Value>,
    pub filename: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SaveResponse {
    pub message: String,
    pub path: String,
}

/// Stored trajectory file with whatever could be read from it.
#[derive(Debug, Serialize)]
pub struct FileEntry {
    pub name: String,
    pub size: u64,
    pub modified: Option<String>,
    pub dialect: Option<Dialect>,
    pub steps: Option<usize>,
    pub exit_status: Option<String>,
    pub resolved: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct FilesResponse {
    pub files: Vec<FileEntry>,
}

/// Write a document into the data directory.
pub async fn save(
    State(state): State<AppState>,
    payload: Result<Json<SaveRequest>, JsonRejection>,
) -> ApiResult<Json<SaveResponse>> {
    let Json(req) = payload?;
    let filename = require_text(req.filename, "filename")?;
    let content = match req.content {
        Some(Value::String(text)) if !text.is_empty() => text,
        Some(doc @ (Value::Object(_) | Value::Array(_))) => render(&doc)?,
        _ => return Err(ApiError::bad_request("Missing required field: content")),
    };
    validate_filename(&filename)?;

    fs::create_dir_all(&state.data_dir).await?;
    let path = state.data_dir.join(&filename);
    fs::write(&path, content.as_bytes()).await?;

    let path = path.display().to_string();
    info!(bytes = content.len(), "File saved successfully to {}", path);

    Ok(Json(SaveResponse {
        message: format!("File saved successfully to {path}"),
        path,
    }))
}

/// List stored trajectories in the data directory.
pub async fn list_files(State(state): State<AppState>) -> ApiResult<Json<FilesResponse>> {
    let data_dir = state.data_dir.clone();
    let files = tokio::task::spawn_blocking(move || scan_data_dir(&data_dir))
        .await
        .map_err(|e| ApiError::internal(format!("file listing task failed: {e}")))?;

    Ok(Json(FilesResponse { files }))
}

fn scan_data_dir(data_dir: &Path) -> Vec<FileEntry> {
    if !data_dir.is_dir() {
        debug!("Data directory {} does not exist yet", data_dir.display());
        return Vec::new();
    }

    let mut files: Vec<FileEntry> = WalkDir::new(data_dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "json"))
        .map(|entry| describe_file(entry.path()))
        .collect();

    files.sort_by(|a, b| a.name.cmp(&b.name));
    files
}

fn describe_file(path: &Path) -> FileEntry {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let metadata = std::fs::metadata(path).ok();
    let mut entry = FileEntry {
        name,
        size: metadata.as_ref().map(|m| m.len()).unwrap_or(0),
        modified: metadata
            .and_then(|m| m.modified().ok())
            .map(format_timestamp),
        dialect: None,
        steps: None,
        exit_status: None,
        resolved: None,
    };

    let doc = match std::fs::read(path)
        .map_err(|e| e.to_string())
        .and_then(|bytes| serde_json::from_slice::<Value>(&bytes).map_err(|e| e.to_string()))
    {
        Ok(doc) => doc,
        Err(e) => {
            debug!("Could not read {}: {}", path.display(), e);
            return entry;
        }
    };

    if let Ok(dialect) = trajedit_core::classify(&doc) {
        let exit_status = doc
            .pointer("/info/exit_status")
            .and_then(Value::as_str)
            .map(str::to_string);
        entry.dialect = Some(dialect);
        entry.steps = Some(trajedit_core::step_count(&doc, dialect));
        entry.resolved = Some(
            exit_status
                .as_deref()
                .is_some_and(|status| status.starts_with("submitted")),
        );
        entry.exit_status = exit_status;
    }

    entry
}

fn format_timestamp(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).to_rfc3339()
}

// ============================================================================
// Request helpers
// ============================================================================

/// Parse the `content` field: a serialized document string, or an inline
/// JSON object.
fn parse_document(content: Option<Value>) -> ApiResult<Value> {
    match content {
        Some(Value::String(text)) if !text.trim().is_empty() => Ok(serde_json::from_str(&text)?),
        Some(doc @ Value::Object(_)) => Ok(doc),
        _ => Err(ApiError::bad_request("Missing required field: content")),
    }
}

fn require_index(index: Option<i64>) -> ApiResult<i64> {
    index.ok_or_else(|| ApiError::bad_request("Missing required field: original_index"))
}

fn require_text(value: Option<String>, field: &str) -> ApiResult<String> {
    value
        .filter(|text| !text.is_empty())
        .ok_or_else(|| ApiError::bad_request(format!("Missing required field: {field}")))
}

fn render(doc: &Value) -> ApiResult<String> {
    serde_json::to_string_pretty(doc)
        .map_err(|e| ApiError::internal(format!("serializing document: {e}")))
}

/// Reject names that could escape the data directory.
pub fn validate_filename(name: &str) -> ApiResult<()> {
    if name.is_empty() || name.contains("..") || name.contains('/') || name.contains('\\') {
        return Err(ApiError::bad_request("Invalid filename"));
    }
    Ok(())
}
