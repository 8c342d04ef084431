use crate::extract::{FixtureExtractor, GeminiClient, GradeExtractor};
use crate::error::GradeSyncError;
use crate::ipc::error::{err, fail};
use crate::ipc::types::{AppState, Request, WorkspaceStore};
use crate::settings::{self, Settings};
use rusqlite::Connection;
use serde_json::Value;
use tracing::{debug, warn};

pub fn required_str(req: &Request, key: &str) -> Result<String, Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn optional_str(req: &Request, key: &str) -> Option<String> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
}

pub fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| fail(&req.id, &GradeSyncError::NoWorkspace))
}

pub fn store_mut<'a>(state: &'a mut AppState, req: &Request) -> Result<&'a mut WorkspaceStore, Value> {
    state
        .store
        .as_mut()
        .ok_or_else(|| fail(&req.id, &GradeSyncError::NoWorkspace))
}

/// Settings never block a request: if they cannot be read the defaults apply.
pub fn current_settings(state: &AppState) -> Settings {
    let Some(conn) = state.db.as_ref() else {
        return Settings::default();
    };
    settings::load_settings(conn).unwrap_or_else(|e| {
        warn!(error = %e, "could not read settings; using defaults");
        Settings::default()
    })
}

pub fn model_client(settings: &Settings) -> GeminiClient {
    GeminiClient::from_env(
        &settings.api_base_url,
        &settings.model,
        settings.request_timeout(),
    )
}

pub fn extractor_for(settings: &Settings) -> Box<dyn GradeExtractor> {
    if let Some(fixture) = FixtureExtractor::from_env() {
        debug!("using fixture extractor");
        return Box::new(fixture);
    }
    Box::new(model_client(settings))
}
