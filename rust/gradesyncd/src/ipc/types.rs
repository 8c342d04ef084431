use std::path::PathBuf;

use crate::store::{FallbackGradeStore, SqliteGradeStore};
use rusqlite::Connection;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub type WorkspaceStore = FallbackGradeStore<SqliteGradeStore>;

/// Everything a request may touch. `db` serves settings; `store` owns its own
/// connection to the same workspace file.
#[derive(Default)]
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub store: Option<WorkspaceStore>,
}
