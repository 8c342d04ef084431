use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{current_settings, model_client};
use crate::ipc::types::{AppState, Request};
use crate::store::{FallbackGradeStore, SqliteGradeStore};
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    let settings = current_settings(state);
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "degraded": state.store.as_ref().map(|s| s.is_degraded()).unwrap_or(false),
            "model": settings.model,
            "modelKeyConfigured": model_client(&settings).has_api_key()
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    let conn = match db::open_db(&path) {
        Ok(conn) => conn,
        Err(e) => return err(&req.id, "db_open_failed", format!("{e:?}"), None),
    };
    let store = match SqliteGradeStore::open(&path) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_open_failed", e.to_string(), None),
    };

    // Reopening a workspace also clears any earlier in-memory degradation.
    state.workspace = Some(path.clone());
    state.db = Some(conn);
    state.store = Some(FallbackGradeStore::new(store));
    info!(workspace = %path.display(), "workspace selected");
    ok(&req.id, json!({ "workspacePath": path.to_string_lossy() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
