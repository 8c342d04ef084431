use crate::ipc::error::{err, ok};
use crate::ipc::helpers::db_conn;
use crate::ipc::types::{AppState, Request};
use crate::settings;
use serde_json::json;
use tracing::info;

fn handle_setup_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    match settings::load_settings(conn) {
        Ok(s) => ok(&req.id, s.to_value()),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut current = match settings::load_settings(conn) {
        Ok(s) => s.to_value(),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if let Err(msg) = settings::merge_settings_patch(&mut current, patch_obj) {
        return err(&req.id, "bad_params", msg, None);
    }
    let updated = settings::Settings::from_value(&current);
    if let Err(e) = settings::save_settings(conn, &updated) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    info!(
        model = %updated.model,
        name_match = updated.name_match.as_str(),
        timeout_secs = updated.request_timeout_secs,
        "settings updated"
    );
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
