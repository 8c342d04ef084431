use crate::error::GradeSyncError;
use crate::ipc::error::{err, fail, ok};
use crate::ipc::helpers::{optional_str, store_mut};
use crate::ipc::types::{AppState, Request};
use crate::report;
use crate::store::GradeStore;
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

fn handle_export_csv(state: &mut AppState, req: &Request) -> serde_json::Value {
    let out_path = optional_str(req, "outPath").map(PathBuf::from);
    let store = match store_mut(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let records = match store.load_all() {
        Ok(r) => r,
        Err(e) => return fail(&req.id, &GradeSyncError::from(e)),
    };
    let csv = report::export_csv(&records);
    let file_name = report::report_file_name(chrono::Local::now().date_naive());

    let written = match out_path {
        None => None,
        Some(p) => {
            let target = if p.is_dir() { p.join(&file_name) } else { p };
            if let Err(e) = std::fs::write(&target, &csv) {
                return err(
                    &req.id,
                    "io_failed",
                    e.to_string(),
                    Some(json!({ "path": target.to_string_lossy() })),
                );
            }
            info!(path = %target.display(), rows = records.len(), "grade report written");
            Some(target.to_string_lossy().to_string())
        }
    };

    ok(
        &req.id,
        json!({
            "csv": csv,
            "fileName": file_name,
            "rowsExported": records.len(),
            "path": written
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.exportCsv" => Some(handle_export_csv(state, req)),
        _ => None,
    }
}
