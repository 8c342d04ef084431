use crate::batch;
use crate::error::GradeSyncError;
use crate::extract::ImageUpload;
use crate::ipc::error::{err, fail, ok};
use crate::ipc::helpers::{current_settings, extractor_for, optional_str, store_mut};
use crate::ipc::types::{AppState, Request};
use crate::link;
use crate::report::BatchStats;
use crate::store::GradeStore;
use base64::Engine;
use serde_json::json;
use tracing::{info, warn};

fn read_image(req: &Request) -> Result<Vec<u8>, serde_json::Value> {
    if let Some(path) = optional_str(req, "imagePath") {
        return std::fs::read(&path).map_err(|e| {
            err(
                &req.id,
                "bad_params",
                format!("cannot read imagePath: {e}"),
                Some(json!({ "imagePath": path })),
            )
        });
    }
    let Some(encoded) = optional_str(req, "imageBase64") else {
        return Err(err(
            &req.id,
            "bad_params",
            "missing imagePath or imageBase64",
            None,
        ));
    };
    // Accept data URLs as produced by a browser file reader.
    let payload = match encoded.split_once(";base64,") {
        Some((_, rest)) => rest,
        None => encoded.as_str(),
    };
    base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| err(&req.id, "bad_params", format!("imageBase64: {e}"), None))
}

fn handle_batch_upload(state: &mut AppState, req: &Request) -> serde_json::Value {
    let bytes = match read_image(req) {
        Ok(b) => b,
        Err(e) => return e,
    };
    let settings = current_settings(state);
    let extractor = extractor_for(&settings);
    let store = match store_mut(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };

    let digest = batch::image_digest(&bytes);
    let image = ImageUpload::new(bytes);
    info!(mime = image.mime, bytes = image.bytes.len(), sha256 = %digest, "grade sheet received");
    let uploaded = match batch::upload(store, extractor.as_ref(), &image) {
        Ok(b) => b,
        Err(e) => {
            let e = GradeSyncError::from(e);
            warn!(error = %e, "upload rejected; previous batch stays active");
            return fail(&req.id, &e);
        }
    };

    ok(
        &req.id,
        json!({
            "batchId": uploaded.batch_id,
            "studentCount": uploaded.records.len(),
            "shareLink": link::share_link(&settings.public_base_url, &uploaded.batch_id),
            "sourceSha256": digest,
            "students": uploaded.records,
            "degraded": store.is_degraded()
        }),
    )
}

fn handle_batch_current(state: &mut AppState, req: &Request) -> serde_json::Value {
    let settings = current_settings(state);
    let store = match store_mut(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let records = match store.load_all() {
        Ok(r) => r,
        Err(e) => return fail(&req.id, &GradeSyncError::from(e)),
    };
    let batch_id = records.first().and_then(|r| r.batch_id.clone());
    let share_link = batch_id
        .as_deref()
        .map(|id| link::share_link(&settings.public_base_url, id));
    ok(
        &req.id,
        json!({
            "batchId": batch_id,
            "shareLink": share_link,
            "stats": BatchStats::from_records(&records),
            "students": records,
            "degraded": store.is_degraded()
        }),
    )
}

fn handle_batch_clear(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_mut(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    if let Err(e) = store.clear() {
        return fail(&req.id, &GradeSyncError::from(e));
    }
    info!("grade batch cleared");
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "batch.upload" => Some(handle_batch_upload(state, req)),
        "batch.current" => Some(handle_batch_current(state, req)),
        "batch.clear" => Some(handle_batch_clear(state, req)),
        _ => None,
    }
}
