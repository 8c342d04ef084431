use crate::error::GradeSyncError;
use crate::ipc::error::{fail, ok};
use crate::ipc::helpers::{current_settings, model_client, optional_str, required_str, store_mut};
use crate::ipc::types::{AppState, Request};
use crate::portal::{self, LookupOutcome, StudentResponse};
use crate::store::GradeStore;
use serde_json::json;

fn handle_lookup(state: &mut AppState, req: &Request) -> serde_json::Value {
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let batch_id = optional_str(req, "batchId");
    let settings = current_settings(state);
    let store = match store_mut(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };

    let outcome = match portal::lookup(
        store,
        batch_id.as_deref(),
        &name,
        settings.name_match,
        settings.restamp_on_relookup,
    ) {
        Ok(o) => o,
        Err(e) => return fail(&req.id, &e),
    };
    let degraded = store.is_degraded();
    let result = match &outcome {
        LookupOutcome::Found { record, first_view } => json!({
            "outcome": outcome.as_str(),
            "student": record,
            "firstView": first_view,
            "canRespond": record.status.can_respond(),
            "passing": record.grades.is_passing(settings.pass_threshold),
            "degraded": degraded
        }),
        LookupOutcome::NotFound | LookupOutcome::BatchInvalid => json!({
            "outcome": outcome.as_str(),
            "degraded": degraded
        }),
    };
    ok(&req.id, result)
}

fn handle_respond(state: &mut AppState, req: &Request, accept: bool) -> serde_json::Value {
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let response = if accept {
        StudentResponse::Accept
    } else {
        StudentResponse::Reject {
            reason: req
                .params
                .get("reason")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
        }
    };
    let store = match store_mut(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    match portal::respond(store, &student_id, response) {
        Ok(record) => ok(
            &req.id,
            json!({ "student": record, "degraded": store.is_degraded() }),
        ),
        Err(e) => fail(&req.id, &e),
    }
}

fn handle_encouragement(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let settings = current_settings(state);
    let store = match store_mut(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let records = match store.load_all() {
        Ok(r) => r,
        Err(e) => return fail(&req.id, &GradeSyncError::from(e)),
    };
    let Some(record) = records.iter().find(|r| r.id == student_id) else {
        return fail(&req.id, &GradeSyncError::NotFound(student_id));
    };
    let message = portal::encouragement_or_fallback(
        &model_client(&settings),
        record,
        settings.pass_threshold,
    );
    ok(&req.id, json!({ "message": message }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "portal.lookup" => Some(handle_lookup(state, req)),
        "portal.accept" => Some(handle_respond(state, req, true)),
        "portal.reject" => Some(handle_respond(state, req, false)),
        "portal.encouragement" => Some(handle_encouragement(state, req)),
        _ => None,
    }
}
