use crate::ipc::error::ok;
use crate::ipc::helpers::required_str;
use crate::ipc::types::{AppState, Request};
use crate::link;
use serde_json::json;

fn handle_link_parse(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let url = match required_str(req, "url") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let route = link::parse_fragment(&url);
    ok(
        &req.id,
        json!({
            "view": route.view.as_str(),
            "batchId": route.batch_id
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "link.parse" => Some(handle_link_parse(state, req)),
        _ => None,
    }
}
