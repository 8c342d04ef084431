use crate::access::NameMatchRule;
use crate::db;
use rusqlite::Connection;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::warn;

pub const SETTINGS_KEY: &str = "setup.gradesync";

/// Workspace configuration. The API key is deliberately absent: it is read
/// from the environment and never stored in the workspace.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub model: String,
    pub api_base_url: String,
    pub public_base_url: String,
    pub name_match: NameMatchRule,
    pub restamp_on_relookup: bool,
    pub request_timeout_secs: u64,
    pub pass_threshold: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings::from_value(&default_settings())
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Reads a merged settings object. Missing or ill-typed fields take the
    /// default.
    pub fn from_value(v: &Value) -> Self {
        let s = |k: &str, d: &str| {
            v.get(k)
                .and_then(Value::as_str)
                .unwrap_or(d)
                .to_string()
        };
        Settings {
            model: s("model", "gemini-2.5-flash"),
            api_base_url: s(
                "apiBaseUrl",
                "https://generativelanguage.googleapis.com/v1beta",
            ),
            public_base_url: s("publicBaseUrl", "http://localhost:3000/"),
            name_match: v
                .get("nameMatch")
                .and_then(Value::as_str)
                .and_then(NameMatchRule::parse)
                .unwrap_or_default(),
            restamp_on_relookup: v
                .get("restampOnRelookup")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            request_timeout_secs: v
                .get("requestTimeoutSecs")
                .and_then(Value::as_u64)
                .unwrap_or(60),
            pass_threshold: v
                .get("passThreshold")
                .and_then(Value::as_f64)
                .unwrap_or(3.0),
        }
    }

    pub fn to_value(&self) -> Value {
        json!({
            "model": self.model,
            "apiBaseUrl": self.api_base_url,
            "publicBaseUrl": self.public_base_url,
            "nameMatch": self.name_match.as_str(),
            "restampOnRelookup": self.restamp_on_relookup,
            "requestTimeoutSecs": self.request_timeout_secs,
            "passThreshold": self.pass_threshold,
        })
    }
}

pub fn default_settings() -> Value {
    json!({
        "model": "gemini-2.5-flash",
        "apiBaseUrl": "https://generativelanguage.googleapis.com/v1beta",
        "publicBaseUrl": "http://localhost:3000/",
        "nameMatch": "exact",
        "restampOnRelookup": false,
        "requestTimeoutSecs": 60,
        "passThreshold": 3.0
    })
}

fn parse_bool(v: &Value, key: &str) -> Result<bool, String> {
    v.as_bool()
        .ok_or_else(|| format!("{} must be boolean", key))
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v
        .as_i64()
        .ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn parse_f64_range(v: &Value, key: &str, min: f64, max: f64) -> Result<f64, String> {
    let n = v
        .as_f64()
        .ok_or_else(|| format!("{} must be a number", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn parse_string_max(v: &Value, key: &str, max_len: usize) -> Result<String, String> {
    let s = v.as_str().ok_or_else(|| format!("{} must be string", key))?;
    let s = s.trim();
    if s.len() > max_len {
        return Err(format!("{} length must be <= {}", key, max_len));
    }
    Ok(s.to_string())
}

fn parse_url(v: &Value, key: &str) -> Result<String, String> {
    let s = parse_string_max(v, key, 200)?;
    if !(s.starts_with("http://") || s.starts_with("https://")) {
        return Err(format!("{} must be an http(s) URL", key));
    }
    Ok(s)
}

pub fn merge_settings_patch(current: &mut Value, patch: &Map<String, Value>) -> Result<(), String> {
    let obj = current
        .as_object_mut()
        .ok_or_else(|| "internal settings object must be a JSON object".to_string())?;
    for (k, v) in patch {
        match k.as_str() {
            "model" => {
                let s = parse_string_max(v, k, 80)?;
                if s.is_empty() {
                    return Err("model must not be empty".into());
                }
                obj.insert(k.clone(), Value::String(s));
            }
            "apiBaseUrl" | "publicBaseUrl" => {
                obj.insert(k.clone(), Value::String(parse_url(v, k)?));
            }
            "nameMatch" => {
                let s = parse_string_max(v, k, 24)?;
                let rule = NameMatchRule::parse(&s)
                    .ok_or_else(|| "nameMatch must be one of: exact, foldAccents".to_string())?;
                obj.insert(k.clone(), Value::String(rule.as_str().to_string()));
            }
            "restampOnRelookup" => {
                obj.insert(k.clone(), Value::Bool(parse_bool(v, k)?));
            }
            "requestTimeoutSecs" => {
                obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, 600)?));
            }
            "passThreshold" => {
                obj.insert(k.clone(), json!(parse_f64_range(v, k, 0.0, 10.0)?));
            }
            _ => return Err(format!("unknown setting: {}", k)),
        }
    }
    Ok(())
}

pub fn load_settings(conn: &Connection) -> anyhow::Result<Settings> {
    let mut current = default_settings();
    match db::settings_get_json(conn, SETTINGS_KEY) {
        Ok(Some(saved)) => {
            if let Some(saved_obj) = saved.as_object() {
                // Apply field by field so one bad historical value does not
                // discard the rest.
                for (k, v) in saved_obj {
                    let mut one = Map::new();
                    one.insert(k.clone(), v.clone());
                    if let Err(msg) = merge_settings_patch(&mut current, &one) {
                        warn!(field = %k, error = %msg, "ignoring saved setting");
                    }
                }
            }
        }
        Ok(None) => {}
        Err(e) => {
            if e.downcast_ref::<serde_json::Error>().is_some() {
                warn!(error = %e, "saved settings are malformed; using defaults");
            } else {
                return Err(e);
            }
        }
    }
    Ok(Settings::from_value(&current))
}

pub fn save_settings(conn: &Connection, settings: &Settings) -> anyhow::Result<()> {
    db::settings_set_json(conn, SETTINGS_KEY, &settings.to_value())
}
