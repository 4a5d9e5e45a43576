use std::io::Write;

use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::error::{Result, SimError};

/// A command result ready to print either as a JSON envelope or as a short
/// human line.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub body: Value,
    pub text: String,
}

impl Rendered {
    pub fn new<T: Serialize + ?Sized>(body: &T, text: impl Into<String>) -> Result<Self> {
        let body = serde_json::to_value(body).map_err(|e| SimError::io("failed to encode result", e))?;
        Ok(Rendered {
            body,
            text: text.into(),
        })
    }

    /// `{ "ok": true, ...body }`. Non-object bodies land under `result`.
    pub fn envelope(&self) -> Value {
        let mut out = Map::new();
        out.insert("ok".into(), json!(true));
        match &self.body {
            Value::Object(fields) => {
                for (k, v) in fields {
                    if k != "ok" {
                        out.insert(k.clone(), v.clone());
                    }
                }
            }
            Value::Null => {}
            other => {
                out.insert("result".into(), other.clone());
            }
        }
        Value::Object(out)
    }
}

fn pretty(value: &impl Serialize) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

pub fn print_success(rendered: &Rendered, json: bool) {
    let mut stdout = std::io::stdout().lock();
    let line = if json {
        pretty(&rendered.envelope())
    } else {
        rendered.text.clone()
    };
    if !line.is_empty() {
        let _ = writeln!(stdout, "{}", line);
    }
}

/// JSON mode prints the error envelope on stdout; otherwise a one-line
/// `error [CODE]: message` plus details on stderr.
pub fn print_failure(err: &SimError, json: bool) {
    if json {
        let _ = writeln!(std::io::stdout().lock(), "{}", pretty(&err.envelope()));
        return;
    }
    let mut stderr = std::io::stderr().lock();
    let _ = writeln!(stderr, "error [{}]: {}", err.code(), err);
    let details = err.details();
    if !details.is_empty() {
        let _ = writeln!(stderr, "{}", pretty(&details));
    }
}
