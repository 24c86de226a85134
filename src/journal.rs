use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Append-only JSONL record of what happened in a shell session.
///
/// A disabled journal accepts every call and writes nothing.
pub struct Journal {
    pub path: Option<PathBuf>,
    session_id: String,
    file: Option<File>,
}

#[derive(Serialize)]
struct Event<'a> {
    ts: DateTime<Utc>,
    session_id: &'a str,
    #[serde(rename = "type")]
    event_type: &'a str,
    #[serde(flatten)]
    data: serde_json::Value,
}

impl Journal {
    pub fn new(path: &Path, session_id: &str) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            path: Some(path.to_path_buf()),
            session_id: session_id.to_string(),
            file: Some(file),
        })
    }

    pub fn disabled(session_id: &str) -> Self {
        Self {
            path: None,
            session_id: session_id.to_string(),
            file: None,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn log(&mut self, event_type: &str, data: serde_json::Value) -> Result<()> {
        let Some(file) = self.file.as_mut() else {
            return Ok(());
        };
        let event = Event {
            ts: Utc::now(),
            session_id: &self.session_id,
            event_type,
            data,
        };
        let line = serde_json::to_string(&event)?;
        writeln!(file, "{}", line)?;
        file.flush()?;
        Ok(())
    }

    pub fn session_start(&mut self, base_url: &str) -> Result<()> {
        self.log("session_start", json!({ "base_url": base_url }))
    }

    pub fn login(&mut self, email: &str, restored: bool) -> Result<()> {
        self.log("login", json!({ "email": email, "restored": restored }))
    }

    pub fn logout(&mut self, reason: &str) -> Result<()> {
        self.log("logout", json!({ "reason": reason }))
    }

    /// Log a cart mutation and the item count the server reported afterwards
    pub fn cart_mutation(&mut self, action: &str, target: i64, ok: bool, items: usize) -> Result<()> {
        self.log(
            "cart_mutation",
            json!({
                "action": action,
                "target": target,
                "ok": ok,
                "items": items,
            }),
        )
    }

    pub fn order_placed(&mut self, order_id: i64, claim_code: &str, total_price: f64) -> Result<()> {
        self.log(
            "order_placed",
            json!({
                "order_id": order_id,
                "claim_code": claim_code,
                "total_price": total_price,
            }),
        )
    }

    pub fn order_transition(&mut self, order_id: i64, action: &str, status: Option<&str>) -> Result<()> {
        self.log(
            "order_transition",
            json!({
                "order_id": order_id,
                "action": action,
                "ok": status.is_some(),
                "status": status,
            }),
        )
    }

    pub fn api_error(&mut self, command: &str, error: &str) -> Result<()> {
        self.log(
            "api_error",
            json!({
                "command": command,
                "error": error,
            }),
        )
    }
}
