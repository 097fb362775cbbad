use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Local snapshot of a ledger account.
///
/// Identity is the `id`, which never changes once the snapshot exists.
/// Everything else the server reports lives in an open field map, so fields
/// this client does not know about survive a merge untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl Account {
    /// Create a snapshot holding nothing but its identity. Balances arrive
    /// with the first poll tick.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: Map::new(),
        }
    }

    /// Key-wise shallow merge: every key in the patch overwrites the stored
    /// value, keys absent from the patch are retained. The `id` field is
    /// identity and is never overwritten.
    pub fn merge(&mut self, patch: Map<String, Value>) {
        for (key, value) in patch {
            if key == "id" {
                continue;
            }
            self.fields.insert(key, value);
        }
    }

    pub fn fex(&self) -> Option<f64> {
        self.fields.get("fex").and_then(Value::as_f64)
    }

    pub fn su(&self) -> Option<i64> {
        self.fields.get("su").and_then(Value::as_i64)
    }

    /// Balance formatted for the dashboard header. Absent means "0"; the
    /// default is presentation-only and is never written into the snapshot.
    pub fn fex_display(&self) -> String {
        match self.fex() {
            Some(fex) => format!("{:.2}", fex),
            None => "0".to_string(),
        }
    }

    pub fn su_display(&self) -> String {
        self.su().unwrap_or(0).to_string()
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}
