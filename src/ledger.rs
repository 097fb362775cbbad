use anyhow::{anyhow, Result};
use reqwest::Client;
use serde_json::{Map, Value};

/// Read-only client for the state-ledger account endpoint.
#[derive(Clone)]
pub struct LedgerClient {
    client: Client,
    base_url: String,
}

impl LedgerClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.to_string(),
        }
    }

    /// Fetch the server-side state for an account as a raw field map. The
    /// caller decides how to fold it into its snapshot.
    pub async fn fetch(&self, account_id: &str) -> Result<Map<String, Value>> {
        let url = format!("{}/api/ledger/account/{}", self.base_url, account_id);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "ledger request failed with status: {}",
                response.status()
            ));
        }

        match response.json::<Value>().await? {
            Value::Object(fields) => Ok(fields),
            other => Err(anyhow!("ledger returned a non-object payload: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub;
    use serde_json::json;

    #[tokio::test]
    async fn fetch_returns_the_field_map() {
        let base_url = stub::serve_json(r#"{"fex": 1000.0, "su": 50, "staked": 100.0}"#).await;
        let client = LedgerClient::new(&base_url);

        let fields = client.fetch("0xUserA").await.unwrap();

        assert_eq!(fields.get("fex"), Some(&json!(1000.0)));
        assert_eq!(fields.get("staked"), Some(&json!(100.0)));
    }

    #[tokio::test]
    async fn fetch_rejects_error_statuses() {
        let base_url = stub::serve_status("500 Internal Server Error", "{}").await;
        let client = LedgerClient::new(&base_url);

        assert!(client.fetch("0xUserA").await.is_err());
    }

    #[tokio::test]
    async fn fetch_rejects_non_object_payloads() {
        let base_url = stub::serve_json("[1, 2, 3]").await;
        let client = LedgerClient::new(&base_url);

        assert!(client.fetch("0xUserA").await.is_err());
    }
}
