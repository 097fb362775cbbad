use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct AnalyzeRequest<'a> {
    #[serde(rename = "accountId")]
    account_id: &'a str,
    text: &'a str,
}

#[derive(Deserialize)]
struct AnalyzeResponse {
    guidance: Option<String>,
}

/// Client for the oracle analysis endpoint that produces co-pilot guidance.
#[derive(Clone)]
pub struct OracleClient {
    client: Client,
    base_url: String,
}

impl OracleClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.to_string(),
        }
    }

    /// Submit an insight for analysis and return the guidance text.
    ///
    /// A payload without a string `guidance` field is an error, never empty
    /// guidance.
    pub async fn analyze(&self, account_id: &str, text: &str) -> Result<String> {
        let url = format!("{}/api/oracle/pocc/analyze", self.base_url);

        let request = AnalyzeRequest { account_id, text };

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "oracle request failed with status: {}",
                response.status()
            ));
        }

        let analyze_response: AnalyzeResponse = response.json().await?;
        analyze_response
            .guidance
            .ok_or_else(|| anyhow!("oracle response is missing a guidance field"))
    }
}
