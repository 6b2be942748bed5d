//! Online Scryfall client.
//!
//! Three endpoints: the bulk catalogue download that feeds the corpus, the
//! single-card `named?fuzzy` lookup, and prefix autocomplete. Every call
//! flows through the shared pacer and circuit breaker; transient transport
//! faults retry with exponential backoff inside a small budget.

use std::time::Duration;

use serde::Deserialize;

use crate::pacing::{CircuitBreaker, MinInterval};
use crate::CardDbError;

/// Retries after the initial attempt for transient transport faults.
const RETRY_BUDGET: u32 = 2;

/// Base delay of the exponential backoff.
const BACKOFF_BASE: Duration = Duration::from_millis(250);

/// Breaker cooldown after a run of failures.
const BREAKER_COOLDOWN: Duration = Duration::from_secs(30);

/// A single card as returned by the `named` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct NamedCard {
    /// Stable card identifier.
    pub oracle_id: String,
    /// Canonical name.
    pub name: String,
    /// Set code of the returned printing.
    #[serde(default)]
    pub set: Option<String>,
    /// Collector number of the returned printing.
    #[serde(default)]
    pub collector_number: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AutocompleteResponse {
    data: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct BulkIndexResponse {
    data: Vec<BulkIndexEntry>,
}

#[derive(Debug, Deserialize)]
struct BulkIndexEntry {
    #[serde(rename = "type")]
    kind: String,
    download_uri: String,
}

/// Paced, circuit-broken HTTP client for the card database.
pub struct ScryfallClient {
    base_url: String,
    timeout: Duration,
    pacer: MinInterval,
    breaker: CircuitBreaker,
    http: reqwest::Client,
}

impl ScryfallClient {
    /// Create a client.
    ///
    /// `rate_limit_ms` is the minimum inter-request interval; `timeout_s`
    /// the per-request timeout.
    #[must_use]
    pub fn new(base_url: String, rate_limit_ms: u64, timeout_s: u64) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(timeout_s),
            pacer: MinInterval::new(Duration::from_millis(rate_limit_ms)),
            breaker: CircuitBreaker::new(BREAKER_COOLDOWN),
            http: reqwest::Client::new(),
        }
    }

    /// Fuzzy single-card lookup. `Ok(None)` means the database found no
    /// unambiguous match (HTTP 404 covers both "not found" and
    /// "ambiguous").
    ///
    /// # Errors
    ///
    /// [`CardDbError::BreakerOpen`] while the breaker is open; transport
    /// and status errors otherwise.
    pub async fn named_fuzzy(&self, name: &str) -> Result<Option<NamedCard>, CardDbError> {
        let url = format!("{}/cards/named", self.base_url);
        let response = self
            .request(|http| http.get(&url).query(&[("fuzzy", name)]))
            .await?;
        match response {
            Response::NotFound => Ok(None),
            Response::Ok(body) => {
                let card: NamedCard =
                    serde_json::from_slice(&body).map_err(|e| CardDbError::Malformed(e.to_string()))?;
                Ok(Some(card))
            }
        }
    }

    /// Prefix autocomplete, at most 20 names, catalogue order.
    ///
    /// # Errors
    ///
    /// Same surface as [`ScryfallClient::named_fuzzy`].
    pub async fn autocomplete(&self, prefix: &str) -> Result<Vec<String>, CardDbError> {
        let url = format!("{}/cards/autocomplete", self.base_url);
        let response = self
            .request(|http| http.get(&url).query(&[("q", prefix)]))
            .await?;
        match response {
            Response::NotFound => Ok(Vec::new()),
            Response::Ok(body) => {
                let parsed: AutocompleteResponse =
                    serde_json::from_slice(&body).map_err(|e| CardDbError::Malformed(e.to_string()))?;
                Ok(parsed.data)
            }
        }
    }

    /// Download the full oracle-cards bulk dump. Large (tens of MB); used
    /// only by corpus rebuilds.
    ///
    /// # Errors
    ///
    /// Transport, status, or malformed-index errors.
    pub async fn bulk_oracle_cards(&self) -> Result<Vec<u8>, CardDbError> {
        let url = format!("{}/bulk-data", self.base_url);
        let index = match self.request(|http| http.get(&url)).await? {
            Response::NotFound => return Err(CardDbError::Status(404)),
            Response::Ok(body) => serde_json::from_slice::<BulkIndexResponse>(&body)
                .map_err(|e| CardDbError::Malformed(e.to_string()))?,
        };
        let oracle = index
            .data
            .into_iter()
            .find(|e| e.kind == "oracle_cards")
            .ok_or_else(|| CardDbError::Malformed("no oracle_cards bulk entry".to_string()))?;

        log::info!("downloading bulk catalogue from {}", oracle.download_uri);
        // Bulk downloads live on a CDN host, so they bypass the API pacer
        // but still honour the breaker.
        let response = self
            .http
            .get(&oracle.download_uri)
            .timeout(Duration::from_secs(300))
            .send()
            .await
            .map_err(|e| CardDbError::Http(e.to_string()))?;
        if !response.status().is_success() {
            return Err(CardDbError::Status(response.status().as_u16()));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| CardDbError::Http(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    /// Issue one API request through pacing, breaker, and retry budget.
    async fn request<F>(&self, build: F) -> Result<Response, CardDbError>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        if !self.breaker.allow() {
            return Err(CardDbError::BreakerOpen);
        }

        let mut last_err: Option<CardDbError> = None;
        for attempt in 0..=RETRY_BUDGET {
            if attempt > 0 {
                tokio::time::sleep(BACKOFF_BASE * 2u32.pow(attempt - 1)).await;
            }
            let wait = self.pacer.reserve();
            if !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }

            let result = build(&self.http).timeout(self.timeout).send().await;
            match result {
                Ok(response) if response.status() == reqwest::StatusCode::NOT_FOUND => {
                    self.breaker.record_success();
                    return Ok(Response::NotFound);
                }
                Ok(response) if response.status().is_success() => {
                    match response.bytes().await {
                        Ok(body) => {
                            self.breaker.record_success();
                            return Ok(Response::Ok(body.to_vec()));
                        }
                        Err(e) => last_err = Some(CardDbError::Http(e.to_string())),
                    }
                }
                Ok(response) if response.status().is_server_error() => {
                    last_err = Some(CardDbError::Status(response.status().as_u16()));
                }
                Ok(response) => {
                    // Client errors other than 404 will not improve on retry.
                    self.breaker.record_failure();
                    return Err(CardDbError::Status(response.status().as_u16()));
                }
                Err(e) => last_err = Some(CardDbError::Http(e.to_string())),
            }
        }

        self.breaker.record_failure();
        Err(last_err.unwrap_or_else(|| CardDbError::Http("request never attempted".to_string())))
    }
}

enum Response {
    Ok(Vec<u8>),
    NotFound,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_card_deserialises_scryfall_shape() {
        let body = r#"{
            "oracle_id": "5f6927e1-c580-4a50-b0a6-7d0c83c0a92b",
            "name": "Opt",
            "set": "dom",
            "collector_number": "60",
            "mana_cost": "{U}"
        }"#;
        let card: NamedCard = serde_json::from_str(body).unwrap();
        assert_eq!(card.name, "Opt");
        assert_eq!(card.set.as_deref(), Some("dom"));
    }

    #[test]
    fn autocomplete_response_shape() {
        let body = r#"{"object":"catalog","data":["Opt","Optimus"]}"#;
        let parsed: AutocompleteResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.data.len(), 2);
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = ScryfallClient::new("https://api.scryfall.com/".to_string(), 120, 5);
        assert_eq!(client.base_url, "https://api.scryfall.com");
    }

    #[test]
    fn bulk_index_picks_oracle_cards() {
        let body = r#"{"data":[
            {"type":"rulings","download_uri":"https://x/rulings.json"},
            {"type":"oracle_cards","download_uri":"https://x/oracle.json"}
        ]}"#;
        let parsed: BulkIndexResponse = serde_json::from_str(body).unwrap();
        let oracle = parsed.data.into_iter().find(|e| e.kind == "oracle_cards");
        assert_eq!(oracle.unwrap().download_uri, "https://x/oracle.json");
    }
}
