//! Remote ledger source contract and its HTTP implementation.
//!
//! The engine only depends on the `RemoteLedgerSource` trait; the JSON client
//! below talks to an explorer-style REST endpoint. All methods are async and
//! designed for use with Tokio.

use super::types::*;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Contract the sync engine and caches consume. Balance math is local, so the
/// remote only serves heights, transaction pages, market data and broadcast.
#[async_trait]
pub trait RemoteLedgerSource: Send + Sync {
    /// Current chain height.
    async fn height(&self) -> Result<u64, RemoteError>;

    /// Transactions touching any of the addresses, confirmed at or above
    /// `min_height`, ordered by height.
    async fn list_transactions(
        &self,
        addresses: &[String],
        min_height: u64,
    ) -> Result<Vec<TransactionRecord>, RemoteError>;

    /// Market quotes per symbol.
    async fn price_tickers(&self) -> Result<HashMap<String, TickerQuotes>, RemoteError>;

    /// Addresses whitelisted by the cross-chain bridge.
    async fn bridge_whitelist(&self) -> Result<Vec<String>, RemoteError>;

    /// Average block production time in seconds, sampled over recent history
    /// at the given downscale granularity.
    async fn block_time(&self, downscale: u32) -> Result<f64, RemoteError>;

    /// Broadcast a raw transaction, returning its hash.
    async fn broadcast(&self, raw_tx: &str) -> Result<BroadcastResponse, RemoteError>;
}

/// JSON-over-HTTP implementation of `RemoteLedgerSource`.
#[derive(Clone)]
pub struct HttpLedgerSource {
    http_client: Client,
    base_url: String,
}

impl HttpLedgerSource {
    /// Create a new client for the given API base URL.
    pub fn new(base_url: String) -> Self {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http_client,
            base_url,
        }
    }

    async fn get(&self, path: &str) -> Result<Value, RemoteError> {
        let url = format!("{}/{}", self.base_url, path);
        debug!("GET {}", url);
        let response = self.http_client.get(&url).send().await?;
        let body: Value = response.json().await?;
        Self::unwrap_result(body)
    }

    async fn post(&self, path: &str, payload: Value) -> Result<Value, RemoteError> {
        let url = format!("{}/{}", self.base_url, path);
        debug!("POST {}", url);
        let response = self.http_client.post(&url).json(&payload).send().await?;
        let body: Value = response.json().await?;
        Self::unwrap_result(body)
    }

    /// Responses wrap their payload in a `result` field and report failures
    /// through an `error` field.
    fn unwrap_result(body: Value) -> Result<Value, RemoteError> {
        if let Some(error) = body.get("error").and_then(|e| e.as_str()) {
            return Err(RemoteError::Api(error.to_string()));
        }
        body.get("result").cloned().ok_or(RemoteError::NoData)
    }
}

#[async_trait]
impl RemoteLedgerSource for HttpLedgerSource {
    async fn height(&self) -> Result<u64, RemoteError> {
        let result = self.get("height").await?;
        result.as_u64().ok_or(RemoteError::NoData)
    }

    async fn list_transactions(
        &self,
        addresses: &[String],
        min_height: u64,
    ) -> Result<Vec<TransactionRecord>, RemoteError> {
        let payload = json!({
            "addresses": addresses,
            "min_height": min_height,
        });
        let result = self.post("txs", payload).await?;
        Ok(serde_json::from_value(result)?)
    }

    async fn price_tickers(&self) -> Result<HashMap<String, TickerQuotes>, RemoteError> {
        let result = self.get("pricing/tickers").await?;
        Ok(serde_json::from_value(result)?)
    }

    async fn bridge_whitelist(&self) -> Result<Vec<String>, RemoteError> {
        let result = self.get("bridge/whitelist").await?;
        Ok(serde_json::from_value(result)?)
    }

    async fn block_time(&self, downscale: u32) -> Result<f64, RemoteError> {
        let result = self.get(&format!("blocktime/{}", downscale)).await?;
        result.as_f64().ok_or(RemoteError::NoData)
    }

    async fn broadcast(&self, raw_tx: &str) -> Result<BroadcastResponse, RemoteError> {
        let payload = json!({ "tx": raw_tx });
        let result = self.post("tx", payload).await?;
        Ok(serde_json::from_value(result)?)
    }
}
