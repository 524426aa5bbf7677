//! JSON-RPC access to a rail cluster.
//!
//! One method is all we need: `getTransaction` at `finalized` commitment,
//! with `maxSupportedTransactionVersion = 0` so that v0 transactions using
//! address lookup tables come back instead of erroring out.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

use super::raw::RawTransaction;
use super::{Ledger, LedgerError};

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'static str,
    params: (&'a str, GetTransactionConfig),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GetTransactionConfig {
    encoding: &'static str,
    commitment: &'static str,
    max_supported_transaction_version: u8,
}

impl Default for GetTransactionConfig {
    fn default() -> Self {
        Self {
            encoding: "json",
            commitment: "finalized",
            max_supported_transaction_version: 0,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<RawTransaction>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// A [`Ledger`] backed by a cluster's JSON-RPC endpoint.
#[derive(Debug)]
pub struct RpcLedger {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
    next_id: AtomicU64,
}

impl RpcLedger {
    /// Build a client for `url`. Every request is bounded by `timeout`.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, LedgerError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("quill/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LedgerError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
            timeout,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn request<'a>(&self, reference: &'a str) -> RpcRequest<'a> {
        RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method: "getTransaction",
            params: (reference, GetTransactionConfig::default()),
        }
    }

    fn transport_error(&self, err: reqwest::Error) -> LedgerError {
        if err.is_timeout() {
            LedgerError::Timeout(self.timeout)
        } else {
            LedgerError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl Ledger for RpcLedger {
    async fn get_finalized_transaction(
        &self,
        reference: &str,
    ) -> Result<Option<RawTransaction>, LedgerError> {
        debug!(url = %self.url, reference = %reference, "getTransaction");

        let response = self
            .client
            .post(&self.url)
            .json(&self.request(reference))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            return Err(LedgerError::Transport(format!(
                "HTTP {} from {}",
                response.status(),
                self.url
            )));
        }

        let body: RpcResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                LedgerError::Timeout(self.timeout)
            } else {
                LedgerError::Malformed(e.to_string())
            }
        })?;

        if let Some(error) = body.error {
            return Err(LedgerError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        Ok(body.result)
    }
}
