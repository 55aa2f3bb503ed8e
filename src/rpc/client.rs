//! JSON-RPC over HTTP client for Bitcoin and DeFi nodes.
//!
//! Both nodes speak the Bitcoin Core dialect of JSON-RPC 1.0 with HTTP basic
//! auth. Wallet-scoped Bitcoin calls go to `/wallet/<name>`.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use super::{BitcoinRpc, DefiRpc};
use crate::config::RpcSettings;
use crate::error::{AnchorError, Chain, Result};
use crate::types::{
    AnchorTemplate, FeeEstimate, FundOptions, FundedTx, RawMempoolEntry, RawTransaction, SignedTx,
};

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// One connection to one node.
pub struct JsonRpcClient {
    http: Client,
    url: String,
    user: String,
    password: SecretString,
    chain: Chain,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    /// Build a client for `settings`. `wallet` selects a wallet endpoint on
    /// multi-wallet Bitcoin nodes.
    pub fn new(chain: Chain, settings: &RpcSettings, wallet: Option<&str>) -> Result<Self> {
        let http = Client::builder()
            .timeout(settings.timeout)
            .user_agent(concat!("dfi-anchor/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AnchorError::Connectivity {
                chain,
                message: format!("failed to build HTTP client: {e}"),
            })?;

        let mut url = settings.url();
        if let Some(name) = wallet {
            url.push_str(&format!("wallet/{name}"));
        }

        Ok(Self {
            http,
            url,
            user: settings.user.clone(),
            password: settings.password.clone(),
            chain,
            next_id: AtomicU64::new(1),
        })
    }

    #[cfg(test)]
    fn url(&self) -> &str {
        &self.url
    }

    /// Perform one call and decode its `result`.
    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "1.0",
            "id": id,
            "method": method,
            "params": params,
        });

        debug!(chain = %self.chain, method, id, "RPC call");

        let resp = self
            .http
            .post(&self.url)
            .basic_auth(&self.user, Some(self.password.expose_secret()))
            .json(&body)
            .send()
            .await
            .map_err(|e| AnchorError::Connectivity {
                chain: self.chain,
                message: e.to_string(),
            })?;

        // Bitcoin Core answers RPC errors with HTTP 500 and a JSON body, so
        // the body is inspected before the status.
        let status = resp.status();
        let text = resp.text().await.map_err(|e| AnchorError::Connectivity {
            chain: self.chain,
            message: e.to_string(),
        })?;

        let parsed: RpcResponse = match serde_json::from_str(&text) {
            Ok(parsed) => parsed,
            Err(_) if !status.is_success() => {
                return Err(self.rpc_error(method, format!("HTTP {status}")));
            }
            Err(e) => {
                return Err(AnchorError::Protocol(format!("{method}: malformed response: {e}")));
            }
        };

        if let Some(err) = parsed.error {
            return Err(self.rpc_error(method, format!("{} (code {})", err.message, err.code)));
        }

        let result = parsed.result.unwrap_or(Value::Null);
        serde_json::from_value(result)
            .map_err(|e| AnchorError::Protocol(format!("{method}: unexpected result: {e}")))
    }

    fn rpc_error(&self, method: &str, message: String) -> AnchorError {
        AnchorError::Rpc {
            chain: self.chain,
            method: method.to_string(),
            message,
        }
    }
}

#[async_trait]
impl BitcoinRpc for JsonRpcClient {
    async fn best_block_hash(&self) -> Result<String> {
        self.call("getbestblockhash", json!([])).await
    }

    async fn estimate_smart_fee(
        &self,
        conf_target: u16,
        estimate_mode: &str,
    ) -> Result<FeeEstimate> {
        self.call("estimatesmartfee", json!([conf_target, estimate_mode]))
            .await
    }

    async fn raw_mempool(&self) -> Result<BTreeMap<String, RawMempoolEntry>> {
        self.call("getrawmempool", json!([true])).await
    }

    async fn raw_transaction(&self, txid: &str) -> Result<RawTransaction> {
        self.call("getrawtransaction", json!([txid, true])).await
    }

    async fn decode_raw_transaction(&self, hex: &str) -> Result<RawTransaction> {
        self.call("decoderawtransaction", json!([hex])).await
    }

    async fn fund_raw_transaction(&self, hex: &str, options: FundOptions) -> Result<FundedTx> {
        self.call("fundrawtransaction", json!([hex, options])).await
    }

    async fn sign_raw_transaction_with_wallet(&self, hex: &str) -> Result<SignedTx> {
        self.call("signrawtransactionwithwallet", json!([hex]))
            .await
    }

    async fn send_raw_transaction(&self, hex: &str) -> Result<String> {
        self.call("sendrawtransaction", json!([hex])).await
    }
}

#[async_trait]
impl DefiRpc for JsonRpcClient {
    async fn best_block_hash(&self) -> Result<String> {
        self.call("getbestblockhash", json!([])).await
    }

    async fn create_anchor_template(&self, reward_address: &str) -> Result<AnchorTemplate> {
        self.call("spv_createanchortemplate", json!([reward_address]))
            .await
    }
}
