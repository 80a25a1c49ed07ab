//! Aave v3 Pool health factor source over Ethereum JSON-RPC

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EthereumConfig;
use crate::error::{Error, Result};

use super::MetricSource;

/// `getUserAccountData(address)`
const GET_USER_ACCOUNT_DATA: &str = "bf92857c";

/// Health factor is the sixth word of the return tuple
const HEALTH_FACTOR_WORD: usize = 5;

const WORD_BYTES: usize = 32;

/// Health factor is returned with 18 decimals
const HEALTH_FACTOR_SCALE: f64 = 1e18;

/// Reads health factors from the Aave v3 Pool contract via `eth_call`
pub struct AavePoolSource {
    client: Client,
    node_url: String,
    pool_address: String,
}

impl AavePoolSource {
    /// Create a source for the configured node and pool
    pub fn new(config: &EthereumConfig) -> Result<Self> {
        let node_url = config
            .node_url
            .clone()
            .ok_or_else(|| Error::config("ethereum.node_url is not set"))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            node_url,
            pool_address: config.pool_address.clone(),
        })
    }
}

#[async_trait]
impl MetricSource for AavePoolSource {
    async fn health_factor(&self, address: &str) -> Result<f64> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method: "eth_call",
            params: (
                CallParams {
                    to: &self.pool_address,
                    data: encode_call(address)?,
                },
                "latest",
            ),
        };

        let response = self
            .client
            .post(&self.node_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::source_unavailable(format!("RPC request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::source_unavailable(format!(
                "RPC node returned {}",
                response.status()
            )));
        }

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|e| Error::source_unavailable(format!("Invalid RPC response: {e}")))?;

        if let Some(err) = body.error {
            return Err(Error::source_unavailable(format!(
                "RPC error {}: {}",
                err.code, err.message
            )));
        }

        let result = body
            .result
            .ok_or_else(|| Error::source_unavailable("RPC response has no result"))?;
        let health_factor = decode_health_factor(&result)?;

        debug!(address = %address, health_factor, "Fetched health factor");
        Ok(health_factor)
    }
}

/// ABI-encode `getUserAccountData(address)` call data
fn encode_call(address: &str) -> Result<String> {
    let raw = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .unwrap_or(address);
    let bytes = hex::decode(raw)
        .map_err(|e| Error::validation(format!("invalid address {address}: {e}")))?;
    if bytes.len() != 20 {
        return Err(Error::validation(format!(
            "address {address} is {} bytes, expected 20",
            bytes.len()
        )));
    }

    Ok(format!(
        "0x{GET_USER_ACCOUNT_DATA}{:0>64}",
        hex::encode(bytes)
    ))
}

/// Extract the health factor from `getUserAccountData` return data
fn decode_health_factor(result: &str) -> Result<f64> {
    let raw = result.strip_prefix("0x").unwrap_or(result);
    let bytes = hex::decode(raw)
        .map_err(|e| Error::source_unavailable(format!("RPC result is not hex: {e}")))?;

    let start = HEALTH_FACTOR_WORD * WORD_BYTES;
    let word = bytes.get(start..start + WORD_BYTES).ok_or_else(|| {
        Error::source_unavailable(format!(
            "RPC result has {} bytes, expected at least {}",
            bytes.len(),
            start + WORD_BYTES
        ))
    })?;

    Ok(word_to_f64(word) / HEALTH_FACTOR_SCALE)
}

/// Convert a big-endian uint256 word to the nearest f64
#[allow(clippy::cast_precision_loss)]
fn word_to_f64(word: &[u8]) -> f64 {
    let (high, low) = word.split_at(WORD_BYTES - 16);
    if high.iter().all(|byte| *byte == 0) {
        let mut low_bytes = [0u8; 16];
        low_bytes.copy_from_slice(low);
        return u128::from_be_bytes(low_bytes) as f64;
    }

    // no debt reports the maximum uint256
    word.iter()
        .fold(0.0_f64, |acc, byte| acc * 256.0 + f64::from(*byte))
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'static str,
    params: (CallParams<'a>, &'static str),
}

#[derive(Serialize)]
struct CallParams<'a> {
    to: &'a str,
    data: String,
}

#[derive(Deserialize)]
struct RpcResponse {
    result: Option<String>,
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}
