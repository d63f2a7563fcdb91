//! JSON-RPC access to ERC-20 metadata
//!
//! The reconciliation engine only sees the [`ClientFactory`] and
//! [`ContractReader`] traits. [`StaticClientFactory`] is the production
//! implementation: one [`JsonRpcClient`] per chain, built from a table of
//! public endpoints that configuration can extend or override.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::{RegistryError, Result};

/// `name()`
pub const NAME_SELECTOR: &str = "0x06fdde03";
/// `symbol()`
pub const SYMBOL_SELECTOR: &str = "0x95d89b41";
/// `decimals()`
pub const DECIMALS_SELECTOR: &str = "0x313ce567";

/// Public endpoints used when configuration does not name one
const DEFAULT_RPC_URLS: &[(u64, &str)] = &[
    (1, "https://ethereum-rpc.publicnode.com"),
    (10, "https://mainnet.optimism.io"),
    (56, "https://bsc-dataseed.bnbchain.org"),
    (100, "https://rpc.gnosischain.com"),
    (137, "https://polygon-rpc.com"),
    (250, "https://rpc.ftm.tools"),
    (324, "https://mainnet.era.zksync.io"),
    (8453, "https://mainnet.base.org"),
    (42161, "https://arb1.arbitrum.io/rpc"),
    (42220, "https://forno.celo.org"),
    (43114, "https://api.avax.network/ext/bc/C/rpc"),
    (59144, "https://rpc.linea.build"),
    (11155111, "https://ethereum-sepolia-rpc.publicnode.com"),
];

/// Read-only view of ERC-20 contracts on one chain
#[async_trait]
pub trait ContractReader: Send + Sync {
    async fn name(&self, address: &str) -> Result<String>;
    async fn symbol(&self, address: &str) -> Result<String>;
    async fn decimals(&self, address: &str) -> Result<u8>;
}

/// Hands out a [`ContractReader`] per chain
pub trait ClientFactory: Send + Sync {
    /// `None` if the chain has no known endpoint.
    fn client(&self, chain_id: u64) -> Option<Arc<dyn ContractReader>>;
}

/// Minimal `eth_call` client over HTTP
#[derive(Debug)]
pub struct JsonRpcClient {
    http: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Execute `eth_call` against the latest block and return the raw output.
    pub async fn eth_call(&self, to: &str, data: &str) -> Result<Vec<u8>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "eth_call",
            "params": [{ "to": to, "data": data }, "latest"],
        });

        debug!("eth_call {} {} via {}", to, data, self.url);

        let response: Value = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(error) = response.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(RegistryError::Rpc(message));
        }

        let result = response
            .get("result")
            .and_then(Value::as_str)
            .ok_or_else(|| RegistryError::Rpc("response carries no result".to_string()))?;

        let hex_data = result.strip_prefix("0x").unwrap_or(result);
        hex::decode(hex_data).map_err(|e| RegistryError::Decode {
            what: "eth_call result",
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl ContractReader for JsonRpcClient {
    async fn name(&self, address: &str) -> Result<String> {
        decode_string(&self.eth_call(address, NAME_SELECTOR).await?)
    }

    async fn symbol(&self, address: &str) -> Result<String> {
        decode_string(&self.eth_call(address, SYMBOL_SELECTOR).await?)
    }

    async fn decimals(&self, address: &str) -> Result<u8> {
        decode_uint8(&self.eth_call(address, DECIMALS_SELECTOR).await?)
    }
}

/// Decode an ABI-encoded `string` return value.
///
/// Legacy tokens (MKR, SAI) return `bytes32` instead; a 32-byte payload is
/// read as a NUL-padded string.
pub fn decode_string(data: &[u8]) -> Result<String> {
    let fail = |reason: &str| RegistryError::Decode {
        what: "string",
        reason: reason.to_string(),
    };

    if data.is_empty() {
        return Err(fail("empty return data (no contract at address?)"));
    }

    if data.len() == 32 {
        let end = data.iter().position(|b| *b == 0).unwrap_or(data.len());
        return String::from_utf8(data[..end].to_vec()).map_err(|_| fail("bytes32 is not UTF-8"));
    }

    let offset = word_to_usize(data, 0).ok_or_else(|| fail("bad offset"))?;
    let len = word_to_usize(data, offset).ok_or_else(|| fail("bad length"))?;
    let start = offset.checked_add(32).ok_or_else(|| fail("bad offset"))?;
    let end = start.checked_add(len).ok_or_else(|| fail("bad length"))?;
    let bytes = data.get(start..end).ok_or_else(|| fail("payload truncated"))?;

    String::from_utf8(bytes.to_vec()).map_err(|_| fail("payload is not UTF-8"))
}

/// Decode an ABI-encoded `uint8` return value.
pub fn decode_uint8(data: &[u8]) -> Result<u8> {
    let word = data.get(..32).ok_or_else(|| RegistryError::Decode {
        what: "uint8",
        reason: format!("expected 32 bytes, got {}", data.len()),
    })?;

    if word[..31].iter().any(|b| *b != 0) {
        return Err(RegistryError::Decode {
            what: "uint8",
            reason: "value out of range".to_string(),
        });
    }
    Ok(word[31])
}

/// Read the 32-byte big-endian word at `at` as a `usize`.
fn word_to_usize(data: &[u8], at: usize) -> Option<usize> {
    let word = data.get(at..at.checked_add(32)?)?;
    if word[..24].iter().any(|b| *b != 0) {
        return None;
    }
    let mut tail = [0u8; 8];
    tail.copy_from_slice(&word[24..]);
    usize::try_from(u64::from_be_bytes(tail)).ok()
}

/// Built-in endpoint table as a map.
pub fn default_rpc_urls() -> BTreeMap<u64, String> {
    DEFAULT_RPC_URLS
        .iter()
        .map(|(chain_id, url)| (*chain_id, url.to_string()))
        .collect()
}

/// Factory over a fixed chain → endpoint table
#[derive(Debug, Clone)]
pub struct StaticClientFactory {
    clients: HashMap<u64, Arc<JsonRpcClient>>,
}

impl StaticClientFactory {
    /// Use exactly the given endpoints.
    pub fn with_urls(urls: &BTreeMap<u64, String>, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;

        let clients = urls
            .iter()
            .map(|(chain_id, url)| (*chain_id, Arc::new(JsonRpcClient::new(http.clone(), url))))
            .collect();

        Ok(Self { clients })
    }

    /// Built-in endpoints with `overrides` merged on top.
    pub fn new(overrides: &BTreeMap<u64, String>, timeout: Option<Duration>) -> Result<Self> {
        let mut urls = default_rpc_urls();
        urls.extend(overrides.iter().map(|(k, v)| (*k, v.clone())));
        Self::with_urls(&urls, timeout)
    }

    /// Chains with a configured endpoint, ascending.
    pub fn supported_chains(&self) -> Vec<u64> {
        let mut chains: Vec<u64> = self.clients.keys().copied().collect();
        chains.sort_unstable();
        chains
    }
}

impl ClientFactory for StaticClientFactory {
    fn client(&self, chain_id: u64) -> Option<Arc<dyn ContractReader>> {
        self.clients
            .get(&chain_id)
            .map(|client| client.clone() as Arc<dyn ContractReader>)
    }
}

/// Fetch name, symbol and decimals for a contract in one go.
pub async fn fetch_token_metadata(
    factory: &dyn ClientFactory,
    chain_id: u64,
    address: &str,
) -> Result<(String, String, u8)> {
    let reader = factory
        .client(chain_id)
        .ok_or(RegistryError::UnsupportedChain(chain_id))?;

    let (name, symbol, decimals) = tokio::join!(
        reader.name(address),
        reader.symbol(address),
        reader.decimals(address)
    );
    Ok((name?, symbol?, decimals?))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// ABI encoding of the `string` "USDC"
    fn encoded_usdc() -> Vec<u8> {
        let mut data = vec![0u8; 96];
        data[31] = 0x20;
        data[63] = 4;
        data[64..68].copy_from_slice(b"USDC");
        data
    }

    /// Test decoding a dynamic ABI string
    #[test]
    fn test_decode_string_dynamic() {
        assert_eq!(decode_string(&encoded_usdc()).unwrap(), "USDC");
    }

    /// Test the bytes32 fallback used by legacy tokens
    #[test]
    fn test_decode_string_bytes32() {
        let mut data = vec![0u8; 32];
        data[..3].copy_from_slice(b"MKR");
        assert_eq!(decode_string(&data).unwrap(), "MKR");
    }

    /// Test that broken string payloads produce decode errors
    #[test]
    fn test_decode_string_errors() {
        assert!(matches!(
            decode_string(&[]),
            Err(RegistryError::Decode { what: "string", .. })
        ));

        let mut truncated = encoded_usdc();
        truncated[63] = 200;
        assert!(decode_string(&truncated).is_err());

        let mut huge_offset = encoded_usdc();
        huge_offset[0] = 0xff;
        assert!(decode_string(&huge_offset).is_err());
    }

    /// Test uint8 decoding and its range check
    #[test]
    fn test_decode_uint8() {
        let mut data = vec![0u8; 32];
        data[31] = 18;
        assert_eq!(decode_uint8(&data).unwrap(), 18);

        data[30] = 1;
        assert!(decode_uint8(&data).is_err());
        assert!(decode_uint8(&[0u8; 4]).is_err());
    }

    /// Test that overrides replace built-in endpoints and add new chains
    #[test]
    fn test_static_factory_overrides() {
        let overrides = BTreeMap::from([
            (1, "http://localhost:8545".to_string()),
            (31337, "http://localhost:8546".to_string()),
        ]);
        let factory = StaticClientFactory::new(&overrides, None).unwrap();

        let url = |chain_id: u64| factory.clients.get(&chain_id).map(|c| c.url.as_str());
        assert_eq!(url(1), Some("http://localhost:8545"));
        assert_eq!(url(31337), Some("http://localhost:8546"));
        assert_eq!(url(10), Some("https://mainnet.optimism.io"));
        assert!(factory.client(31337).is_some());
        assert!(factory.client(999_999).is_none());
        assert!(factory.supported_chains().windows(2).all(|w| w[0] < w[1]));
    }

    /// Test that an unknown chain is reported when fetching metadata
    #[tokio::test]
    async fn test_fetch_metadata_unsupported_chain() {
        let factory = StaticClientFactory::with_urls(&BTreeMap::new(), None).unwrap();
        let err = fetch_token_metadata(&factory, 1, "0x0000000000000000000000000000000000000001")
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::UnsupportedChain(1)));
    }
}
