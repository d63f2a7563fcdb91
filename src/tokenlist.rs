//! Token list document model
//!
//! Typed view of a validated token list plus the helpers that read and write
//! the persisted JSON form. Lossless editing works on the raw
//! [`serde_json::Value`] (object key order is preserved), while consumers
//! that only read the list use the typed structs below.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{RegistryError, Result};
use crate::schema;

/// Root token list document
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TokenList {
    pub name: String,
    /// ISO-8601 date-time of the last modification
    pub timestamp: String,
    pub version: TokenListVersion,
    pub tokens: Vec<TokenInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_map: Option<BTreeMap<String, TokenInfo>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeMap<String, TagDefinition>>,
    #[serde(rename = "logoURI", default, skip_serializing_if = "Option::is_none")]
    pub logo_uri: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct TokenListVersion {
    /// Incremented when tokens are removed or token addresses change
    pub major: u64,
    /// Incremented when tokens are added
    pub minor: u64,
    /// Incremented for any other change
    pub patch: u64,
}

impl std::fmt::Display for TokenListVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// A single token entry
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TokenInfo {
    pub chain_id: u64,
    pub address: String,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    #[serde(rename = "logoURI", default, skip_serializing_if = "Option::is_none")]
    pub logo_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<BTreeMap<String, Value>>,
}

impl TokenInfo {
    /// Tag identifiers attached to this token (empty if none).
    pub fn tag_ids(&self) -> &[String] {
        self.tags.as_deref().unwrap_or(&[])
    }
}

/// Human-readable definition of a tag identifier
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct TagDefinition {
    pub name: String,
    pub description: String,
}

impl TokenList {
    /// Validate an untrusted JSON value and convert it into a typed document.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Schema`] with every violation found.
    pub fn from_value(value: &Value) -> Result<Self> {
        Ok(schema::validate(value)?)
    }

    /// Read, parse and validate a token list file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let value = load_document(path)?;
        Self::from_value(&value)
    }
}

/// Read a token list file as raw JSON, keeping object key order.
pub fn load_document<P: AsRef<Path>>(path: P) -> Result<Value> {
    let content = std::fs::read_to_string(path.as_ref())?;
    Ok(serde_json::from_str(&content)?)
}

/// Write a token list document as pretty-printed JSON with a trailing newline.
pub fn save_document<P: AsRef<Path>>(path: P, document: &Value) -> Result<()> {
    let mut json = serde_json::to_string_pretty(document)?;
    json.push('\n');
    std::fs::write(path.as_ref(), json).map_err(RegistryError::from)
}

/// Well-known chains, used to accept chain names wherever a chain ID is expected
const KNOWN_CHAINS: &[(&str, u64)] = &[
    ("ethereum", 1),
    ("optimism", 10),
    ("bsc", 56),
    ("gnosis", 100),
    ("polygon", 137),
    ("fantom", 250),
    ("zksync", 324),
    ("base", 8453),
    ("arbitrum", 42161),
    ("celo", 42220),
    ("avalanche", 43114),
    ("linea", 59144),
    ("sepolia", 11155111),
];

/// Get chain ID from chain name
pub fn chain_name_to_id(name: &str) -> Option<u64> {
    KNOWN_CHAINS
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, id)| *id)
}

/// Get chain name from chain ID
pub fn chain_id_to_name(id: u64) -> Option<&'static str> {
    KNOWN_CHAINS
        .iter()
        .find(|(_, chain_id)| *chain_id == id)
        .map(|(name, _)| *name)
}

/// Parse a chain parameter given either as a numeric ID or a known name
pub fn parse_chain_param(chain: &str) -> Option<u64> {
    if let Ok(id) = chain.parse::<u64>() {
        return Some(id);
    }
    chain_name_to_id(chain)
}

/// Format token information as a string
pub fn format_token_info(token: &TokenInfo, show_chain: bool) -> String {
    let mut info = format!(
        "• {} ({})\n  Address: {}\n  Decimals: {}\n",
        token.name, token.symbol, token.address, token.decimals
    );

    if show_chain {
        match chain_id_to_name(token.chain_id) {
            Some(chain_name) => info.push_str(&format!(
                "  Chain: {} (ID: {})\n",
                chain_name, token.chain_id
            )),
            None => info.push_str(&format!("  Chain ID: {}\n", token.chain_id)),
        }
    }

    if let Some(logo_uri) = &token.logo_uri {
        info.push_str(&format!("  Logo: {}\n", logo_uri));
    }

    if !token.tag_ids().is_empty() {
        info.push_str(&format!("  Tags: {}\n", token.tag_ids().join(", ")));
    }

    if let Some(extensions) = &token.extensions {
        for (key, value) in extensions {
            info.push_str(&format!("  {}: {}\n", key, value));
        }
    }

    info
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn usdc_json() -> Value {
        json!({
            "chainId": 1,
            "address": "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48",
            "name": "USD Coin",
            "symbol": "USDC",
            "decimals": 6,
            "logoURI": "https://example.com/usdc.png",
            "tags": ["stablecoin"],
            "extensions": { "exampleExtension": "some value" }
        })
    }

    /// Test that the camelCase and logoURI renames map onto the struct fields
    #[test]
    fn test_token_info_deserialization() {
        let token: TokenInfo = serde_json::from_value(usdc_json()).unwrap();
        assert_eq!(token.chain_id, 1);
        assert_eq!(token.symbol, "USDC");
        assert_eq!(token.decimals, 6);
        assert_eq!(token.logo_uri.as_deref(), Some("https://example.com/usdc.png"));
        assert_eq!(token.tag_ids(), ["stablecoin".to_string()]);
        assert_eq!(
            token.extensions.unwrap()["exampleExtension"],
            json!("some value")
        );
    }

    /// Test that unknown token fields are refused by the typed model too
    #[test]
    fn test_token_info_rejects_unknown_fields() {
        let mut value = usdc_json();
        value["coingeckoId"] = json!("usd-coin");
        assert!(serde_json::from_value::<TokenInfo>(value).is_err());
    }

    /// Test that optional fields are omitted when serializing
    #[test]
    fn test_optional_fields_skipped() {
        let token = TokenInfo {
            chain_id: 10,
            address: "0x4200000000000000000000000000000000000042".to_string(),
            name: "Optimism".to_string(),
            symbol: "OP".to_string(),
            decimals: 18,
            logo_uri: None,
            tags: None,
            extensions: None,
        };
        let value = serde_json::to_value(&token).unwrap();
        let obj = value.as_object().unwrap();
        assert!(!obj.contains_key("logoURI"));
        assert!(!obj.contains_key("tags"));
        assert!(!obj.contains_key("extensions"));
        assert_eq!(obj["chainId"], json!(10));
    }

    /// Test that chain names and numeric IDs are both accepted
    #[test]
    fn test_parse_chain_param() {
        assert_eq!(parse_chain_param("1"), Some(1));
        assert_eq!(parse_chain_param("Ethereum"), Some(1));
        assert_eq!(parse_chain_param("base"), Some(8453));
        assert_eq!(parse_chain_param("not-a-chain"), None);
        assert_eq!(chain_id_to_name(42161), Some("arbitrum"));
    }

    /// Test that documents are written and read back without reordering keys
    #[test]
    fn test_document_roundtrip_preserves_key_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokenlist.json");
        let document = json!({
            "name": "Example Token List",
            "timestamp": "2025-02-26T13:10:54.357Z",
            "version": { "major": 0, "minor": 0, "patch": 1 },
            "tags": { "stablecoin": { "name": "Stablecoin", "description": "Pegged" } },
            "tokens": [usdc_json()]
        });

        save_document(&path, &document).unwrap();
        let loaded = load_document(&path).unwrap();
        assert_eq!(loaded, document);

        let keys: Vec<&String> = loaded.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["name", "timestamp", "version", "tags", "tokens"]);
    }

    /// Test that formatting includes chain, tags and extensions
    #[test]
    fn test_format_token_info() {
        let token: TokenInfo = serde_json::from_value(usdc_json()).unwrap();
        let text = format_token_info(&token, true);
        assert!(text.contains("USD Coin (USDC)"));
        assert!(text.contains("Chain: ethereum (ID: 1)"));
        assert!(text.contains("Tags: stablecoin"));
        assert!(text.contains("exampleExtension"));
    }
}
