//! Read-only queries over a [`TokenIndex`]
//!
//! Every function here is total: malformed input yields `None`, `false` or an
//! empty vector, never a panic. The `*_value` variants accept raw JSON so
//! untyped callers (MCP tool arguments, scripts) get the same guarantees.

use serde_json::Value;

use crate::address::{checksum_address, is_address};
use crate::index::TokenIndex;
use crate::tokenlist::TokenInfo;

/// Maximum number of results returned by [`search_tokens`]
pub const SEARCH_LIMIT: usize = 50;

/// Compare two addresses case-insensitively.
///
/// Both must be `0x`-prefixed 40-digit hex strings; the checksum is not
/// verified.
pub fn addresses_eq(a: &str, b: &str) -> bool {
    is_address(a) && is_address(b) && a.eq_ignore_ascii_case(b)
}

/// [`addresses_eq`] over arbitrary JSON values; non-strings are never equal.
pub fn addresses_equal(a: &Value, b: &Value) -> bool {
    match (a.as_str(), b.as_str()) {
        (Some(a), Some(b)) => addresses_eq(a, b),
        _ => false,
    }
}

/// Cheap structural check for the token shape.
///
/// Requires numeric `chainId` and `decimals`, string `name` and `symbol`, and
/// a loosely valid `address`. Ranges are not checked; use the schema
/// validator for that.
pub fn is_token(value: &Value) -> bool {
    let Some(obj) = value.as_object() else {
        return false;
    };

    obj.get("chainId").is_some_and(Value::is_number)
        && obj
            .get("address")
            .and_then(Value::as_str)
            .is_some_and(is_address)
        && obj.get("name").is_some_and(Value::is_string)
        && obj.get("symbol").is_some_and(Value::is_string)
        && obj.get("decimals").is_some_and(Value::is_number)
}

/// Two values are the same token if both are token-shaped and share chain and address.
pub fn tokens_equal(a: &Value, b: &Value) -> bool {
    if !is_token(a) || !is_token(b) {
        return false;
    }
    a["chainId"].as_f64() == b["chainId"].as_f64() && addresses_equal(&a["address"], &b["address"])
}

/// Token-shaped and present in the index under its (chainId, symbol).
pub fn is_listed_token(index: &TokenIndex, value: &Value) -> bool {
    if !is_token(value) {
        return false;
    }
    match (chain_id_from_value(&value["chainId"]), value["symbol"].as_str()) {
        (Some(chain_id), Some(symbol)) => index.get_by_symbol(chain_id, symbol).is_some(),
        _ => false,
    }
}

/// Interpret a JSON value as a chain ID; only non-negative integers qualify.
pub fn chain_id_from_value(value: &Value) -> Option<u64> {
    value.as_u64()
}

/// Look up a token by chain and address in any casing.
pub fn lookup_by_address<'a>(
    index: &'a TokenIndex,
    chain_id: u64,
    address: &str,
) -> Option<&'a TokenInfo> {
    if !index.has_chain(chain_id) {
        return None;
    }
    let checksummed = checksum_address(address)?;
    index.get_by_checksummed(chain_id, &checksummed)
}

/// Fix the chain and return a lookup over addresses.
pub fn address_lookup<'a>(
    index: &'a TokenIndex,
    chain_id: u64,
) -> impl Fn(&str) -> Option<&'a TokenInfo> + 'a {
    move |address| lookup_by_address(index, chain_id, address)
}

pub fn lookup_by_address_value<'a>(
    index: &'a TokenIndex,
    chain_id: &Value,
    address: &Value,
) -> Option<&'a TokenInfo> {
    lookup_by_address(index, chain_id_from_value(chain_id)?, address.as_str()?)
}

/// Every listed token with this address, across all chains.
pub fn lookup_by_address_all_chains<'a>(index: &'a TokenIndex, address: &str) -> Vec<&'a TokenInfo> {
    let Some(checksummed) = checksum_address(address) else {
        return Vec::new();
    };
    index
        .chain_ids()
        .filter_map(|chain_id| index.get_by_checksummed(chain_id, &checksummed))
        .collect()
}

/// Look up a token by chain and exact symbol.
pub fn lookup_by_symbol<'a>(
    index: &'a TokenIndex,
    chain_id: u64,
    symbol: &str,
) -> Option<&'a TokenInfo> {
    index.get_by_symbol(chain_id, symbol)
}

/// Fix the chain and return a lookup over symbols.
pub fn symbol_lookup<'a>(
    index: &'a TokenIndex,
    chain_id: u64,
) -> impl Fn(&str) -> Option<&'a TokenInfo> + 'a {
    move |symbol| lookup_by_symbol(index, chain_id, symbol)
}

pub fn lookup_by_symbol_value<'a>(
    index: &'a TokenIndex,
    chain_id: &Value,
    symbol: &Value,
) -> Option<&'a TokenInfo> {
    lookup_by_symbol(index, chain_id_from_value(chain_id)?, symbol.as_str()?)
}

/// Tokens on `chain_id` in document order, optionally restricted to those
/// carrying at least one of `tags`.
pub fn list_by_chain<'a>(index: &'a TokenIndex, chain_id: u64, tags: &[&str]) -> Vec<&'a TokenInfo> {
    if !index.has_chain(chain_id) {
        return Vec::new();
    }

    index
        .tokens()
        .iter()
        .filter(|t| t.chain_id == chain_id)
        .filter(|t| tags.is_empty() || t.tag_ids().iter().any(|tag| tags.contains(&tag.as_str())))
        .collect()
}

pub fn list_by_chain_value<'a>(index: &'a TokenIndex, chain_id: &Value, tags: &[&str]) -> Vec<&'a TokenInfo> {
    match chain_id_from_value(chain_id) {
        Some(chain_id) => list_by_chain(index, chain_id, tags),
        None => Vec::new(),
    }
}

/// Search tokens by name or symbol.
///
/// Exact (case-insensitive) matches are returned if there are any, otherwise
/// substring matches. At most [`SEARCH_LIMIT`] results.
pub fn search_tokens<'a>(
    index: &'a TokenIndex,
    query: &str,
    chain_id: Option<u64>,
) -> Vec<&'a TokenInfo> {
    let query_lower = query.to_lowercase();
    let on_chain = |t: &&TokenInfo| chain_id.map_or(true, |id| t.chain_id == id);

    let exact: Vec<&TokenInfo> = index
        .tokens()
        .iter()
        .filter(on_chain)
        .filter(|t| t.symbol.to_lowercase() == query_lower || t.name.to_lowercase() == query_lower)
        .take(SEARCH_LIMIT)
        .collect();

    if !exact.is_empty() {
        return exact;
    }

    index
        .tokens()
        .iter()
        .filter(on_chain)
        .filter(|t| {
            t.symbol.to_lowercase().contains(&query_lower)
                || t.name.to_lowercase().contains(&query_lower)
        })
        .take(SEARCH_LIMIT)
        .collect()
}
