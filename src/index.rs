//! Lookup indexes derived from a token sequence
//!
//! A [`TokenIndex`] is built once from a validated token array and is
//! read-only afterwards. Both maps point into the same shared token slice,
//! so cloning an index never copies token data.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

use crate::address::checksum_address;
use crate::tokenlist::{TokenInfo, TokenList};

/// chainId → key → position in the token slice
type ChainKeyed = BTreeMap<u64, HashMap<String, usize>>;

/// Address and symbol indexes over one token list
#[derive(Debug, Clone)]
pub struct TokenIndex {
    tokens: Arc<[TokenInfo]>,
    by_address: ChainKeyed,
    by_symbol: ChainKeyed,
}

impl TokenIndex {
    /// Build both indexes in a single pass over `tokens`.
    ///
    /// Address keys are EIP-55 checksummed; symbol keys are used verbatim, so
    /// `USDC` and `usdc` are distinct. When two tokens collide on a key the
    /// later one wins.
    pub fn build(tokens: &[TokenInfo]) -> Self {
        let tokens: Arc<[TokenInfo]> = tokens.into();
        let mut by_address = ChainKeyed::new();
        let mut by_symbol = ChainKeyed::new();

        for (position, token) in tokens.iter().enumerate() {
            match checksum_address(&token.address) {
                Some(address) => {
                    by_address
                        .entry(token.chain_id)
                        .or_default()
                        .insert(address, position);
                }
                None => debug!(
                    "Skipping malformed address {} for {} in address index",
                    token.address, token.symbol
                ),
            }

            by_symbol
                .entry(token.chain_id)
                .or_default()
                .insert(token.symbol.clone(), position);
        }

        Self {
            tokens,
            by_address,
            by_symbol,
        }
    }

    /// Build the indexes for a validated document.
    pub fn from_list(list: &TokenList) -> Self {
        Self::build(&list.tokens)
    }

    /// All tokens in original document order.
    pub fn tokens(&self) -> &[TokenInfo] {
        &self.tokens
    }

    /// Chain IDs present in the list, ascending.
    pub fn chain_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.by_symbol.keys().copied()
    }

    pub fn has_chain(&self, chain_id: u64) -> bool {
        self.by_symbol.contains_key(&chain_id)
    }

    /// Exact lookup by an already checksummed address.
    pub fn get_by_checksummed(&self, chain_id: u64, address: &str) -> Option<&TokenInfo> {
        let position = self.by_address.get(&chain_id)?.get(address)?;
        self.tokens.get(*position)
    }

    /// Exact lookup by symbol as written in the list.
    pub fn get_by_symbol(&self, chain_id: u64, symbol: &str) -> Option<&TokenInfo> {
        let position = self.by_symbol.get(&chain_id)?.get(symbol)?;
        self.tokens.get(*position)
    }

    /// Number of distinct (chain, address) keys.
    pub fn address_count(&self) -> usize {
        self.by_address.values().map(HashMap::len).sum()
    }

    /// Number of distinct (chain, symbol) keys.
    pub fn symbol_count(&self) -> usize {
        self.by_symbol.values().map(HashMap::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(chain_id: u64, address: &str, symbol: &str) -> TokenInfo {
        TokenInfo {
            chain_id,
            address: address.to_string(),
            name: format!("{symbol} Token"),
            symbol: symbol.to_string(),
            decimals: 18,
            logo_uri: None,
            tags: None,
            extensions: None,
        }
    }

    const DAI: &str = "0x6B175474E89094C44Da98b954EedeAC495271d0F";
    const USDC: &str = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48";

    /// Test that addresses are keyed by their checksummed form
    #[test]
    fn test_address_keys_are_checksummed() {
        let index = TokenIndex::build(&[token(1, &DAI.to_lowercase(), "DAI")]);
        assert!(index.get_by_checksummed(1, DAI).is_some());
        assert!(index.get_by_checksummed(1, &DAI.to_lowercase()).is_none());
    }

    /// Test that the later token wins when keys collide
    #[test]
    fn test_last_write_wins() {
        let mut first = token(1, USDC, "USDC");
        first.name = "First".to_string();
        let mut second = token(1, &USDC.to_uppercase().replace("0X", "0x"), "USDC");
        second.name = "Second".to_string();

        let index = TokenIndex::build(&[first, second]);
        assert_eq!(index.get_by_checksummed(1, USDC).unwrap().name, "Second");
        assert_eq!(index.get_by_symbol(1, "USDC").unwrap().name, "Second");
        assert_eq!(index.address_count(), 1);
        assert_eq!(index.tokens().len(), 2);
    }

    /// Test that symbols differing only by case are distinct keys
    #[test]
    fn test_symbols_are_case_sensitive() {
        let index = TokenIndex::build(&[token(1, USDC, "USDC"), token(1, DAI, "usdc")]);
        assert_eq!(index.get_by_symbol(1, "USDC").unwrap().address, USDC);
        assert_eq!(index.get_by_symbol(1, "usdc").unwrap().address, DAI);
        assert!(index.get_by_symbol(1, "Usdc").is_none());
        assert_eq!(index.symbol_count(), 2);
    }

    /// Test that the same address on different chains is kept apart
    #[test]
    fn test_chains_are_separate() {
        let index = TokenIndex::build(&[token(1, USDC, "USDC"), token(10, USDC, "USDC.e")]);
        assert_eq!(index.get_by_checksummed(1, USDC).unwrap().symbol, "USDC");
        assert_eq!(index.get_by_checksummed(10, USDC).unwrap().symbol, "USDC.e");
        assert_eq!(index.chain_ids().collect::<Vec<_>>(), vec![1, 10]);
        assert!(index.has_chain(10));
        assert!(!index.has_chain(137));
    }

    /// Test that a malformed address is left out of the address index only
    #[test]
    fn test_malformed_address_only_in_symbol_index() {
        let index = TokenIndex::build(&[token(1, "0xnope", "BAD")]);
        assert_eq!(index.address_count(), 0);
        assert!(index.get_by_symbol(1, "BAD").is_some());
    }
}
