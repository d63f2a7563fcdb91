//! Semantic version bumps derived from token set changes
//!
//! Tokens are identified by (chainId, lowercase address). Removing a token
//! or changing its address is a major bump, adding one is minor, and any
//! other change to a listed token is a patch.

use serde::Serialize;
use std::collections::HashMap;

use crate::tokenlist::{TokenInfo, TokenList, TokenListVersion};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionUpgrade {
    None,
    Patch,
    Minor,
    Major,
}

impl VersionUpgrade {
    /// Bump `version`; a component already at `u64::MAX` stays there.
    pub fn apply(self, version: TokenListVersion) -> TokenListVersion {
        let TokenListVersion {
            major,
            minor,
            patch,
        } = version;
        match self {
            VersionUpgrade::None => version,
            VersionUpgrade::Patch => TokenListVersion {
                major,
                minor,
                patch: patch.saturating_add(1),
            },
            VersionUpgrade::Minor => TokenListVersion {
                major,
                minor: minor.saturating_add(1),
                patch: 0,
            },
            VersionUpgrade::Major => TokenListVersion {
                major: major.saturating_add(1),
                minor: 0,
                patch: 0,
            },
        }
    }
}

/// Field-level change to a token present in both lists
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenChange {
    pub chain_id: u64,
    pub address: String,
    pub fields: Vec<&'static str>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TokenListDiff<'a> {
    pub added: Vec<&'a TokenInfo>,
    pub removed: Vec<&'a TokenInfo>,
    pub changed: Vec<TokenChange>,
}

impl TokenListDiff<'_> {
    pub fn upgrade(&self) -> VersionUpgrade {
        if !self.removed.is_empty() {
            VersionUpgrade::Major
        } else if !self.added.is_empty() {
            VersionUpgrade::Minor
        } else if !self.changed.is_empty() {
            VersionUpgrade::Patch
        } else {
            VersionUpgrade::None
        }
    }
}

fn key(token: &TokenInfo) -> (u64, String) {
    (token.chain_id, token.address.to_ascii_lowercase())
}

fn changed_fields(base: &TokenInfo, update: &TokenInfo) -> Vec<&'static str> {
    let mut fields = Vec::new();
    if base.name != update.name {
        fields.push("name");
    }
    if base.symbol != update.symbol {
        fields.push("symbol");
    }
    if base.decimals != update.decimals {
        fields.push("decimals");
    }
    if base.logo_uri != update.logo_uri {
        fields.push("logoURI");
    }
    if base.tag_ids() != update.tag_ids() {
        fields.push("tags");
    }
    if base.extensions != update.extensions {
        fields.push("extensions");
    }
    fields
}

/// Compare two token sequences. Output follows the order of `update` for
/// additions and changes and the order of `base` for removals.
pub fn diff_tokens<'a>(base: &'a [TokenInfo], update: &'a [TokenInfo]) -> TokenListDiff<'a> {
    let base_by_key: HashMap<(u64, String), &TokenInfo> = base.iter().map(|t| (key(t), t)).collect();
    let update_by_key: HashMap<(u64, String), &TokenInfo> =
        update.iter().map(|t| (key(t), t)).collect();

    let mut diff = TokenListDiff::default();

    for token in update {
        match base_by_key.get(&key(token)) {
            None => diff.added.push(token),
            Some(previous) => {
                let fields = changed_fields(previous, token);
                if !fields.is_empty() {
                    diff.changed.push(TokenChange {
                        chain_id: token.chain_id,
                        address: token.address.clone(),
                        fields,
                    });
                }
            }
        }
    }

    diff.removed = base
        .iter()
        .filter(|t| !update_by_key.contains_key(&key(t)))
        .collect();

    diff
}

/// Smallest bump that describes the move from `base` to `update`.
pub fn min_version_bump(base: &[TokenInfo], update: &[TokenInfo]) -> VersionUpgrade {
    diff_tokens(base, update).upgrade()
}

/// Version `current` should carry, given the previously published list.
pub fn next_version(previous: &TokenList, current: &TokenList) -> TokenListVersion {
    min_version_bump(&previous.tokens, &current.tokens).apply(previous.version)
}
