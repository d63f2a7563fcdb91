//! Structured edits of a persisted token list
//!
//! The editor loads the document as raw JSON, mutates it in memory and
//! writes it back. Object key order and every untouched field survive the
//! round trip. Each mutation refreshes `timestamp`, and [`DocumentEditor::save`]
//! refuses to write a document that fails schema validation.

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::address::{checksum_address, is_address};
use crate::error::{RegistryError, Result};
use crate::schema;
use crate::tokenlist::{load_document, save_document, TokenList, TokenListVersion};
use crate::toolkit::addresses_eq;

/// Token fields supplied by the caller of [`DocumentEditor::add_token`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewToken {
    pub chain_id: u64,
    pub address: String,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub logo_uri: Option<String>,
    pub tags: Vec<String>,
}

impl NewToken {
    /// JSON form in canonical field order. The address is checksummed when
    /// it is well formed.
    fn to_value(&self) -> Value {
        let mut token = Map::new();
        token.insert("chainId".to_string(), Value::from(self.chain_id));
        let address = checksum_address(&self.address).unwrap_or_else(|| self.address.clone());
        token.insert("address".to_string(), Value::from(address));
        token.insert("name".to_string(), Value::from(self.name.clone()));
        token.insert("symbol".to_string(), Value::from(self.symbol.clone()));
        token.insert("decimals".to_string(), Value::from(self.decimals));
        if let Some(logo_uri) = &self.logo_uri {
            token.insert("logoURI".to_string(), Value::from(logo_uri.clone()));
        }
        if !self.tags.is_empty() {
            token.insert("tags".to_string(), Value::from(self.tags.clone()));
        }
        Value::Object(token)
    }
}

fn edit_error(message: impl Into<String>) -> RegistryError {
    RegistryError::Edit(message.into())
}

/// In-memory editing session over one token list file
#[derive(Debug, Clone)]
pub struct DocumentEditor {
    path: PathBuf,
    document: Value,
}

impl DocumentEditor {
    /// Load `path` for editing. The document is not validated until save.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let document = load_document(&path)?;
        if !document.is_object() {
            return Err(edit_error(format!(
                "{} does not contain a JSON object",
                path.display()
            )));
        }
        Ok(Self { path, document })
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    fn root(&mut self) -> Result<&mut Map<String, Value>> {
        self.document
            .as_object_mut()
            .ok_or_else(|| edit_error("document root is not an object"))
    }

    fn tokens_mut(&mut self) -> Result<&mut Vec<Value>> {
        self.root()?
            .get_mut("tokens")
            .and_then(Value::as_array_mut)
            .ok_or_else(|| edit_error("document has no tokens array"))
    }

    fn tokens(&self) -> &[Value] {
        self.document
            .get("tokens")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn tag_ids(&self) -> Vec<String> {
        self.document
            .get("tags")
            .and_then(Value::as_object)
            .map(|tags| tags.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Set `timestamp` to the current time (millisecond precision, UTC).
    pub fn touch(&mut self) -> Result<()> {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        self.root()?.insert("timestamp".to_string(), Value::from(now));
        Ok(())
    }

    /// Append a token.
    ///
    /// Rejected if the token itself is malformed, references a tag the list
    /// does not define, or repeats an existing (chainId, address).
    pub fn add_token(&mut self, token: NewToken) -> Result<()> {
        if !is_address(&token.address) {
            return Err(edit_error(format!("invalid address {}", token.address)));
        }

        let value = token.to_value();
        schema::validate_token(&value).map_err(RegistryError::Schema)?;

        let known_tags = self.tag_ids();
        if let Some(unknown) = token.tags.iter().find(|t| !known_tags.contains(*t)) {
            return Err(edit_error(format!("tag {unknown} is not defined in the list")));
        }

        let duplicate = self.tokens().iter().any(|existing| {
            existing.get("chainId").and_then(Value::as_u64) == Some(token.chain_id)
                && existing
                    .get("address")
                    .and_then(Value::as_str)
                    .is_some_and(|a| addresses_eq(a, &token.address))
        });
        if duplicate {
            return Err(edit_error(format!(
                "token {} already listed on chain {}",
                token.address, token.chain_id
            )));
        }

        info!("Adding {} on chain {}", token.symbol, token.chain_id);
        self.tokens_mut()?.push(value);
        self.touch()
    }

    /// Remove the token with this (chainId, address) and return it.
    pub fn remove_token(&mut self, chain_id: u64, address: &str) -> Result<Value> {
        let position = self
            .tokens()
            .iter()
            .position(|t| {
                t.get("chainId").and_then(Value::as_u64) == Some(chain_id)
                    && t.get("address")
                        .and_then(Value::as_str)
                        .is_some_and(|a| addresses_eq(a, address))
            })
            .ok_or_else(|| edit_error(format!("no token {address} on chain {chain_id}")))?;

        let removed = self.tokens_mut()?.remove(position);
        info!("Removed {} from chain {}", address, chain_id);
        self.touch()?;
        Ok(removed)
    }

    /// Remove the token with this exact symbol on `chain_id`.
    ///
    /// Fails if no token or more than one token matches.
    pub fn remove_token_by_symbol(&mut self, chain_id: u64, symbol: &str) -> Result<Value> {
        let matches: Vec<usize> = self
            .tokens()
            .iter()
            .enumerate()
            .filter(|(_, t)| {
                t.get("chainId").and_then(Value::as_u64) == Some(chain_id)
                    && t.get("symbol").and_then(Value::as_str) == Some(symbol)
            })
            .map(|(i, _)| i)
            .collect();

        match matches.as_slice() {
            [] => Err(edit_error(format!("no token {symbol} on chain {chain_id}"))),
            [position] => {
                let removed = self.tokens_mut()?.remove(*position);
                info!("Removed {} from chain {}", symbol, chain_id);
                self.touch()?;
                Ok(removed)
            }
            _ => Err(edit_error(format!(
                "{} tokens named {symbol} on chain {chain_id}; remove by address instead",
                matches.len()
            ))),
        }
    }

    /// Define a new tag.
    pub fn add_tag(&mut self, id: &str, name: &str, description: &str) -> Result<()> {
        if !schema::is_tag_identifier(id) {
            return Err(edit_error(format!(
                "tag identifier {id} must be 1-10 letters, digits or underscores"
            )));
        }
        schema::validate_tag_definition(name, description).map_err(RegistryError::Schema)?;

        if self.tag_ids().iter().any(|t| t == id) {
            return Err(edit_error(format!("tag {id} already exists")));
        }

        let mut definition = Map::new();
        definition.insert("name".to_string(), Value::from(name));
        definition.insert("description".to_string(), Value::from(description));

        let root = self.root()?;
        let tags = root
            .entry("tags")
            .or_insert_with(|| Value::Object(Map::new()))
            .as_object_mut()
            .ok_or_else(|| edit_error("tags is not an object"))?;
        tags.insert(id.to_string(), Value::Object(definition));

        info!("Added tag {}", id);
        self.touch()
    }

    /// Delete tag definitions and strip them from every token.
    ///
    /// A token left without tags loses its `tags` field. Returns the number
    /// of tokens that were modified.
    pub fn remove_tags(&mut self, ids: &[&str]) -> Result<usize> {
        let existing = self.tag_ids();
        if existing.is_empty() {
            return Err(edit_error("no tags exist to remove"));
        }
        if let Some(unknown) = ids.iter().find(|id| !existing.iter().any(|e| e == *id)) {
            return Err(edit_error(format!("tag {unknown} does not exist")));
        }
        if ids.is_empty() {
            return Ok(0);
        }

        if let Some(tags) = self.root()?.get_mut("tags").and_then(Value::as_object_mut) {
            for id in ids {
                tags.shift_remove(*id);
            }
        }

        let mut modified = 0;
        for token in self.tokens_mut()?.iter_mut() {
            let Some(obj) = token.as_object_mut() else {
                continue;
            };
            let Some(token_tags) = obj.get_mut("tags").and_then(Value::as_array_mut) else {
                continue;
            };

            let before = token_tags.len();
            token_tags.retain(|t| t.as_str().map_or(true, |t| !ids.contains(&t)));
            if token_tags.len() == before {
                continue;
            }
            modified += 1;
            if token_tags.is_empty() {
                obj.shift_remove("tags");
            }
        }

        info!("Removed tags {:?} ({} tokens updated)", ids, modified);
        self.touch()?;
        Ok(modified)
    }

    /// Overwrite `version`.
    pub fn set_version(&mut self, version: TokenListVersion) -> Result<()> {
        let value = serde_json::to_value(version)?;
        self.root()?.insert("version".to_string(), value);
        self.touch()
    }

    /// Validate and write back to the file the editor was opened from.
    pub fn save(&self) -> Result<TokenList> {
        let list = schema::validate(&self.document)?;
        save_document(&self.path, &self.document)?;
        info!("Wrote {}", self.path.display());
        Ok(list)
    }
}
