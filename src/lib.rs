//! Token List Registry
//!
//! Validates, indexes and reconciles a token list: a JSON document of
//! fungible-token metadata keyed by (chain ID, address) and (chain ID,
//! symbol). Includes a structured editor, a version-bump helper and an MCP
//! server exposing lookups and validation as tools.

pub mod address;
pub mod config;
pub mod editor;
pub mod error;
pub mod handlers;
pub mod index;
pub mod reconcile;
pub mod rpc;
pub mod schema;
pub mod server;
pub mod tokenlist;
pub mod toolkit;
pub mod version;

pub use error::{RegistryError, Result};
pub use index::TokenIndex;
pub use reconcile::{validate_document, Reconciler, ValidationOutcome};
pub use server::TokenListMcpHandler;
pub use tokenlist::{TokenInfo, TokenList};
