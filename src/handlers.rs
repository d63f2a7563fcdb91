//! MCP tool definitions and handlers for token list queries

use rmcp::model::*;
use serde_json::Value;
use std::sync::Arc;

use crate::index::TokenIndex;
use crate::reconcile::{validate_document, Reconciler, ValidationOutcome};
use crate::schema;
use crate::tokenlist::{chain_id_to_name, format_token_info, parse_chain_param};
use crate::toolkit;

type Args = serde_json::Map<String, Value>;

/// Default and maximum number of tokens shown by `list_chain_tokens`
const DEFAULT_LIST_LIMIT: u64 = 50;
const MAX_LIST_LIMIT: u64 = 200;

/// Get all token list tools
pub fn get_tokenlist_tools() -> Vec<Tool> {
    vec![
        search_tokens_tool(),
        get_token_by_address_tool(),
        get_token_by_symbol_tool(),
        list_chain_tokens_tool(),
        list_supported_chains_tool(),
        is_listed_token_tool(),
        validate_token_list_tool(),
    ]
}

fn object_schema(properties: Value, required: &[&str]) -> Arc<serde_json::Map<String, Value>> {
    let mut schema = serde_json::Map::new();
    schema.insert("type".to_string(), Value::String("object".to_string()));
    schema.insert("properties".to_string(), properties);
    if !required.is_empty() {
        schema.insert(
            "required".to_string(),
            Value::Array(required.iter().map(|r| Value::String(r.to_string())).collect()),
        );
    }
    Arc::new(schema)
}

fn chain_property(description: &str) -> Value {
    serde_json::json!({
        "type": ["string", "number"],
        "description": description
    })
}

fn search_tokens_tool() -> Tool {
    Tool::new(
        "search_tokens".to_string(),
        "Search the loaded token list by name or symbol. Exact matches win over partial ones.".to_string(),
        object_schema(
            serde_json::json!({
                "query": {
                    "type": "string",
                    "description": "Token name or symbol to search for (e.g., 'USDC', 'Dai')"
                },
                "chain": chain_property("Optional: Filter by chain name or ID (e.g., 'ethereum', 10)")
            }),
            &["query"],
        ),
    )
}

fn get_token_by_address_tool() -> Tool {
    Tool::new(
        "get_token_by_address".to_string(),
        "Get token information by contract address in any letter case. Searches all chains unless one is given.".to_string(),
        object_schema(
            serde_json::json!({
                "address": {
                    "type": "string",
                    "description": "Token contract address (0x-prefixed, 40 hex digits)"
                },
                "chain": chain_property("Optional: Chain name or ID to search on")
            }),
            &["address"],
        ),
    )
}

fn get_token_by_symbol_tool() -> Tool {
    Tool::new(
        "get_token_by_symbol".to_string(),
        "Get token information by exact, case-sensitive symbol on one chain.".to_string(),
        object_schema(
            serde_json::json!({
                "symbol": {
                    "type": "string",
                    "description": "Token symbol exactly as listed (e.g., 'USDC')"
                },
                "chain": chain_property("Chain name or ID")
            }),
            &["symbol", "chain"],
        ),
    )
}

fn list_chain_tokens_tool() -> Tool {
    Tool::new(
        "list_chain_tokens".to_string(),
        "List the tokens on one chain in list order, optionally only those carrying any of the given tags.".to_string(),
        object_schema(
            serde_json::json!({
                "chain": chain_property("Chain name or ID (e.g., 'ethereum', 'optimism', 10)"),
                "tags": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Optional: Tag identifiers; a token matches if it has at least one"
                },
                "limit": {
                    "type": "number",
                    "description": "Maximum number of tokens to return (default: 50)"
                }
            }),
            &["chain"],
        ),
    )
}

fn list_supported_chains_tool() -> Tool {
    Tool::new(
        "list_supported_chains".to_string(),
        "List the chains that have at least one token in the loaded list.".to_string(),
        object_schema(Value::Object(serde_json::Map::new()), &[]),
    )
}

fn is_listed_token_tool() -> Tool {
    Tool::new(
        "is_listed_token".to_string(),
        "Check whether a token object is well formed and listed under its chain and symbol.".to_string(),
        object_schema(
            serde_json::json!({
                "token": {
                    "type": "object",
                    "description": "Token object with chainId, address, name, symbol and decimals"
                }
            }),
            &["token"],
        ),
    )
}

fn validate_token_list_tool() -> Tool {
    Tool::new(
        "validate_token_list".to_string(),
        "Validate a token list document against the schema and, if requested, reconcile symbols and decimals on-chain. Defaults to the loaded list.".to_string(),
        object_schema(
            serde_json::json!({
                "document": {
                    "type": "object",
                    "description": "Optional: Token list document to validate instead of the loaded one"
                },
                "onchain": {
                    "type": "boolean",
                    "description": "Also compare symbols and decimals with the deployed contracts (default: false)"
                }
            }),
            &[],
        ),
    )
}

/// Read a chain argument given as a number or as a name / numeric string.
fn chain_arg(args: &Args, key: &str) -> Option<u64> {
    match args.get(key)? {
        Value::String(s) => parse_chain_param(s),
        other => toolkit::chain_id_from_value(other),
    }
}

fn required_chain(args: &Args) -> Result<u64, rmcp::ErrorData> {
    chain_arg(args, "chain").ok_or_else(|| {
        rmcp::ErrorData::invalid_params(
            "Missing or invalid 'chain' parameter. Use a chain name (e.g., 'ethereum') or chain ID",
            None,
        )
    })
}

fn required_str<'a>(args: &'a Args, key: &str) -> Result<&'a str, rmcp::ErrorData> {
    args.get(key).and_then(|v| v.as_str()).ok_or_else(|| {
        rmcp::ErrorData::invalid_params(format!("Missing or invalid '{}' parameter", key), None)
    })
}

fn chain_label(chain_id: u64) -> String {
    match chain_id_to_name(chain_id) {
        Some(name) => format!("{} (Chain ID: {})", name, chain_id),
        None => format!("Chain ID {}", chain_id),
    }
}

/// Handle search_tokens tool call
pub fn handle_search_tokens(
    index: &TokenIndex,
    args: &Args,
) -> Result<CallToolResult, rmcp::ErrorData> {
    let query = required_str(args, "query")?;
    let chain_id = chain_arg(args, "chain");

    let results = toolkit::search_tokens(index, query, chain_id);

    let mut response = if results.is_empty() {
        format!("No tokens found matching '{}'\n", query)
    } else {
        format!("Found {} token(s) matching '{}':\n\n", results.len(), query)
    };
    for token in &results {
        response.push_str(&format_token_info(token, chain_id.is_none()));
        response.push('\n');
    }

    Ok(CallToolResult::success(vec![Content::text(response)]))
}

/// Handle get_token_by_address tool call
pub fn handle_get_token_by_address(
    index: &TokenIndex,
    args: &Args,
) -> Result<CallToolResult, rmcp::ErrorData> {
    let address = required_str(args, "address")?;

    let results: Vec<_> = match chain_arg(args, "chain") {
        Some(chain_id) => toolkit::lookup_by_address(index, chain_id, address)
            .into_iter()
            .collect(),
        None => toolkit::lookup_by_address_all_chains(index, address),
    };

    let response = match results.as_slice() {
        [] => format!(
            "No token found with address {}\n\nTip: Make sure the address is correct and exists in the token list.\n",
            address
        ),
        [token] => format!("Token found:\n\n{}", format_token_info(token, true)),
        tokens => {
            let mut resp = format!(
                "Found {} tokens with address {} on different chains:\n\n",
                tokens.len(),
                address
            );
            for token in tokens {
                resp.push_str(&format_token_info(token, true));
                resp.push('\n');
            }
            resp
        }
    };

    Ok(CallToolResult::success(vec![Content::text(response)]))
}

/// Handle get_token_by_symbol tool call
pub fn handle_get_token_by_symbol(
    index: &TokenIndex,
    args: &Args,
) -> Result<CallToolResult, rmcp::ErrorData> {
    let symbol = required_str(args, "symbol")?;
    let chain_id = required_chain(args)?;

    let response = match toolkit::lookup_by_symbol(index, chain_id, symbol) {
        Some(token) => format!("Token found:\n\n{}", format_token_info(token, true)),
        None => format!("No token {} on {}\n", symbol, chain_label(chain_id)),
    };

    Ok(CallToolResult::success(vec![Content::text(response)]))
}

/// Handle list_chain_tokens tool call
pub fn handle_list_chain_tokens(
    index: &TokenIndex,
    args: &Args,
) -> Result<CallToolResult, rmcp::ErrorData> {
    let chain_id = required_chain(args)?;

    let tags: Vec<&str> = args
        .get("tags")
        .and_then(|v| v.as_array())
        .map(|tags| tags.iter().filter_map(|t| t.as_str()).collect())
        .unwrap_or_default();

    let limit = args
        .get("limit")
        .and_then(|v| v.as_u64())
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .min(MAX_LIST_LIMIT) as usize;

    let tokens = toolkit::list_by_chain(index, chain_id, &tags);

    let mut response = format!("Found {} tokens on {}\n\n", tokens.len(), chain_label(chain_id));

    if tokens.is_empty() {
        response.push_str("No tokens found for this chain.\n");
    } else {
        for token in tokens.iter().take(limit) {
            response.push_str(&format_token_info(token, false));
            response.push('\n');
        }

        if tokens.len() > limit {
            response.push_str(&format!(
                "\n... and {} more tokens. Increase the limit parameter to see more.\n",
                tokens.len() - limit
            ));
        }
    }

    Ok(CallToolResult::success(vec![Content::text(response)]))
}

/// Handle list_supported_chains tool call
pub fn handle_list_supported_chains(index: &TokenIndex) -> Result<CallToolResult, rmcp::ErrorData> {
    let mut response = String::from("Chains in this token list:\n\n");

    for chain_id in index.chain_ids() {
        let count = toolkit::list_by_chain(index, chain_id, &[]).len();
        response.push_str(&format!("• {} - {} tokens\n", chain_label(chain_id), count));
    }

    response.push_str(
        "\nUse these chain names or IDs with get_token_by_symbol, get_token_by_address, or list_chain_tokens.\n",
    );

    Ok(CallToolResult::success(vec![Content::text(response)]))
}

/// Handle is_listed_token tool call
pub fn handle_is_listed_token(
    index: &TokenIndex,
    args: &Args,
) -> Result<CallToolResult, rmcp::ErrorData> {
    let token = args.get("token").ok_or_else(|| {
        rmcp::ErrorData::invalid_params("Missing 'token' parameter", None)
    })?;

    let response = if !toolkit::is_token(token) {
        "false: not a well-formed token object".to_string()
    } else if toolkit::is_listed_token(index, token) {
        "true".to_string()
    } else {
        "false: no token with this chainId and symbol is listed".to_string()
    };

    Ok(CallToolResult::success(vec![Content::text(response)]))
}

/// Handle validate_token_list tool call
///
/// Schema problems and on-chain mismatches are reported as tool errors, not
/// protocol errors.
pub async fn handle_validate_token_list(
    loaded: &Value,
    reconciler: Option<&Reconciler>,
    args: &Args,
) -> Result<CallToolResult, rmcp::ErrorData> {
    let document = args.get("document").unwrap_or(loaded);
    let onchain = args.get("onchain").and_then(|v| v.as_bool()).unwrap_or(false);

    if !onchain {
        return Ok(match schema::validate(document) {
            Ok(list) => CallToolResult::success(vec![Content::text(format!(
                "Token list schema is valid ({} tokens, version {})",
                list.tokens.len(),
                list.version
            ))]),
            Err(violations) => CallToolResult::error(vec![Content::text(format!(
                "Token list is invalid.\n{}",
                violations
            ))]),
        });
    }

    let reconciler = reconciler.ok_or_else(|| {
        rmcp::ErrorData::invalid_params("On-chain validation is not configured", None)
    })?;

    let outcome = validate_document(document, reconciler).await;
    let text = outcome.to_string();
    Ok(match outcome {
        ValidationOutcome::AllClear { .. } => CallToolResult::success(vec![Content::text(text)]),
        _ => CallToolResult::error(vec![Content::text(text)]),
    })
}
