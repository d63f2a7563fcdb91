//! MCP server handler implementation

use anyhow::Result;
use rmcp::{
    model::*,
    service::{RequestContext, RoleServer},
    ErrorData as McpError, ServerHandler,
};
use serde_json::Value;
use std::sync::Arc;

use crate::handlers;
use crate::index::TokenIndex;
use crate::reconcile::Reconciler;
use crate::tokenlist::TokenList;

pub const TOKENLIST_URI: &str = "tokenlist://all";
pub const SCHEMA_URI: &str = "tokenlist://schema";

/// MCP server handler over one loaded token list
#[derive(Clone)]
pub struct TokenListMcpHandler {
    document: Arc<Value>,
    index: Arc<TokenIndex>,
    reconciler: Option<Arc<Reconciler>>,
}

impl TokenListMcpHandler {
    /// Validate `document` and build its indexes.
    ///
    /// # Errors
    ///
    /// Fails if the document violates the schema.
    pub fn new(document: Value) -> Result<Self> {
        let list = TokenList::from_value(&document)?;
        let index = TokenIndex::from_list(&list);
        Ok(Self {
            document: Arc::new(document),
            index: Arc::new(index),
            reconciler: None,
        })
    }

    /// Enable on-chain checks for the `validate_token_list` tool.
    pub fn with_reconciler(mut self, reconciler: Reconciler) -> Self {
        self.reconciler = Some(Arc::new(reconciler));
        self
    }

    pub fn index(&self) -> &TokenIndex {
        &self.index
    }

    fn text_resource(uri: String, text: String) -> ReadResourceResult {
        ReadResourceResult {
            contents: vec![ResourceContents::TextResourceContents {
                uri,
                mime_type: Some("application/json".to_string()),
                text,
                meta: None,
            }],
        }
    }
}

impl ServerHandler for TokenListMcpHandler {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::default(),
            capabilities: ServerCapabilities {
                prompts: None,
                resources: Some(ResourcesCapability {
                    subscribe: None,
                    list_changed: None,
                }),
                tools: Some(ToolsCapability {
                    list_changed: None,
                }),
                logging: None,
                completions: None,
                experimental: None,
            },
            server_info: Implementation {
                name: "tokenlist-mcp-server".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: Some("Token List MCP Server".to_string()),
                icons: None,
                website_url: None,
            },
            instructions: Some("MCP server answering token metadata queries (by address, symbol or chain) against one validated token list, and validating token lists against the schema and on-chain state".into()),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult {
            tools: handlers::get_tokenlist_tools(),
            next_cursor: None,
        })
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        let mut tokenlist_resource = RawResource::new(TOKENLIST_URI, "Loaded Token List");
        tokenlist_resource.description =
            Some("The token list document this server was started with".to_string());
        tokenlist_resource.mime_type = Some("application/json".to_string());

        let mut schema_resource = RawResource::new(SCHEMA_URI, "Token List JSON Schema");
        schema_resource.description =
            Some("JSON Schema describing the token list document shape".to_string());
        schema_resource.mime_type = Some("application/json".to_string());

        Ok(ListResourcesResult {
            resources: vec![
                tokenlist_resource.no_annotation(),
                schema_resource.no_annotation(),
            ],
            next_cursor: None,
        })
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        let json = match request.uri.as_str() {
            TOKENLIST_URI => serde_json::to_string_pretty(self.document.as_ref()),
            SCHEMA_URI => serde_json::to_string_pretty(&schemars::schema_for!(TokenList)),
            _ => {
                return Err(McpError::invalid_params(
                    format!("Unknown resource URI: {}", request.uri),
                    None,
                ))
            }
        }
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;

        Ok(Self::text_resource(request.uri, json))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let empty_map = serde_json::Map::new();
        let args = request.arguments.as_ref().unwrap_or(&empty_map);

        let tool_name: &str = &request.name;
        match tool_name {
            "search_tokens" => handlers::handle_search_tokens(&self.index, args),
            "get_token_by_address" => handlers::handle_get_token_by_address(&self.index, args),
            "get_token_by_symbol" => handlers::handle_get_token_by_symbol(&self.index, args),
            "list_chain_tokens" => handlers::handle_list_chain_tokens(&self.index, args),
            "list_supported_chains" => handlers::handle_list_supported_chains(&self.index),
            "is_listed_token" => handlers::handle_is_listed_token(&self.index, args),
            "validate_token_list" => {
                handlers::handle_validate_token_list(
                    &self.document,
                    self.reconciler.as_deref(),
                    args,
                )
                .await
            }
            _ => Err(McpError::invalid_params(
                format!("Unknown tool: {}", request.name),
                None,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_document() -> Value {
        json!({
            "name": "Test List",
            "timestamp": "2025-02-26T13:10:54.357Z",
            "version": { "major": 0, "minor": 1, "patch": 0 },
            "tokens": [
                { "chainId": 1, "address": "0x6B175474E89094C44Da98b954EedeAC495271d0F", "name": "Dai Stablecoin", "symbol": "DAI", "decimals": 18 }
            ]
        })
    }

    fn create_test_handler() -> TokenListMcpHandler {
        TokenListMcpHandler::new(sample_document()).unwrap()
    }

    /// Test that the handler indexes the document it is given
    #[test]
    fn test_handler_creation() {
        let handler = create_test_handler();
        assert_eq!(handler.index().tokens().len(), 1);
        assert!(handler.index().has_chain(1));
    }

    /// Test that an invalid document is refused
    #[test]
    fn test_handler_rejects_invalid_document() {
        let mut document = sample_document();
        document["tokens"] = json!([]);
        assert!(TokenListMcpHandler::new(document).is_err());
    }

    /// Test that server info contains correct name, version, and instructions
    #[test]
    fn test_get_info_returns_valid_server_info() {
        let handler = create_test_handler();
        let info = handler.get_info();

        assert_eq!(info.server_info.name, "tokenlist-mcp-server");
        assert_eq!(info.server_info.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(
            info.server_info.title,
            Some("Token List MCP Server".to_string())
        );
        assert!(info.instructions.is_some());
    }

    /// Test that server advertises correct MCP capabilities (resources, tools, but not prompts)
    #[test]
    fn test_get_info_capabilities() {
        let info = create_test_handler().get_info();
        assert!(info.capabilities.resources.is_some());
        assert!(info.capabilities.tools.is_some());
        assert!(info.capabilities.prompts.is_none());
    }

    /// Test that server info includes a valid MCP protocol version
    #[test]
    fn test_get_info_protocol_version() {
        let info = create_test_handler().get_info();
        let version_str = format!("{}", info.protocol_version);
        assert!(!version_str.is_empty());
    }

    /// Test that clones share the same index
    #[test]
    fn test_handler_is_clone() {
        let handler = create_test_handler();
        let cloned = handler.clone();
        assert!(Arc::ptr_eq(&handler.index, &cloned.index));
        assert!(Arc::ptr_eq(&handler.document, &cloned.document));
    }

    /// Test that the reconciler is only present when configured
    #[test]
    fn test_with_reconciler() {
        use crate::rpc::StaticClientFactory;
        use std::collections::BTreeMap;

        let handler = create_test_handler();
        assert!(handler.reconciler.is_none());

        let factory = StaticClientFactory::with_urls(&BTreeMap::new(), None).unwrap();
        let handler = handler.with_reconciler(Reconciler::new(Arc::new(factory)));
        assert!(handler.reconciler.is_some());
    }

    /// Test that the exported JSON schema describes the document fields
    #[test]
    fn test_schema_resource_content() {
        let schema = serde_json::to_value(schemars::schema_for!(TokenList)).unwrap();
        let properties = schema["properties"].as_object().unwrap();
        assert!(properties.contains_key("tokens"));
        assert!(properties.contains_key("logoURI"));
    }
}
