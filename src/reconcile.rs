//! Reconciliation of listed metadata against on-chain state
//!
//! Every token is checked independently: its `symbol()` and `decimals()` are
//! read through a [`ClientFactory`] and compared with the listed values.
//! Failures are captured per token and never abort the batch. Logo URIs are
//! probed separately and only ever reported as informational.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::rpc::{ClientFactory, StaticClientFactory};
use crate::schema::{self, Violations};
use crate::tokenlist::{TokenInfo, TokenList};

/// Concurrency used when none is configured
pub const DEFAULT_MAX_CONCURRENCY: usize = 16;

/// Outcome of checking one token against its contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationResult {
    /// False when the contract could not be read at all
    pub success: bool,
    pub chain_id: u64,
    pub address: String,
    pub local_symbol: String,
    pub onchain_symbol: Option<String>,
    pub local_decimals: u8,
    pub onchain_decimals: Option<u8>,
}

impl ReconciliationResult {
    fn exempt(token: &TokenInfo) -> Self {
        Self {
            success: true,
            chain_id: token.chain_id,
            address: token.address.clone(),
            local_symbol: token.symbol.clone(),
            onchain_symbol: Some(token.symbol.clone()),
            local_decimals: token.decimals,
            onchain_decimals: Some(token.decimals),
        }
    }

    fn missing(token: &TokenInfo) -> Self {
        Self {
            success: false,
            chain_id: token.chain_id,
            address: token.address.clone(),
            local_symbol: token.symbol.clone(),
            onchain_symbol: None,
            local_decimals: token.decimals,
            onchain_decimals: None,
        }
    }

    pub fn symbol_mismatch(&self) -> bool {
        self.success && self.onchain_symbol.as_deref() != Some(self.local_symbol.as_str())
    }

    pub fn decimals_mismatch(&self) -> bool {
        self.success && self.onchain_decimals != Some(self.local_decimals)
    }

    fn onchain_symbol_display(&self) -> &str {
        self.onchain_symbol.as_deref().unwrap_or("undefined")
    }

    fn onchain_decimals_display(&self) -> String {
        self.onchain_decimals
            .map(|d| d.to_string())
            .unwrap_or_else(|| "undefined".to_string())
    }
}

/// Aggregated on-chain checks, in document order
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconciliationReport {
    pub results: Vec<ReconciliationResult>,
}

impl ReconciliationReport {
    pub fn missing_contracts(&self) -> Vec<&ReconciliationResult> {
        self.results.iter().filter(|r| !r.success).collect()
    }

    pub fn symbol_mismatches(&self) -> Vec<&ReconciliationResult> {
        self.results.iter().filter(|r| r.symbol_mismatch()).collect()
    }

    pub fn decimals_mismatches(&self) -> Vec<&ReconciliationResult> {
        self.results.iter().filter(|r| r.decimals_mismatch()).collect()
    }

    /// True when every token was found and matched.
    pub fn is_valid(&self) -> bool {
        self.results
            .iter()
            .all(|r| r.success && !r.symbol_mismatch() && !r.decimals_mismatch())
    }

    /// Multi-line failure description, `None` when the report is valid.
    ///
    /// Sections appear in the order missing contracts, symbols, decimals and
    /// are omitted when empty.
    pub fn failure_message(&self) -> Option<String> {
        let mut sections = Vec::new();

        let missing = self.missing_contracts();
        if !missing.is_empty() {
            sections.push(section(
                "Missing token contracts:",
                missing.iter().map(|r| r.local_symbol.clone()),
            ));
        }

        let symbols = self.symbol_mismatches();
        if !symbols.is_empty() {
            sections.push(section(
                "Mismatching symbols:",
                symbols.iter().map(|r| {
                    format!(
                        "{} (local) vs. {} (onchain)",
                        r.local_symbol,
                        r.onchain_symbol_display()
                    )
                }),
            ));
        }

        let decimals = self.decimals_mismatches();
        if !decimals.is_empty() {
            sections.push(section(
                "Mismatching decimals:",
                decimals.iter().map(|r| {
                    format!(
                        "{}:{} (local) vs. {}:{} (onchain)",
                        r.local_symbol,
                        r.local_decimals,
                        r.onchain_symbol_display(),
                        r.onchain_decimals_display()
                    )
                }),
            ));
        }

        (!sections.is_empty()).then(|| sections.join("\n"))
    }
}

fn section(header: &str, lines: impl Iterator<Item = String>) -> String {
    let mut out = header.to_string();
    for line in lines {
        out.push_str("\n-\t");
        out.push_str(&line);
    }
    out
}

/// Reachability of one token's logo
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoProbeResult {
    pub chain_id: u64,
    pub symbol: String,
    pub logo_uri: Option<String>,
    pub reachable: bool,
}

impl LogoProbeResult {
    /// `symbol` when reachable, `{chainId}:{symbol}` otherwise.
    pub fn key(&self) -> String {
        if self.reachable {
            self.symbol.clone()
        } else {
            format!("{}:{}", self.chain_id, self.symbol)
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LogoReport {
    pub results: Vec<LogoProbeResult>,
}

impl LogoReport {
    pub fn unreachable(&self) -> Vec<&LogoProbeResult> {
        self.results.iter().filter(|r| !r.reachable).collect()
    }

    /// One informational line naming unreachable logos, if any.
    pub fn summary(&self) -> Option<String> {
        let keys: Vec<String> = self.unreachable().iter().map(|r| r.key()).collect();
        (!keys.is_empty()).then(|| format!("{} have invalid logoURIs", keys.join(",")))
    }
}

/// Checks whether a logo URI resolves
#[async_trait]
pub trait LogoProbe: Send + Sync {
    /// True only for an HTTP 200 response; errors count as unreachable.
    async fn probe(&self, uri: &str) -> bool;
}

/// [`LogoProbe`] issuing a plain GET and inspecting only the status
#[derive(Debug, Clone)]
pub struct HttpLogoProbe {
    http: reqwest::Client,
}

impl HttpLogoProbe {
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
        })
    }
}

#[async_trait]
impl LogoProbe for HttpLogoProbe {
    async fn probe(&self, uri: &str) -> bool {
        match self.http.get(uri).send().await {
            Ok(response) => response.status() == reqwest::StatusCode::OK,
            Err(e) => {
                debug!("Logo fetch failed for {}: {}", uri, e);
                false
            }
        }
    }
}

/// Runs on-chain and logo checks with bounded concurrency
#[derive(Clone)]
pub struct Reconciler {
    factory: Arc<dyn ClientFactory>,
    exemptions: HashSet<String>,
    max_concurrency: usize,
    logo_probe: Option<Arc<dyn LogoProbe>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("exemptions", &self.exemptions)
            .field("max_concurrency", &self.max_concurrency)
            .field("checks_logos", &self.logo_probe.is_some())
            .finish()
    }
}

impl Reconciler {
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            factory,
            exemptions: HashSet::new(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            logo_probe: None,
        }
    }

    /// Production reconciler: static RPC table, HTTP logo probe if enabled.
    pub fn from_config(config: &Config) -> Result<Self> {
        let timeout = config.request_timeout();
        let factory = StaticClientFactory::new(&config.rpc_urls, timeout)?;
        debug!("RPC endpoints for chains {:?}", factory.supported_chains());

        let mut reconciler = Self::new(Arc::new(factory))
            .with_exemptions(config.validation_exceptions.iter().cloned())
            .with_max_concurrency(config.max_concurrency);

        if config.check_logos {
            reconciler = reconciler.with_logo_probe(Arc::new(HttpLogoProbe::new(timeout)?));
        }
        Ok(reconciler)
    }

    /// Symbols that skip on-chain checks (exact match).
    pub fn with_exemptions(mut self, symbols: impl IntoIterator<Item = String>) -> Self {
        self.exemptions.extend(symbols);
        self
    }

    /// Clamped to at least one in-flight check.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn with_logo_probe(mut self, probe: Arc<dyn LogoProbe>) -> Self {
        self.logo_probe = Some(probe);
        self
    }

    pub fn is_exempt(&self, symbol: &str) -> bool {
        self.exemptions.contains(symbol)
    }

    pub async fn reconcile(&self, list: &TokenList) -> ReconciliationReport {
        self.reconcile_tokens(&list.tokens).await
    }

    /// Check every token; results come back in input order.
    pub async fn reconcile_tokens(&self, tokens: &[TokenInfo]) -> ReconciliationReport {
        info!(
            "Reconciling {} tokens (max {} in flight)",
            tokens.len(),
            self.max_concurrency
        );

        // Owned tokens: the returned future must be Send for the MCP handler
        let results = stream::iter(tokens.to_vec())
            .map(|token: TokenInfo| async move { self.check_token(&token).await })
            .buffered(self.max_concurrency)
            .collect::<Vec<_>>()
            .await;

        ReconciliationReport { results }
    }

    async fn check_token(&self, token: &TokenInfo) -> ReconciliationResult {
        if self.is_exempt(&token.symbol) {
            info!("{} is exempt from onchain validation", token.symbol);
            return ReconciliationResult::exempt(token);
        }

        let Some(reader) = self.factory.client(token.chain_id) else {
            warn!(
                "No RPC client for chain {}; {} counted as missing",
                token.chain_id, token.symbol
            );
            return ReconciliationResult::missing(token);
        };

        let (symbol, decimals) = tokio::join!(
            reader.symbol(&token.address),
            reader.decimals(&token.address)
        );

        match (symbol, decimals) {
            (Ok(symbol), Ok(decimals)) => ReconciliationResult {
                success: true,
                chain_id: token.chain_id,
                address: token.address.clone(),
                local_symbol: token.symbol.clone(),
                onchain_symbol: Some(symbol),
                local_decimals: token.decimals,
                onchain_decimals: Some(decimals),
            },
            (Err(e), _) | (_, Err(e)) => {
                warn!(
                    "Reading {} ({}) on chain {} failed: {}",
                    token.symbol, token.address, token.chain_id, e
                );
                ReconciliationResult::missing(token)
            }
        }
    }

    /// Probe every token's logo. `None` when no probe is configured.
    pub async fn probe_logos(&self, tokens: &[TokenInfo]) -> Option<LogoReport> {
        let probe = self.logo_probe.as_ref()?;

        let results = stream::iter(tokens.to_vec())
            .map(|token: TokenInfo| {
                let probe = Arc::clone(probe);
                async move {
                    let reachable = match &token.logo_uri {
                        Some(uri) => probe.probe(uri).await,
                        None => false,
                    };
                    LogoProbeResult {
                        chain_id: token.chain_id,
                        symbol: token.symbol,
                        logo_uri: token.logo_uri,
                        reachable,
                    }
                }
            })
            .buffered(self.max_concurrency)
            .collect::<Vec<_>>()
            .await;

        Some(LogoReport { results })
    }
}

/// Verdict of the full validation pipeline
#[derive(Debug, Clone)]
pub enum ValidationOutcome {
    /// Schema violations; nothing else was checked.
    SchemaInvalid(Violations),
    /// On-chain checks found missing contracts or mismatches.
    Failed {
        report: ReconciliationReport,
        logos: Option<LogoReport>,
    },
    AllClear {
        report: ReconciliationReport,
        logos: Option<LogoReport>,
    },
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationOutcome::AllClear { .. })
    }
}

impl std::fmt::Display for ValidationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationOutcome::SchemaInvalid(violations) => {
                write!(f, "Token list is invalid.\n{violations}")
            }
            ValidationOutcome::Failed { report, logos } => {
                writeln!(f, "Token list is invalid.")?;
                f.write_str(report.failure_message().as_deref().unwrap_or_default())?;
                if let Some(summary) = logos.as_ref().and_then(LogoReport::summary) {
                    write!(f, "\n{summary}")?;
                }
                Ok(())
            }
            ValidationOutcome::AllClear { logos, .. } => {
                writeln!(f, "All token contracts found, symbols and decimals match.")?;
                if let Some(summary) = logos.as_ref().and_then(LogoReport::summary) {
                    writeln!(f, "{summary}")?;
                }
                write!(f, "Token list is valid.")
            }
        }
    }
}

/// Schema check, then on-chain reconciliation alongside the logo probe.
///
/// Logo results never change the verdict.
pub async fn validate_document(document: &Value, reconciler: &Reconciler) -> ValidationOutcome {
    let list = match schema::validate(document) {
        Ok(list) => list,
        Err(violations) => {
            warn!("Token list schema is invalid ({} violations)", violations.len());
            return ValidationOutcome::SchemaInvalid(violations);
        }
    };
    info!("Token list schema is valid");

    let (report, logos) = tokio::join!(
        reconciler.reconcile(&list),
        reconciler.probe_logos(&list.tokens)
    );
    if let Some(summary) = logos.as_ref().and_then(LogoReport::summary) {
        info!("{}", summary);
    }

    if !report.is_valid() {
        return ValidationOutcome::Failed { report, logos };
    }
    info!("All token contracts found, symbols and decimals match");

    ValidationOutcome::AllClear { report, logos }
}
