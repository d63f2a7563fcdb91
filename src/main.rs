//! Token list registry CLI - Entry point

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use rmcp::service::ServiceExt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tokenlist_mcp::{
    config::Config,
    editor::{DocumentEditor, NewToken},
    reconcile::{validate_document, Reconciler, ValidationOutcome},
    rpc::{fetch_token_metadata, StaticClientFactory},
    schema,
    tokenlist::{format_token_info, load_document, parse_chain_param, TokenList},
    toolkit,
    version::{diff_tokens, next_version},
    TokenIndex, TokenListMcpHandler,
};

/// Token list registry - validate, query, edit and serve a token list
#[derive(Parser, Debug)]
#[command(name = "tokenlist")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check the schema, then symbols and decimals on-chain, then logo URIs
    Validate {
        file: PathBuf,
        /// Stop after the schema check
        #[arg(long)]
        skip_onchain: bool,
    },
    /// Find one token by address or symbol
    Lookup {
        file: PathBuf,
        #[arg(long, value_parser = parse_chain)]
        chain: u64,
        #[command(flatten)]
        key: LookupKey,
    },
    /// List the tokens on a chain
    List {
        file: PathBuf,
        #[arg(long, value_parser = parse_chain)]
        chain: u64,
        /// Only tokens carrying at least one of these tags
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// Append a token; missing metadata is read from the contract
    AddToken {
        file: PathBuf,
        #[arg(long, value_parser = parse_chain)]
        chain: u64,
        #[arg(long)]
        address: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        decimals: Option<u8>,
        #[arg(long)]
        logo_uri: Option<String>,
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// Remove one token by address or symbol
    RemoveToken {
        file: PathBuf,
        #[arg(long, value_parser = parse_chain)]
        chain: u64,
        #[command(flatten)]
        key: LookupKey,
    },
    /// Define a new tag
    AddTag {
        file: PathBuf,
        /// Identifier (1-10 letters, digits, underscores)
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: String,
    },
    /// Delete tags from the list and from every token
    RemoveTags {
        file: PathBuf,
        #[arg(long = "tag", required = true)]
        tags: Vec<String>,
    },
    /// Set the version of NEW by comparing its tokens with OLD
    BumpVersion { old: PathBuf, new: PathBuf },
    /// Print the JSON Schema of the token list document
    JsonSchema,
    /// Serve the list over MCP on stdio
    Serve { file: PathBuf },
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct LookupKey {
    #[arg(long)]
    address: Option<String>,
    #[arg(long)]
    symbol: Option<String>,
}

fn parse_chain(s: &str) -> std::result::Result<u64, String> {
    parse_chain_param(s).ok_or_else(|| format!("unknown chain '{}'", s))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Diagnostics go to stderr; stdout carries MCP traffic in serve mode
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match cli.config {
        Some(ref config_path) => Config::from_file(config_path)?,
        None => Config::load_default(),
    };

    log_config_status(&config);

    match cli.command {
        Command::Validate { file, skip_onchain } => validate(&config, &file, skip_onchain).await,
        Command::Lookup { file, chain, key } => lookup(&file, chain, &key),
        Command::List { file, chain, tags } => list(&file, chain, &tags),
        Command::AddToken {
            file,
            chain,
            address,
            name,
            symbol,
            decimals,
            logo_uri,
            tags,
        } => {
            let token = resolve_new_token(
                &config, chain, address, name, symbol, decimals, logo_uri, tags,
            )
            .await?;
            let mut editor = DocumentEditor::open(&file)?;
            editor.add_token(token)?;
            editor.save()?;
            println!("Token added successfully!");
            Ok(())
        }
        Command::RemoveToken { file, chain, key } => {
            let mut editor = DocumentEditor::open(&file)?;
            let removed = match (&key.address, &key.symbol) {
                (Some(address), _) => editor.remove_token(chain, address)?,
                (None, Some(symbol)) => editor.remove_token_by_symbol(chain, symbol)?,
                (None, None) => bail!("either --address or --symbol is required"),
            };
            editor.save()?;
            println!(
                "Removed {} ({})",
                removed["symbol"].as_str().unwrap_or_default(),
                removed["address"].as_str().unwrap_or_default()
            );
            Ok(())
        }
        Command::AddTag {
            file,
            id,
            name,
            description,
        } => {
            let mut editor = DocumentEditor::open(&file)?;
            editor.add_tag(&id, &name, &description)?;
            editor.save()?;
            println!("Tag added successfully!");
            Ok(())
        }
        Command::RemoveTags { file, tags } => {
            let ids: Vec<&str> = tags.iter().map(String::as_str).collect();
            let mut editor = DocumentEditor::open(&file)?;
            let modified = editor.remove_tags(&ids)?;
            editor.save()?;
            println!("Tags removed successfully! ({} tokens updated)", modified);
            Ok(())
        }
        Command::BumpVersion { old, new } => bump_version(&old, &new),
        Command::JsonSchema => {
            let schema = schemars::schema_for!(TokenList);
            println!("{}", serde_json::to_string_pretty(&schema)?);
            Ok(())
        }
        Command::Serve { file } => serve(&config, &file).await,
    }
}

async fn validate(config: &Config, file: &Path, skip_onchain: bool) -> Result<()> {
    let document = load_document(file)
        .with_context(|| format!("Failed to load token list: {}", file.display()))?;

    if skip_onchain {
        return match schema::validate(&document) {
            Ok(_) => {
                println!("Token list schema is valid.");
                Ok(())
            }
            Err(violations) => bail!("Token list is invalid.\n{}", violations),
        };
    }

    let reconciler = Reconciler::from_config(config)?;
    let outcome = validate_document(&document, &reconciler).await;
    if let ValidationOutcome::AllClear { .. } = outcome {
        println!("{}", outcome);
        Ok(())
    } else {
        bail!("{}", outcome)
    }
}

fn load_index(file: &Path) -> Result<TokenIndex> {
    let list = TokenList::from_file(file)
        .with_context(|| format!("Failed to load token list: {}", file.display()))?;
    Ok(TokenIndex::from_list(&list))
}

fn lookup(file: &Path, chain: u64, key: &LookupKey) -> Result<()> {
    let index = load_index(file)?;

    let found = match (&key.address, &key.symbol) {
        (Some(address), _) => toolkit::lookup_by_address(&index, chain, address),
        (None, Some(symbol)) => toolkit::lookup_by_symbol(&index, chain, symbol),
        (None, None) => bail!("either --address or --symbol is required"),
    };

    match found {
        Some(token) => {
            print!("{}", format_token_info(token, true));
            Ok(())
        }
        None => bail!("No matching token on chain {}", chain),
    }
}

fn list(file: &Path, chain: u64, tags: &[String]) -> Result<()> {
    let index = load_index(file)?;
    let tags: Vec<&str> = tags.iter().map(String::as_str).collect();

    let tokens = toolkit::list_by_chain(&index, chain, &tags);
    println!("Found {} tokens on chain {}\n", tokens.len(), chain);
    for token in tokens {
        println!("{}", format_token_info(token, false));
    }
    Ok(())
}

/// Fill in whatever metadata the user left out from the contract itself.
#[allow(clippy::too_many_arguments)]
async fn resolve_new_token(
    config: &Config,
    chain_id: u64,
    address: String,
    name: Option<String>,
    symbol: Option<String>,
    decimals: Option<u8>,
    logo_uri: Option<String>,
    tags: Vec<String>,
) -> Result<NewToken> {
    let (name, symbol, decimals) = match (name, symbol, decimals) {
        (Some(name), Some(symbol), Some(decimals)) => (name, symbol, decimals),
        (name, symbol, decimals) => {
            info!("Fetching token details for {} on chain {}", address, chain_id);
            let factory = StaticClientFactory::new(&config.rpc_urls, config.request_timeout())?;
            let (onchain_name, onchain_symbol, onchain_decimals) =
                fetch_token_metadata(&factory, chain_id, &address)
                    .await
                    .context("Could not fetch token details; pass --name, --symbol and --decimals")?;
            (
                name.unwrap_or(onchain_name),
                symbol.unwrap_or(onchain_symbol),
                decimals.unwrap_or(onchain_decimals),
            )
        }
    };

    Ok(NewToken {
        chain_id,
        address,
        name,
        symbol,
        decimals,
        logo_uri,
        tags,
    })
}

fn bump_version(old: &Path, new: &Path) -> Result<()> {
    let previous = TokenList::from_file(old)
        .with_context(|| format!("Failed to load previous token list: {}", old.display()))?;
    let mut editor = DocumentEditor::open(new)?;
    let current = TokenList::from_value(editor.document())?;

    let diff = diff_tokens(&previous.tokens, &current.tokens);
    let next = next_version(&previous, &current);

    info!(
        "{} added, {} removed, {} changed",
        diff.added.len(),
        diff.removed.len(),
        diff.changed.len()
    );

    if next == current.version {
        println!("Version {} is already current", next);
        return Ok(());
    }

    editor.set_version(next)?;
    editor.save()?;
    println!("Version {} -> {} ({:?})", previous.version, next, diff.upgrade());
    Ok(())
}

async fn serve(config: &Config, file: &Path) -> Result<()> {
    let document = load_document(file)
        .with_context(|| format!("Failed to load token list: {}", file.display()))?;

    let handler = TokenListMcpHandler::new(document)?.with_reconciler(Reconciler::from_config(config)?);
    info!(
        "Serving {} tokens across {} chains",
        handler.index().tokens().len(),
        handler.index().chain_ids().count()
    );

    // Serve using stdio transport
    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let service = handler.serve((stdin, stdout)).await?;
    service.waiting().await?;

    Ok(())
}

/// Log the active configuration to stderr.
fn log_config_status(config: &Config) {
    if !config.rpc_urls.is_empty() {
        info!("RPC overrides for chains {:?}", config.rpc_urls.keys().collect::<Vec<_>>());
    }
    if !config.validation_exceptions.is_empty() {
        info!("Exempt from on-chain checks: {:?}", config.validation_exceptions);
    }
    if !config.check_logos {
        warn!("Logo checks disabled");
    }
}
