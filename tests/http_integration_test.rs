//! JSON-RPC client, logo probe and full validation against a mock HTTP server

use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokenlist_mcp::reconcile::{
    validate_document, HttpLogoProbe, LogoProbe, Reconciler, ValidationOutcome,
};
use tokenlist_mcp::rpc::{
    ClientFactory, ContractReader, JsonRpcClient, StaticClientFactory, DECIMALS_SELECTOR,
    SYMBOL_SELECTOR,
};
use tokenlist_mcp::RegistryError;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const USDC: &str = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48";
const DAI: &str = "0x6B175474E89094C44Da98b954EedeAC495271d0F";

fn abi_string(s: &str) -> String {
    let mut data = vec![0u8; 64];
    data[31] = 0x20;
    data[63] = s.len() as u8;
    let mut payload = s.as_bytes().to_vec();
    payload.resize(s.len().div_ceil(32) * 32, 0);
    data.extend(payload);
    format!("0x{}", hex::encode(data))
}

fn abi_uint(n: u8) -> String {
    let mut data = vec![0u8; 32];
    data[31] = n;
    format!("0x{}", hex::encode(data))
}

fn rpc_result(result: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "jsonrpc": "2.0", "id": 1, "result": result }))
}

async fn mount_contract(server: &MockServer, address: &str, symbol: &str, decimals: u8) {
    Mock::given(method("POST"))
        .and(body_string_contains(address))
        .and(body_string_contains(SYMBOL_SELECTOR))
        .respond_with(rpc_result(abi_string(symbol)))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(body_string_contains(address))
        .and(body_string_contains(DECIMALS_SELECTOR))
        .respond_with(rpc_result(abi_uint(decimals)))
        .mount(server)
        .await;
}

fn client(server: &MockServer) -> JsonRpcClient {
    JsonRpcClient::new(reqwest::Client::new(), server.uri())
}

// ── eth_call ─────────────────────────────────────────────────────────

#[tokio::test]
async fn reads_symbol_and_decimals() {
    let server = MockServer::start().await;
    mount_contract(&server, USDC, "USDC", 6).await;

    let client = client(&server);
    assert_eq!(client.symbol(USDC).await.unwrap(), "USDC");
    assert_eq!(client.decimals(USDC).await.unwrap(), 6);
}

#[tokio::test]
async fn sends_eth_call_against_latest_block() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("\"method\":\"eth_call\""))
        .and(body_string_contains("\"latest\""))
        .respond_with(rpc_result(abi_uint(18)))
        .expect(1)
        .mount(&server)
        .await;

    assert_eq!(client(&server).decimals(DAI).await.unwrap(), 18);
}

#[tokio::test]
async fn rpc_error_object_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": 3, "message": "execution reverted" }
        })))
        .mount(&server)
        .await;

    match client(&server).symbol(USDC).await {
        Err(RegistryError::Rpc(message)) => assert_eq!(message, "execution reverted"),
        other => panic!("expected rpc error, got {other:?}"),
    }
}

#[tokio::test]
async fn http_error_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    assert!(matches!(
        client(&server).decimals(USDC).await,
        Err(RegistryError::Http(_))
    ));
}

#[tokio::test]
async fn empty_result_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(rpc_result("0x".to_string()))
        .mount(&server)
        .await;

    let client = client(&server);
    assert!(matches!(client.symbol(USDC).await, Err(RegistryError::Decode { .. })));
    assert!(matches!(client.decimals(USDC).await, Err(RegistryError::Decode { .. })));
}

#[tokio::test]
async fn static_factory_routes_by_chain() {
    let server = MockServer::start().await;
    mount_contract(&server, USDC, "USDC", 6).await;

    let urls = BTreeMap::from([(1, server.uri())]);
    let factory = StaticClientFactory::with_urls(&urls, Some(Duration::from_secs(5))).unwrap();

    let reader = factory.client(1).unwrap();
    assert_eq!(reader.symbol(USDC).await.unwrap(), "USDC");
    assert!(factory.client(10).is_none());
}

// ── logo probe ───────────────────────────────────────────────────────

#[tokio::test]
async fn logo_probe_only_accepts_200() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/usdc.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x89, b'P', b'N', b'G']))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/empty.png"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let probe = HttpLogoProbe::new(None).unwrap();
    assert!(probe.probe(&format!("{}/usdc.png", server.uri())).await);
    assert!(!probe.probe(&format!("{}/empty.png", server.uri())).await);
    assert!(!probe.probe(&format!("{}/missing.png", server.uri())).await);
    assert!(!probe.probe("not a url").await);
}

#[tokio::test]
async fn logo_probe_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let probe = HttpLogoProbe::new(Some(Duration::from_millis(50))).unwrap();
    assert!(!probe.probe(&format!("{}/slow.png", server.uri())).await);
}

// ── full pipeline ────────────────────────────────────────────────────

fn document(server: &MockServer) -> Value {
    json!({
        "name": "Integration",
        "timestamp": "2025-02-26T13:10:54.357Z",
        "version": { "major": 1, "minor": 0, "patch": 0 },
        "tokens": [
            {
                "chainId": 1,
                "address": USDC,
                "name": "USD Coin",
                "symbol": "USDC",
                "decimals": 6,
                "logoURI": format!("{}/logos/usdc.png", server.uri())
            },
            {
                "chainId": 1,
                "address": DAI,
                "name": "Dai Stablecoin",
                "symbol": "DAI",
                "decimals": 18,
                "logoURI": format!("{}/logos/dai.png", server.uri())
            }
        ]
    })
}

fn reconciler(server: &MockServer) -> Reconciler {
    let urls = BTreeMap::from([(1, server.uri())]);
    let factory = StaticClientFactory::with_urls(&urls, None).unwrap();
    Reconciler::new(Arc::new(factory))
        .with_max_concurrency(4)
        .with_logo_probe(Arc::new(HttpLogoProbe::new(None).unwrap()))
}

#[tokio::test]
async fn validates_list_and_reports_logos() {
    let server = MockServer::start().await;
    mount_contract(&server, USDC, "USDC", 6).await;
    mount_contract(&server, DAI, "DAI", 18).await;
    Mock::given(method("GET"))
        .and(path("/logos/usdc.png"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let outcome = validate_document(&document(&server), &reconciler(&server)).await;

    match &outcome {
        ValidationOutcome::AllClear { report, logos } => {
            assert_eq!(report.results.len(), 2);
            let unreachable: Vec<String> = logos
                .as_ref()
                .unwrap()
                .unreachable()
                .iter()
                .map(|r| r.key())
                .collect();
            assert_eq!(unreachable, vec!["1:DAI".to_string()]);
        }
        other => panic!("expected all clear, got {other:?}"),
    }
    assert!(outcome.to_string().ends_with("Token list is valid."));
}

#[tokio::test]
async fn reports_decimals_mismatch() {
    let server = MockServer::start().await;
    mount_contract(&server, USDC, "USDC", 18).await;
    mount_contract(&server, DAI, "DAI", 18).await;

    match validate_document(&document(&server), &reconciler(&server)).await {
        ValidationOutcome::Failed { report, logos } => {
            assert_eq!(
                report.failure_message().unwrap(),
                "Mismatching decimals:\n-\tUSDC:6 (local) vs. USDC:18 (onchain)"
            );
            // neither logo is served by the mock
            assert_eq!(logos.unwrap().unreachable().len(), 2);
        }
        other => panic!("expected failure, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_rpc_marks_every_token_missing() {
    let urls = BTreeMap::from([(1, "http://127.0.0.1:1".to_string())]);
    let factory = StaticClientFactory::with_urls(&urls, Some(Duration::from_secs(2))).unwrap();
    let reconciler = Reconciler::new(Arc::new(factory));

    let server = MockServer::start().await;
    match validate_document(&document(&server), &reconciler).await {
        ValidationOutcome::Failed { report, logos } => {
            assert!(logos.is_none());
            assert_eq!(report.missing_contracts().len(), 2);
            assert_eq!(
                report.failure_message().unwrap(),
                "Missing token contracts:\n-\tUSDC\n-\tDAI"
            );
        }
        other => panic!("expected failure, got {other:?}"),
    }
}
