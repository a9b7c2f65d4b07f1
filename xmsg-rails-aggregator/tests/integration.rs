//! Two rails joined by Axelar, Wormhole and loopback gateways, driven over HTTP

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{json, Value};

use xmsg_rails_aggregator::config::{self, RailConfig};
use xmsg_rails_aggregator::{app_router, AppState, SendMessageResponse};

const OWNER: &str = "0xowner";
const AGGREGATOR_A: &str = "0xaaaa000000000000000000000000000000000001";
const AGGREGATOR_B: &str = "0xbbbb000000000000000000000000000000000002";
const RECEIVER: &str = "0xcccc000000000000000000000000000000000003";
const CHAIN_A: &str = "eip155:1";
const CHAIN_B: &str = "eip155:10";
const GATEWAYS: &str = "loopback:lb,wormhole:wh,axelar:ax";

fn rail(chain: &str, address: &str, peer_chain: &str, peer: &str) -> TestServer {
    rail_with(chain, address, peer_chain, peer, None)
}

fn rail_with(
    chain: &str,
    address: &str,
    peer_chain: &str,
    peer: &str,
    approved: Option<&str>,
) -> TestServer {
    let routers = format!("{peer_chain}={peer}");
    let config = RailConfig::from_lookup(|key| match key {
        config::APPROVED_GATEWAYS_ENV => approved.map(str::to_string),
        config::CHAIN_ENV => Some(chain.to_string()),
        config::ADDRESS_ENV => Some(address.to_string()),
        config::OWNER_ENV => Some(OWNER.to_string()),
        config::GATEWAYS_ENV => Some(GATEWAYS.to_string()),
        config::THRESHOLD_ENV => Some("2".to_string()),
        config::REMOTE_ROUTERS_ENV => Some(routers.clone()),
        config::RECEIVERS_ENV => Some(RECEIVER.to_string()),
        _ => None,
    })
    .unwrap();
    TestServer::new(app_router(AppState::new(config).unwrap())).unwrap()
}

/// Address the peer adapter is known by on the other rail
fn remote_address(gateway: &str) -> String {
    match gateway {
        "wh" => xmsg_wormhole::emitter_hex(&gateway.into()),
        other => other.to_string(),
    }
}

async fn pair_gateways(server: &TestServer, peer_chain: &str) {
    for gateway in ["lb", "wh", "ax"] {
        server
            .post(&format!("/rails/aggregator/admin/remote-gateways/{gateway}"))
            .json(&json!({
                "caller": OWNER,
                "chain": peer_chain,
                "address": remote_address(gateway)
            }))
            .await
            .assert_status_ok();
    }
}

async fn network() -> (TestServer, TestServer) {
    let a = rail(CHAIN_A, AGGREGATOR_A, CHAIN_B, AGGREGATOR_B);
    let b = rail(CHAIN_B, AGGREGATOR_B, CHAIN_A, AGGREGATOR_A);
    pair_gateways(&a, CHAIN_B).await;
    pair_gateways(&b, CHAIN_A).await;
    (a, b)
}

async fn send(a: &TestServer, payload: &str) -> SendMessageResponse {
    let response = a
        .post("/rails/aggregator/send")
        .json(&json!({
            "sender": "0xapp",
            "destination_chain": CHAIN_B,
            "recipient": RECEIVER,
            "payload": payload,
            "attributes": [{ "key": "gasLimit", "value": "0x00000000000493e0" }]
        }))
        .await;
    response.assert_status_ok();
    response.json()
}

fn send_id(sent: &SendMessageResponse, gateway: &str) -> u64 {
    sent.fan_out
        .iter()
        .find(|f| f.gateway.as_str() == gateway)
        .map(|f| f.send_id.0)
        .unwrap()
}

/// Relay one gateway copy from rail `a` to rail `b`
async fn carry(a: &TestServer, b: &TestServer, gateway: &str, send_id: u64) -> Value {
    let delivery: Value = a
        .get(&format!("/rails/aggregator/gateways/{gateway}/outbound/{send_id}"))
        .await
        .json();
    let response = b
        .post(&format!("/rails/aggregator/deliver/{gateway}"))
        .json(&delivery)
        .await;
    response.assert_status_ok();
    response.json()
}

#[tokio::test]
async fn test_quorum_across_transports() {
    let (a, b) = network().await;
    let sent = send(&a, "0xc0ffee").await;
    assert_eq!(sent.message_id.0, 1);
    assert_eq!(sent.fan_out.len(), 3);

    // First vote: loopback
    let outcome = carry(&a, &b, "lb", send_id(&sent, "lb")).await;
    assert_eq!(outcome["status"], "collecting");
    assert_eq!(outcome["votes"], 1);
    assert_eq!(outcome["threshold"], 2);

    // Axelar only delivers once gas is paid
    let ax = send_id(&sent, "ax");
    let response = a
        .get(&format!("/rails/aggregator/gateways/ax/outbound/{ax}"))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["error_code"], "DELIVERY_NOT_READY");

    a.post(&format!("/rails/aggregator/relay/ax/{ax}"))
        .json(&json!({ "gas_budget": 300000, "payer": "0xsponsor" }))
        .await
        .assert_status_ok();

    let outcome = carry(&a, &b, "ax", ax).await;
    assert_eq!(outcome["status"], "executed");
    assert_eq!(outcome["outcome"]["result"], "succeeded");

    // Late Wormhole copy is bookkeeping only
    let outcome = carry(&a, &b, "wh", send_id(&sent, "wh")).await;
    assert_eq!(outcome["status"], "already_executed");

    let inbox: Value = b.get("/rails/aggregator/inbox").await.json();
    let inbox = inbox.as_array().unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0]["payload"], "0xc0ffee");
    assert_eq!(inbox[0]["source"]["account"], "0xapp");

    let tally: Value = b.get(&format!("/rails/aggregator/tally/{CHAIN_A}/1")).await.json();
    assert_eq!(tally["state"], "executed");
    assert_eq!(tally["votes"].as_object().unwrap().len(), 3);
}

#[tokio::test]
async fn test_replayed_delivery_counts_once() {
    let (a, b) = network().await;
    let sent = send(&a, "0x01").await;
    let lb = send_id(&sent, "lb");

    assert_eq!(carry(&a, &b, "lb", lb).await["status"], "collecting");
    assert_eq!(carry(&a, &b, "lb", lb).await["status"], "replayed");

    let tally: Value = b.get(&format!("/rails/aggregator/tally/{CHAIN_A}/1")).await.json();
    assert_eq!(tally["state"], "collecting");
    assert_eq!(tally["votes"].as_object().unwrap().len(), 1);
}

#[tokio::test]
async fn test_delivery_through_unknown_gateway_is_forbidden() {
    let (a, b) = network().await;
    let sent = send(&a, "0x01").await;
    let delivery: Value = a
        .get(&format!(
            "/rails/aggregator/gateways/lb/outbound/{}",
            send_id(&sent, "lb")
        ))
        .await
        .json();

    let response = b
        .post("/rails/aggregator/deliver/rogue")
        .json(&delivery)
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
    let body: Value = response.json();
    assert_eq!(body["error_code"], "UNTRUSTED");

    let events: Value = b.get("/rails/aggregator/events").await.json();
    assert!(events
        .as_array()
        .unwrap()
        .iter()
        .any(|e| e["event"] == "delivery_rejected"));

    // Reading the feed consumes it
    let events: Value = b.get("/rails/aggregator/events").await.json();
    assert!(events
        .as_array()
        .unwrap()
        .iter()
        .all(|e| e["event"] != "delivery_rejected"));
}

#[tokio::test]
async fn test_relay_retry_needs_more_gas() {
    let (a, _) = network().await;
    let sent = send(&a, "0x01").await;
    let ax = send_id(&sent, "ax");
    let relay = |gas: u64| json!({ "gas_budget": gas, "payer": "0xsponsor" });

    let first: Value = a
        .post(&format!("/rails/aggregator/relay/ax/{ax}"))
        .json(&relay(100_000))
        .await
        .json();
    let second: Value = a
        .post(&format!("/rails/aggregator/relay/ax/{ax}"))
        .json(&relay(200_000))
        .await
        .json();
    assert_ne!(first["handle"], second["handle"]);

    let response = a
        .post(&format!("/rails/aggregator/relay/ax/{ax}"))
        .json(&relay(200_000))
        .await;
    response.assert_status(StatusCode::CONFLICT);

    let response = a
        .post("/rails/aggregator/relay/ax/999")
        .json(&relay(1))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);

    let pending: Value = a.get("/rails/aggregator/gateways/ax/pending").await.json();
    assert_eq!(pending[0]["state"], "relayed");
    assert_eq!(pending[0]["relay_attempts"], 2);
}

#[tokio::test]
async fn test_admin_requires_owner() {
    let (a, _) = network().await;

    let response = a
        .post("/rails/aggregator/admin/threshold")
        .json(&json!({ "caller": "0xmallory", "threshold": 1 }))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["error_code"], "UNAUTHORIZED");

    // Routers are write-once unless replaced explicitly
    let response = a
        .post("/rails/aggregator/admin/routers")
        .json(&json!({ "caller": OWNER, "chain": CHAIN_B, "router": "0xdead" }))
        .await;
    response.assert_status(StatusCode::CONFLICT);

    let body: Value = a
        .post("/rails/aggregator/admin/routers")
        .json(&json!({ "caller": OWNER, "chain": CHAIN_B, "router": "0xdead", "replace": true }))
        .await
        .json();
    assert_eq!(body["previous"], AGGREGATOR_B);

    a.post("/rails/aggregator/admin/threshold")
        .json(&json!({ "caller": OWNER, "threshold": 3 }))
        .await
        .assert_status_ok();
    let response = a
        .post("/rails/aggregator/admin/threshold")
        .json(&json!({ "caller": OWNER, "threshold": 4 }))
        .await;
    response.assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_gateway_set_changes() {
    let (a, _) = network().await;

    a.post("/rails/aggregator/admin/gateways")
        .json(&json!({ "caller": OWNER, "gateway": "loopback:lb-2" }))
        .await
        .assert_status_ok();

    let response = a
        .post("/rails/aggregator/admin/gateways")
        .json(&json!({ "caller": OWNER, "gateway": "ccip" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let gateways: Value = a.get("/rails/aggregator/gateways").await.json();
    assert_eq!(gateways.as_array().unwrap().len(), 4);

    // New gateway has no remote counterpart yet, so the fan-out is refused as a whole
    let response = a
        .post("/rails/aggregator/send")
        .json(&json!({
            "sender": "0xapp",
            "destination_chain": CHAIN_B,
            "recipient": RECEIVER,
            "payload": "0x01"
        }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let pending: Value = a.get("/rails/aggregator/gateways/lb/pending").await.json();
    assert!(pending.as_array().unwrap().is_empty());

    let body: Value = a
        .post("/rails/aggregator/admin/gateways/lb-2/remove")
        .json(&json!({ "caller": OWNER }))
        .await
        .json();
    assert_eq!(body["transport"], "loopback");
    send(&a, "0x01").await;
}

#[tokio::test]
async fn test_approval_gated_gateway_needs_owner_approval() {
    let a = rail(CHAIN_A, AGGREGATOR_A, CHAIN_B, AGGREGATOR_B);
    let b = rail_with(CHAIN_B, AGGREGATOR_B, CHAIN_A, AGGREGATOR_A, Some("lb"));
    pair_gateways(&a, CHAIN_B).await;
    pair_gateways(&b, CHAIN_A).await;

    let sent = send(&a, "0x01").await;
    let delivery: Value = a
        .get(&format!(
            "/rails/aggregator/gateways/lb/outbound/{}",
            send_id(&sent, "lb")
        ))
        .await
        .json();

    // Anyone can post to /deliver, so an unapproved copy must not vote
    let response = b.post("/rails/aggregator/deliver/lb").json(&delivery).await;
    response.assert_status(StatusCode::FORBIDDEN);
    let body: Value = response.json();
    assert_eq!(body["error_code"], "UNTRUSTED");

    let approve = |caller: &str| {
        json!({
            "caller": caller,
            "delivery_id": delivery["delivery_id"].clone()
        })
    };
    b.post("/rails/aggregator/admin/approvals/lb")
        .json(&approve("0xmallory"))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    let response = b
        .post("/rails/aggregator/admin/approvals/wh")
        .json(&approve(OWNER))
        .await;
    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["error_code"], "APPROVALS_DISABLED");

    b.post("/rails/aggregator/admin/approvals/unknown")
        .json(&approve(OWNER))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let response = b
        .post("/rails/aggregator/admin/approvals/lb")
        .json(&approve(OWNER))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["added"], true);

    let outcome = carry(&a, &b, "lb", send_id(&sent, "lb")).await;
    assert_eq!(outcome["status"], "collecting");
    assert_eq!(outcome["votes"], 1);

    let info: Value = b.get("/rails/aggregator/info").await.json();
    assert_eq!(info["approval_gated"], json!(["lb"]));
}
