//! xmsg-rails-aggregator
//!
//! Axum-based HTTP service wrapping one quorum aggregator and its gateway
//! adapters. Applications send through `/send`; relayers pull outbound
//! deliveries from one rail and push them into the peer rail's `/deliver`
//! route, where the aggregator counts gateway votes and executes the
//! receiver once the threshold is met.

pub mod config;

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError};

use anyhow::Context;
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use xmsg_aggregator::{
    unix_now, Account, AdminAction, Aggregator, AggregatorConfig, AggregatorError,
    ApprovedDeliveries, Attribute, ChainId,
    CodecError, Delivery, DeliveryId, DeliveryOutcome, ErrorClass, Event, FanOut, Gateway,
    GatewayError, GatewayId, GatewayMessage, Inbox, InboxReceiver, InteropAddress,
    LifecycleConfig, LoopbackGateway, MessageId, PendingSend, ReceiveCall, ReceiverTable,
    RelayRequest, SendId, SentMessage, VoteTally, ATTR_CONSISTENCY_LEVEL, ATTR_GAS_LIMIT,
};
use xmsg_axelar_gmp::{AxelarConfig, AxelarGateway};
use xmsg_wormhole::{WormholeConfig, WormholeGateway};

use crate::config::{GatewayKind, GatewaySpec, RailConfig};

pub const RAIL_ID: &str = "XMSG_AGGREGATOR";

// ═══════════════════════════════════════════════════════════════════════════════
// STATE
// ═══════════════════════════════════════════════════════════════════════════════

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<RwLock<Aggregator>>,
    /// Calls accepted by the configured receivers
    pub inbox: Inbox,
    /// Approval sets of the gateways that verify deliveries against them
    pub approvals: Arc<RwLock<BTreeMap<GatewayId, ApprovedDeliveries>>>,
    pub config: Arc<RailConfig>,
}

impl AppState {
    pub fn new(config: RailConfig) -> anyhow::Result<Self> {
        let inbox = Inbox::default();
        let mut receivers = ReceiverTable::new();
        for account in &config.receivers {
            receivers.insert(account.clone(), InboxReceiver::new(Arc::clone(&inbox)));
        }
        if config.receivers.is_empty() {
            warn!("no receivers configured; executions will fail with no_receiver");
        }

        let mut builder = Aggregator::builder(AggregatorConfig {
            chain: config.chain.clone(),
            address: config.address.clone(),
            owner: config.owner.clone(),
            threshold: config.threshold,
        })
        .receivers(receivers);

        let mut approvals = BTreeMap::new();
        for spec in &config.gateways {
            let verifier = config
                .approved_gateways
                .contains(&spec.id)
                .then(ApprovedDeliveries::default);
            let gateway = build_gateway(
                spec,
                &config.chain,
                &config.owner,
                &config.lifecycle,
                verifier.clone(),
            )
            .with_context(|| format!("cannot create {} gateway {}", spec.kind.as_str(), spec.id))?;
            if let Some(verifier) = verifier {
                approvals.insert(GatewayId::new(spec.id.as_str()), verifier);
            }
            builder = builder.boxed_gateway(gateway);
        }
        for (chain, router) in &config.remote_routers {
            builder = builder.remote_router(chain.clone(), router.clone());
        }
        let aggregator = builder.build().context("invalid aggregator configuration")?;

        info!(
            chain = %config.chain,
            address = %config.address,
            gateways = config.gateways.len(),
            approval_gated = approvals.len(),
            threshold = config.threshold,
            "aggregator ready"
        );

        Ok(Self {
            aggregator: Arc::new(RwLock::new(aggregator)),
            inbox,
            approvals: Arc::new(RwLock::new(approvals)),
            config: Arc::new(config),
        })
    }
}

/// Instantiate the adapter described by `spec` on `chain`.
///
/// With `approvals` the adapter accepts only deliveries whose id was approved
/// in that set; otherwise it trusts the transport.
pub fn build_gateway(
    spec: &GatewaySpec,
    chain: &ChainId,
    owner: &Account,
    lifecycle: &LifecycleConfig,
    approvals: Option<ApprovedDeliveries>,
) -> Result<Box<dyn Gateway>, GatewayError> {
    let id = spec.id.as_str();
    let gateway: Box<dyn Gateway> = match spec.kind {
        GatewayKind::Axelar => {
            let gateway = AxelarGateway::with_config(
                id,
                chain,
                owner.clone(),
                AxelarConfig {
                    lifecycle: lifecycle.clone(),
                    ..AxelarConfig::default()
                },
            )?;
            match approvals {
                Some(approvals) => Box::new(gateway.with_verifier(approvals)),
                None => Box::new(gateway),
            }
        }
        GatewayKind::Wormhole => {
            let gateway = WormholeGateway::with_config(
                id,
                chain,
                owner.clone(),
                WormholeConfig {
                    lifecycle: lifecycle.clone(),
                    ..WormholeConfig::default()
                },
            )?;
            match approvals {
                Some(approvals) => Box::new(gateway.with_verifier(approvals)),
                None => Box::new(gateway),
            }
        }
        GatewayKind::Loopback => {
            let gateway = LoopbackGateway::with_config(id, chain.clone(), owner.clone(), lifecycle.clone())
                .supporting(ATTR_GAS_LIMIT)
                .supporting(ATTR_CONSISTENCY_LEVEL);
            match approvals {
                Some(approvals) => Box::new(gateway.with_verifier(approvals)),
                None => Box::new(gateway),
            }
        }
    };
    Ok(gateway)
}

// ═══════════════════════════════════════════════════════════════════════════════
// ROUTER
// ═══════════════════════════════════════════════════════════════════════════════

/// Build the router
pub fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health & info
        .route("/health", get(health))
        .route("/rails/aggregator/info", get(info))
        // Source side
        .route("/rails/aggregator/send", post(send_message))
        .route("/rails/aggregator/messages/:id", get(get_message))
        .route("/rails/aggregator/relay/:gateway/:send_id", post(request_relay))
        .route("/rails/aggregator/expire", post(expire_stale))
        // Destination side
        .route("/rails/aggregator/deliver/:gateway", post(deliver))
        .route("/rails/aggregator/validate/:gateway", post(validate_message))
        .route("/rails/aggregator/tally/:chain/:id", get(get_tally))
        .route("/rails/aggregator/inbox", get(list_inbox))
        // Gateways
        .route("/rails/aggregator/gateways", get(list_gateways))
        .route("/rails/aggregator/gateways/:gateway/pending", get(list_pending))
        .route(
            "/rails/aggregator/gateways/:gateway/outbound/:send_id",
            get(outbound_delivery),
        )
        .route("/rails/aggregator/events", get(list_events))
        // Administration
        .route("/rails/aggregator/admin/routers", post(admin_remote_router))
        .route("/rails/aggregator/admin/threshold", post(admin_set_threshold))
        .route("/rails/aggregator/admin/gateways", post(admin_add_gateway))
        .route(
            "/rails/aggregator/admin/gateways/:gateway/remove",
            post(admin_remove_gateway),
        )
        .route(
            "/rails/aggregator/admin/remote-gateways/:gateway",
            post(admin_remote_gateway),
        )
        .route(
            "/rails/aggregator/admin/approvals/:gateway",
            post(admin_approve_delivery),
        )
        .layer(cors)
        .with_state(state)
}

// ═══════════════════════════════════════════════════════════════════════════════
// HANDLERS - HEALTH & INFO
// ═══════════════════════════════════════════════════════════════════════════════

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "rail_id": RAIL_ID
    }))
}

async fn info(State(state): State<AppState>) -> impl IntoResponse {
    let aggregator = state.aggregator.read().await;
    let gateways: Vec<_> = aggregator
        .gateway_ids()
        .iter()
        .filter_map(|id| aggregator.gateway(id))
        .map(|g| {
            serde_json::json!({
                "id": g.id(),
                "transport": g.transport()
            })
        })
        .collect();

    Json(serde_json::json!({
        "rail_id": RAIL_ID,
        "chain": aggregator.chain(),
        "address": aggregator.address(),
        "threshold": aggregator.threshold(),
        "gateways": gateways,
        "remote_routers": aggregator.remote_routers(),
        "receivers": state.config.receivers,
        "approval_gated": state.approvals.read().await.keys().collect::<Vec<_>>(),
        "relay_window_secs": state.config.lifecycle.relay_window_secs,
        "max_relay_attempts": state.config.lifecycle.max_relay_attempts
    }))
}

// ═══════════════════════════════════════════════════════════════════════════════
// HANDLERS - SOURCE SIDE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub sender: Account,
    pub destination_chain: ChainId,
    pub recipient: Account,
    /// Hex-encoded payload
    pub payload: String,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendMessageResponse {
    pub message_id: MessageId,
    pub fan_out: Vec<FanOut>,
}

async fn send_message(
    State(state): State<AppState>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, ApiError> {
    let payload = parse_hex(&req.payload)?;
    let destination = InteropAddress::new(req.destination_chain, req.recipient);

    let mut aggregator = state.aggregator.write().await;
    let message_id = aggregator.send_message(req.sender, destination, payload, req.attributes)?;
    let fan_out = aggregator
        .sent_message(message_id)
        .map(|sent| sent.fan_out.clone())
        .unwrap_or_default();

    info!(message_id = message_id.0, gateways = fan_out.len(), "message fanned out");
    Ok(Json(SendMessageResponse { message_id, fan_out }))
}

async fn get_message(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<SentMessage>, ApiError> {
    let aggregator = state.aggregator.read().await;
    aggregator
        .sent_message(MessageId(id))
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError {
            status: StatusCode::NOT_FOUND,
            message: format!("Message {} not found", id),
            code: "MESSAGE_NOT_FOUND".into(),
        })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RelayBody {
    pub gas_budget: u64,
    pub payer: Account,
    /// Defaults to the payer
    pub refund_address: Option<Account>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RelayResponse {
    pub gateway: GatewayId,
    pub send_id: SendId,
    pub handle: String,
}

async fn request_relay(
    State(state): State<AppState>,
    Path((gateway, send_id)): Path<(String, u64)>,
    Json(req): Json<RelayBody>,
) -> Result<Json<RelayResponse>, ApiError> {
    let gateway = GatewayId::new(gateway);
    let send_id = SendId(send_id);
    let request = RelayRequest {
        gas_budget: req.gas_budget,
        refund_address: req.refund_address.unwrap_or_else(|| req.payer.clone()),
        payer: req.payer,
    };

    let handle = state
        .aggregator
        .write()
        .await
        .request_relay(&gateway, send_id, request)?;

    Ok(Json(RelayResponse {
        gateway,
        send_id,
        handle,
    }))
}

async fn expire_stale(State(state): State<AppState>) -> impl IntoResponse {
    let expired = state.aggregator.write().await.expire_stale(unix_now());
    Json(serde_json::json!({ "expired": expired }))
}

// ═══════════════════════════════════════════════════════════════════════════════
// HANDLERS - DESTINATION SIDE
// ═══════════════════════════════════════════════════════════════════════════════

async fn deliver(
    State(state): State<AppState>,
    Path(gateway): Path<String>,
    Json(delivery): Json<Delivery>,
) -> Result<Json<DeliveryOutcome>, ApiError> {
    let gateway = GatewayId::new(gateway);
    let outcome = state
        .aggregator
        .write()
        .await
        .deliver(&gateway, &delivery)?;
    Ok(Json(outcome))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ValidateBody {
    pub delivery_id: DeliveryId,
    pub message: GatewayMessage,
}

async fn validate_message(
    State(state): State<AppState>,
    Path(gateway): Path<String>,
    Json(req): Json<ValidateBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let gateway = GatewayId::new(gateway);
    state
        .aggregator
        .write()
        .await
        .validate_received_message(&gateway, &req.delivery_id, &req.message)?;

    Ok(Json(serde_json::json!({
        "valid": true,
        "gateway": gateway,
        "delivery_id": req.delivery_id
    })))
}

async fn get_tally(
    State(state): State<AppState>,
    Path((chain, id)): Path<(String, u64)>,
) -> Result<Json<VoteTally>, ApiError> {
    let chain = ChainId::parse(&chain)?;
    let aggregator = state.aggregator.read().await;
    Ok(Json(
        aggregator
            .tally(&chain, MessageId(id))
            .cloned()
            .unwrap_or_default(),
    ))
}

async fn list_inbox(State(state): State<AppState>) -> Json<Vec<ReceiveCall>> {
    let inbox = state.inbox.lock().unwrap_or_else(PoisonError::into_inner);
    Json(inbox.clone())
}

// ═══════════════════════════════════════════════════════════════════════════════
// HANDLERS - GATEWAYS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Serialize, Deserialize)]
pub struct GatewaySummary {
    pub id: GatewayId,
    pub transport: String,
    pub remote_gateways: BTreeMap<ChainId, String>,
    pub pending_sends: usize,
    pub executed_deliveries: usize,
}

async fn list_gateways(State(state): State<AppState>) -> Json<Vec<GatewaySummary>> {
    let aggregator = state.aggregator.read().await;
    let summaries = aggregator
        .gateway_ids()
        .iter()
        .filter_map(|id| aggregator.gateway(id))
        .map(|g| GatewaySummary {
            id: g.id().clone(),
            transport: g.transport().to_string(),
            remote_gateways: g.core().remote_gateways().clone(),
            pending_sends: g.core().pending_sends().count(),
            executed_deliveries: g.core().executed_count(),
        })
        .collect();
    Json(summaries)
}

async fn list_pending(
    State(state): State<AppState>,
    Path(gateway): Path<String>,
) -> Result<Json<Vec<PendingSend>>, ApiError> {
    let gateway = GatewayId::new(gateway);
    let aggregator = state.aggregator.read().await;
    let adapter = aggregator
        .gateway(&gateway)
        .ok_or(AggregatorError::UnknownGateway(gateway))?;
    Ok(Json(adapter.core().pending_sends().cloned().collect()))
}

async fn outbound_delivery(
    State(state): State<AppState>,
    Path((gateway, send_id)): Path<(String, u64)>,
) -> Result<Json<Delivery>, ApiError> {
    let gateway = GatewayId::new(gateway);
    let aggregator = state.aggregator.read().await;
    if aggregator.gateway(&gateway).is_none() {
        return Err(AggregatorError::UnknownGateway(gateway).into());
    }
    aggregator
        .outbound_delivery(&gateway, SendId(send_id))
        .map(Json)
        .ok_or_else(|| ApiError {
            status: StatusCode::NOT_FOUND,
            message: format!("No deliverable message for send {} on {}", send_id, gateway),
            code: "DELIVERY_NOT_READY".into(),
        })
}

/// Hand buffered events to the caller and clear them from the aggregator
async fn list_events(State(state): State<AppState>) -> Json<Vec<Event>> {
    let mut aggregator = state.aggregator.write().await;
    Json(aggregator.drain_events())
}

// ═══════════════════════════════════════════════════════════════════════════════
// HANDLERS - ADMINISTRATION
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Serialize, Deserialize)]
pub struct RemoteRouterBody {
    pub caller: Account,
    pub chain: ChainId,
    pub router: Account,
    /// Replace an existing entry instead of registering a new one
    #[serde(default)]
    pub replace: bool,
}

async fn admin_remote_router(
    State(state): State<AppState>,
    Json(req): Json<RemoteRouterBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut aggregator = state.aggregator.write().await;
    let previous = if req.replace {
        Some(aggregator.replace_remote_router(&req.caller, req.chain.clone(), req.router.clone())?)
    } else {
        aggregator.register_remote_router(&req.caller, req.chain.clone(), req.router.clone())?;
        None
    };

    Ok(Json(serde_json::json!({
        "success": true,
        "chain": req.chain,
        "router": req.router,
        "previous": previous
    })))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ThresholdBody {
    pub caller: Account,
    pub threshold: usize,
}

async fn admin_set_threshold(
    State(state): State<AppState>,
    Json(req): Json<ThresholdBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut aggregator = state.aggregator.write().await;
    let executed = aggregator.set_threshold(&req.caller, req.threshold)?;
    Ok(Json(serde_json::json!({
        "success": true,
        "threshold": aggregator.threshold(),
        "executed": executed
    })))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddGatewayBody {
    pub caller: Account,
    /// `kind[:id]`, as in `XMSG_GATEWAYS`
    pub gateway: String,
    /// Accept only deliveries approved through `/admin/approvals`
    #[serde(default)]
    pub approvals: bool,
}

async fn admin_add_gateway(
    State(state): State<AppState>,
    Json(req): Json<AddGatewayBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let spec: GatewaySpec = req.gateway.parse().map_err(|e: config::SpecError| ApiError {
        status: StatusCode::BAD_REQUEST,
        message: e.to_string(),
        code: "INVALID_GATEWAY".into(),
    })?;
    let verifier = req.approvals.then(ApprovedDeliveries::default);
    let gateway = build_gateway(
        &spec,
        &state.config.chain,
        &state.config.owner,
        &state.config.lifecycle,
        verifier.clone(),
    )
    .map_err(|source| AggregatorError::Gateway {
        gateway: GatewayId::new(spec.id.as_str()),
        source,
    })?;

    state
        .aggregator
        .write()
        .await
        .add_gateway(&req.caller, gateway)?;
    if let Some(verifier) = verifier {
        state
            .approvals
            .write()
            .await
            .insert(GatewayId::new(spec.id.as_str()), verifier);
    }

    Ok(Json(serde_json::json!({
        "success": true,
        "gateway": spec.id,
        "transport": spec.kind.as_str()
    })))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CallerBody {
    pub caller: Account,
}

async fn admin_remove_gateway(
    State(state): State<AppState>,
    Path(gateway): Path<String>,
    Json(req): Json<CallerBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let gateway = GatewayId::new(gateway);
    let removed = state
        .aggregator
        .write()
        .await
        .remove_gateway(&req.caller, &gateway)?;
    state.approvals.write().await.remove(&gateway);

    Ok(Json(serde_json::json!({
        "success": true,
        "gateway": gateway,
        "transport": removed.transport()
    })))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RemoteGatewayBody {
    pub caller: Account,
    pub chain: ChainId,
    pub address: String,
    #[serde(default)]
    pub replace: bool,
}

async fn admin_remote_gateway(
    State(state): State<AppState>,
    Path(gateway): Path<String>,
    Json(req): Json<RemoteGatewayBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let gateway = GatewayId::new(gateway);
    let mut aggregator = state.aggregator.write().await;
    let previous = if req.replace {
        Some(aggregator.replace_remote_gateway(&req.caller, &gateway, req.chain.clone(), &req.address)?)
    } else {
        aggregator.register_remote_gateway(&req.caller, &gateway, req.chain.clone(), &req.address)?;
        None
    };

    Ok(Json(serde_json::json!({
        "success": true,
        "gateway": gateway,
        "chain": req.chain,
        "previous": previous
    })))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApproveDeliveryBody {
    pub caller: Account,
    pub delivery_id: DeliveryId,
}

/// Approve one delivery id on a gateway configured with an approval set
async fn admin_approve_delivery(
    State(state): State<AppState>,
    Path(gateway): Path<String>,
    Json(req): Json<ApproveDeliveryBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let gateway = GatewayId::new(gateway);
    {
        let aggregator = state.aggregator.read().await;
        aggregator.authorize(&req.caller, AdminAction::ApproveDelivery)?;
        if aggregator.gateway(&gateway).is_none() {
            return Err(AggregatorError::UnknownGateway(gateway).into());
        }
    }

    let approvals = state.approvals.read().await;
    let Some(approved) = approvals.get(&gateway) else {
        return Err(ApiError {
            status: StatusCode::CONFLICT,
            message: format!("Gateway {} trusts its transport and takes no approvals", gateway),
            code: "APPROVALS_DISABLED".into(),
        });
    };
    let added = approved.approve(req.delivery_id.clone());
    info!(%gateway, delivery_id = %req.delivery_id, added, "delivery approved");

    Ok(Json(serde_json::json!({
        "success": true,
        "gateway": gateway,
        "delivery_id": req.delivery_id,
        "added": added
    })))
}

// ═══════════════════════════════════════════════════════════════════════════════
// ERROR HANDLING
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub code: String,
}

impl From<AggregatorError> for ApiError {
    fn from(err: AggregatorError) -> Self {
        let (status, code) = match &err {
            AggregatorError::Unauthorized { .. }
            | AggregatorError::Gateway {
                source: GatewayError::Unauthorized(_),
                ..
            } => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            AggregatorError::UnknownRoute(_) => (StatusCode::NOT_FOUND, "UNKNOWN_ROUTE"),
            AggregatorError::UnknownGateway(_) => (StatusCode::NOT_FOUND, "UNKNOWN_GATEWAY"),
            AggregatorError::Gateway {
                source: GatewayError::UnknownSend(_),
                ..
            } => (StatusCode::NOT_FOUND, "UNKNOWN_SEND"),
            other => match other.class() {
                ErrorClass::Routing => (StatusCode::BAD_REQUEST, "ROUTING_ERROR"),
                ErrorClass::Trust => (StatusCode::FORBIDDEN, "UNTRUSTED"),
                ErrorClass::Admin => (StatusCode::CONFLICT, "ADMIN_ERROR"),
                ErrorClass::Malformed => (StatusCode::BAD_REQUEST, "MALFORMED"),
                ErrorClass::Lifecycle => (StatusCode::CONFLICT, "LIFECYCLE_ERROR"),
            },
        };

        if status == StatusCode::FORBIDDEN || status == StatusCode::UNAUTHORIZED {
            warn!(code, error = %err, "request refused");
        }

        Self {
            status,
            message: err.to_string(),
            code: code.into(),
        }
    }
}

impl From<CodecError> for ApiError {
    fn from(err: CodecError) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: err.to_string(),
            code: "MALFORMED".into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({
            "error": self.message,
            "error_code": self.code,
        });
        (self.status, Json(body)).into_response()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

fn parse_hex(hex: &str) -> Result<Vec<u8>, ApiError> {
    let hex = hex.strip_prefix("0x").unwrap_or(hex);
    hex::decode(hex).map_err(|e| ApiError {
        status: StatusCode::BAD_REQUEST,
        message: format!("Invalid hex: {}", e),
        code: "INVALID_HEX".into(),
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// MAIN ENTRY POINT
// ═══════════════════════════════════════════════════════════════════════════════

pub mod main_entry {
    use super::*;
    use std::net::SocketAddr;
    use std::time::Duration;

    const EXPIRY_INTERVAL: Duration = Duration::from_secs(60);

    pub async fn run_server(config: RailConfig) -> anyhow::Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
        let state = AppState::new(config)?;

        // Sweep sends that outlived the relay window
        let aggregator = Arc::clone(&state.aggregator);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(EXPIRY_INTERVAL);
            loop {
                ticker.tick().await;
                let expired = aggregator.write().await.expire_stale(unix_now());
                if !expired.is_empty() {
                    info!(count = expired.len(), "expired stale sends");
                }
            }
        });

        info!("Aggregator rail listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("cannot bind {addr}"))?;
        axum::serve(listener, app_router(state))
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                info!("Shutting down aggregator rail...");
            })
            .await?;
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
