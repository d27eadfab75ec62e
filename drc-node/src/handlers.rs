//! Axum route handlers exposing the coordinator as a JSON API.
//!
//! Mutating routes take the acting account from the `x-caller` header and the
//! transaction gas price, in wei, from `x-gas-price` (default `0`). Every
//! coordinator operation runs on a blocking thread, since fulfillment may
//! wait on a callback webhook.

use std::str::FromStr;
use std::sync::Arc;

use alloy_primitives::{Address, B256, Bytes, I256, U256};
use axum::extract::{FromRequestParts, Path, State};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::routing::{get, post};
use axum::{Json, Router};
use drc::events::CoordinatorEvent;
use drc::feed::{FeedSettings, RateQuote};
use drc::memory::MemoryHost;
use drc::request::{DataRequest, FulfillConfig, FulfillOutcome, Tx};
use drc::spec::{FeeType, Spec, SpecKey};
use drc::{Coordinator, CoordinatorError};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};

use crate::error::NodeError;

/// Shared application state: the hosted coordinator.
pub type NodeState = Arc<Coordinator<MemoryHost>>;

/// Header naming the acting account.
pub const CALLER_HEADER: &str = "x-caller";

/// Header carrying the transaction gas price in wei.
pub const GAS_PRICE_HEADER: &str = "x-gas-price";

/// Transaction context extracted from the request headers.
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub Tx);

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = NodeError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let sender: Address =
            header(parts, CALLER_HEADER)?.ok_or(NodeError::Header(CALLER_HEADER))?;
        let gas_price: U256 = header(parts, GAS_PRICE_HEADER)?.unwrap_or_default();
        Ok(Self(Tx::new(sender).with_gas_price(gas_price)))
    }
}

fn header<T: FromStr>(parts: &Parts, name: &'static str) -> Result<Option<T>, NodeError> {
    parts
        .headers
        .get(name)
        .map(|value| {
            value
                .to_str()
                .ok()
                .and_then(|s| s.trim().parse().ok())
                .ok_or(NodeError::Header(name))
        })
        .transpose()
}

/// Runs `op` against the coordinator on a blocking thread.
async fn run<T, F>(state: &NodeState, op: F) -> Result<T, NodeError>
where
    T: Send + 'static,
    F: FnOnce(&Coordinator<MemoryHost>) -> Result<T, CoordinatorError> + Send + 'static,
{
    let coordinator = Arc::clone(state);
    Ok(tokio::task::spawn_blocking(move || op(&coordinator)).await??)
}

/// A stored Spec with its key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecEntry {
    /// Registry key.
    pub key: SpecKey,
    /// Stored record.
    pub spec: Spec,
}

/// Body of the consumer routes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumersBody {
    /// Affected addresses.
    pub consumers: Vec<Address>,
}

/// Body of `POST /funds`.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddFundsBody {
    /// Credited account.
    pub beneficiary: Address,
    /// Deposited amount.
    #[serde_as(as = "DisplayFromStr")]
    pub amount: U256,
}

/// Body of `POST /funds/withdraw`.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawBody {
    /// Debited account.
    pub from: Address,
    /// Token recipient.
    pub to: Address,
    /// Withdrawn amount.
    #[serde_as(as = "DisplayFromStr")]
    pub amount: U256,
}

/// Available balance of an account.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundsResponse {
    /// Account.
    pub address: Address,
    /// Available balance.
    #[serde_as(as = "DisplayFromStr")]
    pub available: U256,
}

/// Response of `POST /requests`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestCreatedResponse {
    /// Identifier of the new request.
    pub request_id: B256,
}

/// Body of `POST /requests/{id}/fulfill`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FulfillBody {
    /// Result data passed to the callback.
    #[serde(default)]
    pub data: Bytes,
}

/// Body of `POST /pricing/max`.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaxPaymentBody {
    /// Gas price in wei.
    #[serde_as(as = "DisplayFromStr")]
    pub gas_price: U256,
    /// Amount already escrowed.
    #[serde_as(as = "DisplayFromStr")]
    #[serde(default)]
    pub escrowed: U256,
    /// Callback gas limit.
    pub gas_limit: u64,
    /// Fee interpretation.
    pub fee_type: FeeType,
    /// Fee.
    #[serde_as(as = "DisplayFromStr")]
    pub fee: U256,
}

/// Body of `POST /pricing/spot`.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotPaymentBody {
    /// Gas the callback consumed.
    pub gas_consumed: u64,
    /// Gas price in wei.
    #[serde_as(as = "DisplayFromStr")]
    pub gas_price: U256,
    /// Amount already escrowed.
    #[serde_as(as = "DisplayFromStr")]
    #[serde(default)]
    pub escrowed: U256,
    /// Fee interpretation.
    pub fee_type: FeeType,
    /// Fee.
    #[serde_as(as = "DisplayFromStr")]
    pub fee: U256,
}

/// A signed payment amount; negative values are refunds.
#[serde_as]
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AmountResponse {
    /// Amount in payment-token units.
    #[serde_as(as = "DisplayFromStr")]
    pub amount: I256,
}

/// Response of `GET /feed/settings`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedSettingsResponse {
    /// Owner-tunable adapter settings.
    #[serde(flatten)]
    pub settings: FeedSettings,
    /// Whether a sequencer uptime feed gates the rate.
    pub sequencer_dependant: bool,
}

/// Body of `POST /admin/ownership`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TransferOwnershipBody {
    /// Proposed owner.
    pub to: Address,
}

/// `GET /health`
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `GET /specs` - Lists every stored Spec.
///
/// # Errors
///
/// Only if the worker dies.
pub async fn list_specs(State(state): State<NodeState>) -> Result<Json<Vec<SpecEntry>>, NodeError> {
    let entries = run(&state, |c| {
        let mut entries = Vec::new();
        for key in c.get_spec_keys() {
            entries.push(SpecEntry {
                key,
                spec: c.get_spec(key)?,
            });
        }
        Ok(entries)
    })
    .await?;
    Ok(Json(entries))
}

/// `GET /specs/{key}`
///
/// # Errors
///
/// Returns 404 if no Spec is stored under `key`.
pub async fn get_spec(
    State(state): State<NodeState>,
    Path(key): Path<SpecKey>,
) -> Result<Json<Spec>, NodeError> {
    Ok(Json(run(&state, move |c| c.get_spec(key)).await?))
}

/// `PUT /specs` - Inserts or replaces Specs under their derived keys.
///
/// # Errors
///
/// Returns 403 for a non-owner and 400 for an invalid Spec.
pub async fn put_specs(
    State(state): State<NodeState>,
    Caller(tx): Caller,
    Json(specs): Json<Vec<Spec>>,
) -> Result<Json<Vec<SpecKey>>, NodeError> {
    let keys: Vec<SpecKey> = specs.iter().map(Spec::key).collect();
    let stored = keys.clone();
    run(&state, move |c| c.set_specs(tx, &keys, &specs)).await?;
    Ok(Json(stored))
}

/// `DELETE /specs/{key}` - Removes a Spec and its consumer set.
///
/// # Errors
///
/// Returns 403 for a non-owner and 404 for an unknown key.
pub async fn delete_spec(
    State(state): State<NodeState>,
    Caller(tx): Caller,
    Path(key): Path<SpecKey>,
) -> Result<StatusCode, NodeError> {
    run(&state, move |c| c.remove_spec(tx, key)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /specs/{key}/consumers`
///
/// # Errors
///
/// Returns 404 for an unknown key.
pub async fn get_consumers(
    State(state): State<NodeState>,
    Path(key): Path<SpecKey>,
) -> Result<Json<ConsumersBody>, NodeError> {
    let consumers = run(&state, move |c| c.get_authorized_consumers(key)).await?;
    Ok(Json(ConsumersBody { consumers }))
}

/// `POST /specs/{key}/consumers`
///
/// # Errors
///
/// Returns 403 for a non-owner, 404 for an unknown key.
pub async fn add_consumers(
    State(state): State<NodeState>,
    Caller(tx): Caller,
    Path(key): Path<SpecKey>,
    Json(body): Json<ConsumersBody>,
) -> Result<StatusCode, NodeError> {
    run(&state, move |c| {
        c.add_authorized_consumers(tx, key, &body.consumers)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /specs/{key}/consumers`
///
/// # Errors
///
/// Returns 409 if an address is not a member.
pub async fn remove_consumers(
    State(state): State<NodeState>,
    Caller(tx): Caller,
    Path(key): Path<SpecKey>,
    Json(body): Json<ConsumersBody>,
) -> Result<StatusCode, NodeError> {
    run(&state, move |c| {
        c.remove_authorized_consumers(tx, key, &body.consumers)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /funds/{address}`
///
/// # Errors
///
/// Only if the worker dies.
pub async fn get_funds(
    State(state): State<NodeState>,
    Path(address): Path<Address>,
) -> Result<Json<FundsResponse>, NodeError> {
    let available = run(&state, move |c| Ok(c.available_funds(address))).await?;
    Ok(Json(FundsResponse { address, available }))
}

/// `POST /funds` - Deposits tokens from the caller.
///
/// # Errors
///
/// Returns 402 naming the short allowance or token balance.
pub async fn add_funds(
    State(state): State<NodeState>,
    Caller(tx): Caller,
    Json(body): Json<AddFundsBody>,
) -> Result<StatusCode, NodeError> {
    run(&state, move |c| c.add_funds(tx, body.beneficiary, body.amount)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /funds/withdraw`
///
/// # Errors
///
/// Returns 403 if the caller may not debit `from`, 402 if it is short.
pub async fn withdraw_funds(
    State(state): State<NodeState>,
    Caller(tx): Caller,
    Json(body): Json<WithdrawBody>,
) -> Result<StatusCode, NodeError> {
    run(&state, move |c| {
        c.withdraw_funds(tx, body.from, body.to, body.amount)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /requests` - Creates a data request.
///
/// # Errors
///
/// Returns the coordinator's rejection mapped to its status.
pub async fn create_request(
    State(state): State<NodeState>,
    Caller(tx): Caller,
    Json(request): Json<DataRequest>,
) -> Result<(StatusCode, Json<RequestCreatedResponse>), NodeError> {
    let request_id = run(&state, move |c| c.request_data(tx, &request)).await?;
    Ok((StatusCode::CREATED, Json(RequestCreatedResponse { request_id })))
}

/// `GET /requests/{id}`
///
/// # Errors
///
/// Returns 404 if the request is not pending.
pub async fn get_request(
    State(state): State<NodeState>,
    Path(id): Path<B256>,
) -> Result<Json<FulfillConfig>, NodeError> {
    let record = run(&state, move |c| {
        c.pending_request(id)
            .ok_or(CoordinatorError::RequestIsNotPending(id))
    })
    .await?;
    Ok(Json(record))
}

/// `POST /requests/{id}/fulfill` - Delivers the answer and settles.
///
/// # Errors
///
/// Returns the coordinator's rejection mapped to its status; a failed
/// callback is a successful response with `success == false`.
pub async fn fulfill_request(
    State(state): State<NodeState>,
    Caller(tx): Caller,
    Path(id): Path<B256>,
    Json(body): Json<FulfillBody>,
) -> Result<Json<FulfillOutcome>, NodeError> {
    Ok(Json(
        run(&state, move |c| c.fulfill_data(tx, id, body.data)).await?,
    ))
}

/// `POST /requests/{id}/cancel`
///
/// # Errors
///
/// Returns 409 before expiration and 403 for anyone but the requester.
pub async fn cancel_request(
    State(state): State<NodeState>,
    Caller(tx): Caller,
    Path(id): Path<B256>,
) -> Result<StatusCode, NodeError> {
    run(&state, move |c| c.cancel_request(tx, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /feed/rate`
///
/// # Errors
///
/// Returns 500 if a feed answers a non-positive price.
pub async fn feed_rate(State(state): State<NodeState>) -> Result<Json<RateQuote>, NodeError> {
    Ok(Json(run(&state, Coordinator::get_feed_quote).await?))
}

/// `GET /feed/settings`
///
/// # Errors
///
/// Only if the worker dies.
pub async fn feed_settings(
    State(state): State<NodeState>,
) -> Result<Json<FeedSettingsResponse>, NodeError> {
    let response = run(&state, |c| {
        Ok(FeedSettingsResponse {
            settings: c.get_feed_settings(),
            sequencer_dependant: c.is_sequencer_dependant(),
        })
    })
    .await?;
    Ok(Json(response))
}

/// `POST /pricing/max`
///
/// # Errors
///
/// Returns 500 on overflow or an unreadable feed.
pub async fn max_payment(
    State(state): State<NodeState>,
    Json(body): Json<MaxPaymentBody>,
) -> Result<Json<AmountResponse>, NodeError> {
    let amount = run(&state, move |c| {
        c.calculate_max_payment_amount(
            body.gas_price,
            body.escrowed,
            body.gas_limit,
            body.fee_type,
            body.fee,
        )
    })
    .await?;
    Ok(Json(AmountResponse { amount }))
}

/// `POST /pricing/spot`
///
/// # Errors
///
/// Returns 500 on overflow or an unreadable feed.
pub async fn spot_payment(
    State(state): State<NodeState>,
    Json(body): Json<SpotPaymentBody>,
) -> Result<Json<AmountResponse>, NodeError> {
    let amount = run(&state, move |c| {
        c.calculate_spot_payment_amount(
            body.gas_consumed,
            body.gas_price,
            body.escrowed,
            body.fee_type,
            body.fee,
        )
    })
    .await?;
    Ok(Json(AmountResponse { amount }))
}

/// `POST /admin/pause`
///
/// # Errors
///
/// Returns 403 for a non-owner, 409 if already paused.
pub async fn pause(
    State(state): State<NodeState>,
    Caller(tx): Caller,
) -> Result<StatusCode, NodeError> {
    run(&state, move |c| c.pause(tx)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /admin/unpause`
///
/// # Errors
///
/// Returns 403 for a non-owner, 409 if not paused.
pub async fn unpause(
    State(state): State<NodeState>,
    Caller(tx): Caller,
) -> Result<StatusCode, NodeError> {
    run(&state, move |c| c.unpause(tx)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /admin/ownership` - Proposes a new owner.
///
/// # Errors
///
/// Returns 403 for a non-owner.
pub async fn transfer_ownership(
    State(state): State<NodeState>,
    Caller(tx): Caller,
    Json(body): Json<TransferOwnershipBody>,
) -> Result<StatusCode, NodeError> {
    run(&state, move |c| c.transfer_ownership(tx, body.to)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /admin/ownership/accept`
///
/// # Errors
///
/// Returns 403 unless the caller is the proposed owner.
pub async fn accept_ownership(
    State(state): State<NodeState>,
    Caller(tx): Caller,
) -> Result<StatusCode, NodeError> {
    run(&state, move |c| c.accept_ownership(tx)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /events` - Drains the event journal.
///
/// # Errors
///
/// Only if the worker dies.
pub async fn drain_events(
    State(state): State<NodeState>,
) -> Result<Json<Vec<CoordinatorEvent>>, NodeError> {
    Ok(Json(run(&state, |c| Ok(c.drain_events())).await?))
}

/// Creates an Axum [`Router`] with all coordinator endpoints.
pub fn coordinator_router(state: NodeState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/specs", get(list_specs).put(put_specs))
        .route("/specs/{key}", get(get_spec).delete(delete_spec))
        .route(
            "/specs/{key}/consumers",
            get(get_consumers)
                .post(add_consumers)
                .delete(remove_consumers),
        )
        .route("/funds", post(add_funds))
        .route("/funds/withdraw", post(withdraw_funds))
        .route("/funds/{address}", get(get_funds))
        .route("/requests", post(create_request))
        .route("/requests/{id}", get(get_request))
        .route("/requests/{id}/fulfill", post(fulfill_request))
        .route("/requests/{id}/cancel", post(cancel_request))
        .route("/feed/rate", get(feed_rate))
        .route("/feed/settings", get(feed_settings))
        .route("/pricing/max", post(max_payment))
        .route("/pricing/spot", post(spot_payment))
        .route("/admin/pause", post(pause))
        .route("/admin/unpause", post(unpause))
        .route("/admin/ownership", post(transfer_ownership))
        .route("/admin/ownership/accept", post(accept_ownership))
        .route("/events", get(drain_events))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap;
    use crate::config::NodeConfig;
    use tokio::runtime::Handle;
    use tokio_util::sync::CancellationToken;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const OWNER: &str = "0x0000000000000000000000000000000000000001";
    const OPERATOR: &str = "0x00000000000000000000000000000000000000a1";
    const REQUESTER: &str = "0x000000000000000000000000000000000000a11c";
    const CALLBACK: &str = "0x00000000000000000000000000000000000000b1";
    const SPEC_ID: &str = "0x5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e";
    const GAS_PRICE: &str = "30000000000";

    fn config(webhook: &str) -> NodeConfig {
        NodeConfig::parse(&format!(
            r#"
[coordinator]
address = "0x00000000000000000000000000000000000000c0"
owner = "{OWNER}"

[[accounts]]
address = "{REQUESTER}"
mint = "100000000000000000000"
allowance = "100000000000000000000"

[[contracts]]
address = "{OPERATOR}"

[[contracts]]
address = "{CALLBACK}"
webhook = "{webhook}"

[[specs]]
specId = "{SPEC_ID}"
operator = "{OPERATOR}"
payment = "100000000000000000"
paymentType = "FLAT"
fee = "10000000000000000"
feeType = "FLAT"
gasLimit = 1000000
minConfirmations = 3
"#
        ))
        .unwrap()
    }

    async fn serve(config: &NodeConfig) -> String {
        let state =
            bootstrap::build(config, Handle::current(), CancellationToken::new()).unwrap();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, coordinator_router(state)).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_request_lifecycle_over_http() {
        let consumer = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/callback"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "gasUsed": 90_000,
            })))
            .expect(1)
            .mount(&consumer)
            .await;
        let base = serve(&config(&format!("{}/callback", consumer.uri()))).await;
        let client = reqwest::Client::new();

        let specs: serde_json::Value = client
            .get(format!("{base}/specs"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(specs.as_array().unwrap().len(), 1);

        let funded = client
            .post(format!("{base}/funds"))
            .header(CALLER_HEADER, REQUESTER)
            .json(&serde_json::json!({
                "beneficiary": REQUESTER,
                "amount": "10000000000000000000",
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(funded.status(), StatusCode::NO_CONTENT);

        let created = client
            .post(format!("{base}/requests"))
            .header(CALLER_HEADER, REQUESTER)
            .header(GAS_PRICE_HEADER, GAS_PRICE)
            .json(&serde_json::json!({
                "operator": OPERATOR,
                "specId": SPEC_ID,
                "callbackAddress": CALLBACK,
                "callbackSelector": "0xdeadbeef",
                "callbackGasLimit": 500_000,
                "minConfirmations": 3,
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(created.status(), StatusCode::CREATED);
        let created: RequestCreatedResponse = created.json().await.unwrap();
        let id = created.request_id;

        let pending = client
            .get(format!("{base}/requests/{id}"))
            .send()
            .await
            .unwrap();
        assert_eq!(pending.status(), StatusCode::OK);

        let outcome: serde_json::Value = client
            .post(format!("{base}/requests/{id}/fulfill"))
            .header(CALLER_HEADER, OPERATOR)
            .header(GAS_PRICE_HEADER, GAS_PRICE)
            .json(&serde_json::json!({ "data": "0x2a" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(outcome["success"], true);
        assert_eq!(outcome["gasCharged"], 90_000);

        let gone = client
            .get(format!("{base}/requests/{id}"))
            .send()
            .await
            .unwrap();
        assert_eq!(gone.status(), StatusCode::NOT_FOUND);

        let events: Vec<CoordinatorEvent> = client
            .get(format!("{base}/events"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(events.iter().any(|event| matches!(
            event,
            CoordinatorEvent::RequestFulfilled { success: true, .. }
        )));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_errors_map_to_status_codes() {
        let base = serve(&config("http://127.0.0.1:9/callback")).await;
        let client = reqwest::Client::new();

        let anonymous = client
            .post(format!("{base}/admin/pause"))
            .send()
            .await
            .unwrap();
        assert_eq!(anonymous.status(), StatusCode::BAD_REQUEST);

        let stranger = client
            .post(format!("{base}/admin/pause"))
            .header(CALLER_HEADER, REQUESTER)
            .send()
            .await
            .unwrap();
        assert_eq!(stranger.status(), StatusCode::FORBIDDEN);
        let body: serde_json::Value = stranger.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("not the owner"));

        let broke = client
            .post(format!("{base}/requests"))
            .header(CALLER_HEADER, REQUESTER)
            .header(GAS_PRICE_HEADER, GAS_PRICE)
            .json(&serde_json::json!({
                "operator": OPERATOR,
                "specId": SPEC_ID,
                "callbackAddress": CALLBACK,
                "callbackSelector": "0xdeadbeef",
                "callbackGasLimit": 500_000,
                "minConfirmations": 3,
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(broke.status(), StatusCode::PAYMENT_REQUIRED);

        let paused = client
            .post(format!("{base}/admin/pause"))
            .header(CALLER_HEADER, OWNER)
            .send()
            .await
            .unwrap();
        assert_eq!(paused.status(), StatusCode::NO_CONTENT);
        let again = client
            .post(format!("{base}/admin/pause"))
            .header(CALLER_HEADER, OWNER)
            .send()
            .await
            .unwrap();
        assert_eq!(again.status(), StatusCode::CONFLICT);

        let rate: RateQuote = client
            .get(format!("{base}/feed/rate"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(rate.fallback.is_some());

        let settings: FeedSettingsResponse = client
            .get(format!("{base}/feed/settings"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(settings.settings.fallback_rate, rate.rate);
        assert!(!settings.sequencer_dependant);
    }
}
