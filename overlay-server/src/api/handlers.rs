//! HTTP request handlers
//!
//! Ids arrive as `?id=` query parameters. A missing or non-numeric id on a
//! moderation route is answered as not found, the same as an unknown id.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use overlay_common::models::{QuestState, RequestItem, TtsItem};
use overlay_common::OverlayEvent;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::catalog::CatalogFile;
use crate::error::{ApiError, ApiResult};
use crate::history::DonationRecord;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    service: String,
    version: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    status: String,
}

impl StatusResponse {
    fn ok() -> Json<Self> {
        Json(Self {
            status: "ok".to_string(),
        })
    }
}

/// Direct broadcast result
#[derive(Debug, Serialize)]
pub struct DeliveredResponse {
    delivered: usize,
}

#[derive(Debug, Serialize)]
pub struct ClientsResponse {
    clients: usize,
}

#[derive(Debug, Serialize)]
pub struct RehydrateResponse {
    broadcasts: usize,
}

/// `?id=` for routes keyed by a string id
#[derive(Debug, Deserialize)]
pub struct IdQuery {
    #[serde(default)]
    id: String,
}

/// `?id=` for routes keyed by a numeric id
#[derive(Debug, Deserialize)]
pub struct SeqIdQuery {
    id: Option<String>,
}

impl SeqIdQuery {
    fn parse(&self, kind: &str) -> ApiResult<u64> {
        let raw = self.id.as_deref().unwrap_or("");
        raw.trim()
            .parse()
            .map_err(|_| ApiError::NotFound(format!("{} id {:?} is unknown", kind, raw)))
    }
}

#[derive(Debug, Deserialize)]
pub struct DonationQuery {
    #[serde(default)]
    donor: String,
    amount_cents: Option<String>,
    #[serde(default)]
    msg: String,
}

#[derive(Debug, Deserialize)]
pub struct TestTtsQuery {
    #[serde(default)]
    text: String,
    #[serde(default)]
    voice: String,
}

#[derive(Debug, Deserialize)]
pub struct TtsSubmitQuery {
    #[serde(default)]
    text: String,
    #[serde(default)]
    voice: String,
    #[serde(default)]
    donor: String,
    amount_cents: Option<String>,
    #[serde(default)]
    msg: String,
}

#[derive(Debug, Deserialize)]
pub struct RequestSubmitQuery {
    #[serde(default)]
    board: String,
    #[serde(default)]
    phone: String,
    #[serde(default)]
    note: String,
}

/// Unparsable or missing amounts count as zero
fn parse_amount(raw: Option<&str>) -> i64 {
    raw.and_then(|v| v.trim().parse().ok()).unwrap_or(0)
}

// ============================================================================
// Service Endpoints
// ============================================================================

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "stream-overlay".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /api/debug/clients
pub async fn debug_clients(State(state): State<AppState>) -> Json<ClientsResponse> {
    Json(ClientsResponse {
        clients: state.hub.clients_count().await,
    })
}

// ============================================================================
// Catalog and Direct Broadcasts
// ============================================================================

/// GET /api/catalog
pub async fn get_catalog(State(state): State<AppState>) -> Json<CatalogFile> {
    Json(state.catalog.to_file())
}

/// POST /api/catalog/reload
pub async fn reload_catalog(State(state): State<AppState>) -> ApiResult<Json<CatalogFile>> {
    state.catalog.reload()?;
    Ok(Json(state.catalog.to_file()))
}

/// GET /api/ability/fire?id=
pub async fn fire_ability(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> ApiResult<Json<DeliveredResponse>> {
    let ability = state
        .catalog()
        .ability(&query.id)
        .ok_or_else(|| ApiError::NotFound(format!("unknown ability id {:?}", query.id)))?;

    info!("Firing ability {}", ability.id);
    let delivered = state
        .hub
        .broadcast(&OverlayEvent::ability_fire(&ability))
        .await;
    Ok(Json(DeliveredResponse { delivered }))
}

/// GET /api/donation?donor=&amount_cents=&msg=
pub async fn send_donation(
    State(state): State<AppState>,
    Query(query): Query<DonationQuery>,
) -> Json<DeliveredResponse> {
    let event = OverlayEvent::Donation {
        donor: query.donor,
        amount: parse_amount(query.amount_cents.as_deref()),
        msg: query.msg,
    };
    let delivered = state.hub.broadcast(&event).await;
    Json(DeliveredResponse { delivered })
}

/// GET /api/test/tts?text=&voice= (bypasses moderation)
pub async fn test_tts(
    State(state): State<AppState>,
    Query(query): Query<TestTtsQuery>,
) -> ApiResult<Json<DeliveredResponse>> {
    if query.text.trim().is_empty() {
        return Err(ApiError::BadRequest("missing ?text=".to_string()));
    }
    let event = OverlayEvent::TtsPlay {
        text: query.text,
        voice: query.voice,
    };
    let delivered = state.hub.broadcast(&event).await;
    Ok(Json(DeliveredResponse { delivered }))
}

// ============================================================================
// Quest Endpoints
// ============================================================================

/// GET /api/quest/add?id= - activate a catalog quest
pub async fn quest_add(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> ApiResult<Json<QuestState>> {
    let def = state
        .catalog()
        .quest(&query.id)
        .ok_or_else(|| ApiError::NotFound(format!("unknown quest id {:?}", query.id)))?;
    Ok(Json(state.quests.upsert(&def).await))
}

/// GET /api/quest/active
pub async fn quest_active(State(state): State<AppState>) -> Json<Vec<QuestState>> {
    Json(state.quests.list().await)
}

/// POST /api/quest/inc?id=
pub async fn quest_inc(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> ApiResult<Json<QuestState>> {
    Ok(Json(state.quests.increment(&query.id).await?))
}

/// POST /api/quest/reset?id=
pub async fn quest_reset(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> ApiResult<Json<QuestState>> {
    Ok(Json(state.quests.reset(&query.id).await?))
}

/// POST /api/quest/remove?id=
pub async fn quest_remove(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> ApiResult<Json<StatusResponse>> {
    state.quests.remove(&query.id).await?;
    Ok(StatusResponse::ok())
}

// ============================================================================
// TTS Moderation Endpoints
// ============================================================================

/// GET /api/tts/submit?text=&voice=&donor=&amount_cents=&msg=
pub async fn tts_submit(
    State(state): State<AppState>,
    Query(query): Query<TtsSubmitQuery>,
) -> ApiResult<Json<TtsItem>> {
    let item = state
        .tts
        .submit(
            &query.text,
            &query.voice,
            &query.donor,
            parse_amount(query.amount_cents.as_deref()),
            &query.msg,
        )
        .await?;
    Ok(Json(item))
}

/// GET /api/tts/queue
pub async fn tts_queue(State(state): State<AppState>) -> Json<Vec<TtsItem>> {
    Json(state.tts.list_pending().await)
}

/// POST /api/tts/approve?id=
pub async fn tts_approve(
    State(state): State<AppState>,
    Query(query): Query<SeqIdQuery>,
) -> ApiResult<Json<TtsItem>> {
    let id = query.parse("tts")?;
    Ok(Json(state.tts.approve(id).await?))
}

/// POST /api/tts/reject?id=
pub async fn tts_reject(
    State(state): State<AppState>,
    Query(query): Query<SeqIdQuery>,
) -> ApiResult<Json<TtsItem>> {
    let id = query.parse("tts")?;
    Ok(Json(state.tts.reject(id).await?))
}

// ============================================================================
// Request Moderation Endpoints
// ============================================================================

/// GET /api/request/submit?board=&phone=&note=
pub async fn request_submit(
    State(state): State<AppState>,
    Query(query): Query<RequestSubmitQuery>,
) -> ApiResult<Json<RequestItem>> {
    let item = state
        .requests
        .submit(&query.board, &query.phone, &query.note)
        .await?;
    Ok(Json(item))
}

/// GET /api/request/queue (moderator view, full phone)
pub async fn request_queue(State(state): State<AppState>) -> Json<Vec<RequestItem>> {
    Json(state.requests.list_pending().await)
}

/// GET /api/request/active
pub async fn request_active(State(state): State<AppState>) -> Json<Vec<RequestItem>> {
    Json(state.requests.list_active().await)
}

/// POST /api/request/approve?id=
pub async fn request_approve(
    State(state): State<AppState>,
    Query(query): Query<SeqIdQuery>,
) -> ApiResult<Json<RequestItem>> {
    let id = query.parse("request")?;
    Ok(Json(state.requests.approve(id).await?))
}

/// POST /api/request/reject?id=
pub async fn request_reject(
    State(state): State<AppState>,
    Query(query): Query<SeqIdQuery>,
) -> ApiResult<Json<RequestItem>> {
    let id = query.parse("request")?;
    Ok(Json(state.requests.reject(id).await?))
}

/// POST /api/request/complete?id=
pub async fn request_complete(
    State(state): State<AppState>,
    Query(query): Query<SeqIdQuery>,
) -> ApiResult<Json<RequestItem>> {
    let id = query.parse("request")?;
    Ok(Json(state.requests.complete(id).await?))
}

// ============================================================================
// State Endpoints
// ============================================================================

/// POST /api/state/save
pub async fn state_save(State(state): State<AppState>) -> ApiResult<Json<StatusResponse>> {
    state.persistence.save().await?;
    Ok(StatusResponse::ok())
}

/// POST /api/state/rehydrate
pub async fn state_rehydrate(State(state): State<AppState>) -> Json<RehydrateResponse> {
    Json(RehydrateResponse {
        broadcasts: state.persistence.rehydrate().await,
    })
}

// ============================================================================
// Donation History
// ============================================================================

/// POST /api/donations - append a JSON donation record to the ledger
///
/// The body is parsed by hand so a malformed payload gets the usual error
/// body with 400 rather than the extractor's own rejection.
pub async fn record_donation(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<StatusCode> {
    let donation: DonationRecord = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("invalid payload: {}", e)))?;
    state.history.record(&donation).await?;
    Ok(StatusCode::NO_CONTENT)
}
