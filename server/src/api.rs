//! # REST API
//!
//! Builds the axum router that exposes Quill over JSON. All endpoints share
//! application state through axum's `State` extractor. Field names are
//! camelCase; the legacy names `publicKey`, `articleId` and `share_token`
//! are accepted as aliases.
//!
//! ## Endpoints
//!
//! | Method | Path                  | Auth     | Description                      |
//! |--------|-----------------------|----------|----------------------------------|
//! | GET    | `/health`             | none     | Liveness check                   |
//! | POST   | `/auth/nonce`         | none     | Issue a sign-in challenge        |
//! | POST   | `/auth/verify`        | none     | Exchange a signature for a session |
//! | POST   | `/payments/verify`    | required | Verify and record a payment      |
//! | GET    | `/payments`           | required | The caller's payments            |
//! | GET    | `/content`            | optional | List content (previews)          |
//! | POST   | `/content`            | required | Publish content                  |
//! | GET    | `/content/:id`        | optional | Gated content (`?shareToken=`)   |
//! | PUT    | `/content/:id`        | required | Edit content                     |
//! | DELETE | `/content/:id`        | required | Delete content                   |
//! | PUT    | `/content/:id/pin`    | required | Pin (staff only)                 |
//! | PUT    | `/content/:id/unpin`  | required | Unpin (staff only)               |
//! | POST   | `/content/:id/share`  | required | Issue a sharable link            |
//! | GET    | `/profile`            | required | The caller's profile             |
//! | PUT    | `/profile`            | required | Edit the caller's profile        |
//! | GET    | `/profile/:wallet`    | none     | Public profile by wallet         |

use axum::{
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use quill_engine::auth::SessionGrant;
use quill_engine::content::{GatedContent, ListParams};
use quill_engine::crypto::Address;
use quill_engine::model::{
    ContentItem, ContentUpdate, Identity, NewContentItem, PaymentRecord, ProfileUpdate, ShareGrant,
};
use quill_engine::{Error, Gatekeeper};

use crate::error::{expose_internal_detail, ApiError};
use crate::extract::{ApiJson, ApiPath, ApiQuery, MaybeSession, RequireSession};
use crate::metrics::SharedMetrics;

type ApiResult<T> = Result<T, ApiError>;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone: everything sits behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub gatekeeper: Gatekeeper,
    pub metrics: SharedMetrics,
    /// Reported by `/health`.
    pub version: Arc<str>,
    /// Browser origins allowed by CORS. Empty means any origin.
    pub client_origins: Arc<[String]>,
    /// Expose internal error details in responses.
    pub dev_mode: bool,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.client_origins);
    let dev_mode = state.dev_mode;

    let router = Router::new()
        .route("/health", get(health_handler))
        .route("/auth/nonce", post(nonce_handler))
        .route("/auth/verify", post(verify_handler))
        .route("/payments", get(payments_handler))
        .route("/payments/verify", post(verify_payment_handler))
        .route("/content", get(list_content_handler).post(create_content_handler))
        .route(
            "/content/:id",
            get(get_content_handler)
                .put(update_content_handler)
                .delete(delete_content_handler),
        )
        .route("/content/:id/pin", put(pin_handler))
        .route("/content/:id/unpin", put(unpin_handler))
        .route("/content/:id/share", post(share_handler))
        .route("/profile", get(my_profile_handler).put(update_profile_handler))
        .route("/profile/:wallet", get(profile_by_wallet_handler))
        .with_state(state);

    let router = if dev_mode {
        router.layer(axum::middleware::map_response(expose_internal_detail))
    } else {
        router
    };

    router.layer(cors).layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::PATCH,
        Method::DELETE,
        Method::OPTIONS,
    ];

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(&origin.to_lowercase()).ok())
        .collect();

    if allowed.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any);
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(methods)
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

// ---------------------------------------------------------------------------
// Request Types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NonceRequest {
    #[serde(alias = "publicKey")]
    pub wallet_address: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    #[serde(alias = "publicKey")]
    pub wallet_address: String,
    pub signature: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentRequest {
    #[serde(alias = "articleId")]
    pub content_item_id: Uuid,
    #[serde(alias = "signature")]
    pub transaction_reference: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareRequest {
    #[serde(default, alias = "transactionReference", alias = "signature")]
    pub optional_transaction_reference: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    #[serde(alias = "searchQuery")]
    pub search: Option<String>,
    /// Owner wallet address.
    pub author: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentQueryParams {
    #[serde(alias = "share_token")]
    pub share_token: Option<String>,
}

// ---------------------------------------------------------------------------
// Handlers: health & auth
// ---------------------------------------------------------------------------

/// `GET /health`: returns 200 while the process is serving.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": &*state.version,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// `POST /auth/nonce`
async fn nonce_handler(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<NonceRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let nonce = state.gatekeeper.auth().issue_challenge(&req.wallet_address)?;
    state.metrics.challenges_issued_total.inc();
    Ok(Json(serde_json::json!({ "nonce": nonce })))
}

/// `POST /auth/verify`
async fn verify_handler(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<VerifyRequest>,
) -> ApiResult<Json<SessionGrant>> {
    let grant = state
        .gatekeeper
        .auth()
        .verify(&req.wallet_address, &req.signature)?;
    state.metrics.sessions_issued_total.inc();
    Ok(Json(grant))
}

// ---------------------------------------------------------------------------
// Handlers: payments
// ---------------------------------------------------------------------------

/// `POST /payments/verify`
async fn verify_payment_handler(
    State(state): State<AppState>,
    RequireSession(session): RequireSession,
    ApiJson(req): ApiJson<VerifyPaymentRequest>,
) -> ApiResult<Json<PaymentRecord>> {
    let timer = state.metrics.payment_verification_seconds.start_timer();
    let result = state
        .gatekeeper
        .verify_payment(&session, req.content_item_id, &req.transaction_reference)
        .await;
    timer.observe_duration();

    match result {
        Ok(record) => {
            state.metrics.payments_verified_total.inc();
            Ok(Json(record))
        }
        Err(err) => {
            state.metrics.record_rejection(err.kind());
            Err(err.into())
        }
    }
}

/// `GET /payments`
async fn payments_handler(
    State(state): State<AppState>,
    RequireSession(session): RequireSession,
) -> ApiResult<Json<Vec<PaymentRecord>>> {
    Ok(Json(state.gatekeeper.payments_for(&session)?))
}

// ---------------------------------------------------------------------------
// Handlers: content
// ---------------------------------------------------------------------------

/// `GET /content`
async fn list_content_handler(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> ApiResult<Json<Vec<GatedContent>>> {
    let author = query
        .author
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(|a| a.parse::<Address>())
        .transpose()
        .map_err(|_| Error::validation("Invalid wallet address"))?;

    let params = ListParams {
        search: query.search,
        author,
        limit: query.limit,
        offset: query.offset,
    };
    Ok(Json(state.gatekeeper.content().list(params, session.as_ref())?))
}

/// `POST /content`
async fn create_content_handler(
    State(state): State<AppState>,
    RequireSession(session): RequireSession,
    ApiJson(draft): ApiJson<NewContentItem>,
) -> ApiResult<(StatusCode, Json<ContentItem>)> {
    let item = state.gatekeeper.content().create(&session, draft)?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// `GET /content/:id`
async fn get_content_handler(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    ApiPath(id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<ContentQueryParams>,
) -> ApiResult<Json<GatedContent>> {
    let content = state
        .gatekeeper
        .content()
        .get(id, session.as_ref(), query.share_token.as_deref())?;
    state.metrics.record_read(content.access);
    Ok(Json(content))
}

/// `PUT /content/:id`
async fn update_content_handler(
    State(state): State<AppState>,
    RequireSession(session): RequireSession,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(update): ApiJson<ContentUpdate>,
) -> ApiResult<Json<ContentItem>> {
    Ok(Json(state.gatekeeper.content().update(id, &session, update)?))
}

/// `DELETE /content/:id`
async fn delete_content_handler(
    State(state): State<AppState>,
    RequireSession(session): RequireSession,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    state.gatekeeper.content().delete(id, &session)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `PUT /content/:id/pin`
async fn pin_handler(
    State(state): State<AppState>,
    RequireSession(session): RequireSession,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<ContentItem>> {
    Ok(Json(state.gatekeeper.content().pin(id, &session)?))
}

/// `PUT /content/:id/unpin`
async fn unpin_handler(
    State(state): State<AppState>,
    RequireSession(session): RequireSession,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<ContentItem>> {
    Ok(Json(state.gatekeeper.content().unpin(id, &session)?))
}

/// `POST /content/:id/share`
///
/// The body is optional: owners may send nothing at all.
async fn share_handler(
    State(state): State<AppState>,
    RequireSession(session): RequireSession,
    ApiPath(id): ApiPath<Uuid>,
    body: Option<ApiJson<ShareRequest>>,
) -> ApiResult<(StatusCode, Json<ShareGrant>)> {
    let req = body.map(|ApiJson(req)| req).unwrap_or_default();
    let grant = state
        .gatekeeper
        .shares()
        .issue(id, &session, req.optional_transaction_reference.as_deref())
        .await?;
    state.metrics.share_grants_issued_total.inc();
    Ok((StatusCode::CREATED, Json(grant)))
}

// ---------------------------------------------------------------------------
// Handlers: profiles
// ---------------------------------------------------------------------------

/// `GET /profile`
async fn my_profile_handler(
    State(state): State<AppState>,
    RequireSession(session): RequireSession,
) -> ApiResult<Json<Identity>> {
    Ok(Json(state.gatekeeper.profiles().get(session.identity_id)?))
}

/// `PUT /profile`
async fn update_profile_handler(
    State(state): State<AppState>,
    RequireSession(session): RequireSession,
    ApiJson(update): ApiJson<ProfileUpdate>,
) -> ApiResult<Json<Identity>> {
    Ok(Json(
        state
            .gatekeeper
            .profiles()
            .update(session.identity_id, &update)?,
    ))
}

/// `GET /profile/:wallet`
async fn profile_by_wallet_handler(
    State(state): State<AppState>,
    ApiPath(wallet): ApiPath<String>,
) -> ApiResult<Json<Identity>> {
    Ok(Json(state.gatekeeper.profiles().get_by_wallet(&wallet)?))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
