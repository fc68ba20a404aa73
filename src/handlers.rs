use crate::config::Config;
use crate::errors::AppError;
use crate::models::{GroupScoreRequest, ScoreRequest, SummaryQuery};
use crate::services::ScoringService;
use crate::store::ProfileStore;
use axum::{
    async_trait,
    extract::{FromRequestParts, Query, State},
    http::{request::Parts, StatusCode},
    Json,
};
use moka::future::Cache;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Persistence adapter (the engine's only I/O seam).
    pub store: Arc<dyn ProfileStore>,
    /// Application configuration.
    pub config: Config,
    /// Short-TTL cache fronting the read-only financial summary endpoint.
    /// Key: "user:{id}" or "group:{id}", Value: serialized summary JSON.
    pub summary_cache: Cache<String, serde_json::Value>,
}

/// Opaque authenticated caller identity.
///
/// The identity collaborator in front of this service authenticates the
/// caller and injects their user id as the `x-user-id` header. The engine
/// never sees credentials; a missing or malformed header is rejected before
/// any computation or store access.
pub struct AuthenticatedUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get("x-user-id")
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                AppError::Unauthenticated("Missing caller identity header".to_string())
            })?;

        let user_id = Uuid::parse_str(raw)
            .map_err(|_| AppError::Unauthenticated("Invalid caller identity".to_string()))?;

        Ok(AuthenticatedUser(user_id))
    }
}

/// Health check endpoint.
///
/// Returns the service status, version, and health information.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "credit-scoring-api",
            "version": "0.1.0"
        })),
    )
}

/// POST /api/v1/credit/score
///
/// Scores one user and persists the resulting trust score. The target user
/// defaults to the authenticated caller when the body omits `userId`.
pub async fn score_credit(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Json(request): Json<ScoreRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let target_user_id = request.user_id.unwrap_or(caller);
    tracing::info!(caller = %caller, target = %target_user_id, "POST /credit/score");

    let service = ScoringService::new(state.store.clone());
    let result = service.score_individual(target_user_id).await?;

    tracing::info!(
        target = %target_user_id,
        score = result.result.score,
        risk_level = %result.result.risk_level,
        "individual scoring complete"
    );

    Ok(Json(json!({
        "success": true,
        "data": result,
    })))
}

/// POST /api/v1/credit/score/group
///
/// Scores a cohort of users and returns aggregate statistics. Performs no
/// persistence; unresolvable members are dropped from the result.
pub async fn score_group_credit(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Json(request): Json<GroupScoreRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user_ids = request.user_ids.ok_or_else(|| {
        AppError::InvalidInput("User IDs array required for group calculation".to_string())
    })?;

    tracing::info!(caller = %caller, members = user_ids.len(), "POST /credit/score/group");

    let service = ScoringService::new(state.store.clone());
    let result = service.score_group(&user_ids).await?;

    Ok(Json(json!({
        "success": true,
        "data": result,
    })))
}

/// GET /api/v1/credit/summary
///
/// Read-only projection of persisted state: the last stored financial
/// profile and trust score for a user (`userId`, defaulting to the caller),
/// or an aggregate summary for a cooperative (`groupId`). This is a read
/// path, not a scoring operation, so responses are briefly cached.
pub async fn financial_summary(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Query(params): Query<SummaryQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let service = ScoringService::new(state.store.clone());

    let (cache_key, payload) = if let Some(group_id) = params.group_id {
        let cache_key = format!("group:{}", group_id);
        if let Some(cached) = state.summary_cache.get(&cache_key).await {
            tracing::debug!(%group_id, "summary cache HIT");
            return Ok(Json(cached));
        }

        let summary = service.group_financial_summary(group_id).await?;
        (cache_key, json!({ "success": true, "data": summary }))
    } else {
        let user_id = params.user_id.unwrap_or(caller);
        let cache_key = format!("user:{}", user_id);
        if let Some(cached) = state.summary_cache.get(&cache_key).await {
            tracing::debug!(%user_id, "summary cache HIT");
            return Ok(Json(cached));
        }

        let summary = service.user_financial_summary(user_id).await?;
        (cache_key, json!({ "success": true, "data": summary }))
    };

    state
        .summary_cache
        .insert(cache_key, payload.clone())
        .await;

    Ok(Json(payload))
}
