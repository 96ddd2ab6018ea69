use async_trait::async_trait;
use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

pub mod policy;

pub use policy::{suggest_routing, RoutingCandidate, RoutingSuggestion};

use crate::profiles::load_profile;
use crate::shared::error::ApiError;
use crate::shared::state::AppState;
use crate::web::auth::AuthenticatedUser;

/// Text-generation collaborator consulted for department routing. The reply
/// is untrusted free text; `policy` owns extraction, validation and fallback.
#[async_trait]
pub trait RoutingAdvisor: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>>;
}

pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String, base_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            base_url: base_url
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com".to_string()),
        }
    }
}

#[async_trait]
impl RoutingAdvisor for GeminiClient {
    async fn generate(
        &self,
        prompt: &str,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        let response = self
            .client
            .post(format!(
                "{}/v1beta/models/{}:generateContent?key={}",
                self.base_url, self.model, self.api_key
            ))
            .json(&serde_json::json!({
                "contents": [{"parts": [{"text": prompt}]}]
            }))
            .send()
            .await?
            .error_for_status()?;

        let result: Value = response.json().await?;
        let content = result["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .unwrap_or("")
            .to_string();

        Ok(content)
    }
}

/// Standalone routing preview. Candidates come from the request body, so a
/// client can ask "where would this go" against any list it likes.
#[derive(Debug, Deserialize)]
pub struct RouteRequest {
    pub title: String,
    pub description: String,
    pub departments: Vec<RoutingCandidate>,
}

pub async fn route_ticket(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<RouteRequest>,
) -> Result<Json<RoutingSuggestion>, ApiError> {
    let title = req.title.trim().to_string();
    let description = req.description.trim().to_string();
    if title.is_empty() || description.is_empty() {
        return Err(ApiError::InvalidInput(
            "title and description are required".to_string(),
        ));
    }
    if req.departments.is_empty() {
        return Err(ApiError::InvalidInput(
            "at least one department is required".to_string(),
        ));
    }

    let pool = state.conn.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get().map_err(|e| ApiError::Database(e.to_string()))?;
        load_profile(&mut conn, user.user_id)?;
        Ok::<(), ApiError>(())
    })
    .await
    .map_err(|e: tokio::task::JoinError| ApiError::Internal(e.to_string()))??;

    let suggestion =
        suggest_routing(state.advisor.as_ref(), &title, &description, &req.departments).await?;

    Ok(Json(suggestion))
}

pub fn configure_routing_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/ai/route", post(route_ticket))
}
