//! Generation and key-health endpoints

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use key_pool::{Generation, HealthReporter, Orchestrator};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::error::ApiError;
use crate::metrics::{ServiceMetrics, record_request};

/// Largest `max_tokens` a caller may request.
pub const MAX_TOKENS_LIMIT: u32 = 8192;

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<Orchestrator>,
    pub reporter: Arc<HealthReporter>,
    pub default_max_tokens: u32,
    pub metrics: ServiceMetrics,
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl GenerateRequest {
    fn max_tokens(&self, default: u32) -> Result<u32, ApiError> {
        if self.prompt.trim().is_empty() {
            return Err(ApiError::InvalidRequest("prompt must not be empty".into()));
        }
        match self.max_tokens.unwrap_or(default) {
            0 => Err(ApiError::InvalidRequest(
                "max_tokens must be greater than 0".into(),
            )),
            n if n > MAX_TOKENS_LIMIT => Err(ApiError::InvalidRequest(format!(
                "max_tokens must not exceed {MAX_TOKENS_LIMIT}"
            ))),
            n => Ok(n),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub text: String,
    /// `primary:<key id>` or `secondary_fallback`
    pub source: String,
    pub attempts: usize,
    pub request_id: String,
}

/// Decrements the in-flight gauge even if the client goes away mid-request.
struct InFlight(Arc<AtomicU64>);

impl InFlight {
    fn enter(counter: &Arc<AtomicU64>) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self(counter.clone())
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// POST /api/generate
#[instrument(skip_all, fields(request_id = %request_id))]
pub async fn generate(
    state: &ApiState,
    body: Result<Json<GenerateRequest>, JsonRejection>,
    request_id: String,
) -> Response {
    let started = Instant::now();
    state.metrics.requests_total.fetch_add(1, Ordering::Relaxed);

    let result = {
        let _in_flight = InFlight::enter(&state.metrics.in_flight);
        run_generate(state, body).await
    };

    let response = match result {
        Ok(generation) => {
            let source = generation.source.label();
            info!(source = %source, attempts = generation.attempts, "generation served");
            (
                StatusCode::OK,
                Json(GenerateResponse {
                    text: generation.text,
                    source,
                    attempts: generation.attempts,
                    request_id,
                }),
            )
                .into_response()
        }
        Err(e) => {
            state.metrics.errors_total.fetch_add(1, Ordering::Relaxed);
            warn!(error = %e, "generation request failed");
            e.into_response_with_id(&request_id)
        }
    };

    record_request(
        "generate",
        response.status().as_u16(),
        started.elapsed().as_secs_f64(),
    );
    response
}

async fn run_generate(
    state: &ApiState,
    body: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Generation, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::InvalidRequest(e.body_text()))?;
    let max_tokens = request.max_tokens(state.default_max_tokens)?;
    Ok(state
        .orchestrator
        .generate(&request.prompt, max_tokens)
        .await?)
}

/// GET /api/health/keys
pub async fn key_health(state: &ApiState) -> Response {
    let started = Instant::now();
    let report = state.reporter.report().await;
    record_request("key_health", 200, started.elapsed().as_secs_f64());
    (StatusCode::OK, Json(report)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(prompt: &str, max_tokens: Option<u32>) -> GenerateRequest {
        GenerateRequest {
            prompt: prompt.into(),
            max_tokens,
        }
    }

    #[test]
    fn max_tokens_defaults_and_bounds() {
        assert_eq!(request("hope", None).max_tokens(2048).unwrap(), 2048);
        assert_eq!(request("hope", Some(100)).max_tokens(2048).unwrap(), 100);
        assert!(request("hope", Some(0)).max_tokens(2048).is_err());
        assert!(
            request("hope", Some(MAX_TOKENS_LIMIT + 1))
                .max_tokens(2048)
                .is_err()
        );
    }

    #[test]
    fn blank_prompt_rejected() {
        let err = request("  \n", None).max_tokens(2048).unwrap_err();
        assert_eq!(err.to_string(), "prompt must not be empty");
    }

    #[test]
    fn in_flight_guard_restores_counter() {
        let counter = Arc::new(AtomicU64::new(0));
        {
            let _guard = InFlight::enter(&counter);
            assert_eq!(counter.load(Ordering::Relaxed), 1);
        }
        assert_eq!(counter.load(Ordering::Relaxed), 0);
    }
}
