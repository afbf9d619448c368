//! Axum REST API handlers
//!
//! Authentication and the verifier-role check happen upstream in the
//! access-control layer; this surface assumes an authorized caller.
//! Result kinds map onto HTTP status classes: input problems and
//! no-face are 400, no match is 404, gallery/internal failures are 500.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::config::Config;
use crate::engine::extractor::DescriptorExtractor;
use crate::gallery::GalleryAccessor;
use crate::verify::types::VerificationResult;
use crate::verify::VerificationService;

use super::dto::*;

/// Application state shared across handlers.
pub struct AppState<E: DescriptorExtractor, G: GalleryAccessor> {
    pub service: Arc<VerificationService<E, G>>,
    /// Set once the model stack has compiled at startup.
    pub models_ready: bool,
    pub start_time: Instant,
}

/// Create the REST API router.
pub fn create_rest_router<E: DescriptorExtractor, G: GalleryAccessor>(
    state: Arc<AppState<E, G>>,
    config: &Config,
) -> Router {
    // Leave multipart framing headroom above the configured image cap;
    // the service enforces the cap itself.
    let body_limit = config.verify.max_image_bytes + 64 * 1024;

    Router::new()
        .route("/api/v1/verify", post(verify_handler::<E, G>))
        .route("/health", get(health_handler::<E, G>))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Verify an uploaded face image against the enrolled gallery.
async fn verify_handler<E: DescriptorExtractor, G: GalleryAccessor>(
    State(state): State<Arc<AppState<E, G>>>,
    mut multipart: Multipart,
) -> Result<Json<VerifyResponse>, ApiError> {
    let mut image_data: Option<Vec<u8>> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(&e.to_string(), "MULTIPART_ERROR")),
        )
    })? {
        let name = field.name().unwrap_or("").to_string();
        if name == "image" || name == "photo" {
            image_data = Some(
                field
                    .bytes()
                    .await
                    .map_err(|e| {
                        (
                            StatusCode::BAD_REQUEST,
                            Json(ErrorResponse::new(&e.to_string(), "READ_ERROR")),
                        )
                    })?
                    .to_vec(),
            );
        }
    }

    let image_data = image_data.ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Missing image field", "MISSING_IMAGE")),
        )
    })?;

    let outcome = state.service.verify(&image_data).await.map_err(|e| {
        error!("Verification failed: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(&e.to_string(), "INTERNAL")),
        )
    })?;

    match outcome.result {
        VerificationResult::Identified {
            identity_id,
            confidence,
        } => Ok(Json(VerifyResponse {
            message: "Match found".to_string(),
            identity_id,
            confidence: round_confidence(confidence),
            profile: outcome.profile.map(ProfileDto::from),
            elapsed_ms: outcome.elapsed_ms,
        })),
        VerificationResult::NoFaceDetected => Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(
                "No face detected in the image",
                "NO_FACE_DETECTED",
            )),
        )),
        VerificationResult::NoGalleryMatch => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("No matching identity found", "NO_MATCH")),
        )),
        VerificationResult::InputError(reason) => Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(&reason, "INVALID_IMAGE")),
        )),
    }
}

/// Health check: reports version and whether the model stack is ready
/// to serve.
async fn health_handler<E: DescriptorExtractor, G: GalleryAccessor>(
    State(state): State<Arc<AppState<E, G>>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        healthy: state.models_ready,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VerifyConfig;
    use crate::verify::testutil::{MockExtractor, MockGallery};

    fn test_state(models_ready: bool) -> Arc<AppState<MockExtractor, MockGallery>> {
        let config = VerifyConfig {
            max_image_bytes: 1024,
            batch_size: 5,
            min_detection_confidence: 0.3,
            match_threshold: 0.6,
            detector_input_size: 416,
            descriptor_dim: 1,
        };
        let extractor = Arc::new(MockExtractor::new(1));
        let gallery = Arc::new(MockGallery::new(vec![]));
        Arc::new(AppState {
            service: Arc::new(VerificationService::new(extractor, gallery, &config)),
            models_ready,
            start_time: Instant::now(),
        })
    }

    #[tokio::test]
    async fn test_health_reports_model_readiness() {
        let response = health_handler(State(test_state(true))).await;
        assert!(response.0.healthy);
        assert_eq!(response.0.version, env!("CARGO_PKG_VERSION"));

        let response = health_handler(State(test_state(false))).await;
        assert!(!response.0.healthy);
    }
}
