//! HTTP session endpoint: `POST /session` exchanges an SDP offer for an answer.

use super::PeerSessionManager;
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::post;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRequest {
    pub offer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResponse {
    pub answer: String,
}

type SharedManager = Arc<dyn PeerSessionManager>;

/// Build the router. Paths other than `/session` are served from
/// `static_dir` when one is given.
pub fn router(manager: SharedManager, static_dir: Option<&Path>) -> Router {
    let mut router = Router::new().route("/session", post(create_session));
    if let Some(dir) = static_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }
    router.layer(TraceLayer::new_for_http()).with_state(manager)
}

async fn create_session(State(manager): State<SharedManager>, body: Bytes) -> Response {
    // Parsed by hand so malformed bodies are a plain 400
    let request: SessionRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            debug!(error = %e, "Rejected session request");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    match manager.create_session(request.offer).await {
        Ok(answer) => Json(SessionResponse { answer }).into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to create session");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Serve `router` on `listener` until `cancel` fires.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    if let Ok(address) = listener.local_addr() {
        info!(%address, "Session endpoint listening");
    }
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionError;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    struct EchoManager;

    #[async_trait::async_trait]
    impl PeerSessionManager for EchoManager {
        async fn create_session(&self, offer: String) -> Result<String, SessionError> {
            if offer == "fail" {
                return Err(SessionError::Peer {
                    message: "negotiation failed".to_string(),
                });
            }
            Ok(format!("answer-for-{}", offer))
        }
    }

    fn app(static_dir: Option<&Path>) -> Router {
        router(Arc::new(EchoManager), static_dir)
    }

    fn post_session(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/session")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    #[tokio::test]
    async fn test_offer_returns_answer() {
        let response = app(None)
            .oneshot(post_session(r#"{"offer":"v=0"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: SessionResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body.answer, "answer-for-v=0");
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let response = app(None).oneshot(post_session("{not json")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app(None).oneshot(post_session(r#"{"sdp":"x"}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_manager_error_is_internal_error_without_body() {
        let response = app(None)
            .oneshot(post_session(r#"{"offer":"fail"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_bytes(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_wrong_method_is_rejected() {
        let request = Request::builder()
            .method("GET")
            .uri("/session")
            .body(Body::empty())
            .unwrap();
        let response = app(None).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_static_directory_is_served() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>voxrelay</h1>").unwrap();

        let request = Request::builder()
            .uri("/index.html")
            .body(Body::empty())
            .unwrap();
        let response = app(Some(dir.path())).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, b"<h1>voxrelay</h1>");
    }

    #[tokio::test]
    async fn test_unknown_path_without_static_dir_is_not_found() {
        let request = Request::builder()
            .uri("/index.html")
            .body(Body::empty())
            .unwrap();
        let response = app(None).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_serve_stops_on_cancel() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(serve(listener, app(None), cancel.clone()));

        cancel.cancel();
        assert!(task.await.unwrap().is_ok());
    }
}
