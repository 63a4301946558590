//! Request extractors whose rejections render as JSON [`AppError`]s.
//!
//! axum's stock extractors answer malformed input with plain-text bodies;
//! these wrappers keep every error response in the `{"error": ...}` shape.

use axum::{
    extract::{FromRequest, FromRequestParts},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::error::AppError;

/// JSON body extractor and response.
#[derive(Debug, Clone, Copy, Default, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

/// Query string extractor.
#[derive(Debug, Clone, Copy, Default, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct Query<T>(pub T);

/// Path parameter extractor.
#[derive(Debug, Clone, Copy, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct Path<T>(pub T);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode, header::CONTENT_TYPE},
        routing::{get, post},
    };
    use serde::Deserialize;
    use tower::ServiceExt;

    use super::*;

    #[derive(Debug, Deserialize, Serialize)]
    struct Body1 {
        quantity: i32,
    }

    fn app() -> Router {
        Router::new()
            .route("/echo", post(|Json(body): Json<Body1>| async move { Json(body) }))
            .route("/items/{id}", get(|Path(id): Path<i32>| async move { id.to_string() }))
    }

    async fn error_of(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 4096).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_malformed_json_is_json_400() {
        let response = app()
            .oneshot(
                Request::post("/echo")
                    .header(CONTENT_TYPE, "application/json")
                    .body(Body::from("{\"quantity\": \"lots\"}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(error_of(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_bad_path_is_json_400() {
        let response = app()
            .oneshot(Request::get("/items/abc").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_valid_json_roundtrip() {
        let response = app()
            .oneshot(
                Request::post("/echo")
                    .header(CONTENT_TYPE, "application/json")
                    .body(Body::from("{\"quantity\": 3}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
