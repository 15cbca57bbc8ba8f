//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  extract::rejection::{JsonRejection, PathRejection, QueryRejection},
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use cascade_core::Error as CoreError;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  /// Missing or unknown bearer token.
  #[error("unauthorized")]
  Unauthorized,

  #[error(transparent)]
  Core(#[from] CoreError),
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::Unauthorized | ApiError::Core(CoreError::Unauthorized) => StatusCode::UNAUTHORIZED,
      ApiError::Core(CoreError::Forbidden(_)) => StatusCode::FORBIDDEN,
      ApiError::Core(CoreError::NotFound(_)) => StatusCode::NOT_FOUND,
      ApiError::Core(CoreError::Validation(_)) => StatusCode::BAD_REQUEST,
      ApiError::Core(CoreError::Conflict(_)) => StatusCode::CONFLICT,
      ApiError::Core(CoreError::Store(_)) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

// ─── Extractor rejections ────────────────────────────────────────────────────

impl From<JsonRejection> for ApiError {
  fn from(rejection: JsonRejection) -> Self {
    ApiError::Core(CoreError::Validation(rejection.body_text()))
  }
}

impl From<QueryRejection> for ApiError {
  fn from(rejection: QueryRejection) -> Self {
    ApiError::Core(CoreError::Validation(rejection.body_text()))
  }
}

impl From<PathRejection> for ApiError {
  fn from(rejection: PathRejection) -> Self {
    ApiError::Core(CoreError::Validation(rejection.body_text()))
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    let message = match &self {
      ApiError::Unauthorized | ApiError::Core(CoreError::Unauthorized) => "unauthorized".to_owned(),
      ApiError::Core(CoreError::Forbidden(m)) => (*m).to_owned(),
      ApiError::Core(CoreError::NotFound(_)) => "not found".to_owned(),
      ApiError::Core(CoreError::Validation(m)) => m.clone(),
      ApiError::Core(e @ CoreError::Conflict(_)) => e.to_string(),
      ApiError::Core(CoreError::Store(e)) => {
        tracing::error!(error = %e, "request failed");
        "internal server error".to_owned()
      }
    };

    let mut res = (status, Json(json!({ "success": false, "error": message }))).into_response();
    if status == StatusCode::UNAUTHORIZED {
      res
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer realm=\"cascade\""));
    }
    res
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn core_errors_map_to_distinct_statuses() {
    let cases = [
      (CoreError::Unauthorized, StatusCode::UNAUTHORIZED),
      (CoreError::Forbidden("no"), StatusCode::FORBIDDEN),
      (CoreError::NotFound("goal".into()), StatusCode::NOT_FOUND),
      (CoreError::Validation("bad".into()), StatusCode::BAD_REQUEST),
      (CoreError::Conflict(uuid::Uuid::nil()), StatusCode::CONFLICT),
      (CoreError::store(std::io::Error::other("disk")), StatusCode::INTERNAL_SERVER_ERROR),
    ];
    for (err, status) in cases {
      assert_eq!(ApiError::from(err).status(), status);
    }
  }

  #[tokio::test]
  async fn internal_errors_do_not_leak_details() {
    let err = ApiError::from(CoreError::store(std::io::Error::other("/var/db/secret.sqlite")));
    let resp = err.into_response();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(!body.contains("secret"), "{body}");
    assert!(body.contains("internal server error"));
  }
}
