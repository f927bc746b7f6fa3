//! Success envelope: `{ "success": true, "data"?, "message"? }`

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Successful API response
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
    #[serde(skip)]
    status: StatusCode,
}

impl<T> Envelope<T> {
    /// 200 with data
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            status: StatusCode::OK,
        }
    }

    /// 201 with data
    pub fn created(data: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            ..Self::ok(data)
        }
    }

    pub fn with_message(mut self, message: &'static str) -> Self {
        self.message = Some(message);
        self
    }
}

impl Envelope<()> {
    /// 200 with only a message (deletes)
    pub fn message(message: &'static str) -> Self {
        Self {
            success: true,
            data: None,
            message: Some(message),
            status: StatusCode::OK,
        }
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::{json, Value};

    async fn render<T: Serialize>(envelope: Envelope<T>) -> (StatusCode, Value) {
        let response = envelope.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn created_carries_message() {
        let (status, body) =
            render(Envelope::created(json!({ "id": 1 })).with_message("Blog created successfully"))
                .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(
            body,
            json!({ "success": true, "data": { "id": 1 }, "message": "Blog created successfully" })
        );
    }

    #[tokio::test]
    async fn message_only_omits_data() {
        let (status, body) = render(Envelope::message("Blog deleted successfully")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.get("data").is_none());
        assert_eq!(body["message"], "Blog deleted successfully");
    }
}
