use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

pub fn with_status<T: Serialize>(
    status: StatusCode,
    message: impl Into<String>,
    data: Option<T>,
) -> Response {
    (
        status,
        Json(Envelope {
            success: true,
            message: message.into(),
            data,
        }),
    )
        .into_response()
}

pub fn success<T: Serialize>(message: impl Into<String>, data: T) -> Response {
    with_status(StatusCode::OK, message, Some(data))
}

pub fn created<T: Serialize>(message: impl Into<String>, data: T) -> Response {
    with_status(StatusCode::CREATED, message, Some(data))
}

pub fn message_only(message: impl Into<String>) -> Response {
    with_status::<()>(StatusCode::OK, message, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_omits_missing_data() {
        let v = serde_json::to_value(Envelope::<()> {
            success: true,
            message: "ok".to_string(),
            data: None,
        })
        .unwrap();
        assert_eq!(v.get("success"), Some(&serde_json::Value::Bool(true)));
        assert!(v.get("data").is_none());
    }

    #[test]
    fn envelope_carries_data() {
        let v = serde_json::to_value(Envelope {
            success: true,
            message: "ok".to_string(),
            data: Some(serde_json::json!({"id": 7})),
        })
        .unwrap();
        assert_eq!(v["data"]["id"], 7);
    }
}
