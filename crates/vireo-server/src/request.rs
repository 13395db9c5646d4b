use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Request},
    http::{HeaderMap, Method, header},
};
use serde_json::{Map, Value};

use crate::error::ApiError;

// Per-method request data, flattened into one field map:
// GET takes the query string, POST merges the form body with the JSON body
// (JSON wins on collision), PUT/DELETE take the JSON body only. Anything else
// is empty. A body that is not a JSON object contributes nothing.
#[derive(Debug, Default)]
pub struct RequestData(pub Map<String, Value>);

pub fn parse_query(query: Option<&str>) -> Map<String, Value> {
    let Some(raw) = query else {
        return Map::new();
    };
    match serde_urlencoded::from_str::<Vec<(String, String)>>(raw) {
        Ok(pairs) => pairs
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect(),
        Err(_) => Map::new(),
    }
}

pub fn parse_form(body: &[u8]) -> Map<String, Value> {
    match serde_urlencoded::from_bytes::<Vec<(String, String)>>(body) {
        Ok(pairs) => pairs
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect(),
        Err(_) => Map::new(),
    }
}

pub fn parse_json(body: &[u8]) -> Map<String, Value> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

pub fn merge(mut base: Map<String, Value>, overlay: Map<String, Value>) -> Map<String, Value> {
    for (key, value) in overlay {
        base.insert(key, value);
    }
    base
}

fn is_form_content_type(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim_start().starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false)
}

#[async_trait]
impl<S: Send + Sync> FromRequest<S> for RequestData {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match *req.method() {
            Method::GET => Ok(Self(parse_query(req.uri().query()))),
            Method::POST => {
                let form_body = is_form_content_type(req.headers());
                let bytes = Bytes::from_request(req, state)
                    .await
                    .map_err(|_| ApiError::BadRequest("unable to read request body".into()))?;
                let form = if form_body {
                    parse_form(&bytes)
                } else {
                    Map::new()
                };
                Ok(Self(merge(form, parse_json(&bytes))))
            }
            Method::PUT | Method::DELETE => {
                let bytes = Bytes::from_request(req, state)
                    .await
                    .map_err(|_| ApiError::BadRequest("unable to read request body".into()))?;
                Ok(Self(parse_json(&bytes)))
            }
            _ => Ok(Self(Map::new())),
        }
    }
}

pub fn str_field<'a>(data: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    data.get(key).and_then(Value::as_str)
}

pub fn u64_field(data: &Map<String, Value>, key: &str) -> Option<u64> {
    match data.get(key)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn bool_field(data: &Map<String, Value>, key: &str) -> Option<bool> {
    match data.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(_) => Some(true),
            None => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        },
        _ => None,
    }
}
