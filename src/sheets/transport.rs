use crate::error::{AppError, Result};
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

/// One call against the Sheets REST surface, relative to the API base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Unencoded path segments, e.g. `["spreadsheets", id, "values", "Sheet1!A1:B2"]`
    pub path: Vec<String>,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get<S: Into<String>>(path: impl IntoIterator<Item = S>) -> Self {
        Self {
            method: Method::GET,
            path: path.into_iter().map(Into::into).collect(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn post<S: Into<String>>(path: impl IntoIterator<Item = S>, body: Value) -> Self {
        Self {
            method: Method::POST,
            body: Some(body),
            ..Self::get(path)
        }
    }

    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    /// Values of every query parameter named `key`, in order.
    pub fn query_values(&self, key: &str) -> Vec<&str> {
        self.query
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Human-readable failure detail: the service's error message if present.
    pub fn error_detail(&self) -> String {
        match self.body.pointer("/error/message").and_then(Value::as_str) {
            Some(message) => message.to_string(),
            None => match &self.body {
                Value::String(text) => text.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            },
        }
    }
}

/// Sends one request with a bearer token. Performs no retries.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ApiRequest, token: &str) -> Result<ApiResponse>;
}

pub struct HttpTransport {
    client: Client,
    base_url: Url,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| AppError::Config(format!("Invalid API base URL '{}': {}", base_url, e)))?;

        Ok(Self {
            client: Client::new(),
            base_url,
        })
    }

    fn url_for(&self, request: &ApiRequest) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::Config(format!("API base URL '{}' cannot take a path", self.base_url)))?
            .pop_if_empty()
            .extend(&request.path);
        Ok(url)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &ApiRequest, token: &str) -> Result<ApiResponse> {
        let url = self.url_for(request)?;
        debug!(method = %request.method, path = url.path(), "Sending request");

        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .bearer_auth(token)
            .query(&request.query);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;

        let body = match serde_json::from_str(&text) {
            Ok(body) => body,
            Err(_) if text.trim().is_empty() => Value::Null,
            Err(_) => Value::String(text),
        };

        Ok(ApiResponse { status, body })
    }
}

/// Serialize a wire struct, dropping null members so unset options stay unset.
pub fn to_body<T: Serialize>(value: &T) -> Result<Value> {
    let mut body = serde_json::to_value(value)?;
    strip_nulls(&mut body);
    Ok(body)
}

fn strip_nulls(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|_, v| !v.is_null());
            map.values_mut().for_each(strip_nulls);
        }
        // Null cells inside a row are positional and must survive
        Value::Array(items) => items.iter_mut().for_each(strip_nulls),
        _ => {}
    }
}

#[cfg(test)]
pub(crate) mod test_helpers {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    pub(crate) fn ok(body: Value) -> ApiResponse {
        ApiResponse { status: 200, body }
    }

    pub(crate) fn status(status: u16, message: &str) -> ApiResponse {
        ApiResponse {
            status,
            body: serde_json::json!({"error": {"code": status, "message": message}}),
        }
    }

    /// Replays scripted responses in order and records what was sent.
    #[derive(Clone, Default)]
    pub(crate) struct MockTransport {
        responses: Arc<Mutex<VecDeque<Result<ApiResponse>>>>,
        pub requests: Arc<Mutex<Vec<ApiRequest>>>,
        pub tokens: Arc<Mutex<Vec<String>>>,
    }

    impl MockTransport {
        pub(crate) fn new(responses: Vec<Result<ApiResponse>>) -> Self {
            Self {
                responses: Arc::new(Mutex::new(responses.into())),
                ..Default::default()
            }
        }

        pub(crate) fn sent(&self) -> Vec<ApiRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&self, request: &ApiRequest, token: &str) -> Result<ApiResponse> {
            self.requests.lock().unwrap().push(request.clone());
            self.tokens.lock().unwrap().push(token.to_string());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| panic!("unexpected request {:?}", request))
        }
    }
}
