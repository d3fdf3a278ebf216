//! Firebase Realtime Database REST client

use crate::config::StoreClientConfig;
use crate::error::{ApiError, ApiResult};
use crate::path::StorePath;
use crate::RemoteStore;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Request correlation ID header
const X_REQUEST_ID: &str = "X-Request-ID";

/// Auth query parameter understood by the REST API
const AUTH_PARAM: &str = "auth";

/// Realtime database client speaking the REST protocol.
///
/// Every path maps to `{database_url}/{path}.json` with each segment
/// percent-encoded; `set` is a `PUT` of the JSON value and `get` is a `GET`. The client holds no per-path state and
/// can be cloned freely.
#[derive(Clone)]
pub struct RtdbClient {
    inner: Client,
    base: Url,
    config: Arc<StoreClientConfig>,
}

impl RtdbClient {
    /// Create a new client with specific configuration
    pub fn with_config(config: StoreClientConfig) -> ApiResult<Self> {
        config.validate()?;
        let base = Url::parse(config.base_url())
            .map_err(|e| ApiError::config(format!("invalid database_url: {e}")))?;

        let mut default_headers = HeaderMap::new();
        default_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        default_headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("sos-beacon/", env!("CARGO_PKG_VERSION"))),
        );

        let inner = Client::builder()
            .timeout(config.timeout)
            .default_headers(default_headers)
            .build()
            .map_err(ApiError::Request)?;

        Ok(Self {
            inner,
            base,
            config: Arc::new(config),
        })
    }

    /// Get the current configuration
    #[must_use]
    pub fn config(&self) -> &StoreClientConfig {
        &self.config
    }

    /// REST endpoint for a path
    #[must_use]
    pub fn url_for(&self, path: &StorePath) -> Url {
        let mut url = self.base.clone();
        // http(s) URLs always have path segments
        if let Ok(mut parts) = url.path_segments_mut() {
            parts.pop_if_empty();
            if let Some((last, parents)) = path.segments().split_last() {
                parts.extend(parents);
                parts.push(&format!("{last}.json"));
            }
        }
        url
    }

    fn request_builder(&self, method: Method, path: &StorePath, request_id: &str) -> RequestBuilder {
        let mut request = self
            .inner
            .request(method, self.url_for(path))
            .header(X_REQUEST_ID, request_id);

        if let Some(ref token) = self.config.auth_token {
            request = request.query(&[(AUTH_PARAM, token)]);
        }

        request
    }

    /// `PUT` a value at a path
    #[instrument(skip(self, value), fields(path = %path))]
    pub async fn put(&self, path: &StorePath, value: &Value) -> ApiResult<()> {
        let request_id = Uuid::new_v4().to_string();
        let start = Instant::now();

        let response = self
            .request_builder(Method::PUT, path, &request_id)
            .json(value)
            .send()
            .await?;

        // The body echoes the written value; only the status matters here.
        self.handle_response::<Value>(&request_id, response).await?;

        debug!(
            request_id = %request_id,
            elapsed_ms = start.elapsed().as_millis(),
            "Value written"
        );
        Ok(())
    }

    /// `GET` the value at a path
    #[instrument(skip(self), fields(path = %path))]
    pub async fn fetch(&self, path: &StorePath) -> ApiResult<Option<Value>> {
        let request_id = Uuid::new_v4().to_string();

        let response = self
            .request_builder(Method::GET, path, &request_id)
            .send()
            .await?;

        let value: Value = self.handle_response(&request_id, response).await?;
        Ok((!value.is_null()).then_some(value))
    }

    /// Handle HTTP response and deserialize
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        request_id: &str,
        response: Response,
    ) -> ApiResult<T> {
        let status = response.status();

        if status.is_success() {
            response.json().await.map_err(ApiError::Request)
        } else {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let message = extract_error_message(&body);
            warn!(
                request_id = %request_id,
                status = status.as_u16(),
                error = %message,
                "Database rejected request"
            );
            Err(ApiError::api_response(status.as_u16(), message))
        }
    }
}

impl RemoteStore for RtdbClient {
    async fn set(&self, path: &StorePath, value: Value) -> ApiResult<()> {
        self.put(path, &value).await
    }

    async fn get(&self, path: &StorePath) -> ApiResult<Option<Value>> {
        self.fetch(path).await
    }
}

/// Error bodies look like `{"error": "Permission denied"}`
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let config = StoreClientConfig::new("https://demo.firebaseio.com");
        assert!(RtdbClient::with_config(config).is_ok());

        let invalid = StoreClientConfig::new("");
        assert!(RtdbClient::with_config(invalid).is_err());
    }

    #[test]
    fn test_url_for() {
        let client =
            RtdbClient::with_config(StoreClientConfig::new("https://demo.firebaseio.com/")).unwrap();
        let path = StorePath::parse("users/a1b2/latitude").unwrap();
        assert_eq!(
            client.url_for(&path).as_str(),
            "https://demo.firebaseio.com/users/a1b2/latitude.json"
        );
    }

    #[test]
    fn test_url_for_encodes_segments() {
        let client =
            RtdbClient::with_config(StoreClientConfig::new("https://demo.firebaseio.com")).unwrap();
        let path = StorePath::parse("users")
            .unwrap()
            .child("dev?x")
            .unwrap()
            .child("latitude")
            .unwrap();

        let url = client.url_for(&path);
        assert_eq!(url.path(), "/users/dev%3Fx/latitude.json");
        assert_eq!(url.query(), None);

        let spaced = StorePath::parse("users").unwrap().child("a b&50%").unwrap();
        assert_eq!(client.url_for(&spaced).path(), "/users/a%20b&50%25.json");
    }

    #[test]
    fn test_url_for_keeps_base_path() {
        let client =
            RtdbClient::with_config(StoreClientConfig::new("http://localhost:9000/ns/")).unwrap();
        let path = StorePath::parse("users/a1b2").unwrap();
        assert_eq!(client.url_for(&path).as_str(), "http://localhost:9000/ns/users/a1b2.json");
    }

    #[test]
    fn test_auth_token_goes_in_query() {
        let config = StoreClientConfig::new("https://demo.firebaseio.com").with_auth_token("s3cr3t");
        let client = RtdbClient::with_config(config).unwrap();
        let path = StorePath::parse("users/a1b2").unwrap();

        let request = client
            .request_builder(Method::PUT, &path, "req-1")
            .build()
            .unwrap();

        assert_eq!(request.url().query(), Some("auth=s3cr3t"));
        assert_eq!(request.headers()[X_REQUEST_ID], "req-1");
    }

    #[test]
    fn test_extract_error_message() {
        assert_eq!(
            extract_error_message(r#"{"error": "Permission denied"}"#),
            "Permission denied"
        );
        assert_eq!(extract_error_message("  Bad Gateway \n"), "Bad Gateway");
    }
}
