use anyhow::Result;
use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION},
    Method,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use shared_config::AppConfig;

/// Non-success responses from the PostgREST API.
///
/// Travels inside `anyhow::Error`; callers that care about the kind of
/// failure use `downcast_ref::<SupabaseError>()`.
#[derive(Debug, Error)]
pub enum SupabaseError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Unique or exclusion constraint violation (HTTP 409).
    #[error("Constraint conflict: {0}")]
    Conflict(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid header value: {0}")]
    InvalidHeader(String),
}

impl SupabaseError {
    fn from_status(status: u16, message: String) -> Self {
        match status {
            401 | 403 => SupabaseError::Auth(message),
            404 => SupabaseError::NotFound(message),
            409 => SupabaseError::Conflict(message),
            _ => SupabaseError::Api { status, message },
        }
    }
}

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> Result<HeaderMap, SupabaseError> {
        let mut headers = HeaderMap::new();

        headers.insert(
            "apikey",
            HeaderValue::from_str(&self.anon_key)
                .map_err(|e| SupabaseError::InvalidHeader(e.to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = auth_token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token))
                    .map_err(|e| SupabaseError::InvalidHeader(e.to_string()))?,
            );
        }

        Ok(headers)
    }

    pub async fn request<T>(&self, method: Method, path: &str,
                            auth_token: Option<&str>, body: Option<Value>)
                            -> Result<T>
    where T: DeserializeOwned {
        self.request_with_headers(method, path, auth_token, body, None).await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<T>
    where T: DeserializeOwned {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers(auth_token)?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url)
            .headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);
            return Err(SupabaseError::from_status(status.as_u16(), error_text).into());
        }

        let data = response.json::<T>().await?;
        Ok(data)
    }

    /// Headers asking PostgREST to echo the written rows back.
    pub fn representation_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        headers
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}

/// True when the error came back from storage as a constraint conflict.
pub fn is_conflict(error: &anyhow::Error) -> bool {
    matches!(error.downcast_ref::<SupabaseError>(), Some(SupabaseError::Conflict(_)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(uri: &str) -> SupabaseClient {
        let config = AppConfig {
            supabase_url: format!("{}/", uri),
            supabase_anon_key: "test-anon-key".to_string(),
            ..AppConfig::default()
        };
        SupabaseClient::new(&config)
    }

    #[tokio::test]
    async fn test_request_sends_api_key_and_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/appointments"))
            .and(header("apikey", "test-anon-key"))
            .and(header("authorization", "Bearer user-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}])))
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let rows: Vec<Value> = client
            .request(Method::GET, "/rest/v1/appointments", Some("user-token"), None)
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(client.get_base_url(), server.uri());
    }

    #[tokio::test]
    async fn test_conflict_status_is_typed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/appointments"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "code": "23P01",
                "message": "conflicting key value violates exclusion constraint"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let err = client
            .request::<Vec<Value>>(Method::POST, "/rest/v1/appointments", None, Some(json!({})))
            .await
            .unwrap_err();

        assert!(is_conflict(&err));
        assert_matches!(err.downcast_ref::<SupabaseError>(), Some(SupabaseError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_auth_and_not_found_statuses() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/private"))
            .respond_with(ResponseTemplate::new(401).set_body_string("JWT expired"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no table"))
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let auth_err = client
            .request::<Value>(Method::GET, "/rest/v1/private", None, None)
            .await
            .unwrap_err();
        let missing_err = client
            .request::<Value>(Method::GET, "/rest/v1/missing", None, None)
            .await
            .unwrap_err();

        assert_matches!(auth_err.downcast_ref::<SupabaseError>(), Some(SupabaseError::Auth(_)));
        assert_matches!(missing_err.downcast_ref::<SupabaseError>(), Some(SupabaseError::NotFound(_)));
        assert!(!is_conflict(&auth_err));
    }
}
