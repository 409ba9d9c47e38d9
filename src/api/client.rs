use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode, Url};
use serde_json::{Map, Value};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::StudioSettings;
use crate::session::SessionHandle;

pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong";
pub const UNPARSEABLE_ERROR_MESSAGE: &str = "Failed to parse error response";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("you need to log in to do that")]
    Unauthenticated,

    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{message}")]
    Http { status: StatusCode, message: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl ApiError {
    pub fn is_unauthenticated(&self) -> bool {
        match self {
            Self::Unauthenticated => true,
            Self::Http { status, .. } => *status == StatusCode::UNAUTHORIZED,
            Self::Timeout { .. }
            | Self::Transport(_)
            | Self::MalformedResponse(_)
            | Self::Configuration(_) => false,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Transport(error) => error.status(),
            Self::Unauthenticated
            | Self::Timeout { .. }
            | Self::MalformedResponse(_)
            | Self::Configuration(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Required,
    Anonymous,
}

#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    segments: Vec<String>,
    body: Option<Value>,
    headers: HeaderMap,
    auth: AuthMode,
}

impl ApiRequest {
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            segments: path
                .split('/')
                .filter(|segment| !segment.is_empty())
                .map(str::to_owned)
                .collect(),
            body: None,
            headers: HeaderMap::new(),
            auth: AuthMode::Required,
        }
    }

    pub fn get(path: &str) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: &str) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn patch(path: &str) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: &str) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn segment(mut self, segment: impl Into<String>) -> Self {
        self.segments.push(segment.into());
        self
    }

    pub fn json_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn anonymous(mut self) -> Self {
        self.auth = AuthMode::Anonymous;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn auth(&self) -> AuthMode {
        self.auth
    }

    pub fn path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http_client: reqwest::Client,
    base_url: Url,
    session: SessionHandle,
    request_timeout: Duration,
}

impl ApiClient {
    pub fn new(
        base_url: &str,
        session: SessionHandle,
        request_timeout: Duration,
    ) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url).map_err(|error| {
            ApiError::Configuration(format!("invalid API base URL `{base_url}`: {error}"))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::Configuration(format!(
                "API base URL `{base_url}` cannot carry a path"
            )));
        }

        Ok(Self {
            http_client: reqwest::Client::new(),
            base_url,
            session,
            request_timeout,
        })
    }

    pub fn from_settings(
        settings: &StudioSettings,
        session: SessionHandle,
    ) -> Result<Self, ApiError> {
        Self::new(
            &settings.api_base_url,
            session,
            settings.request_timeout(),
        )
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub async fn send(&self, request: ApiRequest) -> Result<Value, ApiError> {
        let timeout_ms = u64::try_from(self.request_timeout.as_millis()).unwrap_or(u64::MAX);
        match timeout(self.request_timeout, self.send_once(request)).await {
            Ok(result) => result,
            Err(_) => Err(ApiError::Timeout { timeout_ms }),
        }
    }

    async fn send_once(&self, request: ApiRequest) -> Result<Value, ApiError> {
        let ApiRequest {
            method,
            segments,
            body,
            mut headers,
            auth,
        } = request;

        if auth == AuthMode::Required {
            let token = self.session.bearer_token().await?;
            let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                ApiError::Configuration("session token is not a valid header value".to_owned())
            })?;
            headers.insert(AUTHORIZATION, value);
        }
        apply_json_content_type(&mut headers, body.is_some());

        let url = self.resolve_url(&segments)?;
        debug!(method = %method, url = %url, has_body = body.is_some(), "sending API request");

        let mut builder = self.http_client.request(method.clone(), url.clone()).headers(headers);
        if let Some(body) = body {
            builder = builder.body(body.to_string());
        }

        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = error_message_from_body(&text);
            warn!(
                method = %method,
                url = %url,
                status = status.as_u16(),
                message = %message,
                "API request failed"
            );
            return Err(ApiError::Http { status, message });
        }

        let text = response.text().await?;
        parse_success_body(&text)
    }

    fn resolve_url(&self, segments: &[String]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ApiError::Configuration(format!(
                    "API base URL `{}` cannot carry a path",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

fn apply_json_content_type(headers: &mut HeaderMap, has_body: bool) {
    if has_body && !headers.contains_key(CONTENT_TYPE) {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }
}

fn error_message_from_body(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(value) => value
            .get("error")
            .and_then(Value::as_str)
            .filter(|message| !message.trim().is_empty())
            .map(str::to_owned)
            .unwrap_or_else(|| GENERIC_ERROR_MESSAGE.to_owned()),
        Err(_) => UNPARSEABLE_ERROR_MESSAGE.to_owned(),
    }
}

fn parse_success_body(body: &str) -> Result<Value, ApiError> {
    if body.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }

    serde_json::from_str(body).map_err(|error| ApiError::MalformedResponse(error.to_string()))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
    use serde_json::json;

    use super::*;
    use crate::session::SessionProvider;

    #[test]
    fn error_message_uses_backend_error_field() {
        assert_eq!(error_message_from_body(r#"{"error":"not found"}"#), "not found");
    }

    #[test]
    fn error_message_falls_back_for_json_without_error() {
        assert_eq!(
            error_message_from_body(r#"{"message":"nope"}"#),
            GENERIC_ERROR_MESSAGE
        );
        assert_eq!(error_message_from_body(r#"{"error":42}"#), GENERIC_ERROR_MESSAGE);
    }

    #[test]
    fn error_message_falls_back_for_unparseable_body() {
        assert_eq!(
            error_message_from_body("<html>502 Bad Gateway</html>"),
            UNPARSEABLE_ERROR_MESSAGE
        );
        assert_eq!(error_message_from_body(""), UNPARSEABLE_ERROR_MESSAGE);
    }

    #[test]
    fn empty_success_body_becomes_empty_object() {
        assert_eq!(parse_success_body("").expect("empty is ok"), json!({}));
        assert_eq!(parse_success_body("  \n").expect("blank is ok"), json!({}));
    }

    #[test]
    fn non_json_success_body_is_malformed() {
        let error = parse_success_body("ok").expect_err("plain text should fail");
        assert!(matches!(error, ApiError::MalformedResponse(_)));
    }

    #[test]
    fn content_type_only_added_with_body_and_never_overridden() {
        let mut headers = HeaderMap::new();
        apply_json_content_type(&mut headers, false);
        assert!(headers.get(CONTENT_TYPE).is_none());

        apply_json_content_type(&mut headers, true);
        assert_eq!(
            headers.get(CONTENT_TYPE).and_then(|value| value.to_str().ok()),
            Some("application/json")
        );

        let mut custom = HeaderMap::new();
        custom.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        apply_json_content_type(&mut custom, true);
        assert_eq!(
            custom.get(CONTENT_TYPE).and_then(|value| value.to_str().ok()),
            Some("text/plain")
        );
    }

    #[test]
    fn request_path_splits_and_encodes_segments() {
        let provider = SessionProvider::from_token(None);
        let client = ApiClient::new(
            "http://localhost:3000/backend/",
            provider.handle(),
            Duration::from_secs(1),
        )
        .expect("base url should parse");

        let request = ApiRequest::delete("/api/designs").segment("a b/c");
        assert_eq!(request.path(), "/api/designs/a b/c");

        let url = client
            .resolve_url(&request.segments)
            .expect("url should resolve");
        assert_eq!(
            url.as_str(),
            "http://localhost:3000/backend/api/designs/a%20b%2Fc"
        );
    }

    #[test]
    fn invalid_base_url_is_a_configuration_error() {
        let provider = SessionProvider::from_token(None);
        let error = ApiClient::new("not a url", provider.handle(), Duration::from_secs(1))
            .expect_err("invalid url should fail");
        assert!(matches!(error, ApiError::Configuration(_)));
    }

    #[tokio::test]
    async fn protected_request_without_session_fails_before_network() {
        let provider = SessionProvider::from_token(None);
        // Port 9 is discard; the call must fail on auth before any connect attempt.
        let client = ApiClient::new("http://127.0.0.1:9", provider.handle(), Duration::from_secs(5))
            .expect("base url should parse");

        let error = client
            .send(ApiRequest::get("/api/my-designs"))
            .await
            .expect_err("signed-out session should fail");
        assert!(matches!(error, ApiError::Unauthenticated));
        assert!(error.is_unauthenticated());
    }

    #[test]
    fn http_error_displays_backend_message_verbatim() {
        let error = ApiError::Http {
            status: StatusCode::NOT_FOUND,
            message: "not found".to_owned(),
        };
        assert_eq!(error.to_string(), "not found");
        assert_eq!(error.status(), Some(StatusCode::NOT_FOUND));
    }
}
