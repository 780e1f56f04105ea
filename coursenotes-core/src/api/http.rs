use async_trait::async_trait;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use serde_json::Value;
use std::sync::Arc;

use super::{ApiError, ApiRequest, Method, Transport};
use crate::address::API_PREFIX;
use crate::patch::Patch;

/// Cookie the backend stores its CSRF token in.
pub const DEFAULT_CSRF_COOKIE: &str = "csrf_access_token";
/// Header the CSRF token is echoed back in.
pub const CSRF_HEADER: &str = "X-CSRF-TOKEN";

/// `reqwest`-backed transport with a session cookie jar.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
    jar: Arc<Jar>,
    csrf_cookie: String,
}

impl HttpTransport {
    /// Creates a transport for the server at `base_url` (e.g. `http://127.0.0.1:5555`).
    ///
    /// A path in `base_url` (`https://host/notes`) prefixes every request.
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let mut base_url = Url::parse(base_url).map_err(|e| {
            ApiError::Configuration(format!("invalid server url '{}': {}", base_url, e))
        })?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let jar = Arc::new(Jar::default());
        let client = reqwest::Client::builder()
            .cookie_provider(jar.clone())
            .build()
            .map_err(|e| ApiError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            jar,
            csrf_cookie: DEFAULT_CSRF_COOKIE.to_string(),
        })
    }

    /// Reads the CSRF token from a different cookie.
    pub fn with_csrf_cookie(mut self, name: impl Into<String>) -> Self {
        self.csrf_cookie = name.into();
        self
    }

    /// Puts previously saved `name=value` cookies back into the jar.
    pub fn restore_cookies<I, S>(&self, cookies: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for cookie in cookies {
            self.jar
                .add_cookie_str(&format!("{}; Path=/", cookie.as_ref()), &self.base_url);
        }
    }

    /// All cookies the jar would send to the server, as `name=value` pairs.
    pub fn cookies(&self) -> Vec<String> {
        self.jar
            .cookies(&self.base_url)
            .and_then(|header| {
                header
                    .to_str()
                    .ok()
                    .map(|s| s.split("; ").map(str::to_string).collect())
            })
            .unwrap_or_default()
    }

    /// Value of a single cookie.
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.cookies().into_iter().find_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            (key == name).then(|| value.to_string())
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::Configuration(e.to_string()))
    }

    /// Signs in. The server answers with the user object and sets the
    /// access and CSRF cookies, which stay in this transport's jar.
    pub async fn login(&self, username: &str, password: &str) -> Result<Value, ApiError> {
        let mut body = Patch::new();
        body.insert("username".to_string(), Value::from(username));
        body.insert("password".to_string(), Value::from(password));

        self.send(ApiRequest::post(format!("{}/login", API_PREFIX), body))
            .await?
            .ok_or_else(|| ApiError::Decode("empty login response".to_string()))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<Option<Value>, ApiError> {
        let url = self.endpoint(&request.path)?;

        let mut builder = self
            .client
            .request(request.method.into(), url)
            .header(CONTENT_TYPE, "application/json");

        if request.method.is_mutating() {
            match self.cookie(&self.csrf_cookie) {
                Some(token) => builder = builder.header(CSRF_HEADER, token),
                None => tracing::debug!(cookie = %self.csrf_cookie, "no CSRF cookie in jar"),
            }
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        tracing::debug!(method = %request.method, path = %request.path, "sending request");
        let response = builder.send().await.map_err(|e| {
            tracing::warn!(method = %request.method, path = %request.path, "request failed: {}", e);
            ApiError::Transport(e.to_string())
        })?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        if !(200..300).contains(&status) {
            tracing::debug!(status, path = %request.path, "server returned an error");
            return Err(ApiError::from_response(status, &body));
        }
        decode_success(request.method, status, &body)
    }
}

/// Decodes a 2xx body. Deletes may answer 204, an empty body or non-JSON.
fn decode_success(method: Method, status: u16, body: &[u8]) -> Result<Option<Value>, ApiError> {
    if status == 204 || body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    match serde_json::from_slice(body) {
        Ok(value) => Ok(Some(value)),
        Err(_) if method == Method::Delete => Ok(None),
        Err(e) => Err(ApiError::Decode(e.to_string())),
    }
}
