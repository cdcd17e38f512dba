use crate::api::models::{Envelope, Page, RawPage};
use crate::config::Session;
use crate::error::{ApiError, Result};
use reqwest::header::AUTHORIZATION;
use reqwest::{Client as HttpClient, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// What happens when any endpoint answers 401. Installed once on the
/// client, so chat and non-chat calls share it.
pub trait UnauthorizedPolicy: Send + Sync {
    fn on_unauthorized(&self, session: &Session);
}

/// Drops the token and user, then tells whoever cares (the front end uses
/// this to go back to the login screen).
#[derive(Default)]
pub struct ClearSession {
    listener: Option<Box<dyn Fn() + Send + Sync>>,
}

impl ClearSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_listener(listener: impl Fn() + Send + Sync + 'static) -> Self {
        Self { listener: Some(Box::new(listener)) }
    }
}

impl UnauthorizedPolicy for ClearSession {
    fn on_unauthorized(&self, session: &Session) {
        log::info!("backend rejected the session token, logging out");
        session.clear();
        if let Some(listener) = &self.listener {
            listener();
        }
    }
}

#[derive(Clone)]
pub struct ApiClient {
    http: HttpClient,
    base: Url,
    policy: Arc<dyn UnauthorizedPolicy>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = HttpClient::builder().timeout(REQUEST_TIMEOUT).build()?;
        let base = Url::parse(&crate::utils::normalize_url(base_url))?;
        Ok(Self { http, base, policy: Arc::new(ClearSession::new()) })
    }

    pub fn with_policy(mut self, policy: impl UnauthorizedPolicy + 'static) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Starts a request against the backend with the session's bearer token.
    /// Without a token the call goes out bare and the backend decides.
    pub fn request(&self, method: Method, path: &str, session: &Session) -> RequestBuilder {
        let req = self.http.request(method, self.endpoint(path));
        with_auth(req, session.token().as_deref())
    }

    pub fn get(&self, path: &str, session: &Session) -> RequestBuilder {
        self.request(Method::GET, path, session)
    }

    pub fn post(&self, path: &str, session: &Session) -> RequestBuilder {
        self.request(Method::POST, path, session)
    }

    pub fn put(&self, path: &str, session: &Session) -> RequestBuilder {
        self.request(Method::PUT, path, session)
    }

    pub fn delete(&self, path: &str, session: &Session) -> RequestBuilder {
        self.request(Method::DELETE, path, session)
    }

    /// Sends and unwraps the envelope's `data` into `T`.
    pub async fn send<T: DeserializeOwned>(&self, req: RequestBuilder, session: &Session) -> Result<T> {
        let envelope = self.execute(req, session).await?;
        Ok(serde_json::from_value(envelope.data.unwrap_or(Value::Null))?)
    }

    /// Sends and returns the envelope's `message`, ignoring any payload.
    pub async fn send_ack(&self, req: RequestBuilder, session: &Session) -> Result<String> {
        Ok(self.execute(req, session).await?.message)
    }

    pub async fn send_page<T: DeserializeOwned>(&self, req: RequestBuilder, session: &Session) -> Result<Page<T>> {
        let raw: RawPage = self.send(req, session).await?;
        Ok(raw.into_page()?)
    }

    async fn execute(&self, req: RequestBuilder, session: &Session) -> Result<Envelope<Value>> {
        let req = req.build()?;
        // without a bearer there is no session to expire (bad login, reset flow)
        let had_token = req.headers().contains_key(AUTHORIZATION);
        let resp = self.http.execute(req).await?;
        let status = resp.status();
        log::debug!("{} {}", status.as_u16(), resp.url().path());

        if status == StatusCode::UNAUTHORIZED && had_token {
            self.policy.on_unauthorized(session);
            return Err(ApiError::Unauthorized);
        }
        let body = resp.text().await?;
        if !status.is_success() {
            let body = serde_json::from_str::<Envelope<Value>>(&body)
                .ok()
                .map(|e| e.message)
                .filter(|m| !m.is_empty())
                .unwrap_or(body);
            return Err(ApiError::Status { status, body });
        }

        let envelope: Envelope<Value> = serde_json::from_str(&body)?;
        if !envelope.success {
            let message = if envelope.message.is_empty() {
                "Request failed".to_string()
            } else {
                envelope.message
            };
            return Err(ApiError::Rejected(message));
        }
        Ok(envelope)
    }
}

pub(crate) fn with_auth(mut req: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    if let Some(t) = token {
        req = req.bearer_auth(t);
    }
    req
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_join_without_double_slashes() {
        let client = ApiClient::new("api.example.com/").unwrap();
        assert_eq!(client.endpoint("/chat/conversations"), "https://api.example.com/chat/conversations");
        assert_eq!(client.endpoint("items"), "https://api.example.com/items");
    }

    #[test]
    fn bearer_token_is_attached_only_when_present() {
        let client = ApiClient::new("http://localhost:3001").unwrap();
        let anon = client.get("/orders", &Session::default()).build().unwrap();
        assert!(anon.headers().get("authorization").is_none());

        let session = Session::new(Some("abc".into()), None);
        let authed = client.get("/orders", &session).build().unwrap();
        assert_eq!(authed.headers()["authorization"], "Bearer abc");
    }
}
