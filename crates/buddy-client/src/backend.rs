use reqwest::{Method, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::BackendError;

/// HTTP access to one Help Buddy server: named procedures under `/rpc` and
/// bearer-authenticated tables under `/tables`.
#[derive(Clone)]
pub struct Backend {
    http: reqwest::Client,
    base_url: String,
}

impl Backend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// WebSocket URL of the change feed.
    pub fn gateway_url(&self) -> String {
        let ws_base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            self.base_url.clone()
        };
        format!("{ws_base}/gateway")
    }

    /// Call a named procedure.
    pub async fn rpc<A, R>(&self, name: &str, args: &A) -> Result<R, BackendError>
    where
        A: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        debug!("rpc {}", name);
        let request = self
            .http
            .post(format!("{}/rpc/{}", self.base_url, name))
            .json(args);
        self.json(request).await
    }

    pub async fn get<R: DeserializeOwned>(
        &self,
        path: &str,
        token: &str,
        query: &[(&str, String)],
    ) -> Result<R, BackendError> {
        let request = self.table(Method::GET, path, token).query(query);
        self.json(request).await
    }

    pub async fn post<B, R>(&self, path: &str, token: &str, body: &B) -> Result<R, BackendError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let request = self.table(Method::POST, path, token).json(body);
        self.json(request).await
    }

    pub async fn patch<B, R>(&self, path: &str, token: &str, body: &B) -> Result<R, BackendError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let request = self.table(Method::PATCH, path, token).json(body);
        self.json(request).await
    }

    /// Send a request whose success carries no body.
    pub async fn delete(
        &self,
        path: &str,
        token: &str,
        query: &[(&str, String)],
    ) -> Result<(), BackendError> {
        let request = self.table(Method::DELETE, path, token).query(query);
        self.send(request).await.map(|_| ())
    }

    /// Post without caring about the response body.
    pub async fn post_empty<B: Serialize + ?Sized>(
        &self,
        path: &str,
        token: &str,
        body: &B,
    ) -> Result<(), BackendError> {
        let request = self.table(Method::POST, path, token).json(body);
        self.send(request).await.map(|_| ())
    }

    fn table(&self, method: Method, path: &str, token: &str) -> RequestBuilder {
        debug!("{} {}", method, path);
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(token)
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, BackendError> {
        let response = request.send().await.map_err(BackendError::transport)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.bytes().await.unwrap_or_default();
        Err(BackendError::from_response(status.as_u16(), &body))
    }

    async fn json<R: DeserializeOwned>(&self, request: RequestBuilder) -> Result<R, BackendError> {
        let response = self.send(request).await?;
        let status = response.status().as_u16();
        response
            .json::<R>()
            .await
            .map_err(|e| BackendError::decode(status, e))
    }
}
