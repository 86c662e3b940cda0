use crate::error::ClientError;
use crate::metrics::Metrics;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, StatusCode};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[cfg(test)]
mod test;

pub const USER_AGENT: &str = concat!("grow(kudzu)/", env!("CARGO_PKG_VERSION"));

/// Timeout bound http client, which authenticates every request with a bearer
/// token and maps failures onto `ClientError`.
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    metrics: Arc<dyn Metrics>,
}

impl Client {
    pub fn new(timeout: Duration, metrics: Arc<dyn Metrics>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        Ok(Client { http, metrics })
    }

    pub async fn get(&self, url: &str, token: &str) -> Result<Vec<u8>, ClientError> {
        self.send(Method::GET, url, token, None).await
    }

    pub async fn post(&self, url: &str, token: &str, body: Vec<u8>) -> Result<Vec<u8>, ClientError> {
        self.send(Method::POST, url, token, Some(body)).await
    }

    pub async fn patch(&self, url: &str, token: &str, body: Vec<u8>) -> Result<Vec<u8>, ClientError> {
        self.send(Method::PATCH, url, token, Some(body)).await
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        token: &str,
        body: Option<Vec<u8>>,
    ) -> Result<Vec<u8>, ClientError> {
        debug!(method = %method, url = url, "Sending request");

        let mut builder = self.http.request(method.clone(), url).bearer_auth(token);
        if let Some(body) = body {
            builder = builder.header(CONTENT_TYPE, "application/json").body(body);
        }
        let request = builder.build()?;
        let host = request.url().host_str().unwrap_or_default().to_owned();

        let start = Instant::now();
        let resp = match self.http.execute(request).await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(method = %method, url = url, "Failed making request: {}", e);
                return Err(e.into());
            }
        };

        let status = resp.status();
        self.metrics.observe_request(
            method.as_str(),
            &host,
            status.as_u16(),
            start.elapsed().as_secs_f64(),
        );

        if !status.is_success() {
            warn!(method = %method, url = url, code = status.as_u16(), "Unexpected response code");
            return Err(match status {
                StatusCode::UNAUTHORIZED => ClientError::Unauthorized,
                StatusCode::NOT_FOUND => ClientError::NotFound,
                other => ClientError::Unexpected(other),
            });
        }

        Ok(resp.bytes().await?.to_vec())
    }
}
