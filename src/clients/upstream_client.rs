use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use reqwest::{header::AUTHORIZATION, Client};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error, warn};

use crate::config::Config;

/// Remote data source consulted by the home page.
///
/// Every failure (network, status, body) collapses into `None`.
#[async_trait]
pub trait UpstreamService: Send + Sync {
    async fn service(&self) -> Option<Value>;

    async fn service_with_parameter(&self, pk: &str) -> Option<Value>;
}

#[derive(Debug, Clone)]
enum Credentials {
    Static(String),
    ServiceJwt { secret: String, service_name: String },
    Anonymous,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    #[serde(rename = "type")]
    type_: String,
    exp: usize,
}

#[derive(Debug)]
pub struct UpstreamClient {
    client: Client,
    base_url: String,
    credentials: Credentials,
}

impl UpstreamClient {
    pub fn new(base_url: String, config: &Config) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;

        let credentials = match (&config.upstream_jwt_secret, &config.upstream_token) {
            (Some(secret), _) => Credentials::ServiceJwt {
                secret: secret.clone(),
                service_name: config.service_name.clone(),
            },
            (None, Some(token)) => Credentials::Static(token.clone()),
            (None, None) => Credentials::Anonymous,
        };

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn generate_token(secret: &str, service_name: &str) -> Result<String, jsonwebtoken::errors::Error> {
        // 1 minute expiration
        let expiration = (Utc::now() + Duration::seconds(60)).timestamp();

        let claims = Claims {
            sub: service_name.to_string(),
            type_: "service".to_string(),
            exp: expiration as usize,
        };

        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
    }

    fn bearer_token(&self) -> Option<String> {
        match &self.credentials {
            Credentials::Static(token) => Some(token.clone()),
            Credentials::ServiceJwt { secret, service_name } => match Self::generate_token(secret, service_name) {
                Ok(token) => Some(token),
                Err(e) => {
                    error!("Failed to generate service token: {}", e);
                    None
                }
            },
            Credentials::Anonymous => None,
        }
    }

    async fn make_request(&self, url: &str) -> Option<Value> {
        let mut request = self.client.get(url);
        if let Some(token) = self.bearer_token() {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        let response = match request.send().await.and_then(|r| r.error_for_status()) {
            Ok(response) => response,
            Err(e) => {
                warn!("Upstream request to {} failed: {}", url, e);
                return None;
            }
        };

        match response.json::<Value>().await {
            Ok(value) => {
                debug!("Upstream response from {}", url);
                Some(value)
            }
            Err(e) => {
                warn!("Upstream response from {} is not JSON: {}", url, e);
                None
            }
        }
    }
}

#[async_trait]
impl UpstreamService for UpstreamClient {
    async fn service(&self) -> Option<Value> {
        self.make_request(&format!("{}/api/v1/service", self.base_url)).await
    }

    async fn service_with_parameter(&self, pk: &str) -> Option<Value> {
        self.make_request(&format!("{}/api/v1/service/{}", self.base_url, pk)).await
    }
}

/// Placeholder payload used when no upstream is configured
pub struct StaticUpstream;

#[async_trait]
impl UpstreamService for StaticUpstream {
    async fn service(&self) -> Option<Value> {
        Some(json!({ "json_data": true }))
    }

    async fn service_with_parameter(&self, _pk: &str) -> Option<Value> {
        Some(json!({ "json_data": true }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

    #[test]
    fn jwt_secret_takes_precedence_over_static_token() {
        let mut config = Config::default();
        config.upstream_token = Some("static".to_string());
        config.upstream_jwt_secret = Some("secret".to_string());

        let client = UpstreamClient::new("http://upstream/".to_string(), &config).unwrap();
        assert_eq!(client.base_url, "http://upstream");

        let token = client.bearer_token().unwrap();
        let data = decode::<Value>(
            &token,
            &DecodingKey::from_secret(b"secret"),
            &Validation::new(Algorithm::HS256),
        )
        .unwrap();
        assert_eq!(data.claims["sub"], "relay-portal");
        assert_eq!(data.claims["type"], "service");
    }

    #[test]
    fn static_token_is_sent_verbatim() {
        let mut config = Config::default();
        config.upstream_token = Some("XXXX".to_string());
        let client = UpstreamClient::new("http://upstream".to_string(), &config).unwrap();
        assert_eq!(client.bearer_token().as_deref(), Some("XXXX"));
    }

    #[tokio::test]
    async fn unreachable_upstream_yields_none() {
        // Nothing listens on port 1.
        let client = UpstreamClient::new("http://127.0.0.1:1".to_string(), &Config::default()).unwrap();
        assert!(client.service().await.is_none());
        assert!(client.service_with_parameter("42").await.is_none());
    }

    #[tokio::test]
    async fn static_upstream_returns_placeholder() {
        assert_eq!(StaticUpstream.service().await, Some(json!({ "json_data": true })));
    }
}
