//! Upstream fetcher (C1): issues a single authenticated HTTP GET and
//! returns the raw exchange for the audit log plus the parsed status.

use http::HeaderMap;
use std::time::Duration;
use uuid::Uuid;

/// Response cap for the raw body retained in the exchange record.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Everything the audit sink needs to record one attempt, independent of
/// whether the attempt succeeded.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub method: String,
    pub url: String,
    pub request_headers: HeaderMap,
    pub response_headers: HeaderMap,
    pub response_body: Option<Vec<u8>>,
    pub status_code: i32,
}

pub struct UpstreamFetcher {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl UpstreamFetcher {
    pub fn new(client: reqwest::Client, base_url: String, api_key: String) -> Self {
        Self {
            client,
            base_url,
            api_key,
        }
    }

    /// Probe `{base}/healthz` once at startup. Non-200 or a transport
    /// failure is the caller's signal to abort startup.
    pub async fn health_check(&self) -> Result<(), String> {
        let url = format!("{}/healthz", self.base_url);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(format!("health check returned {}", resp.status()))
        }
    }

    /// Fetch the current status for `id`. On decode failure, or on a
    /// transport error, returns an empty status string rather than
    /// halting — the exchange is still returned so the audit log can
    /// record the attempt.
    pub async fn fetch(&self, id: Uuid, deadline: Duration) -> (String, Exchange) {
        let url = format!("{}/api/v1/payments/{id}", self.base_url);

        let mut request_headers = HeaderMap::new();
        let auth_value = format!("Bearer {}", self.api_key);
        if let Ok(v) = http::HeaderValue::from_str(&auth_value) {
            request_headers.insert(http::header::AUTHORIZATION, v);
        }

        let send = self
            .client
            .get(&url)
            .header(http::header::AUTHORIZATION, &auth_value)
            .send();

        let response = match tokio::time::timeout(deadline, send).await {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => {
                tracing::warn!(payment_id = %id, error = %e, "upstream transport error");
                return (
                    String::new(),
                    Exchange {
                        method: "GET".to_string(),
                        url,
                        request_headers,
                        response_headers: HeaderMap::new(),
                        response_body: None,
                        status_code: 0,
                    },
                );
            }
            Err(_) => {
                tracing::warn!(payment_id = %id, "upstream fetch deadline exceeded");
                return (
                    String::new(),
                    Exchange {
                        method: "GET".to_string(),
                        url,
                        request_headers,
                        response_headers: HeaderMap::new(),
                        response_body: None,
                        status_code: 0,
                    },
                );
            }
        };

        let status_code = response.status().as_u16() as i32;
        let is_success = response.status().is_success();
        let response_headers = response.headers().clone();
        let body = match response.bytes().await {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(payment_id = %id, error = %e, "failed to read upstream body");
                return (
                    String::new(),
                    Exchange {
                        method: "GET".to_string(),
                        url,
                        request_headers,
                        response_headers,
                        response_body: None,
                        status_code,
                    },
                );
            }
        };

        let truncated: Vec<u8> = body.iter().take(MAX_BODY_BYTES).copied().collect();

        let status = if is_success {
            serde_json::from_slice::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| {
                    v.get("data")
                        .and_then(|d| d.get("status"))
                        .and_then(|s| s.as_str())
                        .map(|s| s.to_string())
                })
                .unwrap_or_default()
        } else {
            String::new()
        };

        (
            status,
            Exchange {
                method: "GET".to_string(),
                url,
                request_headers,
                response_headers,
                response_body: Some(truncated),
                status_code,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::get, Json, Router};
    use std::net::SocketAddr;

    async fn spawn_mock(status: &'static str, code: u16) -> String {
        let app = Router::new().route(
            "/api/v1/payments/{id}",
            get(move || async move {
                (
                    axum::http::StatusCode::from_u16(code).unwrap(),
                    Json(serde_json::json!({"data": {"status": status}})),
                )
            }),
        );
        let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn fetch_parses_status_from_envelope() {
        let base = spawn_mock("PAID", 200).await;
        let fetcher =
            UpstreamFetcher::new(reqwest::Client::new(), base, "test-key".to_string());
        let (status, exchange) = fetcher.fetch(Uuid::new_v4(), Duration::from_secs(5)).await;
        assert_eq!(status, "PAID");
        assert_eq!(exchange.status_code, 200);
    }

    #[tokio::test]
    async fn fetch_returns_empty_status_on_server_error() {
        let base = spawn_mock("PENDING", 500).await;
        let fetcher =
            UpstreamFetcher::new(reqwest::Client::new(), base, "test-key".to_string());
        let (status, exchange) = fetcher.fetch(Uuid::new_v4(), Duration::from_secs(5)).await;
        assert_eq!(status, "");
        assert_eq!(exchange.status_code, 500);
    }

    #[tokio::test]
    async fn request_headers_carry_bearer_token() {
        let base = spawn_mock("PENDING", 200).await;
        let fetcher =
            UpstreamFetcher::new(reqwest::Client::new(), base, "secret-xyz".to_string());
        let (_, exchange) = fetcher.fetch(Uuid::new_v4(), Duration::from_secs(5)).await;
        assert_eq!(
            exchange
                .request_headers
                .get(http::header::AUTHORIZATION)
                .unwrap(),
            "Bearer secret-xyz"
        );
    }
}
