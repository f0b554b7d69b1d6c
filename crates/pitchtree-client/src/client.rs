// HTTP client for the analytics backend.
//
// Every call is a single request/response with explicit connect and request
// timeouts. There are no retries: a failure is returned to the caller as-is
// and the caller decides how to surface it. Cancellation is done by aborting
// the task that awaits the call.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::protocol::{
    AnalysisRequest, AnalysisResponse, ErrorBody, HealthStatus, League, PitcherOption,
    UploadResponse,
};
use crate::upload::CsvUpload;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000/api";
/// Environment variable that overrides the configured base URL.
pub const BASE_URL_ENV: &str = "PITCHTREE_API_URL";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {endpoint} timed out")]
    Timeout { endpoint: String },

    #[error("could not reach backend at {endpoint}: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// Non-2xx response. Displays the backend's `error` text verbatim.
    #[error("{message}")]
    Backend { status: u16, message: String },

    #[error("unexpected response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    /// True when the backend could not be reached at all.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, ApiError::Timeout { .. } | ApiError::Transport { .. })
    }

    fn from_reqwest(endpoint: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            ApiError::Timeout {
                endpoint: endpoint.to_string(),
            }
        } else {
            ApiError::Transport {
                endpoint: endpoint.to_string(),
                source,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// AnalyticsBackend trait
// ---------------------------------------------------------------------------

/// The four backend operations the dashboard depends on.
#[async_trait]
pub trait AnalyticsBackend: Send + Sync {
    async fn pitchers(&self, league: League) -> Result<Vec<PitcherOption>, ApiError>;

    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResponse, ApiError>;

    async fn upload_milb(
        &self,
        upload: CsvUpload,
        pitcher_id: &str,
    ) -> Result<UploadResponse, ApiError>;

    async fn health(&self) -> Result<HealthStatus, ApiError>;
}

// ---------------------------------------------------------------------------
// ClientSettings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    pub base_url: String,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub upload_timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        ClientSettings {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            upload_timeout: Duration::from_secs(120),
        }
    }
}

/// Pick the base URL: a non-empty override wins over the configured value.
/// Trailing slashes are dropped so endpoint paths can be appended directly.
pub fn resolve_base_url(configured: &str, env_override: Option<&str>) -> String {
    let chosen = match env_override.map(str::trim) {
        Some(url) if !url.is_empty() => url,
        _ => configured.trim(),
    };
    chosen.trim_end_matches('/').to_string()
}

// ---------------------------------------------------------------------------
// ApiClient
// ---------------------------------------------------------------------------

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    upload_timeout: Duration,
}

impl ApiClient {
    /// Build a client from settings as given.
    pub fn new(settings: &ClientSettings) -> Result<Self, ApiError> {
        let base_url = resolve_base_url(&settings.base_url, None);
        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .connect_timeout(settings.connect_timeout)
            .build()
            .map_err(|e| ApiError::from_reqwest(&base_url, e))?;
        Ok(ApiClient {
            http,
            base_url,
            upload_timeout: settings.upload_timeout,
        })
    }

    /// Like [`ApiClient::new`] but honours `PITCHTREE_API_URL`.
    pub fn from_env(settings: &ClientSettings) -> Result<Self, ApiError> {
        let env = std::env::var(BASE_URL_ENV).ok();
        let mut settings = settings.clone();
        settings.base_url = resolve_base_url(&settings.base_url, env.as_deref());
        if env.is_some() {
            debug!(base_url = %settings.base_url, "base URL overridden from environment");
        }
        ApiClient::new(&settings)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        debug!(endpoint, "backend request");
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::from_reqwest(endpoint, e))?;
        read_json(endpoint, response).await
    }
}

async fn read_json<T: DeserializeOwned>(
    endpoint: &str,
    response: reqwest::Response,
) -> Result<T, ApiError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| ApiError::from_reqwest(endpoint, e))?;

    if !status.is_success() {
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .map(|b| b.error)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| format!("HTTP error! status: {}", status.as_u16()));
        warn!(endpoint, status = status.as_u16(), %message, "backend returned error");
        return Err(ApiError::Backend {
            status: status.as_u16(),
            message,
        });
    }

    serde_json::from_str(&body).map_err(|source| ApiError::Decode {
        endpoint: endpoint.to_string(),
        source,
    })
}

#[async_trait]
impl AnalyticsBackend for ApiClient {
    async fn pitchers(&self, league: League) -> Result<Vec<PitcherOption>, ApiError> {
        let endpoint = format!("/pitchers/{}", league.as_path());
        let req = self.http.get(self.url(&endpoint));
        self.send_json(&endpoint, req).await
    }

    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResponse, ApiError> {
        let req = self.http.post(self.url("/analyze")).json(request);
        self.send_json("/analyze", req).await
    }

    async fn upload_milb(
        &self,
        upload: CsvUpload,
        pitcher_id: &str,
    ) -> Result<UploadResponse, ApiError> {
        let endpoint = "/upload-milb";
        let form = upload
            .into_form(pitcher_id)
            .map_err(|e| ApiError::from_reqwest(endpoint, e))?;
        let req = self
            .http
            .post(self.url(endpoint))
            .timeout(self.upload_timeout)
            .multipart(form);
        self.send_json(endpoint, req).await
    }

    async fn health(&self) -> Result<HealthStatus, ApiError> {
        let req = self.http.get(self.url("/health"));
        self.send_json("/health", req).await
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Handedness, OpponentType};
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Read one full HTTP request (headers plus Content-Length body).
    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut data = Vec::new();
        let mut buf = vec![0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            data.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&data);
            if let Some(head_end) = text.find("\r\n\r\n") {
                let content_length = text[..head_end]
                    .lines()
                    .find_map(|l| {
                        let (k, v) = l.split_once(':')?;
                        k.eq_ignore_ascii_case("content-length")
                            .then(|| v.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if data.len() >= head_end + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&data).into_owned()
    }

    /// Serve exactly one response, returning the raw request text.
    async fn serve_once(status: &'static str, body: &'static str) -> (SocketAddr, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.flush().await.unwrap();
            request
        });
        (addr, handle)
    }

    fn client_for(addr: SocketAddr) -> ApiClient {
        ApiClient::new(&ClientSettings {
            base_url: format!("http://{addr}/api"),
            request_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
            upload_timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[test]
    fn env_override_wins_when_non_empty() {
        assert_eq!(
            resolve_base_url("http://localhost:5000/api", Some("https://stats.example.org/api/")),
            "https://stats.example.org/api"
        );
        assert_eq!(
            resolve_base_url("http://localhost:5000/api/", Some("   ")),
            "http://localhost:5000/api"
        );
        assert_eq!(resolve_base_url(DEFAULT_BASE_URL, None), DEFAULT_BASE_URL);
    }

    #[test]
    fn backend_error_displays_message_verbatim() {
        let err = ApiError::Backend {
            status: 404,
            message: "Pitcher not found".into(),
        };
        assert_eq!(err.to_string(), "Pitcher not found");
        assert!(!err.is_connectivity());
    }

    #[tokio::test]
    async fn pitchers_hits_league_path() {
        let (addr, server) =
            serve_once("200 OK", r#"[{"label":"Paul Skenes","value":694973}]"#).await;
        let pitchers = client_for(addr).pitchers(League::Milb).await.unwrap();
        assert_eq!(
            pitchers,
            vec![PitcherOption {
                label: "Paul Skenes".into(),
                value: 694973
            }]
        );
        let request = server.await.unwrap();
        assert!(request.starts_with("GET /api/pitchers/milb "), "{request}");
    }

    #[tokio::test]
    async fn analyze_posts_json_body() {
        let body = r#"{"pitcher_name":"Gerrit Cole","opponent_name":"League Average","years":["2024"],"league":"mlb","total_pitches":12,"recommendations":[]}"#;
        let (addr, server) = serve_once("200 OK", body).await;
        let req = AnalysisRequest {
            pitcher_id: 543037,
            years: vec!["2024".into()],
            opponent_type: OpponentType::Average,
            batter_name: None,
            handedness: Some(Handedness::R),
            min_pitches: 10,
        };
        let resp = client_for(addr).analyze(&req).await.unwrap();
        assert_eq!(resp.pitcher_name, "Gerrit Cole");
        assert_eq!(resp.total_pitches, 12);

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /api/analyze "));
        assert!(request.contains("\"pitcher_id\":543037"));
        assert!(!request.contains("batter_name"));
    }

    #[tokio::test]
    async fn error_body_is_surfaced_verbatim() {
        let (addr, _server) = serve_once("404 Not Found", r#"{"error":"Pitcher not found"}"#).await;
        let err = client_for(addr).health().await.unwrap_err();
        match &err {
            ApiError::Backend { status, message } => {
                assert_eq!(*status, 404);
                assert_eq!(message, "Pitcher not found");
            }
            other => panic!("expected Backend error, got: {other:?}"),
        }
        assert_eq!(err.to_string(), "Pitcher not found");
    }

    #[tokio::test]
    async fn error_without_json_body_falls_back_to_status() {
        let (addr, _server) = serve_once("500 Internal Server Error", "boom").await;
        let err = client_for(addr).health().await.unwrap_err();
        assert_eq!(err.to_string(), "HTTP error! status: 500");
    }

    #[tokio::test]
    async fn malformed_success_body_is_decode_error() {
        let (addr, _server) = serve_once("200 OK", r#"{"status":"healthy"}"#).await;
        let err = client_for(addr).health().await.unwrap_err();
        assert!(matches!(err, ApiError::Decode { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn upload_sends_multipart_form() {
        let (addr, server) = serve_once(
            "200 OK",
            r#"{"message":"MiLB data uploaded successfully","pitcher_id":"42"}"#,
        )
        .await;
        let upload = CsvUpload::new(
            "milb.csv",
            "text/csv",
            b"pitch_type,description,balls,strikes,events\nSL,ball,0,0,\n".to_vec(),
        )
        .unwrap();
        let resp = client_for(addr).upload_milb(upload, "42").await.unwrap();
        assert_eq!(resp.pitcher_id, "42");

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /api/upload-milb "));
        assert!(request.contains("multipart/form-data"));
        assert!(request.contains("name=\"file\"; filename=\"milb.csv\""));
        assert!(request.contains("name=\"pitcher_id\""));
    }

    #[tokio::test]
    async fn unreachable_backend_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client_for(addr).health().await.unwrap_err();
        assert!(err.is_connectivity(), "{err:?}");
    }

    #[tokio::test]
    async fn slow_backend_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let _ = read_request(&mut socket).await;
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let client = ApiClient::new(&ClientSettings {
            base_url: format!("http://{addr}/api"),
            request_timeout: Duration::from_millis(200),
            connect_timeout: Duration::from_secs(1),
            upload_timeout: Duration::from_secs(1),
        })
        .unwrap();
        let err = client.health().await.unwrap_err();
        assert!(matches!(err, ApiError::Timeout { .. }), "{err:?}");
    }
}
