use anyhow::{Context, Result};
use async_trait::async_trait;

use super::{Oracle, OracleError, OracleRequest, OracleResponse};

/// Posts each request as JSON to `endpoint` and expects an
/// [`OracleResponse`] body back.
pub struct HttpOracle {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpOracle {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("lingofit/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to initialize HTTP client")?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Oracle for HttpOracle {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn consult(&self, request: &OracleRequest) -> Result<OracleResponse, OracleError> {
        let res = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| OracleError::Transport(e.to_string()))?;

        if !res.status().is_success() {
            return Err(OracleError::Status(res.status().as_u16()));
        }

        res.json::<OracleResponse>()
            .await
            .map_err(|e| OracleError::InvalidResponse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::core::classify::{CandidateId, CandidateKind};
    use crate::core::source::FileId;

    /// Serves exactly one HTTP response and hands back the request body.
    fn serve_once(status: &'static str, body: &'static str) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut received = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = stream.read(&mut buf).unwrap();
                received.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&received).to_string();
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let length = text[..header_end]
                        .lines()
                        .find_map(|l| {
                            let (name, value) = l.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if received.len() >= header_end + 4 + length || n == 0 {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).unwrap();
            let text = String::from_utf8_lossy(&received).to_string();
            text.split_once("\r\n\r\n")
                .map(|(_, body)| body.to_string())
                .unwrap_or_default()
        });
        (format!("http://{}/translate", addr), handle)
    }

    fn request() -> OracleRequest {
        OracleRequest {
            candidate: CandidateId {
                file: FileId(0),
                index: 2,
            },
            kind: CandidateKind::Simple,
            file: "src/App.tsx".to_string(),
            subject: "Hello".to_string(),
            context: None,
            key: Some("hello".to_string()),
            source_locale: "en".to_string(),
            locales: vec!["es".to_string()],
            existing_keys: vec!["nav_home".to_string()].into(),
        }
    }

    #[tokio::test]
    async fn test_posts_request_and_parses_response() {
        let (endpoint, server) = serve_once(
            "200 OK",
            r#"{"translations":{"es":"Hola"},"confidence":0.75}"#,
        );
        let oracle = HttpOracle::new(endpoint).unwrap();
        let response = oracle.consult(&request()).await.unwrap();
        assert_eq!(response.translations["es"], "Hola");
        assert_eq!(response.confidence, 0.75);

        let sent: serde_json::Value = serde_json::from_str(&server.join().unwrap()).unwrap();
        assert_eq!(sent["subject"], "Hello");
        assert_eq!(sent["existingKeys"][0], "nav_home");
    }

    #[tokio::test]
    async fn test_server_error_is_a_status_error() {
        let (endpoint, server) = serve_once("503 Service Unavailable", "{}");
        let oracle = HttpOracle::new(endpoint).unwrap();
        let err = oracle.consult(&request()).await.unwrap_err();
        assert_eq!(err, OracleError::Status(503));
        assert!(err.is_retryable());
        server.join().unwrap();
    }

    #[tokio::test]
    async fn test_malformed_body_is_not_retryable() {
        let (endpoint, server) = serve_once("200 OK", "not json");
        let oracle = HttpOracle::new(endpoint).unwrap();
        let err = oracle.consult(&request()).await.unwrap_err();
        assert!(matches!(err, OracleError::InvalidResponse(_)));
        assert!(!err.is_retryable());
        server.join().unwrap();
    }
}
