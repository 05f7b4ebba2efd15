//! HTTP client for the channel-authorization endpoint.
//!
//! Handles custom headers, timeout management, and TLS certificate policy
//! for the authorization POST issued before subscribing to a private channel.

use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use tracing::debug;

use pusher_core::config::AuthConfig;
use pusher_core::error::{PusherError, PusherResult};

/// HTTP client for the channel-authorization endpoint.
///
/// Wraps reqwest::Client with the configured endpoint URL, header
/// injection, and TLS policy. Certificate verification is on by default;
/// `accept_invalid_certs` must be set explicitly to weaken it.
#[derive(Clone)]
pub struct AuthClient {
    inner: Client,
    /// Authorization endpoint URL.
    url: String,
    /// Custom headers applied to every request.
    custom_headers: Vec<(String, String)>,
}

impl AuthClient {
    /// Create a new AuthClient from authorization configuration.
    pub fn new(config: &AuthConfig) -> PusherResult<Self> {
        if config.url.is_empty() {
            return Err(PusherError::MissingConfig("auth.url".into()));
        }

        let mut builder = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .connect_timeout(Duration::from_secs(15));

        if config.accept_invalid_certs {
            builder = builder.danger_accept_invalid_certs(true);
        }

        if let Some(ref version) = config.min_tls_version {
            builder = builder.min_tls_version(parse_tls_version(version)?);
        }

        let inner = builder
            .build()
            .map_err(|e| PusherError::Http(format!("failed to build HTTP client: {e}")))?;

        let custom_headers = config
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Ok(Self {
            inner,
            url: config.url.clone(),
            custom_headers,
        })
    }

    /// Get the configured endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Apply custom headers to a request builder.
    fn apply_headers(&self, mut builder: RequestBuilder) -> RequestBuilder {
        for (key, value) in &self.custom_headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        builder
    }

    /// Request an authorization token for the given socket id and channel.
    ///
    /// Issues `POST <url>` with body `socket_id=<id>&channel_name=<channel>`
    /// (URL-form-encoded) and returns the raw response body. No retry: the
    /// subscribe flow calling this is a strict sequence.
    pub async fn authorize(&self, socket_id: &str, channel: &str) -> PusherResult<String> {
        debug!("authorizing channel {channel} for socket {socket_id} via {}", self.url);

        let form = [("socket_id", socket_id), ("channel_name", channel)];
        let builder = self.apply_headers(self.inner.post(&self.url).form(&form));

        let response = builder.send().await.map_err(classify_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PusherError::AuthFailed {
                status: status.as_u16(),
                message: truncate_body(&body),
            });
        }

        response
            .text()
            .await
            .map_err(|e| PusherError::Http(format!("failed to read authorization body: {e}")))
    }
}

/// Classify a reqwest error into a PusherError variant.
fn classify_error(e: reqwest::Error) -> PusherError {
    if e.is_timeout() {
        PusherError::Timeout(e.to_string())
    } else if e.is_connect() {
        PusherError::Http(format!("connection failed: {e}"))
    } else {
        PusherError::Http(e.to_string())
    }
}

/// Parse a configured minimum TLS version string.
fn parse_tls_version(version: &str) -> PusherResult<reqwest::tls::Version> {
    match version {
        "1.2" => Ok(reqwest::tls::Version::TLS_1_2),
        "1.3" => Ok(reqwest::tls::Version::TLS_1_3),
        other => Err(PusherError::Config(format!(
            "unsupported min_tls_version '{other}', expected \"1.2\" or \"1.3\""
        ))),
    }
}

/// Keep error bodies short enough for logs and error messages.
///
/// Cuts at the largest char boundary within the limit so multibyte
/// responses cannot split a code point.
fn truncate_body(body: &str) -> String {
    const MAX: usize = 256;
    if body.len() <= MAX {
        return body.to_string();
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
#[cfg(test)]
mod tests {
    use super::*;

    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};

    /// Serve exactly one request on an ephemeral port, returning the
    /// endpoint URL and a handle yielding the raw request text.
    fn spawn_responder(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, std::thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let request = read_request(&mut stream);
            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).unwrap();
            request
        });
        (format!("http://{addr}/pusher/auth"), handle)
    }

    /// Read one request: headers, then as many body bytes as
    /// Content-Length announces.
    fn read_request(stream: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = stream.read(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(end) = text.find("\r\n\r\n") {
                let body_len = text[..end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())?
                    })
                    .unwrap_or(0);
                if buf.len() >= end + 4 + body_len {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    fn test_config() -> AuthConfig {
        AuthConfig {
            url: "https://example.com/pusher/auth".into(),
            headers: [("X-Api-Token".to_string(), "secret".to_string())]
                .into_iter()
                .collect(),
            timeout_ms: 30_000,
            accept_invalid_certs: false,
            min_tls_version: None,
        }
    }

    #[test]
    fn test_client_requires_url() {
        let config = AuthConfig::default();
        assert!(matches!(
            AuthClient::new(&config),
            Err(PusherError::MissingConfig(_))
        ));
    }

    #[test]
    fn test_client_construction() {
        let client = AuthClient::new(&test_config()).unwrap();
        assert_eq!(client.url(), "https://example.com/pusher/auth");
        assert_eq!(client.custom_headers.len(), 1);
    }

    #[test]
    fn test_parse_tls_version() {
        assert!(parse_tls_version("1.2").is_ok());
        assert!(parse_tls_version("1.3").is_ok());
        assert!(matches!(
            parse_tls_version("1.1"),
            Err(PusherError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_authorize_posts_form_and_returns_body() {
        let (url, responder) = spawn_responder("200 OK", r#"{"auth":"key:sig"}"#);
        let mut config = test_config();
        config.url = url;

        let client = AuthClient::new(&config).unwrap();
        let body = client.authorize("123.456", "private-room").await.unwrap();
        assert_eq!(body, r#"{"auth":"key:sig"}"#);

        let request = responder.join().unwrap();
        assert!(request.starts_with("POST /pusher/auth HTTP/1.1"));
        assert!(request.contains("socket_id=123.456"));
        assert!(request.contains("channel_name=private-room"));
        // Header names are normalized to lowercase on the wire.
        assert!(request.to_ascii_lowercase().contains("x-api-token: secret"));
    }

    #[tokio::test]
    async fn test_authorize_non_success_yields_auth_failed() {
        let (url, responder) = spawn_responder("403 Forbidden", "denied");
        let mut config = test_config();
        config.url = url;

        let client = AuthClient::new(&config).unwrap();
        let err = client
            .authorize("123.456", "private-room")
            .await
            .unwrap_err();
        match err {
            PusherError::AuthFailed { status, message } => {
                assert_eq!(status, 403);
                assert_eq!(message, "denied");
            }
            other => panic!("expected auth failure, got {other}"),
        }
        responder.join().unwrap();
    }

    #[test]
    fn test_truncate_body() {
        let short = "ok";
        assert_eq!(truncate_body(short), "ok");

        let long = "x".repeat(1000);
        let truncated = truncate_body(&long);
        assert!(truncated.len() < 300);
        assert!(truncated.ends_with("..."));
    }

    #[test]
    fn test_truncate_body_respects_char_boundaries() {
        // The two-byte character straddles the 256-byte cut point.
        let body = format!("{}é and more", "a".repeat(255));
        let truncated = truncate_body(&body);
        assert_eq!(truncated, format!("{}...", "a".repeat(255)));
    }
}
