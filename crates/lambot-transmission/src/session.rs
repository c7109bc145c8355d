//! Session bootstrap and the retrying RPC client.
//!
//! Transmission issues a session token through the
//! `X-Transmission-Session-Id` response header, typically on a 409 reply
//! (the daemon's handshake convention). Every subsequent call must carry
//! the most recently issued token; a 409 mid-call means the token went
//! stale and the refreshed header value is adopted before the next retry.

use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::{Client, StatusCode, header};
use secrecy::{ExposeSecret, SecretBox};
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep_until, timeout_at};

use crate::error::TransmissionError;
use crate::protocol::{Request, Torrent, TorrentArguments, decode_response};

/// Header carrying the session token.
pub const SESSION_HEADER: &str = "X-Transmission-Session-Id";

const MAX_IDLE_CONNS: usize = 4;
const IDLE_CONN_TIMEOUT: Duration = Duration::from_secs(90);

/// Retry policy for one logical `post` call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum attempts for the same request.
    pub max_attempts: usize,
    /// Fixed (non-exponential) delay between attempts.
    pub backoff: Duration,
    /// One overall deadline shared by all attempts and backoff sleeps.
    pub deadline: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(1),
            deadline: Duration::from_secs(10),
        }
    }
}

/// An authenticated session against a Transmission daemon.
///
/// One logical session per process. The token slot is behind a mutex so
/// concurrent calls may share the session while refreshes stay
/// single-writer; the underlying HTTP client pools connections across
/// calls.
#[derive(Debug)]
pub struct Session {
    url: String,
    auth_header: SecretBox<str>,
    token: Mutex<String>,
    client: Client,
    policy: RetryPolicy,
}

/// Per-attempt outcome, before the retry loop decides what to do.
enum Attempt {
    /// Recorded and retried after backoff.
    Transient(String),
    /// Surfaced immediately, never retried.
    Fatal(TransmissionError),
}

impl Session {
    /// Bootstrap a session with the default retry policy.
    ///
    /// # Errors
    ///
    /// `Connection` on transport failure; `Protocol` when the daemon does
    /// not return a session id header.
    pub async fn connect(
        url: &str,
        username: &str,
        password: &str,
    ) -> Result<Self, TransmissionError> {
        Self::connect_with_policy(url, username, password, RetryPolicy::default()).await
    }

    /// Bootstrap a session with an explicit retry policy.
    ///
    /// Performs one authenticated POST and takes the session token from the
    /// response header, whatever the status code: the daemon returns the
    /// header even on the 409 handshake reply.
    ///
    /// # Errors
    ///
    /// `Connection` on transport failure; `Protocol` when the session id
    /// header is absent.
    pub async fn connect_with_policy(
        url: &str,
        username: &str,
        password: &str,
        policy: RetryPolicy,
    ) -> Result<Self, TransmissionError> {
        let client = Client::builder()
            .pool_max_idle_per_host(MAX_IDLE_CONNS)
            .pool_idle_timeout(IDLE_CONN_TIMEOUT)
            .build()
            .map_err(|e| TransmissionError::Connection(e.to_string()))?;

        let auth_header = format!("Basic {}", BASE64.encode(format!("{username}:{password}")));

        let response = client
            .post(url)
            .header(header::AUTHORIZATION, &auth_header)
            .send()
            .await
            .map_err(|e| TransmissionError::Connection(e.to_string()))?;

        let token = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
            .ok_or_else(|| TransmissionError::Protocol("session id missing".to_string()))?;

        tracing::debug!(url, "transmission session established");

        Ok(Self {
            url: url.to_string(),
            auth_header: SecretBox::new(auth_header.into_boxed_str()),
            token: Mutex::new(token),
            client,
            policy,
        })
    }

    /// The RPC endpoint this session talks to.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The most recently issued session token.
    pub async fn session_token(&self) -> String {
        self.token.lock().await.clone()
    }

    /// Fetch the full torrent listing.
    ///
    /// # Errors
    ///
    /// Any [`TransmissionError`] from [`Session::post`] or the decode step.
    pub async fn get_torrents(&self) -> Result<Vec<Torrent>, TransmissionError> {
        let body = self.post(&Request::torrent_get(&[])).await?;
        let args: TorrentArguments = decode_response(&body)?;
        Ok(args.torrents)
    }

    /// Send one signed RPC request, retrying transient failures.
    ///
    /// Network failures and statuses >= 400 are recorded and retried after
    /// a fixed backoff, up to the attempt budget, all under one shared
    /// deadline. A 409 refreshes the session token from the response header
    /// before the next attempt. A body-read failure is fatal.
    ///
    /// # Errors
    ///
    /// `Io` on a failed body read; `RetryExhausted` when every attempt
    /// within the deadline failed, aggregating the recorded errors.
    pub async fn post(&self, request: &Request) -> Result<Vec<u8>, TransmissionError> {
        let body =
            serde_json::to_vec(request).map_err(|e| TransmissionError::Decode(e.to_string()))?;

        let deadline = Instant::now() + self.policy.deadline;
        let mut attempts_made = 0;
        let mut errors: Vec<String> = Vec::new();

        for attempt in 1..=self.policy.max_attempts {
            attempts_made = attempt;
            match timeout_at(deadline, self.attempt(&body)).await {
                Ok(Ok(bytes)) => return Ok(bytes),
                Ok(Err(Attempt::Fatal(err))) => return Err(err),
                Ok(Err(Attempt::Transient(msg))) => {
                    tracing::warn!(attempt, error = %msg, "transmission request failed");
                    errors.push(format!("attempt {attempt}: {msg}"));
                }
                Err(_) => {
                    errors.push(format!("attempt {attempt}: deadline exceeded"));
                    break;
                }
            }

            if attempt < self.policy.max_attempts {
                sleep_until(deadline.min(Instant::now() + self.policy.backoff)).await;
                if Instant::now() >= deadline {
                    errors.push("deadline exceeded during backoff".to_string());
                    break;
                }
            }
        }

        Err(TransmissionError::RetryExhausted {
            attempts: attempts_made,
            errors: errors.join("; "),
        })
    }

    async fn attempt(&self, body: &[u8]) -> Result<Vec<u8>, Attempt> {
        let token = self.token.lock().await.clone();

        let response = self
            .client
            .post(&self.url)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "application/json")
            .header(header::AUTHORIZATION, self.auth_header.expose_secret())
            .header(SESSION_HEADER, token)
            .body(body.to_vec())
            .send()
            .await
            .map_err(|e| Attempt::Transient(format!("connection: {e}")))?;

        let status = response.status();

        if status == StatusCode::CONFLICT {
            // Stale token handshake: adopt the freshest issued id before
            // the next attempt.
            if let Some(fresh) = response
                .headers()
                .get(SESSION_HEADER)
                .and_then(|v| v.to_str().ok())
            {
                let mut slot = self.token.lock().await;
                *slot = fresh.to_string();
                tracing::debug!("refreshed transmission session id");
            }
            return Err(Attempt::Transient(format!("status {status}")));
        }

        if status.as_u16() >= 400 {
            return Err(Attempt::Transient(format!("status {status}")));
        }

        match response.bytes().await {
            Ok(bytes) => Ok(bytes.to_vec()),
            Err(e) => Err(Attempt::Fatal(TransmissionError::Io(e.to_string()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    const TORRENTS_BODY: &str = concat!(
        r#"{"arguments":{"torrents":"#,
        r#"[{"id":1,"name":"a","status":4,"rateDownload":100,"rateUpload":0}]},"#,
        r#""result":"success"}"#
    );

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            backoff: Duration::from_millis(10),
            deadline: Duration::from_secs(5),
        }
    }

    fn http_response(status: &str, extra_headers: &[(&str, &str)], body: &str) -> String {
        let mut resp = format!(
            "HTTP/1.1 {status}\r\nConnection: close\r\nContent-Length: {}\r\n",
            body.len()
        );
        for (name, value) in extra_headers {
            resp.push_str(&format!("{name}: {value}\r\n"));
        }
        resp.push_str("\r\n");
        resp.push_str(body);
        resp
    }

    async fn read_request(sock: &mut TcpStream) {
        let mut buf = Vec::new();
        let mut tmp = [0u8; 1024];
        loop {
            let Ok(n) = sock.read(&mut tmp).await else {
                return;
            };
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&tmp[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let headers = String::from_utf8_lossy(&buf[..pos]).to_lowercase();
                let len = headers
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= pos + 4 + len {
                    return;
                }
            }
        }
    }

    /// Serve a fixed sequence of raw responses, one connection each.
    async fn serve_sequence(responses: Vec<String>) -> (String, Arc<AtomicUsize>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        tokio::spawn(async move {
            for resp in responses {
                let Ok((mut sock, _)) = listener.accept().await else {
                    return;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                read_request(&mut sock).await;
                let _ = sock.write_all(resp.as_bytes()).await;
                let _ = sock.shutdown().await;
            }
        });
        (format!("http://{addr}/transmission/rpc"), hits)
    }

    #[tokio::test]
    async fn bootstrap_stores_issued_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_header("authorization", "Basic dTpw") // u:p
            .with_status(409)
            .with_header(SESSION_HEADER, "tok-1")
            .create_async()
            .await;

        let session = Session::connect(&server.url(), "u", "p").await.unwrap();
        assert_eq!(session.session_token().await, "tok-1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn bootstrap_without_header_is_protocol_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(200)
            .create_async()
            .await;

        let err = Session::connect(&server.url(), "u", "p").await.unwrap_err();
        assert!(matches!(err, TransmissionError::Protocol(_)));
    }

    #[tokio::test]
    async fn bootstrap_network_failure_is_connection_error() {
        // Nothing listens on port 1.
        let err = Session::connect("http://127.0.0.1:1", "u", "p")
            .await
            .unwrap_err();
        assert!(matches!(err, TransmissionError::Connection(_)));
    }

    #[tokio::test]
    async fn retry_returns_third_attempt_body() {
        let (url, hits) = serve_sequence(vec![
            http_response("409 Conflict", &[(SESSION_HEADER, "tok")], ""),
            http_response("500 Internal Server Error", &[], ""),
            http_response("500 Internal Server Error", &[], ""),
            http_response("200 OK", &[], TORRENTS_BODY),
        ])
        .await;

        let session = Session::connect_with_policy(&url, "u", "p", fast_policy())
            .await
            .unwrap();
        let torrents = session.get_torrents().await.unwrap();

        assert_eq!(torrents.len(), 1);
        assert_eq!(torrents[0].name, "a");
        assert_eq!(torrents[0].rate_download, 100);
        // Bootstrap plus exactly three attempts, never more than the budget.
        assert_eq!(hits.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn exhausted_attempts_yield_retry_exhausted() {
        let mut server = mockito::Server::new_async().await;
        let bootstrap = server
            .mock("POST", "/")
            .match_header(SESSION_HEADER, Matcher::Missing)
            .with_status(409)
            .with_header(SESSION_HEADER, "tok")
            .create_async()
            .await;
        let failing = server
            .mock("POST", "/")
            .match_header(SESSION_HEADER, "tok")
            .with_status(500)
            .expect(3)
            .create_async()
            .await;

        let session = Session::connect_with_policy(&server.url(), "u", "p", fast_policy())
            .await
            .unwrap();
        let err = session.get_torrents().await.unwrap_err();

        match err {
            TransmissionError::RetryExhausted { attempts, errors } => {
                assert_eq!(attempts, 3);
                assert!(errors.contains("attempt 1"));
                assert!(errors.contains("attempt 3"));
            }
            other => panic!("expected RetryExhausted, got {other:?}"),
        }
        bootstrap.assert_async().await;
        failing.assert_async().await;
    }

    #[tokio::test]
    async fn deadline_bounds_total_wall_clock() {
        let mut server = mockito::Server::new_async().await;
        let _bootstrap = server
            .mock("POST", "/")
            .match_header(SESSION_HEADER, Matcher::Missing)
            .with_status(409)
            .with_header(SESSION_HEADER, "tok")
            .create_async()
            .await;
        let _failing = server
            .mock("POST", "/")
            .match_header(SESSION_HEADER, "tok")
            .with_status(500)
            .create_async()
            .await;

        // Ten attempts at 1s backoff would naively take ~9s; the 300ms
        // deadline must cut the loop short, even mid-backoff.
        let policy = RetryPolicy {
            max_attempts: 10,
            backoff: Duration::from_secs(1),
            deadline: Duration::from_millis(300),
        };
        let session = Session::connect_with_policy(&server.url(), "u", "p", policy)
            .await
            .unwrap();

        let started = std::time::Instant::now();
        let err = session.get_torrents().await.unwrap_err();
        let elapsed = started.elapsed();

        assert!(matches!(err, TransmissionError::RetryExhausted { .. }));
        assert!(elapsed < Duration::from_secs(1), "took {elapsed:?}");
    }

    #[tokio::test]
    async fn stale_token_is_refreshed_before_retry() {
        let mut server = mockito::Server::new_async().await;
        let _bootstrap = server
            .mock("POST", "/")
            .match_header(SESSION_HEADER, Matcher::Missing)
            .with_status(409)
            .with_header(SESSION_HEADER, "stale")
            .create_async()
            .await;
        let _conflict = server
            .mock("POST", "/")
            .match_header(SESSION_HEADER, "stale")
            .with_status(409)
            .with_header(SESSION_HEADER, "fresh")
            .create_async()
            .await;
        let success = server
            .mock("POST", "/")
            .match_header(SESSION_HEADER, "fresh")
            .with_status(200)
            .with_body(TORRENTS_BODY)
            .create_async()
            .await;

        let session = Session::connect_with_policy(&server.url(), "u", "p", fast_policy())
            .await
            .unwrap();
        let torrents = session.get_torrents().await.unwrap();

        assert_eq!(torrents.len(), 1);
        assert_eq!(session.session_token().await, "fresh");
        success.assert_async().await;
    }

    #[tokio::test]
    async fn truncated_body_is_io_error_and_not_retried() {
        // Content-Length larger than the delivered body, then close.
        let truncated = format!(
            "HTTP/1.1 200 OK\r\nConnection: close\r\nContent-Length: 1000\r\n\r\n{}",
            "{\"partial\":"
        );
        let (url, hits) = serve_sequence(vec![
            http_response("409 Conflict", &[(SESSION_HEADER, "tok")], ""),
            truncated,
        ])
        .await;

        let session = Session::connect_with_policy(&url, "u", "p", fast_policy())
            .await
            .unwrap();
        let err = session.post(&Request::torrent_get(&[])).await.unwrap_err();

        assert!(matches!(err, TransmissionError::Io(_)));
        // Bootstrap plus a single attempt: fatal errors skip the retry loop.
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }
}
