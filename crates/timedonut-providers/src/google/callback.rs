//! Loopback listener for the OAuth redirect.
//!
//! The listener lives for exactly one sign-in attempt: it is consumed by
//! [`CallbackServer::wait`] and dropped after the first request of
//! interest, or when the timeout elapses, whichever comes first.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{ProviderError, ProviderResult};

const MAX_HEADER_LINES: usize = 100;

const SUCCESS_PAGE: &str = "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>TimeDonut</title></head>\
<body><h1>Signed in</h1><p>You can close this window and return to TimeDonut.</p>\
<script>setTimeout(() => window.close(), 3000);</script></body></html>";

const FAILURE_PAGE: &str = "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>TimeDonut</title></head>\
<body><h1>Sign-in failed</h1><p>You can close this window and try again.</p></body></html>";

/// Local HTTP listener waiting for `GET <path>?code=..&state=..`.
#[derive(Debug)]
pub struct CallbackServer {
    listener: TcpListener,
    path: String,
}

impl CallbackServer {
    /// Binds `127.0.0.1:port`. Port `0` picks a free port.
    pub async fn bind(port: u16, path: impl Into<String>) -> ProviderResult<Self> {
        let listener = TcpListener::bind(("127.0.0.1", port)).await.map_err(|e| {
            ProviderError::configuration(format!(
                "cannot listen for the OAuth callback on port {}: {}",
                port, e
            ))
            .with_source(e)
        })?;
        debug!(port, "callback listener bound");
        Ok(Self {
            listener,
            path: path.into(),
        })
    }

    pub fn local_addr(&self) -> ProviderResult<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| ProviderError::internal("callback listener has no address").with_source(e))
    }

    /// Waits for the redirect and returns the authorization code.
    ///
    /// Fails with an authentication error when the redirect carries no code,
    /// reports an OAuth error, targets another path, or when `timeout`
    /// elapses first.
    pub async fn wait(self, expected_state: &str, timeout: Duration) -> ProviderResult<String> {
        tokio::select! {
            result = self.accept_one(expected_state) => result,
            _ = tokio::time::sleep(timeout) => {
                warn!(?timeout, "timed out waiting for the OAuth callback");
                Err(ProviderError::authentication("timed out waiting for the authorization callback"))
            }
        }
    }

    /// Serves connections concurrently so a connection that never sends a
    /// request cannot hold up the one carrying the redirect. Connections
    /// still open when this returns are aborted.
    async fn accept_one(&self, expected_state: &str) -> ProviderResult<String> {
        let mut connections = JoinSet::new();
        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer) = accepted.map_err(|e| {
                        ProviderError::internal("failed to accept callback connection").with_source(e)
                    })?;
                    debug!(%peer, "callback connection");
                    let path = self.path.clone();
                    let state = expected_state.to_string();
                    connections.spawn(async move { serve(stream, &path, &state).await });
                }
                Some(joined) = connections.join_next() => {
                    if let Ok(Some(result)) = joined {
                        return result;
                    }
                }
            }
        }
    }
}

/// Serves one connection. `None` means the connection carried no request
/// and the listener keeps waiting.
async fn serve(
    stream: TcpStream,
    callback_path: &str,
    expected_state: &str,
) -> Option<ProviderResult<String>> {
    let mut reader = BufReader::new(stream);
    let mut request_line = String::new();
    match reader.read_line(&mut request_line).await {
        Ok(0) | Err(_) => return None,
        Ok(_) => {}
    }
    if request_line.trim().is_empty() {
        return None;
    }

    // Drain the headers so closing the socket does not reset the
    // connection before the browser reads the page.
    let mut header = String::new();
    for _ in 0..MAX_HEADER_LINES {
        header.clear();
        match reader.read_line(&mut header).await {
            Ok(n) if n > 0 && !header.trim().is_empty() => continue,
            _ => break,
        }
    }

    let result = parse_callback(&request_line, callback_path, expected_state);
    let (status, page) = match result {
        Ok(_) => ("200 OK", SUCCESS_PAGE),
        Err(_) => ("400 Bad Request", FAILURE_PAGE),
    };
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        page.len(),
        page
    );

    let mut stream = reader.into_inner();
    if let Err(e) = stream.write_all(response.as_bytes()).await {
        warn!(error = %e, "failed to write callback response");
    }
    let _ = stream.shutdown().await;

    match result {
        Ok(code) => {
            info!("received authorization code");
            Some(Ok(code))
        }
        Err(reason) => {
            warn!(%reason, "OAuth callback rejected");
            Some(Err(ProviderError::authentication(reason)))
        }
    }
}

/// Validates a request line such as
/// `GET /callback?code=4/abc&state=xyz HTTP/1.1` and extracts the code.
///
/// A `state` that is present must match; the code must be non-empty.
pub(crate) fn parse_callback(
    request_line: &str,
    callback_path: &str,
    expected_state: &str,
) -> Result<String, String> {
    let mut parts = request_line.split_whitespace();
    let (Some(method), Some(target)) = (parts.next(), parts.next()) else {
        return Err("malformed callback request".to_string());
    };
    if method != "GET" {
        return Err(format!("unexpected {} request on the callback listener", method));
    }

    let url = Url::parse("http://localhost")
        .and_then(|base| base.join(target))
        .map_err(|e| format!("malformed callback target: {}", e))?;
    if url.path() != callback_path {
        return Err(format!("unexpected callback path {}", url.path()));
    }

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Err(format!("authorization denied: {}", error));
    }
    if let Some(state) = state
        && state != expected_state
    {
        return Err("OAuth state mismatch".to_string());
    }
    match code {
        Some(code) if !code.is_empty() => Ok(code),
        _ => Err("missing authorization code in callback".to_string()),
    }
}
