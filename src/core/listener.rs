//! Redirect Listener
//!
//! Loopback HTTP endpoint that captures the authorization redirect.
//!
//! The endpoint is owned by the [`BoundRedirect`] returned from
//! [`RedirectListener::bind`]. [`BoundRedirect::close`] stops it and waits
//! for the socket to be released; dropping it stops it without waiting.

use async_trait::async_trait;
use axum::extract::{RawQuery, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use url::{Host, Url};

use crate::core::state::states_match;
use crate::error::{ConfigurationError, ListenerError, OAuth2Error, OAuth2Result};
use crate::types::CallbackParams;

/// Time given to in-flight browser responses when the endpoint is closed.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

const SUCCESS_PAGE: &str = "<!DOCTYPE html><html><head><title>Login successful</title></head>\
<body><h1>Login successful</h1><p>You can close this window and return to the terminal.</p></body></html>";

const FAILURE_PAGE: &str = "<!DOCTYPE html><html><head><title>Login failed</title></head>\
<body><h1>Login failed</h1><p>Return to the terminal for details.</p></body></html>";

const NOT_FOUND_PAGE: &str = "<h1>Not Found</h1>";

/// Redirect listener interface (for dependency injection).
#[async_trait]
pub trait RedirectListener: Send + Sync {
    /// Claim the endpoint named by `redirect_url`.
    async fn bind(&self, redirect_url: &Url) -> OAuth2Result<Box<dyn BoundRedirect>>;
}

/// A claimed redirect endpoint.
#[async_trait]
pub trait BoundRedirect: Send {
    /// Redirect URI to send to the provider, with any ephemeral port resolved.
    fn redirect_uri(&self) -> String;

    /// Wait for the redirect and answer the browser.
    async fn accept(&mut self, expected_state: &str) -> OAuth2Result<CallbackParams>;

    /// Stop serving and release the endpoint.
    async fn close(&mut self) {}
}

/// Redirect URI as sent to the provider.
///
/// A bare origin (`http://localhost:8123`) is sent without the trailing slash
/// `Url` adds on parse.
pub fn redirect_uri_string(url: &Url) -> String {
    let s = url.as_str();
    if url.path() == "/" && url.query().is_none() && url.fragment().is_none() {
        s.trim_end_matches('/').to_string()
    } else {
        s.to_string()
    }
}

/// Check that `url` names an http loopback endpoint and resolve its address.
pub fn loopback_address(url: &Url) -> OAuth2Result<SocketAddr> {
    let non_loopback = || -> OAuth2Error {
        ConfigurationError::NonLoopbackRedirect {
            url: url.to_string(),
        }
        .into()
    };

    if url.scheme() != "http" {
        return Err(non_loopback());
    }

    let ip = match url.host() {
        Some(Host::Domain(domain)) if domain.eq_ignore_ascii_case("localhost") => {
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
        Some(Host::Ipv4(ip)) if ip.is_loopback() => IpAddr::V4(ip),
        Some(Host::Ipv6(ip)) if ip.is_loopback() => IpAddr::V6(ip),
        _ => return Err(non_loopback()),
    };

    Ok(SocketAddr::new(ip, url.port_or_known_default().unwrap_or(80)))
}

/// Loopback HTTP server answering the redirect path and 404 elsewhere.
#[derive(Debug, Default, Clone)]
pub struct LoopbackRedirectListener {
    success_redirect_url: Option<Url>,
}

impl LoopbackRedirectListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Send the browser here (302) after a successful redirect.
    pub fn with_success_redirect(mut self, url: Option<Url>) -> Self {
        self.success_redirect_url = url;
        self
    }
}

#[async_trait]
impl RedirectListener for LoopbackRedirectListener {
    async fn bind(&self, redirect_url: &Url) -> OAuth2Result<Box<dyn BoundRedirect>> {
        let address = loopback_address(redirect_url)?;

        // Router paths treat these segment prefixes as captures.
        let path = redirect_url.path();
        if path
            .split('/')
            .any(|segment| segment.starts_with(':') || segment.starts_with('*'))
        {
            return Err(ConfigurationError::InvalidConfig {
                message: format!("unsupported redirect path: {}", path),
            }
            .into());
        }

        let listener = TcpListener::bind(address)
            .await
            .map_err(|e| ListenerError::BindFailed {
                address: address.to_string(),
                message: e.to_string(),
            })?;

        let local = listener.local_addr().map_err(|e| ListenerError::Io {
            message: e.to_string(),
        })?;

        let mut resolved = redirect_url.clone();
        if address.port() == 0 {
            // Only fails for URLs that cannot carry a port, ruled out above.
            let _ = resolved.set_port(Some(local.port()));
        }

        let (callbacks_tx, callbacks_rx) = mpsc::channel(1);
        let app = Router::new()
            .route(path, get(handle_redirect))
            .fallback(not_found)
            .with_state(RedirectState {
                callbacks: callbacks_tx,
                success_redirect_url: self.success_redirect_url.clone(),
            });

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            let shutdown = async move {
                let _ = shutdown_rx.await;
            };
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
            {
                tracing::warn!(error = %e, "Redirect listener stopped");
            }
        });

        tracing::debug!(address = %local, "Redirect listener bound");

        Ok(Box::new(LoopbackRedirect {
            redirect_uri: redirect_uri_string(&resolved),
            callbacks: callbacks_rx,
            shutdown: Some(shutdown_tx),
            server: Some(server),
        }))
    }
}

/// A redirect received by the server, waiting for the verdict that picks
/// the page shown to the browser.
struct PendingCallback {
    params: CallbackParams,
    reply: oneshot::Sender<bool>,
}

#[derive(Clone)]
struct RedirectState {
    callbacks: mpsc::Sender<PendingCallback>,
    success_redirect_url: Option<Url>,
}

async fn handle_redirect(
    State(state): State<RedirectState>,
    RawQuery(query): RawQuery,
) -> Response {
    let params = CallbackParams::from_query(query.as_deref().unwrap_or(""));
    let (reply, verdict) = oneshot::channel();

    if state
        .callbacks
        .send(PendingCallback { params, reply })
        .await
        .is_err()
    {
        return failure_page();
    }

    match (verdict.await, &state.success_redirect_url) {
        (Ok(true), Some(target)) => {
            (StatusCode::FOUND, [(header::LOCATION, target.as_str())]).into_response()
        }
        (Ok(true), None) => Html(SUCCESS_PAGE).into_response(),
        _ => failure_page(),
    }
}

async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Html(NOT_FOUND_PAGE)).into_response()
}

fn failure_page() -> Response {
    (StatusCode::BAD_REQUEST, Html(FAILURE_PAGE)).into_response()
}

struct LoopbackRedirect {
    redirect_uri: String,
    callbacks: mpsc::Receiver<PendingCallback>,
    shutdown: Option<oneshot::Sender<()>>,
    server: Option<JoinHandle<()>>,
}

#[async_trait]
impl BoundRedirect for LoopbackRedirect {
    fn redirect_uri(&self) -> String {
        self.redirect_uri.clone()
    }

    async fn accept(&mut self, expected_state: &str) -> OAuth2Result<CallbackParams> {
        let pending = self
            .callbacks
            .recv()
            .await
            .ok_or_else(|| ListenerError::Io {
                message: "redirect server stopped".to_string(),
            })?;

        let succeeded = pending.params.is_success()
            && pending
                .params
                .state
                .as_deref()
                .is_some_and(|state| states_match(expected_state, state));
        let _ = pending.reply.send(succeeded);

        Ok(pending.params)
    }

    async fn close(&mut self) {
        // Redirects still queued get the failure page.
        self.callbacks.close();
        while let Ok(pending) = self.callbacks.try_recv() {
            let _ = pending.reply.send(false);
        }

        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(mut server) = self.server.take() {
            if tokio::time::timeout(SHUTDOWN_GRACE, &mut server).await.is_err() {
                tracing::debug!("Redirect listener connections still open, aborting");
                server.abort();
                let _ = server.await;
            }
        }
        tracing::debug!(redirect_uri = %self.redirect_uri, "Redirect listener closed");
    }
}

impl Drop for LoopbackRedirect {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(server) = self.server.take() {
            server.abort();
        }
    }
}

/// Scripted outcome for [`MockRedirectListener`].
#[derive(Clone, Debug)]
pub enum MockRedirect {
    /// Redirect with this code and the expected state echoed back.
    Code(String),
    /// Redirect with exactly these parameters.
    Params(CallbackParams),
    /// No redirect ever arrives.
    Never,
}

/// Mock redirect listener for testing.
pub struct MockRedirectListener {
    outcome: Mutex<MockRedirect>,
    bind_count: AtomicUsize,
    active: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl MockRedirectListener {
    pub fn new(outcome: MockRedirect) -> Self {
        Self {
            outcome: Mutex::new(outcome),
            bind_count: AtomicUsize::new(0),
            active: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Change the outcome for subsequent bindings.
    pub fn set_outcome(&self, outcome: MockRedirect) {
        if let Ok(mut current) = self.outcome.lock() {
            *current = outcome;
        }
    }

    /// Number of times `bind` was called.
    pub fn bind_count(&self) -> usize {
        self.bind_count.load(Ordering::SeqCst)
    }

    /// Bindings not yet released.
    pub fn active_bindings(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Bindings released through `close`.
    pub fn close_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RedirectListener for MockRedirectListener {
    async fn bind(&self, redirect_url: &Url) -> OAuth2Result<Box<dyn BoundRedirect>> {
        loopback_address(redirect_url)?;
        self.bind_count.fetch_add(1, Ordering::SeqCst);
        self.active.fetch_add(1, Ordering::SeqCst);

        let outcome = self
            .outcome
            .lock()
            .map(|outcome| outcome.clone())
            .unwrap_or(MockRedirect::Never);

        Ok(Box::new(MockBoundRedirect {
            redirect_uri: redirect_uri_string(redirect_url),
            outcome,
            active: Arc::clone(&self.active),
            closed: Arc::clone(&self.closed),
        }))
    }
}

struct MockBoundRedirect {
    redirect_uri: String,
    outcome: MockRedirect,
    active: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl Drop for MockBoundRedirect {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl BoundRedirect for MockBoundRedirect {
    fn redirect_uri(&self) -> String {
        self.redirect_uri.clone()
    }

    async fn accept(&mut self, expected_state: &str) -> OAuth2Result<CallbackParams> {
        match &self.outcome {
            MockRedirect::Code(code) => Ok(CallbackParams::success(code.clone(), expected_state)),
            MockRedirect::Params(params) => Ok(params.clone()),
            MockRedirect::Never => std::future::pending().await,
        }
    }

    async fn close(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    async fn send_raw(port: u16, request: &str) -> String {
        let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    fn get(target: &str) -> String {
        format!(
            "GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
            target
        )
    }

    fn port_of(redirect_uri: &str) -> u16 {
        Url::parse(redirect_uri).unwrap().port().unwrap()
    }

    async fn bind_callback(listener: &LoopbackRedirectListener) -> (Box<dyn BoundRedirect>, u16) {
        let bound = listener
            .bind(&Url::parse("http://127.0.0.1:0/callback").unwrap())
            .await
            .unwrap();
        let port = port_of(&bound.redirect_uri());
        (bound, port)
    }

    #[test]
    fn test_redirect_uri_string() {
        let url = Url::parse("http://localhost:8123").unwrap();
        assert_eq!(redirect_uri_string(&url), "http://localhost:8123");

        let url = Url::parse("http://127.0.0.1:8123/callback").unwrap();
        assert_eq!(redirect_uri_string(&url), "http://127.0.0.1:8123/callback");
    }

    #[test]
    fn test_loopback_address() {
        let addr = loopback_address(&Url::parse("http://localhost:8123").unwrap()).unwrap();
        assert_eq!(addr, "127.0.0.1:8123".parse().unwrap());

        let addr = loopback_address(&Url::parse("http://[::1]:9000/cb").unwrap()).unwrap();
        assert_eq!(addr, "[::1]:9000".parse().unwrap());

        assert!(loopback_address(&Url::parse("https://localhost:8123").unwrap()).is_err());
        assert!(loopback_address(&Url::parse("http://example.com:8123").unwrap()).is_err());
        assert!(loopback_address(&Url::parse("http://10.0.0.1:8123").unwrap()).is_err());
    }

    #[tokio::test]
    async fn test_ephemeral_port_is_resolved() {
        let (bound, port) = bind_callback(&LoopbackRedirectListener::new()).await;

        let uri = bound.redirect_uri();
        assert!(uri.starts_with("http://127.0.0.1:"));
        assert!(uri.ends_with("/callback"));
        assert_ne!(port, 0);
    }

    #[tokio::test]
    async fn test_capture_style_path_rejected() {
        let result = LoopbackRedirectListener::new()
            .bind(&Url::parse("http://127.0.0.1:0/:callback").unwrap())
            .await;
        assert!(matches!(
            result,
            Err(OAuth2Error::Configuration(ConfigurationError::InvalidConfig { .. }))
        ));
    }

    #[tokio::test]
    async fn test_accept_parses_callback() {
        let (mut bound, port) = bind_callback(&LoopbackRedirectListener::new()).await;

        let browser =
            tokio::spawn(async move { send_raw(port, &get("/callback?code=abc123&state=s1")).await });

        let params = bound.accept("s1").await.unwrap();
        assert_eq!(params, CallbackParams::success("abc123", "s1"));

        let response = browser.await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.contains("Login successful"));
    }

    #[tokio::test]
    async fn test_redirect_arriving_before_accept_is_kept() {
        let (mut bound, port) = bind_callback(&LoopbackRedirectListener::new()).await;

        let browser =
            tokio::spawn(async move { send_raw(port, &get("/callback?code=early&state=s1")).await });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let params = bound.accept("s1").await.unwrap();
        assert_eq!(params.code.as_deref(), Some("early"));
        assert!(browser.await.unwrap().starts_with("HTTP/1.1 200 OK"));
    }

    #[tokio::test]
    async fn test_other_paths_get_404() {
        let (mut bound, port) = bind_callback(&LoopbackRedirectListener::new()).await;

        let browser = tokio::spawn(async move {
            let favicon = send_raw(port, &get("/favicon.ico")).await;
            let callback = send_raw(port, &get("/callback?error=access_denied&state=s1")).await;
            (favicon, callback)
        });

        let params = bound.accept("s1").await.unwrap();
        assert_eq!(params.error.as_deref(), Some("access_denied"));

        let (favicon, callback) = browser.await.unwrap();
        assert!(favicon.starts_with("HTTP/1.1 404"));
        assert!(callback.starts_with("HTTP/1.1 400"));
    }

    #[tokio::test]
    async fn test_idle_connection_does_not_block_redirect() {
        let (mut bound, port) = bind_callback(&LoopbackRedirectListener::new()).await;

        // Speculative connection that never sends a request.
        let _idle = TcpStream::connect(("127.0.0.1", port)).await.unwrap();

        let browser =
            tokio::spawn(async move { send_raw(port, &get("/callback?code=c&state=s1")).await });

        let params = tokio::time::timeout(Duration::from_secs(3), bound.accept("s1"))
            .await
            .expect("redirect stalled behind an idle connection")
            .unwrap();
        assert_eq!(params, CallbackParams::success("c", "s1"));
        assert!(browser.await.unwrap().starts_with("HTTP/1.1 200 OK"));
    }

    #[tokio::test]
    async fn test_parallel_favicon_and_redirect() {
        let (mut bound, port) = bind_callback(&LoopbackRedirectListener::new()).await;

        let favicon = tokio::spawn(async move { send_raw(port, &get("/favicon.ico")).await });
        let callback =
            tokio::spawn(async move { send_raw(port, &get("/callback?code=c&state=s1")).await });

        let params = tokio::time::timeout(Duration::from_secs(3), bound.accept("s1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(params.code.as_deref(), Some("c"));
        assert!(favicon.await.unwrap().starts_with("HTTP/1.1 404"));
        assert!(callback.await.unwrap().starts_with("HTTP/1.1 200 OK"));
    }

    #[tokio::test]
    async fn test_oversized_request_line_rejected() {
        let (mut bound, port) = bind_callback(&LoopbackRedirectListener::new()).await;

        let oversized = tokio::spawn(async move {
            let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
            let mut request = b"GET /callback?code=".to_vec();
            request.resize(1024 * 1024, b'a');
            // The server hangs up part way through.
            let _ = stream.write_all(&request).await;
            let mut response = Vec::new();
            let _ = stream.read_to_end(&mut response).await;
            String::from_utf8_lossy(&response).into_owned()
        });
        let response = tokio::time::timeout(Duration::from_secs(5), oversized)
            .await
            .expect("oversized request was buffered instead of rejected")
            .unwrap();
        assert!(response.is_empty() || response.starts_with("HTTP/1.1 431"));

        // The endpoint keeps serving.
        let browser =
            tokio::spawn(async move { send_raw(port, &get("/callback?code=c&state=s1")).await });
        let params = tokio::time::timeout(Duration::from_secs(3), bound.accept("s1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(params.code.as_deref(), Some("c"));
        assert!(browser.await.unwrap().starts_with("HTTP/1.1 200 OK"));
    }

    #[tokio::test]
    async fn test_success_redirect() {
        let listener = LoopbackRedirectListener::new().with_success_redirect(Some(
            Url::parse("https://example.com/logged-in").unwrap(),
        ));
        let mut bound = listener
            .bind(&Url::parse("http://127.0.0.1:0/").unwrap())
            .await
            .unwrap();
        let port = port_of(&bound.redirect_uri());

        let browser = tokio::spawn(async move { send_raw(port, &get("/?code=c&state=s1")).await });

        bound.accept("s1").await.unwrap();
        let response = browser.await.unwrap();
        assert!(response.starts_with("HTTP/1.1 302 Found"));
        assert!(response
            .to_ascii_lowercase()
            .contains("location: https://example.com/logged-in"));
    }

    #[tokio::test]
    async fn test_port_released_on_close() {
        let listener = LoopbackRedirectListener::new();
        let (mut bound, port) = bind_callback(&listener).await;
        let uri = bound.redirect_uri();

        // Occupied while bound.
        assert!(listener.bind(&Url::parse(&uri).unwrap()).await.is_err());

        bound.close().await;
        drop(bound);
        let rebound = listener.bind(&Url::parse(&uri).unwrap()).await.unwrap();
        assert_eq!(port_of(&rebound.redirect_uri()), port);
    }

    #[tokio::test]
    async fn test_port_released_on_drop() {
        let listener = LoopbackRedirectListener::new();
        let (bound, _) = bind_callback(&listener).await;
        let uri = Url::parse(&bound.redirect_uri()).unwrap();

        drop(bound);

        let mut rebound = None;
        for _ in 0..50 {
            if let Ok(bound) = listener.bind(&uri).await {
                rebound = Some(bound);
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(rebound.is_some());
    }

    #[tokio::test]
    async fn test_close_answers_queued_redirects() {
        let (mut bound, port) = bind_callback(&LoopbackRedirectListener::new()).await;

        let first =
            tokio::spawn(async move { send_raw(port, &get("/callback?code=c&state=s1")).await });
        bound.accept("s1").await.unwrap();

        let second =
            tokio::spawn(async move { send_raw(port, &get("/callback?code=d&state=s1")).await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        bound.close().await;

        assert!(first.await.unwrap().starts_with("HTTP/1.1 200 OK"));
        assert!(second.await.unwrap().starts_with("HTTP/1.1 400"));
    }

    #[tokio::test]
    async fn test_mock_listener_tracks_bindings() {
        let listener = MockRedirectListener::new(MockRedirect::Code("abc123".to_string()));
        let url = Url::parse("http://127.0.0.1:8123/callback").unwrap();

        {
            let mut bound = listener.bind(&url).await.unwrap();
            assert_eq!(bound.redirect_uri(), "http://127.0.0.1:8123/callback");
            assert_eq!(listener.active_bindings(), 1);

            let params = bound.accept("s1").await.unwrap();
            assert_eq!(params, CallbackParams::success("abc123", "s1"));
            bound.close().await;
        }

        assert_eq!(listener.active_bindings(), 0);
        assert_eq!(listener.bind_count(), 1);
        assert_eq!(listener.close_count(), 1);
    }
}
