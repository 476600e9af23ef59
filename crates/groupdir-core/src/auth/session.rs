//! Directory session lifecycle.
//!
//! A [`SessionManager`] owns the one login token shared by every caller. The
//! connection state and the token live in a single `watch` channel, so a
//! transition and its notification are one step: every caller waiting on the
//! channel sees `Connected` or `Disabled` as soon as it is published.
//!
//! At most one login runs at a time. It runs in its own task; callers that
//! want a session while it is in flight wait on the channel instead of
//! starting another login. Each finished login leaves its outcome in the
//! channel until the next one finishes, so a waiter that is woken late still
//! sees the result it was waiting for, even if another login has started.

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::credentials::{CredentialKey, CredentialSource, Credentials};
use crate::api::{classify, HttpRequest, LoginFailure, Outcome, ParseFailure, SessionError, Transport};
use crate::config::{DEFAULT_LOGIN_URL, DEFAULT_RENEWAL_INTERVAL_MINUTES, DEFAULT_VERIFY_TIMEOUT_SECS};

/// Authorization scheme expected by the directory endpoints
const AUTH_SCHEME: &str = "GoogleLogin";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// No credentials configured. Terminal for this manager.
    Disabled,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disabled => "disabled",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub login_url: String,
    /// Time from a successful login to the next proactive one
    pub renewal_interval: Duration,
    /// How long `verify` waits for a connect to settle
    pub verify_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            login_url: DEFAULT_LOGIN_URL.to_string(),
            renewal_interval: Duration::from_secs(DEFAULT_RENEWAL_INTERVAL_MINUTES * 60),
            verify_timeout: Duration::from_secs(DEFAULT_VERIFY_TIMEOUT_SECS),
        }
    }
}

/// A token issued by the login endpoint.
#[derive(Clone)]
pub struct ActiveSession {
    token: String,
    domain: String,
    issued_at: DateTime<Utc>,
}

impl fmt::Debug for ActiveSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveSession")
            .field("token", &"<redacted>")
            .field("domain", &self.domain)
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

impl ActiveSession {
    /// Domain the token was issued for; directory paths are scoped to it.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Value for the `Authorization` header.
    pub(crate) fn authorization(&self) -> String {
        format!("{} Auth={}", AUTH_SCHEME, self.token)
    }
}

/// Pull the token out of a login response (`Auth=<token>` on its own line).
pub(crate) fn extract_auth_token(body: &str) -> Result<String, ParseFailure> {
    body.lines()
        .filter_map(|line| line.trim().strip_prefix("Auth="))
        .filter_map(|rest| rest.split_whitespace().next())
        .next()
        .map(str::to_string)
        .ok_or_else(|| ParseFailure::token(body))
}

#[derive(Debug, Clone)]
struct Status {
    state: ConnectionState,
    /// Incremented every time a login starts
    attempt: u64,
    /// Kept while a renewal is in flight
    session: Option<Arc<ActiveSession>>,
    /// Outcome of the most recently finished attempt
    last: Option<(u64, Result<Arc<ActiveSession>, SessionError>)>,
}

#[derive(Debug, Clone, Copy)]
enum Attempt {
    Started(u64),
    InFlight(u64),
    Disabled,
}

struct Inner {
    transport: Arc<dyn Transport>,
    credentials: Arc<dyn CredentialSource>,
    settings: SessionSettings,
    status: watch::Sender<Status>,
    renewal: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(timer) = self.renewal.get_mut().take() {
            timer.abort();
        }
    }
}

/// Shared handle to one directory session. Clone is cheap.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    pub fn new(
        transport: Arc<dyn Transport>,
        credentials: Arc<dyn CredentialSource>,
        settings: SessionSettings,
    ) -> Self {
        let (status, _) = watch::channel(Status {
            state: ConnectionState::Disconnected,
            attempt: 0,
            session: None,
            last: None,
        });
        Self {
            inner: Arc::new(Inner {
                transport,
                credentials,
                settings,
                status,
                renewal: Mutex::new(None),
            }),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.status.borrow().state
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.inner.settings
    }

    /// The current token's metadata, also while a renewal is in flight.
    pub fn active_session(&self) -> Option<Arc<ActiveSession>> {
        self.inner.status.borrow().session.clone()
    }

    /// Log in now, or join the login already in flight.
    ///
    /// Unlike [`verify`](Self::verify) this is not time-bounded, and a missing
    /// configuration is reported as [`SessionError::Configuration`].
    pub async fn connect(&self) -> Result<(), SessionError> {
        let rx = self.inner.status.subscribe();
        match trigger(&self.inner) {
            Attempt::Started(attempt) | Attempt::InFlight(attempt) => {
                settle(rx, attempt).await.map(|_| ())
            }
            Attempt::Disabled => Err(SessionError::Disabled),
        }
    }

    /// Make sure a session is usable before a directory call.
    pub async fn verify(&self) -> Result<(), SessionError> {
        self.authorize().await.map(|_| ())
    }

    /// `verify`, handing back the session it verified.
    pub(crate) async fn authorize(&self) -> Result<Arc<ActiveSession>, SessionError> {
        let rx = self.inner.status.subscribe();
        let (state, attempt, session) = {
            let status = rx.borrow();
            (status.state, status.attempt, status.session.clone())
        };

        let attempt = match (state, session) {
            (ConnectionState::Connected, Some(session)) => {
                trace!("Directory session already connected");
                return Ok(session);
            }
            (ConnectionState::Disabled, _) => return Err(SessionError::Disabled),
            (ConnectionState::Connecting, _) => attempt,
            _ => match trigger(&self.inner) {
                Attempt::Started(attempt) | Attempt::InFlight(attempt) => attempt,
                Attempt::Disabled => return Err(SessionError::Disabled),
            },
        };

        debug!(attempt, "No directory session, waiting for connect");
        match tokio::time::timeout(self.inner.settings.verify_timeout, settle(rx, attempt)).await {
            Ok(Ok(session)) => Ok(session),
            Ok(Err(SessionError::Configuration(_))) => Err(SessionError::Disabled),
            Ok(Err(err)) => Err(err),
            Err(_) => {
                warn!(
                    timeout_ms = self.inner.settings.verify_timeout.as_millis() as u64,
                    "Timed out waiting for the directory session"
                );
                Err(SessionError::Timeout)
            }
        }
    }
}

/// Move to `Connecting` unless a login is already running or the session is disabled.
fn begin_attempt(inner: &Inner) -> Attempt {
    let mut outcome = Attempt::Disabled;
    inner.status.send_if_modified(|status| match status.state {
        ConnectionState::Disabled => false,
        ConnectionState::Connecting => {
            outcome = Attempt::InFlight(status.attempt);
            false
        }
        ConnectionState::Disconnected | ConnectionState::Connected => {
            status.attempt += 1;
            status.state = ConnectionState::Connecting;
            outcome = Attempt::Started(status.attempt);
            true
        }
    });
    outcome
}

fn trigger(inner: &Arc<Inner>) -> Attempt {
    let attempt = begin_attempt(inner);
    if let Attempt::Started(id) = attempt {
        let inner = Arc::clone(inner);
        tokio::spawn(async move {
            let result = login(&inner).await;
            finish(&inner, id, result);
        });
    }
    attempt
}

async fn login(inner: &Inner) -> Result<ActiveSession, SessionError> {
    let found = inner
        .credentials
        .lookup(&CredentialKey::ALL)
        .await
        .map_err(|e| LoginFailure::CredentialStore(format!("{:#}", e)))?;
    let credentials = Credentials::from_lookup(found)?;

    info!(
        username = %credentials.username,
        domain = %credentials.domain,
        "Authenticating to directory service"
    );
    let request = HttpRequest::form_post(&inner.settings.login_url, credentials.login_form());
    let response = inner.transport.execute(request).await?;
    debug!(status = response.status, "Login response received");

    if let Outcome::Err(err) = classify(response.status, &response.body)? {
        return Err(LoginFailure::Rejected(err).into());
    }

    Ok(ActiveSession {
        token: extract_auth_token(&response.body)?,
        domain: credentials.domain,
        issued_at: Utc::now(),
    })
}

fn finish(inner: &Arc<Inner>, attempt: u64, result: Result<ActiveSession, SessionError>) {
    match result {
        Ok(session) => {
            schedule_renewal(inner);
            let session = Arc::new(session);
            inner.status.send_modify(|status| {
                status.state = ConnectionState::Connected;
                status.session = Some(Arc::clone(&session));
                status.last = Some((attempt, Ok(session)));
            });
            info!(attempt, "Directory session established");
        }
        Err(err @ SessionError::Configuration(_)) => {
            warn!(error = %err, "Login parameters not found, disabling directory connection");
            if let Some(timer) = inner.renewal.lock().take() {
                timer.abort();
            }
            inner.status.send_modify(|status| {
                status.state = ConnectionState::Disabled;
                status.session = None;
                status.last = Some((attempt, Err(err)));
            });
        }
        Err(err) => {
            warn!(attempt, error = %err, "Directory login failed");
            inner.status.send_modify(|status| {
                status.state = ConnectionState::Disconnected;
                status.session = None;
                status.last = Some((attempt, Err(err)));
            });
        }
    }
}

/// Replace the pending renewal with one due a full interval from now.
fn schedule_renewal(inner: &Arc<Inner>) {
    let interval = inner.settings.renewal_interval;
    let weak: Weak<Inner> = Arc::downgrade(inner);
    let timer = tokio::spawn(async move {
        tokio::time::sleep(interval).await;
        if let Some(inner) = weak.upgrade() {
            info!("Renewing directory session token");
            trigger(&inner);
        }
    });

    if let Some(previous) = inner.renewal.lock().replace(timer) {
        previous.abort();
    }
    debug!(in_secs = interval.as_secs(), "Scheduled directory session renewal");
}

/// Wait until the given attempt (or a later one) settles and return its outcome.
///
/// Reads the recorded outcome rather than the live state: by the time a waiter
/// runs, the next attempt may already be `Connecting`.
async fn settle(
    mut rx: watch::Receiver<Status>,
    attempt: u64,
) -> Result<Arc<ActiveSession>, SessionError> {
    let status = rx
        .wait_for(|status| matches!(&status.last, Some((settled, _)) if *settled >= attempt))
        .await
        .map_err(|_| SessionError::Closed)?;

    match &status.last {
        Some((_, outcome)) => outcome.clone(),
        None => Err(SessionError::Closed),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;

    use super::*;
    use crate::api::mock::MockTransport;
    use crate::api::{ClassifiedError, HttpResponse, TransportError};
    use crate::auth::StaticCredentials;

    const HOUR: Duration = Duration::from_secs(60 * 60);

    fn credentials() -> Arc<StaticCredentials> {
        Arc::new(StaticCredentials::new("admin@example.org", "secret", "example.org"))
    }

    fn manager(transport: &Arc<MockTransport>) -> SessionManager {
        SessionManager::new(transport.clone(), credentials(), SessionSettings::default())
    }

    struct BrokenStore;

    #[async_trait]
    impl CredentialSource for BrokenStore {
        async fn lookup(&self, _keys: &[CredentialKey]) -> anyhow::Result<HashMap<CredentialKey, String>> {
            Err(anyhow::anyhow!("keychain is locked"))
        }
    }

    #[test]
    fn test_extract_auth_token() {
        let body = "SID=DQAAAGgA\nLSID=DQAAAGsA\nAuth=DQAAAGgAdk3fA5N\n";
        assert_eq!(extract_auth_token(body).unwrap(), "DQAAAGgAdk3fA5N");

        assert_eq!(extract_auth_token("Auth=abc \r\n").unwrap(), "abc");
        assert!(matches!(
            extract_auth_token("SID=x\nLSID=y\n"),
            Err(ParseFailure::Token(_))
        ));
        assert!(matches!(extract_auth_token("Auth=\n"), Err(ParseFailure::Token(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_logs_in_once() {
        let transport = Arc::new(MockTransport::login_ok("tok123"));
        let manager = manager(&transport);
        assert_eq!(manager.state(), ConnectionState::Disconnected);

        manager.connect().await.unwrap();
        assert_eq!(manager.state(), ConnectionState::Connected);

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, reqwest::Method::POST);
        assert_eq!(requests[0].url, DEFAULT_LOGIN_URL);
        assert_eq!(requests[0].content_type, "application/x-www-form-urlencoded");
        assert_eq!(
            requests[0].body.as_deref(),
            Some("Email=admin%40example.org&Passwd=secret&accountType=HOSTED&service=apps")
        );

        let session = manager.authorize().await.unwrap();
        assert_eq!(session.authorization(), "GoogleLogin Auth=tok123");
        assert_eq!(session.domain(), "example.org");
    }

    #[tokio::test(start_paused = true)]
    async fn test_verify_when_connected_makes_no_request() {
        let transport = Arc::new(MockTransport::login_ok("tok"));
        let manager = manager(&transport);
        manager.connect().await.unwrap();

        for _ in 0..3 {
            manager.verify().await.unwrap();
        }
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_verify_from_disconnected_connects() {
        let transport = Arc::new(MockTransport::login_ok("tok"));
        let manager = manager(&transport);

        manager.verify().await.unwrap();
        assert_eq!(manager.state(), ConnectionState::Connected);
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_credentials_disable_without_login() {
        let transport = Arc::new(MockTransport::login_ok("tok"));
        let partial = StaticCredentials::default()
            .with(CredentialKey::Username, "admin@example.org")
            .with(CredentialKey::Domain, "example.org");
        let manager = SessionManager::new(transport.clone(), Arc::new(partial), SessionSettings::default());

        assert_eq!(manager.verify().await, Err(SessionError::Disabled));
        assert_eq!(manager.state(), ConnectionState::Disabled);

        assert_eq!(manager.verify().await, Err(SessionError::Disabled));
        assert_eq!(manager.connect().await, Err(SessionError::Disabled));
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_reports_configuration_error() {
        let transport = Arc::new(MockTransport::login_ok("tok"));
        let partial = StaticCredentials::default().with(CredentialKey::Username, "admin");
        let manager = SessionManager::new(transport.clone(), Arc::new(partial), SessionSettings::default());

        assert_eq!(
            manager.connect().await,
            Err(SessionError::Configuration("password, domain".to_string()))
        );
        assert_eq!(manager.state(), ConnectionState::Disabled);
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_login() {
        let transport = Arc::new(MockTransport::login_ok("tok").with_delay(Duration::from_secs(1)));
        let manager = manager(&transport);

        let (connected, first, second) =
            tokio::join!(manager.connect(), manager.verify(), manager.verify());
        assert!(connected.is_ok());
        assert!(first.is_ok());
        assert!(second.is_ok());
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_failure() {
        let transport = Arc::new(MockTransport::login_ok("tok").with_delay(Duration::from_secs(1)));
        transport.push(Ok(HttpResponse {
            status: 403,
            body: "Error=BadAuthentication\n".to_string(),
        }));
        let manager = manager(&transport);

        let verifies: Vec<_> = (0..4).map(|_| manager.verify()).collect();
        let results = futures::future::join_all(verifies).await;

        let expected = SessionError::Login(LoginFailure::Rejected(ClassifiedError {
            http_status: Some(403),
            message: "Unsupported parameter or failed authorization.".to_string(),
            embedded_code: None,
            embedded_reason: None,
        }));
        for result in results {
            assert_eq!(result, Err(expected.clone()));
        }
        assert_eq!(transport.request_count(), 1);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_login_is_retried_by_next_verify() {
        let transport = Arc::new(MockTransport::login_ok("tok"));
        transport.push(Err(TransportError("connection refused".to_string())));
        let manager = manager(&transport);

        assert_eq!(
            manager.verify().await,
            Err(SessionError::Login(LoginFailure::Network(TransportError(
                "connection refused".to_string()
            ))))
        );
        assert_eq!(manager.state(), ConnectionState::Disconnected);

        manager.verify().await.unwrap();
        assert_eq!(manager.state(), ConnectionState::Connected);
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_token_is_parse_failure() {
        let transport = Arc::new(MockTransport::new(200, "SID=x\nLSID=y\n"));
        let manager = manager(&transport);

        assert!(matches!(
            manager.connect().await,
            Err(SessionError::Parse(ParseFailure::Token(_)))
        ));
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_credential_store_error_is_retriable() {
        let transport = Arc::new(MockTransport::login_ok("tok"));
        let manager = SessionManager::new(transport.clone(), Arc::new(BrokenStore), SessionSettings::default());

        match manager.verify().await {
            Err(SessionError::Login(LoginFailure::CredentialStore(message))) => {
                assert!(message.contains("keychain is locked"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_verify_times_out_while_login_hangs() {
        let transport = Arc::new(MockTransport::login_ok("tok").with_delay(Duration::from_secs(10)));
        let manager = manager(&transport);

        assert_eq!(manager.verify().await, Err(SessionError::Timeout));
        assert_eq!(manager.state(), ConnectionState::Connecting);

        // The login itself keeps running and lands later
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(manager.state(), ConnectionState::Connected);
        manager.verify().await.unwrap();
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_renewal_fires_once_per_interval() {
        let transport = Arc::new(MockTransport::login_ok("tok"));
        let manager = manager(&transport);
        manager.connect().await.unwrap();

        tokio::time::sleep(20 * HOUR - Duration::from_secs(1)).await;
        assert_eq!(transport.request_count(), 1);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(transport.request_count(), 2);
        assert_eq!(manager.state(), ConnectionState::Connected);

        tokio::time::sleep(20 * HOUR).await;
        assert_eq!(transport.request_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_login_replaces_pending_renewal() {
        let transport = Arc::new(MockTransport::login_ok("tok"));
        let manager = manager(&transport);
        manager.connect().await.unwrap();

        // Re-login at 10h: the renewal due at 20h is replaced by one at 30h
        tokio::time::sleep(10 * HOUR).await;
        manager.connect().await.unwrap();
        assert_eq!(transport.request_count(), 2);

        tokio::time::sleep(10 * HOUR + Duration::from_secs(1)).await;
        assert_eq!(transport.request_count(), 2);

        tokio::time::sleep(10 * HOUR).await;
        assert_eq!(transport.request_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiter_sees_outcome_after_next_attempt_starts() {
        let transport = Arc::new(MockTransport::login_ok("tok"));
        let manager = manager(&transport);
        let inner = &manager.inner;

        assert!(matches!(begin_attempt(inner), Attempt::Started(1)));
        let waiter = settle(inner.status.subscribe(), 1);
        tokio::pin!(waiter);
        assert!(futures::poll!(waiter.as_mut()).is_pending());

        // Attempt 1 lands and attempt 2 starts before the waiter is polled again
        let first = ActiveSession {
            token: "first".to_string(),
            domain: "example.org".to_string(),
            issued_at: Utc::now(),
        };
        finish(inner, 1, Ok(first));
        assert!(matches!(begin_attempt(inner), Attempt::Started(2)));
        assert_eq!(manager.state(), ConnectionState::Connecting);

        match futures::poll!(waiter.as_mut()) {
            std::task::Poll::Ready(Ok(session)) => {
                assert_eq!(session.authorization(), "GoogleLogin Auth=first")
            }
            other => panic!("unexpected {:?}", other),
        }

        // Same for a failed attempt
        let waiter = settle(inner.status.subscribe(), 2);
        tokio::pin!(waiter);
        assert!(futures::poll!(waiter.as_mut()).is_pending());
        finish(inner, 2, Err(SessionError::Timeout));
        assert!(matches!(begin_attempt(inner), Attempt::Started(3)));
        assert!(matches!(
            futures::poll!(waiter.as_mut()),
            std::task::Poll::Ready(Err(SessionError::Timeout))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiters_complete_while_others_reconnect() {
        let transport = Arc::new(MockTransport::login_ok("tok").with_delay(Duration::from_secs(1)));
        let manager = manager(&transport);

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let manager = manager.clone();
                tokio::spawn(async move {
                    manager.verify().await?;
                    if i % 4 == 0 {
                        manager.connect().await?;
                    }
                    Ok::<_, SessionError>(())
                })
            })
            .collect();

        for result in futures::future::join_all(tasks).await {
            assert_eq!(result.unwrap(), Ok(()));
        }
        assert!(transport.request_count() >= 2);
        assert_eq!(manager.state(), ConnectionState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_manager_cancels_renewal() {
        let transport = Arc::new(MockTransport::login_ok("tok"));
        let manager = manager(&transport);
        manager.connect().await.unwrap();
        let renewal_interval = manager.settings().renewal_interval;

        let clone = manager.clone();
        drop(manager);
        drop(clone);

        tokio::time::sleep(renewal_interval + HOUR).await;
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_renewal_keeps_dispatched_session() {
        let transport = Arc::new(MockTransport::login_ok("second").with_delay(Duration::from_secs(1)));
        transport.push(Ok(HttpResponse {
            status: 200,
            body: "Auth=first\n".to_string(),
        }));
        let manager = manager(&transport);

        let dispatched = manager.authorize().await.unwrap();
        assert_eq!(dispatched.authorization(), "GoogleLogin Auth=first");

        // Renewal starts 20h after the first login finished and takes 1s
        tokio::time::sleep(20 * HOUR + Duration::from_millis(500)).await;
        assert_eq!(manager.state(), ConnectionState::Connecting);
        assert!(manager.active_session().is_some());
        assert_eq!(dispatched.authorization(), "GoogleLogin Auth=first");

        let renewed = manager.authorize().await.unwrap();
        assert_eq!(renewed.authorization(), "GoogleLogin Auth=second");
        assert_eq!(transport.request_count(), 2);
    }
}
