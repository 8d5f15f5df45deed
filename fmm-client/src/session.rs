//! One-shot session bootstrap.
//!
//! At process start the manager confirms the persisted token against the
//! backend, or replaces it through a silent login with a host-supplied code.
//! Failures never escape: the app simply stays anonymous. The outcome is
//! returned and also published on a watch channel so that authenticated calls
//! can wait for it.
//!
//! The chain runs on its own tokio task. Callers awaiting [`SessionManager::bootstrap`]
//! may give up without aborting it, and the watch channel always reaches
//! `Finished`.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::endpoints::Endpoint;
use crate::error::ApiError;
use crate::models::{LoginRequest, LoginResult, UserProfile};
use crate::storage::Session;
use crate::transport::{RequestSpec, Transport};

/// Host primitive handing out single-use platform login codes.
#[async_trait]
pub trait LoginCodeProvider: Send + Sync {
    /// `None` when the platform cannot produce a code right now.
    async fn login_code(&self) -> Option<String>;
}

/// Provider returning the same fixed answer every time.
#[derive(Debug, Clone, Default)]
pub struct StaticLoginCode(pub Option<String>);

impl StaticLoginCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(Some(code.into()))
    }

    pub fn unavailable() -> Self {
        Self(None)
    }
}

#[async_trait]
impl LoginCodeProvider for StaticLoginCode {
    async fn login_code(&self) -> Option<String> {
        self.0.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NoToken,
    Validating,
    Authenticated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// The persisted token was confirmed by the backend.
    Validated,
    /// A fresh token was obtained through the login exchange.
    LoggedIn,
    /// No usable token; the app continues anonymously.
    Anonymous,
}

impl BootstrapOutcome {
    pub fn is_authenticated(&self) -> bool {
        !matches!(self, Self::Anonymous)
    }

    pub fn state(&self) -> SessionState {
        if self.is_authenticated() {
            SessionState::Authenticated
        } else {
            SessionState::NoToken
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapStatus {
    NotStarted,
    Running(SessionState),
    Finished(BootstrapOutcome),
}

impl BootstrapStatus {
    pub fn outcome(&self) -> Option<BootstrapOutcome> {
        match self {
            Self::Finished(outcome) => Some(*outcome),
            _ => None,
        }
    }
}

/// Read side of the bootstrap completion signal.
#[derive(Debug, Clone)]
pub struct BootstrapSignal {
    rx: watch::Receiver<BootstrapStatus>,
}

impl BootstrapSignal {
    pub fn status(&self) -> BootstrapStatus {
        *self.rx.borrow()
    }

    /// Waits until a bootstrap has finished, starting from any state.
    /// `None` once the manager is gone without an outcome.
    pub async fn finished(&self) -> Option<BootstrapOutcome> {
        let mut rx = self.rx.clone();
        let status = rx
            .wait_for(|status| matches!(status, BootstrapStatus::Finished(_)))
            .await
            .map(|status| *status)
            .ok()?;
        status.outcome()
    }
}

/// Owns the session lifecycle for one process.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

struct Inner {
    transport: Transport,
    session: Session,
    login: Arc<dyn LoginCodeProvider>,
    source: String,
    status: watch::Sender<BootstrapStatus>,
    started: AtomicBool,
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("status", &self.status())
            .field("source", &self.inner.source)
            .finish()
    }
}

impl SessionManager {
    pub fn new(
        transport: Transport,
        session: Session,
        login: Arc<dyn LoginCodeProvider>,
        source: impl Into<String>,
    ) -> Self {
        let (status, _) = watch::channel(BootstrapStatus::NotStarted);
        Self {
            inner: Arc::new(Inner {
                transport,
                session,
                login,
                source: source.into(),
                status,
                started: AtomicBool::new(false),
            }),
        }
    }

    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    pub fn status(&self) -> BootstrapStatus {
        *self.inner.status.borrow()
    }

    pub fn signal(&self) -> BootstrapSignal {
        BootstrapSignal {
            rx: self.inner.status.subscribe(),
        }
    }

    /// Starts the bootstrap on first use and waits for its outcome. Later and
    /// concurrent calls share the first run.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn bootstrap(&self) -> BootstrapOutcome {
        if !self.inner.started.swap(true, Ordering::AcqRel) {
            self.set_state(SessionState::NoToken);
            self.spawn_run();
        }
        self.signal()
            .finished()
            .await
            .unwrap_or(BootstrapOutcome::Anonymous)
    }

    fn spawn_run(&self) {
        let worker = {
            let manager = self.clone();
            tokio::spawn(async move { manager.run().await })
        };
        let manager = self.clone();
        tokio::spawn(async move {
            if let Err(e) = worker.await {
                warn!(error = %e, "session bootstrap task aborted");
                manager.finish(BootstrapOutcome::Anonymous);
            }
        });
    }

    fn set_state(&self, state: SessionState) {
        debug!(?state, "bootstrap state");
        self.inner.status.send_replace(BootstrapStatus::Running(state));
    }

    async fn run(&self) -> BootstrapOutcome {
        let session = &self.inner.session;
        if let Some(token) = session.token() {
            self.set_state(SessionState::Validating);
            match self.validate(token).await {
                Ok(()) => return self.finish(BootstrapOutcome::Validated),
                Err(e) => {
                    info!(error = %e, "stored token rejected, clearing session");
                    session.clear();
                    self.set_state(SessionState::NoToken);
                }
            }
        }

        match self.login().await {
            Some(result) => {
                session.establish(&result.token, &result.user_info);
                self.finish(BootstrapOutcome::LoggedIn)
            }
            None => self.finish(BootstrapOutcome::Anonymous),
        }
    }

    fn finish(&self, outcome: BootstrapOutcome) -> BootstrapOutcome {
        info!(?outcome, "session bootstrap finished");
        self.inner.status.send_replace(BootstrapStatus::Finished(outcome));
        outcome
    }

    async fn validate(&self, token: String) -> Result<(), ApiError> {
        let spec = RequestSpec::for_endpoint(Endpoint::UserInfo, Endpoint::UserInfo.path())
            .authorization(Some(token))
            .silent();
        let data: Value = self.inner.transport.send(spec).await?;
        // Refresh the cached profile when the reply carries one.
        match serde_json::from_value::<UserProfile>(data) {
            Ok(user) => self.inner.session.set_user(&user),
            Err(e) => debug!(error = %e, "user info reply holds no profile"),
        }
        Ok(())
    }

    async fn login(&self) -> Option<LoginResult> {
        let Some(code) = self.inner.login.login_code().await else {
            debug!("no platform login code available, staying anonymous");
            return None;
        };
        let request = LoginRequest {
            code,
            source: self.inner.source.clone(),
        };
        let spec = RequestSpec::for_endpoint(Endpoint::Login, Endpoint::Login.path())
            .payload(&request)
            .ok()?
            .silent();
        match self.inner.transport.send::<LoginResult>(spec).await {
            Ok(result) => Some(result),
            Err(e) => {
                warn!(error = %e, "silent login failed");
                None
            }
        }
    }
}
