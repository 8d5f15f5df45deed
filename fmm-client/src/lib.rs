pub mod client;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod event;
pub mod models;
pub mod session;
pub mod storage;
pub mod transport;

use std::sync::Arc;

pub use client::ApiClient;
pub use config::{ClientConfig, Environment};
pub use endpoints::{Endpoint, Method};
pub use error::{ApiError, ConfigError, StorageError};
pub use event::{spawn_feedback_forwarder, Event, EventBus, FeedbackSink, ForwarderHandle};
pub use models::{
    Article, ArticleKind, ArticleQuery, Favorite, FavoriteQuery, FavoriteStatus, GithubProject,
    GithubQuery, LoginResult, PageResult, ProfileUpdate, SearchQuery, TrendingPeriod, UserProfile,
};
pub use session::{
    BootstrapOutcome, BootstrapSignal, BootstrapStatus, LoginCodeProvider, SessionManager,
    SessionState, StaticLoginCode,
};
pub use storage::{FileStore, KeyValueStore, MemoryStore, Session};
pub use transport::{Envelope, Feedback, RequestSpec, Transport};

/// Builds a client and its session manager over one transport and store.
///
/// Identity calls on the client wait for the manager's bootstrap, starting it
/// themselves when the host has not. Calling `manager.bootstrap()` at startup
/// is still the usual way to get the session ready early.
pub fn connect(
    config: &ClientConfig,
    store: Arc<dyn KeyValueStore>,
    login: Arc<dyn LoginCodeProvider>,
) -> Result<(ApiClient, SessionManager), ConfigError> {
    let transport = Transport::new(config)?;
    let session = Session::new(store);
    let manager = SessionManager::new(
        transport.clone(),
        session.clone(),
        login,
        config.source.clone(),
    );
    let client = ApiClient::new(transport, session)
        .with_source(config.source.clone())
        .with_bootstrap(manager.clone());
    Ok((client, manager))
}
