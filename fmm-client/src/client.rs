use serde::de::{DeserializeOwned, IgnoredAny};
use serde_json::Value;
use tracing::debug;

use crate::config::ClientConfig;
use crate::endpoints::{self, Endpoint};
use crate::error::{ApiError, ConfigError};
use crate::models::{
    Article, ArticleKind, ArticleQuery, Favorite, FavoriteQuery, FavoriteRequest, FavoriteStatus,
    GithubQuery, LoginRequest, LoginResult, PageResult, ProfileUpdate, SearchQuery, UserProfile,
};
use crate::session::SessionManager;
use crate::storage::Session;
use crate::transport::{RequestSpec, Transport};

/// Typed operations of the aggregation backend.
///
/// Failures from the transport are returned untouched; nothing here retries
/// or caches.
#[derive(Debug, Clone)]
pub struct ApiClient {
    transport: Transport,
    session: Session,
    source: String,
    bootstrap: Option<SessionManager>,
}

impl ApiClient {
    pub fn new(transport: Transport, session: Session) -> Self {
        Self {
            transport,
            session,
            source: ClientConfig::default().source,
            bootstrap: None,
        }
    }

    pub fn from_config(config: &ClientConfig, session: Session) -> Result<Self, ConfigError> {
        Ok(Self::new(Transport::new(config)?, session).with_source(config.source.clone()))
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Identity calls go through `manager`'s bootstrap first: they start it
    /// if nobody has, or wait for the run in progress.
    pub fn with_bootstrap(mut self, manager: SessionManager) -> Self {
        self.bootstrap = Some(manager);
        self
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    async fn call<T: DeserializeOwned>(&self, mut spec: RequestSpec) -> Result<T, ApiError> {
        if spec.requires_auth() {
            if let Some(manager) = &self.bootstrap {
                let outcome = manager.bootstrap().await;
                debug!(?outcome, path = %spec.path, "bootstrap finished before identity call");
            }
            spec = spec.authorization(self.session.token());
        }
        self.transport.send(spec).await
    }

    pub async fn list_articles(&self, query: &ArticleQuery) -> Result<PageResult<Article>, ApiError> {
        check_paging(query.page, query.page_size)?;
        let spec = RequestSpec::for_endpoint(Endpoint::ArticleList, Endpoint::ArticleList.path())
            .payload(query)?;
        self.call(spec).await
    }

    pub async fn article_detail(&self, id: i64) -> Result<Article, ApiError> {
        let spec =
            RequestSpec::for_endpoint(Endpoint::ArticleDetail, endpoints::article_detail_path(id));
        self.call(spec).await
    }

    pub async fn list_github_projects(
        &self,
        query: &GithubQuery,
    ) -> Result<PageResult<Article>, ApiError> {
        check_paging(query.page, query.page_size)?;
        let spec = RequestSpec::for_endpoint(Endpoint::GithubList, Endpoint::GithubList.path())
            .payload(query)?;
        self.call(spec).await
    }

    /// `full_name` is `owner/repo`; it is split on the first `/`.
    pub async fn github_project_detail(&self, full_name: &str) -> Result<Article, ApiError> {
        let (owner, repo) = split_full_name(full_name)?;
        let spec = RequestSpec::for_endpoint(
            Endpoint::GithubDetail,
            endpoints::github_detail_path(owner, repo),
        );
        self.call(spec).await
    }

    pub async fn search(&self, query: &SearchQuery) -> Result<PageResult<Article>, ApiError> {
        let keyword = query.keyword.trim();
        if keyword.is_empty() {
            return Err(ApiError::InvalidInput("search keyword is empty".into()));
        }
        check_paging(query.page, query.page_size)?;
        let query = SearchQuery {
            keyword: keyword.to_owned(),
            ..query.clone()
        };
        let spec =
            RequestSpec::for_endpoint(Endpoint::Search, Endpoint::Search.path()).payload(&query)?;
        self.call(spec).await
    }

    /// Exchanges a platform login code and stores the resulting session.
    pub async fn login(&self, code: &str) -> Result<LoginResult, ApiError> {
        if code.is_empty() {
            return Err(ApiError::InvalidInput("login code is empty".into()));
        }
        let request = LoginRequest {
            code: code.to_owned(),
            source: self.source.clone(),
        };
        let spec =
            RequestSpec::for_endpoint(Endpoint::Login, Endpoint::Login.path()).payload(&request)?;
        let result: LoginResult = self.call(spec).await?;
        self.session.establish(&result.token, &result.user_info);
        Ok(result)
    }

    /// Forgets the local session. The backend is not contacted.
    pub fn logout(&self) {
        self.session.clear();
    }

    pub async fn user_info(&self) -> Result<UserProfile, ApiError> {
        let spec = RequestSpec::for_endpoint(Endpoint::UserInfo, Endpoint::UserInfo.path());
        let user: UserProfile = self.call(spec).await?;
        self.session.set_user(&user);
        Ok(user)
    }

    /// Returns the updated profile when the backend echoes it back.
    pub async fn update_user_info(
        &self,
        update: &ProfileUpdate,
    ) -> Result<Option<UserProfile>, ApiError> {
        let endpoint = Endpoint::UpdateUserInfo;
        let spec = RequestSpec::for_endpoint(endpoint, endpoint.path()).payload(update)?;
        let data: Value = self.call(spec).await?;
        let user = serde_json::from_value::<UserProfile>(data).ok();
        if let Some(user) = &user {
            self.session.set_user(user);
        }
        Ok(user)
    }

    pub async fn add_favorite(
        &self,
        article_id: i64,
        kind: Option<ArticleKind>,
    ) -> Result<(), ApiError> {
        let request = FavoriteRequest {
            article_id,
            article_type: kind,
        };
        let spec = RequestSpec::for_endpoint(Endpoint::AddFavorite, Endpoint::AddFavorite.path())
            .payload(&request)?;
        self.call::<IgnoredAny>(spec).await?;
        Ok(())
    }

    /// Removing an item that is not a favorite succeeds.
    pub async fn remove_favorite(&self, article_id: i64) -> Result<(), ApiError> {
        let request = FavoriteRequest {
            article_id,
            article_type: None,
        };
        let endpoint = Endpoint::RemoveFavorite;
        let spec = RequestSpec::for_endpoint(endpoint, endpoint.path()).payload(&request)?;
        self.call::<IgnoredAny>(spec).await?;
        Ok(())
    }

    pub async fn list_favorites(
        &self,
        query: &FavoriteQuery,
    ) -> Result<PageResult<Favorite>, ApiError> {
        check_paging(query.page, query.page_size)?;
        let spec = RequestSpec::for_endpoint(Endpoint::Favorites, Endpoint::Favorites.path())
            .payload(query)?;
        self.call(spec).await
    }

    pub async fn check_favorite(&self, article_id: i64) -> Result<FavoriteStatus, ApiError> {
        let spec = RequestSpec::for_endpoint(
            Endpoint::CheckFavorite,
            endpoints::check_favorite_path(article_id),
        );
        self.call(spec).await
    }
}

fn check_paging(page: Option<u32>, page_size: Option<u32>) -> Result<(), ApiError> {
    if page == Some(0) {
        return Err(ApiError::InvalidInput("page starts at 1".into()));
    }
    if page_size == Some(0) {
        return Err(ApiError::InvalidInput("pageSize must be positive".into()));
    }
    Ok(())
}

fn split_full_name(full_name: &str) -> Result<(&str, &str), ApiError> {
    match full_name.split_once('/') {
        Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() => Ok((owner, repo)),
        _ => Err(ApiError::InvalidInput(format!(
            "expected owner/repo, got {full_name:?}"
        ))),
    }
}
