//! Catalog of the backend operations the client knows about.
//!
//! Paths are relative to the configured base URL. Templated paths are built
//! through the helper functions so that every caller escapes segments the
//! same way.

use std::fmt;

/// HTTP method of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }

    /// GET and DELETE carry their payload in the query string.
    pub fn payload_in_query(&self) -> bool {
        matches!(self, Self::Get | Self::Delete)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    ArticleList,
    ArticleDetail,
    GithubList,
    GithubDetail,
    Search,
    Login,
    UserInfo,
    UpdateUserInfo,
    AddFavorite,
    RemoveFavorite,
    Favorites,
    CheckFavorite,
}

impl Endpoint {
    pub const ALL: [Endpoint; 12] = [
        Endpoint::ArticleList,
        Endpoint::ArticleDetail,
        Endpoint::GithubList,
        Endpoint::GithubDetail,
        Endpoint::Search,
        Endpoint::Login,
        Endpoint::UserInfo,
        Endpoint::UpdateUserInfo,
        Endpoint::AddFavorite,
        Endpoint::RemoveFavorite,
        Endpoint::Favorites,
        Endpoint::CheckFavorite,
    ];

    /// Fixed path, or the prefix for templated endpoints.
    pub fn path(&self) -> &'static str {
        match self {
            Self::ArticleList => "/api/articles/list",
            Self::ArticleDetail => "/api/articles/detail",
            Self::GithubList | Self::GithubDetail => "/api/articles/github",
            Self::Search => "/api/articles/search",
            Self::Login => "/api/miniprogram/login",
            Self::UserInfo => "/api/miniprogram/userInfo",
            Self::UpdateUserInfo => "/api/miniprogram/updateUserInfo",
            Self::AddFavorite => "/api/miniprogram/addFavorite",
            Self::RemoveFavorite => "/api/miniprogram/removeFavorite",
            Self::Favorites => "/api/miniprogram/favorites",
            Self::CheckFavorite => "/api/miniprogram/checkFavorite",
        }
    }

    pub fn method(&self) -> Method {
        match self {
            Self::Login | Self::UpdateUserInfo | Self::AddFavorite | Self::RemoveFavorite => {
                Method::Post
            }
            _ => Method::Get,
        }
    }

    /// Whether the call must carry the session token.
    pub fn requires_auth(&self) -> bool {
        matches!(
            self,
            Self::UserInfo
                | Self::UpdateUserInfo
                | Self::AddFavorite
                | Self::RemoveFavorite
                | Self::Favorites
                | Self::CheckFavorite
        )
    }
}

pub fn article_detail_path(id: i64) -> String {
    format!("{}/{id}", Endpoint::ArticleDetail.path())
}

pub fn check_favorite_path(article_id: i64) -> String {
    format!("{}/{article_id}", Endpoint::CheckFavorite.path())
}

/// `owner` and `repo` are percent-encoded independently.
pub fn github_detail_path(owner: &str, repo: &str) -> String {
    format!(
        "{}/{}/{}",
        Endpoint::GithubDetail.path(),
        urlencoding::encode(owner),
        urlencoding::encode(repo)
    )
}
