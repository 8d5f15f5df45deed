//! Wire types of the aggregation backend.
//!
//! Response types are read projections of server state. Structural
//! invariants (GitHub data only on GitHub items, page bounds) are checked
//! while deserializing, so a violating response is rejected like any other
//! malformed body.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArticleKind {
    #[serde(alias = "blog")]
    Post,
    GithubProject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendingPeriod {
    Daily,
    Weekly,
    Monthly,
}

/// Repository data attached to GitHub project items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GithubProject {
    pub full_name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub stars: u64,
    #[serde(default)]
    pub forks: u64,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub original_description: Option<String>,
    #[serde(default)]
    pub translated_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_intro: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_analysis: Option<Value>,
}

/// A post or GitHub project returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawArticle")]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub summary: Option<String>,
    #[serde(rename = "article_type")]
    pub kind: ArticleKind,
    pub status: Option<String>,
    pub collect_time: Option<DateTime<Utc>>,
    pub update_time: Option<DateTime<Utc>>,
    pub read_count: u64,
    #[serde(rename = "github_info", skip_serializing_if = "Option::is_none")]
    pub github: Option<GithubProject>,
}

impl Article {
    pub fn is_github_project(&self) -> bool {
        self.kind == ArticleKind::GithubProject
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Topics {
    List(Vec<String>),
    Text(String),
}

impl Topics {
    fn into_vec(self) -> Vec<String> {
        match self {
            Topics::List(list) => list,
            Topics::Text(text) => {
                let text = text.trim();
                if text.starts_with('[') {
                    if let Ok(list) = serde_json::from_str::<Vec<String>>(text) {
                        return list;
                    }
                }
                text.split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(ToOwned::to_owned)
                    .collect()
            }
        }
    }
}

/// Article as the backend sends it: GitHub data either nested under
/// `github_info` or spread over flat `github_*` columns.
#[derive(Debug, Deserialize)]
struct RawArticle {
    id: i64,
    title: String,
    #[serde(default)]
    content: String,
    summary: Option<String>,
    article_type: ArticleKind,
    status: Option<String>,
    #[serde(default, deserialize_with = "timestamp::deserialize")]
    collect_time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp::deserialize")]
    update_time: Option<DateTime<Utc>>,
    #[serde(default)]
    read_count: u64,
    github_info: Option<GithubProject>,
    github_full_name: Option<String>,
    github_url: Option<String>,
    programming_language: Option<String>,
    stars_count: Option<u64>,
    forks_count: Option<u64>,
    topics: Option<Topics>,
    original_description: Option<String>,
    translated_description: Option<String>,
    project_intro: Option<String>,
    overall_score: Option<f64>,
    business_analysis: Option<Value>,
}

impl TryFrom<RawArticle> for Article {
    type Error = String;

    fn try_from(raw: RawArticle) -> Result<Self, Self::Error> {
        let github = match raw.article_type {
            ArticleKind::Post => None,
            ArticleKind::GithubProject => {
                let project = match raw.github_info {
                    Some(mut nested) => {
                        nested.project_intro = nested.project_intro.or(raw.project_intro);
                        nested.overall_score = nested.overall_score.or(raw.overall_score);
                        nested.business_analysis =
                            nested.business_analysis.or(raw.business_analysis);
                        nested
                    }
                    None => {
                        let full_name = raw.github_full_name.ok_or_else(|| {
                            format!("github project {} has no repository data", raw.id)
                        })?;
                        GithubProject {
                            full_name,
                            url: raw.github_url.unwrap_or_default(),
                            language: raw.programming_language,
                            stars: raw.stars_count.unwrap_or_default(),
                            forks: raw.forks_count.unwrap_or_default(),
                            topics: raw.topics.map(Topics::into_vec).unwrap_or_default(),
                            original_description: raw.original_description,
                            translated_description: raw.translated_description,
                            project_intro: raw.project_intro,
                            overall_score: raw.overall_score,
                            business_analysis: raw.business_analysis,
                        }
                    }
                };
                Some(project)
            }
        };

        Ok(Article {
            id: raw.id,
            title: raw.title,
            content: raw.content,
            summary: raw.summary,
            kind: raw.article_type,
            status: raw.status,
            collect_time: raw.collect_time,
            update_time: raw.update_time,
            read_count: raw.read_count,
            github,
        })
    }
}

/// One page of a larger result set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "RawPage<T>",
    bound(serialize = "T: Serialize", deserialize = "T: DeserializeOwned")
)]
pub struct PageResult<T> {
    pub list: Vec<T>,
    pub total: u64,
    pub page: u32,
    #[serde(rename = "pageSize")]
    pub page_size: u32,
}

impl<T> PageResult<T> {
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Whether pages after this one may hold more items.
    pub fn has_more(&self) -> bool {
        u64::from(self.page) * u64::from(self.page_size) < self.total
    }
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
struct RawPage<T> {
    #[serde(default = "Vec::new")]
    list: Vec<T>,
    total: u64,
    page: u32,
    #[serde(rename = "pageSize", alias = "page_size")]
    page_size: u32,
}

impl<T> TryFrom<RawPage<T>> for PageResult<T> {
    type Error = String;

    fn try_from(raw: RawPage<T>) -> Result<Self, Self::Error> {
        let len = raw.list.len();
        if len > raw.page_size as usize {
            return Err(format!("page holds {len} items but pageSize is {}", raw.page_size));
        }
        if raw.total < len as u64 {
            return Err(format!("page holds {len} items but total is {}", raw.total));
        }
        Ok(PageResult {
            list: raw.list,
            total: raw.total,
            page: raw.page,
            page_size: raw.page_size,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub openid: String,
    #[serde(default)]
    pub unionid: Option<String>,
    #[serde(default, alias = "nickName")]
    pub nickname: Option<String>,
    #[serde(default, alias = "avatarUrl")]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub gender: Option<i32>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub province: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default, alias = "createdAt", deserialize_with = "timestamp::deserialize")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "updatedAt", deserialize_with = "timestamp::deserialize")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Display attributes sent to `updateUserInfo`. Unset fields are left
/// untouched on the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub province: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginRequest {
    pub code: String,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoginResult {
    pub token: String,
    #[serde(rename = "userInfo", alias = "user_info")]
    pub user_info: UserProfile,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Favorite {
    pub article_id: i64,
    pub article_type: ArticleKind,
    #[serde(default, deserialize_with = "timestamp::deserialize")]
    pub favorite_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub article: Option<Article>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FavoriteStatus {
    #[serde(rename = "isFavorited")]
    pub is_favorited: bool,
    #[serde(
        rename = "favoriteTime",
        default,
        deserialize_with = "timestamp::deserialize"
    )]
    pub favorite_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FavoriteRequest {
    pub article_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub article_type: Option<ArticleKind>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArticleQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(rename = "pageSize", skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub article_type: Option<ArticleKind>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GithubQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(rename = "pageSize", skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trending_period: Option<TrendingPeriod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_stars: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchQuery {
    pub keyword: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(rename = "pageSize", skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub article_type: Option<ArticleKind>,
}

impl SearchQuery {
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FavoriteQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(rename = "pageSize", skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub article_type: Option<ArticleKind>,
}

/// Backend timestamps come as RFC 3339 or as naive `YYYY-MM-DD HH:MM:SS`
/// values in UTC.
mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer};

    const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

    pub fn parse(value: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
            return Some(dt.with_timezone(&Utc));
        }
        NAIVE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
            .map(|naive| naive.and_utc())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(None),
            Some(value) if value.trim().is_empty() => Ok(None),
            Some(value) => parse(value.trim())
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {value}"))),
        }
    }
}
