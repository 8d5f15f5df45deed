use serde_json::{json, Value};
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fmm_client::{
    ApiClient, ApiError, ArticleKind, ArticleQuery, GithubQuery, ProfileUpdate, SearchQuery,
    Session, Transport, TrendingPeriod,
};

fn client_for(server: &MockServer, session: Session) -> ApiClient {
    ApiClient::new(
        Transport::with_client(&server.uri(), reqwest::Client::new()),
        session,
    )
}

fn post(id: i64) -> Value {
    json!({
        "id": id,
        "title": format!("Post {id}"),
        "content": "body",
        "summary": "short",
        "article_type": "blog",
        "status": "published",
        "collect_time": "2024-10-21 07:28:00",
        "update_time": "2024-10-21 08:00:00",
        "read_count": 12
    })
}

fn github_project() -> Value {
    json!({
        "id": 77,
        "title": "Hello-World",
        "content": "",
        "article_type": "github_project",
        "collect_time": "2024-10-21T07:28:00Z",
        "read_count": 0,
        "github_full_name": "octocat/Hello-World",
        "github_url": "https://github.com/octocat/Hello-World",
        "programming_language": "Rust",
        "stars_count": 1500,
        "forks_count": 90,
        "topics": "demo,example",
        "translated_description": "示例项目"
    })
}

fn ok(data: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"success": true, "data": data}))
}

#[tokio::test]
async fn list_articles_returns_bounded_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/articles/list"))
        .and(query_param("page", "1"))
        .and(query_param("pageSize", "2"))
        .and(query_param("article_type", "post"))
        .respond_with(ok(json!({
            "list": [post(1), post(2)],
            "total": 5,
            "page": 1,
            "pageSize": 2
        })))
        .expect(1)
        .mount(&server)
        .await;

    let query = ArticleQuery {
        page: Some(1),
        page_size: Some(2),
        article_type: Some(ArticleKind::Post),
    };
    let page = client_for(&server, Session::in_memory())
        .list_articles(&query)
        .await
        .unwrap();

    assert!(page.list.len() <= page.page_size as usize);
    assert!(page.total >= page.list.len() as u64);
    assert!(page.has_more());
    assert_eq!(page.list[0].title, "Post 1");
    assert_eq!(page.list[0].kind, ArticleKind::Post);
}

#[tokio::test]
async fn list_articles_without_paging_sends_no_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/articles/list"))
        .respond_with(ok(json!({"list": [], "total": 0, "page": 1, "pageSize": 20})))
        .mount(&server)
        .await;

    let page = client_for(&server, Session::in_memory())
        .list_articles(&ArticleQuery::default())
        .await
        .unwrap();
    assert!(page.is_empty());

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests[0].url.query(), None);
}

#[tokio::test]
async fn page_violating_bounds_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/articles/list"))
        .respond_with(ok(json!({
            "list": [post(1), post(2), post(3)],
            "total": 3,
            "page": 1,
            "pageSize": 2
        })))
        .mount(&server)
        .await;

    let err = client_for(&server, Session::in_memory())
        .list_articles(&ArticleQuery::default())
        .await
        .unwrap_err();
    assert_eq!(err.message(), "network request failed");
}

#[tokio::test]
async fn article_detail_uses_numeric_path() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/articles/detail/42"))
        .respond_with(ok(post(42)))
        .expect(1)
        .mount(&server)
        .await;

    let article = client_for(&server, Session::in_memory())
        .article_detail(42)
        .await
        .unwrap();
    assert_eq!(article.id, 42);
    assert_eq!(article.read_count, 12);
    assert!(article.github.is_none());
}

#[tokio::test]
async fn github_projects_forward_filters() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/articles/github"))
        .and(query_param("trending_period", "weekly"))
        .and(query_param("language", "Rust"))
        .and(query_param("min_stars", "1000"))
        .respond_with(ok(json!({"list": [github_project()], "total": 1, "page": 1, "pageSize": 10})))
        .expect(1)
        .mount(&server)
        .await;

    let query = GithubQuery {
        trending_period: Some(TrendingPeriod::Weekly),
        language: Some("Rust".into()),
        min_stars: Some(1000),
        ..GithubQuery::default()
    };
    let page = client_for(&server, Session::in_memory())
        .list_github_projects(&query)
        .await
        .unwrap();

    let github = page.list[0].github.as_ref().unwrap();
    assert_eq!(github.full_name, "octocat/Hello-World");
    assert_eq!(github.stars, 1500);
    assert_eq!(github.topics, vec!["demo", "example"]);
}

#[tokio::test]
async fn github_detail_splits_full_name_into_segments() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/articles/github/octocat/Hello-World"))
        .respond_with(ok(github_project()))
        .expect(1)
        .mount(&server)
        .await;

    let article = client_for(&server, Session::in_memory())
        .github_project_detail("octocat/Hello-World")
        .await
        .unwrap();
    assert!(article.is_github_project());

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests[0].url.path(), "/api/articles/github/octocat/Hello-World");
}

#[tokio::test]
async fn github_detail_escapes_each_segment() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ok(github_project()))
        .mount(&server)
        .await;

    client_for(&server, Session::in_memory())
        .github_project_detail("my org/repo#1")
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests[0].url.path(), "/api/articles/github/my%20org/repo%231");
}

#[tokio::test]
async fn invalid_input_never_reaches_the_network() {
    let server = MockServer::start().await;
    let client = client_for(&server, Session::in_memory());
    let mut rx = client.transport().subscribe();

    let err = client.search(&SearchQuery::new("   ")).await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));

    let err = client.github_project_detail("no-slash").await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));

    let query = ArticleQuery {
        page: Some(0),
        ..ArticleQuery::default()
    };
    assert!(client.list_articles(&query).await.is_err());

    assert!(server.received_requests().await.unwrap().is_empty());
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn search_sends_trimmed_keyword() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/articles/search"))
        .and(query_param("keyword", "async rust"))
        .respond_with(ok(json!({"list": [post(3)], "total": 1, "page": 1, "pageSize": 20})))
        .expect(1)
        .mount(&server)
        .await;

    let config = fmm_client::ClientConfig {
        base_url: server.uri(),
        ..fmm_client::ClientConfig::default()
    };
    let page = ApiClient::from_config(&config, Session::in_memory())
        .unwrap()
        .search(&SearchQuery::new("  async rust "))
        .await
        .unwrap();
    assert_eq!(page.total, 1);
}

#[tokio::test]
async fn login_persists_session_and_sends_source() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/miniprogram/login"))
        .and(body_json(json!({"code": "abc", "source": "h5"})))
        .respond_with(ok(json!({
            "token": "tok-1",
            "userInfo": {"id": 1, "openid": "o-1", "source": "h5"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session = Session::in_memory();
    let client = client_for(&server, session.clone()).with_source("h5");
    let result = client.login("abc").await.unwrap();

    assert_eq!(result.token, "tok-1");
    assert_eq!(session.token().as_deref(), Some("tok-1"));
    assert_eq!(session.user().unwrap().openid, "o-1");

    client.logout();
    assert!(!session.is_authenticated());
    assert!(session.user().is_none());
}

#[tokio::test]
async fn profile_calls_attach_raw_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/miniprogram/userInfo"))
        .and(wiremock::matchers::header("authorization", "tok-9"))
        .respond_with(ok(json!({"id": 9, "openid": "o-9", "nickname": "Ada"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/miniprogram/updateUserInfo"))
        .and(wiremock::matchers::header("authorization", "tok-9"))
        .and(body_json(json!({"nickname": "Grace"})))
        .respond_with(ok(json!({"id": 9, "openid": "o-9", "nickname": "Grace"})))
        .expect(1)
        .mount(&server)
        .await;

    let session = Session::in_memory();
    session.establish("tok-9", &serde_json::from_value(json!({"id": 9, "openid": "o-9"})).unwrap());
    let client = client_for(&server, session.clone());

    let user = client.user_info().await.unwrap();
    assert_eq!(user.nickname.as_deref(), Some("Ada"));

    let update = ProfileUpdate {
        nickname: Some("Grace".into()),
        ..ProfileUpdate::default()
    };
    let updated = client.update_user_info(&update).await.unwrap().unwrap();
    assert_eq!(updated.nickname.as_deref(), Some("Grace"));
    assert_eq!(session.user().unwrap().nickname.as_deref(), Some("Grace"));
}

#[tokio::test]
async fn profile_call_without_token_sends_no_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/miniprogram/userInfo"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "success": false,
            "message": "login required"
        })))
        .mount(&server)
        .await;

    let err = client_for(&server, Session::in_memory())
        .user_info()
        .await
        .unwrap_err();
    assert_eq!(err.message(), "login required");

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn only_identity_endpoints_carry_the_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/articles/detail/5"))
        .respond_with(ok(post(5)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/miniprogram/checkFavorite/5"))
        .respond_with(ok(json!({"isFavorited": false})))
        .mount(&server)
        .await;

    let session = Session::in_memory();
    session.establish("tok-5", &serde_json::from_value(json!({"id": 5, "openid": "o-5"})).unwrap());
    let client = client_for(&server, session);

    client.article_detail(5).await.unwrap();
    client.check_favorite(5).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
    assert_eq!(
        requests[1].headers.get("authorization").map(|v| v.as_bytes()),
        Some(&b"tok-5"[..])
    );
}
