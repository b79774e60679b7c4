//! Integration tests: boot the full server and drive the admin API over
//! HTTP.

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    sync::Arc,
};

use anyhow::{Context as _, Result};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::config::{AppConfig, BlobConfig};
use crate::gateway::{Gateway as _, SqliteGateway};
use crate::models::{POST_COLLECTION, REPORT_COLLECTION, SESSION_COLLECTION, USER_COLLECTION};
use crate::serve::{init_state, router};

/// A temporary test directory that will be cleaned up when the struct is dropped.
struct TempDir {
    /// The path to the directory.
    path: PathBuf,
}

impl TempDir {
    fn new() -> Result<Self> {
        let path = std::env::temp_dir().join(format!("campusmod-test-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

/// Test state for the application.
struct TestState {
    /// Keeps the temp directory alive for the duration of the tests.
    _temp_dir: TempDir,
    /// The address the test server is listening on.
    address: SocketAddr,
    /// The seeded admin bearer token.
    token: String,
    /// Direct gateway access for seeding fixtures.
    gateway: Arc<SqliteGateway>,
    /// The HTTP client.
    client: reqwest::Client,
}

impl TestState {
    async fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;

        let config = AppConfig {
            listen_address: None,
            host_name: "campus.test".to_owned(),
            db: format!("sqlite://{}/test.db", temp_dir.path().display()),
            blob: BlobConfig {
                path: temp_dir.path().join("blob"),
                limit: 10_485_760, // 10 MB
            },
            metrics: None,
            test: true,
        };

        let state = init_state(config).await?;
        let gateway = state.gateway.clone();

        // The first-startup seed created exactly one session; its id is the
        // bearer token.
        let sessions = gateway.fetch_all(SESSION_COLLECTION, &[]).await?;
        let token = sessions
            .first()
            .context("no seeded admin session")?
            .id
            .clone();

        let listener = tokio::net::TcpListener::bind(SocketAddr::new(
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            0,
        ))
        .await?;
        let address = listener.local_addr()?;

        let app = router(state);
        tokio::spawn(async move {
            axum::serve(listener, app.into_make_service())
                .await
                .expect("test server failed");
        });

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            _temp_dir: temp_dir,
            address,
            token,
            gateway,
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.address, path)
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(self.url(path))
            .header("Authorization", format!("Bearer {}", self.token))
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(self.url(path))
            .header("Authorization", format!("Bearer {}", self.token))
    }

    fn put(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .put(self.url(path))
            .header("Authorization", format!("Bearer {}", self.token))
    }

    async fn seed_user(&self, id: &str, warning_count: i64) -> Result<()> {
        self.gateway
            .create(
                USER_COLLECTION,
                json!({
                    "id": id,
                    "name": "Test User",
                    "email": format!("{id}@campus.test"),
                    "faculty": "Engineering",
                    "status": if warning_count > 0 { "warning" } else { "active" },
                    "warningCount": warning_count,
                    "joinedAt": Utc::now(),
                }),
            )
            .await?;
        Ok(())
    }

    async fn seed_post(&self, id: &str, user_id: &str, age_hours: i64, report_count: i64) -> Result<()> {
        self.gateway
            .create(
                POST_COLLECTION,
                json!({
                    "id": id,
                    "content": "a post",
                    "userId": user_id,
                    "userName": "Test User",
                    "postDate": Utc::now() - Duration::hours(age_hours),
                    "category": "general",
                    "likes": 0,
                    "dislikes": 0,
                    "reportCount": report_count,
                    "status": "active",
                    "isWarned": false,
                }),
            )
            .await?;
        Ok(())
    }

    async fn seed_report(&self, id: &str, post_id: &str, reported_user_id: &str) -> Result<()> {
        self.gateway
            .create(
                REPORT_COLLECTION,
                json!({
                    "id": id,
                    "reporterId": "reporter",
                    "reporterName": "Reporter",
                    "reportedUserId": reported_user_id,
                    "reportedUserName": "Test User",
                    "postId": post_id,
                    "category": "spam",
                    "description": "spam post",
                    "status": "pending",
                    "reportDate": Utc::now(),
                }),
            )
            .await?;
        Ok(())
    }
}

/// Boot a fresh server. Each test gets its own instance so the background
/// tasks live on the test's runtime.
async fn init_test_state() -> Result<TestState> {
    TestState::new().await
}

#[tokio::test]
async fn index_is_reachable() -> Result<()> {
    let state = init_test_state().await?;
    let response = state.client.get(state.url("/")).send().await?;
    assert!(response.status().is_success());
    Ok(())
}

#[tokio::test]
async fn admin_routes_require_a_session() -> Result<()> {
    let state = init_test_state().await?;

    let response = state.client.get(state.url("/admin/users")).send().await?;
    assert_eq!(response.status(), 401);

    let response = state
        .client
        .get(state.url("/admin/users"))
        .header("Authorization", "Bearer not-a-real-token")
        .send()
        .await?;
    assert_eq!(response.status(), 401);
    Ok(())
}

#[tokio::test]
async fn warning_cascade_bans_at_threshold() -> Result<()> {
    let state = init_test_state().await?;
    state.seed_user("warn-target", 4).await?;

    // Default ban threshold is 5; the fifth warning tips the user over.
    let response = state.post("/admin/users/warn-target/warn").send().await?;
    assert!(response.status().is_success());
    let body: Value = response.json().await?;
    assert_eq!(body["banned"], json!(true));
    assert_eq!(body["user"]["warningCount"], json!(5));
    assert_eq!(body["user"]["status"], json!("banned"));
    Ok(())
}

#[tokio::test]
async fn concurrent_warnings_do_not_lose_counts() -> Result<()> {
    let state = init_test_state().await?;
    for id in ["pile-1", "pile-2", "pile-3"] {
        state.seed_user(id, 0).await?;
    }

    // Counter increments are atomic at the gateway even when cascades run
    // side by side.
    let results = futures::future::join_all(
        ["pile-1", "pile-2", "pile-3"]
            .iter()
            .map(|id| state.post(&format!("/admin/users/{id}/warn")).send()),
    )
    .await;
    for result in results {
        assert!(result?.status().is_success());
    }

    for id in ["pile-1", "pile-2", "pile-3"] {
        let doc = state
            .gateway
            .fetch_by_id(USER_COLLECTION, id)
            .await?
            .context("user missing")?;
        assert_eq!(doc.value["warningCount"], json!(1));
        assert_eq!(doc.value["status"], json!("warning"));
    }
    Ok(())
}

#[tokio::test]
async fn warn_from_report_resolves_sibling_reports() -> Result<()> {
    let state = init_test_state().await?;
    state.seed_user("reported-user", 0).await?;
    state.seed_post("reported-post", "reported-user", 1, 4).await?;
    for i in 1..=4 {
        state
            .seed_report(&format!("sibling-{i}"), "reported-post", "reported-user")
            .await?;
    }

    let response = state
        .post("/admin/reports/sibling-1/warn")
        .send()
        .await?;
    assert!(response.status().is_success());
    let body: Value = response.json().await?;
    assert_eq!(body["resolvedReports"], json!(4));

    // The reported post is gone from the feed.
    let posts = state.get("/admin/posts").send().await?;
    let posts: Vec<Value> = posts.json().await?;
    let removed = posts
        .iter()
        .find(|p| p["id"] == json!("reported-post"))
        .context("post missing from list")?;
    assert_eq!(removed["status"], json!("removed"));
    assert_eq!(removed["isWarned"], json!(true));
    Ok(())
}

#[tokio::test]
async fn post_list_sweeps_stale_posts() -> Result<()> {
    let state = init_test_state().await?;
    state.seed_post("stale-post", "someone", 25, 0).await?;
    state.seed_post("fresh-post", "someone", 1, 0).await?;

    let response = state.get("/admin/posts").send().await?;
    let posts: Vec<Value> = response.json().await?;

    let stale = posts
        .iter()
        .find(|p| p["id"] == json!("stale-post"))
        .context("stale post missing")?;
    assert_eq!(stale["status"], json!("expired"));

    let fresh = posts
        .iter()
        .find(|p| p["id"] == json!("fresh-post"))
        .context("fresh post missing")?;
    assert_eq!(fresh["status"], json!("active"));

    // The sweep persisted the transition, not just the view.
    let doc = state
        .gateway
        .fetch_by_id(POST_COLLECTION, "stale-post")
        .await?
        .context("stale post missing from store")?;
    assert_eq!(doc.value["status"], json!("expired"));
    Ok(())
}

#[tokio::test]
async fn config_updates_conflict_on_stale_revision() -> Result<()> {
    let state = init_test_state().await?;

    let response = state.get("/admin/config").send().await?;
    let config: Value = response.json().await?;
    let rev = config["rev"].as_i64().context("config has no rev")?;

    let response = state
        .put("/admin/config")
        .json(&json!({
            "previousRev": rev,
            "changes": {"dailyFreeCoin": 9},
        }))
        .send()
        .await?;
    assert!(response.status().is_success());
    let updated: Value = response.json().await?;
    assert_eq!(updated["dailyFreeCoin"], json!(9));
    assert_eq!(updated["updatedBy"], json!("root"));

    // Re-sending with the old revision loses to the first write.
    let response = state
        .put("/admin/config")
        .json(&json!({
            "previousRev": rev,
            "changes": {"dailyFreeCoin": 11},
        }))
        .send()
        .await?;
    assert_eq!(response.status(), 409);

    // Invalid values never reach the store.
    let response = state
        .put("/admin/config")
        .json(&json!({
            "previousRev": rev + 1,
            "changes": {"banThreshold": -2},
        }))
        .send()
        .await?;
    assert_eq!(response.status(), 400);
    Ok(())
}

#[tokio::test]
async fn bell_counts_urgent_posts() -> Result<()> {
    let state = init_test_state().await?;
    // Default urgent threshold is 10 reports.
    state.seed_post("urgent-post", "someone", 1, 12).await?;

    let response = state.get("/admin/bell").send().await?;
    let summary: Value = response.json().await?;
    let ids = summary["urgentPostIds"]
        .as_array()
        .context("no urgent post ids")?;
    assert!(ids.contains(&json!("urgent-post")));
    Ok(())
}
