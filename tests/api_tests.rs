use chapter_portal::{
    AppConfig, AppState, MemoryRepository, create_router,
    models::{NewUser, Role, User},
    repository::Repository,
};
use reqwest::{StatusCode, header, redirect::Policy};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;

pub struct TestApp {
    pub address: String,
    pub repo: Arc<MemoryRepository>,
    pub client: reqwest::Client,
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    async fn seed_user(&self, email: &str, role: Role) -> User {
        self.repo
            .create_user(NewUser {
                email: email.to_string(),
                full_name: "Seeded User".to_string(),
                password_hash: None,
                role,
                avatar: None,
            })
            .await
            .unwrap()
    }
}

/// Serves the full router on a random port, backed by the in-memory
/// repository and the local config (so `x-user-id` is honoured).
async fn spawn_app() -> TestApp {
    let repo = Arc::new(MemoryRepository::new());
    let state = AppState {
        repo: repo.clone(),
        identity: None,
        config: AppConfig::default(),
    };
    let router = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    // Redirects are asserted on, not followed.
    let client = reqwest::Client::builder()
        .redirect(Policy::none())
        .build()
        .unwrap();

    TestApp {
        address,
        repo,
        client,
    }
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app().await;
    let response = app.client.get(app.url("/health")).send().await.unwrap();

    assert!(response.status().is_success());
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(response.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = spawn_app().await;
    let response = app
        .client
        .get(app.url("/api-docs/openapi.json"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let doc: Value = response.json().await.unwrap();
    assert!(doc["paths"]["/api/posts"].is_object());
}

#[tokio::test]
async fn test_public_listing_without_session() {
    let app = spawn_app().await;
    let response = app.client.get(app.url("/api/posts")).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let page: Value = response.json().await.unwrap();
    assert_eq!(page["total"], 0);
    assert_eq!(page["page"], 1);
    assert_eq!(page["pageSize"], 9);
    assert!(page["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_authenticated_routes_reject_anonymous() {
    let app = spawn_app().await;

    let me = app.client.get(app.url("/api/auth/me")).send().await.unwrap();
    assert_eq!(me.status(), StatusCode::UNAUTHORIZED);
    let body: Value = me.json().await.unwrap();
    assert_eq!(body["error"], "Unauthorized");

    let create = app
        .client
        .post(app.url("/api/posts"))
        .json(&json!({ "title": "x", "content": "y", "category": "z" }))
        .send()
        .await
        .unwrap();
    assert_eq!(create.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_staff_gate_redirects_browsers() {
    let app = spawn_app().await;
    let response = app
        .client
        .get(app.url("/api/admin/stats"))
        .header(header::ACCEPT, "text/html,application/xhtml+xml")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "/auth/signin"
    );
}

#[tokio::test]
async fn test_staff_gate_for_api_clients() {
    let app = spawn_app().await;
    let member = app.seed_user("member@chapter.org", Role::Member).await;
    let admin = app.seed_user("admin@chapter.org", Role::Admin).await;

    let anonymous = app
        .client
        .get(app.url("/api/admin/stats"))
        .send()
        .await
        .unwrap();
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let as_member = app
        .client
        .get(app.url("/api/admin/stats"))
        .header("x-user-id", member.id.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(as_member.status(), StatusCode::FORBIDDEN);

    let as_admin = app
        .client
        .get(app.url("/api/admin/stats"))
        .header("x-user-id", admin.id.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(as_admin.status(), StatusCode::OK);
    let stats: Value = as_admin.json().await.unwrap();
    assert_eq!(stats["totalUsers"], 2);
}

#[tokio::test]
async fn test_signup_then_me_with_cookie() {
    let app = spawn_app().await;

    let signup = app
        .client
        .post(app.url("/api/auth/signup"))
        .json(&json!({
            "email": "new@chapter.org",
            "password": "secret1",
            "fullName": "New Member"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(signup.status(), StatusCode::CREATED);

    let cookie = signup
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string();

    let me = app
        .client
        .get(app.url("/api/auth/me"))
        .header(header::COOKIE, cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(me.status(), StatusCode::OK);
    let profile: Value = me.json().await.unwrap();
    assert_eq!(profile["email"], "new@chapter.org");
    assert_eq!(profile["fullName"], "New Member");
    assert_eq!(profile["role"], "MEMBER");
}

#[tokio::test]
async fn test_signout_clears_cookie() {
    let app = spawn_app().await;
    let response = app
        .client
        .post(app.url("/api/auth/signout"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let cookie = response.headers().get(header::SET_COOKIE).unwrap();
    assert!(cookie.to_str().unwrap().contains("Max-Age=0"));
}

#[tokio::test]
async fn test_post_lifecycle() {
    let app = spawn_app().await;
    let admin = app.seed_user("admin@chapter.org", Role::Admin).await;
    let member = app.seed_user("member@chapter.org", Role::Member).await;

    // 1. Staff publishes.
    let create = app
        .client
        .post(app.url("/api/posts"))
        .header("x-user-id", admin.id.to_string())
        .json(&json!({
            "title": "Spring Gala",
            "content": "Join us for the gala.",
            "category": "Events",
            "status": "PUBLISHED"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(create.status(), StatusCode::CREATED);
    let post: Value = create.json().await.unwrap();
    assert_eq!(post["slug"], "spring-gala");
    assert!(post["publishedAt"].is_string());
    let post_id = post["id"].as_str().unwrap().to_string();

    // 2. Members cannot author.
    let forbidden = app
        .client
        .post(app.url("/api/posts"))
        .header("x-user-id", member.id.to_string())
        .json(&json!({ "title": "Mine", "content": "c", "category": "c" }))
        .send()
        .await
        .unwrap();
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

    // 3. Member comments and likes.
    let comment = app
        .client
        .post(app.url(&format!("/api/posts/{post_id}/comments")))
        .header("x-user-id", member.id.to_string())
        .json(&json!({ "content": "Count me in" }))
        .send()
        .await
        .unwrap();
    assert_eq!(comment.status(), StatusCode::CREATED);

    let like = app
        .client
        .post(app.url(&format!("/api/posts/{post_id}/like")))
        .header("x-user-id", member.id.to_string())
        .send()
        .await
        .unwrap();
    let like: Value = like.json().await.unwrap();
    assert_eq!(like["liked"], true);
    assert_eq!(like["likesCount"], 1);

    // 4. Public article view.
    let view: Value = app
        .client
        .get(app.url("/api/posts/by-slug/spring-gala"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(view["likesCount"], 1);
    assert_eq!(view["likedByUser"], false);
    assert_eq!(view["comments"][0]["content"], "Count me in");
    assert_eq!(view["comments"][0]["author"]["name"], "Seeded User");

    // 5. Listing shows the counters.
    let page: Value = app
        .client
        .get(app.url("/api/posts?category=Events"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["likes"], 1);
    assert_eq!(page["items"][0]["comments"], 1);

    // 6. Cleanup by the author.
    let delete = app
        .client
        .delete(app.url(&format!("/api/posts/{post_id}")))
        .header("x-user-id", admin.id.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(delete.status(), StatusCode::NO_CONTENT);

    let gone = app
        .client
        .get(app.url(&format!("/api/posts/{post_id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_json_is_rejected() {
    let app = spawn_app().await;
    let response = app
        .client
        .post(app.url("/api/auth/signin"))
        .header(header::CONTENT_TYPE, "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}
