//! End-to-end tests of the HTTP surface over the in-memory store.

use std::sync::Arc;

use api_lib::config::Config;
use api_lib::web::{auth::hash_password, router, state::AppState};
use axum::{
    body::Body,
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use classification_core::domain::{AuthSession, NewUser};
use classification_core::MemoryStore;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

struct TestApp {
    app: Router,
    state: Arc<AppState>,
}

struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Response {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("response body is JSON")
    }
}

fn test_app() -> TestApp {
    let config = Config::from_lookup(|key| match key {
        "DATABASE_URL" => Some("postgres://unused".to_string()),
        _ => None,
    })
    .expect("test config is valid");
    let state = Arc::new(AppState::new(Arc::new(MemoryStore::new()), Arc::new(config)));
    TestApp {
        app: router(state.clone()),
        state,
    }
}

impl TestApp {
    /// Creates a user and a live session for it, returning the cookie value.
    async fn login_as(&self, username: &str, is_admin: bool, can_edit: bool, assigned: Vec<Uuid>) -> String {
        let user = self
            .state
            .catalog
            .create_user(NewUser {
                username: username.to_string(),
                hashed_password: "not-a-real-hash".to_string(),
                is_admin,
                can_edit_categories: can_edit,
                assigned_materials: assigned,
            })
            .await
            .unwrap();
        let session = AuthSession {
            id: Uuid::new_v4().to_string(),
            user_id: user.id,
            expires_at: Utc::now() + Duration::days(1),
        };
        self.state.db.create_auth_session(&session).await.unwrap();
        format!("session={}", session.id)
    }

    async fn send(&self, method: &str, uri: &str, cookie: Option<&str>, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes().to_vec();
        Response { status, headers, body }
    }
}

#[tokio::test]
async fn protected_routes_need_a_session() {
    let t = test_app();

    let res = t.send("GET", "/categories", None, None).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.json()["error"], "unauthorized");

    let res = t.send("GET", "/categories", Some("session=bogus"), None).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_sets_a_cookie_that_opens_protected_routes() {
    let t = test_app();
    t.state
        .catalog
        .create_user(NewUser {
            username: "editor".to_string(),
            hashed_password: hash_password("secret1").unwrap(),
            is_admin: false,
            can_edit_categories: true,
            assigned_materials: Vec::new(),
        })
        .await
        .unwrap();

    let res = t
        .send("POST", "/auth/login", None, Some(json!({"username": "editor", "password": "wrong!"})))
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let res = t
        .send("POST", "/auth/login", None, Some(json!({"username": "editor", "password": "secret1"})))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    let set_cookie = res.headers[header::SET_COOKIE].to_str().unwrap().to_string();
    assert!(set_cookie.contains("HttpOnly"));
    let cookie = set_cookie.split(';').next().unwrap().to_string();

    let me = t.send("GET", "/auth/me", Some(&cookie), None).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.json()["username"], "editor");
    assert_eq!(me.json()["canEditCategories"], true);

    let out = t.send("POST", "/auth/logout", Some(&cookie), None).await;
    assert_eq!(out.status, StatusCode::OK);
    let me = t.send("GET", "/auth/me", Some(&cookie), None).await;
    assert_eq!(me.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn classify_preview_and_export_a_material() {
    let t = test_app();
    let admin = t.login_as("admin", true, true, Vec::new()).await;

    let a = t.send("POST", "/categories", Some(&admin), Some(json!({"name": "A"}))).await;
    assert_eq!(a.status, StatusCode::CREATED);
    let a_id = a.json()["id"].as_str().unwrap().to_string();
    let b = t
        .send("POST", "/categories", Some(&admin), Some(json!({"name": "B", "parentId": a_id})))
        .await;
    let b_id = b.json()["id"].as_str().unwrap().to_string();
    let c = t
        .send("POST", "/categories", Some(&admin), Some(json!({"name": "C", "parentId": b_id})))
        .await;
    let c_id = c.json()["id"].as_str().unwrap().to_string();

    let m = t
        .send("POST", "/materials", Some(&admin), Some(json!({"title": "Fiqh 101", "author": "X"})))
        .await;
    assert_eq!(m.status, StatusCode::CREATED);
    let m_id = m.json()["id"].as_str().unwrap().to_string();

    let s = t
        .send(
            "POST",
            "/segments",
            Some(&admin),
            Some(json!({"materialId": m_id, "content": "first paragraph", "pageNumber": 5, "categoryId": c_id})),
        )
        .await;
    assert_eq!(s.status, StatusCode::CREATED);
    assert_eq!(s.json()["orderIndex"], 0);

    let detail = t
        .send("GET", &format!("/categories/{}", c_id), Some(&admin), None)
        .await
        .json();
    let names: Vec<&str> = detail["path"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["A", "B", "C"]);

    let preview = t.send("GET", &format!("/materials/{}/preview", m_id), Some(&admin), None).await;
    assert_eq!(preview.status, StatusCode::OK);
    let body = preview.json();
    assert_eq!(body["segments"][0]["categoryPath"], json!(["A", "B", "C", "", "", ""]));
    assert_eq!(body["segments"][0]["categoryName"], "C");
    assert_eq!(body["segments"][0]["pageNumber"], 5);

    let export = t.send("GET", &format!("/materials/{}/export", m_id), Some(&admin), None).await;
    assert_eq!(export.status, StatusCode::OK);
    assert_eq!(
        export.headers[header::CONTENT_TYPE],
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
    );
    assert_eq!(
        export.headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"Fiqh_101.xlsx\""
    );
    assert!(export.body.starts_with(b"PK"));
}

#[tokio::test]
async fn integrity_errors_map_to_statuses() {
    let t = test_app();
    let admin = t.login_as("admin", true, true, Vec::new()).await;

    let root = t.send("POST", "/categories", Some(&admin), Some(json!({"name": "Root"}))).await;
    let root_id = root.json()["id"].as_str().unwrap().to_string();
    t.send("POST", "/categories", Some(&admin), Some(json!({"name": "Leaf", "parentId": root_id})))
        .await;

    let res = t.send("DELETE", &format!("/categories/{}", root_id), Some(&admin), None).await;
    assert_eq!(res.status, StatusCode::CONFLICT);
    assert_eq!(res.json()["error"], "has_children");

    let res = t
        .send("PUT", &format!("/categories/{}", root_id), Some(&admin), Some(json!({"name": "Root", "parentId": root_id})))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.json()["error"], "self_parent");

    let m = t
        .send("POST", "/materials", Some(&admin), Some(json!({"title": "M", "author": "X"})))
        .await;
    let m_id = m.json()["id"].as_str().unwrap().to_string();
    let res = t
        .send("POST", &format!("/materials/{}/reorder", m_id), Some(&admin), Some(json!({"segmentIds": []})))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.json()["error"], "empty_list");

    let stray = Uuid::new_v4();
    let res = t
        .send("POST", &format!("/materials/{}/reorder", m_id), Some(&admin), Some(json!({"segmentIds": [stray]})))
        .await;
    assert_eq!(res.json()["error"], "invalid_reference");
    assert_eq!(res.json()["ids"], json!([stray]));

    let res = t.send("GET", &format!("/segments/{}", Uuid::new_v4()), Some(&admin), None).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reorder_reports_counts() {
    let t = test_app();
    let admin = t.login_as("admin", true, true, Vec::new()).await;
    let m = t.state.catalog.create_material("M", "X").await.unwrap();
    let first = t.state.catalog.create_segment(m.id, "one", 1, None).await.unwrap();
    let second = t.state.catalog.create_segment(m.id, "two", 2, None).await.unwrap();

    let res = t
        .send(
            "POST",
            &format!("/materials/{}/reorder", m.id),
            Some(&admin),
            Some(json!({"segmentIds": [second.id, first.id]})),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json()["matchedCount"], 2);
    assert_eq!(res.json()["modifiedCount"], 2);
    assert_eq!(res.json()["partial"], false);

    let listed = t
        .send("GET", &format!("/materials/{}/segments?order=display", m.id), Some(&admin), None)
        .await;
    let contents: Vec<String> = listed
        .json()
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["content"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(contents, ["two", "one"]);
}

#[tokio::test]
async fn non_admins_only_reach_assigned_materials() {
    let t = test_app();
    let mine = t.state.catalog.create_material("Mine", "X").await.unwrap();
    let other = t.state.catalog.create_material("Other", "X").await.unwrap();
    let reader = t.login_as("reader", false, false, vec![mine.id]).await;

    let res = t.send("GET", "/materials", Some(&reader), None).await;
    let titles: Vec<String> = res
        .json()
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["title"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(titles, ["Mine"]);

    let res = t.send("GET", &format!("/materials/{}", other.id), Some(&reader), None).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = t
        .send(
            "POST",
            "/segments",
            Some(&reader),
            Some(json!({"materialId": other.id, "content": "x", "pageNumber": 1})),
        )
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = t.send("POST", "/categories", Some(&reader), Some(json!({"name": "Nope"}))).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = t
        .send("POST", "/materials", Some(&reader), Some(json!({"title": "New", "author": "X"})))
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = t.send("GET", "/users", Some(&reader), None).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admins_manage_users() {
    let t = test_app();
    let admin = t.login_as("admin", true, true, Vec::new()).await;

    let res = t
        .send("POST", "/users", Some(&admin), Some(json!({"username": "ab", "password": "secret1"})))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = t
        .send("POST", "/users", Some(&admin), Some(json!({"username": "abc", "password": "123"})))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = t
        .send("POST", "/users", Some(&admin), Some(json!({"username": "abc", "password": "secret1"})))
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    let id = res.json()["id"].as_str().unwrap().to_string();

    let res = t
        .send("POST", "/users", Some(&admin), Some(json!({"username": "abc", "password": "secret1"})))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = t
        .send("PUT", &format!("/users/{}", id), Some(&admin), Some(json!({"canEditCategories": true})))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json()["canEditCategories"], true);

    let res = t.send("DELETE", &format!("/users/{}", id), Some(&admin), None).await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn recent_segments_only_count_assigned_materials() {
    let t = test_app();
    let mine = t.state.catalog.create_material("Mine", "X").await.unwrap();
    let other = t.state.catalog.create_material("Other", "X").await.unwrap();
    let own = t.state.catalog.create_segment(mine.id, "mine", 1, None).await.unwrap();
    for page in 1..=10 {
        t.state.catalog.create_segment(other.id, "other", page, None).await.unwrap();
    }
    let reader = t.login_as("reader", false, false, vec![mine.id]).await;
    let admin = t.login_as("admin", true, true, Vec::new()).await;

    let res = t.send("GET", "/segments/recent", Some(&reader), None).await;
    assert_eq!(res.status, StatusCode::OK);
    let ids: Vec<String> = res
        .json()
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, [own.id.to_string()]);

    let res = t.send("GET", "/segments/recent", Some(&admin), None).await;
    let materials: Vec<String> = res
        .json()
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["materialId"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(materials.len(), 10);
    assert!(materials.iter().all(|m| *m == other.id.to_string()));
}

#[tokio::test]
async fn reorder_accepts_ordered_ids_and_refuses_oversized_content() {
    let t = test_app();
    let admin = t.login_as("admin", true, true, Vec::new()).await;
    let m = t.state.catalog.create_material("M", "X").await.unwrap();
    let first = t.state.catalog.create_segment(m.id, "one", 1, None).await.unwrap();
    let second = t.state.catalog.create_segment(m.id, "two", 2, None).await.unwrap();

    let res = t
        .send(
            "POST",
            &format!("/materials/{}/reorder", m.id),
            Some(&admin),
            Some(json!({"orderedIds": [second.id, first.id]})),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json()["modifiedCount"], 2);

    let res = t
        .send(
            "POST",
            "/segments",
            Some(&admin),
            Some(json!({"materialId": m.id, "content": "ع".repeat(40_000), "pageNumber": 3})),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.json()["error"], "validation_error");

    let export = t.send("GET", &format!("/materials/{}/export", m.id), Some(&admin), None).await;
    assert_eq!(export.status, StatusCode::OK);
}
