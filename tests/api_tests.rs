// tests/api_tests.rs

use std::{net::SocketAddr, time::Duration};

use chrono::FixedOffset;
use class_portal::{
    config::{Config, MAX_EXAM_PART_DEPTH},
    routes,
    services::access::AccessComparison,
    state::AppState,
    utils::jwt::{ROLE_ADMIN, ROLE_STUDENT, sign_jwt},
};
use serde_json::{Value, json};

const SECRET: &str = "test_secret_for_integration_tests";

fn test_config() -> Config {
    Config {
        jwt_secret: SECRET.to_string(),
        rust_log: "error".to_string(),
        bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        allowed_origins: vec!["http://localhost:5173".to_string()],
        portal_offset: FixedOffset::east_opt(19800).unwrap(),
        access_comparison: AccessComparison::CalendarDay,
        cache_ttl: Duration::from_secs(600),
        log_dir: "logs".to_string(),
    }
}

/// Helper function to spawn the app on a random port for testing.
/// Returns the base URL (e.g., "http://127.0.0.1:12345").
async fn spawn_app() -> String {
    let app = routes::create_router(AppState::new(test_config()));

    // Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    // Spawn the server in the background
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    address
}

fn student_token() -> (String, String) {
    let student_id = format!("stu_{}", &uuid::Uuid::new_v4().to_string()[..8]);
    let token = sign_jwt(&student_id, ROLE_STUDENT, SECRET, 600).unwrap();
    (student_id, token)
}

fn admin_token() -> String {
    sign_jwt("staff_1", ROLE_ADMIN, SECRET, 600).unwrap()
}

fn unique_class() -> String {
    format!("class-{}", &uuid::Uuid::new_v4().to_string()[..8])
}

#[tokio::test]
async fn health_check_works() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/api/health", address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn unknown_path_returns_404() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn protected_routes_require_token() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/exams/results/tree", address))
        .json(&json!({ "rows": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);

    let response = client
        .post(format!("{}/api/exams/results/tree", address))
        .bearer_auth(sign_jwt("stu_1", ROLE_STUDENT, "wrong_secret", 600).unwrap())
        .json(&json!({ "rows": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn evaluate_access_inline() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (_, token) = student_token();

    let payload = |now: &str| {
        json!({
            "tracking": { "enabled": true, "freeDays": 7 },
            "payments": [
                { "purchase_date": "2025-05-02 10:00:00", "amount": "2500", "status": "paid" },
                { "created_at": "2025-07-29 18:45:00", "price": 2500 },
                { "date": "not a date", "amount": 2500 }
            ],
            "now": now
        })
    };

    let response = client
        .post(format!("{}/api/access/evaluate", address))
        .bearer_auth(&token)
        .json(&payload("2025-08-08 21:00:00"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["can_access"], true);
    assert_eq!(body["status"], "paid");
    assert_eq!(body["next_payment_date"], "2025-08-01");
    assert_eq!(body["grace_period_end_date"], "2025-08-08");
    assert_eq!(body["days_remaining"], 0);

    let response = client
        .post(format!("{}/api/access/evaluate", address))
        .bearer_auth(&token)
        .json(&payload("2025-08-09"))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["can_access"], false);
    assert_eq!(body["status"], "payment-required");
    assert!(body.get("days_remaining").is_none());
}

#[tokio::test]
async fn evaluate_access_rejects_bad_input() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (_, token) = student_token();

    let response = client
        .post(format!("{}/api/access/evaluate", address))
        .bearer_auth(&token)
        .json(&json!({ "tracking": { "enabled": true, "free_days": 400 }, "payments": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    let response = client
        .post(format!("{}/api/access/evaluate", address))
        .bearer_auth(&token)
        .json(&json!({ "tracking": { "enabled": true, "free_days": 3 }, "payments": [], "now": "soon" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    let response = client
        .post(format!("{}/api/access/evaluate", address))
        .bearer_auth(&token)
        .json(&json!({ "tracking": { "enabled": true, "free_days": 3 }, "payments": [42] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Record 0 is not a JSON object");
}

#[tokio::test]
async fn cached_class_access_flow() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (_, token) = student_token();
    let class_id = unique_class();

    // Nothing loaded yet.
    let response = client
        .get(format!("{}/api/classes/{}/access", address, class_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);

    // Students cannot change class settings.
    let response = client
        .put(format!("{}/api/admin/classes/{}/tracking", address, class_id))
        .bearer_auth(&token)
        .json(&json!({ "enabled": true, "free_days": 5 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    let response = client
        .put(format!("{}/api/admin/classes/{}/tracking", address, class_id))
        .bearer_auth(admin_token())
        .json(&json!({ "enabled": true, "free_days": 5 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let response = client
        .get(format!("{}/api/classes/{}/tracking", address, class_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "enabled": true, "free_days": 5 }));

    // Settings alone are not enough while tracking is on.
    let response = client
        .get(format!("{}/api/classes/{}/access", address, class_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);

    let response = client
        .put(format!("{}/api/classes/{}/payments", address, class_id))
        .bearer_auth(&token)
        .json(&json!({ "payments": [
            { "date": "2025-03-10", "amount": 2000 },
            { "date": "2025-03-31 23:59:00", "amount": 2000, "status": "failed" }
        ] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["stored"], 2);

    let response = client
        .get(format!("{}/api/classes/{}/access?at=2025-04-06", address, class_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "paid");
    assert_eq!(body["days_remaining"], 0);

    let response = client
        .get(format!("{}/api/classes/{}/access?at=2025-04-07", address, class_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "payment-required");

    // Paying invalidates the cached history until it is reloaded.
    let response = client
        .post(format!("{}/api/classes/{}/payment-completed", address, class_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 204);

    let response = client
        .get(format!("{}/api/classes/{}/access", address, class_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn import_payments_from_polluted_body() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (_, token) = student_token();
    let class_id = unique_class();

    client
        .put(format!("{}/api/admin/classes/{}/tracking", address, class_id))
        .bearer_auth(admin_token())
        .json(&json!({ "enabled": true, "free_days": 7 }))
        .send()
        .await
        .unwrap();

    let body = "<br />\n<b>Notice</b>:  Undefined index: month in <b>/srv/api/get_payments.php</b> on line <b>31</b><br />\n{\"success\":true,\"data\":[{\"payment_date\":\"2025-07-29 11:20:00\",\"amount\":\"2500.00\",\"status\":\"completed\"}]}";

    let response = client
        .post(format!("{}/api/classes/{}/payments/import", address, class_id))
        .bearer_auth(&token)
        .header("content-type", "text/plain")
        .body(body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let stored: Value = response.json().await.unwrap();
    assert_eq!(stored["stored"], 1);

    let response = client
        .get(format!("{}/api/classes/{}/access?at=2025-08-08T09:00:00", address, class_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let status: Value = response.json().await.unwrap();
    assert_eq!(status["can_access"], true);

    let response = client
        .post(format!("{}/api/classes/{}/payments/import", address, class_id))
        .bearer_auth(&token)
        .body("<html><body>502 Bad Gateway</body></html>")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn disabled_tracking_needs_no_history() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (_, token) = student_token();
    let class_id = unique_class();

    client
        .put(format!("{}/api/admin/classes/{}/tracking", address, class_id))
        .bearer_auth(admin_token())
        .json(&json!({ "enabled": false, "free_days": 0 }))
        .send()
        .await
        .unwrap();

    let response = client
        .get(format!("{}/api/classes/{}/access", address, class_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "no-tracking");
    assert_eq!(body["can_access"], true);
}

#[tokio::test]
async fn admin_cache_invalidation() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let class_id = unique_class();

    client
        .put(format!("{}/api/admin/classes/{}/tracking", address, class_id))
        .bearer_auth(admin_token())
        .json(&json!({ "enabled": true, "free_days": 7 }))
        .send()
        .await
        .unwrap();

    let response = client
        .delete(format!("{}/api/admin/classes/{}/cache", address, class_id))
        .bearer_auth(admin_token())
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["removed"], 1);

    let response = client
        .delete(format!("{}/api/admin/cache", address))
        .bearer_auth(admin_token())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["removed"], 0);
}

#[tokio::test]
async fn exam_tree_from_rows() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (_, token) = student_token();

    let response = client
        .post(format!("{}/api/exams/results/tree", address))
        .bearer_auth(&token)
        .json(&json!({ "rows": [
            { "part_id": "p1", "parent_part_id": null, "label": "Q1", "max_marks": null, "score_awarded": 0 },
            { "part_id": "p1b", "parent_part_id": "p1", "label": "1b", "max_marks": 5, "score_awarded": 3 },
            { "part_id": "p1a", "parent_part_id": "p1", "label": "1a", "max_marks": 5, "score_awarded": 4 },
            { "question_part_id": 9, "parent_id": 2, "parent_label": "Q2", "label": "2a", "max_marks": "10", "score": "6" }
        ] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let body: Value = response.json().await.unwrap();
    let parts = body["parts"].as_array().unwrap();
    assert_eq!(parts.len(), 2);
    assert_eq!(parts[0]["id"], "p1");
    assert_eq!(parts[0]["score"], 7.0);
    assert_eq!(parts[0]["max_marks"], 10.0);
    assert_eq!(parts[0]["children"][0]["label"], "1a");
    assert_eq!(parts[0]["children"][1]["label"], "1b");
    assert_eq!(parts[1]["label"], "Q2");
    assert_eq!(parts[1]["score"], 6.0);

    assert_eq!(body["summary"]["total_score"], 13.0);
    assert_eq!(body["summary"]["total_max_marks"], 20.0);
    assert_eq!(body["summary"]["percentage"], 65.0);
}

#[tokio::test]
async fn exam_tree_import_with_policy() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (_, token) = student_token();

    let body = "Deprecated output\n{\"results\":[{\"id\":1,\"label\":\"Q1\",\"score_awarded\":2},{\"id\":2,\"parent_id\":1,\"label\":\"1a\",\"max_marks\":4,\"score_awarded\":3}]}";

    let response = client
        .post(format!("{}/api/exams/results/tree/import?own_score_policy=include-own", address))
        .bearer_auth(&token)
        .body(body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let tree: Value = response.json().await.unwrap();
    assert_eq!(tree["parts"][0]["score"], 5.0);
    assert_eq!(tree["parts"][0]["max_marks"], 4.0);
    assert_eq!(tree["summary"]["percentage"], 125.0);
}

#[tokio::test]
async fn exam_tree_with_deep_parent_chain() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (_, token) = student_token();

    let rows: Vec<Value> = (0..5000)
        .map(|i| {
            let parent = if i == 0 { Value::Null } else { json!(format!("n{}", i - 1)) };
            json!({ "part_id": format!("n{i}"), "parent_part_id": parent, "label": format!("N{i}"), "max_marks": 1, "score_awarded": 1 })
        })
        .collect();

    let response = client
        .post(format!("{}/api/exams/results/tree", address))
        .bearer_auth(&token)
        .json(&json!({ "rows": rows }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let tree: Value = response.json().await.unwrap();
    assert_eq!(tree["parts"].as_array().unwrap().len(), 5000usize.div_ceil(MAX_EXAM_PART_DEPTH));
    assert_eq!(tree["parts"][0]["id"], "n0");

    // Still serving afterwards.
    let health = client
        .get(format!("{}/api/health", address))
        .send()
        .await
        .unwrap();
    assert!(health.status().is_success());
}

#[tokio::test]
async fn openapi_document_is_served() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/api-docs/openapi.json", address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let doc: Value = response.json().await.unwrap();
    assert!(doc["paths"].get("/api/classes/{class_id}/access").is_some());
}
