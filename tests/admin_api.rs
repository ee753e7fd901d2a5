mod common;

use common::*;
use reqwest::StatusCode;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use traffic_director::admin;
use traffic_director::config::Algorithm;

const KEY: &str = "test-key";

#[tokio::test]
async fn runtime_registration_receives_traffic() {
    let backend = start_mock_backend(200, "registered").await;
    let mut config = test_config(&[], Algorithm::RoundRobin);
    config.admin.api_key = KEY.to_string();
    let lb = start_balancer(config).await;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let admin_addr = listener.local_addr().unwrap();
    let (admin_shutdown, admin_rx) = broadcast::channel(1);
    let admin_task = tokio::spawn(admin::serve(listener, lb.state.clone(), admin_rx));
    let client = reqwest::Client::new();
    let admin_url = |path: &str| format!("http://{}{}", admin_addr, path);

    assert_eq!(reqwest::get(lb.url("/")).await.unwrap().status(), StatusCode::SERVICE_UNAVAILABLE);

    let res = client
        .post(admin_url("/admin/instances"))
        .bearer_auth(KEY)
        .json(&serde_json::json!({ "id": "rt", "address": backend.to_string() }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = reqwest::get(lb.url("/")).await.unwrap();
    assert_eq!(res.text().await.unwrap(), "registered");

    let status: Value = client
        .get(admin_url("/admin/status"))
        .bearer_auth(KEY)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["lb_id"], "lb-test");
    assert_eq!(status["instances"][0]["id"], "rt");
    assert_eq!(status["instances"][0]["total_requests"], 1);
    assert_eq!(status["global"]["total_requests"], 1);

    let recs = client.get(admin_url("/admin/recommendations")).bearer_auth(KEY).send().await.unwrap();
    assert_eq!(recs.status(), StatusCode::OK);

    let res = client.delete(admin_url("/admin/instances/rt")).bearer_auth(KEY).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert_eq!(reqwest::get(lb.url("/")).await.unwrap().status(), StatusCode::SERVICE_UNAVAILABLE);

    let res = client.get(admin_url("/admin/instances")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    admin_shutdown.send(()).unwrap();
    assert!(admin_task.await.unwrap().is_ok());
}
