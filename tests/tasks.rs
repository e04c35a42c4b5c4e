mod common;

use automation_portal::{
    AppError,
    config::RoleSource,
    models::user::Role,
    services::tasks::{PendingTask, TaskAck, TaskClient},
};
use chrono::{TimeZone, Utc};
use serde_json::json;
use wiremock::matchers::{body_json, body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::*;

async fn signed_in(server: &MockServer, role_source: RoleSource) -> TaskClient {
    mount_session(server, alice(&["Ops"])).await;
    let (controller, _) = controller_for(server, role_source);
    controller.handle_token(&seal(CREDENTIAL)).await.unwrap();
    TaskClient::new(controller)
}

#[tokio::test]
async fn lists_pending_approvals() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tasks/waiting-for-approvals"))
        .and(header("authorization", "Bearer abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"ID": 3, "type": "elk-data-view", "requested_by": "Bob"}
        ])))
        .mount(&server)
        .await;
    let client = signed_in(&server, RoleSource::LegacyAdmin).await;

    let pending = client.pending_approvals().await.unwrap();

    assert_eq!(
        pending,
        vec![PendingTask {
            id: 3,
            kind: "elk-data-view".to_string(),
            requested_by: "Bob".to_string(),
        }]
    );
}

#[tokio::test]
async fn admin_approves_with_author() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/task/approve"))
        .and(body_json(json!({"task_id": 3, "author": "Alice"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"task_id": 3})))
        .expect(1)
        .mount(&server)
        .await;
    let client = signed_in(&server, RoleSource::LegacyAdmin).await;

    assert_eq!(client.approve(3).await.unwrap(), TaskAck { task_id: 3 });
}

#[tokio::test]
async fn approval_follows_true_role_not_assumed_role() {
    let server = MockServer::start().await;
    mount_session(&server, alice(&["Ops"])).await;
    Mock::given(method("PATCH"))
        .and(path("/task/decline"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"task_id": 9})))
        .expect(1)
        .mount(&server)
        .await;
    let (controller, _) = controller_for(&server, RoleSource::LegacyAdmin);
    controller.handle_token(&seal(CREDENTIAL)).await.unwrap();
    controller.assume_role(Role::User);

    let client = TaskClient::new(controller);
    assert_eq!(client.decline(9).await.unwrap().task_id, 9);
}

#[tokio::test]
async fn non_admin_cannot_decide() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let client = signed_in(&server, claims_source()).await;

    assert!(matches!(client.approve(3).await, Err(AppError::Unauthorized)));
    assert!(matches!(client.decline(3).await, Err(AppError::Unauthorized)));
}

#[tokio::test]
async fn backend_message_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/task/approve"))
        .respond_with(
            ResponseTemplate::new(409).set_body_json(json!({"message": "Task already approved"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/task/decline"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;
    let client = signed_in(&server, RoleSource::LegacyAdmin).await;

    match client.approve(3).await {
        Err(AppError::Backend(message)) => assert_eq!(message, "Task already approved"),
        other => panic!("unexpected result: {:?}", other),
    }
    match client.decline(3).await {
        Err(AppError::Backend(message)) => assert_eq!(message, "Failed to decline automation"),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn suggestions_query_backend_only_for_non_empty_patterns() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/elk/data-streams"))
        .and(query_param("index-pattern", "logs-*"))
        .and(query_param("exact", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(["logs-app", "logs-db"])))
        .expect(1)
        .mount(&server)
        .await;
    let client = signed_in(&server, claims_source()).await;

    assert!(client.data_stream_suggestions("  ", false).await.unwrap().is_empty());
    assert_eq!(
        client.data_stream_suggestions("logs-*", true).await.unwrap(),
        vec!["logs-app".to_string(), "logs-db".to_string()]
    );
}

#[tokio::test]
async fn submits_data_view_run() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/task/elk-data-view"))
        .and(header("content-type", "application/json"))
        .and(body_partial_json(json!({
            "scheduled_at": "2026-10-20T08:30:00.000Z",
            "requested_by": "Alice",
            "parameters": {"index-pattern": "logs-*"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"task_id": 12})))
        .expect(1)
        .mount(&server)
        .await;
    let client = signed_in(&server, claims_source()).await;

    let scheduled = Utc.with_ymd_and_hms(2026, 10, 20, 8, 30, 0).unwrap();
    let task = client.submit_data_view("logs-*", Some(scheduled)).await.unwrap();

    assert_eq!(task.task_id, Some(12));
}

#[tokio::test]
async fn submitting_requires_a_user_and_a_pattern() {
    let server = MockServer::start().await;
    let (controller, _) = controller_for(&server, RoleSource::LegacyAdmin);
    let client = TaskClient::new(controller);

    assert!(matches!(
        client.submit_data_view("logs-*", None).await,
        Err(AppError::Unauthorized)
    ));
    assert!(matches!(
        client.submit_data_view("", None).await,
        Err(AppError::Validation(_))
    ));
}
