//! Integration tests for per-peer quest progression routes.

mod common;

use axum::http::StatusCode;

#[tokio::test]
async fn test_start_quest_replicates_to_every_peer() {
    // Arrange
    let app = common::build_test_app(common::test_state(&[1, 2]));

    // Act
    let (status, json) = common::post_json(
        app,
        "/api/v1/peers/1/quests/start",
        &serde_json::json!({ "quest_index": 0 }),
    )
    .await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    let events = json["events"].as_array().unwrap();
    assert_eq!(events.len(), 2);
    for event in events {
        assert_eq!(event["event_type"], "quest.started");
        uuid::Uuid::parse_str(event["event_id"].as_str().unwrap()).unwrap();
    }
}

#[tokio::test]
async fn test_start_quest_out_of_range_returns_404() {
    let app = common::build_test_app(common::test_state(&[1]));

    let (status, json) = common::post_json(
        app,
        "/api/v1/peers/1/quests/start",
        &serde_json::json!({ "quest_index": 42 }),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "quest_index_out_of_range");
}

#[tokio::test]
async fn test_start_quest_for_unknown_peer_returns_404() {
    let app = common::build_test_app(common::test_state(&[1]));

    let (status, json) = common::post_json(
        app,
        "/api/v1/peers/3/quests/start",
        &serde_json::json!({ "quest_index": 0 }),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "unknown_peer");
}

#[tokio::test]
async fn test_report_progress_completes_quest_and_advances_log() {
    // Arrange
    let state = common::test_state(&[1, 2]);
    let app = common::build_test_app(state.clone());
    common::post_json(
        app,
        "/api/v1/peers/1/quests/start",
        &serde_json::json!({ "quest_index": 0 }),
    )
    .await;

    // Act
    let app = common::build_test_app(state.clone());
    let (status, json) = common::post_json(
        app,
        "/api/v1/peers/1/progress",
        &serde_json::json!({ "kind": "kill", "target_id": "Boar", "amount": 2 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(common::event_types(&json).contains(&"quest.objective_completed".to_owned()));

    let app = common::build_test_app(state.clone());
    let (status, json) = common::post_json(
        app,
        "/api/v1/peers/1/progress",
        &serde_json::json!({ "kind": "talk_to", "target_id": "farmer_odo", "amount": 1 }),
    )
    .await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    let completed: Vec<&serde_json::Value> = json["events"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|e| e["event_type"] == "quest.completed")
        .collect();
    assert_eq!(completed.len(), 2);

    let app = common::build_test_app(state.clone());
    let (status, json) = common::get_json(app, "/api/v1/peers/2/quests").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["peer_id"], 2);
    assert_eq!(json["current_quest_index"], 1);
    assert_eq!(json["quests"][0]["is_completed"], true);

    let app = common::build_test_app(state);
    let (_, json) = common::get_json(app, "/api/v1/peers/1/inventory").await;
    assert_eq!(json["gold_coin"], 25);
    assert_eq!(json["boar_hide"], 1);
}

#[tokio::test]
async fn test_report_zero_progress_returns_400() {
    let app = common::build_test_app(common::test_state(&[1]));

    let (status, json) = common::post_json(
        app,
        "/api/v1/peers/1/progress",
        &serde_json::json!({ "kind": "kill", "target_id": "Boar", "amount": 0 }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "validation_error");
}

#[tokio::test]
async fn test_report_progress_with_unknown_kind_is_rejected() {
    let app = common::build_test_app(common::test_state(&[1]));

    let (status, _) = common::post_json(
        app,
        "/api/v1/peers/1/progress",
        &serde_json::json!({ "kind": "dance", "target_id": "Boar", "amount": 1 }),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_complete_quest_twice_emits_nothing_the_second_time() {
    let state = common::test_state(&[1, 2]);
    let body = serde_json::json!({ "quest_index": 0 });

    let app = common::build_test_app(state.clone());
    let (_, first) = common::post_json(app, "/api/v1/peers/1/quests/complete", &body).await;
    let app = common::build_test_app(state);
    let (status, second) = common::post_json(app, "/api/v1/peers/2/quests/complete", &body).await;

    assert!(common::event_types(&first).contains(&"quest.completed".to_owned()));
    assert_eq!(status, StatusCode::OK);
    assert!(second["events"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_share_progress_reconciles_receiver() {
    // Arrange
    let state = common::test_state(&[1, 2]);
    let app = common::build_test_app(state.clone());
    common::post_json(
        app,
        "/api/v1/peers/1/quests/start",
        &serde_json::json!({ "quest_index": 0 }),
    )
    .await;
    let app = common::build_test_app(state.clone());
    common::post_json(
        app,
        "/api/v1/peers/2/progress",
        &serde_json::json!({ "kind": "kill", "target_id": "Boar", "amount": 1 }),
    )
    .await;

    // Act
    let app = common::build_test_app(state.clone());
    let (status, _) =
        common::post_json(app, "/api/v1/peers/2/share", &serde_json::json!({ "to": 1 })).await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    let app = common::build_test_app(state);
    let (_, json) = common::get_json(app, "/api/v1/peers/1/quests").await;
    assert_eq!(json["quests"][0]["objectives"][0]["current_count"], 1);
}
