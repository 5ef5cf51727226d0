use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{delete, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};

use taskboard_client::HttpAuthority;
use taskboard_core::remote::{RemoteAuthority, RemoteError};
use taskboard_core::types::{CardPatch, NewCard, Priority};
use taskboard_core::{BoardStore, Intent, MutationError};

type Seen = Arc<Mutex<Vec<(&'static str, Value)>>>;

fn board_json() -> Value {
    json!({
        "id": 1,
        "board_name": "Sprint",
        "user_id": 7,
        "columns": [
            {"id": 10, "board_id": 1, "column_name": "Todo", "position": 0, "cards": [
                {"id": 100, "column_id": 10, "position": 0, "title": "Write docs",
                 "priority": "high", "user_id": 7, "name": "Ana", "job": "docs"},
                {"id": 101, "column_id": 10, "position": 1, "title": "Review",
                 "priority": "low", "user_id": 9}
            ]},
            {"id": 12, "board_id": 1, "column_name": "Done", "position": 1, "cards": []}
        ]
    })
}

fn record(seen: &Seen, path: &'static str, body: Value) {
    seen.lock().unwrap().push((path, body));
}

async fn all_boards(State(seen): State<Seen>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let known = body["userId"] != "0";
    record(&seen, "all-userboard", body);
    if known {
        (
            StatusCode::OK,
            Json(json!({"message": "Berhasil mendapatkan daftar board.", "boards": [board_json()]})),
        )
    } else {
        (StatusCode::NOT_FOUND, Json(json!({"message": "User tidak ditemukan"})))
    }
}

async fn create_column(State(seen): State<Seen>, Json(body): Json<Value>) -> Json<Value> {
    record(&seen, "create-column", body);
    Json(json!({"columnId": 11, "position": 2}))
}

async fn update_column(State(seen): State<Seen>, Json(body): Json<Value>) -> Json<Value> {
    let locked = body["columnName"] == "locked";
    record(&seen, "update-column", body);
    if locked {
        Json(json!({"success": false, "message": "Column locked"}))
    } else {
        Json(json!({"success": true}))
    }
}

async fn create_card(State(seen): State<Seen>, Json(body): Json<Value>) -> Json<Value> {
    record(&seen, "create-card", body);
    Json(json!({"cardId": 200, "position": 2}))
}

async fn update_card(State(seen): State<Seen>, Json(body): Json<Value>) -> Json<Value> {
    record(&seen, "update-card", body);
    Json(json!({"success": true}))
}

async fn delete_card(State(seen): State<Seen>, Json(body): Json<Value>) -> StatusCode {
    record(&seen, "delete-card", body);
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn move_card(State(seen): State<Seen>, Json(body): Json<Value>) -> Json<Value> {
    let slow = body["cardId"] == "101";
    record(&seen, "update-card-position", body);
    if slow {
        tokio::time::sleep(Duration::from_secs(5)).await;
    }
    Json(json!({"success": true}))
}

async fn serve() -> (String, Seen) {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route("/api/all-userboard", post(all_boards))
        .route("/api/create-column", post(create_column))
        .route("/api/update-column", put(update_column))
        .route("/api/create-card", post(create_card))
        .route("/api/update-card", put(update_card))
        .route("/api/delete-card", delete(delete_card))
        .route("/api/update-card-position", put(move_card))
        .with_state(seen.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), seen)
}

fn authority(base_url: &str) -> HttpAuthority {
    HttpAuthority::new(base_url, Duration::from_millis(500)).unwrap()
}

fn last_body(seen: &Seen, path: &str) -> Value {
    seen.lock()
        .unwrap()
        .iter()
        .rev()
        .find(|(p, _)| *p == path)
        .map(|(_, body)| body.clone())
        .unwrap()
}

fn calls(seen: &Seen, path: &str) -> usize {
    seen.lock().unwrap().iter().filter(|(p, _)| *p == path).count()
}

#[tokio::test]
async fn test_list_boards_parses_records() {
    let (url, seen) = serve().await;
    let boards = authority(&url).list_boards("7").await.unwrap();

    assert_eq!(last_body(&seen, "all-userboard"), json!({"userId": "7"}));
    assert_eq!(boards.len(), 1);
    let board = &boards[0];
    assert_eq!(board.id, "1");
    assert_eq!(board.name, "Sprint");
    assert_eq!(board.columns[0].cards[0].priority, Priority::High);
    assert_eq!(board.columns[0].cards[0].assignee, "Ana");
    assert_eq!(board.columns[0].cards[1].owner.as_deref(), Some("9"));
}

#[tokio::test]
async fn test_error_status_maps_to_rejected_with_message() {
    let (url, _) = serve().await;
    let err = authority(&url).list_boards("0").await.unwrap_err();
    assert_eq!(err, RemoteError::Rejected("User tidak ditemukan".into()));
}

#[tokio::test]
async fn test_fetch_board_picks_from_user_boards() {
    let (url, seen) = serve().await;
    let auth = authority(&url);

    let board = auth.fetch_board("1", "7").await.unwrap();
    assert_eq!(board.name, "Sprint");
    assert_eq!(last_body(&seen, "all-userboard"), json!({"userId": "7"}));

    let err = auth.fetch_board("2", "7").await.unwrap_err();
    assert_eq!(err, RemoteError::Rejected("Board not found: 2".into()));
}

#[tokio::test]
async fn test_error_status_without_body() {
    let (url, seen) = serve().await;
    let err = authority(&url).delete_card("100").await.unwrap_err();
    assert_eq!(
        err,
        RemoteError::Rejected("Request failed with status 500".into())
    );
    assert_eq!(last_body(&seen, "delete-card"), json!({"cardId": "100"}));
}

#[tokio::test]
async fn test_success_false_is_rejected() {
    let (url, _) = serve().await;
    let auth = authority(&url);
    auth.rename_column("10", "Doing").await.unwrap();
    let err = auth.rename_column("10", "locked").await.unwrap_err();
    assert_eq!(err, RemoteError::Rejected("Column locked".into()));
}

#[tokio::test]
async fn test_timeout_is_unreachable() {
    let (url, _) = serve().await;
    let err = authority(&url).move_card("101", "12", 0).await.unwrap_err();
    assert!(matches!(err, RemoteError::Unreachable(_)));
}

#[tokio::test]
async fn test_closed_port_is_unreachable() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = authority(&format!("http://{}", addr))
        .list_boards("7")
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::Unreachable(_)));
}

#[tokio::test]
async fn test_request_bodies_use_server_field_names() {
    let (url, seen) = serve().await;
    let auth = authority(&url);

    let mut card = NewCard::titled("Ship");
    card.priority = Priority::Medium;
    card.assignee = "Ana".into();
    let created = auth.create_card("10", &card, "7").await.unwrap();
    assert_eq!(created.id, "200");
    assert_eq!(created.position, 2);
    assert_eq!(
        last_body(&seen, "create-card"),
        json!({
            "columnId": "10", "cardTitle": "Ship", "priority": "Medium",
            "description": "", "name": "Ana", "job": "", "userId": "7"
        })
    );

    let patch = CardPatch {
        title: Some("Ship it".into()),
        ..CardPatch::default()
    };
    auth.update_card("200", &patch, "7").await.unwrap();
    assert_eq!(
        last_body(&seen, "update-card"),
        json!({"cardId": "200", "userId": "7", "cardTitle": "Ship it"})
    );

    auth.move_card("100", "12", 0).await.unwrap();
    assert_eq!(
        last_body(&seen, "update-card-position"),
        json!({"cardId": "100", "newColumnId": "12", "newPosition": 0})
    );
}

#[tokio::test]
async fn test_store_round_trip_over_http() {
    let (url, seen) = serve().await;
    let store = BoardStore::new(Arc::new(authority(&url)));
    store.sync_boards("7").await.unwrap();
    assert_eq!(store.selected_board_id().as_deref(), Some("1"));

    let visible = store.current_visible(Some("7")).unwrap();
    assert_eq!(visible.columns[0].cards.len(), 1);

    // Create column: server id adopted, then the board is re-fetched.
    let done = store
        .apply(Intent::CreateColumn {
            board_id: "1".into(),
            name: "Review".into(),
        })
        .await
        .unwrap();
    assert_eq!(done.entity_id.as_deref(), Some("11"));
    assert!(done.refetched);
    assert_eq!(calls(&seen, "all-userboard"), 2);
    assert_eq!(last_body(&seen, "all-userboard"), json!({"userId": "7"}));

    // Rejected rename rolls back.
    let err = store
        .apply(Intent::RenameColumn {
            column_id: "10".into(),
            name: "locked".into(),
        })
        .await
        .unwrap_err();
    assert_eq!(err, MutationError::RemoteRejected("Column locked".into()));
    assert_eq!(store.board("1").unwrap().columns[0].name, "Todo");
}
