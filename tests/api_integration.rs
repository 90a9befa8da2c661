//! HTTP-level tests driving the router over the in-memory session store.

use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode},
};
use serde_json::{Value, json};
use tower::ServiceExt;

use quiz_sprint_back::{
    config::AppConfig,
    dao::session_store::memory::MemorySessionStore,
    routes,
    state::{
        AppState,
        quiz::{Alternative, Question},
    },
};

/// Five questions whose correct alternative is always `a`.
fn pool() -> Vec<Question> {
    (1..=5)
        .map(|n| Question {
            id: format!("q{n}"),
            text: format!("Question {n}?"),
            alternatives: ["a", "b", "c", "d"]
                .into_iter()
                .map(|id| Alternative {
                    id: id.into(),
                    text: format!("answer {id}"),
                })
                .collect(),
            correct_answer_id: "a".into(),
        })
        .collect()
}

async fn setup() -> Router {
    let config = AppConfig {
        questions_per_session: 5,
        questions: pool(),
        ..AppConfig::default()
    };
    let state = AppState::new(config);
    state
        .set_session_store(Arc::new(MemorySessionStore::new()))
        .await;
    routes::router(state)
}

async fn call(
    app: &Router,
    method: Method,
    path: &str,
    player: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(path);
    if let Some(player) = player {
        request = request.header(routes::PLAYER_ID_HEADER, player);
    }
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn sign_in(app: &Router) -> String {
    let (status, body) = call(app, Method::POST, "/auth/anonymous", None, None).await;
    assert_eq!(status, StatusCode::OK);
    body["player_id"].as_str().unwrap().to_owned()
}

async fn host_session(app: &Router, host: &str) -> String {
    let (status, body) = call(
        app,
        Method::POST,
        "/sessions",
        Some(host),
        Some(json!({ "question_count": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_owned()
}

async fn answer(app: &Router, player: &str, index: usize, alternative: &str) -> (StatusCode, Value) {
    call(
        app,
        Method::POST,
        "/play/answer",
        Some(player),
        Some(json!({ "question_index": index, "alternative_id": alternative })),
    )
    .await
}

#[tokio::test(start_paused = true)]
async fn full_run_scores_times_out_and_submits_once() {
    let app = setup().await;
    let alice = sign_in(&app).await;

    let (status, snap) = call(&app, Method::POST, "/play/new", Some(&alice), Some(json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snap["phase"], "nickname_entry");
    assert_eq!(snap["question_count"], 5);
    let session_id = snap["session_id"].as_str().unwrap().to_owned();

    let (status, snap) = call(
        &app,
        Method::POST,
        "/play/nickname",
        Some(&alice),
        Some(json!({ "nickname": "Alice" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snap["phase"], "question");
    assert_eq!(snap["question_index"], 0);
    assert_eq!(snap["remaining_ms"], 30_000);
    assert!(snap["question"].get("correct_answer_id").is_none());

    tokio::time::advance(Duration::from_secs(5)).await;
    let (status, first) = answer(&app, &alice, 0, "a").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["score"], json!({ "accuracy": 100, "time_bonus": 250, "total": 350 }));

    // No click on the second question: its countdown runs out.
    tokio::time::advance(Duration::from_secs(30)).await;
    let (_, snap) = call(&app, Method::GET, "/play", Some(&alice), None).await;
    assert_eq!(snap["question_index"], 2);
    assert_eq!(
        snap["per_question_scores"][1],
        json!({ "accuracy": 0, "time_bonus": 0, "total": 0 })
    );
    let (status, _) = answer(&app, &alice, 1, "a").await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, third) = answer(&app, &alice, 2, "b").await;
    assert_eq!(third["score"]["total"], 300);
    answer(&app, &alice, 3, "a").await;
    let (_, last) = answer(&app, &alice, 4, "a").await;

    let done = &last["snapshot"];
    assert_eq!(done["phase"], "results");
    assert_eq!(done["per_question_scores"].as_array().unwrap().len(), 5);
    let results = &done["results"];
    assert_eq!(results["total_score"], 350 + 300 + 400 + 400);
    assert_eq!(results["max_score"], 2_000);
    assert_eq!(results["submission"]["status"], "submitted");
    assert_eq!(results["rank"], 1);

    let (_, board) = call(
        &app,
        Method::GET,
        &format!("/sessions/{session_id}/leaderboard"),
        None,
        None,
    )
    .await;
    assert_eq!(board["entries"][0]["nickname"], "Alice");
    assert_eq!(board["entries"][0]["score"], 1_450);

    let (status, session) =
        call(&app, Method::GET, &format!("/sessions/{session_id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    let first_question = session["questions"][0]["id"].as_str().unwrap().to_owned();
    let (status, stats) = call(
        &app,
        Method::GET,
        &format!("/questions/{first_question}/stats"),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_attempts"], 1);
    assert_eq!(stats["correct_attempts"], 1);
}

#[tokio::test]
async fn leaderboard_ranks_submitted_scores() {
    let app = setup().await;
    let host = sign_in(&app).await;
    let alice = sign_in(&app).await;
    let bob = sign_in(&app).await;
    let session_id = host_session(&app, &host).await;

    for (player, nickname, score) in [(&alice, "Alice", 900), (&bob, "Bob", 1200)] {
        let (status, body) = call(
            &app,
            Method::POST,
            &format!("/sessions/{session_id}/join"),
            Some(player.as_str()),
            Some(json!({ "nickname": nickname })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["joined"], true);

        let (status, _) = call(
            &app,
            Method::POST,
            &format!("/sessions/{session_id}/score"),
            Some(player.as_str()),
            Some(json!({ "score": score, "nickname": nickname })),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    let (status, board) = call(
        &app,
        Method::GET,
        &format!("/sessions/{session_id}/leaderboard"),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let rows: Vec<(String, u64)> = board["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|row| {
            (
                row["nickname"].as_str().unwrap().to_owned(),
                row["score"].as_u64().unwrap(),
            )
        })
        .collect();
    assert_eq!(rows, [("Bob".to_string(), 1200), ("Alice".to_string(), 900)]);

    let (_, recent) = call(&app, Method::GET, "/sessions/recent", Some(&alice), None).await;
    assert_eq!(recent[0]["session_id"], session_id.as_str());
    assert_eq!(recent[0]["rank"], 2);
    assert_eq!(recent[0]["participant_count"], 2);
}

#[tokio::test]
async fn joining_unknown_session_is_not_found_and_writes_nothing() {
    let app = setup().await;
    let player = sign_in(&app).await;

    let (status, _) = call(
        &app,
        Method::POST,
        "/sessions/happy-quiz-999/join",
        Some(&player),
        Some(json!({ "nickname": "Alice" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(&app, Method::GET, "/sessions/happy-quiz-999", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn joining_twice_keeps_single_entry() {
    let app = setup().await;
    let host = sign_in(&app).await;
    let alice = sign_in(&app).await;
    let session_id = host_session(&app, &host).await;
    let path = format!("/sessions/{session_id}/join");

    let (_, first) = call(&app, Method::POST, &path, Some(&alice), Some(json!({ "nickname": "Alice" }))).await;
    let (_, second) = call(&app, Method::POST, &path, Some(&alice), Some(json!({ "nickname": "Ally" }))).await;
    assert_eq!(first["joined"], true);
    assert_eq!(second["joined"], false);

    let (_, session) = call(&app, Method::GET, &format!("/sessions/{session_id}"), None, None).await;
    let participants = session["participants"].as_array().unwrap();
    assert_eq!(participants.len(), 1);
    assert_eq!(participants[0]["nickname"], "Alice");
    assert_eq!(session["questions"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn closed_session_rejects_joins() {
    let app = setup().await;
    let host = sign_in(&app).await;
    let alice = sign_in(&app).await;
    let session_id = host_session(&app, &host).await;

    let (status, _) = call(
        &app,
        Method::POST,
        &format!("/sessions/{session_id}/close"),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, closed) = call(
        &app,
        Method::POST,
        &format!("/sessions/{session_id}/close"),
        Some(&host),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(closed["is_active"], false);

    let (status, _) = call(
        &app,
        Method::POST,
        &format!("/sessions/{session_id}/join"),
        Some(&alice),
        Some(json!({ "nickname": "Alice" })),
    )
    .await;
    assert_eq!(status, StatusCode::GONE);

    call(&app, Method::POST, "/play/join", Some(&alice), None).await;
    let (status, _) = call(
        &app,
        Method::POST,
        "/play/join-code",
        Some(&alice),
        Some(json!({ "session_id": &session_id })),
    )
    .await;
    assert_eq!(status, StatusCode::GONE);
    let (_, snap) = call(&app, Method::GET, "/play", Some(&alice), None).await;
    assert_eq!(snap["phase"], "join");
}

#[tokio::test]
async fn requests_without_identity_are_rejected() {
    let app = setup().await;

    let (status, body) = call(&app, Method::GET, "/play", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["message"].as_str().unwrap().contains("x-player-id"));

    let (status, _) = call(&app, Method::POST, "/sessions", None, Some(json!({}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(&app, Method::GET, "/play", Some("not a token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn shared_code_opens_nickname_screen_with_remembered_name() {
    let app = setup().await;
    let host = sign_in(&app).await;
    let alice = sign_in(&app).await;
    let first = host_session(&app, &host).await;
    let second = host_session(&app, &host).await;

    call(&app, Method::POST, "/play/open", Some(&alice), Some(json!({ "session_id": &first }))).await;
    call(&app, Method::POST, "/play/nickname", Some(&alice), Some(json!({ "nickname": "Alice" }))).await;

    // Resuming ignores the shared code while a run is in progress.
    let (_, resumed) =
        call(&app, Method::POST, "/play/open", Some(&alice), Some(json!({ "session_id": &second }))).await;
    assert_eq!(resumed["phase"], "question");
    assert_eq!(resumed["session_id"], first.as_str());

    for index in 0..3 {
        answer(&app, &alice, index, "a").await;
    }
    let (status, home) = call(&app, Method::POST, "/play/home", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(home["phase"], "home");

    let (_, snap) =
        call(&app, Method::POST, "/play/open", Some(&alice), Some(json!({ "session_id": &second }))).await;
    assert_eq!(snap["phase"], "nickname_entry");
    assert_eq!(snap["session_id"], second.as_str());
    assert_eq!(snap["nickname_suggestion"], "Alice");
}

#[tokio::test]
async fn invalid_payloads_are_rejected() {
    let app = setup().await;
    let player = sign_in(&app).await;

    let (status, _) = call(
        &app,
        Method::POST,
        "/play/new",
        Some(&player),
        Some(json!({ "question_count": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    call(&app, Method::POST, "/play/new", Some(&player), Some(json!({}))).await;
    let (status, _) = call(
        &app,
        Method::POST,
        "/play/nickname",
        Some(&player),
        Some(json!({ "nickname": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = answer(&app, &player, 0, "a").await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn ids_carrying_url_syntax_are_rejected() {
    let app = setup().await;
    let player = sign_in(&app).await;

    for uri in [
        "/sessions/x%3Fconflicts=true",
        "/sessions/a%23b/leaderboard",
        "/questions/q%2F1/stats",
    ] {
        let (status, _) = call(&app, Method::GET, uri, Some(&player), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
    }

    let session_id = host_session(&app, &player).await;
    let (status, _) = call(
        &app,
        Method::POST,
        &format!("/sessions/{session_id}/score"),
        Some(&player),
        Some(json!({
            "score": 100,
            "nickname": "ann",
            "outcomes": [{ "question_id": "q?rev=1", "is_correct": true }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn healthcheck_and_docs_are_served() {
    let app = setup().await;
    let player = sign_in(&app).await;
    call(&app, Method::GET, "/play", Some(&player), None).await;

    let (status, health) = call(&app, Method::GET, "/healthcheck", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "ok");
    assert_eq!(health["hosted_runs"], 1);

    let (status, doc) = call(&app, Method::GET, "/api-doc/openapi.json", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"].get("/play/answer").is_some());
}
