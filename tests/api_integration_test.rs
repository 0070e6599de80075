//! End-to-end API tests driven through the real router with in-memory
//! SQLite, covering the review lifecycle and the derived average rating.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::{json, Value};
use tower::ServiceExt; // for oneshot

use libris::models::review;
use libris::{api, db};

async fn setup_app() -> (Router, DatabaseConnection) {
    let db = db::init_db("sqlite::memory:")
        .await
        .expect("Failed to init DB");
    (api::api_router(db.clone()), db)
}

fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn response_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn register_user(app: &Router, username: &str) -> String {
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/auth/register",
            None,
            Some(json!({ "username": username, "password": "password123" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    body["data"]["token"].as_str().unwrap().to_string()
}

async fn create_book(app: &Router, token: &str, title: &str, author: &str) -> i64 {
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/books",
            Some(token),
            Some(json!({ "title": title, "author": author, "genre": "Fiction" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    body["data"]["id"].as_i64().unwrap()
}

async fn add_review(
    app: &Router,
    token: &str,
    book_id: i64,
    stars: i64,
) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/books/{}/reviews", book_id),
            Some(token),
            Some(json!({ "rating": stars })),
        ))
        .await
        .unwrap();
    let status = response.status();
    let body = response_json(response).await;
    (status, body)
}

async fn book_average(app: &Router, book_id: i64) -> f64 {
    let response = app
        .clone()
        .oneshot(request("GET", &format!("/books/{}", book_id), None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    body["data"]["averageRating"].as_f64().unwrap()
}

#[tokio::test]
async fn health_check_works() {
    let (app, _db) = setup_app().await;

    let response = app
        .oneshot(request("GET", "/health", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn register_login_and_me_flow() {
    let (app, _db) = setup_app().await;

    let _token = register_user(&app, "alice").await;

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/auth/login",
            None,
            Some(json!({ "username": "alice", "password": "password123" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    let token = body["data"]["token"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(request("GET", "/auth/me", Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["username"], "alice");

    // Wrong password is rejected
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/auth/login",
            None,
            Some(json!({ "username": "alice", "password": "wrong-password" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn duplicate_username_conflicts() {
    let (app, _db) = setup_app().await;

    let _token = register_user(&app, "alice").await;

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/auth/register",
            None,
            Some(json!({ "username": "alice", "password": "password123" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn create_book_requires_auth() {
    let (app, _db) = setup_app().await;

    let response = app
        .oneshot(request(
            "POST",
            "/books",
            None,
            Some(json!({ "title": "T", "author": "A", "genre": "G" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_book_validates_fields() {
    let (app, _db) = setup_app().await;
    let token = register_user(&app, "alice").await;

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/books",
            Some(&token),
            Some(json!({ "title": "", "author": "A", "genre": "G" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let long_title = "x".repeat(101);
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/books",
            Some(&token),
            Some(json!({ "title": long_title, "author": "A", "genre": "G" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn get_and_list_books() {
    let (app, _db) = setup_app().await;
    let token = register_user(&app, "alice").await;

    let book_id = create_book(&app, &token, "The Hobbit", "J.R.R. Tolkien").await;
    create_book(&app, &token, "Foundation", "Isaac Asimov").await;

    let response = app
        .clone()
        .oneshot(request("GET", "/books", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["count"], 2);

    let response = app
        .clone()
        .oneshot(request("GET", &format!("/books/{}", book_id), None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["title"], "The Hobbit");
    assert_eq!(body["data"]["averageRating"], 0.0);

    let response = app
        .clone()
        .oneshot(request("GET", "/books/9999", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn search_books_by_title_or_author() {
    let (app, _db) = setup_app().await;
    let token = register_user(&app, "alice").await;

    create_book(&app, &token, "The Hobbit", "J.R.R. Tolkien").await;
    create_book(&app, &token, "Foundation", "Isaac Asimov").await;

    // Case-insensitive author substring
    let response = app
        .clone()
        .oneshot(request("GET", "/books/search?q=tolkien", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["data"][0]["title"], "The Hobbit");

    // Title substring
    let response = app
        .clone()
        .oneshot(request("GET", "/books/search?q=found", None, None))
        .await
        .unwrap();
    let body = response_json(response).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["data"][0]["author"], "Isaac Asimov");

    // Missing term
    let response = app
        .clone()
        .oneshot(request("GET", "/books/search", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Empty term
    let response = app
        .clone()
        .oneshot(request("GET", "/books/search?q=", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn review_lifecycle_maintains_average() {
    let (app, _db) = setup_app().await;

    let owner = register_user(&app, "owner").await;
    let book_id = create_book(&app, &owner, "Dune", "Frank Herbert").await;

    let r1 = register_user(&app, "reader1").await;
    let r2 = register_user(&app, "reader2").await;
    let r3 = register_user(&app, "reader3").await;

    for (token, stars) in [(&r1, 3), (&r2, 4), (&r3, 5)] {
        let (status, _) = add_review(&app, token, book_id, stars).await;
        assert_eq!(status, StatusCode::CREATED);
    }
    assert_eq!(book_average(&app, book_id).await, 4.0);

    // A fourth rating of 2 drops the mean to 3.5
    let r4 = register_user(&app, "reader4").await;
    let (status, body) = add_review(&app, &r4, book_id, 2).await;
    assert_eq!(status, StatusCode::CREATED);
    let low_review_id = body["data"]["id"].as_i64().unwrap();
    assert_eq!(book_average(&app, book_id).await, 3.5);

    // Deleting it reverts to 4.0
    let response = app
        .clone()
        .oneshot(request(
            "DELETE",
            &format!("/reviews/{}", low_review_id),
            Some(&r4),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(book_average(&app, book_id).await, 4.0);
}

#[tokio::test]
async fn update_review_recomputes_average() {
    let (app, _db) = setup_app().await;

    let owner = register_user(&app, "owner").await;
    let book_id = create_book(&app, &owner, "Dune", "Frank Herbert").await;

    let reader = register_user(&app, "reader").await;
    let (status, body) = add_review(&app, &reader, book_id, 5).await;
    assert_eq!(status, StatusCode::CREATED);
    let review_id = body["data"]["id"].as_i64().unwrap();
    assert_eq!(book_average(&app, book_id).await, 5.0);

    let response = app
        .clone()
        .oneshot(request(
            "PUT",
            &format!("/reviews/{}", review_id),
            Some(&reader),
            Some(json!({ "rating": 3, "comment": "On reflection, middling" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["rating"], 3);
    assert_eq!(body["data"]["comment"], "On reflection, middling");
    assert_eq!(book_average(&app, book_id).await, 3.0);
}

#[tokio::test]
async fn duplicate_review_returns_conflict() {
    let (app, db) = setup_app().await;

    let owner = register_user(&app, "owner").await;
    let book_id = create_book(&app, &owner, "Dune", "Frank Herbert").await;

    let reader = register_user(&app, "reader").await;
    let (status, _) = add_review(&app, &reader, book_id, 5).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = add_review(&app, &reader, book_id, 1).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);

    // Only one row persisted, and the average still reflects it
    let count = review::Entity::find()
        .filter(review::Column::BookId.eq(book_id as i32))
        .count(&db)
        .await
        .unwrap();
    assert_eq!(count, 1);
    assert_eq!(book_average(&app, book_id).await, 5.0);
}

#[tokio::test]
async fn review_against_missing_book_is_not_found() {
    let (app, db) = setup_app().await;

    let reader = register_user(&app, "reader").await;
    let (status, _) = add_review(&app, &reader, 9999, 4).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let count = review::Entity::find().count(&db).await.unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn review_rating_is_range_checked() {
    let (app, _db) = setup_app().await;

    let owner = register_user(&app, "owner").await;
    let book_id = create_book(&app, &owner, "Dune", "Frank Herbert").await;

    let reader = register_user(&app, "reader").await;
    let (status, _) = add_review(&app, &reader, book_id, 0).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = add_review(&app, &reader, book_id, 6).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn only_the_author_may_update_or_delete_a_review() {
    let (app, _db) = setup_app().await;

    let owner = register_user(&app, "owner").await;
    let book_id = create_book(&app, &owner, "Dune", "Frank Herbert").await;

    let author = register_user(&app, "author").await;
    let intruder = register_user(&app, "intruder").await;

    let (status, body) = add_review(&app, &author, book_id, 4).await;
    assert_eq!(status, StatusCode::CREATED);
    let review_id = body["data"]["id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(request(
            "PUT",
            &format!("/reviews/{}", review_id),
            Some(&intruder),
            Some(json!({ "rating": 1 })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(request(
            "DELETE",
            &format!("/reviews/{}", review_id),
            Some(&intruder),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Review unchanged, average untouched
    let response = app
        .clone()
        .oneshot(request(
            "GET",
            &format!("/books/{}/reviews", book_id),
            None,
            None,
        ))
        .await
        .unwrap();
    let body = response_json(response).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["data"][0]["rating"], 4);
    assert_eq!(book_average(&app, book_id).await, 4.0);
}

#[tokio::test]
async fn missing_review_is_not_found() {
    let (app, _db) = setup_app().await;
    let reader = register_user(&app, "reader").await;

    let response = app
        .clone()
        .oneshot(request(
            "PUT",
            "/reviews/9999",
            Some(&reader),
            Some(json!({ "rating": 3 })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .clone()
        .oneshot(request("DELETE", "/reviews/9999", Some(&reader), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reviews_listed_most_recent_first() {
    let (app, _db) = setup_app().await;

    let owner = register_user(&app, "owner").await;
    let book_id = create_book(&app, &owner, "Dune", "Frank Herbert").await;

    let r1 = register_user(&app, "reader1").await;
    let r2 = register_user(&app, "reader2").await;

    let (_, first) = add_review(&app, &r1, book_id, 3).await;
    let (_, second) = add_review(&app, &r2, book_id, 5).await;

    let response = app
        .clone()
        .oneshot(request(
            "GET",
            &format!("/books/{}/reviews", book_id),
            None,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["count"], 2);
    assert_eq!(body["data"][0]["id"], second["data"]["id"]);
    assert_eq!(body["data"][1]["id"], first["data"]["id"]);
}
