pub mod auth;
pub mod books;
pub mod health;
pub mod reviews;

use axum::{
    routing::{get, post, put},
    Router,
};
use sea_orm::DatabaseConnection;

pub fn api_router(db: DatabaseConnection) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Auth
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        // Books
        .route("/books", get(books::list_books).post(books::create_book))
        .route("/books/search", get(books::search_books))
        .route("/books/:id", get(books::get_book))
        // Reviews
        .route(
            "/books/:id/reviews",
            get(reviews::list_reviews).post(reviews::add_review),
        )
        .route(
            "/reviews/:id",
            put(reviews::update_review).delete(reviews::delete_review),
        )
        .with_state(db)
}
