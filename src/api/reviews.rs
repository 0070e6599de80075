//! Review lifecycle handlers
//!
//! Every mutation here ends with exactly one aggregator invocation for the
//! affected book, after the review write has committed. Duplicate reviews
//! are rejected by the store's unique (book_id, user_id) index, not by an
//! application-level read-then-write check.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use sea_orm::*;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::Claims;
use crate::errors::ApiError;
use crate::models::book::Entity as BookEntity;
use crate::models::review::{self, Entity as ReviewEntity};
use crate::models::Review;
use crate::rating;

#[derive(Debug, Deserialize)]
pub struct AddReviewRequest {
    pub rating: i32,
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateReviewRequest {
    pub rating: Option<i32>,
    pub comment: Option<String>,
}

fn validate_rating(rating: i32) -> Result<(), ApiError> {
    if !(1..=5).contains(&rating) {
        return Err(ApiError::BadRequest(
            "Rating must be between 1 and 5".to_string(),
        ));
    }
    Ok(())
}

fn validate_comment(comment: Option<&str>) -> Result<(), ApiError> {
    if comment.is_some_and(|c| c.len() > 500) {
        return Err(ApiError::BadRequest(
            "Comment cannot be more than 500 characters".to_string(),
        ));
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/api/v1/books/{book_id}/reviews",
    responses(
        (status = 200, description = "Reviews for the book, most recent first")
    )
)]
pub async fn list_reviews(
    State(db): State<DatabaseConnection>,
    Path(book_id): Path<i32>,
) -> Result<Json<Value>, ApiError> {
    let reviews = ReviewEntity::find()
        .filter(review::Column::BookId.eq(book_id))
        .order_by_desc(review::Column::CreatedAt)
        .all(&db)
        .await?;

    let review_dtos: Vec<Review> = reviews.into_iter().map(Review::from).collect();

    Ok(Json(json!({
        "success": true,
        "count": review_dtos.len(),
        "data": review_dtos
    })))
}

#[utoipa::path(
    post,
    path = "/api/v1/books/{book_id}/reviews",
    responses(
        (status = 201, description = "Review created"),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Book not found"),
        (status = 409, description = "User has already reviewed this book")
    )
)]
pub async fn add_review(
    State(db): State<DatabaseConnection>,
    Path(book_id): Path<i32>,
    claims: Claims,
    Json(payload): Json<AddReviewRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    validate_rating(payload.rating)?;
    validate_comment(payload.comment.as_deref())?;

    BookEntity::find_by_id(book_id)
        .one(&db)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No book with the id of {}", book_id)))?;

    let new_review = review::ActiveModel {
        rating: Set(payload.rating),
        comment: Set(payload.comment),
        created_at: Set(chrono::Utc::now().to_rfc3339()),
        book_id: Set(book_id),
        user_id: Set(claims.uid),
        ..Default::default()
    };

    let model = new_review.insert(&db).await.map_err(|e| match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            ApiError::Conflict("User has already reviewed this book".to_string())
        }
        _ => ApiError::Internal(e.to_string()),
    })?;

    // The review is committed; the new row must be visible to the
    // aggregation query.
    rating::refresh_book_rating(&db, book_id).await;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "data": Review::from(model) })),
    ))
}

#[utoipa::path(
    put,
    path = "/api/v1/reviews/{id}",
    responses(
        (status = 200, description = "Review updated"),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Not the review author"),
        (status = 404, description = "Review not found")
    )
)]
pub async fn update_review(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
    claims: Claims,
    Json(payload): Json<UpdateReviewRequest>,
) -> Result<Json<Value>, ApiError> {
    let review = ReviewEntity::find_by_id(id)
        .one(&db)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No review with the id of {}", id)))?;

    if review.user_id != claims.uid {
        return Err(ApiError::Unauthorized(
            "Not authorized to update review".to_string(),
        ));
    }

    if let Some(rating) = payload.rating {
        validate_rating(rating)?;
    }
    validate_comment(payload.comment.as_deref())?;

    let book_id = review.book_id;

    // Only rating and comment are updatable; book_id and user_id are
    // immutable after creation.
    let mut active: review::ActiveModel = review.into();
    if let Some(rating) = payload.rating {
        active.rating = Set(rating);
    }
    if let Some(comment) = payload.comment {
        active.comment = Set(Some(comment));
    }

    let model = active.update(&db).await?;

    rating::refresh_book_rating(&db, book_id).await;

    Ok(Json(json!({ "success": true, "data": Review::from(model) })))
}

#[utoipa::path(
    delete,
    path = "/api/v1/reviews/{id}",
    responses(
        (status = 200, description = "Review deleted"),
        (status = 401, description = "Not the review author"),
        (status = 404, description = "Review not found")
    )
)]
pub async fn delete_review(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
    claims: Claims,
) -> Result<Json<Value>, ApiError> {
    let review = ReviewEntity::find_by_id(id)
        .one(&db)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No review with the id of {}", id)))?;

    if review.user_id != claims.uid {
        return Err(ApiError::Unauthorized(
            "Not authorized to delete review".to_string(),
        ));
    }

    // Captured before deletion; the row no longer carries the reference
    // afterwards.
    let book_id = review.book_id;

    review.delete(&db).await?;

    rating::refresh_book_rating(&db, book_id).await;

    Ok(Json(json!({ "success": true, "data": {} })))
}
