//! Average-rating aggregation
//!
//! A book's stored `average_rating` is a derived cache over its reviews.
//! The review handlers call [`refresh_book_rating`] after every confirmed
//! create, update, or delete, so the cache tracks the review set without
//! relying on storage-layer hooks.

use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set};

use crate::models::{book, review};

/// Round half-up at the tenths digit (4.26 -> 4.3).
fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Recompute the mean rating across all reviews of `book_id` and overwrite
/// the book's `average_rating` with it. Zero reviews store exactly `0.0`.
///
/// Idempotent: recomputing with an unchanged review set stores the same
/// value. A missing book row makes the recompute a no-op.
pub async fn recompute_average(db: &DatabaseConnection, book_id: i32) -> Result<f64, DbErr> {
    let reviews = review::Entity::find()
        .filter(review::Column::BookId.eq(book_id))
        .all(db)
        .await?;

    let average = if reviews.is_empty() {
        0.0
    } else {
        let sum: i32 = reviews.iter().map(|r| r.rating).sum();
        round_to_tenth(f64::from(sum) / reviews.len() as f64)
    };

    let Some(model) = book::Entity::find_by_id(book_id).one(db).await? else {
        return Ok(average);
    };

    let mut active: book::ActiveModel = model.into();
    active.average_rating = Set(average);
    active.update(db).await?;

    Ok(average)
}

/// Entry point for the review lifecycle. The triggering review mutation has
/// already committed, so a failed recompute only means a stale cached
/// average; it is logged and dropped, to be corrected by the next mutation.
pub async fn refresh_book_rating(db: &DatabaseConnection, book_id: i32) {
    if let Err(e) = recompute_average(db, book_id).await {
        tracing::error!("Failed to refresh average rating for book {}: {}", book_id, e);
    }
}
