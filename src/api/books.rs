use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use sea_orm::*;
use serde::Deserialize;
use serde_json::{json, Value};
use utoipa::IntoParams;

use crate::auth::Claims;
use crate::errors::ApiError;
use crate::models::book::{self, Entity as BookEntity};
use crate::models::Book;

#[derive(Debug, Deserialize, IntoParams)]
pub struct BooksQuery {
    pub genre: Option<String>,
    pub author: Option<String>,
    pub min_rating: Option<f64>,
    pub sort: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateBookRequest {
    pub title: String,
    pub author: String,
    pub genre: String,
    pub description: Option<String>,
}

fn validate_book_payload(payload: &CreateBookRequest) -> Result<(), ApiError> {
    let bad = |msg: &str| Err(ApiError::BadRequest(msg.to_string()));

    if payload.title.trim().is_empty() {
        return bad("Please provide a title");
    }
    if payload.title.len() > 100 {
        return bad("Title cannot be more than 100 characters");
    }
    if payload.author.trim().is_empty() {
        return bad("Please provide an author");
    }
    if payload.author.len() > 50 {
        return bad("Author name cannot be more than 50 characters");
    }
    if payload.genre.trim().is_empty() {
        return bad("Please provide a genre");
    }
    if payload.genre.len() > 30 {
        return bad("Genre cannot be more than 30 characters");
    }
    if let Some(description) = &payload.description {
        if description.len() > 500 {
            return bad("Description cannot be more than 500 characters");
        }
    }

    Ok(())
}

#[utoipa::path(
    get,
    path = "/api/v1/books",
    responses(
        (status = 200, description = "List of books")
    )
)]
pub async fn list_books(
    State(db): State<DatabaseConnection>,
    Query(params): Query<BooksQuery>,
) -> Result<Json<Value>, ApiError> {
    let mut condition = Condition::all();

    if let Some(genre) = &params.genre {
        condition = condition.add(book::Column::Genre.eq(genre.clone()));
    }

    if let Some(author) = &params.author {
        condition = condition.add(book::Column::Author.contains(author));
    }

    if let Some(min_rating) = params.min_rating {
        condition = condition.add(book::Column::AverageRating.gte(min_rating));
    }

    let mut query = BookEntity::find().filter(condition);

    query = match params.sort.as_deref() {
        Some("rating") => query.order_by_desc(book::Column::AverageRating),
        _ => query.order_by_desc(book::Column::CreatedAt),
    };

    let books = if params.page.is_some() || params.limit.is_some() {
        let limit = params.limit.unwrap_or(25).max(1);
        let page = params.page.unwrap_or(1).max(1);
        query.paginate(&db, limit).fetch_page(page - 1).await?
    } else {
        query.all(&db).await?
    };

    let book_dtos: Vec<Book> = books.into_iter().map(Book::from).collect();

    Ok(Json(json!({
        "success": true,
        "count": book_dtos.len(),
        "data": book_dtos
    })))
}

#[utoipa::path(
    get,
    path = "/api/v1/books/search",
    responses(
        (status = 200, description = "Matching books"),
        (status = 400, description = "Missing search term")
    )
)]
pub async fn search_books(
    State(db): State<DatabaseConnection>,
    Query(params): Query<SearchQuery>,
) -> Result<Json<Value>, ApiError> {
    let term = params.q.as_deref().unwrap_or("").trim().to_string();
    if term.is_empty() {
        return Err(ApiError::BadRequest("Please provide a search term".to_string()));
    }

    // LIKE is case-insensitive for ASCII under SQLite's default collation
    let books = BookEntity::find()
        .filter(
            Condition::any()
                .add(book::Column::Title.contains(&term))
                .add(book::Column::Author.contains(&term)),
        )
        .order_by_asc(book::Column::Title)
        .all(&db)
        .await?;

    let book_dtos: Vec<Book> = books.into_iter().map(Book::from).collect();

    Ok(Json(json!({
        "success": true,
        "count": book_dtos.len(),
        "data": book_dtos
    })))
}

#[utoipa::path(
    get,
    path = "/api/v1/books/{id}",
    responses(
        (status = 200, description = "Book"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn get_book(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
) -> Result<Json<Value>, ApiError> {
    let book = BookEntity::find_by_id(id)
        .one(&db)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Book not found with id of {}", id)))?;

    Ok(Json(json!({ "success": true, "data": Book::from(book) })))
}

#[utoipa::path(
    post,
    path = "/api/v1/books",
    responses(
        (status = 201, description = "Book created"),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn create_book(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Json(payload): Json<CreateBookRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    validate_book_payload(&payload)?;

    let new_book = book::ActiveModel {
        title: Set(payload.title.trim().to_string()),
        author: Set(payload.author.trim().to_string()),
        genre: Set(payload.genre.trim().to_string()),
        description: Set(payload.description.map(|d| d.trim().to_string())),
        average_rating: Set(0.0),
        created_at: Set(chrono::Utc::now().to_rfc3339()),
        user_id: Set(claims.uid),
        ..Default::default()
    };

    let model = new_book.insert(&db).await?;

    tracing::info!("Book {} created by user {}", model.id, claims.uid);

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "data": Book::from(model) })),
    ))
}
