use crate::auth::hash_password;
use crate::models::{book, review, user};
use crate::rating;
use sea_orm::*;

/// Seed a small demo catalogue: two users, three books, a handful of
/// reviews. Safe to run against an existing database.
pub async fn seed_demo_data(db: &DatabaseConnection) -> Result<(), DbErr> {
    let now = chrono::Utc::now().to_rfc3339();

    let alice_password = hash_password("password123").unwrap();
    let bob_password = hash_password("password123").unwrap();

    let alice = user::ActiveModel {
        username: Set("alice".to_owned()),
        password_hash: Set(alice_password),
        role: Set("user".to_owned()),
        created_at: Set(now.clone()),
        ..Default::default()
    };

    let bob = user::ActiveModel {
        username: Set("bob".to_owned()),
        password_hash: Set(bob_password),
        role: Set("user".to_owned()),
        created_at: Set(now.clone()),
        ..Default::default()
    };

    // DO NOTHING conflicts surface as RecordNotInserted when re-seeding
    for seed_user in [alice, bob] {
        match user::Entity::insert(seed_user)
            .on_conflict(
                sea_orm::sea_query::OnConflict::column(user::Column::Username)
                    .do_nothing()
                    .to_owned(),
            )
            .exec(db)
            .await
        {
            Ok(_) | Err(DbErr::RecordNotInserted) => {}
            Err(e) => return Err(e),
        }
    }

    let alice_id = user::Entity::find()
        .filter(user::Column::Username.eq("alice"))
        .one(db)
        .await?
        .map(|u| u.id)
        .unwrap_or(1);
    let bob_id = user::Entity::find()
        .filter(user::Column::Username.eq("bob"))
        .one(db)
        .await?
        .map(|u| u.id)
        .unwrap_or(2);

    let titles = [
        ("The Hobbit", "J.R.R. Tolkien", "Fantasy"),
        ("Foundation", "Isaac Asimov", "Sci-Fi"),
        ("Dune", "Frank Herbert", "Sci-Fi"),
    ];

    let mut book_ids = Vec::new();
    for (title, author, genre) in titles {
        let new_book = book::ActiveModel {
            title: Set(title.to_owned()),
            author: Set(author.to_owned()),
            genre: Set(genre.to_owned()),
            description: Set(None),
            average_rating: Set(0.0),
            created_at: Set(now.clone()),
            user_id: Set(alice_id),
            ..Default::default()
        };
        let res = book::Entity::insert(new_book).exec(db).await?;
        book_ids.push(res.last_insert_id);
    }

    let demo_reviews = [
        (book_ids[0], alice_id, 5, "A classic."),
        (book_ids[0], bob_id, 4, "Great pacing."),
        (book_ids[1], bob_id, 5, "Psychohistory!"),
    ];

    for (book_id, user_id, stars, comment) in demo_reviews {
        let new_review = review::ActiveModel {
            rating: Set(stars),
            comment: Set(Some(comment.to_owned())),
            created_at: Set(now.clone()),
            book_id: Set(book_id),
            user_id: Set(user_id),
            ..Default::default()
        };
        // Skip duplicates when re-seeding
        let _ = review::Entity::insert(new_review)
            .on_conflict(
                sea_orm::sea_query::OnConflict::columns([
                    review::Column::BookId,
                    review::Column::UserId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec(db)
            .await;
    }

    for book_id in book_ids {
        rating::recompute_average(db, book_id).await?;
    }

    Ok(())
}
