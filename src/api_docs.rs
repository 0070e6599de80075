use crate::api;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::health::health_check,
        api::auth::register,
        api::auth::login,
        api::auth::me,
        api::books::list_books,
        api::books::search_books,
        api::books::get_book,
        api::books::create_book,
        api::reviews::list_reviews,
        api::reviews::add_review,
        api::reviews::update_review,
        api::reviews::delete_review,
    ),
    tags(
        (name = "libris", description = "Libris book & review API")
    )
)]
pub struct ApiDoc;
