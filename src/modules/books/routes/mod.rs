//! HTTP handlers for the books collection.
//!
//! Each handler validates its input, makes one logical store call, and maps the
//! outcome to a response. Failures are rendered by [`AppError`].

use anyhow::anyhow;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use bookstore_db::Collection;
use bookstore_http::{
    error::{AppError, MISSING_FIELDS_MESSAGE},
    extract::JsonBody,
};
use bookstore_kernel::settings::CopiesAdjustment;

use super::models::{Book, BookList, BookMessage, BookPayload, BookRecord, CopiesDelta, Message};

const BOOK_NOT_FOUND: &str = "Book not found";
const COPIES_UPDATE_FAILED: &str = "Error updating copies";
/// Stored name of [`Book::copies`].
const COPIES_FIELD: &str = "copies";

/// Shared handler state: the collection handle and the adjustment strategy.
#[derive(Clone)]
pub struct BooksState {
    pub books: Collection<Book>,
    pub copies_adjustment: CopiesAdjustment,
}

pub fn router(state: BooksState) -> Router {
    Router::new()
        .route("/", get(list_books).post(create_book))
        .route("/health", get(health_check))
        .route("/{id}", get(get_book).put(update_book).delete(delete_book))
        .route("/{id}/copies", patch(adjust_copies))
        .with_state(state)
}

async fn health_check() -> &'static str {
    "books module is healthy"
}

async fn create_book(
    State(state): State<BooksState>,
    JsonBody(payload): JsonBody<BookPayload>,
) -> Result<(StatusCode, Json<BookRecord>), AppError> {
    let book = payload
        .into_book()
        .ok_or_else(|| AppError::validation(MISSING_FIELDS_MESSAGE))?;

    let record = state
        .books
        .insert_one(book)
        .await
        .map_err(AppError::internal)?;

    tracing::info!(id = %record.id, title = %record.doc.title, "book created");
    Ok((StatusCode::CREATED, Json(record)))
}

async fn list_books(State(state): State<BooksState>) -> Result<Json<BookList>, AppError> {
    let data = state.books.find_all().await.map_err(AppError::internal)?;

    tracing::debug!(count = data.len(), "books listed");
    Ok(Json(BookList {
        count: data.len(),
        data,
    }))
}

/// An absent book is answered with `200` and a `null` body.
async fn get_book(
    State(state): State<BooksState>,
    Path(id): Path<String>,
) -> Result<Json<Option<BookRecord>>, AppError> {
    let record = state
        .books
        .find_by_id(&id)
        .await
        .map_err(AppError::internal)?;

    if record.is_none() {
        tracing::debug!(%id, "book lookup missed");
    }
    Ok(Json(record))
}

async fn update_book(
    State(state): State<BooksState>,
    Path(id): Path<String>,
    JsonBody(payload): JsonBody<BookPayload>,
) -> Result<Json<BookMessage>, AppError> {
    let book = payload
        .into_book()
        .ok_or_else(|| AppError::validation(MISSING_FIELDS_MESSAGE))?;

    let record = state
        .books
        .find_by_id_and_update(&id, book)
        .await
        .map_err(AppError::internal)?
        .ok_or_else(|| AppError::not_found(BOOK_NOT_FOUND))?;

    tracing::info!(%id, "book updated");
    Ok(Json(BookMessage {
        message: "Book updated successfully",
        book: record,
    }))
}

async fn adjust_copies(
    State(state): State<BooksState>,
    Path(id): Path<String>,
    JsonBody(CopiesDelta { copies: delta }): JsonBody<CopiesDelta>,
) -> Result<Json<BookMessage>, AppError> {
    let Some(delta) = delta else {
        // 404 still takes precedence over the missing delta.
        state
            .books
            .find_by_id(&id)
            .await
            .map_err(copies_failure)?
            .ok_or_else(|| AppError::not_found(BOOK_NOT_FOUND))?;
        return Err(copies_failure(anyhow!("`copies` must be an integer delta")));
    };

    let record = match state.copies_adjustment {
        CopiesAdjustment::ReadModifyWrite => {
            read_modify_write_copies(&state.books, &id, delta).await?
        }
        CopiesAdjustment::Atomic => state
            .books
            .find_by_id_and_clamp_add(&id, COPIES_FIELD, delta, 0, i64::from(u32::MAX))
            .await
            .map_err(copies_failure)?
            .ok_or_else(|| AppError::not_found(BOOK_NOT_FOUND))?,
    };

    tracing::info!(%id, delta, copies = record.doc.copies, "book copies adjusted");
    Ok(Json(BookMessage {
        message: "Copies updated successfully",
        book: record,
    }))
}

/// Fetch, adjust locally, save. A concurrent adjustment between the fetch and
/// the save is overwritten.
async fn read_modify_write_copies(
    books: &Collection<Book>,
    id: &str,
    delta: i64,
) -> Result<BookRecord, AppError> {
    let mut record = books
        .find_by_id(id)
        .await
        .map_err(copies_failure)?
        .ok_or_else(|| AppError::not_found(BOOK_NOT_FOUND))?;

    record.doc.adjust_copies(delta);
    books.save(&mut record).await.map_err(copies_failure)?;

    Ok(record)
}

async fn delete_book(
    State(state): State<BooksState>,
    Path(id): Path<String>,
) -> Result<Json<Message>, AppError> {
    state
        .books
        .find_by_id_and_delete(&id)
        .await
        .map_err(AppError::internal)?
        .ok_or_else(|| AppError::not_found(BOOK_NOT_FOUND))?;

    tracing::info!(%id, "book deleted");
    Ok(Json(Message {
        message: "Book deleted successfully",
    }))
}

fn copies_failure(error: impl Into<anyhow::Error>) -> AppError {
    AppError::operation(COPIES_UPDATE_FAILED, error)
}
