use bookstore_db::{Record, Schema};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A catalog entry as stored in the `books` collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    /// Title of the book
    pub title: String,
    /// Author of the book
    pub author: String,
    /// Year of publication
    pub publish_year: i32,
    /// Number of copies available
    pub copies: u32,
}

impl Book {
    /// Add `delta` to the available copies, never going below zero.
    pub fn adjust_copies(&mut self, delta: i64) {
        let adjusted = i64::from(self.copies).saturating_add(delta);
        self.copies = adjusted.clamp(0, i64::from(u32::MAX)) as u32;
    }
}

impl Schema for Book {
    fn validate(&self) -> Result<(), String> {
        let mut missing = Vec::new();
        if self.title.is_empty() {
            missing.push("title");
        }
        if self.author.is_empty() {
            missing.push("author");
        }
        if self.publish_year == 0 {
            missing.push("publishYear");
        }

        if missing.is_empty() {
            return Ok(());
        }
        Err(missing
            .iter()
            .map(|path| format!("{path}: Path `{path}` is required."))
            .collect::<Vec<_>>()
            .join(", "))
    }
}

pub type BookRecord = Record<Book>;

/// Request body for creating or fully replacing a book.
///
/// Every field is optional at the decoding stage so a missing field is
/// reported as a validation failure rather than a decoding failure.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookPayload {
    pub title: Option<String>,
    pub author: Option<String>,
    pub publish_year: Option<i32>,
    pub copies: Option<u32>,
}

impl BookPayload {
    /// Returns `None` when a required field is missing or empty.
    ///
    /// `publishYear` must be non-zero; `copies` only has to be present, so `0`
    /// is accepted.
    pub fn into_book(self) -> Option<Book> {
        let title = self.title.filter(|t| !t.is_empty())?;
        let author = self.author.filter(|a| !a.is_empty())?;
        let publish_year = self.publish_year.filter(|year| *year != 0)?;
        let copies = self.copies?;

        Some(Book {
            title,
            author,
            publish_year,
            copies,
        })
    }
}

/// Request body for `PATCH /{id}/copies`; `copies` is a signed delta.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CopiesDelta {
    pub copies: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct BookList {
    pub count: usize,
    pub data: Vec<BookRecord>,
}

#[derive(Debug, Serialize)]
pub struct BookMessage {
    pub message: &'static str,
    pub book: BookRecord,
}

#[derive(Debug, Serialize)]
pub struct Message {
    pub message: &'static str,
}
