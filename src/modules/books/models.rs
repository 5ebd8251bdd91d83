use std::fmt;

use bookshelf_http::error::AppError;
use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::OffsetDateTime;

/// Opaque store-assigned identifier of a book (24 hex digits).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BookId(ObjectId);

impl BookId {
    /// Generate a fresh identifier.
    pub fn new() -> Self {
        Self(ObjectId::new())
    }

    /// Parse a path segment, rejecting anything that is not a well-formed id.
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        ObjectId::parse_str(raw)
            .map(Self)
            .map_err(|_| AppError::bad_request("Invalid book id"))
    }

    pub fn object_id(&self) -> ObjectId {
        self.0
    }
}

impl Default for BookId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ObjectId> for BookId {
    fn from(id: ObjectId) -> Self {
        Self(id)
    }
}

impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_hex())
    }
}

/// A persisted book.
#[derive(Debug, Clone, PartialEq)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub author: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Validated body of a create or update request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookInput {
    pub title: String,
    pub author: String,
}

#[derive(Deserialize)]
struct RawBookInput {
    title: Option<String>,
    author: Option<String>,
}

impl BookInput {
    /// Decode and validate a JSON request body.
    ///
    /// `title` must be present and not blank; a missing or null `author`
    /// becomes the empty string. Unknown fields are ignored.
    pub fn parse(body: &[u8]) -> Result<Self, AppError> {
        let raw: RawBookInput = serde_json::from_slice(body).map_err(|err| {
            AppError::bad_request("Invalid request body")
                .with_details(vec![json!({ "error": err.to_string() })])
        })?;

        let title = raw.title.unwrap_or_default();
        if title.trim().is_empty() {
            return Err(AppError::bad_request("Invalid request body")
                .with_details(vec![json!({ "field": "title", "error": "required" })]));
        }

        Ok(Self {
            title,
            author: raw.author.unwrap_or_default(),
        })
    }
}

/// Full representation of a book returned by create, get and update.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BookResponse {
    pub id: String,
    pub title: String,
    pub author: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<Book> for BookResponse {
    fn from(book: Book) -> Self {
        Self {
            id: book.id.to_string(),
            title: book.title,
            author: book.author,
            created_at: book.created_at,
            updated_at: book.updated_at,
        }
    }
}

/// Reduced projection used by the list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookListItem {
    pub id: String,
    pub title: String,
    pub author: String,
}

/// Current UTC time at millisecond precision, the resolution the store keeps.
pub fn now() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now.replace_millisecond(now.millisecond()).unwrap_or(now)
}
