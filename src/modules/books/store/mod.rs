//! Persistence seam for books.
//!
//! Every operation is a single store call; update and delete never read
//! before they write.

mod memory;
mod mongo;

use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;

use super::models::{Book, BookId, BookInput, BookListItem};

pub use memory::MemoryBookStore;
pub use mongo::MongoBookStore;

/// Store handle shared by every request handler.
pub type SharedBookStore = Arc<dyn BookStore>;

#[async_trait]
pub trait BookStore: Send + Sync {
    /// Persist a new book; the store assigns its id and both timestamps are `now`.
    async fn insert(&self, input: BookInput, now: OffsetDateTime) -> anyhow::Result<Book>;

    async fn get(&self, id: BookId) -> anyhow::Result<Option<Book>>;

    /// All books in store order, without timestamps.
    async fn list(&self) -> anyhow::Result<Vec<BookListItem>>;

    /// Overwrite title and author, advancing the update timestamp to `now`
    /// unless it is already later. Returns the stored book, or `None` if the
    /// id is unknown.
    async fn replace(
        &self,
        id: BookId,
        input: BookInput,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<Book>>;

    /// Remove a book; `false` if nothing matched.
    async fn delete(&self, id: BookId) -> anyhow::Result<bool>;
}
