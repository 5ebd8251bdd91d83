use anyhow::Context;
use async_trait::async_trait;
use bson::{doc, oid::ObjectId, DateTime, Document};
use futures_util::TryStreamExt;
use mongodb::{options::ReturnDocument, Collection};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::BookStore;
use crate::modules::books::models::{Book, BookId, BookInput, BookListItem};

/// Stored shape of a book. Timestamp field names match documents already
/// present in existing collections.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct BookDocument {
    #[serde(rename = "_id")]
    id: ObjectId,
    title: String,
    #[serde(default)]
    author: String,
    #[serde(rename = "createAt")]
    created_at: DateTime,
    #[serde(rename = "updateAt")]
    updated_at: DateTime,
}

impl From<&Book> for BookDocument {
    fn from(book: &Book) -> Self {
        Self {
            id: book.id.object_id(),
            title: book.title.clone(),
            author: book.author.clone(),
            created_at: DateTime::from_time_0_3(book.created_at),
            updated_at: DateTime::from_time_0_3(book.updated_at),
        }
    }
}

impl From<BookDocument> for Book {
    fn from(document: BookDocument) -> Self {
        Self {
            id: document.id.into(),
            title: document.title,
            author: document.author,
            created_at: document.created_at.to_time_0_3(),
            updated_at: document.updated_at.to_time_0_3(),
        }
    }
}

/// Projection read by the list endpoint.
#[derive(Debug, Deserialize)]
struct BookListDocument {
    #[serde(rename = "_id")]
    id: ObjectId,
    #[serde(default)]
    title: String,
    #[serde(default)]
    author: String,
}

impl From<BookListDocument> for BookListItem {
    fn from(document: BookListDocument) -> Self {
        Self {
            id: document.id.to_hex(),
            title: document.title,
            author: document.author,
        }
    }
}

fn by_id(id: BookId) -> Document {
    doc! { "_id": id.object_id() }
}

/// Update pipeline replacing title and author and advancing `updateAt`.
///
/// User text goes through `$literal` so values starting with `$` are not
/// read as field paths.
fn replace_pipeline(input: &BookInput, now: OffsetDateTime) -> Vec<Document> {
    vec![doc! {
        "$set": {
            "title": { "$literal": input.title.as_str() },
            "author": { "$literal": input.author.as_str() },
            "updateAt": { "$max": ["$updateAt", DateTime::from_time_0_3(now)] },
        }
    }]
}

/// MongoDB-backed store.
#[derive(Clone, Debug)]
pub struct MongoBookStore {
    collection: Collection<BookDocument>,
}

impl MongoBookStore {
    /// Wrap a handle to the books collection.
    pub fn new(database: &bookshelf_db::Database) -> Self {
        Self {
            collection: database.collection(),
        }
    }
}

#[async_trait]
impl BookStore for MongoBookStore {
    async fn insert(&self, input: BookInput, now: OffsetDateTime) -> anyhow::Result<Book> {
        let book = Book {
            id: BookId::new(),
            title: input.title,
            author: input.author,
            created_at: now,
            updated_at: now,
        };

        self.collection
            .insert_one(BookDocument::from(&book))
            .await
            .context("failed to insert book")?;

        Ok(book)
    }

    async fn get(&self, id: BookId) -> anyhow::Result<Option<Book>> {
        let document = self
            .collection
            .find_one(by_id(id))
            .await
            .with_context(|| format!("failed to load book {}", id))?;

        Ok(document.map(Book::from))
    }

    async fn list(&self) -> anyhow::Result<Vec<BookListItem>> {
        let documents: Vec<BookListDocument> = self
            .collection
            .clone_with_type::<BookListDocument>()
            .find(doc! {})
            .projection(doc! { "_id": 1, "title": 1, "author": 1 })
            .await
            .context("failed to query books")?
            .try_collect()
            .await
            .context("failed to read books cursor")?;

        Ok(documents.into_iter().map(BookListItem::from).collect())
    }

    async fn replace(
        &self,
        id: BookId,
        input: BookInput,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<Book>> {
        let document = self
            .collection
            .find_one_and_update(by_id(id), replace_pipeline(&input, now))
            .return_document(ReturnDocument::After)
            .await
            .with_context(|| format!("failed to update book {}", id))?;

        Ok(document.map(Book::from))
    }

    async fn delete(&self, id: BookId) -> anyhow::Result<bool> {
        let result = self
            .collection
            .delete_one(by_id(id))
            .await
            .with_context(|| format!("failed to delete book {}", id))?;

        Ok(result.deleted_count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn document_uses_legacy_field_names() {
        let book = Book {
            id: BookId::parse("65a1b2c3d4e5f60718293a4b").unwrap(),
            title: "Dune".to_string(),
            author: "Herbert".to_string(),
            created_at: datetime!(2024-01-12 18:30:00.123 UTC),
            updated_at: datetime!(2024-01-12 18:30:00.123 UTC),
        };

        let stored = bson::to_document(&BookDocument::from(&book)).unwrap();
        let keys: Vec<_> = stored.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["_id", "title", "author", "createAt", "updateAt"]);

        let restored: BookDocument = bson::from_document(stored).unwrap();
        assert_eq!(Book::from(restored), book);
    }

    #[test]
    fn document_without_author_reads_as_empty() {
        let stored = doc! {
            "_id": ObjectId::new(),
            "title": "Dune",
            "createAt": DateTime::now(),
            "updateAt": DateTime::now(),
        };

        let document: BookDocument = bson::from_document(stored).unwrap();
        assert_eq!(Book::from(document).author, "");
    }

    #[test]
    fn replace_pipeline_escapes_user_text() {
        let input = BookInput {
            title: "$title".to_string(),
            author: String::new(),
        };
        let pipeline = replace_pipeline(&input, datetime!(2024-01-12 18:30 UTC));

        let set = pipeline[0].get_document("$set").unwrap();
        let title = set.get_document("title").unwrap();
        assert_eq!(title.get_str("$literal").unwrap(), "$title");
        assert!(set.get_document("updateAt").unwrap().contains_key("$max"));
    }
}
