use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use super::BookStore;
use crate::modules::books::models::{Book, BookId, BookInput, BookListItem};

/// In-process store keeping books in insertion order.
#[derive(Debug, Default)]
pub struct MemoryBookStore {
    books: RwLock<Vec<Book>>,
}

impl MemoryBookStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BookStore for MemoryBookStore {
    async fn insert(&self, input: BookInput, now: OffsetDateTime) -> anyhow::Result<Book> {
        let book = Book {
            id: BookId::new(),
            title: input.title,
            author: input.author,
            created_at: now,
            updated_at: now,
        };
        self.books.write().await.push(book.clone());
        Ok(book)
    }

    async fn get(&self, id: BookId) -> anyhow::Result<Option<Book>> {
        let books = self.books.read().await;
        Ok(books.iter().find(|book| book.id == id).cloned())
    }

    async fn list(&self) -> anyhow::Result<Vec<BookListItem>> {
        let books = self.books.read().await;
        Ok(books
            .iter()
            .map(|book| BookListItem {
                id: book.id.to_string(),
                title: book.title.clone(),
                author: book.author.clone(),
            })
            .collect())
    }

    async fn replace(
        &self,
        id: BookId,
        input: BookInput,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<Book>> {
        let mut books = self.books.write().await;
        let Some(book) = books.iter_mut().find(|book| book.id == id) else {
            return Ok(None);
        };

        book.title = input.title;
        book.author = input.author;
        book.updated_at = book.updated_at.max(now);
        Ok(Some(book.clone()))
    }

    async fn delete(&self, id: BookId) -> anyhow::Result<bool> {
        let mut books = self.books.write().await;
        let before = books.len();
        books.retain(|book| book.id != id);
        Ok(books.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn input(title: &str, author: &str) -> BookInput {
        BookInput {
            title: title.to_string(),
            author: author.to_string(),
        }
    }

    #[tokio::test]
    async fn list_keeps_insertion_order() {
        let store = MemoryBookStore::new();
        let now = datetime!(2024-01-12 18:30 UTC);
        let first = store.insert(input("Dune", "Herbert"), now).await.unwrap();
        let second = store.insert(input("Emma", "Austen"), now).await.unwrap();

        let titles: Vec<_> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|item| (item.id, item.title))
            .collect();
        assert_eq!(
            titles,
            vec![
                (first.id.to_string(), "Dune".to_string()),
                (second.id.to_string(), "Emma".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn replace_never_moves_update_timestamp_backwards() {
        let store = MemoryBookStore::new();
        let created = datetime!(2024-01-12 18:30 UTC);
        let book = store.insert(input("Dune", "Herbert"), created).await.unwrap();

        let earlier = datetime!(2024-01-01 00:00 UTC);
        let updated = store
            .replace(book.id, input("Dune Messiah", ""), earlier)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.created_at, created);
        assert_eq!(updated.updated_at, created);
        assert_eq!(updated.author, "");
    }

    #[tokio::test]
    async fn missing_ids_are_reported() {
        let store = MemoryBookStore::new();
        let now = datetime!(2024-01-12 18:30 UTC);

        assert!(store.get(BookId::new()).await.unwrap().is_none());
        assert!(store
            .replace(BookId::new(), input("Dune", ""), now)
            .await
            .unwrap()
            .is_none());
        assert!(!store.delete(BookId::new()).await.unwrap());
    }
}
