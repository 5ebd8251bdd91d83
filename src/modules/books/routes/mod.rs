//! HTTP handlers for the books resource.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use bookshelf_http::error::AppError;

use super::models::{self, BookId, BookInput, BookListItem, BookResponse};
use super::store::SharedBookStore;

/// Routes relative to the module mount point.
pub fn router(store: SharedBookStore) -> Router {
    Router::new()
        .route("/", get(list_books).post(create_book))
        .route(
            "/{id}",
            get(get_book).patch(update_book).delete(delete_book),
        )
        .with_state(store)
}

async fn create_book(
    State(store): State<SharedBookStore>,
    body: Bytes,
) -> Result<(StatusCode, Json<BookResponse>), AppError> {
    let input = BookInput::parse(&body)?;
    let book = store.insert(input, models::now()).await?;

    tracing::info!(book_id = %book.id, "book created");
    Ok((StatusCode::CREATED, Json(book.into())))
}

async fn list_books(
    State(store): State<SharedBookStore>,
) -> Result<Json<Vec<BookListItem>>, AppError> {
    let books = store.list().await?;

    tracing::debug!(count = books.len(), "books listed");
    Ok(Json(books))
}

async fn get_book(
    State(store): State<SharedBookStore>,
    Path(id): Path<String>,
) -> Result<Json<BookResponse>, AppError> {
    let id = BookId::parse(&id)?;
    let book = store
        .get(id)
        .await?
        .ok_or_else(|| AppError::not_found("Book not found"))?;

    tracing::debug!(book_id = %book.id, "book fetched");
    Ok(Json(book.into()))
}

/// Replaces title and author wholesale; an omitted author is cleared.
async fn update_book(
    State(store): State<SharedBookStore>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<BookResponse>, AppError> {
    let id = BookId::parse(&id)?;
    let input = BookInput::parse(&body)?;
    let book = store
        .replace(id, input, models::now())
        .await?
        .ok_or_else(|| AppError::not_found("Book not found"))?;

    tracing::info!(book_id = %book.id, "book updated");
    Ok(Json(book.into()))
}

async fn delete_book(
    State(store): State<SharedBookStore>,
    Path(id): Path<String>,
) -> Result<Json<bool>, AppError> {
    let id = BookId::parse(&id)?;
    if !store.delete(id).await? {
        return Err(AppError::not_found("Book not found"));
    }

    tracing::info!(book_id = %id, "book deleted");
    Ok(Json(true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::books::models::Book;
    use crate::modules::books::store::{BookStore, MemoryBookStore};
    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{Method, Request},
    };
    use serde_json::{json, Value};
    use std::{
        io,
        sync::{Arc, Mutex},
        time::Duration,
    };
    use time::{format_description::well_known::Rfc3339, OffsetDateTime};
    use tower::ServiceExt;

    fn app() -> Router {
        router(Arc::new(MemoryBookStore::new()))
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let body = match body {
            Some(value) => Body::from(value.to_string()),
            None => Body::empty(),
        };
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body)
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn create(app: &Router, body: Value) -> Value {
        let (status, book) = send(app, Method::POST, "/", Some(body)).await;
        assert_eq!(status, StatusCode::CREATED);
        book
    }

    fn timestamp(value: &Value) -> OffsetDateTime {
        OffsetDateTime::parse(value.as_str().unwrap(), &Rfc3339).unwrap()
    }

    #[tokio::test]
    async fn create_returns_full_book() {
        let app = app();
        let book = create(&app, json!({ "title": "Dune", "author": "Herbert" })).await;

        assert!(BookId::parse(book["id"].as_str().unwrap()).is_ok());
        assert_eq!(book["title"], "Dune");
        assert_eq!(book["author"], "Herbert");
        assert_eq!(book["createdAt"], book["updatedAt"]);
    }

    #[tokio::test]
    async fn create_accepts_body_without_content_type() {
        let request = Request::post("/")
            .body(Body::from(r#"{"title": "Dune"}"#))
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn create_rejects_invalid_bodies() {
        let app = app();

        let body = json!({ "author": "Herbert" });
        let (status, error) = send(&app, Method::POST, "/", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["error"]["code"], "bad_request");

        let (status, _) = send(&app, Method::POST, "/", Some(json!({ "title": "" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, Method::POST, "/", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, books) = send(&app, Method::GET, "/", None).await;
        assert_eq!(books, json!([]));
    }

    #[tokio::test]
    async fn get_round_trips_created_book() {
        let app = app();
        let created = create(&app, json!({ "title": "Dune", "author": "Herbert" })).await;

        let uri = format!("/{}", created["id"].as_str().unwrap());
        let (status, fetched) = send(&app, Method::GET, &uri, None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched, created);
    }

    /// Log sink shared between a test and the subscriber it installs.
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl LogBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    #[tokio::test]
    async fn get_logs_fetched_book_id() {
        let app = app();
        let created = create(&app, json!({ "title": "Dune" })).await;
        let id = created["id"].as_str().unwrap();

        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let (status, _) = send(&app, Method::GET, &format!("/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);

        let logs = logs.contents();
        assert!(logs.contains("book fetched"), "{logs}");
        assert!(logs.contains(id), "{logs}");
    }

    #[tokio::test]
    async fn get_unknown_id_is_not_found() {
        let uri = format!("/{}", BookId::new());
        let (status, error) = send(&app(), Method::GET, &uri, None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(error["error"]["code"], "not_found");
    }

    #[tokio::test]
    async fn malformed_id_is_bad_request() {
        let app = app();
        let body = Some(json!({ "title": "Dune" }));

        let (status, _) = send(&app, Method::GET, "/not-an-id", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = send(&app, Method::PATCH, "/not-an-id", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = send(&app, Method::DELETE, "/not-an-id", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn list_returns_items_without_timestamps() {
        let app = app();
        let titles = ["Dune", "Emma", "Ulysses"];
        for title in titles {
            create(&app, json!({ "title": title, "author": "someone" })).await;
        }

        let (status, books) = send(&app, Method::GET, "/", None).await;
        assert_eq!(status, StatusCode::OK);

        let books = books.as_array().unwrap();
        assert_eq!(books.len(), titles.len());
        for book in books {
            let mut keys: Vec<_> = book.as_object().unwrap().keys().cloned().collect();
            keys.sort();
            assert_eq!(keys, vec!["author", "id", "title"]);
        }
    }

    #[tokio::test]
    async fn update_replaces_fields_and_advances_timestamp() {
        let app = app();
        let created = create(&app, json!({ "title": "Dune", "author": "Herbert" })).await;
        let uri = format!("/{}", created["id"].as_str().unwrap());

        tokio::time::sleep(Duration::from_millis(5)).await;

        let body = json!({ "title": "Dune Messiah" });
        let (status, updated) = send(&app, Method::PATCH, &uri, Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["id"], created["id"]);
        assert_eq!(updated["title"], "Dune Messiah");
        assert_eq!(updated["author"], "");
        assert_eq!(updated["createdAt"], created["createdAt"]);
        assert!(timestamp(&updated["updatedAt"]) > timestamp(&updated["createdAt"]));

        let (_, fetched) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(fetched, updated);
    }

    #[tokio::test]
    async fn update_errors() {
        let app = app();
        let created = create(&app, json!({ "title": "Dune" })).await;
        let uri = format!("/{}", created["id"].as_str().unwrap());

        let body = json!({ "author": "Herbert" });
        let (status, _) = send(&app, Method::PATCH, &uri, Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let missing = format!("/{}", BookId::new());
        let body = json!({ "title": "Dune" });
        let (status, _) = send(&app, Method::PATCH, &missing, Some(body)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_is_not_idempotent() {
        let app = app();
        let created = create(&app, json!({ "title": "Dune" })).await;
        let uri = format!("/{}", created["id"].as_str().unwrap());

        let (status, body) = send(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!(true));

        let (status, _) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    struct FailingStore;

    #[async_trait]
    impl BookStore for FailingStore {
        async fn insert(&self, _: BookInput, _: OffsetDateTime) -> anyhow::Result<Book> {
            anyhow::bail!("connection reset by mongod")
        }

        async fn get(&self, _: BookId) -> anyhow::Result<Option<Book>> {
            anyhow::bail!("connection reset by mongod")
        }

        async fn list(&self) -> anyhow::Result<Vec<BookListItem>> {
            anyhow::bail!("connection reset by mongod")
        }

        async fn replace(
            &self,
            _: BookId,
            _: BookInput,
            _: OffsetDateTime,
        ) -> anyhow::Result<Option<Book>> {
            anyhow::bail!("connection reset by mongod")
        }

        async fn delete(&self, _: BookId) -> anyhow::Result<bool> {
            anyhow::bail!("connection reset by mongod")
        }
    }

    #[tokio::test]
    async fn store_failures_are_opaque_500s() {
        let app = router(Arc::new(FailingStore));
        let uri = format!("/{}", BookId::new());
        let body = json!({ "title": "Dune" });

        let cases = [
            (Method::POST, "/".to_string(), Some(body.clone())),
            (Method::GET, "/".to_string(), None),
            (Method::PATCH, uri.clone(), Some(body)),
            (Method::DELETE, uri, None),
        ];

        for (method, uri, body) in cases {
            let (status, error) = send(&app, method, &uri, body).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(error["error"]["code"], "internal_error");
            assert!(!error.to_string().contains("mongod"));
        }
    }
}
