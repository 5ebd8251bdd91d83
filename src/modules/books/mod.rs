pub mod models;
pub mod routes;
pub mod store;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use bookshelf_kernel::{InitCtx, Module};
use serde_json::json;

use store::SharedBookStore;

/// The book resource: CRUD over a single document collection
pub struct BooksModule {
    store: SharedBookStore,
}

impl BooksModule {
    pub fn new(store: SharedBookStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            collection = %ctx.settings.database.collection,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        routes::router(Arc::clone(&self.store))
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(openapi_fragment())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

fn error_response(description: &str) -> serde_json::Value {
    json!({
        "description": description,
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/ErrorResponse" }
            }
        }
    })
}

fn json_response(description: &str, schema: serde_json::Value) -> serde_json::Value {
    json!({
        "description": description,
        "content": {
            "application/json": { "schema": schema }
        }
    })
}

fn openapi_fragment() -> serde_json::Value {
    let book_ref = json!({ "$ref": "#/components/schemas/Book" });
    let request_body = json!({
        "required": true,
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/BookInput" }
            }
        }
    });
    let id_param = json!({
        "name": "id",
        "in": "path",
        "required": true,
        "description": "24 hex digit book identifier",
        "schema": { "type": "string" }
    });

    json!({
        "paths": {
            "/": {
                "get": {
                    "summary": "List books",
                    "tags": ["Books"],
                    "responses": {
                        "200": json_response("List of books", json!({
                            "type": "array",
                            "items": { "$ref": "#/components/schemas/BookListItem" }
                        })),
                        "500": error_response("Internal server error")
                    }
                },
                "post": {
                    "summary": "Create a book",
                    "tags": ["Books"],
                    "requestBody": request_body.clone(),
                    "responses": {
                        "201": json_response("Created book", book_ref.clone()),
                        "400": error_response("Invalid request body"),
                        "500": error_response("Internal server error")
                    }
                }
            },
            "/{id}": {
                "get": {
                    "summary": "Get a book",
                    "tags": ["Books"],
                    "parameters": [id_param.clone()],
                    "responses": {
                        "200": json_response("Book", book_ref.clone()),
                        "400": error_response("Malformed id"),
                        "404": error_response("Book not found")
                    }
                },
                "patch": {
                    "summary": "Replace a book's title and author",
                    "tags": ["Books"],
                    "parameters": [id_param.clone()],
                    "requestBody": request_body,
                    "responses": {
                        "200": json_response("Updated book", book_ref),
                        "400": error_response("Malformed id or body"),
                        "404": error_response("Book not found"),
                        "500": error_response("Internal server error")
                    }
                },
                "delete": {
                    "summary": "Delete a book",
                    "tags": ["Books"],
                    "parameters": [id_param],
                    "responses": {
                        "200": json_response("Deleted", json!({ "type": "boolean" })),
                        "400": error_response("Malformed id"),
                        "404": error_response("Book not found"),
                        "500": error_response("Internal server error")
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "Book": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "string", "description": "Unique identifier for the book" },
                        "title": { "type": "string", "description": "Title of the book" },
                        "author": { "type": "string", "description": "Author of the book" },
                        "createdAt": { "type": "string", "format": "date-time" },
                        "updatedAt": { "type": "string", "format": "date-time" }
                    },
                    "required": ["id", "title", "author", "createdAt", "updatedAt"]
                },
                "BookListItem": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "string" },
                        "title": { "type": "string" },
                        "author": { "type": "string" }
                    },
                    "required": ["id", "title", "author"]
                },
                "BookInput": {
                    "type": "object",
                    "properties": {
                        "title": { "type": "string", "description": "Title of the book" },
                        "author": {
                            "type": "string",
                            "description": "Author of the book, cleared when omitted"
                        }
                    },
                    "required": ["title"]
                }
            }
        }
    })
}

/// Create a new instance of the books module
pub fn create_module(store: SharedBookStore) -> Arc<dyn Module> {
    Arc::new(BooksModule::new(store))
}
