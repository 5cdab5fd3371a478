pub mod models;
pub mod routes;

use std::sync::OnceLock;

use anyhow::anyhow;
use async_trait::async_trait;
use axum::Router;
use bookstore_kernel::{InitCtx, Module};
use serde_json::json;
use utoipa::PartialSchema;

use models::{Book, BookPayload, CopiesDelta};
use routes::BooksState;

/// Name of the store collection holding book documents.
pub const COLLECTION: &str = "books";

/// Books module: CRUD over the `books` collection, mounted under `/api/books`
pub struct BooksModule {
    state: OnceLock<BooksState>,
}

impl BooksModule {
    pub const fn new() -> Self {
        Self {
            state: OnceLock::new(),
        }
    }
}

impl Default for BooksModule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        let state = BooksState {
            books: ctx.db.collection(COLLECTION),
            copies_adjustment: ctx.settings.books.copies_adjustment,
        };
        self.state
            .set(state)
            .map_err(|_| anyhow!("books module initialized twice"))?;

        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            namespace = ctx.db.namespace(),
            copies_adjustment = ?ctx.settings.books.copies_adjustment,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        match self.state.get() {
            Some(state) => routes::router(state.clone()),
            None => {
                tracing::warn!(module = self.name(), "routes requested before init; none mounted");
                Router::new()
            }
        }
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let content = |schema: &str| {
            json!({
                "application/json": {
                    "schema": { "$ref": format!("#/components/schemas/{schema}") }
                }
            })
        };
        let message_response = |description: &str| {
            json!({
                "description": description,
                "content": content("ErrorResponse")
            })
        };
        let id_param = json!([{
            "name": "id",
            "in": "path",
            "required": true,
            "schema": { "type": "string" }
        }]);

        Some(json!({
            "paths": {
                "/": {
                    "get": {
                        "summary": "List books",
                        "tags": ["Books"],
                        "responses": {
                            "200": {
                                "description": "Every book with a count",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/BookList" }
                                    }
                                }
                            },
                            "500": message_response("Internal server error")
                        }
                    },
                    "post": {
                        "summary": "Create a book",
                        "tags": ["Books"],
                        "requestBody": { "content": content("BookPayload") },
                        "responses": {
                            "201": {
                                "description": "Created book",
                                "content": content("BookRecord")
                            },
                            "400": message_response("Missing field"),
                            "500": message_response("Internal server error")
                        }
                    }
                },
                "/{id}": {
                    "get": {
                        "summary": "Get a book; null when absent",
                        "tags": ["Books"],
                        "parameters": id_param,
                        "responses": {
                            "200": {
                                "description": "The book, or null",
                                "content": content("BookRecord")
                            },
                            "500": message_response("Malformed id or internal error")
                        }
                    },
                    "put": {
                        "summary": "Replace a book",
                        "tags": ["Books"],
                        "parameters": id_param,
                        "requestBody": { "content": content("BookPayload") },
                        "responses": {
                            "200": {
                                "description": "Updated book",
                                "content": content("BookMessage")
                            },
                            "400": message_response("Missing field"),
                            "404": message_response("Book not found"),
                            "500": message_response("Internal server error")
                        }
                    },
                    "delete": {
                        "summary": "Delete a book",
                        "tags": ["Books"],
                        "parameters": id_param,
                        "responses": {
                            "200": message_response("Book deleted"),
                            "404": message_response("Book not found"),
                            "500": message_response("Internal server error")
                        }
                    }
                },
                "/{id}/copies": {
                    "patch": {
                        "summary": "Adjust available copies by a signed delta, clamped at zero",
                        "tags": ["Books"],
                        "parameters": id_param,
                        "requestBody": { "content": content("CopiesDelta") },
                        "responses": {
                            "200": {
                                "description": "Adjusted book",
                                "content": content("BookMessage")
                            },
                            "404": message_response("Book not found"),
                            "500": message_response("Error updating copies")
                        }
                    }
                },
                "/health": {
                    "get": {
                        "summary": "Books health check",
                        "tags": ["Books"],
                        "responses": {
                            "200": {
                                "description": "OK",
                                "content": {
                                    "text/plain": { "schema": { "type": "string" } }
                                }
                            }
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Book": serde_json::to_value(Book::schema()).unwrap_or_default(),
                    "BookPayload": serde_json::to_value(BookPayload::schema()).unwrap_or_default(),
                    "CopiesDelta": serde_json::to_value(CopiesDelta::schema()).unwrap_or_default(),
                    "BookRecord": {
                        "allOf": [
                            { "$ref": "#/components/schemas/Book" },
                            {
                                "type": "object",
                                "properties": {
                                    "id": { "type": "string" },
                                    "createdAt": { "type": "string", "format": "date-time" },
                                    "updatedAt": { "type": "string", "format": "date-time" }
                                },
                                "required": ["id", "createdAt", "updatedAt"]
                            }
                        ]
                    },
                    "BookList": {
                        "type": "object",
                        "properties": {
                            "count": { "type": "integer" },
                            "data": {
                                "type": "array",
                                "items": { "$ref": "#/components/schemas/BookRecord" }
                            }
                        },
                        "required": ["count", "data"]
                    },
                    "BookMessage": {
                        "type": "object",
                        "properties": {
                            "message": { "type": "string" },
                            "book": { "$ref": "#/components/schemas/BookRecord" }
                        },
                        "required": ["message", "book"]
                    }
                }
            }
        }))
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

/// Create a new instance of the books module
pub fn create_module() -> std::sync::Arc<dyn Module> {
    std::sync::Arc::new(BooksModule::new())
}
