//! SurrealDB-backed document store for the bookstore service.
//!
//! A [`Database`] is a cheap, cloneable handle to one SurrealDB namespace and
//! database. The endpoint scheme selects the engine at runtime (`mem://`,
//! `ws://`, `http://`). Tables are handed out as typed [`Collection`] views,
//! so callers work with their own structs while the tables stay schemaless.

mod collection;
mod error;
mod id;

use std::sync::Arc;

pub use collection::{Collection, Record, Schema};
pub use error::{StoreError, StoreResult};
pub use id::DocumentId;

/// SurrealDB client using the `Any` engine for runtime protocol selection.
pub type SurrealClient = surrealdb::Surreal<surrealdb::engine::any::Any>;

const MEMORY_ENDPOINT: &str = "mem://";

/// Where and as whom to connect.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub endpoint: String,
    pub namespace: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ConnectOptions {
    pub fn new(
        endpoint: impl Into<String>,
        namespace: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            namespace: namespace.into(),
            database: database.into(),
            username: None,
            password: None,
        }
    }

    /// Sign in as a root user after connecting.
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }
}

/// Process-wide handle to the document store.
#[derive(Clone)]
pub struct Database {
    client: SurrealClient,
    namespace: Arc<str>,
}

impl Database {
    /// Connect to the endpoint in `options` and select its namespace and database.
    pub async fn connect(options: &ConnectOptions) -> StoreResult<Self> {
        let endpoint = redact_endpoint(&options.endpoint);
        tracing::debug!(target: "bookstore-db", %endpoint, "connecting to document store");

        let client = surrealdb::engine::any::connect(options.endpoint.as_str()).await?;

        if let (Some(username), Some(password)) = (&options.username, &options.password) {
            client
                .signin(surrealdb::opt::auth::Root { username, password })
                .await?;
        }

        client
            .use_ns(options.namespace.as_str())
            .use_db(options.database.as_str())
            .await?;

        tracing::info!(
            target: "bookstore-db",
            %endpoint,
            namespace = %options.namespace,
            database = %options.database,
            "document store connected"
        );

        Ok(Self {
            client,
            namespace: Arc::from(options.namespace.as_str()),
        })
    }

    /// Open a fresh, empty in-memory store.
    pub async fn in_memory(namespace: &str) -> StoreResult<Self> {
        Self::connect(&ConnectOptions::new(MEMORY_ENDPOINT, namespace, namespace)).await
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Get a typed view over the table called `name`.
    ///
    /// Views obtained with the same name share the same documents.
    pub fn collection<T: Schema>(&self, name: &str) -> Collection<T> {
        Collection::new(self.client.clone(), name)
    }
}

/// Strip credentials from an endpoint before it is logged.
fn redact_endpoint(endpoint: &str) -> String {
    match (endpoint.find("://"), endpoint.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}***{}", &endpoint[..scheme_end + 3], &endpoint[at..])
        }
        _ => endpoint.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Note {
        text: String,
    }

    impl Schema for Note {}

    #[tokio::test]
    async fn connect_selects_namespace_on_memory_engine() {
        let options = ConnectOptions::new("mem://", "test", "catalog");
        let db = Database::connect(&options).await.unwrap();
        assert_eq!(db.namespace(), "test");
    }

    #[tokio::test]
    async fn connect_rejects_unknown_scheme() {
        let options = ConnectOptions::new("carrier-pigeon://coop", "test", "catalog");
        let err = Database::connect(&options).await.err().unwrap();
        assert!(matches!(err, StoreError::Surreal(_)));
    }

    #[tokio::test]
    async fn views_with_same_name_share_documents() {
        let db = Database::in_memory("test").await.unwrap();
        let writer = db.collection::<Note>("notes");
        let reader = db.collection::<Note>("notes");

        let created = writer
            .insert_one(Note {
                text: "hello".to_string(),
            })
            .await
            .unwrap();

        let found = reader.find_by_id(&created.id.to_string()).await.unwrap();
        assert_eq!(found.map(|r| r.doc.text), Some("hello".to_string()));
    }

    #[tokio::test]
    async fn memory_stores_are_isolated() {
        let first = Database::in_memory("test").await.unwrap();
        let second = Database::in_memory("test").await.unwrap();

        first
            .collection::<Note>("notes")
            .insert_one(Note {
                text: "only here".to_string(),
            })
            .await
            .unwrap();

        let notes = second.collection::<Note>("notes").find_all().await.unwrap();
        assert!(notes.is_empty());
    }

    #[test]
    fn redact_endpoint_hides_credentials() {
        assert_eq!(redact_endpoint("ws://localhost:8000"), "ws://localhost:8000");
        assert_eq!(
            redact_endpoint("ws://root:secret@db.internal:8000"),
            "ws://***@db.internal:8000"
        );
        assert_eq!(redact_endpoint("mem://"), "mem://");
    }
}
