use mongodb::Client;
use tokio::sync::watch;

use crate::errors::ValidationError;
use crate::events::DroppedEventHandler;

/// Everything the provider needs to connect its collaborators. The client's
/// lifecycle belongs to the caller; the provider never closes it.
#[derive(Clone)]
pub struct ProviderOptions {
    pub client: Client,
    pub database: String,
    pub collection: String,

    /// Selects the single-document layout; `None` means one document per
    /// flag.
    pub document_id: Option<String>,
    /// Attempt budget for store operations.
    pub store_max_tries: u32,
    /// Attempt budget per watcher mode.
    pub watch_max_tries: u32,
    /// Cancelling this scope also stops the watcher.
    pub parent_shutdown: Option<watch::Receiver<()>>,
    /// Receives events the bounded bus had to drop. Defaults to a logger.
    pub on_dropped_event: Option<DroppedEventHandler>,
}

impl ProviderOptions {
    pub fn new(
        client: Client,
        database: impl Into<String>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            client,
            database: database.into(),
            collection: collection.into(),
            document_id: None,
            store_max_tries: crate::store::DEFAULT_MAX_TRIES,
            watch_max_tries: crate::watch::DEFAULT_MAX_TRIES,
            parent_shutdown: None,
            on_dropped_event: None,
        }
    }

    pub fn with_document_id(mut self, document_id: impl Into<String>) -> Self {
        self.document_id = Some(document_id.into());
        self
    }

    pub fn with_store_max_tries(mut self, max_tries: u32) -> Self {
        self.store_max_tries = max_tries;
        self
    }

    pub fn with_watch_max_tries(mut self, max_tries: u32) -> Self {
        self.watch_max_tries = max_tries;
        self
    }

    pub fn with_parent_shutdown(mut self, shutdown: watch::Receiver<()>) -> Self {
        self.parent_shutdown = Some(shutdown);
        self
    }

    pub fn with_dropped_event_handler(mut self, handler: DroppedEventHandler) -> Self {
        self.on_dropped_event = Some(handler);
        self
    }

    /// Checked eagerly at provider construction; never retried.
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        if self.database.is_empty() {
            return Err(ValidationError::MissingDatabase);
        }
        if self.collection.is_empty() {
            return Err(ValidationError::MissingCollection);
        }
        if matches!(&self.document_id, Some(id) if id.is_empty()) {
            return Err(ValidationError::EmptyDocumentId);
        }
        if self.store_max_tries == 0 || self.watch_max_tries == 0 {
            return Err(ValidationError::ZeroMaxTries);
        }
        Ok(())
    }
}
