//! The watcher: a long-lived task mirroring store mutations into the cache.
//!
//! ```text
//!           start
//!             |
//!             v
//!   ChangeStream --ok--> applying events
//!        |
//!    error/retry (<= max_tries)
//!        |
//!        v
//!     Polling ----ok---> applying reads every 5 s
//!        |
//!    error/retry (<= max_tries)
//!        |
//!        v
//!     Stopped (fatal PROVIDER_ERROR published, blocking)
//! ```
//!
//! Cancellation is observed at every suspension point via the provider's
//! shutdown channel (and an optional parent channel); both modes unwind
//! promptly, releasing stream handles and cursors.

mod event;


pub use event::ChangeEvent;
pub use event::ChangeOperation;

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::bson::Document;
use mongodb::options::FullDocumentType;
use mongodb::Collection;
use tokio::sync::watch;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::cache::FlagCache;
use crate::errors::Error;
use crate::errors::Result;
use crate::events::EventHandler;
use crate::events::ProviderEvent;
use crate::events::ProviderEventType;
use crate::resolution::ErrorCode;

/// Default attempt budget per watcher mode.
pub const DEFAULT_MAX_TRIES: u32 = 3;

const POLLING_INTERVAL: Duration = Duration::from_secs(5);

/// Change-stream consumer with a polling fallback, feeding the cache and
/// publishing provider events.
pub struct WatchHandler {
    collection: Collection<Document>,
    document_id: Option<String>,
    max_tries: u32,
    cache: Arc<FlagCache>,
    events: EventHandler,
    provider_name: &'static str,
    shutdown: watch::Receiver<()>,
    parent_shutdown: Option<watch::Receiver<()>>,
}

impl WatchHandler {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        collection: Collection<Document>,
        document_id: Option<String>,
        max_tries: u32,
        cache: Arc<FlagCache>,
        events: EventHandler,
        provider_name: &'static str,
        shutdown: watch::Receiver<()>,
        parent_shutdown: Option<watch::Receiver<()>>,
    ) -> Self {
        Self {
            collection,
            document_id,
            max_tries,
            cache,
            events,
            provider_name,
            shutdown,
            parent_shutdown,
        }
    }

    /// Runs until cancelled or until both modes exhaust their retries, at
    /// which point a fatal provider error is published (blocking: the
    /// subscriber must see it) and the task stops.
    pub async fn run(mut self) {
        for attempt in 1..=self.max_tries {
            match self.change_stream().await {
                Ok(()) => {
                    info!(document_id = ?self.document_id, "watch cancelled");
                    return;
                }
                Err(err) => {
                    warn!(attempt, %err, document_id = ?self.document_id, "change stream failed");
                }
            }
        }

        info!(document_id = ?self.document_id, "change streams exhausted, falling back to polling");
        for attempt in 1..=self.max_tries {
            match self.poll().await {
                Ok(()) => {
                    info!(document_id = ?self.document_id, "polling cancelled");
                    return;
                }
                Err(err) => {
                    warn!(attempt, %err, document_id = ?self.document_id, "polling failed");
                }
            }
        }

        error!(tries = self.max_tries, document_id = ?self.document_id, "max retries reached, stopping watch");
        self.events
            .publish_blocking(ProviderEvent {
                provider_name: self.provider_name,
                event_type: ProviderEventType::Error,
                message: format!("max retries reached ({}), stopping watch", self.max_tries),
                error_code: Some(ErrorCode::ProviderFatal),
            })
            .await;
    }

    /// Tails the collection's change log. Returns `Ok` only on cancellation.
    async fn change_stream(&mut self) -> Result<()> {
        let mut filter = doc! {
            "operationType": { "$in": ["insert", "update", "replace", "delete"] },
        };
        if let Some(document_id) = &self.document_id {
            filter.insert("fullDocument._id", document_id.as_str());
        }

        let mut stream = self
            .collection
            .watch()
            .pipeline([doc! { "$match": filter }])
            .full_document(FullDocumentType::UpdateLookup)
            .await
            .map_err(|err| Error::Stream(format!("starting change stream: {err}")))?;

        loop {
            tokio::select! {
                () = wait_shutdown(&mut self.shutdown, self.parent_shutdown.as_mut()) => {
                    return Ok(());
                }
                next = stream.next() => match next {
                    Some(Ok(raw)) => {
                        let Some(event) = ChangeEvent::from_stream(raw) else {
                            continue;
                        };
                        self.handle_event(event)?;
                    }
                    Some(Err(err)) => {
                        return Err(Error::Stream(format!("change stream error: {err}")));
                    }
                    None => {
                        return Err(Error::Stream("change stream closed".to_owned()));
                    }
                },
            }
        }
    }

    /// Fallback: every tick, read the target document (or scan the
    /// collection) and apply it as a replacement. Returns `Ok` only on
    /// cancellation.
    async fn poll(&mut self) -> Result<()> {
        loop {
            tokio::select! {
                () = wait_shutdown(&mut self.shutdown, self.parent_shutdown.as_mut()) => {
                    return Ok(());
                }
                () = tokio::time::sleep(POLLING_INTERVAL) => {}
            }

            match &self.document_id {
                Some(document_id) => {
                    let found = self
                        .collection
                        .find_one(doc! { "_id": document_id.as_str() })
                        .await
                        .map_err(|err| Error::Stream(format!("polling document: {err}")))?;
                    let Some(document) = found else {
                        debug!(document_id = %document_id, "no document found");
                        continue;
                    };
                    self.handle_event(ChangeEvent::replacement(document))?;
                }
                None => {
                    let mut cursor = self
                        .collection
                        .find(doc! {})
                        .await
                        .map_err(|err| Error::Stream(format!("polling collection: {err}")))?;
                    while let Some(document) = cursor
                        .try_next()
                        .await
                        .map_err(|err| Error::Stream(format!("polling cursor: {err}")))?
                    {
                        self.handle_event(ChangeEvent::replacement(document))?;
                    }
                }
            }
        }
    }

    fn handle_event(&self, event: ChangeEvent) -> Result<()> {
        self.events.publish(ProviderEvent {
            provider_name: self.provider_name,
            event_type: ProviderEventType::ConfigChange,
            message: match &self.document_id {
                Some(document_id) => format!("change detected for document {document_id}"),
                None => "change detected in flag collection".to_owned(),
            },
            error_code: None,
        });
        event::apply_event(&self.cache, self.document_id.as_deref(), event)
    }
}

/// Resolves when either the provider's shutdown channel or the optional
/// parent channel fires (a dropped sender counts as shutdown).
async fn wait_shutdown(
    own: &mut watch::Receiver<()>,
    parent: Option<&mut watch::Receiver<()>>,
) {
    match parent {
        Some(parent) => {
            tokio::select! {
                _ = own.changed() => {}
                _ = parent.changed() => {}
            }
        }
        None => {
            let _ = own.changed().await;
        }
    }
}
