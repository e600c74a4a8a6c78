//! Change-event decoding and cache application.

use mongodb::bson;
use mongodb::bson::Document;
use mongodb::change_stream::event::ChangeStreamEvent;
use mongodb::change_stream::event::OperationType;
use tracing::debug;

use crate::cache::FlagCache;
use crate::errors::Error;
use crate::errors::Result;
use crate::flag::definitions_from_document;
use crate::flag::Definition;

/// The mutation kinds the watcher subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOperation {
    Insert,
    Update,
    Replace,
    Delete,
}

/// One mutation delivered by the change stream, or synthesized by polling.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub operation: ChangeOperation,
    pub full_document: Option<Document>,
    pub document_key: Option<Document>,
}

impl ChangeEvent {
    /// Maps a driver event. The pipeline admits only the four operation
    /// types; anything else is skipped.
    pub(crate) fn from_stream(event: ChangeStreamEvent<Document>) -> Option<Self> {
        let operation = match event.operation_type {
            OperationType::Insert => ChangeOperation::Insert,
            OperationType::Update => ChangeOperation::Update,
            OperationType::Replace => ChangeOperation::Replace,
            OperationType::Delete => ChangeOperation::Delete,
            other => {
                debug!(?other, "skipping unexpected change stream operation");
                return None;
            }
        };
        Some(Self {
            operation,
            full_document: event.full_document,
            document_key: event.document_key,
        })
    }

    /// A polling read treated as if the document had been replaced.
    pub(crate) fn replacement(document: Document) -> Self {
        Self {
            operation: ChangeOperation::Replace,
            full_document: Some(document),
            document_key: None,
        }
    }
}

/// Mirrors one event into the cache. `document_id` selects single-document
/// semantics (verify the id, then replace the whole map atomically); without
/// it each event targets the one flag named by the document id.
pub(crate) fn apply_event(
    cache: &FlagCache,
    document_id: Option<&str>,
    event: ChangeEvent,
) -> Result<()> {
    match document_id {
        Some(document_id) => apply_single_document(cache, document_id, event),
        None => apply_multi_document(cache, event),
    }
}

fn apply_single_document(cache: &FlagCache, document_id: &str, event: ChangeEvent) -> Result<()> {
    if event.operation == ChangeOperation::Delete {
        // The watched document is gone; so is every flag.
        cache.clear();
        return Ok(());
    }

    let Some(document) = event.full_document else {
        return Err(Error::Stream(
            "change event carries no full document".to_owned(),
        ));
    };
    match document.get_str("_id") {
        Ok(id) if id == document_id => {}
        other => {
            return Err(Error::Stream(format!(
                "change document id does not match expected id: {other:?} != {document_id}"
            )));
        }
    }

    let definitions = definitions_from_document(document)
        .map_err(|err| Error::Stream(format!("decoding flag definitions: {err}")))?;
    cache.replace_all(definitions);
    Ok(())
}

fn apply_multi_document(cache: &FlagCache, event: ChangeEvent) -> Result<()> {
    if event.operation == ChangeOperation::Delete {
        let Some(key) = event.document_key else {
            return Err(Error::Stream(
                "delete event carries no document key".to_owned(),
            ));
        };
        let Ok(id) = key.get_str("_id") else {
            return Err(Error::Stream("document id is not a string".to_owned()));
        };
        cache.remove(id);
        return Ok(());
    }

    let Some(mut document) = event.full_document else {
        return Err(Error::Stream(
            "change event carries no full document".to_owned(),
        ));
    };
    let id = match document.get_str("_id") {
        Ok(id) => id.to_owned(),
        Err(_) => {
            return Err(Error::Stream("document id is not a string".to_owned()));
        }
    };
    document.remove("_id");
    let definition: Definition = bson::from_document(document)
        .map_err(|err| Error::Stream(format!("decoding flag definition: {err}")))?;
    cache.set(id, definition);
    Ok(())
}
