//! CRUD against the backing collection.
//!
//! Two layouts share one client: multi-document (each flag is a document
//! keyed by flag name) and single-document (one document, keyed by a
//! configured id, whose top-level fields are `flagName -> definition`).
//! The layout is fixed at construction. Transient driver failures are
//! retried up to `max_tries` with the last error wrapped with the attempt
//! count; not-found outcomes are terminal and never retried.

#[cfg(test)]
mod store_test;

use std::collections::HashMap;

use futures::TryStreamExt;
use mongodb::bson;
use mongodb::bson::doc;
use mongodb::bson::Document;
use mongodb::Collection;
use tracing::warn;

use crate::errors::Error;
use crate::errors::Result;
use crate::flag::definitions_from_document;
use crate::flag::Definition;

/// Default attempt budget for store operations.
pub const DEFAULT_MAX_TRIES: u32 = 2;

/// Client for flag definitions in one collection.
#[derive(Debug, Clone)]
pub struct StoreClient {
    collection: Collection<Document>,
    document_id: Option<String>,
    max_tries: u32,
}

impl StoreClient {
    /// A `document_id` selects the single-document layout; `None` the
    /// multi-document layout.
    pub fn new(
        collection: Collection<Document>,
        document_id: Option<String>,
        max_tries: u32,
    ) -> Self {
        Self {
            collection,
            document_id,
            max_tries,
        }
    }

    /// Upserts one definition.
    pub async fn set_flag(&self, definition: &Definition) -> Result<()> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.set_flag_once(definition).await {
                Ok(()) => return Ok(()),
                Err(source) if attempt >= self.max_tries => {
                    return Err(Error::Store {
                        operation: "setting flag",
                        attempts: attempt,
                        source,
                    });
                }
                Err(err) => {
                    warn!(flag = %definition.flag_name, attempt, %err, "error setting flag, retrying");
                }
            }
        }
    }

    async fn set_flag_once(&self, definition: &Definition) -> mongodb::error::Result<()> {
        let body = bson::to_document(definition)?;
        let (document_id, update) = match &self.document_id {
            Some(document_id) => (
                document_id.as_str(),
                single_document_update(&definition.flag_name, body),
            ),
            None => (definition.flag_name.as_str(), body),
        };
        self.collection
            .update_one(doc! { "_id": document_id }, doc! { "$set": update })
            .upsert(true)
            .await?;
        Ok(())
    }

    /// Reads one definition; `FlagNotFound` when absent.
    pub async fn get_flag(&self, flag_name: &str) -> Result<Definition> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.get_flag_once(flag_name).await {
                Ok(Some(definition)) => return Ok(definition),
                Ok(None) => return Err(Error::FlagNotFound(flag_name.to_owned())),
                Err(source) if attempt >= self.max_tries => {
                    return Err(Error::Store {
                        operation: "getting flag",
                        attempts: attempt,
                        source,
                    });
                }
                Err(err) => {
                    warn!(flag = flag_name, attempt, %err, "error getting flag, retrying");
                }
            }
        }
    }

    async fn get_flag_once(&self, flag_name: &str) -> mongodb::error::Result<Option<Definition>> {
        match &self.document_id {
            Some(document_id) => {
                let Some(mut document) = self
                    .collection
                    .find_one(doc! { "_id": document_id.as_str() })
                    .await?
                else {
                    return Ok(None);
                };
                match document.remove(flag_name) {
                    Some(value) => Ok(Some(bson::from_bson(value)?)),
                    None => Ok(None),
                }
            }
            None => match self.collection.find_one(doc! { "_id": flag_name }).await? {
                Some(mut document) => {
                    document.remove("_id");
                    Ok(Some(bson::from_document(document)?))
                }
                None => Ok(None),
            },
        }
    }

    /// Reads every definition. In single-document mode an absent document is
    /// `DocumentNotFound`; in multi-document mode an empty collection is an
    /// empty map.
    pub async fn get_all_flags(&self) -> Result<HashMap<String, Definition>> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.get_all_flags_once().await {
                Ok(Some(definitions)) => return Ok(definitions),
                Ok(None) => {
                    let document_id = self.document_id.clone().unwrap_or_default();
                    return Err(Error::DocumentNotFound(document_id));
                }
                Err(source) if attempt >= self.max_tries => {
                    return Err(Error::Store {
                        operation: "getting all flags",
                        attempts: attempt,
                        source,
                    });
                }
                Err(err) => {
                    warn!(attempt, %err, "error getting all flags, retrying");
                }
            }
        }
    }

    async fn get_all_flags_once(
        &self,
    ) -> mongodb::error::Result<Option<HashMap<String, Definition>>> {
        match &self.document_id {
            Some(document_id) => {
                let Some(document) = self
                    .collection
                    .find_one(doc! { "_id": document_id.as_str() })
                    .await?
                else {
                    return Ok(None);
                };
                Ok(Some(definitions_from_document(document)?))
            }
            None => {
                let mut cursor = self.collection.find(doc! {}).await?;
                let mut definitions = HashMap::new();
                while let Some(mut document) = cursor.try_next().await? {
                    document.remove("_id");
                    let definition: Definition = bson::from_document(document)?;
                    definitions.insert(definition.flag_name.clone(), definition);
                }
                Ok(Some(definitions))
            }
        }
    }

    /// Deletes one definition. Multi-document mode reports `FlagNotFound`
    /// when nothing was deleted; single-document mode unsets the field and
    /// reports `DocumentNotFound` when the aggregate document is absent.
    pub async fn delete_flag(&self, flag_name: &str) -> Result<()> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.delete_flag_once(flag_name).await {
                Ok(true) => return Ok(()),
                Ok(false) => return Err(self.not_found(flag_name)),
                Err(source) if attempt >= self.max_tries => {
                    return Err(Error::Store {
                        operation: "deleting flag",
                        attempts: attempt,
                        source,
                    });
                }
                Err(err) => {
                    warn!(flag = flag_name, attempt, %err, "error deleting flag, retrying");
                }
            }
        }
    }

    async fn delete_flag_once(&self, flag_name: &str) -> mongodb::error::Result<bool> {
        match &self.document_id {
            Some(document_id) => {
                let mut unset = Document::new();
                unset.insert(flag_name, "");
                let result = self
                    .collection
                    .update_one(doc! { "_id": document_id.as_str() }, doc! { "$unset": unset })
                    .await?;
                Ok(result.matched_count > 0)
            }
            None => {
                let result = self
                    .collection
                    .delete_one(doc! { "_id": flag_name })
                    .await?;
                Ok(result.deleted_count > 0)
            }
        }
    }

    /// Lightweight presence check: no definition is materialized.
    pub async fn flag_exists(&self, flag_name: &str) -> Result<bool> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.flag_exists_once(flag_name).await {
                Ok(found) => return Ok(found),
                Err(source) if attempt >= self.max_tries => {
                    return Err(Error::Store {
                        operation: "checking flag existence",
                        attempts: attempt,
                        source,
                    });
                }
                Err(err) => {
                    warn!(flag = flag_name, attempt, %err, "error checking flag existence, retrying");
                }
            }
        }
    }

    async fn flag_exists_once(&self, flag_name: &str) -> mongodb::error::Result<bool> {
        let filter = exists_filter(self.document_id.as_deref(), flag_name);
        let found = self
            .collection
            .find_one(filter)
            .projection(doc! { "_id": 1 })
            .await?;
        Ok(found.is_some())
    }

    /// Per-field `$set`. In single-document mode each key targets the
    /// nested definition (`<flagName>.<field>`); the field's prior existence
    /// is not verified, so callers gate on [`flag_exists`](Self::flag_exists).
    pub async fn partial_update_flag(&self, flag_name: &str, updates: &Document) -> Result<()> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.partial_update_flag_once(flag_name, updates).await {
                Ok(true) => return Ok(()),
                Ok(false) => return Err(self.not_found(flag_name)),
                Err(source) if attempt >= self.max_tries => {
                    return Err(Error::Store {
                        operation: "updating flag",
                        attempts: attempt,
                        source,
                    });
                }
                Err(err) => {
                    warn!(flag = flag_name, attempt, %err, "error updating flag, retrying");
                }
            }
        }
    }

    async fn partial_update_flag_once(
        &self,
        flag_name: &str,
        updates: &Document,
    ) -> mongodb::error::Result<bool> {
        let (document_id, set) = match &self.document_id {
            Some(document_id) => (document_id.as_str(), prefixed_updates(flag_name, updates)),
            None => (flag_name, updates.clone()),
        };
        let result = self
            .collection
            .update_one(doc! { "_id": document_id }, doc! { "$set": set })
            .await?;
        Ok(result.matched_count > 0)
    }

    fn not_found(&self, flag_name: &str) -> Error {
        match &self.document_id {
            Some(document_id) => Error::DocumentNotFound(document_id.clone()),
            None => Error::FlagNotFound(flag_name.to_owned()),
        }
    }
}

/// Wraps a definition body so `$set` targets the aggregate document's
/// `flagName` field.
fn single_document_update(flag_name: &str, body: Document) -> Document {
    let mut update = Document::new();
    update.insert(flag_name, body);
    update
}

/// Rewrites update keys to dotted paths under the flag's field.
fn prefixed_updates(flag_name: &str, updates: &Document) -> Document {
    let mut set = Document::new();
    for (field, value) in updates {
        set.insert(format!("{flag_name}.{field}"), value.clone());
    }
    set
}

/// Presence filter for either layout.
fn exists_filter(document_id: Option<&str>, flag_name: &str) -> Document {
    match document_id {
        Some(document_id) => {
            let mut filter = doc! { "_id": document_id };
            filter.insert(flag_name, doc! { "$exists": true });
            filter
        }
        None => doc! { "_id": flag_name },
    }
}
