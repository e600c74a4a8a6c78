//! The provider facade: wires cache, store, watcher, event bus and state
//! handler together and exposes the typed evaluation surface.
//!
//! Evaluations run on caller threads against the in-memory mirror and never
//! perform synchronous I/O. Startup seeds the mirror with a full scan and
//! launches the watcher; shutdown stops the watcher and closes the bus.

mod options;


pub use options::ProviderOptions;

use std::sync::Arc;

use mongodb::bson::Bson;
use mongodb::bson::Document;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tracing::info;

use crate::cache::FlagCache;
use crate::context::EvaluationContext;
use crate::errors::Error;
use crate::errors::Result;
use crate::events::EventHandler;
use crate::events::ProviderEvent;
use crate::resolution::Resolution;
use crate::state::ProviderStatus;
use crate::state::StateHandler;
use crate::store::StoreClient;
use crate::watch::WatchHandler;

/// Name reported in metadata and on published events.
pub const PROVIDER_NAME: &str = "MongoDBFeatureProvider";

/// Provider name and nothing else; there is no further metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderMetadata {
    pub name: &'static str,
}

/// This provider defines no evaluation hooks, so the hook list is always
/// empty.
#[derive(Debug, Clone, Copy)]
pub enum EvaluationHook {}

/// A feature-flag provider backed by one MongoDB collection.
pub struct MongoProvider {
    cache: Arc<FlagCache>,
    state: StateHandler,
    store: StoreClient,
}

impl MongoProvider {
    /// Validates the options, wires the components and returns the provider
    /// together with the read-only event channel. Nothing touches the
    /// database until [`init`](Self::init).
    pub fn new(
        options: ProviderOptions,
    ) -> Result<(Self, mpsc::Receiver<ProviderEvent>)> {
        options.validate()?;

        let cache = Arc::new(FlagCache::new());
        let on_dropped = options
            .on_dropped_event
            .clone()
            .unwrap_or_else(|| EventHandler::logging_dropped_handler(PROVIDER_NAME));
        let (events, receiver) = EventHandler::new(on_dropped);

        let collection = options
            .client
            .database(&options.database)
            .collection::<Document>(&options.collection);
        let store = StoreClient::new(
            collection.clone(),
            options.document_id.clone(),
            options.store_max_tries,
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(());
        let watcher = WatchHandler::new(
            collection,
            options.document_id.clone(),
            options.watch_max_tries,
            Arc::clone(&cache),
            events.clone(),
            PROVIDER_NAME,
            shutdown_rx,
            options.parent_shutdown.clone(),
        );

        let mut state = StateHandler::new();

        state.register_startup(move || async move {
            tokio::spawn(watcher.run());
            Ok(())
        });

        let seed_store = store.clone();
        let seed_cache = Arc::clone(&cache);
        state.register_startup(move || async move {
            match seed_store.get_all_flags().await {
                Ok(definitions) => {
                    seed_cache.set_all(definitions);
                    Ok(())
                }
                Err(Error::DocumentNotFound(_)) => {
                    info!("no flags found, starting with an empty cache");
                    Ok(())
                }
                Err(err) => Err(err),
            }
        });

        state.register_shutdown(move || {
            let _ = shutdown_tx.send(());
        });
        state.register_shutdown(move || events.close());

        Ok((
            Self {
                cache,
                state,
                store,
            },
            receiver,
        ))
    }

    /// Launches the watcher and seeds the cache. Fails when already ready.
    pub async fn init(&mut self) -> Result<()> {
        self.state.init().await
    }

    /// Stops the watcher and closes the event bus.
    pub fn shutdown(&mut self) {
        self.state.shutdown();
    }

    pub fn status(&self) -> ProviderStatus {
        self.state.status()
    }

    /// The CRUD client external collaborators (editor, tools) work through.
    pub fn store(&self) -> &StoreClient {
        &self.store
    }

    pub fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            name: PROVIDER_NAME,
        }
    }

    pub fn hooks(&self) -> Vec<EvaluationHook> {
        Vec::new()
    }

    pub fn boolean_evaluation(
        &self,
        flag_name: &str,
        default_value: bool,
        ctx: &EvaluationContext,
    ) -> Resolution<bool> {
        self.cache.evaluate(ctx, flag_name, default_value)
    }

    pub fn string_evaluation(
        &self,
        flag_name: &str,
        default_value: String,
        ctx: &EvaluationContext,
    ) -> Resolution<String> {
        self.cache.evaluate(ctx, flag_name, default_value)
    }

    pub fn int_evaluation(
        &self,
        flag_name: &str,
        default_value: i64,
        ctx: &EvaluationContext,
    ) -> Resolution<i64> {
        self.cache.evaluate(ctx, flag_name, default_value)
    }

    pub fn float_evaluation(
        &self,
        flag_name: &str,
        default_value: f64,
        ctx: &EvaluationContext,
    ) -> Resolution<f64> {
        self.cache.evaluate(ctx, flag_name, default_value)
    }

    pub fn object_evaluation(
        &self,
        flag_name: &str,
        default_value: Bson,
        ctx: &EvaluationContext,
    ) -> Resolution<Bson> {
        self.cache.evaluate(ctx, flag_name, default_value)
    }
}
