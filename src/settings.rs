//! Process-level settings for embedding applications.
//!
//! Hierarchical loading: defaults from code, an optional `flagstream`
//! configuration file, then `FLAGSTREAM_*` environment variables with the
//! highest priority. The provider itself consumes only
//! [`ProviderOptions`](crate::provider::ProviderOptions); this is the
//! bootstrap layer that produces them.

use config::Config;
use config::Environment;
use config::File;
use mongodb::Client;
use serde::Deserialize;
use serde::Serialize;

use crate::errors::Result;
use crate::provider::ProviderOptions;
use crate::store;
use crate::watch;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// MongoDB connection string.
    #[serde(default = "default_uri")]
    pub uri: String,
    pub database: String,
    pub collection: String,

    /// Set to use the single-document layout.
    #[serde(default)]
    pub document_id: Option<String>,
    #[serde(default = "default_store_max_tries")]
    pub store_max_tries: u32,
    #[serde(default = "default_watch_max_tries")]
    pub watch_max_tries: u32,
}

fn default_uri() -> String {
    "mongodb://localhost:27017".to_owned()
}

fn default_store_max_tries() -> u32 {
    store::DEFAULT_MAX_TRIES
}

fn default_watch_max_tries() -> u32 {
    watch::DEFAULT_MAX_TRIES
}

impl ProviderSettings {
    /// Loads settings from the `flagstream` file (if present) with
    /// `FLAGSTREAM_*` environment variables taking precedence.
    pub fn load() -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::with_name("flagstream").required(false))
            .add_source(Environment::with_prefix("FLAGSTREAM"))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    /// Assembles provider options around an already-connected client.
    pub fn into_options(self, client: Client) -> ProviderOptions {
        let mut options = ProviderOptions::new(client, self.database, self.collection)
            .with_store_max_tries(self.store_max_tries)
            .with_watch_max_tries(self.watch_max_tries);
        if let Some(document_id) = self.document_id {
            options = options.with_document_id(document_id);
        }
        options
    }
}
