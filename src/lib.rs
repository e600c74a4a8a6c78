//! # flagstream
//!
//! A feature-flag provider backed by MongoDB. A long-lived watcher tails the
//! collection's change stream (falling back to polling) to keep an
//! in-process mirror of flag definitions fresh; typed evaluations run
//! against that mirror with no database I/O on the hot path.
//!
//! ## Features
//! - **Rule engine**: exact-match, regex, fractional rollout, ranges,
//!   CIDR/geo/time/semver/cron targeting, AND/OR/NOT composition, priority
//!   and override arbitration
//! - **Two store layouts**: one document per flag, or one aggregated
//!   document keyed by a configured id
//! - **Live synchronization**: change streams with a polling fallback and a
//!   bounded provider-event channel
//! - **Typed evaluations**: boolean, string, integer, float and object, each
//!   returning the value plus a resolution detail
//!
//! ## Quick Start
//! ```no_run
//! use std::collections::HashMap;
//!
//! use flagstream::MongoProvider;
//! use flagstream::ProviderOptions;
//! use mongodb::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::with_uri_str("mongodb://localhost:27017").await?;
//!     let options = ProviderOptions::new(client, "app", "feature_flags")
//!         .with_document_id("flags");
//!     let (mut provider, _events) = MongoProvider::new(options)?;
//!     provider.init().await?;
//!
//!     let ctx = HashMap::from([("user_id".to_owned(), "12345".into())]);
//!     let resolution = provider.boolean_evaluation("v2_enabled", false, &ctx);
//!     println!("v2_enabled = {} ({})", resolution.value, resolution.detail.reason);
//!
//!     provider.shutdown();
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod events;
pub mod flag;
pub mod provider;
pub mod resolution;
pub mod rule;
pub mod settings;
pub mod state;
pub mod store;
pub mod watch;

mod context;
mod errors;

pub use context::EvaluationContext;
pub use errors::Error;
pub use errors::Result;
pub use errors::ValidationError;
pub use provider::MongoProvider;
pub use provider::ProviderMetadata;
pub use provider::ProviderOptions;
pub use provider::PROVIDER_NAME;
pub use resolution::ErrorCode;
pub use resolution::Reason;
pub use resolution::Resolution;
pub use resolution::ResolutionDetail;
pub use resolution::ResolutionError;
pub use settings::ProviderSettings;
