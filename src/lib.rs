//! A federated literature-search aggregator.
//!
//! Accepts a [`canonical`] boolean query, fans it out to per-provider
//! [`wrapper`]s (Springer, Elsevier Scopus, Elsevier ScienceDirect),
//! executes the translated requests through the [`http`] executor's
//! retry/timeout policy, normalizes responses into the canonical
//! [`model::Envelope`] shape, aggregates cross-provider facets, and
//! persists selected results per review through the [`store`] module.
//!
//! ## Usage
//!
//! ```no_run
//! use slr_aggregator::canonical::{CanonicalQuery, Field, Group, GroupMatch, Match};
//! use slr_aggregator::http::{ExecutorConfig, ReqwestTransport, Transport};
//! use slr_aggregator::orchestrator::{conduct_query, PageLength};
//! use slr_aggregator::registry::{EnvKeyProvider, Registry};
//! use std::collections::BTreeSet;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), slr_aggregator::Error> {
//! let registry = Registry::build(&EnvKeyProvider);
//! let mut fields = BTreeSet::new();
//! fields.insert(Field::All);
//! let query = CanonicalQuery::new(
//!     vec![Group::new(vec!["bitcoin".into(), "blockchain".into()], GroupMatch::And)?],
//!     Match::And,
//!     fields,
//! )?;
//!
//! let transport: Arc<dyn Transport> = Arc::new(ReqwestTransport::new());
//! let cancel = CancellationToken::new();
//! let envelopes = conduct_query(
//!     &registry,
//!     &query,
//!     1,
//!     PageLength::Fixed(40),
//!     &transport,
//!     ExecutorConfig::default(),
//!     &cancel,
//! )
//! .await;
//! # let _ = envelopes;
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]

/// the canonical boolean query model (spec §3)
pub mod canonical;
/// the error taxonomy surfaced through envelopes, never through panics (spec §7)
pub mod error;
/// the HTTP executor with retry/timeout/cancellation policy (spec §4.3)
pub mod http;
/// title-derived keyword extraction, a facet fallback (spec §4.4)
pub mod keywords;
/// the canonical result record, response envelope and facets (spec §3/§4.4)
pub mod model;
/// the federated orchestrator: fan-out, facet merging, persisted-marking (spec §4.6)
pub mod orchestrator;
/// the wrapper registry and credential binder (spec §4.5)
pub mod registry;
/// the result store: per-review collections, DOI-keyed upsert, pagination, scoring (spec §4.7)
pub mod store;
/// the wrapper interface and per-provider translators (spec §4.1/§4.2)
pub mod wrapper;

#[doc(inline)]
pub use self::error::{Error, ErrorKind, Result};

#[doc(inline)]
pub use self::canonical::{CanonicalQuery, CanonicalQueryInput, Field, Group, GroupMatch, Match};

#[doc(inline)]
pub use self::model::{Envelope, Facets, KeywordCount, Pages, ResultCounts, ResultRecord, Score};

#[doc(inline)]
pub use self::wrapper::{RequestSpec, Wrapper, WrapperConfig};
