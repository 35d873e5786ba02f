//! The Wrapper Interface (spec §4.1): the capability contract every
//! provider-specific wrapper satisfies, plus the shared configuration type
//! every translator builds from.
//!
//! Per design note §9, wrapper configuration is an **immutable value**:
//! `start_at`/`show_num` return a reconfigured copy rather than mutating
//! `self`, so a `Wrapper` is safe to call concurrently (spec §5) — no
//! per-instance mutation races between federated calls sharing a registry.

pub mod sciencedirect;
pub mod scopus;
pub mod springer;
pub mod translate;

use crate::canonical::{CanonicalQuery, Field};
use crate::error::{ErrorKind, Result};
use crate::model::Envelope;
use reqwest::Method;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// The shape of the native HTTP request a translator produces (spec §4.1's
/// `translate_query(canonical_query) -> (url, headers, body | null)`).
#[derive(Debug, Clone)]
pub struct RequestSpec {
    /// `GET` for Scopus/Springer, `PUT` for ScienceDirect
    pub method: Method,
    /// the fully qualified request URL
    pub url: String,
    /// extra headers beyond what the HTTP client adds by default
    pub headers: Vec<(String, String)>,
    /// `None` for GET-URL translators; `Some` JSON body for PUT-body ones
    pub body: Option<Value>,
    /// the native query actually embedded in the request (for `Envelope::db_query`)
    pub db_query: String,
    /// the credential used for this request (for `Envelope::api_key`)
    pub api_key: String,
}

/// Per-wrapper, per-collection configuration (spec §4.1).
#[derive(Debug, Clone)]
pub struct WrapperConfig {
    /// base URL of the provider API
    pub endpoint: String,
    /// the active collection (e.g. Springer's `meta/v2`, `openaccess`, …)
    pub collection: String,
    /// the active result format (e.g. `json`)
    pub result_format: String,
    /// collection -> permitted result formats; the first entry is the
    /// default used when coercing an incompatible format.
    pub allowed_result_formats: BTreeMap<String, Vec<String>>,
    /// provider-defined ceiling on records per page, collection-dependent
    pub max_records: usize,
    /// requested page length, always clamped `<= max_records`
    pub show_num: usize,
    /// 1-based start index for the next call
    pub start_at: usize,
    /// canonical field -> allowed raw values (empty means "any value")
    pub allowed_search_fields: BTreeMap<String, BTreeSet<String>>,
    /// canonical field -> provider field token
    pub fields_translate_map: BTreeMap<Field, String>,
    /// bounded retry count for transport timeouts
    pub max_retries: u32,
    /// accumulated manual single-field search terms (`search_field`/`reset_field`)
    pub manual_fields: BTreeMap<String, String>,
}

impl WrapperConfig {
    /// Sets the active collection, auto-coercing `result_format` to the
    /// collection's first allowed value if the current one is no longer
    /// permitted (spec §4.1).
    pub fn set_collection(&mut self, collection: impl Into<String>) -> Result<()> {
        let collection = collection.into();
        let allowed = self
            .allowed_result_formats
            .get(&collection)
            .cloned()
            .ok_or_else(|| ErrorKind::BadConfig {
                msg: format!("unknown collection `{}`", collection),
            })?;
        self.collection = collection;
        if !allowed.iter().any(|f| f == &self.result_format) {
            self.result_format = allowed
                .first()
                .cloned()
                .ok_or_else(|| ErrorKind::BadConfig {
                    msg: "collection has no allowed result formats".into(),
                })?;
        }
        Ok(())
    }

    /// Sets the result format, failing with `BadConfig` if it is not
    /// permitted for the active collection.
    pub fn set_result_format(&mut self, format: impl Into<String>) -> Result<()> {
        let format = format.into();
        let allowed = self
            .allowed_result_formats
            .get(&self.collection)
            .ok_or_else(|| ErrorKind::BadConfig {
                msg: format!("unknown collection `{}`", self.collection),
            })?;
        if !allowed.iter().any(|f| f == &format) {
            return Err(ErrorKind::BadConfig {
                msg: format!(
                    "result format `{}` is not permitted for collection `{}`",
                    format, self.collection
                ),
            }
            .into());
        }
        self.result_format = format;
        Ok(())
    }

    /// Returns a copy of this configuration repositioned at `index`
    /// (1-based) with `show_num` set, clamped to `max_records` (spec §4.1).
    /// Value semantics keep the wrapper itself immutable across concurrent
    /// calls (spec §5).
    pub fn paged(&self, index: usize, show_num: usize) -> WrapperConfig {
        let mut cfg = self.clone();
        cfg.start_at = index;
        cfg.show_num = show_num.min(cfg.max_records);
        cfg
    }

    /// Validates and records a manual single-field search term (spec
    /// §4.1's `search_field(key, value)`).
    pub fn search_field(&mut self, key: &str, value: &str) -> Result<()> {
        if let Some(allowed) = self.allowed_search_fields.get(key) {
            if !allowed.is_empty() && !allowed.contains(value) {
                return Err(ErrorKind::BadQuery {
                    msg: format!("`{}` is not an allowed value for field `{}`", value, key),
                }
                .into());
            }
        } else {
            return Err(ErrorKind::BadQuery {
                msg: format!("unknown search field `{}`", key),
            }
            .into());
        }
        self.manual_fields.insert(key.to_string(), value.to_string());
        Ok(())
    }

    /// Clears an accumulated manual search field.
    pub fn reset_field(&mut self, key: &str) {
        self.manual_fields.remove(key);
    }
}

/// The capability contract every provider wrapper satisfies (spec §4.1).
pub trait Wrapper: Send + Sync {
    /// a short, stable provider name (`"springer"`, `"scopus"`, `"sciencedirect"`)
    fn name(&self) -> &'static str;

    /// this wrapper's current configuration
    fn config(&self) -> &WrapperConfig;

    /// a copy of this wrapper repositioned with a new `(start_at, show_num)`
    /// pair — the Rust expression of spec §4.1's pagination setters under
    /// the immutable-value design of note §9.
    fn with_paging(&self, index: usize, show_num: usize) -> Box<dyn Wrapper>;

    /// Translates a canonical query into this provider's native request
    /// (spec §4.2). Returns `BadQuery`/`BadConfig` rather than panicking;
    /// the caller converts a translation failure into an invalid envelope.
    fn translate_query(&self, query: &CanonicalQuery) -> Result<RequestSpec>;

    /// Builds a request from the wrapper's accumulated manual search
    /// fields (spec §4.1's `build_query()`), used when `call_api` is
    /// invoked with `query = None`.
    fn build_query(&self) -> Result<RequestSpec>;

    /// Normalizes a raw provider JSON response into the canonical envelope
    /// shape (spec §4.4). Must tolerate missing fields and never panic.
    fn normalize(&self, raw: &Value) -> Envelope;
}

/// formats a single query term into a phrase-quoted, percent-encoded token —
/// shared by the GET-URL translators (Scopus, Springer). Grounded in the
/// teacher's `format_query`/`format_queries` helpers, generalized from a
/// flat `+`-joined topic list to individually quoted/encoded terms.
pub(crate) fn encode_term(term: &str) -> String {
    use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
    let rendered = if crate::canonical::Group::is_phrase(term) {
        format!("\"{}\"", term)
    } else {
        term.to_string()
    };
    utf8_percent_encode(&rendered, NON_ALPHANUMERIC).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> WrapperConfig {
        let mut allowed_result_formats = BTreeMap::new();
        allowed_result_formats.insert("json".to_string(), vec!["json".to_string(), "xml".to_string()]);
        allowed_result_formats.insert("legacy".to_string(), vec!["xml".to_string()]);
        WrapperConfig {
            endpoint: "https://example.test".into(),
            collection: "json".into(),
            result_format: "json".into(),
            allowed_result_formats,
            max_records: 100,
            show_num: 20,
            start_at: 1,
            allowed_search_fields: BTreeMap::new(),
            fields_translate_map: BTreeMap::new(),
            max_retries: 3,
            manual_fields: BTreeMap::new(),
        }
    }

    #[test]
    fn set_collection_coerces_incompatible_format() {
        let mut cfg = base_config();
        cfg.set_collection("legacy").unwrap();
        assert_eq!(cfg.result_format, "xml");
    }

    #[test]
    fn set_result_format_rejects_illegal_value() {
        let mut cfg = base_config();
        assert!(cfg.set_result_format("pdf").is_err());
    }

    #[test]
    fn paged_clamps_show_num_to_max_records() {
        let cfg = base_config();
        let paged = cfg.paged(21, 1000);
        assert_eq!(paged.show_num, cfg.max_records);
        assert_eq!(paged.start_at, 21);
    }

    #[test]
    fn encode_term_quotes_phrases_once() {
        let encoded = encode_term("machine learning");
        assert!(encoded.starts_with("%22"));
        assert!(encoded.ends_with("%22"));
    }
}
