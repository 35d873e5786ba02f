//! The canonical result record, response envelope and facets (spec §3 / §4.4).

use crate::canonical::CanonicalQuery;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// First/last page numbers of a work, as reported by the provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pages {
    /// first page, if known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first: Option<String>,
    /// last page, if known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last: Option<String>,
}

/// A reviewer's score/annotation on a result (spec §3, §4.7).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    /// the identity of the scoring user
    pub user: String,
    /// the numeric score
    pub score: i32,
    /// free-form comment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// The canonical, provider-agnostic result record (spec §3). Every wrapper
/// normalizer populates this shape, leaving unknown fields absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// primary key for persistence; absent records are non-persistable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    /// the provider's content classification, e.g. "Journal", "Article"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// the record's title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// author names, in the order the provider returned them
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
    /// the journal, conference or book title the record appeared in
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publication_name: Option<String>,
    /// the publisher name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    /// the publication date as reported by the provider, not normalized to a single format
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publication_date: Option<String>,
    /// the provider's publication type, e.g. "journal article", "book chapter"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publication_type: Option<String>,
    /// the ISSN of the containing publication
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issn: Option<String>,
    /// the volume number
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<String>,
    /// the issue number
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    /// free-text genre tags reported by the provider
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub genre: Vec<String>,
    /// the start/end page range
    #[serde(default, skip_serializing_if = "is_default_pages")]
    pub pages: Pages,
    /// the provider's internal journal identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub journal_id: Option<String>,
    /// the copyright line as reported by the provider
    #[serde(skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,
    /// the abstract text
    #[serde(skip_serializing_if = "Option::is_none", rename = "abstract")]
    pub abstract_: Option<String>,
    /// a provider-hosted URI for the full record
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    /// whether the provider marked this record open access
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_access: Option<bool>,

    /// stamped by the Result Store / orchestrator (spec §4.6), not by a
    /// provider wrapper.
    #[serde(default)]
    pub persisted: bool,
    /// scores/annotations attached by reviewers (spec §4.7); only present
    /// once persisted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scores: Vec<Score>,
}

fn is_default_pages(p: &Pages) -> bool {
    p.first.is_none() && p.last.is_none()
}

impl ResultRecord {
    /// a record lacking a DOI cannot be persisted (spec §3, §4.7 "documented limitation").
    pub fn is_persistable(&self) -> bool {
        self.doi.is_some()
    }
}

/// The result-count block of an [`Envelope`] (spec §3).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultCounts {
    /// total matches on the provider side, or `-1` for an invalid envelope
    pub total: i64,
    /// 1-based start index requested
    pub start: usize,
    /// requested page length
    pub page_length: usize,
    /// actual number of records returned
    pub records_displayed: usize,
}

/// Aggregated country counts, keyed by ISO-3166-1 alpha-2 code.
pub type CountryFacet = BTreeMap<String, u64>;

/// A single keyword facet entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordCount {
    /// the keyword text
    pub text: String,
    /// its occurrence count
    pub value: u64,
}

/// Cross-provider aggregated facets (spec §3, §4.4, §4.6).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Facets {
    /// ISO2 country code -> count
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub countries: CountryFacet,
    /// keyword -> count, emitted as a list
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<KeywordCount>,
}

impl Facets {
    /// combines two facet sets by key-wise integer addition on countries
    /// and by summing keyword counts keyed on `text` (spec §4.6). Facet
    /// combining is associative and commutative.
    pub fn combine(mut self, other: &Facets) -> Facets {
        for (k, v) in &other.countries {
            *self.countries.entry(k.clone()).or_insert(0) += v;
        }
        let mut by_text: BTreeMap<String, u64> = self
            .keywords
            .into_iter()
            .map(|k| (k.text, k.value))
            .collect();
        for kw in &other.keywords {
            *by_text.entry(kw.text.clone()).or_insert(0) += kw.value;
        }
        self.keywords = by_text
            .into_iter()
            .map(|(text, value)| KeywordCount { text, value })
            .collect();
        self
    }

    /// zeroes out this facet set (used on every envelope but the first one
    /// returned from `conduct_query`, spec §4.6, to avoid double counting
    /// on client-side merging).
    pub fn zeroed() -> Facets {
        Facets::default()
    }
}

/// The canonical response envelope (spec §3, §6.2). Every wrapper MUST emit
/// this shape, including on failure (an "invalid envelope").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// the echoed canonical input query, if one was supplied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<CanonicalQuery>,
    /// the native query string/body actually sent to the provider
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_query: Option<String>,
    /// the credential used for this call
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// absent on success; populated with one of the spec §7 taxonomy strings otherwise
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// pagination bookkeeping
    pub result: ResultCounts,
    /// the normalized records for this page
    #[serde(default)]
    pub records: Vec<ResultRecord>,
    /// aggregated facets
    #[serde(default)]
    pub facets: Facets,
}

impl Envelope {
    /// Builds the invalid envelope described in spec §4.3/§7: shape
    /// compatible with success but `result.total == -1`, no records, and
    /// the classified error message.
    pub fn invalid(query: Option<CanonicalQuery>, api_key: Option<String>, error: impl Into<String>) -> Envelope {
        Envelope {
            query,
            db_query: None,
            api_key,
            error: Some(error.into()),
            result: ResultCounts {
                total: -1,
                start: 0,
                page_length: 0,
                records_displayed: 0,
            },
            records: Vec::new(),
            facets: Facets::default(),
        }
    }

    /// `true` if this envelope represents a transport/translation failure
    /// rather than a successful (possibly empty) result page.
    pub fn is_invalid(&self) -> bool {
        self.error.is_some() && self.result.total == -1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_envelope_matches_success_shape() {
        let env = Envelope::invalid(None, None, "Unknown collection");
        assert_eq!(env.result.total, -1);
        assert!(env.records.is_empty());
        assert!(env.is_invalid());
    }

    #[test]
    fn facet_combine_is_commutative() {
        let mut a = Facets::default();
        a.countries.insert("US".into(), 3);
        a.keywords.push(KeywordCount { text: "ai".into(), value: 2 });

        let mut b = Facets::default();
        b.countries.insert("US".into(), 1);
        b.countries.insert("DE".into(), 4);
        b.keywords.push(KeywordCount { text: "ai".into(), value: 5 });

        let ab = a.clone().combine(&b);
        let ba = b.combine(&a);

        assert_eq!(ab.countries, ba.countries);
        assert_eq!(*ab.countries.get("US").unwrap(), 4);
        assert_eq!(*ab.countries.get("DE").unwrap(), 4);

        let ab_kw: BTreeMap<_, _> = ab.keywords.into_iter().map(|k| (k.text, k.value)).collect();
        let ba_kw: BTreeMap<_, _> = ba.keywords.into_iter().map(|k| (k.text, k.value)).collect();
        assert_eq!(ab_kw, ba_kw);
        assert_eq!(*ab_kw.get("ai").unwrap(), 7);
    }

    #[test]
    fn facet_combine_is_associative() {
        let mut a = Facets::default();
        a.countries.insert("US".into(), 1);
        let mut b = Facets::default();
        b.countries.insert("US".into(), 2);
        let mut c = Facets::default();
        c.countries.insert("US".into(), 3);

        let left = a.clone().combine(&b).combine(&c);
        let right = a.combine(&b.combine(&c));
        assert_eq!(left.countries, right.countries);
    }
}
