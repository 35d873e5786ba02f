//! The Result Store (spec §4.7): per-review result collections keyed by
//! DOI, pagination, scoring, DOI-bulk delete.

use crate::canonical::CanonicalQuery;
use crate::model::{ResultRecord, Score};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock};

/// A user-owned container for queries and their persisted results (spec §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Review {
    /// the review's id; also the key used to derive `result_collection_name`
    pub id: String,
    /// display name
    pub name: String,
    /// free-form description
    pub description: String,
    /// owning user identity
    pub owner: String,
    /// additional user identities with access
    pub collaborators: Vec<String>,
}

impl Review {
    /// the deterministic, unique collection name for this review's results
    /// (spec §3: "named deterministically from the Review id").
    pub fn result_collection_name(&self) -> String {
        format!("results-{}", self.id)
    }
}

/// A timestamped, persisted invocation of the orchestrator against one
/// review; owns the list of DOIs it produced (spec §3).
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySession {
    /// session id
    pub id: String,
    /// when this session ran
    pub time: DateTime<Utc>,
    /// the canonical query executed
    pub search: CanonicalQuery,
    /// DOIs this session has produced so far
    pub results: Vec<String>,
}

/// A persisted result row (spec §3; renamed from the spec's `Result` to
/// avoid clashing with `std::result::Result`).
#[derive(Debug, Clone, PartialEq)]
pub struct StoredResult {
    /// primary key
    pub doi: String,
    /// the normalized record, with `persisted` forced to `true`
    pub record: ResultRecord,
}

/// The storage-engine-agnostic handle the orchestrator and host adapters
/// are built against (design note §9: "explicit injected store handle").
/// `MemoryResultStore` is the in-memory reference implementation used by
/// tests; a real deployment would implement this trait over a database.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Upserts every persistable record (spec §4.7's `save_results`):
    /// primary key = `doi`, `persisted` forced `true`, and the DOI is
    /// appended to `session.results`. Records without a DOI are skipped.
    async fn save_results(&self, records: &[ResultRecord], review: &Review, session: &mut QuerySession);

    /// The union of DOIs already persisted for `review`, read once per
    /// federated call for persisted-marking (spec §4.6).
    async fn persisted_dois(&self, review: &Review) -> BTreeSet<String>;

    /// Retrieves persisted results for a review (`query_session = None`) or
    /// for one query session's DOIs, with spec §4.7's documented
    /// off-by-one pagination: `skip = (page-1)*page_length + 1` when
    /// `page >= 1`, else the full set.
    async fn get_persisted_results(
        &self,
        review: &Review,
        query_session: Option<&QuerySession>,
        page: usize,
        page_length: usize,
    ) -> (Vec<StoredResult>, usize);

    /// Set-membership lookup against a review's collection.
    async fn get_results_by_dois(&self, review: &Review, dois: &[String]) -> Vec<StoredResult>;

    /// Point lookup by DOI.
    async fn get_result_by_doi(&self, review: &Review, doi: &str) -> Option<StoredResult>;

    /// Removes the matching primary keys from a review's collection.
    async fn delete_results_by_dois(&self, review: &Review, dois: &[String]);

    /// Truncates a review's collection entirely.
    async fn delete_results_for_review(&self, review: &Review);

    /// Upserts a score for `(result, evaluation.user)`, overwriting any
    /// existing entry for that user in place (spec §4.7's "one score per
    /// user" invariant).
    async fn update_score(&self, review: &Review, doi: &str, evaluation: Score);

    /// the current time, used to stamp new `QuerySession`s. Exists so tests
    /// don't need wall-clock nondeterminism to construct one.
    fn now(&self) -> DateTime<Utc>;
}

/// 1-based pagination offset, kept deliberately off-by-one per spec §4.7's
/// open question: `(page-1)*page_length + 1` rather than the arithmetically
/// "clean" `(page-1)*page_length`. See DESIGN.md.
pub fn calc_start_at(page: usize, page_length: usize) -> usize {
    (page - 1) * page_length + 1
}

/// `Arc<RwLock<...>>`-backed in-memory store: the reference implementation
/// and the seam the test suite drives.
#[derive(Default)]
pub struct MemoryResultStore {
    collections: RwLock<BTreeMap<String, BTreeMap<String, StoredResult>>>,
}

impl MemoryResultStore {
    /// Builds an empty store.
    pub fn new() -> Self {
        MemoryResultStore::default()
    }

    fn with_collection<R>(&self, review: &Review, f: impl FnOnce(&BTreeMap<String, StoredResult>) -> R) -> R
    where
        R: Default,
    {
        let guard = self.collections.read().unwrap();
        match guard.get(&review.result_collection_name()) {
            Some(collection) => f(collection),
            None => R::default(),
        }
    }
}

#[async_trait]
impl ResultStore for MemoryResultStore {
    async fn save_results(&self, records: &[ResultRecord], review: &Review, session: &mut QuerySession) {
        let mut guard = self.collections.write().unwrap();
        let collection = guard.entry(review.result_collection_name()).or_default();
        for record in records {
            let Some(doi) = record.doi.clone() else {
                continue;
            };
            let mut stored_record = record.clone();
            stored_record.persisted = true;
            collection.insert(
                doi.clone(),
                StoredResult {
                    doi: doi.clone(),
                    record: stored_record,
                },
            );
            if !session.results.contains(&doi) {
                session.results.push(doi);
            }
        }
    }

    async fn persisted_dois(&self, review: &Review) -> BTreeSet<String> {
        self.with_collection(review, |collection| collection.keys().cloned().collect())
    }

    async fn get_persisted_results(
        &self,
        review: &Review,
        query_session: Option<&QuerySession>,
        page: usize,
        page_length: usize,
    ) -> (Vec<StoredResult>, usize) {
        let all: Vec<StoredResult> = self.with_collection(review, |collection| {
            collection
                .values()
                .filter(|stored| match query_session {
                    Some(session) => session.results.contains(&stored.doi),
                    None => true,
                })
                .cloned()
                .collect()
        });
        let total = all.len();

        if page == 0 || page_length == 0 {
            return (all, total);
        }

        let skip = calc_start_at(page, page_length) - 1;
        let page_results = all.into_iter().skip(skip).take(page_length).collect();
        (page_results, total)
    }

    async fn get_results_by_dois(&self, review: &Review, dois: &[String]) -> Vec<StoredResult> {
        let wanted: BTreeSet<&String> = dois.iter().collect();
        self.with_collection(review, |collection| {
            collection
                .values()
                .filter(|stored| wanted.contains(&stored.doi))
                .cloned()
                .collect()
        })
    }

    async fn get_result_by_doi(&self, review: &Review, doi: &str) -> Option<StoredResult> {
        let guard = self.collections.read().unwrap();
        guard
            .get(&review.result_collection_name())
            .and_then(|collection| collection.get(doi))
            .cloned()
    }

    async fn delete_results_by_dois(&self, review: &Review, dois: &[String]) {
        let mut guard = self.collections.write().unwrap();
        if let Some(collection) = guard.get_mut(&review.result_collection_name()) {
            for doi in dois {
                collection.remove(doi);
            }
        }
    }

    async fn delete_results_for_review(&self, review: &Review) {
        let mut guard = self.collections.write().unwrap();
        guard.remove(&review.result_collection_name());
    }

    async fn update_score(&self, review: &Review, doi: &str, evaluation: Score) {
        let mut guard = self.collections.write().unwrap();
        if let Some(collection) = guard.get_mut(&review.result_collection_name()) {
            if let Some(stored) = collection.get_mut(doi) {
                match stored.record.scores.iter_mut().find(|s| s.user == evaluation.user) {
                    Some(existing) => *existing = evaluation,
                    None => stored.record.scores.push(evaluation),
                }
            }
        }
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A thread-safe handle clonable across the orchestrator and host adapters
/// without exposing the lock internals.
pub type SharedResultStore = Arc<dyn ResultStore>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::{CanonicalQuery, Field, Group, GroupMatch, Match};
    use std::collections::BTreeSet as FieldSet;

    fn review(id: &str) -> Review {
        Review {
            id: id.to_string(),
            name: "test review".into(),
            description: String::new(),
            owner: "alice".into(),
            collaborators: Vec::new(),
        }
    }

    fn session(id: &str) -> QuerySession {
        let groups = vec![Group::new(vec!["bitcoin".into()], GroupMatch::And).unwrap()];
        let mut fields = FieldSet::new();
        fields.insert(Field::All);
        QuerySession {
            id: id.to_string(),
            time: Utc::now(),
            search: CanonicalQuery::new(groups, Match::And, fields).unwrap(),
            results: Vec::new(),
        }
    }

    fn record_with_doi(doi: &str) -> ResultRecord {
        ResultRecord {
            doi: Some(doi.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn save_results_skips_doi_less_records() {
        let store = MemoryResultStore::new();
        let review = review("r1");
        let mut session = session("s1");
        let records = vec![record_with_doi("10.1/a"), ResultRecord::default()];

        store.save_results(&records, &review, &mut session).await;

        assert_eq!(session.results, vec!["10.1/a".to_string()]);
        assert_eq!(store.persisted_dois(&review).await.len(), 1);
    }

    #[tokio::test]
    async fn doi_upsert_is_idempotent() {
        let store = MemoryResultStore::new();
        let review = review("r2");
        let mut session = session("s1");

        store.save_results(&[record_with_doi("10.1/x")], &review, &mut session).await;
        store.save_results(&[record_with_doi("10.1/x")], &review, &mut session).await;

        let found = store.get_results_by_dois(&review, &["10.1/x".to_string()]).await;
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn pagination_covers_every_record_without_duplicates() {
        let store = MemoryResultStore::new();
        let review = review("r3");
        let mut session = session("s1");
        let dois: Vec<String> = (0..7).map(|i| format!("10.1/{}", i)).collect();
        let records: Vec<ResultRecord> = dois.iter().map(|d| record_with_doi(d)).collect();
        store.save_results(&records, &review, &mut session).await;

        let page_length = 3;
        let mut seen = BTreeSet::new();
        let mut page = 1;
        loop {
            let (results, total) = store.get_persisted_results(&review, None, page, page_length).await;
            assert_eq!(total, 7);
            if results.is_empty() {
                break;
            }
            for r in &results {
                assert!(seen.insert(r.doi.clone()));
            }
            page += 1;
            if page > 10 {
                panic!("pagination did not terminate");
            }
        }
        assert_eq!(seen.len(), 7);
    }

    #[tokio::test]
    async fn update_score_upsert_is_idempotent_per_user() {
        let store = MemoryResultStore::new();
        let review = review("r4");
        let mut session = session("s1");
        store.save_results(&[record_with_doi("10.1/y")], &review, &mut session).await;

        store
            .update_score(
                &review,
                "10.1/y",
                Score {
                    user: "alice".into(),
                    score: 2,
                    comment: Some("a".into()),
                },
            )
            .await;
        store
            .update_score(
                &review,
                "10.1/y",
                Score {
                    user: "alice".into(),
                    score: 5,
                    comment: Some("b".into()),
                },
            )
            .await;

        let stored = store.get_result_by_doi(&review, "10.1/y").await.unwrap();
        assert_eq!(stored.record.scores.len(), 1);
        assert_eq!(stored.record.scores[0].score, 5);
        assert_eq!(stored.record.scores[0].comment.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn delete_by_dois_removes_only_matching_keys() {
        let store = MemoryResultStore::new();
        let review = review("r5");
        let mut session = session("s1");
        store
            .save_results(&[record_with_doi("10.1/keep"), record_with_doi("10.1/drop")], &review, &mut session)
            .await;

        store.delete_results_by_dois(&review, &["10.1/drop".to_string()]).await;

        assert!(store.get_result_by_doi(&review, "10.1/drop").await.is_none());
        assert!(store.get_result_by_doi(&review, "10.1/keep").await.is_some());
    }

    #[test]
    fn calc_start_at_keeps_documented_off_by_one() {
        assert_eq!(calc_start_at(2, 20), 21);
        assert_eq!(calc_start_at(1, 20), 1);
    }
}
