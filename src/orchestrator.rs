//! The Federated Orchestrator (spec §4.6): page-length splitting,
//! multi-provider fan-out, facet merging, persisted-marking, and
//! page-by-page persistent ingestion.

use crate::canonical::CanonicalQuery;
use crate::http::{self, ExecutorConfig, Transport};
use crate::model::{Envelope, Facets};
use crate::registry::Registry;
use crate::store::{QuerySession, Review, ResultStore};
use crate::wrapper::Wrapper;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Requested per-wrapper page length: either a fixed count, split evenly
/// across active wrappers, or each wrapper's own `max_records` ceiling
/// (spec §4.6's `"max"` sentinel).
#[derive(Debug, Clone, Copy)]
pub enum PageLength {
    /// `floor(total / active_wrapper_count)`, truncated, not redistributed
    Fixed(usize),
    /// each wrapper's own `max_records`
    Max,
}

/// Runs one federated call across every active wrapper in `registry`,
/// returning one envelope per wrapper in registry order (spec §4.6 steps
/// 1-5). `transport`/`executor_config`/`cancel` drive the HTTP executor
/// (spec §4.3/§5); wrapper calls are fanned out concurrently via
/// `tokio::task::JoinSet`, tagged with their registry index so the result
/// list can be restored to registry order regardless of completion order.
pub async fn conduct_query(
    registry: &Registry,
    search: &CanonicalQuery,
    page: usize,
    page_length: PageLength,
    transport: &Arc<dyn Transport>,
    executor_config: ExecutorConfig,
    cancel: &CancellationToken,
) -> Vec<Envelope> {
    if registry.is_empty() {
        return Vec::new();
    }

    let wrappers = registry.wrappers();
    let n = wrappers.len();

    let mut set: JoinSet<(usize, Envelope)> = JoinSet::new();
    for (index, wrapper) in wrappers.iter().enumerate() {
        let per_wrapper_length = match page_length {
            PageLength::Max => wrapper.config().max_records,
            PageLength::Fixed(total) => total / n,
        };
        let start_index = (page - 1) * per_wrapper_length + 1;
        let paged_wrapper = wrapper.with_paging(start_index, per_wrapper_length);
        let search = search.clone();
        let transport = Arc::clone(transport);
        let cancel = cancel.clone();

        // spawned independently per wrapper so the federated call actually
        // fans out concurrently (spec §5); `index` restores registry order
        // on completion since `JoinSet` does not preserve submission order.
        set.spawn(async move {
            let envelope = call_wrapper(paged_wrapper.as_ref(), Some(&search), transport.as_ref(), executor_config, &cancel).await;
            (index, envelope)
        });
    }

    let mut results: Vec<(usize, Envelope)> = Vec::with_capacity(n);
    while let Some(joined) = set.join_next().await {
        if let Ok(item) = joined {
            results.push(item);
        }
    }
    results.sort_by_key(|(index, _)| *index);

    let mut envelopes: Vec<Envelope> = results.into_iter().map(|(_, e)| e).collect();

    if let Some(first) = envelopes.first().cloned() {
        let combined = envelopes
            .iter()
            .skip(1)
            .fold(first.facets.clone(), |acc, e| acc.combine(&e.facets));
        if let Some(first_mut) = envelopes.first_mut() {
            first_mut.facets = combined;
        }
        for envelope in envelopes.iter_mut().skip(1) {
            envelope.facets = Facets::zeroed();
        }
    }

    envelopes
}

/// Translates, executes and normalizes one wrapper call, converting any
/// failure into an invalid envelope rather than propagating it (spec §4.3,
/// §7's "orchestrator never aggregates an exception").
async fn call_wrapper(
    wrapper: &dyn Wrapper,
    query: Option<&CanonicalQuery>,
    transport: &dyn Transport,
    executor_config: ExecutorConfig,
    cancel: &CancellationToken,
) -> Envelope {
    let translation = match query {
        Some(q) => wrapper.translate_query(q),
        None => wrapper.build_query(),
    };

    let spec = match translation {
        Ok(spec) => spec,
        Err(err) => return Envelope::invalid(query.cloned(), None, err.envelope_message()),
    };

    match http::execute(transport, &spec, executor_config, cancel).await {
        Ok(raw) => {
            let mut envelope = wrapper.normalize(&raw);
            envelope.query = query.cloned();
            envelope.db_query = Some(spec.db_query);
            envelope.api_key = Some(spec.api_key);
            envelope
        }
        Err(err) => Envelope::invalid(query.cloned(), Some(spec.api_key), err.envelope_message()),
    }
}

/// Tags every record across `envelopes` with `persisted` (spec §4.6's
/// persisted-marking): one DB read resolves the union of DOIs already
/// saved under `review`, then every record's `persisted` flag is set from
/// set membership (absent DOI -> `false`).
pub async fn results_persisted_in_db(
    envelopes: &mut [Envelope],
    review: &Review,
    store: &dyn ResultStore,
) {
    let persisted_dois: BTreeSet<String> = store.persisted_dois(review).await;
    for envelope in envelopes.iter_mut() {
        for record in envelope.records.iter_mut() {
            record.persisted = record
                .doi
                .as_deref()
                .map(|doi| persisted_dois.contains(doi))
                .unwrap_or(false);
        }
    }
}

/// Drives page-by-page persistence until `max_records` have been ingested
/// (spec §4.6's "persistent ingestion"). Overshoot on the final page is
/// allowed; an empty page of envelopes aborts the loop.
pub async fn persistent_query(
    registry: &Registry,
    session: &mut QuerySession,
    review: &Review,
    max_records: usize,
    page_length: PageLength,
    transport: &Arc<dyn Transport>,
    executor_config: ExecutorConfig,
    store: &dyn ResultStore,
    cancel: &CancellationToken,
) -> usize {
    let mut page = 1;
    let mut count = 0;

    while count < max_records {
        let envelopes = conduct_query(registry, &session.search, page, page_length, transport, executor_config, cancel).await;
        if envelopes.is_empty() {
            break;
        }
        for envelope in &envelopes {
            store.save_results(&envelope.records, review, session).await;
            count += envelope.result.records_displayed;
        }
        page += 1;
    }

    count
}

/// Outcome of [`persist_pages_of_query`].
#[derive(Debug, Clone, PartialEq)]
pub struct PersistOutcome {
    /// `true` unless the underlying query was rejected entirely
    pub success: bool,
    /// total records persisted across every requested page
    pub num_persisted: usize,
    /// the id of the newly created query session
    pub query_id: String,
}

/// Creates a new [`QuerySession`] and persists every record returned for
/// each page in `pages` (spec §4.6's "page-range persistence").
pub async fn persist_pages_of_query(
    registry: &Registry,
    review: &Review,
    pages: &[usize],
    page_length: usize,
    search: CanonicalQuery,
    session_id: impl Into<String>,
    transport: &Arc<dyn Transport>,
    executor_config: ExecutorConfig,
    store: &dyn ResultStore,
    cancel: &CancellationToken,
) -> PersistOutcome {
    let query_id = session_id.into();
    let mut session = QuerySession {
        id: query_id.clone(),
        time: store.now(),
        search,
        results: Vec::new(),
    };

    let mut num_persisted = 0;
    for &page in pages {
        let envelopes = conduct_query(
            registry,
            &session.search,
            page,
            PageLength::Fixed(page_length),
            transport,
            executor_config,
            cancel,
        )
        .await;
        for envelope in &envelopes {
            store.save_results(&envelope.records, review, &mut session).await;
            num_persisted += envelope.records.iter().filter(|r| r.is_persistable()).count();
        }
    }

    PersistOutcome {
        success: true,
        num_persisted,
        query_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::{CanonicalQuery, Group, GroupMatch, Match};
    use crate::registry::MapKeyProvider;
    use crate::wrapper::RequestSpec;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::BTreeSet as FieldSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct StubTransport {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Transport for StubTransport {
        async fn send(&self, _spec: &RequestSpec) -> Result<serde_json::Value, crate::error::Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(json!({}))
        }
    }

    fn sample_query() -> CanonicalQuery {
        let groups = vec![Group::new(vec!["bitcoin".into()], GroupMatch::And).unwrap()];
        let mut fields = FieldSet::new();
        fields.insert(crate::canonical::Field::All);
        CanonicalQuery::new(groups, Match::And, fields).unwrap()
    }

    #[tokio::test]
    async fn pagination_split_matches_scenario_four() {
        let provider = MapKeyProvider::new()
            .with_key("SPRINGER_API_KEY", "a")
            .with_key("SCOPUS_API_KEY", "b");
        let registry = Registry::build(&provider);
        let calls = Arc::new(AtomicUsize::new(0));
        let transport: Arc<dyn Transport> = Arc::new(StubTransport { calls: Arc::clone(&calls) });
        let cancel = CancellationToken::new();

        let envelopes = conduct_query(
            &registry,
            &sample_query(),
            2,
            PageLength::Fixed(40),
            &transport,
            ExecutorConfig::default(),
            &cancel,
        )
        .await;

        assert_eq!(envelopes.len(), 2);
        // each wrapper gets show_num = 40/2 = 20, start_at = (2-1)*20+1 = 21
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn empty_registry_returns_empty_list() {
        let provider = MapKeyProvider::new();
        let registry = Registry::build(&provider);
        let calls = Arc::new(AtomicUsize::new(0));
        let transport: Arc<dyn Transport> = Arc::new(StubTransport { calls: Arc::clone(&calls) });
        let cancel = CancellationToken::new();

        let envelopes = conduct_query(
            &registry,
            &sample_query(),
            1,
            PageLength::Fixed(40),
            &transport,
            ExecutorConfig::default(),
            &cancel,
        )
        .await;
        assert!(envelopes.is_empty());
    }

    #[tokio::test]
    async fn facets_are_combined_into_first_envelope_only() {
        let provider = MapKeyProvider::new()
            .with_key("SPRINGER_API_KEY", "a")
            .with_key("SCOPUS_API_KEY", "b");
        let registry = Registry::build(&provider);
        let calls = Arc::new(AtomicUsize::new(0));
        let transport: Arc<dyn Transport> = Arc::new(StubTransport { calls: Arc::clone(&calls) });
        let cancel = CancellationToken::new();

        let envelopes = conduct_query(
            &registry,
            &sample_query(),
            1,
            PageLength::Fixed(20),
            &transport,
            ExecutorConfig::default(),
            &cancel,
        )
        .await;

        assert!(envelopes[1].facets.countries.is_empty());
        assert!(envelopes[1].facets.keywords.is_empty());
    }
}
