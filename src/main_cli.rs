//! A dry-federated-query CLI, reworked from the teacher crate's Crossref
//! query binary into one that drives this crate's orchestrator.

use slr_aggregator::canonical::{CanonicalQuery, Field, Group, GroupMatch, Match};
use slr_aggregator::http::{ExecutorConfig, ReqwestTransport, Transport};
use slr_aggregator::orchestrator::{conduct_query, PageLength};
use slr_aggregator::registry::{EnvKeyProvider, Registry};
use std::collections::BTreeSet;
use std::sync::Arc;
use structopt::StructOpt;
use tokio_util::sync::CancellationToken;

#[derive(Debug, StructOpt)]
#[structopt(name = "slr-aggregator", about = "federated literature search, dry run")]
struct Opt {
    /// search terms, ANDed together in a single group
    terms: Vec<String>,
    /// result page to request (1-based)
    #[structopt(long, default_value = "1")]
    page: usize,
    /// total records requested across all active providers
    #[structopt(long, default_value = "40")]
    page_length: usize,
    /// restrict the search to one field; defaults to `all`
    #[structopt(long)]
    field: Option<String>,
}

fn parse_field(raw: &str) -> Field {
    match raw {
        "title" => Field::Title,
        "abstract" => Field::Abstract,
        "keywords" => Field::Keywords,
        _ => Field::All,
    }
}

#[tokio::main]
async fn main() {
    pretty_env_logger::init();
    let opt = Opt::from_args();

    if opt.terms.is_empty() {
        eprintln!("at least one search term is required");
        std::process::exit(1);
    }

    let mut fields = BTreeSet::new();
    fields.insert(opt.field.as_deref().map(parse_field).unwrap_or(Field::All));

    let query = match CanonicalQuery::new(vec![Group::new(opt.terms, GroupMatch::And).unwrap()], Match::And, fields) {
        Ok(q) => q,
        Err(err) => {
            eprintln!("bad query: {}", err);
            std::process::exit(1);
        }
    };

    let registry = Registry::build(&EnvKeyProvider);
    if registry.is_empty() {
        eprintln!("no provider has a configured API key (set SPRINGER_API_KEY / SCOPUS_API_KEY / SCIENCEDIRECT_API_KEY)");
        std::process::exit(1);
    }

    let transport: Arc<dyn Transport> = Arc::new(ReqwestTransport::new());
    let cancel = CancellationToken::new();

    let envelopes = conduct_query(
        &registry,
        &query,
        opt.page,
        PageLength::Fixed(opt.page_length),
        &transport,
        ExecutorConfig::default(),
        &cancel,
    )
    .await;

    for envelope in &envelopes {
        match serde_json::to_string_pretty(envelope) {
            Ok(json) => println!("{}", json),
            Err(err) => eprintln!("failed to serialize envelope: {}", err),
        }
    }
}
