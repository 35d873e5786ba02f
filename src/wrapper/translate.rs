//! Shared term/group rendering helpers for the GET-URL translators
//! (Scopus, Springer) and the PUT-body translator (ScienceDirect).
//! Grounded in the teacher's `format_query`/`format_queries` helpers in
//! `query/mod.rs`, generalized from a flat `+`-joined topic list into
//! parenthesized, connector-joined, optionally percent-encoded groups.

use crate::canonical::{CanonicalQuery, Field, Group, GroupMatch, Match};
use crate::error::{ErrorKind, Result};
use crate::wrapper::encode_term;
use std::collections::BTreeMap;

/// rejects any query whose NOT group isn't paired with a top-level AND
/// (spec §4.2: "AND-NOT is the only legal NOT configuration").
pub(crate) fn validate_and_not(query: &CanonicalQuery) -> Result<()> {
    if query.has_negation() && query.match_ != Match::And {
        return Err(ErrorKind::BadQuery {
            msg: "only AND-NOT is a legal NOT configuration".into(),
        }
        .into());
    }
    Ok(())
}

/// looks up the provider token for a canonical field, failing with
/// `BadQuery` for an unmapped field (spec §4.2: "Unknown canonical field
/// -> BadQuery").
pub(crate) fn field_token<'a>(
    map: &'a BTreeMap<Field, String>,
    field: &Field,
) -> Result<&'a str> {
    map.get(field).map(String::as_str).ok_or_else(|| {
        ErrorKind::BadQuery {
            msg: format!("field `{:?}` has no native translation", field),
        }
        .into()
    })
}

/// renders the terms of one group joined by its own connector, without any
/// per-term transformation, as a plain parenthesized string — e.g.
/// `(bitcoin AND blockchain)`, or `<negater>(t1 OR t2 …)` for a NOT group.
/// The negater is provider-specific (spec §4.2: "Springer negates with `-`,
/// Scopus with `NOT `").
pub(crate) fn render_group_with_negater(
    group: &Group,
    term: impl Fn(&str) -> String,
    negater: &str,
) -> String {
    let terms: Vec<String> = group.search_terms.iter().map(|t| term(t)).collect();
    match group.match_ {
        GroupMatch::And => format!("({})", terms.join(" AND ")),
        GroupMatch::Or => format!("({})", terms.join(" OR ")),
        GroupMatch::Not => format!("{}({})", negater, terms.join(" OR ")),
    }
}

/// [`render_group_with_negater`] with the `NOT ` negater, shared by Scopus
/// and the ScienceDirect PUT-body translator (spec §4.2: "a NOT group
/// renders as `NOT (t1 OR t2 …)`").
pub(crate) fn render_group_plain(group: &Group, term: impl Fn(&str) -> String) -> String {
    render_group_with_negater(group, term, "NOT ")
}

/// joins already-rendered group strings by the query's top-level connector.
pub(crate) fn join_groups(rendered: &[String], top: Match) -> String {
    let connector = match top {
        Match::And => " AND ",
        Match::Or => " OR ",
    };
    rendered.join(connector)
}

/// the identity encoding used for ScienceDirect's JSON `qs` body — terms
/// are not percent-encoded inside a JSON string value.
pub(crate) fn plain_term(term: &str) -> String {
    if Group::is_phrase(term) {
        format!("\"{}\"", term)
    } else {
        term.to_string()
    }
}

/// percent-encodes a rendered term for use inside a URL query string,
/// shared by Scopus and Springer.
pub(crate) fn url_term(term: &str) -> String {
    encode_term(term)
}

/// replaces literal spaces in a rendered boolean expression with `+`, the
/// URL-safe connector Scopus/Springer expect between keywords.
pub(crate) fn plus_join(expr: &str) -> String {
    expr.split(' ').filter(|s| !s.is_empty()).collect::<Vec<_>>().join("+")
}
