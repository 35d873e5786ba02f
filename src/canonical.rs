//! The canonical boolean query model (spec §3): the structured input every
//! provider wrapper translates into its own native syntax.

use crate::error::{Error, ErrorKind, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Connector between groups, or between terms inside a group.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Match {
    /// all groups/terms must match
    And,
    /// any group/term may match
    Or,
}

/// Connector for the terms inside a single [`Group`]. `Not` is only legal
/// when the enclosing query's top-level [`Match`] is `And` (spec §3
/// invariant: "only AND-NOT is expressible").
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GroupMatch {
    /// terms in this group are ANDed
    And,
    /// terms in this group are ORed
    Or,
    /// the whole group is negated
    Not,
}

/// A canonical search field. `All` is exclusive with the others (spec §3).
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    /// search across every indexed field
    All,
    /// search only the title
    Title,
    /// search only the abstract
    Abstract,
    /// search only the keywords
    Keywords,
}

/// A single group of search terms sharing one connector.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Group {
    /// ordered, non-empty list of terms. A term containing whitespace is a
    /// phrase.
    pub search_terms: Vec<String>,
    /// the connector applied between the terms of this group
    #[serde(rename = "match")]
    pub match_: GroupMatch,
}

impl Group {
    /// constructs a new group, rejecting empty term lists or empty terms
    /// (spec §7: `BadQuery` on "empty group, empty value").
    pub fn new(search_terms: Vec<String>, match_: GroupMatch) -> Result<Self> {
        if search_terms.is_empty() {
            return Err(ErrorKind::BadQuery {
                msg: "group must contain at least one search term".into(),
            }
            .into());
        }
        if search_terms.iter().any(|t| t.trim().is_empty()) {
            return Err(ErrorKind::BadQuery {
                msg: "search terms must not be empty".into(),
            }
            .into());
        }
        Ok(Group {
            search_terms,
            match_,
        })
    }

    /// a term is rendered as a phrase if it contains whitespace
    pub fn is_phrase(term: &str) -> bool {
        term.chars().any(char::is_whitespace)
    }
}

/// The canonical structured boolean query (spec §3).
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct CanonicalQuery {
    /// ordered, non-empty sequence of groups
    pub search_groups: Vec<Group>,
    /// connector between groups
    #[serde(rename = "match")]
    pub match_: Match,
    /// non-empty set of fields to search; `All` is exclusive
    pub fields: BTreeSet<Field>,
}

impl CanonicalQuery {
    /// Builds a canonical query, enforcing the invariants from spec §3:
    /// at least one group, non-empty fields, `All` exclusive, and
    /// AND-NOT-only (any `Not` group forces top-level `Match::And`).
    pub fn new(search_groups: Vec<Group>, match_: Match, fields: BTreeSet<Field>) -> Result<Self> {
        if search_groups.is_empty() {
            return Err(ErrorKind::BadQuery {
                msg: "query must contain at least one search group".into(),
            }
            .into());
        }
        if fields.len() > 1 && fields.contains(&Field::All) {
            return Err(ErrorKind::BadQuery {
                msg: "`all` is exclusive with other fields".into(),
            }
            .into());
        }
        let has_not = search_groups.iter().any(|g| g.match_ == GroupMatch::Not);
        if has_not && match_ != Match::And {
            return Err(ErrorKind::BadQuery {
                msg: "a NOT group requires the top-level match to be AND (only AND-NOT is expressible)".into(),
            }
            .into());
        }
        let fields = if fields.is_empty() {
            let mut f = BTreeSet::new();
            f.insert(Field::All);
            f
        } else {
            fields
        };
        Ok(CanonicalQuery {
            search_groups,
            match_,
            fields,
        })
    }

    /// `true` if any group is a NOT group (used by translators to decide
    /// whether AND-NOT rendering applies).
    pub fn has_negation(&self) -> bool {
        self.search_groups.iter().any(|g| g.match_ == GroupMatch::Not)
    }
}

impl TryFrom<CanonicalQueryInput> for CanonicalQuery {
    type Error = Error;

    fn try_from(input: CanonicalQueryInput) -> Result<Self> {
        CanonicalQuery::new(input.search_groups, input.match_, input.fields)
    }
}

/// The wire shape of a canonical query (spec §6.1), deserialized before its
/// invariants are validated into a [`CanonicalQuery`].
#[derive(Debug, Clone, Deserialize)]
pub struct CanonicalQueryInput {
    /// raw groups, not yet invariant-checked
    pub search_groups: Vec<Group>,
    /// raw top-level connector
    #[serde(rename = "match")]
    pub match_: Match,
    /// raw fields, may be empty (defaults to `all`)
    #[serde(default)]
    pub fields: BTreeSet<Field>,
}

use std::convert::TryFrom;

#[cfg(test)]
mod tests {
    use super::*;

    fn term_group(terms: &[&str], m: GroupMatch) -> Group {
        Group::new(terms.iter().map(|s| s.to_string()).collect(), m).unwrap()
    }

    #[test]
    fn or_not_is_rejected() {
        let groups = vec![
            term_group(&["energy"], GroupMatch::Or),
            term_group(&["nuclear"], GroupMatch::Not),
        ];
        let mut fields = BTreeSet::new();
        fields.insert(Field::All);
        let err = CanonicalQuery::new(groups, Match::Or, fields).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::BadQuery { .. }));
    }

    #[test]
    fn and_not_is_allowed() {
        let groups = vec![
            term_group(&["energy"], GroupMatch::Or),
            term_group(&["nuclear"], GroupMatch::Not),
        ];
        let mut fields = BTreeSet::new();
        fields.insert(Field::All);
        let q = CanonicalQuery::new(groups, Match::And, fields).unwrap();
        assert!(q.has_negation());
    }

    #[test]
    fn empty_group_is_rejected() {
        assert!(Group::new(vec![], GroupMatch::And).is_err());
    }

    #[test]
    fn phrase_detection() {
        assert!(Group::is_phrase("machine learning"));
        assert!(!Group::is_phrase("bitcoin"));
    }

    #[test]
    fn empty_fields_default_to_all() {
        let groups = vec![term_group(&["bitcoin"], GroupMatch::And)];
        let q = CanonicalQuery::new(groups, Match::And, BTreeSet::new()).unwrap();
        assert_eq!(q.fields, [Field::All].into_iter().collect());
    }
}
