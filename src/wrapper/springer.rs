//! Springer Nature wrapper: a GET-URL translator using the `meta/v2` query
//! syntax, 1-based start index (spec §6.3).

use crate::canonical::{CanonicalQuery, Field};
use crate::error::Result;
use crate::model::{CountryFacet, Envelope, Facets, KeywordCount, Pages, ResultCounts, ResultRecord};
use crate::wrapper::translate::{join_groups, render_group_with_negater, url_term, validate_and_not};
use crate::wrapper::{RequestSpec, Wrapper, WrapperConfig};
use reqwest::Method;
use serde_json::Value;
use std::collections::BTreeMap;

/// Springer Nature (`/meta/v2/json`).
#[derive(Debug, Clone)]
pub struct SpringerWrapper {
    config: WrapperConfig,
    api_key: String,
}

impl SpringerWrapper {
    /// Springer's per-call record ceiling
    pub const MAX_RECORDS: usize = 100;

    /// Builds a Springer wrapper bound to `api_key` (spec §4.2/§6.3).
    pub fn new(api_key: impl Into<String>) -> Self {
        let mut fields_translate_map = BTreeMap::new();
        fields_translate_map.insert(Field::All, "".to_string());
        fields_translate_map.insert(Field::Title, "title".to_string());
        fields_translate_map.insert(Field::Abstract, "abstract".to_string());
        fields_translate_map.insert(Field::Keywords, "keyword".to_string());

        let mut allowed_result_formats = BTreeMap::new();
        allowed_result_formats.insert("meta/v2".to_string(), vec!["json".to_string(), "jsonp".to_string()]);
        allowed_result_formats.insert("openaccess".to_string(), vec!["json".to_string()]);

        SpringerWrapper {
            config: WrapperConfig {
                endpoint: "https://api.springernature.com/meta/v2/json".to_string(),
                collection: "meta/v2".to_string(),
                result_format: "json".to_string(),
                allowed_result_formats,
                max_records: Self::MAX_RECORDS,
                show_num: Self::MAX_RECORDS,
                start_at: 1,
                allowed_search_fields: BTreeMap::new(),
                fields_translate_map,
                max_retries: 3,
                manual_fields: BTreeMap::new(),
            },
            api_key: api_key.into(),
        }
    }

    /// Renders the boolean expression for one field (spec §4.2/§8 scenario
    /// 1: unqualified `all` terms render bare, without a `field:` prefix).
    /// A NOT group negates with `-`, not `NOT `, per spec §4.2 and the
    /// original's `translateGetQuery(query, "+", "-", "+OR+")`.
    fn render_field_expr(&self, query: &CanonicalQuery, field: &Field) -> Result<String> {
        let token = self
            .config
            .fields_translate_map
            .get(field)
            .ok_or_else(|| crate::error::ErrorKind::BadQuery {
                msg: format!("field `{:?}` has no native translation", field),
            })?;

        let rendered: Vec<String> = query
            .search_groups
            .iter()
            .map(|g| render_group_with_negater(g, url_term, "-"))
            .collect();
        let joined = join_groups(&rendered, query.match_);

        if token.is_empty() {
            Ok(joined)
        } else {
            Ok(format!("{}:{}", token, joined))
        }
    }

    fn render_expression(&self, query: &CanonicalQuery) -> Result<String> {
        let exprs: Result<Vec<String>> = query
            .fields
            .iter()
            .map(|f| self.render_field_expr(query, f))
            .collect();
        let exprs = exprs?;
        if exprs.len() == 1 {
            Ok(exprs.into_iter().next().unwrap())
        } else {
            Ok(format!("({})", exprs.join(" OR ")))
        }
    }
}

impl Wrapper for SpringerWrapper {
    fn name(&self) -> &'static str {
        "springer"
    }

    fn config(&self) -> &WrapperConfig {
        &self.config
    }

    fn with_paging(&self, index: usize, show_num: usize) -> Box<dyn Wrapper> {
        Box::new(SpringerWrapper {
            config: self.config.paged(index, show_num),
            api_key: self.api_key.clone(),
        })
    }

    fn translate_query(&self, query: &CanonicalQuery) -> Result<RequestSpec> {
        validate_and_not(query)?;
        let expr = self.render_expression(query)?;
        let encoded = expr.replace(' ', "+");
        let url = format!(
            "{}?api_key={}&s={}&p={}&q={}",
            self.config.endpoint, self.api_key, self.config.start_at, self.config.show_num, encoded
        );
        Ok(RequestSpec {
            method: Method::GET,
            url,
            headers: Vec::new(),
            body: None,
            db_query: encoded,
            api_key: self.api_key.clone(),
        })
    }

    fn build_query(&self) -> Result<RequestSpec> {
        let expr = self
            .config
            .manual_fields
            .iter()
            .map(|(k, v)| format!("{}:{}", k, url_term(v)))
            .collect::<Vec<_>>()
            .join("+AND+");
        let url = format!(
            "{}?api_key={}&s={}&p={}&q={}",
            self.config.endpoint, self.api_key, self.config.start_at, self.config.show_num, expr
        );
        Ok(RequestSpec {
            method: Method::GET,
            url,
            headers: Vec::new(),
            body: None,
            db_query: expr,
            api_key: self.api_key.clone(),
        })
    }

    fn normalize(&self, raw: &Value) -> Envelope {
        normalize_springer(raw, &self.config)
    }
}

/// Maps a Springer `records`/`result` document into the canonical envelope
/// (spec §4.4).
pub fn normalize_springer(raw: &Value, config: &WrapperConfig) -> Envelope {
    let total: i64 = raw["result"]
        .as_array()
        .and_then(|r| r.first())
        .and_then(|r| r["total"].as_str())
        .and_then(|s| s.parse().ok())
        .unwrap_or(-1);

    let entries = raw["records"].as_array().cloned().unwrap_or_default();
    let mut countries: CountryFacet = BTreeMap::new();
    let mut keyword_counts: BTreeMap<String, u64> = BTreeMap::new();
    let mut records = Vec::with_capacity(entries.len());

    for entry in &entries {
        let authors = entry["creators"]
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|c| c["creator"].as_str().map(String::from))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        let keywords = entry["keyword"]
            .as_array()
            .map(|arr| arr.iter().filter_map(Value::as_str).map(String::from).collect::<Vec<_>>())
            .unwrap_or_default();
        for kw in &keywords {
            *keyword_counts.entry(kw.clone()).or_insert(0) += 1;
        }

        if let Some(country) = entry["country"].as_str() {
            if let Some(iso2) = super::scopus::country_to_iso2(country) {
                *countries.entry(iso2).or_insert(0) += 1;
            }
        }

        records.push(ResultRecord {
            doi: entry["doi"].as_str().map(String::from),
            content_type: entry["contentType"].as_str().map(String::from),
            title: entry["title"].as_str().map(String::from),
            authors,
            publication_name: entry["publicationName"].as_str().map(String::from),
            publisher: entry["publisher"].as_str().map(String::from),
            publication_date: entry["publicationDate"].as_str().map(String::from),
            publication_type: entry["publicationType"].as_str().map(String::from),
            issn: entry["issn"].as_str().map(String::from),
            volume: entry["volume"].as_str().map(String::from),
            number: entry["number"].as_str().map(String::from),
            genre: entry["genre"]
                .as_array()
                .map(|arr| arr.iter().filter_map(Value::as_str).map(String::from).collect())
                .unwrap_or_default(),
            pages: Pages {
                first: entry["startingPage"].as_str().map(String::from),
                last: entry["endingPage"].as_str().map(String::from),
            },
            journal_id: entry["journalId"].as_str().map(String::from),
            copyright: entry["copyright"].as_str().map(String::from),
            abstract_: entry["abstract"].as_str().map(String::from),
            uri: entry["url"]
                .as_array()
                .and_then(|arr| arr.first())
                .and_then(|u| u["value"].as_str())
                .map(String::from),
            open_access: if config.collection == "openaccess" {
                Some(true)
            } else {
                entry["openaccess"].as_str().map(|s| s == "true")
            },
            ..Default::default()
        });
    }

    let records_displayed = records.len();
    Envelope {
        query: None,
        db_query: None,
        api_key: None,
        error: None,
        result: ResultCounts {
            total,
            start: config.start_at,
            page_length: config.show_num,
            records_displayed,
        },
        records,
        facets: Facets {
            countries,
            keywords: keyword_counts
                .into_iter()
                .map(|(text, value)| KeywordCount { text, value })
                .collect(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::{CanonicalQuery, Group, GroupMatch, Match};
    use std::collections::BTreeSet;

    #[test]
    fn single_group_and_translation_scenario() {
        let wrapper = SpringerWrapper::new("key");
        let groups = vec![Group::new(vec!["bitcoin".into(), "blockchain".into()], GroupMatch::And).unwrap()];
        let mut fields = BTreeSet::new();
        fields.insert(Field::All);
        let query = CanonicalQuery::new(groups, Match::And, fields).unwrap();

        let spec = wrapper.translate_query(&query).unwrap();
        assert!(spec.url.ends_with("&q=(bitcoin+AND+blockchain)"));
    }

    #[test]
    fn and_not_negates_with_hyphen_not_not_keyword() {
        let wrapper = SpringerWrapper::new("key");
        let groups = vec![
            Group::new(vec!["energy".into()], GroupMatch::Or).unwrap(),
            Group::new(vec!["nuclear".into()], GroupMatch::Not).unwrap(),
        ];
        let mut fields = BTreeSet::new();
        fields.insert(Field::All);
        let query = CanonicalQuery::new(groups, Match::And, fields).unwrap();

        let spec = wrapper.translate_query(&query).unwrap();
        assert!(spec.url.ends_with("&q=(energy)+AND+-(nuclear)"));
    }

    #[test]
    fn openaccess_collection_forces_open_access_true() {
        let mut config = SpringerWrapper::new("key").config;
        config.collection = "openaccess".to_string();
        let raw: Value = serde_json::json!({
            "result": [{"total": "1"}],
            "records": [{"doi": "10.1/x"}],
        });
        let envelope = normalize_springer(&raw, &config);
        assert_eq!(envelope.records[0].open_access, Some(true));
    }

    #[test]
    fn and_not_is_rejected_when_top_level_is_or() {
        let groups = vec![
            Group::new(vec!["energy".into()], GroupMatch::Or).unwrap(),
            Group::new(vec!["nuclear".into()], GroupMatch::Not).unwrap(),
        ];
        let mut fields = BTreeSet::new();
        fields.insert(Field::All);
        let query = CanonicalQuery {
            search_groups: groups,
            match_: Match::Or,
            fields,
        };
        let wrapper = SpringerWrapper::new("key");
        assert!(wrapper.translate_query(&query).is_err());
    }

    #[test]
    fn pagination_is_one_based() {
        let wrapper = SpringerWrapper::new("key");
        let paged = wrapper.with_paging(21, 20);
        assert_eq!(paged.config().start_at, 21);
        assert_eq!(paged.config().show_num, 20);
    }
}
