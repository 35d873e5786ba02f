//! Elsevier ScienceDirect wrapper: a PUT-body translator. Unlike Scopus and
//! Springer it embeds its query as a JSON `qs` field rather than as URL
//! query-string fragments (spec §4.2/§6.3).

use crate::canonical::{CanonicalQuery, Field, GroupMatch, Match};
use crate::error::Result;
use crate::model::{CountryFacet, Envelope, Facets, Pages, ResultCounts, ResultRecord};
use crate::wrapper::translate::{plain_term, validate_and_not};
use crate::wrapper::{RequestSpec, Wrapper, WrapperConfig};
use reqwest::Method;
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Elsevier ScienceDirect (`/content/search/sciencedirect`).
#[derive(Debug, Clone)]
pub struct ScienceDirectWrapper {
    config: WrapperConfig,
    api_key: String,
}

impl ScienceDirectWrapper {
    /// ScienceDirect's per-call record ceiling
    pub const MAX_RECORDS: usize = 100;

    /// Builds a ScienceDirect wrapper bound to `api_key` (spec §4.2/§6.3).
    pub fn new(api_key: impl Into<String>) -> Self {
        let mut fields_translate_map = BTreeMap::new();
        fields_translate_map.insert(Field::All, "qs".to_string());
        fields_translate_map.insert(Field::Title, "title".to_string());
        fields_translate_map.insert(Field::Abstract, "abs".to_string());
        fields_translate_map.insert(Field::Keywords, "keywords".to_string());

        let mut allowed_result_formats = BTreeMap::new();
        allowed_result_formats.insert("sciencedirect".to_string(), vec!["json".to_string()]);

        ScienceDirectWrapper {
            config: WrapperConfig {
                endpoint: "https://api.elsevier.com/content/search/sciencedirect".to_string(),
                collection: "sciencedirect".to_string(),
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

    /// Renders one group into the plain (unencoded) boolean syntax the JSON
    /// body expects, e.g. `(energy)` or `NOT (nuclear)`.
    fn render_group(group: &crate::canonical::Group) -> String {
        let terms: Vec<String> = group.search_terms.iter().map(|t| plain_term(t)).collect();
        match group.match_ {
            GroupMatch::And => format!("({})", terms.join(" AND ")),
            GroupMatch::Or => format!("({})", terms.join(" OR ")),
            GroupMatch::Not => format!("NOT ({})", terms.join(" OR ")),
        }
    }

    /// Builds the JSON body's field -> expression map (spec §4.2's
    /// PUT-body translator shape, one key per canonical field).
    fn build_body_fields(&self, query: &CanonicalQuery) -> Result<BTreeMap<String, String>> {
        let connector = match query.match_ {
            Match::And => " AND ",
            Match::Or => " OR ",
        };
        let mut out = BTreeMap::new();
        for field in &query.fields {
            let token = self
                .config
                .fields_translate_map
                .get(field)
                .ok_or_else(|| crate::error::ErrorKind::BadQuery {
                    msg: format!("field `{:?}` has no native translation", field),
                })?;
            let rendered: Vec<String> = query.search_groups.iter().map(Self::render_group).collect();
            out.insert(token.clone(), rendered.join(connector));
        }
        Ok(out)
    }
}

impl Wrapper for ScienceDirectWrapper {
    fn name(&self) -> &'static str {
        "sciencedirect"
    }

    fn config(&self) -> &WrapperConfig {
        &self.config
    }

    fn with_paging(&self, index: usize, show_num: usize) -> Box<dyn Wrapper> {
        // ScienceDirect uses 1-based offsets, unlike Scopus (design note §9).
        Box::new(ScienceDirectWrapper {
            config: self.config.paged(index, show_num),
            api_key: self.api_key.clone(),
        })
    }

    fn translate_query(&self, query: &CanonicalQuery) -> Result<RequestSpec> {
        validate_and_not(query)?;
        let fields = self.build_body_fields(query)?;
        let mut body = serde_json::Map::new();
        for (field, expr) in &fields {
            body.insert(field.clone(), json!(expr));
        }
        body.insert("display".to_string(), json!({ "offset": self.config.start_at, "show": self.config.show_num }));
        let db_query = fields.values().cloned().collect::<Vec<_>>().join(" ; ");
        Ok(RequestSpec {
            method: Method::PUT,
            url: self.config.endpoint.clone(),
            headers: vec![
                ("X-ELS-APIKey".to_string(), self.api_key.clone()),
                ("Content-Type".to_string(), "application/json".to_string()),
            ],
            body: Some(Value::Object(body)),
            db_query,
            api_key: self.api_key.clone(),
        })
    }

    fn build_query(&self) -> Result<RequestSpec> {
        let mut body = serde_json::Map::new();
        for (k, v) in &self.config.manual_fields {
            body.insert(k.clone(), json!(plain_term(v)));
        }
        body.insert("display".to_string(), json!({ "offset": self.config.start_at, "show": self.config.show_num }));
        let db_query = self.config.manual_fields.values().cloned().collect::<Vec<_>>().join(" ; ");
        Ok(RequestSpec {
            method: Method::PUT,
            url: self.config.endpoint.clone(),
            headers: vec![("X-ELS-APIKey".to_string(), self.api_key.clone())],
            body: Some(Value::Object(body)),
            db_query,
            api_key: self.api_key.clone(),
        })
    }

    fn normalize(&self, raw: &Value) -> Envelope {
        normalize_sciencedirect(raw, &self.config)
    }
}

/// Maps a ScienceDirect `results` document into the canonical envelope
/// (spec §4.4). Unlike Scopus, ScienceDirect's JSON already uses most
/// canonical field names directly; only `resultsFound`, the top-level
/// `results` array, `authors[].name` and `sourceTitle` need translating
/// (grounded in `elsevier_wrapper.py`'s `format_response`,
/// `search/sciencedirect` branch).
pub fn normalize_sciencedirect(raw: &Value, config: &WrapperConfig) -> Envelope {
    let total: i64 = raw["resultsFound"].as_i64().unwrap_or(-1);

    let entries = raw["results"].as_array().cloned().unwrap_or_default();
    let countries: CountryFacet = BTreeMap::new();
    let mut records = Vec::with_capacity(entries.len());

    for entry in &entries {
        let authors = entry["authors"]
            .as_array()
            .map(|arr| arr.iter().filter_map(|a| a["name"].as_str().map(String::from)).collect())
            .unwrap_or_default();

        records.push(ResultRecord {
            doi: entry["doi"].as_str().map(String::from),
            content_type: entry["contentType"].as_str().map(String::from),
            title: entry["title"].as_str().map(String::from),
            authors,
            publication_name: entry["sourceTitle"].as_str().map(String::from),
            publisher: Some("ScienceDirect".to_string()),
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
                first: entry["pages"]["first"].as_str().map(String::from),
                last: entry["pages"]["last"].as_str().map(String::from),
            },
            journal_id: entry["journalId"].as_str().map(String::from),
            copyright: entry["copyright"].as_str().map(String::from),
            abstract_: entry["abstract"].as_str().map(String::from),
            uri: entry["uri"].as_str().map(String::from),
            open_access: entry["openAccess"].as_bool(),
            ..Default::default()
        });
    }

    let records_displayed = records.len();
    let keywords = crate::keywords::from_titles(records.iter().filter_map(|r| r.title.as_deref()));
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
        facets: Facets { countries, keywords },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::{CanonicalQuery, Group};
    use std::collections::BTreeSet;

    #[test]
    fn translate_builds_put_body_with_display_window() {
        let wrapper = ScienceDirectWrapper::new("key");
        let groups = vec![Group::new(vec!["graphene".into()], GroupMatch::And).unwrap()];
        let mut fields = BTreeSet::new();
        fields.insert(Field::All);
        let query = CanonicalQuery::new(groups, Match::And, fields).unwrap();

        let spec = wrapper.translate_query(&query).unwrap();
        assert_eq!(spec.method, Method::PUT);
        let body = spec.body.unwrap();
        assert_eq!(body["qs"], json!("(graphene)"));
        assert_eq!(body["display"]["offset"], json!(1));
    }

    #[test]
    fn and_not_rendering_keeps_not_prefix_outside_parens() {
        let wrapper = ScienceDirectWrapper::new("key");
        let groups = vec![
            Group::new(vec!["energy".into()], GroupMatch::Or).unwrap(),
            Group::new(vec!["nuclear".into()], GroupMatch::Not).unwrap(),
        ];
        let mut fields = BTreeSet::new();
        fields.insert(Field::All);
        let query = CanonicalQuery::new(groups, Match::And, fields).unwrap();

        let spec = wrapper.translate_query(&query).unwrap();
        let body = spec.body.unwrap();
        assert_eq!(body["qs"], json!("(energy) AND NOT (nuclear)"));
    }

    #[test]
    fn pagination_is_one_based() {
        let wrapper = ScienceDirectWrapper::new("key");
        let paged = wrapper.with_paging(11, 10);
        assert_eq!(paged.config().start_at, 11);
    }

    #[test]
    fn normalize_reads_top_level_results_found_and_results() {
        let config = ScienceDirectWrapper::new("key").config;
        let raw = json!({
            "resultsFound": 2,
            "results": [{
                "doi": "10.1/graphene",
                "title": "Graphene synthesis",
                "sourceTitle": "Carbon Journal",
                "authors": [{"name": "A. Author"}, {"name": "B. Author"}],
                "openAccess": true,
            }],
        });

        let envelope = normalize_sciencedirect(&raw, &config);
        assert_eq!(envelope.result.total, 2);
        assert_eq!(envelope.records.len(), 1);
        let record = &envelope.records[0];
        assert_eq!(record.doi.as_deref(), Some("10.1/graphene"));
        assert_eq!(record.publication_name.as_deref(), Some("Carbon Journal"));
        assert_eq!(record.publisher.as_deref(), Some("ScienceDirect"));
        assert_eq!(record.authors, vec!["A. Author".to_string(), "B. Author".to_string()]);
        assert_eq!(record.open_access, Some(true));
    }

    #[test]
    fn normalize_falls_back_to_title_derived_keywords() {
        let config = ScienceDirectWrapper::new("key").config;
        let raw = json!({
            "resultsFound": 2,
            "results": [
                {"title": "Graphene synthesis methods"},
                {"title": "Graphene applications overview"},
            ],
        });

        let envelope = normalize_sciencedirect(&raw, &config);
        let graphene = envelope.facets.keywords.iter().find(|k| k.text == "graphene").unwrap();
        assert_eq!(graphene.value, 2);
    }
}
