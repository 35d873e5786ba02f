//! Elsevier Scopus wrapper: a GET-URL translator with a 0-based start
//! offset and a `max_records` ceiling of 25 (spec §6.3).

use crate::canonical::{CanonicalQuery, Field};
use crate::error::Result;
use crate::model::{CountryFacet, Envelope, Facets, Pages, ResultCounts, ResultRecord};
use crate::wrapper::translate::{field_token, plus_join, render_group_plain, url_term, validate_and_not};
use crate::wrapper::{RequestSpec, Wrapper, WrapperConfig};
use reqwest::Method;
use serde_json::Value;
use std::collections::BTreeMap;

/// Elsevier Scopus (`/content/search/scopus`).
#[derive(Debug, Clone)]
pub struct ScopusWrapper {
    config: WrapperConfig,
    api_key: String,
}

impl ScopusWrapper {
    /// the only collection Scopus exposes
    pub const MAX_RECORDS: usize = 25;

    /// Builds a Scopus wrapper bound to `api_key`, with the default field
    /// translation map from spec §4.2/§6.3.
    pub fn new(api_key: impl Into<String>) -> Self {
        let mut fields_translate_map = BTreeMap::new();
        fields_translate_map.insert(Field::All, "ALL".to_string());
        fields_translate_map.insert(Field::Title, "TITLE".to_string());
        fields_translate_map.insert(Field::Abstract, "ABS".to_string());
        fields_translate_map.insert(Field::Keywords, "KEY".to_string());

        let mut allowed_result_formats = BTreeMap::new();
        allowed_result_formats.insert("scopus".to_string(), vec!["json".to_string()]);

        ScopusWrapper {
            config: WrapperConfig {
                endpoint: "https://api.elsevier.com/content/search/scopus".to_string(),
                collection: "scopus".to_string(),
                result_format: "json".to_string(),
                allowed_result_formats,
                max_records: Self::MAX_RECORDS,
                show_num: Self::MAX_RECORDS,
                start_at: 0,
                allowed_search_fields: BTreeMap::new(),
                fields_translate_map,
                max_retries: 3,
                manual_fields: BTreeMap::new(),
            },
            api_key: api_key.into(),
        }
    }

    fn render_field_expr(&self, query: &CanonicalQuery, field: &Field) -> Result<String> {
        let token = field_token(&self.config.fields_translate_map, field)?;
        let rendered: Vec<String> = query
            .search_groups
            .iter()
            .map(|g| render_group_plain(g, url_term))
            .collect();
        // NOT groups render as `NOT (...)`; re-running the join would nest
        // an extra AND/OR between the group's own `NOT` keyword and the
        // following field token, which is exactly what spec scenario 2
        // expects: `ALL((energy))+AND+NOT+ALL((nuclear))`.
        let mut out = String::new();
        let mut first = true;
        for (i, group) in query.search_groups.iter().enumerate() {
            if !first {
                out.push_str(match query.match_ {
                    crate::canonical::Match::And => " AND ",
                    crate::canonical::Match::Or => " OR ",
                });
            }
            first = false;
            let rendered_group = &rendered[i];
            if group.match_ == crate::canonical::GroupMatch::Not {
                // `rendered_group` is `NOT (terms)`; split the keyword from
                // the parenthesized part so only the latter gets field-wrapped.
                let inner = rendered_group.trim_start_matches("NOT ").to_string();
                out.push_str(&format!("NOT {}({})", token, inner));
            } else {
                out.push_str(&format!("{}({})", token, rendered_group));
            }
        }
        Ok(out)
    }

    fn render_expression(&self, query: &CanonicalQuery) -> Result<String> {
        let exprs: Result<Vec<String>> = query
            .fields
            .iter()
            .map(|f| self.render_field_expr(query, f))
            .collect();
        let exprs = exprs?;
        Ok(exprs.join(" OR "))
    }
}

impl Wrapper for ScopusWrapper {
    fn name(&self) -> &'static str {
        "scopus"
    }

    fn config(&self) -> &WrapperConfig {
        &self.config
    }

    fn with_paging(&self, index: usize, show_num: usize) -> Box<dyn Wrapper> {
        // Scopus is 0-based (spec §6.3, design note §9); the orchestrator
        // passes a 1-based index, so the wrapper maps it down by one.
        let zero_based = index.saturating_sub(1);
        Box::new(ScopusWrapper {
            config: self.config.paged(zero_based, show_num),
            api_key: self.api_key.clone(),
        })
    }

    fn translate_query(&self, query: &CanonicalQuery) -> Result<RequestSpec> {
        validate_and_not(query)?;
        let expr = self.render_expression(query)?;
        let encoded = plus_join(&expr);
        let url = format!(
            "{}?start={}&count={}&query={}",
            self.config.endpoint, self.config.start_at, self.config.show_num, encoded
        );
        Ok(RequestSpec {
            method: Method::GET,
            url,
            headers: vec![
                ("X-ELS-APIKey".to_string(), self.api_key.clone()),
                ("Accept".to_string(), "application/json".to_string()),
            ],
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
            .map(|(k, v)| format!("{}({})", k.to_uppercase(), url_term(v)))
            .collect::<Vec<_>>()
            .join("+AND+");
        let url = format!(
            "{}?start={}&count={}&query={}",
            self.config.endpoint, self.config.start_at, self.config.show_num, expr
        );
        Ok(RequestSpec {
            method: Method::GET,
            url,
            headers: vec![("X-ELS-APIKey".to_string(), self.api_key.clone())],
            body: None,
            db_query: expr,
            api_key: self.api_key.clone(),
        })
    }

    fn normalize(&self, raw: &Value) -> Envelope {
        normalize_scopus(raw, &self.config)
    }
}

/// Maps a Scopus `search-results` document into the canonical envelope
/// (spec §4.4). Tolerates missing fields entirely; never panics.
pub fn normalize_scopus(raw: &Value, config: &WrapperConfig) -> Envelope {
    let results = &raw["search-results"];
    let total: i64 = results["opensearch:totalResults"]
        .as_str()
        .and_then(|s| s.parse().ok())
        .unwrap_or(-1);
    let start_index: usize = results["opensearch:startIndex"]
        .as_str()
        .and_then(|s| s.parse().ok())
        .unwrap_or(config.start_at);

    let entries = results["entry"].as_array().cloned().unwrap_or_default();
    let mut countries: CountryFacet = BTreeMap::new();
    let mut records = Vec::with_capacity(entries.len());

    for entry in &entries {
        let pages = entry["prism:pageRange"].as_str().map(|range| {
            let mut split = range.splitn(2, '-');
            Pages {
                first: split.next().filter(|s| !s.is_empty()).map(String::from),
                last: split.next().filter(|s| !s.is_empty()).map(String::from),
            }
        });

        if let Some(country) = entry["affiliation"]
            .as_array()
            .and_then(|affs| affs.first())
            .and_then(|a| a["affiliation-country"].as_str())
        {
            if let Some(iso2) = country_to_iso2(country) {
                *countries.entry(iso2).or_insert(0) += 1;
            }
        }

        let uri = entry["link"]
            .as_array()
            .and_then(|links| links.iter().find(|l| l["@ref"] == "scopus"))
            .and_then(|l| l["@href"].as_str())
            .map(String::from);

        records.push(ResultRecord {
            doi: entry["prism:doi"].as_str().map(String::from),
            content_type: entry["subtypeDescription"].as_str().map(String::from),
            title: entry["dc:title"].as_str().map(String::from),
            authors: entry["dc:creator"]
                .as_str()
                .map(|s| vec![s.to_string()])
                .unwrap_or_default(),
            publication_name: entry["prism:publicationName"].as_str().map(String::from),
            publisher: Some("Elsevier".to_string()),
            publication_date: entry["prism:coverDate"].as_str().map(String::from),
            publication_type: entry["prism:aggregationType"].as_str().map(String::from),
            issn: entry["prism:issn"].as_str().map(String::from),
            volume: entry["prism:volume"].as_str().map(String::from),
            pages: pages.unwrap_or_default(),
            uri,
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
            start: start_index,
            page_length: config.show_num,
            records_displayed,
        },
        records,
        facets: Facets {
            countries,
            keywords,
        },
    }
}

/// Minimal country-name -> ISO-3166-1 alpha-2 lookup for the handful of
/// countries exercised by tests and common affiliations; unknown names
/// fall through to `None` rather than guessing.
pub fn country_to_iso2(name: &str) -> Option<String> {
    let table: &[(&str, &str)] = &[
        ("united states", "US"),
        ("united states of america", "US"),
        ("united kingdom", "GB"),
        ("germany", "DE"),
        ("france", "FR"),
        ("china", "CN"),
        ("japan", "JP"),
        ("netherlands", "NL"),
        ("canada", "CA"),
        ("australia", "AU"),
        ("india", "IN"),
        ("switzerland", "CH"),
        ("italy", "IT"),
        ("spain", "ES"),
        ("sweden", "SE"),
        ("brazil", "BR"),
    ];
    let lower = name.to_lowercase();
    table
        .iter()
        .find(|(n, _)| *n == lower)
        .map(|(_, iso)| iso.to_string())
}
