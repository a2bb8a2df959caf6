//! JSON bodies exchanged with the suggest endpoint

use crate::gateway::SearchQuery;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Serialize)]
pub(crate) struct SearchRequest<'a> {
    pub query: &'a str,
    pub count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locations: Option<Vec<Location<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<Vec<Filter<'a>>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct Location<'a> {
    pub region_code: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct Filter<'a> {
    pub court_type: KindFilter<'a>,
}

/// A single type is sent as a bare string, several as an array
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(crate) enum KindFilter<'a> {
    One(&'a str),
    Many(&'a [String]),
}

impl<'a> SearchRequest<'a> {
    pub fn new(query: &'a SearchQuery, count: u32) -> Self {
        let locations = query
            .region
            .as_deref()
            .map(|region_code| vec![Location { region_code }]);

        let filters = match query.kinds.as_slice() {
            [] => None,
            [one] => Some(vec![Filter {
                court_type: KindFilter::One(one.as_str()),
            }]),
            many => Some(vec![Filter {
                court_type: KindFilter::Many(many),
            }]),
        };

        Self {
            query: &query.text,
            count,
            locations,
            filters,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SuggestResponse {
    #[serde(default)]
    pub suggestions: Vec<Suggestion>,
}

/// Display strings (`value`, `unrestricted_value`) are ignored; everything
/// kept comes from `data`.
#[derive(Debug, Deserialize)]
pub(crate) struct Suggestion {
    #[serde(default)]
    pub data: Option<Map<String, Value>>,
}
