//! Normalization of the provider's grounding citations.
//!
//! The citation payload attached to a grounded answer is a loosely typed union
//! that evolves independently of this client. Everything here treats every
//! field as optional and fails closed: a record that matches neither the place
//! nor the web shape is dropped, never an error.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A provenance reference attached to a grounded answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Citation {
    Web {
        uri: String,
        title: String,
    },
    Place {
        uri: String,
        title: String,
        review_snippets: Vec<String>,
    },
}

impl Citation {
    #[must_use]
    pub fn uri(&self) -> &str {
        match self {
            Self::Web { uri, .. } | Self::Place { uri, .. } => uri,
        }
    }

    #[must_use]
    pub fn title(&self) -> &str {
        match self {
            Self::Web { title, .. } | Self::Place { title, .. } => title,
        }
    }

    #[must_use]
    pub const fn is_place(&self) -> bool {
        matches!(self, Self::Place { .. })
    }
}

/// Converts raw grounding chunks into renderable citations.
///
/// Place shapes win over web shapes when a record somehow carries both.
/// Input order is preserved and nothing is deduplicated.
#[must_use]
pub fn normalize(raw: &[Value]) -> Vec<Citation> {
    raw.iter().filter_map(classify).collect()
}

fn classify(record: &Value) -> Option<Citation> {
    if let Some(place) = record.get("maps") {
        if let Some((uri, title)) = uri_and_title(place) {
            return Some(Citation::Place {
                uri,
                title,
                review_snippets: review_snippets(place),
            });
        }
    }

    if let Some(web) = record.get("web") {
        if let Some((uri, title)) = uri_and_title(web) {
            return Some(Citation::Web { uri, title });
        }
    }

    tracing::debug!("dropping unrecognized grounding chunk");
    None
}

fn uri_and_title(source: &Value) -> Option<(String, String)> {
    let uri = source.get("uri")?.as_str()?;
    let title = source.get("title")?.as_str()?;
    Some((uri.to_string(), title.to_string()))
}

/// Pulls well-formed review snippet texts out of a place source, verbatim.
/// Malformed entries are omitted rather than truncated or repaired.
fn review_snippets(place: &Value) -> Vec<String> {
    place
        .get("placeAnswerSources")
        .and_then(|sources| sources.get("reviewSnippets"))
        .and_then(Value::as_array)
        .map(|snippets| {
            snippets
                .iter()
                .filter_map(|snippet| snippet.get("reviewText").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn web_chunk(uri: &str, title: &str) -> Value {
        json!({ "web": { "uri": uri, "title": title } })
    }

    fn place_chunk(uri: &str, title: &str) -> Value {
        json!({ "maps": { "uri": uri, "title": title } })
    }

    #[test]
    fn test_unrecognized_records_are_dropped() {
        let raw = vec![json!({ "foo": 1 })];
        assert_eq!(normalize(&raw), vec![]);
    }

    #[test]
    fn test_order_preserved_across_skipped_records() {
        let raw = vec![
            web_chunk("https://a.example", "A"),
            json!({ "unknown": true }),
            place_chunk("https://maps.example/b", "B"),
        ];

        assert_eq!(
            normalize(&raw),
            vec![
                Citation::Web {
                    uri: "https://a.example".into(),
                    title: "A".into(),
                },
                Citation::Place {
                    uri: "https://maps.example/b".into(),
                    title: "B".into(),
                    review_snippets: vec![],
                },
            ]
        );
    }

    #[test]
    fn test_place_missing_title_is_dropped() {
        let raw = vec![json!({ "maps": { "uri": "https://maps.example" } })];
        assert_eq!(normalize(&raw), vec![]);
    }

    #[test]
    fn test_non_string_uri_is_dropped() {
        let raw = vec![json!({ "web": { "uri": 42, "title": "numbers" } })];
        assert_eq!(normalize(&raw), vec![]);
    }

    #[test]
    fn test_place_wins_when_both_shapes_present() {
        let raw = vec![json!({
            "web": { "uri": "https://web.example", "title": "web" },
            "maps": { "uri": "https://maps.example", "title": "place" },
        })];

        let citations = normalize(&raw);
        assert_eq!(citations.len(), 1);
        assert!(citations[0].is_place());
    }

    #[test]
    fn test_review_snippets_preserved_verbatim() {
        let raw = vec![json!({
            "maps": {
                "uri": "https://maps.example",
                "title": "Ramen Ichiro",
                "placeAnswerSources": {
                    "reviewSnippets": [
                        { "reviewText": "Best broth in town  " },
                        { "reviewText": "Queue moves fast" },
                    ]
                }
            }
        })];

        assert_eq!(
            normalize(&raw),
            vec![Citation::Place {
                uri: "https://maps.example".into(),
                title: "Ramen Ichiro".into(),
                review_snippets: vec!["Best broth in town  ".into(), "Queue moves fast".into()],
            }]
        );
    }

    #[test]
    fn test_malformed_snippets_omitted_not_fatal() {
        let raw = vec![json!({
            "maps": {
                "uri": "https://maps.example",
                "title": "Cafe",
                "placeAnswerSources": {
                    "reviewSnippets": [
                        { "reviewText": "Good" },
                        { "somethingElse": true },
                        "not even an object",
                    ]
                }
            }
        })];

        let citations = normalize(&raw);
        assert_eq!(
            citations,
            vec![Citation::Place {
                uri: "https://maps.example".into(),
                title: "Cafe".into(),
                review_snippets: vec!["Good".into()],
            }]
        );
    }

    #[test]
    fn test_snippets_container_wrong_type_is_empty() {
        let raw = vec![json!({
            "maps": {
                "uri": "https://maps.example",
                "title": "Bar",
                "placeAnswerSources": { "reviewSnippets": "oops" }
            }
        })];

        assert_eq!(
            normalize(&raw),
            vec![Citation::Place {
                uri: "https://maps.example".into(),
                title: "Bar".into(),
                review_snippets: vec![],
            }]
        );
    }

    fn arbitrary_json(depth: u32) -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| json!(n)),
            "[a-z]{0,12}".prop_map(Value::String),
        ];
        leaf.prop_recursive(depth, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::hash_map("[a-z]{1,8}", inner, 0..4)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        // Records without a web or maps key can never produce a citation,
        // no matter how they are otherwise shaped.
        #[test]
        fn prop_junk_without_signature_is_dropped(value in arbitrary_json(3)) {
            prop_assume!(value.get("web").is_none() && value.get("maps").is_none());
            prop_assert_eq!(normalize(std::slice::from_ref(&value)), vec![]);
        }

        // Recognized entries come out in input order regardless of what
        // junk is interleaved between them.
        #[test]
        fn prop_recognized_entries_keep_input_order(
            titles in prop::collection::vec("[a-z]{1,8}", 1..6),
            junk in arbitrary_json(2),
        ) {
            prop_assume!(junk.get("web").is_none() && junk.get("maps").is_none());

            let mut raw = Vec::new();
            for title in &titles {
                raw.push(junk.clone());
                raw.push(web_chunk("https://example.com", title));
            }

            let out = normalize(&raw);
            prop_assert_eq!(out.len(), titles.len());
            for (citation, title) in out.iter().zip(&titles) {
                prop_assert_eq!(citation.title(), title.as_str());
            }
        }
    }
}
