//! LLM-assisted topic grouping: asks the model to name clusters of thread
//! ids, tolerating a leading thinking block and either of two JSON shapes
//! the model might return.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

/// One named group of thread ids the model proposed.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicGroup {
    pub label: String,
    pub thread_ids: Vec<String>,
}

/// A thread id the model called out as connecting two otherwise-separate
/// topics, and which topic it bridges into.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Bridge {
    pub from: String,
    pub to_cluster: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphView {
    pub groups: Vec<TopicGroup>,
    pub bridges: Vec<Bridge>,
}

impl GraphView {
    pub fn empty() -> Self {
        Self::default()
    }
}

#[derive(Debug, Deserialize)]
struct WrappedShape {
    clusters: HashMap<String, Vec<String>>,
    #[serde(default)]
    bridges: Vec<Bridge>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawShape {
    Wrapped(WrappedShape),
    Flat(HashMap<String, Vec<String>>),
}

/// Parse a raw model response into a `GraphView`. Never errors: any
/// malformed or unparsable response degrades to `GraphView::empty()`, with
/// the failure logged rather than propagated — one stage's bad output
/// shouldn't sink the whole ingest cycle.
pub fn parse_response(raw: &str) -> GraphView {
    let stripped = strip_thinking_block(raw);
    let Some(json_str) = extract_outermost_json_object(&stripped) else {
        tracing::warn!("graph_view: no JSON object found in model response");
        return GraphView::empty();
    };

    match serde_json::from_str::<RawShape>(&json_str) {
        Ok(RawShape::Wrapped(w)) => GraphView {
            groups: w
                .clusters
                .into_iter()
                .map(|(label, thread_ids)| TopicGroup { label, thread_ids })
                .collect(),
            bridges: w.bridges,
        },
        Ok(RawShape::Flat(map)) => GraphView {
            groups: map
                .into_iter()
                .map(|(label, thread_ids)| TopicGroup { label, thread_ids })
                .collect(),
            bridges: Vec::new(),
        },
        Err(e) => {
            tracing::warn!("graph_view: failed to parse model response: {e}");
            GraphView::empty()
        }
    }
}

fn strip_thinking_block(raw: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"(?s)<thinking>.*?</thinking>").expect("valid regex")
    });
    re.replace(raw, "").trim().to_string()
}

/// Brace-depth scan for the first balanced `{...}` span. JSON nesting
/// isn't a regular language, so this walks bytes rather than matching a
/// regex.
fn extract_outermost_json_object(s: &str) -> Option<String> {
    let start = s.find('{')?;
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in s[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + ch.len_utf8();
                    return Some(s[start..end].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wrapped_shape() {
        let raw = r#"{"clusters": {"Outage": ["a", "b"]}, "bridges": [{"from": "a", "to_cluster": "Policy"}]}"#;
        let view = parse_response(raw);
        assert_eq!(view.groups.len(), 1);
        assert_eq!(view.groups[0].label, "Outage");
        assert_eq!(
            view.bridges,
            vec![Bridge {
                from: "a".to_string(),
                to_cluster: "Policy".to_string()
            }]
        );
    }

    #[test]
    fn parses_flat_shape() {
        let raw = r#"{"Outage": ["a", "b"], "Policy": ["c"]}"#;
        let view = parse_response(raw);
        assert_eq!(view.groups.len(), 2);
    }

    #[test]
    fn strips_leading_thinking_block() {
        let raw = "<thinking>let me consider this</thinking>\n{\"Outage\": [\"a\"]}";
        let view = parse_response(raw);
        assert_eq!(view.groups.len(), 1);
    }

    #[test]
    fn malformed_response_degrades_to_empty() {
        let view = parse_response("not json at all");
        assert_eq!(view, GraphView::empty());
    }

    #[test]
    fn extracts_outermost_object_ignoring_nested_braces() {
        let raw = "prefix noise {\"a\": {\"b\": 1}} trailing noise";
        let extracted = extract_outermost_json_object(raw).unwrap();
        assert_eq!(extracted, "{\"a\": {\"b\": 1}}");
    }
}
