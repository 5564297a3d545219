//! Citation Extraction
//!
//! Turns the model's reply to a citation request into a record, falling
//! back to the raw reply when it is not the expected JSON object.

use serde::{Deserialize, Serialize};
use tracing::debug;

const MISSING: &str = "N/A";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Citation {
    Structured {
        title: Option<String>,
        author: Option<String>,
        date: Option<String>,
        url: Option<String>,
    },
    Raw {
        raw: String,
        url: String,
    },
}

/// Fields the model is asked to return. Values are kept loose because
/// models sometimes answer with numbers or lists.
#[derive(Debug, Deserialize)]
struct CitationFields {
    #[serde(default)]
    title: Option<serde_json::Value>,
    #[serde(default)]
    author: Option<serde_json::Value>,
    #[serde(default)]
    date: Option<serde_json::Value>,
    #[serde(default)]
    url: Option<serde_json::Value>,
}

/// Parse a model reply into a citation.
///
/// The JSON object between the first `{` and the last `}` is used, which
/// tolerates code fences around the reply. Anything else yields
/// `Citation::Raw` carrying the reply verbatim and the page URL, as does
/// an object with none of title, author or date.
pub fn parse_citation(response: &str, page_url: &str) -> Citation {
    let fallback = || Citation::Raw {
        raw: response.to_string(),
        url: page_url.to_string(),
    };

    let (Some(start), Some(end)) = (response.find('{'), response.rfind('}')) else {
        debug!("No JSON object in citation reply");
        return fallback();
    };
    if end < start {
        return fallback();
    }

    match serde_json::from_str::<CitationFields>(&response[start..=end]) {
        Ok(fields) => {
            let title = field_text(fields.title);
            let author = field_text(fields.author);
            let date = field_text(fields.date);
            if title.is_none() && author.is_none() && date.is_none() {
                debug!("Citation object has no title, author or date");
                return fallback();
            }
            let url = field_text(fields.url).or_else(|| {
                (!page_url.is_empty()).then(|| page_url.to_string())
            });
            Citation::Structured {
                title,
                author,
                date,
                url,
            }
        }
        Err(e) => {
            debug!("Citation reply is not a citation object: {}", e);
            fallback()
        }
    }
}

fn field_text(value: Option<serde_json::Value>) -> Option<String> {
    let text = match value? {
        serde_json::Value::Null => return None,
        serde_json::Value::String(s) => s,
        serde_json::Value::Array(items) => items
            .iter()
            .map(|v| match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    };
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Render a citation for display
pub fn format_citation(citation: &Citation) -> String {
    match citation {
        Citation::Raw { raw, .. } => raw.clone(),
        Citation::Structured {
            title,
            author,
            date,
            url,
        } => format!(
            "Title: {}\nAuthor: {}\nDate: {}\nURL: {}",
            title.as_deref().unwrap_or(MISSING),
            author.as_deref().unwrap_or(MISSING),
            date.as_deref().unwrap_or(MISSING),
            url.as_deref().unwrap_or(MISSING),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "https://x.test/article";

    #[test]
    fn test_parse_structured() {
        let reply = r#"{"title":"On Rust","author":"Ferris","date":"2024-05-01","url":"https://rust.test"}"#;
        let c = parse_citation(reply, PAGE);
        assert_eq!(
            format_citation(&c),
            "Title: On Rust\nAuthor: Ferris\nDate: 2024-05-01\nURL: https://rust.test"
        );
    }

    #[test]
    fn test_parse_fenced_json() {
        let reply = "```json\n{\"title\": \"Fenced\", \"author\": \"A. Writer\"}\n```";
        match parse_citation(reply, PAGE) {
            Citation::Structured { title, url, date, .. } => {
                assert_eq!(title.as_deref(), Some("Fenced"));
                assert_eq!(date, None);
                assert_eq!(url.as_deref(), Some(PAGE));
            }
            other => panic!("expected structured citation, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_fields_render_na() {
        let c = parse_citation(r#"{"title":"Only title","author":null,"date":""}"#, "");
        assert_eq!(
            format_citation(&c),
            "Title: Only title\nAuthor: N/A\nDate: N/A\nURL: N/A"
        );
    }

    #[test]
    fn test_list_author_is_joined() {
        let c = parse_citation(r#"{"author":["Ada","Grace"],"date":1843}"#, PAGE);
        match c {
            Citation::Structured { author, date, .. } => {
                assert_eq!(author.as_deref(), Some("Ada, Grace"));
                assert_eq!(date.as_deref(), Some("1843"));
            }
            other => panic!("expected structured citation, got {:?}", other),
        }
    }

    #[test]
    fn test_unparseable_reply_falls_back_to_raw() {
        let reply = "I could not find a title, sorry.";
        let c = parse_citation(reply, PAGE);
        assert_eq!(
            c,
            Citation::Raw {
                raw: reply.to_string(),
                url: PAGE.to_string()
            }
        );
        assert_eq!(format_citation(&c), reply);
    }

    #[test]
    fn test_broken_json_falls_back_to_raw() {
        let reply = "{title: unquoted}";
        let c = parse_citation(reply, PAGE);
        assert!(matches!(c, Citation::Raw { .. }));
        assert_eq!(format_citation(&c), reply);
    }

    #[test]
    fn test_object_without_citation_fields_falls_back() {
        for reply in ["Nothing found {}", r#"{"foo":1}"#, r#"{"url":"https://only.test"}"#] {
            let c = parse_citation(reply, PAGE);
            assert!(matches!(c, Citation::Raw { .. }), "{reply} should fall back");
            assert_eq!(format_citation(&c), reply);
        }
    }

    #[test]
    fn test_reversed_braces_fall_back() {
        let c = parse_citation("} nope {", PAGE);
        assert!(matches!(c, Citation::Raw { .. }));
    }
}
