//! YouTube `json3` caption parsing.

use serde::Deserialize;
use vessay_models::CaptionEvent;

use crate::error::MediaResult;

#[derive(Debug, Deserialize)]
struct Json3Document {
    #[serde(default)]
    events: Vec<Json3Event>,
}

#[derive(Debug, Deserialize)]
struct Json3Event {
    #[serde(rename = "tStartMs", default)]
    start_ms: u64,
    #[serde(rename = "aAppend", default)]
    append: Option<u8>,
    #[serde(default)]
    segs: Vec<Json3Segment>,
}

#[derive(Debug, Deserialize)]
struct Json3Segment {
    #[serde(default)]
    utf8: String,
}

/// Parse a `json3` caption document into caption events.
///
/// Events flagged `aAppend` repeat text from the rolling caption window and
/// are dropped, as are events with no visible text.
pub fn parse_json3(json: &str) -> MediaResult<Vec<CaptionEvent>> {
    let doc: Json3Document = serde_json::from_str(json)?;

    Ok(doc
        .events
        .into_iter()
        .filter(|e| e.append.unwrap_or(0) == 0)
        .filter_map(|e| {
            let text: String = e.segs.iter().map(|s| s.utf8.as_str()).collect();
            let text = text.trim();
            (!text.is_empty()).then(|| CaptionEvent {
                start_ms: e.start_ms,
                text: text.to_string(),
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json3_skips_append_and_blank_events() {
        let json = r#"{
            "events": [
                {"tStartMs": 0, "dDurationMs": 4000},
                {"tStartMs": 120, "segs": [{"utf8": "hello"}, {"utf8": " world"}]},
                {"tStartMs": 2000, "aAppend": 1, "segs": [{"utf8": "\n"}]},
                {"tStartMs": 2100, "segs": [{"utf8": "\n"}]},
                {"tStartMs": 4000, "segs": [{"utf8": "second line"}]}
            ]
        }"#;

        let events = parse_json3(json).unwrap();
        assert_eq!(
            events,
            vec![
                CaptionEvent { start_ms: 120, text: "hello world".into() },
                CaptionEvent { start_ms: 4000, text: "second line".into() },
            ]
        );
    }

    #[test]
    fn test_parse_json3_rejects_invalid_document() {
        assert!(parse_json3("not json").is_err());
        assert!(parse_json3("{}").unwrap().is_empty());
    }
}
