//! Stream delta records.
//!
//! A generation stream pushes `{ "type": ..., "content": ... }` records. The
//! raw [`DeltaEvent`] is what travels on the wire; [`Delta`] is the typed form
//! the ingestion engine folds into an artifact.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DeltaError;
use crate::id::DocumentId;
use crate::kind::ArtifactKind;
use crate::suggestion::Suggestion;

/// Wire record of one stream update.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeltaEvent {
    #[serde(rename = "type")]
    pub delta_type: String,
    #[serde(default)]
    pub content: Value,
}

impl DeltaEvent {
    pub fn new(delta_type: impl Into<String>, content: Value) -> Self {
        Self {
            delta_type: delta_type.into(),
            content,
        }
    }

    /// A record with a string payload.
    pub fn text(delta_type: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(delta_type, Value::String(content.into()))
    }

    pub fn id(id: impl Into<String>) -> Self {
        Self::text("id", id)
    }

    pub fn title(title: impl Into<String>) -> Self {
        Self::text("title", title)
    }

    pub fn kind(kind: ArtifactKind) -> Self {
        Self::text("kind", kind.as_str())
    }

    pub fn text_delta(content: impl Into<String>) -> Self {
        Self::text("text-delta", content)
    }

    pub fn clear() -> Self {
        Self::text("clear", "")
    }

    pub fn finish() -> Self {
        Self::new("finish", Value::Null)
    }

    pub fn suggestion(suggestion: &Suggestion) -> Result<Self, DeltaError> {
        Ok(Self::new("suggestion", serde_json::to_value(suggestion)?))
    }

    /// Decode one newline-delimited JSON record.
    pub fn from_json_line(line: &str) -> Result<Self, DeltaError> {
        Ok(serde_json::from_str(line)?)
    }
}

/// Typed form of a [`DeltaEvent`].
#[derive(Clone, Debug, PartialEq)]
pub enum Delta {
    Id(DocumentId),
    Title(String),
    Kind(ArtifactKind),
    /// A content-bearing delta (`text-delta`, `code-delta`, ...). Carries the
    /// full content so far, which replaces the artifact content.
    Content { source: ArtifactKind, text: String },
    Clear,
    Finish,
    Suggestion(Suggestion),
    /// A type this engine does not know. Applying it is a no-op.
    Unknown(String),
}

impl Delta {
    /// Interpret a wire record.
    ///
    /// Unknown types are not an error; malformed payloads of known types are.
    pub fn parse(event: &DeltaEvent) -> Result<Self, DeltaError> {
        let delta_type = event.delta_type.as_str();
        let delta = match delta_type {
            "id" => Delta::Id(DocumentId::new(expect_text(event)?)),
            "title" => Delta::Title(expect_text(event)?.to_string()),
            "kind" => Delta::Kind(expect_text(event)?.parse()?),
            "text-delta" => content(ArtifactKind::Text, event)?,
            "code-delta" => content(ArtifactKind::Code, event)?,
            "sheet-delta" => content(ArtifactKind::Sheet, event)?,
            "image-delta" => content(ArtifactKind::Image, event)?,
            "clear" => Delta::Clear,
            "finish" => Delta::Finish,
            "suggestion" => Delta::Suggestion(
                serde_json::from_value(event.content.clone())
                    .map_err(|e| DeltaError::InvalidSuggestion(e.to_string()))?,
            ),
            other => Delta::Unknown(other.to_string()),
        };
        Ok(delta)
    }

    pub fn is_content(&self) -> bool {
        matches!(self, Delta::Content { .. })
    }
}

fn expect_text(event: &DeltaEvent) -> Result<&str, DeltaError> {
    event
        .content
        .as_str()
        .ok_or_else(|| DeltaError::expected_text(&event.delta_type))
}

fn content(source: ArtifactKind, event: &DeltaEvent) -> Result<Delta, DeltaError> {
    Ok(Delta::Content {
        source,
        text: expect_text(event)?.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_known_types() {
        assert_eq!(
            Delta::parse(&DeltaEvent::id("doc1")).unwrap(),
            Delta::Id(DocumentId::new("doc1"))
        );
        assert_eq!(
            Delta::parse(&DeltaEvent::kind(ArtifactKind::Code)).unwrap(),
            Delta::Kind(ArtifactKind::Code)
        );
        assert_eq!(Delta::parse(&DeltaEvent::finish()).unwrap(), Delta::Finish);
        assert_eq!(Delta::parse(&DeltaEvent::clear()).unwrap(), Delta::Clear);
    }

    #[test]
    fn test_parse_content_deltas() {
        let delta = Delta::parse(&DeltaEvent::text("sheet-delta", "a,b\n1,2")).unwrap();
        assert_eq!(
            delta,
            Delta::Content {
                source: ArtifactKind::Sheet,
                text: "a,b\n1,2".into()
            }
        );
        assert!(delta.is_content());
    }

    #[test]
    fn test_unknown_type_is_not_an_error() {
        let delta = Delta::parse(&DeltaEvent::text("data-usage", "42")).unwrap();
        assert_eq!(delta, Delta::Unknown("data-usage".into()));
    }

    #[test]
    fn test_non_string_payload_is_malformed() {
        let err = Delta::parse(&DeltaEvent::new("title", json!(42))).unwrap_err();
        assert!(matches!(err, DeltaError::ExpectedText { .. }));
    }

    #[test]
    fn test_suggestion_payload() {
        let event = DeltaEvent::new(
            "suggestion",
            json!({"id": "s1", "originalText": "a", "suggestedText": "b", "description": ""}),
        );
        match Delta::parse(&event).unwrap() {
            Delta::Suggestion(s) => assert_eq!(s.suggested_text, "b"),
            other => panic!("unexpected delta {other:?}"),
        }

        let bad = DeltaEvent::new("suggestion", json!("not an object"));
        assert!(matches!(
            Delta::parse(&bad),
            Err(DeltaError::InvalidSuggestion(_))
        ));
    }

    #[test]
    fn test_json_line_without_content() {
        let event = DeltaEvent::from_json_line(r#"{"type":"finish"}"#).unwrap();
        assert_eq!(event.delta_type, "finish");
        assert!(event.content.is_null());
    }
}
