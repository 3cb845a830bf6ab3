//! Saved-document format.
//!
//! A document is stored as a [`DocumentRecord`]: the token records (tagged
//! `"object_type": "character" | "keyword"`) followed by the equation-level state. Layout
//! output is cached in the glyph records but recomputed on load, so a round trip is exact
//! up to layout.

use crate::document::{Caret, Document};
use crate::error::SerializeError;
use crate::token::{GlyphShape, KeywordKind, Token};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Current record version.
pub const FORMAT_VERSION: u32 = 1;

fn default_version() -> u32 {
    FORMAT_VERSION
}

/// One saved equation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Format version.
    #[serde(default = "default_version")]
    pub version: u32,
    /// Top-left on the page.
    #[serde(default)]
    pub position: (f64, f64),
    /// Top-level font size.
    pub font_size: f64,
    /// A top-level `:=` is present.
    #[serde(default)]
    pub is_assignment: bool,
    /// A program block is present.
    #[serde(default)]
    pub has_program: bool,
    /// Rendered as a table.
    #[serde(default)]
    pub has_table: bool,
    /// Evaluate symbolically.
    #[serde(default)]
    pub force_symbolic: bool,
    /// Text of the spliced result.
    #[serde(default)]
    pub result_string: Option<String>,
    /// Caret index.
    #[serde(default)]
    pub cursor: usize,
    /// Token records.
    pub tokens: Vec<Token>,
}

impl DocumentRecord {
    /// Capture a document.
    pub fn from_document(doc: &Document) -> Self {
        let flags = doc.flags();
        Self {
            version: FORMAT_VERSION,
            position: doc.origin(),
            font_size: doc.font_size(),
            is_assignment: flags.is_assignment,
            has_program: flags.has_program,
            has_table: flags.has_table,
            force_symbolic: flags.force_symbolic,
            result_string: doc.result_string().map(str::to_string),
            cursor: match doc.caret() {
                Caret::Insert(index) => index,
                Caret::Select(selection) => selection.left,
            },
            tokens: doc.tokens().to_vec(),
        }
    }

    /// Build a document, validating the keyword structure.
    pub fn into_document(self) -> Result<Document, SerializeError> {
        let mut doc = Document::new();
        doc.origin = self.position;
        doc.font_size = self.font_size.max(doc.config.min_font_size);
        doc.replace_tokens(self.tokens)?;
        doc.flags.has_table = self.has_table;
        doc.flags.force_symbolic |= self.force_symbolic;
        if doc.flags.has_result {
            doc.result_string = self.result_string;
        }
        doc.set_cursor(self.cursor);
        doc.relayout();
        Ok(doc)
    }
}

/// Reject records naming a token or keyword kind this build does not know, before the
/// typed decode turns them into an opaque JSON error.
fn check_kinds(raw: &Value) -> Result<(), SerializeError> {
    let Some(tokens) = raw.get("tokens").and_then(Value::as_array) else {
        return Ok(());
    };
    for token in tokens {
        let object_type = token.get("object_type").and_then(Value::as_str).unwrap_or("");
        match object_type {
            "keyword" => {
                let kind = token.get("kind").cloned().unwrap_or(Value::Null);
                if serde_json::from_value::<KeywordKind>(kind.clone()).is_err() {
                    return Err(SerializeError::UnknownKind(kind.to_string()));
                }
            }
            "character" => {
                if let Some(shape) = token.get("shape")
                    && serde_json::from_value::<GlyphShape>(shape.clone()).is_err()
                {
                    return Err(SerializeError::UnknownKind(shape.to_string()));
                }
            }
            other => return Err(SerializeError::UnknownKind(other.to_string())),
        }
    }
    Ok(())
}

impl Document {
    /// Saved form of this document.
    pub fn to_record(&self) -> DocumentRecord {
        DocumentRecord::from_document(self)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, SerializeError> {
        Ok(serde_json::to_string_pretty(&self.to_record())?)
    }

    /// Load a document saved with [`Document::to_json`].
    pub fn from_json(json: &str) -> Result<Document, SerializeError> {
        let raw: Value = serde_json::from_str(json)?;
        check_kinds(&raw)?;
        let record: DocumentRecord = serde_json::from_value(raw)?;
        tracing::debug!(
            version = record.version,
            tokens = record.tokens.len(),
            "loading document"
        );
        record.into_document()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::construct::Construct;
    use crate::token::same_structure;

    #[test]
    fn keyword_partner_is_saved_as_match() {
        let mut doc = Document::new();
        doc.insert_construct(Construct::SquareRoot).unwrap();
        let json = doc.to_json().unwrap();
        assert!(json.contains("\"match\""));
        assert!(json.contains("\"object_type\": \"keyword\""));
        assert!(json.contains("\"object_type\": \"character\""));
    }

    #[test]
    fn round_trip_keeps_structure_and_state() {
        let mut doc = Document::new();
        doc.insert_text("x").unwrap();
        doc.insert_char(":").unwrap();
        doc.insert_construct(Construct::Fraction).unwrap();
        let back = Document::from_json(&doc.to_json().unwrap()).unwrap();
        assert!(same_structure(doc.tokens(), back.tokens()));
        assert_eq!(back.flags().is_assignment, doc.flags().is_assignment);
        assert_eq!(back.caret(), doc.caret());
    }

    #[test]
    fn unknown_keyword_kind_is_reported() {
        let json = r#"{"font_size": 12.0, "tokens": [
            {"object_type": "keyword", "kind": "WIDGETSTART", "payload": null, "match": null,
             "cursor_left": 1, "cursor_right": 1, "look_right": false,
             "select_whole": false, "line_is_assignment": false}
        ]}"#;
        assert!(matches!(
            Document::from_json(json),
            Err(SerializeError::UnknownKind(kind)) if kind.contains("WIDGETSTART")
        ));
    }

    #[test]
    fn unbalanced_records_are_rejected() {
        let json = r#"{"font_size": 12.0, "tokens": [
            {"object_type": "keyword", "kind": "DIVIDEEND", "payload": null, "match": null,
             "cursor_left": 1, "cursor_right": 1, "look_right": false,
             "select_whole": false, "line_is_assignment": false}
        ]}"#;
        assert!(matches!(
            Document::from_json(json),
            Err(SerializeError::Unbalanced(_))
        ));
    }
}
