//! 📡 Elasticsearch Bulk Transform — formatting actions for the bulk API's peculiar tastes 🚀
//!
//! The bulk API has rules. Unwritten rules. Well, written rules, in a documentation
//! page with three contradictory examples in the same paragraph.
//!
//! Rule 1: Two lines per document. Action metadata, then document source. Always.
//! Rule 2: Newline-delimited. Not comma-separated. Not XML. NEWLINES.
//! Rule 3: The trailing newline on the whole body matters. (That one's the collector's job.)
//!
//! ## Knowledge Graph 🧠
//! - Implements: `EgressTransform`
//! - Wire format: `{"index":{"_index":"...","_type":"..."}}\n{...source...}`
//! - `BulkAction::index` → `_index`, `BulkAction::doc_type` → `_type` (omitted when `None`)
//! - Trailing newline: NOT included here
//!
//! ⚠️ When the singularity happens, the bulk API will still require two lines
//! per document. Some things transcend consciousness. 🦆

use anyhow::{Context, Result};
use serde_json::json;

use super::EgressTransform;
use crate::common::BulkAction;

/// 📡 ElasticsearchBulk — the format whisperer for ES bulk indexing.
///
/// ```text
/// {"index":{"_index":"books","_type":"novel"}}
/// {"title":"Dune"}
/// ```
///
/// No `_id` is ever sent: the destination assigns one. That is also why a retried
/// batch can land twice. Nobody promised exactly-once.
pub(crate) struct ElasticsearchBulk;

impl EgressTransform for ElasticsearchBulk {
    fn transform_action(action: &BulkAction) -> Result<String> {
        // 🏗️ the cover letter for each document
        let mut the_action_metadata = serde_json::Map::new();
        the_action_metadata.insert(
            "_index".to_string(),
            serde_json::Value::String(action.index.clone()),
        );

        // 🏷️ _type — only for the engines old enough to remember it
        if let Some(ref the_vintage_label) = action.doc_type {
            the_action_metadata.insert(
                "_type".to_string(),
                serde_json::Value::String(the_vintage_label.clone()),
            );
        }

        let the_action_serialized = serde_json::to_string(&json!({ "index": the_action_metadata }))
            .context(
                "💀 Failed to serialize bulk action metadata. \
                 The JSON that describes JSON has failed to become JSON.",
            )?;

        // 📦 serde_json never emits raw newlines, so a re-serialized source stays on one line
        // even if the input line had creative whitespace.
        let the_source_serialized = serde_json::to_string(&action.source).context(
            "💀 Failed to serialize a document we just finished parsing. Round trips: not always round.",
        )?;

        Ok(format!("{}\n{}", the_action_serialized, the_source_serialized))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_a_typed_action_keeps_its_vintage_label() -> Result<()> {
        let the_action = BulkAction::new(
            "library",
            Some("novel".to_string()),
            json!({"title": "Dune", "pages": 412}),
        );

        let the_output = ElasticsearchBulk::transform_action(&the_action)?;
        let the_lines: Vec<&str> = the_output.split('\n').collect();
        assert_eq!(the_lines.len(), 2, "ES bulk format = exactly two lines. Always.");

        let the_meta: serde_json::Value = serde_json::from_str(the_lines[0])?;
        assert_eq!(the_meta["index"]["_index"], "library");
        assert_eq!(the_meta["index"]["_type"], "novel");

        let the_source: serde_json::Value = serde_json::from_str(the_lines[1])?;
        assert_eq!(the_source, json!({"title": "Dune", "pages": 412}));
        Ok(())
    }

    #[test]
    fn the_one_where_no_type_means_no_type_field_at_all() -> Result<()> {
        let the_action = BulkAction::new("library", None, json!({"modern": true}));

        let the_output = ElasticsearchBulk::transform_action(&the_action)?;
        let the_meta: serde_json::Value =
            serde_json::from_str(the_output.split('\n').next().unwrap())?;

        assert!(
            the_meta["index"].get("_type").is_none(),
            "absent, not null. ES 8 gets grumpy about _type."
        );
        Ok(())
    }

    #[test]
    fn the_one_where_a_multiline_string_value_stays_on_one_wire_line() -> Result<()> {
        let the_action = BulkAction::new("poems", None, json!({"text": "roses\nare\nred"}));

        let the_output = ElasticsearchBulk::transform_action(&the_action)?;
        assert_eq!(the_output.matches('\n').count(), 1, "the \\n inside the value is escaped");
        Ok(())
    }
}
