//! 🔄 Transforms — turning `BulkAction`s into whatever the destination wants on the wire.
//!
//! 🎬 *[a batch of five thousand actions approaches the HTTP layer]*
//! *["you can't come in dressed like that," says the bulk API]*
//! *[the transform hands each one a two-line NDJSON suit. they are let in.]*
//!
//! 🧠 Knowledge graph:
//! - `EgressTransform`: one `BulkAction` → its wire lines, no trailing newline
//! - `render_bulk_body`: the collector; joins the lines and adds the one trailing
//!   `\n` per item that `_bulk` will reject the whole request without
//! - Used by: `sink::BulkSink`, once per batch, before the first attempt.
//!   Retries reuse the rendered body. We don't re-serialize 5000 docs to say "please" again.
//!
//! 🦆

use anyhow::Result;

use crate::common::BulkAction;

pub(crate) mod elasticsearch;

pub(crate) use elasticsearch::ElasticsearchBulk;

/// 📤 Format one action for the destination.
pub(crate) trait EgressTransform {
    fn transform_action(action: &BulkAction) -> Result<String>;
}

/// 📦 Render a whole batch as one request body. Every item gets exactly one trailing `\n`,
/// including the last. An empty batch renders as an empty body.
pub(crate) fn render_bulk_body<T: EgressTransform>(actions: &[BulkAction]) -> Result<String> {
    let mut body = String::new();
    for action in actions {
        body.push_str(&T::transform_action(action)?);
        body.push('\n');
    }
    Ok(body)
}
