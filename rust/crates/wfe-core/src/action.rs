//! Shared shape for a plugin's reply to a `Run` call, used at the seam
//! between `wfe-plugin` (speaks the wire protocol) and `wfe-exec` (decides
//! what a reply means for the step).

use std::collections::HashMap;

/// Status code plus flattened result map, exactly as the plugin sent them.
///
/// A non-zero `status` is not itself an error here — only the step
/// executor knows whether a `test` expression overrides the status
/// judgement, so this type carries both fields to wherever that decision
/// is made instead of collapsing them into a `Result` at the transport
/// layer.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionReply {
    pub status: i64,
    pub res: HashMap<String, String>,
}
