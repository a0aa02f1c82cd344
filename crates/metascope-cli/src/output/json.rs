//! JSON output formatting.

use metascope_core::SchemaSnapshot;

/// Format the snapshot as JSON.
///
/// If `compact` is true, outputs minified JSON without whitespace.
pub fn format_json(snapshot: &SchemaSnapshot, compact: bool) -> serde_json::Result<String> {
    if compact {
        serde_json::to_string(snapshot)
    } else {
        serde_json::to_string_pretty(snapshot)
    }
}
