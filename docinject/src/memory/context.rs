//! Prompt-ready rendering of history search results.

use serde_json::Value;

use crate::types::MemoryRecord;

/// Episodes included in a context block
const MAX_EPISODES: usize = 3;

/// Render profile entries, the first three episodes and the current query.
///
/// Pure and deterministic. Without any profile or episodic entry the result
/// is exactly `Query: <current_query>`.
pub fn build_context(record: &MemoryRecord, current_query: &str) -> String {
    let mut parts: Vec<String> = Vec::new();

    if !record.profile.is_empty() {
        parts.push("=== USER PREFERENCES ===".to_string());
        parts.extend(record.profile.iter().map(render_entry));
    }

    if !record.episodic.is_empty() {
        parts.push("=== PAST SIMILAR QUERIES ===".to_string());
        parts.extend(
            record
                .episodic
                .iter()
                .take(MAX_EPISODES)
                .enumerate()
                .map(|(i, episode)| format!("Past Query {}: {}", i + 1, render_entry(episode))),
        );
    }

    if parts.is_empty() {
        return format!("Query: {current_query}");
    }

    parts.push("=== CURRENT QUERY ===".to_string());
    parts.push(format!("Current query: {current_query}"));
    parts.push("\nBased on the above context, provide relevant documentation.".to_string());
    parts.join("\n")
}

fn render_entry(entry: &Value) -> String {
    match entry {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
