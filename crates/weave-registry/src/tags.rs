//! Capability tag inference from discovered tool metadata.

use std::collections::BTreeSet;

use crate::types::ToolDescriptor;

/// Tag applied when no keyword group matches a tool.
pub const FALLBACK_TAG: &str = "general";

/// Keyword groups matched as substrings of lowercased "name description".
const TAG_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "filesystem",
        &["file", "directory", "folder", "path", "read", "write"],
    ),
    ("web", &["http", "api", "web", "fetch", "request", "url"]),
    ("data", &["data", "csv", "analysis", "query", "database", "sql"]),
    ("system", &["system", "process", "command", "shell", "exec"]),
];

/// Infer capability tags for one tool.
///
/// A tool matching no keyword group gets [`FALLBACK_TAG`]. Every tool also
/// contributes its lowercased name, so a predicate can require one exact tool.
pub fn infer_tags(tool: &ToolDescriptor) -> BTreeSet<String> {
    let haystack = format!("{} {}", tool.name, tool.description).to_lowercase();
    let mut tags = BTreeSet::new();
    for (tag, keywords) in TAG_KEYWORDS {
        if keywords.iter().any(|keyword| haystack.contains(keyword)) {
            let _ = tags.insert((*tag).to_string());
        }
    }
    if tags.is_empty() {
        let _ = tags.insert(FALLBACK_TAG.to_string());
    }
    let _ = tags.insert(tool.name.to_lowercase());
    tags
}

/// Union of tags across one server's whole tool listing.
pub fn inventory_tags(tools: &[ToolDescriptor]) -> BTreeSet<String> {
    let mut tags = BTreeSet::new();
    for tool in tools {
        tags.extend(infer_tags(tool));
    }
    tags
}
