//! Deterministic prompt rendering.

use weave_modules::types::PromptModule;

/// Render the final system prompt from the selected modules.
///
/// Bodies are included verbatim apart from trailing-whitespace trimming and
/// joined by one blank line, in selection order. No headers or separators
/// are invented, so the output is byte-stable for equal selections.
pub fn render(modules: &[&PromptModule]) -> String {
    modules
        .iter()
        .map(|module| module.body.trim_end())
        .collect::<Vec<_>>()
        .join("\n\n")
}
