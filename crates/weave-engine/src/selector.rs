//! Module selection: trigger evaluation, hints, and deterministic ordering.

use weave_core::request::CompositionRequest;
use weave_core::types::{ComplexityTier, ModuleKind};
use weave_modules::predicate::TriggerContext;
use weave_modules::types::PromptModule;
use weave_registry::types::RegistryView;

/// Pick the modules for one request.
///
/// A module is included when its trigger predicate holds against the request
/// context, or when the request names it in the hint list for its kind. The
/// result is ordered behaviors before domains, then ascending priority, then
/// module identity, so equal inputs always render identically regardless of
/// load order.
pub fn select<'a>(
    modules: &'a [PromptModule],
    view: &RegistryView,
    request: &CompositionRequest,
    complexity: ComplexityTier,
) -> Vec<&'a PromptModule> {
    let prompt_lower = request.user_prompt.to_lowercase();
    let tags = view.aggregated_tags();
    let ctx = TriggerContext {
        complexity,
        prompt_lower: &prompt_lower,
        tags: &tags,
        state: &request.session_state,
    };

    let mut selected: Vec<&PromptModule> = modules
        .iter()
        .filter(|module| hinted(module, request) || module.predicate.evaluate(&ctx))
        .collect();

    selected.sort_by(|a, b| {
        (a.kind.rank(), a.priority, a.id.as_str()).cmp(&(b.kind.rank(), b.priority, b.id.as_str()))
    });
    selected
}

/// True when the request explicitly names the module in the hint list for
/// its kind. Hints are additive: they never suppress a triggered module.
fn hinted(module: &PromptModule, request: &CompositionRequest) -> bool {
    let hints = match module.kind {
        ModuleKind::Behavior => &request.behavior_hints,
        ModuleKind::Domain => &request.domain_hints,
    };
    hints.iter().any(|hint| hint == &module.name)
}
