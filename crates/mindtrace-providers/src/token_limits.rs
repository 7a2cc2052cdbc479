// Model tables live next to each provider (claude/models.rs, codex/models.rs,
// opencode/models.rs); this module only owns the resolution rule.

/// Context window for every model whose name starts with `prefix`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelSpec {
    pub prefix: &'static str,
    pub context_window: u64,
}

impl ModelSpec {
    pub const fn new(prefix: &'static str, context_window: u64) -> Self {
        Self {
            prefix,
            context_window,
        }
    }
}

/// Resolve a model's context window by longest prefix match
///
/// Dated variants ("claude-sonnet-4-5-20250929") resolve through their family
/// prefix; unknown models return `None` rather than a guess.
pub fn resolve_context_window(specs: &[ModelSpec], model: &str) -> Option<u64> {
    let model = model.trim();
    // OpenCode reports "provider/model"
    let model = model.rsplit('/').next().unwrap_or(model);

    specs
        .iter()
        .filter(|spec| model.starts_with(spec.prefix))
        .max_by_key(|spec| spec.prefix.len())
        .map(|spec| spec.context_window)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPECS: &[ModelSpec] = &[
        ModelSpec::new("gpt-5", 400_000),
        ModelSpec::new("gpt-5.1-codex-mini", 200_000),
        ModelSpec::new("claude-3", 100_000),
    ];

    #[test]
    fn test_longest_prefix_wins() {
        assert_eq!(resolve_context_window(SPECS, "gpt-5.1-codex-mini-2025"), Some(200_000));
        assert_eq!(resolve_context_window(SPECS, "gpt-5.1-codex"), Some(400_000));
    }

    #[test]
    fn test_provider_qualified_name() {
        assert_eq!(resolve_context_window(SPECS, "anthropic/claude-3-haiku"), Some(100_000));
    }

    #[test]
    fn test_unknown_model() {
        assert_eq!(resolve_context_window(SPECS, "llama-3"), None);
        assert_eq!(resolve_context_window(SPECS, ""), None);
    }
}
