use crate::token_limits::{ModelSpec, resolve_context_window};

/// Claude model families and their context windows
const MODEL_SPECS: &[ModelSpec] = &[
    // Claude 4.5 series
    ModelSpec::new("claude-sonnet-4-5", 200_000),
    ModelSpec::new("claude-haiku-4-5", 200_000),
    ModelSpec::new("claude-opus-4-5", 200_000),
    // Claude 4 series
    ModelSpec::new("claude-sonnet-4", 200_000),
    ModelSpec::new("claude-opus-4", 200_000),
    // Claude 3.x
    ModelSpec::new("claude-3-7", 200_000),
    ModelSpec::new("claude-3-5", 200_000),
    ModelSpec::new("claude-3", 200_000),
];

pub fn context_window(model: &str) -> Option<u64> {
    resolve_context_window(MODEL_SPECS, model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_no_duplicate_prefixes() {
        let unique: HashSet<&str> = MODEL_SPECS.iter().map(|s| s.prefix).collect();
        assert_eq!(unique.len(), MODEL_SPECS.len());
    }

    #[test]
    fn test_dated_variants_resolve() {
        assert_eq!(context_window("claude-sonnet-4-5-20250929"), Some(200_000));
        assert_eq!(context_window("claude-3-5-sonnet-20241022"), Some(200_000));
        assert_eq!(context_window("<synthetic>"), None);
    }
}
