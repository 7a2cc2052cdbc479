use crate::token_limits::{ModelSpec, resolve_context_window};

/// Codex/OpenAI model families and their context windows
const MODEL_SPECS: &[ModelSpec] = &[
    // GPT-5.2 series
    ModelSpec::new("gpt-5.2", 400_000),
    // GPT-5.1 series
    ModelSpec::new("gpt-5.1-codex-max", 400_000),
    ModelSpec::new("gpt-5.1-codex-mini", 400_000),
    ModelSpec::new("gpt-5.1-codex", 400_000),
    ModelSpec::new("gpt-5.1", 400_000),
    // GPT-5 series
    ModelSpec::new("gpt-5-codex-mini", 400_000),
    ModelSpec::new("gpt-5-codex", 400_000),
    ModelSpec::new("gpt-5", 400_000),
    // Reasoning models
    ModelSpec::new("codex-mini", 200_000),
    ModelSpec::new("o4-mini", 200_000),
    ModelSpec::new("o3", 200_000),
];

pub fn context_window(model: &str) -> Option<u64> {
    resolve_context_window(MODEL_SPECS, model)
}
