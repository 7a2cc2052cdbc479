use crate::claude::models as claude_models;
use crate::codex::models as codex_models;
use crate::token_limits::{ModelSpec, resolve_context_window};

/// Models OpenCode commonly routes to beyond the Claude and OpenAI families
const MODEL_SPECS: &[ModelSpec] = &[
    ModelSpec::new("gemini-2.5-pro", 1_048_576),
    ModelSpec::new("gemini-2.5-flash", 1_048_576),
    ModelSpec::new("qwen3-coder", 262_144),
    ModelSpec::new("kimi-k2", 131_072),
    ModelSpec::new("glm-4.6", 200_000),
    ModelSpec::new("grok-code-fast", 256_000),
];

pub fn context_window(model: &str) -> Option<u64> {
    claude_models::context_window(model)
        .or_else(|| codex_models::context_window(model))
        .or_else(|| resolve_context_window(MODEL_SPECS, model))
}
