//! Model capability table.
//!
//! A pure lookup from a model identifier to the feature flags that decide
//! request shape and history handling. No state, no errors: every string
//! maps to some set of flags.

const SEARCH_MODEL_PATTERN: &str = "-search";
const O1_PREFIX: &str = "o1";
const O1_PRO_PATTERN: &str = "o1-pro";
const GPT5_PATTERN: &str = "gpt-5";

/// Feature flags derived from a model identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelCapabilities {
    /// Whether `temperature` / `top_p` may be sent on the classic shape.
    pub supports_temperature: bool,
    pub supports_streaming: bool,
    /// Use the alternate (responses) envelope instead of chat completions.
    pub uses_alternate_api: bool,
    /// Skip the anchor system turn when serializing history.
    pub omit_first_system_message: bool,
}

/// Resolve the capability flags for `model`.
pub fn capabilities_for(model: &str) -> ModelCapabilities {
    let is_o1_pro = model.contains(O1_PRO_PATTERN);
    ModelCapabilities {
        supports_temperature: !model.contains(SEARCH_MODEL_PATTERN),
        supports_streaming: !is_o1_pro,
        uses_alternate_api: is_o1_pro || model.contains(GPT5_PATTERN),
        omit_first_system_message: model.starts_with(O1_PREFIX) && !is_o1_pro,
    }
}
