//! Model selection: the Claude preference ladder, the rate-limit fallback,
//! and the requested-name normalization used before any listing is consulted.

use super::types::ModelDescriptor;

/// Hard default when the upstream lists nothing at all.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Claude ids in preference order; the first one the upstream lists wins.
const CLAUDE_PREFERENCE: &[&str] = &[
    "claude-sonnet-4",
    "claude-3.7-sonnet",
    "claude-3.5-sonnet",
    "claude-3-sonnet-20240229",
    "claude-3-haiku",
];

/// Pick the best available Claude model from a listing.
pub fn preferred_claude_model(models: &[ModelDescriptor]) -> String {
    for preferred in CLAUDE_PREFERENCE {
        if models.iter().any(|m| m.id == *preferred) {
            return (*preferred).to_string();
        }
    }
    if let Some(claude) = models
        .iter()
        .find(|m| m.id.to_lowercase().contains("claude"))
    {
        return claude.id.clone();
    }
    models
        .first()
        .map(|m| m.id.clone())
        .unwrap_or_else(|| DEFAULT_MODEL.to_string())
}

/// Pick a replacement model after a rate limit. Returns `current` unchanged
/// when the listing offers no GPT alternative; the caller treats that as
/// "no fallback available".
pub fn fallback_model_for_rate_limit(models: &[ModelDescriptor], current: &str) -> String {
    if models.iter().any(|m| m.id == DEFAULT_MODEL) {
        return DEFAULT_MODEL.to_string();
    }
    if let Some(gpt) = models.iter().find(|m| m.id.to_lowercase().contains("gpt")) {
        return gpt.id.clone();
    }
    current.to_string()
}

/// Normalize a caller-requested model name without consulting the listing.
pub fn initial_selection(requested: &str) -> String {
    if requested.starts_with("claude-3.7") {
        "claude-3.7-sonnet".to_string()
    } else if requested.starts_with("claude-3.5") {
        "claude-3.5-sonnet".to_string()
    } else if requested.starts_with("claude") {
        "claude-sonnet-4".to_string()
    } else if requested.starts_with("gpt-4") {
        "gpt-4o".to_string()
    } else if requested.starts_with("gpt-3.5") {
        "gpt-3.5-turbo".to_string()
    } else {
        requested.to_string()
    }
}

/// Whether the caller asked for a Claude variant; only then is the listing
/// consulted for the best available Claude model.
pub fn wants_claude(requested: &str) -> bool {
    requested.starts_with("claude")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(ids: &[&str]) -> Vec<ModelDescriptor> {
        ids.iter()
            .map(|id| ModelDescriptor {
                id: id.to_string(),
                capabilities: None,
            })
            .collect()
    }

    #[test]
    fn test_preferred_claude_follows_ladder() {
        let models = listing(&["gpt-4o", "claude-3.5-sonnet", "claude-sonnet-4"]);
        assert_eq!(preferred_claude_model(&models), "claude-sonnet-4");

        let models = listing(&["gpt-4o", "claude-3-haiku", "claude-3.5-sonnet"]);
        assert_eq!(preferred_claude_model(&models), "claude-3.5-sonnet");
    }

    #[test]
    fn test_preferred_claude_substring_fallback() {
        let models = listing(&["gpt-4o", "Claude-Next-Preview"]);
        assert_eq!(preferred_claude_model(&models), "Claude-Next-Preview");
    }

    #[test]
    fn test_preferred_claude_first_listed_fallback() {
        let models = listing(&["gemini-pro", "gpt-4o"]);
        assert_eq!(preferred_claude_model(&models), "gemini-pro");
    }

    #[test]
    fn test_preferred_claude_empty_listing() {
        assert_eq!(preferred_claude_model(&[]), DEFAULT_MODEL);
    }

    #[test]
    fn test_rate_limit_fallback_prefers_gpt_4o() {
        let models = listing(&["claude-sonnet-4", "gpt-4o", "gpt-3.5-turbo"]);
        assert_eq!(
            fallback_model_for_rate_limit(&models, "claude-sonnet-4"),
            "gpt-4o"
        );
    }

    #[test]
    fn test_rate_limit_fallback_any_gpt() {
        let models = listing(&["claude-sonnet-4", "gpt-3.5-turbo"]);
        assert_eq!(
            fallback_model_for_rate_limit(&models, "claude-sonnet-4"),
            "gpt-3.5-turbo"
        );
    }

    #[test]
    fn test_rate_limit_fallback_keeps_current_without_gpt() {
        let models = listing(&["claude-sonnet-4"]);
        assert_eq!(
            fallback_model_for_rate_limit(&models, "claude-sonnet-4"),
            "claude-sonnet-4"
        );
    }

    #[test]
    fn test_initial_selection_mapping() {
        assert_eq!(initial_selection("claude-3.7-sonnet"), "claude-3.7-sonnet");
        assert_eq!(
            initial_selection("claude-3.5-sonnet-20241022"),
            "claude-3.5-sonnet"
        );
        assert_eq!(initial_selection("claude-opus-4"), "claude-sonnet-4");
        assert_eq!(initial_selection("gpt-4"), "gpt-4o");
        assert_eq!(initial_selection("gpt-4-turbo"), "gpt-4o");
        assert_eq!(initial_selection("gpt-3.5-turbo-0125"), "gpt-3.5-turbo");
        assert_eq!(initial_selection("o3-mini"), "o3-mini");
    }
}
