//! Client-facing model registry
//!
//! Static mapping from a client-facing model identifier to its engine
//! profile: operating mode, optional underlying model, and per-mode default
//! source set. Built once at startup, read-only thereafter; safe for
//! unsynchronized concurrent reads.

use crate::engine::{Mode, Source};

/// One registry entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    /// Client-facing model identifier
    pub id: &'static str,

    /// Engine operating mode
    pub mode: Mode,

    /// Underlying model selection, where the mode supports one
    pub underlying_model: Option<&'static str>,

    /// Human-readable description for listings and diagnostics
    pub description: &'static str,
}

/// Immutable model table.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    specs: Vec<ModelSpec>,
}

impl ModelRegistry {
    /// The built-in model table.
    pub fn builtin() -> Self {
        Self {
            specs: vec![
                ModelSpec {
                    id: "perplexity-auto",
                    mode: Mode::Auto,
                    underlying_model: None,
                    description: "Auto mode - fastest responses",
                },
                ModelSpec {
                    id: "perplexity-pro",
                    mode: Mode::Pro,
                    underlying_model: None,
                    description: "Pro mode - enhanced capabilities",
                },
                ModelSpec {
                    id: "perplexity-reasoning",
                    mode: Mode::Reasoning,
                    underlying_model: None,
                    description: "Reasoning mode - step-by-step thinking",
                },
                ModelSpec {
                    id: "perplexity-research",
                    mode: Mode::DeepResearch,
                    underlying_model: None,
                    description: "Deep Research mode - comprehensive analysis",
                },
                ModelSpec {
                    id: "perplexity-pro-gpt4o",
                    mode: Mode::Pro,
                    underlying_model: Some("gpt-4o"),
                    description: "Pro mode with GPT-4o",
                },
                ModelSpec {
                    id: "perplexity-pro-claude",
                    mode: Mode::Pro,
                    underlying_model: Some("claude 3.7 sonnet"),
                    description: "Pro mode with Claude 3.7 Sonnet",
                },
                ModelSpec {
                    id: "perplexity-reasoning-r1",
                    mode: Mode::Reasoning,
                    underlying_model: Some("r1"),
                    description: "Reasoning mode with R1",
                },
                ModelSpec {
                    id: "perplexity-reasoning-o3",
                    mode: Mode::Reasoning,
                    underlying_model: Some("o3-mini"),
                    description: "Reasoning mode with O3-mini",
                },
            ],
        }
    }

    /// Look up a client-facing model identifier.
    pub fn lookup(&self, model_id: &str) -> Option<&ModelSpec> {
        self.specs.iter().find(|spec| spec.id == model_id)
    }

    /// All registered specs, in listing order.
    pub fn specs(&self) -> &[ModelSpec] {
        &self.specs
    }

    /// All known identifiers, for diagnostics.
    pub fn known_ids(&self) -> Vec<&'static str> {
        self.specs.iter().map(|spec| spec.id).collect()
    }
}

/// Default source set for a mode. Deep research additionally consults
/// scholarly sources.
pub fn default_sources(mode: Mode) -> Vec<Source> {
    match mode {
        Mode::Auto | Mode::Pro | Mode::Reasoning => vec![Source::Web],
        Mode::DeepResearch => vec![Source::Web, Source::Scholar],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_known_model() {
        let registry = ModelRegistry::builtin();
        let spec = registry.lookup("perplexity-pro-gpt4o").unwrap();
        assert_eq!(spec.mode, Mode::Pro);
        assert_eq!(spec.underlying_model, Some("gpt-4o"));
    }

    #[test]
    fn lookup_unknown_model() {
        let registry = ModelRegistry::builtin();
        assert!(registry.lookup("gpt-4").is_none());
    }

    #[test]
    fn auto_id_maps_to_auto_mode() {
        let registry = ModelRegistry::builtin();
        assert_eq!(registry.lookup("perplexity-auto").unwrap().mode, Mode::Auto);
    }

    #[test]
    fn deep_research_adds_scholar() {
        assert_eq!(
            default_sources(Mode::DeepResearch),
            vec![Source::Web, Source::Scholar]
        );
        assert_eq!(default_sources(Mode::Pro), vec![Source::Web]);
    }

    #[test]
    fn ids_are_unique() {
        let registry = ModelRegistry::builtin();
        let mut ids = registry.known_ids();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), registry.specs().len());
    }
}
