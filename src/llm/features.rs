//! Model capability detection: a rule table keyed by normalized model name
//! mapping glob patterns to a capability record.

/// A feature the adapter can ask a model about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    Vision,
    FunctionCalling,
    PromptCache,
    ReasoningEffort,
    ResponsesApi,
    StopWords,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Capabilities {
    pub vision: bool,
    pub function_calling: bool,
    pub prompt_cache: bool,
    pub reasoning_effort: bool,
    pub responses_api: bool,
    pub stop_words: bool,
}

impl Capabilities {
    pub fn supports(&self, feature: Feature) -> bool {
        match feature {
            Feature::Vision => self.vision,
            Feature::FunctionCalling => self.function_calling,
            Feature::PromptCache => self.prompt_cache,
            Feature::ReasoningEffort => self.reasoning_effort,
            Feature::ResponsesApi => self.responses_api,
            Feature::StopWords => self.stop_words,
        }
    }
}

struct Rule {
    pattern: &'static str,
    caps: Capabilities,
}

/// Normalize a model name the way the rule table expects: strip a
/// provider-qualified prefix only when matching a basename pattern, lowercase,
/// and drop a trailing `-gguf` quantization suffix.
pub fn normalize_model_name(model: &str) -> String {
    let lower = model.to_lowercase();
    lower.strip_suffix("-gguf").unwrap_or(&lower).to_string()
}

fn basename(normalized: &str) -> &str {
    normalized.rsplit('/').next().unwrap_or(normalized)
}

/// Simple `*`-glob match (no other metacharacters), sufficient for the
/// small rule table below.
fn glob_match(pattern: &str, text: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == text;
    }
    let mut pos = 0usize;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if i == 0 {
            if !text[pos..].starts_with(part) {
                return false;
            }
            pos += part.len();
        } else if i == parts.len() - 1 {
            return text[pos..].ends_with(part);
        } else if let Some(found) = text[pos..].find(part) {
            pos += found + part.len();
        } else {
            return false;
        }
    }
    true
}

fn rule_table() -> Vec<Rule> {
    vec![
        Rule {
            pattern: "gpt-4o*",
            caps: Capabilities {
                vision: true,
                function_calling: true,
                prompt_cache: false,
                reasoning_effort: false,
                responses_api: true,
                stop_words: true,
            },
        },
        Rule {
            pattern: "o1*",
            caps: Capabilities {
                vision: true,
                function_calling: true,
                prompt_cache: false,
                reasoning_effort: true,
                responses_api: true,
                stop_words: false,
            },
        },
        Rule {
            pattern: "o3*",
            caps: Capabilities {
                vision: true,
                function_calling: true,
                prompt_cache: false,
                reasoning_effort: true,
                responses_api: true,
                stop_words: false,
            },
        },
        Rule {
            pattern: "claude-*",
            caps: Capabilities {
                vision: true,
                function_calling: true,
                prompt_cache: true,
                reasoning_effort: false,
                responses_api: false,
                stop_words: true,
            },
        },
        Rule {
            pattern: "qwen2.5*",
            caps: Capabilities {
                vision: false,
                function_calling: true,
                prompt_cache: false,
                reasoning_effort: false,
                responses_api: false,
                stop_words: true,
            },
        },
        Rule {
            pattern: "llava*",
            caps: Capabilities {
                vision: true,
                function_calling: false,
                prompt_cache: false,
                reasoning_effort: false,
                responses_api: false,
                stop_words: true,
            },
        },
    ]
}

/// Resolve capabilities for a (possibly provider-prefixed) model name.
/// Patterns containing `/` match the full provider-qualified name; others
/// match the basename. Unknown models get a conservative default (no
/// vision, native tool calling assumed, no prompt cache, no responses API).
pub fn capabilities_for(model: &str) -> Capabilities {
    let normalized = normalize_model_name(model);
    let name_for_basename_rules = basename(&normalized);
    for rule in rule_table() {
        let matched = if rule.pattern.contains('/') {
            glob_match(rule.pattern, &normalized)
        } else {
            glob_match(rule.pattern, name_for_basename_rules)
        };
        if matched {
            return rule.caps;
        }
    }
    Capabilities { function_calling: true, stop_words: true, ..Capabilities::default() }
}
