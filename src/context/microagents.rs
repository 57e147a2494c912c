//! Repo and knowledge microagents: always-active context versus
//! keyword-triggered, one-time-activation context.

use std::collections::HashSet;

use regex::Regex;

/// Always-active context, concatenated into the system prompt or appended
/// as a leading system-side message.
#[derive(Debug, Clone)]
pub struct RepoMicroagent {
    pub content: String,
}

/// Context injected the first time any of its trigger keywords appears in a
/// user message. Matching is case-insensitive and on whole words only.
#[derive(Debug, Clone)]
pub struct KnowledgeMicroagent {
    pub name: String,
    pub triggers: Vec<String>,
    pub content: String,
}

impl KnowledgeMicroagent {
    /// Whether `text` contains any of this microagent's trigger keywords as
    /// a whole word, case-insensitively. Returns the first matching trigger.
    pub fn matching_trigger(&self, text: &str) -> Option<&str> {
        self.triggers.iter().find(|t| whole_word_match(t, text)).map(String::as_str)
    }
}

fn whole_word_match(trigger: &str, text: &str) -> bool {
    let pattern = format!(r"(?i)\b{}\b", regex::escape(trigger));
    Regex::new(&pattern).map(|re| re.is_match(text)).unwrap_or(false)
}

/// The set of repo and knowledge microagents available to a conversation.
#[derive(Debug, Clone, Default)]
pub struct MicroagentSet {
    pub repo: Vec<RepoMicroagent>,
    pub knowledge: Vec<KnowledgeMicroagent>,
}

impl MicroagentSet {
    /// Concatenated content of every repo microagent, for system prompt assembly.
    pub fn repo_context(&self) -> String {
        self.repo.iter().map(|m| m.content.as_str()).collect::<Vec<_>>().join("\n")
    }

    /// Knowledge microagents newly triggered by `text`, excluding any whose
    /// name is already in `active` (idempotent activation).
    pub fn newly_triggered<'a>(
        &'a self,
        text: &str,
        active: &HashSet<String>,
    ) -> Vec<(&'a KnowledgeMicroagent, &'a str)> {
        self.knowledge
            .iter()
            .filter(|m| !active.contains(&m.name))
            .filter_map(|m| m.matching_trigger(text).map(|t| (m, t)))
            .collect()
    }
}
