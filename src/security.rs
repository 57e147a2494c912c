//! Security analyzer: risk classification of a pending batch of tool calls
//! before the driver executes them.

use async_trait::async_trait;

use crate::event::{Event, RiskLevel};
use crate::tools::Action;

/// Classifies a batch of pending actions against the conversation's visible
/// history. Reference implementations may consult an LLM; analyzer failures
/// must fail open to `low` — confirmation mode remains the user's last line
/// of defense.
#[async_trait]
pub trait SecurityAnalyzer: Send + Sync {
    async fn classify(&self, batch: &[Action], view: &[Event]) -> Vec<RiskLevel>;
}

/// Always reports `low`. Used when no analyzer is configured and as a test double.
pub struct NoOpSecurityAnalyzer;

#[async_trait]
impl SecurityAnalyzer for NoOpSecurityAnalyzer {
    async fn classify(&self, batch: &[Action], _view: &[Event]) -> Vec<RiskLevel> {
        vec![RiskLevel::Low; batch.len()]
    }
}

/// A rubric-driven analyzer that asks an LLM to classify each action. The
/// rubric prompt is deterministic given `temperature == 0.0`.
///
/// `classify` fails open: any adapter error, or any response that can't be
/// parsed into exactly `batch.len()` risk levels, is treated as an all-`low`
/// result rather than propagated.
pub struct LlmSecurityAnalyzer<L> {
    llm: L,
    rubric: String,
}

const DEFAULT_RUBRIC: &str = "\
You are a security classifier for a coding agent. For each proposed tool \
call below, respond with exactly one risk level per line, in order: low, \
medium, or high. Use 'high' for anything that deletes data, modifies \
system configuration, exfiltrates data, or runs with elevated privileges. \
Use 'medium' for network access or broad filesystem writes. Use 'low' for \
read-only or clearly reversible operations.";

impl<L> LlmSecurityAnalyzer<L> {
    pub fn new(llm: L) -> Self {
        Self { llm, rubric: DEFAULT_RUBRIC.to_string() }
    }

    pub fn with_rubric(llm: L, rubric: impl Into<String>) -> Self {
        Self { llm, rubric: rubric.into() }
    }
}

/// Minimal surface `LlmSecurityAnalyzer` needs from an LLM adapter, kept
/// separate from `llm::LlmProvider` so the security module doesn't depend on
/// the full adapter's message/tool plumbing.
#[async_trait]
pub trait RubricClassifier: Send + Sync {
    async fn classify_text(&self, prompt: &str) -> crate::error::Result<String>;
}

#[async_trait]
impl<L: RubricClassifier> SecurityAnalyzer for LlmSecurityAnalyzer<L> {
    async fn classify(&self, batch: &[Action], _view: &[Event]) -> Vec<RiskLevel> {
        let mut prompt = self.rubric.clone();
        prompt.push_str("\n\n");
        for (i, action) in batch.iter().enumerate() {
            prompt.push_str(&format!("{}. {}({})\n", i + 1, action.tool_name, action.arguments));
        }

        let response = match self.llm.classify_text(&prompt).await {
            Ok(text) => text,
            Err(err) => {
                log::warn!("security analyzer failed, failing open to low: {err}");
                return vec![RiskLevel::Low; batch.len()];
            }
        };

        let levels: Vec<RiskLevel> = response
            .lines()
            .filter_map(|line| parse_risk_level(line.trim()))
            .collect();

        if levels.len() != batch.len() {
            log::warn!(
                "security analyzer returned {} risk levels for a batch of {}, failing open to low",
                levels.len(),
                batch.len()
            );
            return vec![RiskLevel::Low; batch.len()];
        }
        levels
    }
}

fn parse_risk_level(s: &str) -> Option<RiskLevel> {
    match s.to_lowercase().as_str() {
        "low" => Some(RiskLevel::Low),
        "medium" => Some(RiskLevel::Medium),
        "high" => Some(RiskLevel::High),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn action(name: &str) -> Action {
        Action { tool_name: name.into(), arguments: serde_json::json!({}), call_id: "c1".into() }
    }

    #[tokio::test]
    async fn noop_analyzer_reports_low_for_everything() {
        let levels = NoOpSecurityAnalyzer.classify(&[action("bash"), action("finish")], &[]).await;
        assert_eq!(levels, vec![RiskLevel::Low, RiskLevel::Low]);
    }

    struct FixedClassifier(&'static str);

    #[async_trait]
    impl RubricClassifier for FixedClassifier {
        async fn classify_text(&self, _prompt: &str) -> crate::error::Result<String> {
            Ok(self.0.to_string())
        }
    }

    #[tokio::test]
    async fn llm_analyzer_parses_one_level_per_line() {
        let analyzer = LlmSecurityAnalyzer::new(FixedClassifier("low\nhigh"));
        let levels = analyzer.classify(&[action("read"), action("rm")], &[]).await;
        assert_eq!(levels, vec![RiskLevel::Low, RiskLevel::High]);
    }

    struct FailingClassifier;

    #[async_trait]
    impl RubricClassifier for FailingClassifier {
        async fn classify_text(&self, _prompt: &str) -> crate::error::Result<String> {
            Err(Error::api("server unreachable"))
        }
    }

    #[tokio::test]
    async fn analyzer_failure_fails_open_to_low() {
        let analyzer = LlmSecurityAnalyzer::new(FailingClassifier);
        let levels = analyzer.classify(&[action("rm")], &[]).await;
        assert_eq!(levels, vec![RiskLevel::Low]);
    }

    #[tokio::test]
    async fn mismatched_level_count_fails_open_to_low() {
        let analyzer = LlmSecurityAnalyzer::new(FixedClassifier("low"));
        let levels = analyzer.classify(&[action("a"), action("b")], &[]).await;
        assert_eq!(levels, vec![RiskLevel::Low, RiskLevel::Low]);
    }
}
