//! Process-wide map from service id to `LlmConfig`, standing in for the
//! per-process global LLM configuration used before per-agent config.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::config::LlmConfig;
use crate::error::{Error, Result};

/// The well-known service ids a conversation's components resolve
/// configuration under.
pub const SERVICE_AGENT: &str = "agent";
pub const SERVICE_CONDENSER: &str = "condenser";
pub const SERVICE_SECURITY: &str = "security";

/// Holds one `LlmConfig` per named service, so the agent, the condenser's
/// summarizer, and the security analyzer can each be pointed at a different
/// model/provider without a process-wide global.
#[derive(Default)]
pub struct LlmRegistry {
    configs: RwLock<HashMap<String, LlmConfig>>,
}

impl LlmRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, service_id: impl Into<String>, config: LlmConfig) {
        self.configs.write().expect("llm registry mutex poisoned").insert(service_id.into(), config);
    }

    pub fn get(&self, service_id: &str) -> Result<LlmConfig> {
        self.configs
            .read()
            .expect("llm registry mutex poisoned")
            .get(service_id)
            .cloned()
            .ok_or_else(|| Error::config(format!("no LlmConfig registered for service '{service_id}'")))
    }

    pub fn contains(&self, service_id: &str) -> bool {
        self.configs.read().expect("llm registry mutex poisoned").contains_key(service_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config(model: &str) -> LlmConfig {
        LlmConfig::builder().model(model).base_url("http://localhost:1234/v1").build().unwrap()
    }

    #[test]
    fn registered_services_round_trip() {
        let registry = LlmRegistry::new();
        registry.set(SERVICE_AGENT, sample_config("qwen2.5-32b-instruct"));
        let config = registry.get(SERVICE_AGENT).unwrap();
        assert_eq!(config.model, "qwen2.5-32b-instruct");
    }

    #[test]
    fn unregistered_service_is_a_config_error() {
        let registry = LlmRegistry::new();
        let err = registry.get(SERVICE_CONDENSER).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn distinct_services_hold_independent_configs() {
        let registry = LlmRegistry::new();
        registry.set(SERVICE_AGENT, sample_config("gpt-4o"));
        registry.set(SERVICE_CONDENSER, sample_config("qwen2.5-7b-instruct"));
        assert!(registry.contains(SERVICE_SECURITY) == false);
        assert_eq!(registry.get(SERVICE_AGENT).unwrap().model, "gpt-4o");
        assert_eq!(registry.get(SERVICE_CONDENSER).unwrap().model, "qwen2.5-7b-instruct");
    }
}
