//! Token/cost accounting, latency tracking, and redacted structured logging
//! for every LLM call.

use serde::{Deserialize, Serialize};

/// Per-call token usage, shared by both invocation paths (usage from a
/// responses-path response is mapped onto this same shape).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_write_tokens: u64,
    pub reasoning_tokens: u64,
}

/// One recorded latency sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatencyRecord {
    pub id: String,
    pub seconds: f64,
}

/// Cumulative metrics for a conversation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metrics {
    pub usage: Usage,
    pub cost_usd: f64,
    pub latencies: Vec<LatencyRecord>,
    pub retry_count: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_usage(&mut self, usage: Usage) {
        self.usage.input_tokens += usage.input_tokens;
        self.usage.output_tokens += usage.output_tokens;
        self.usage.cache_read_tokens += usage.cache_read_tokens;
        self.usage.cache_write_tokens += usage.cache_write_tokens;
        self.usage.reasoning_tokens += usage.reasoning_tokens;
    }

    pub fn add_latency(&mut self, id: impl Into<String>, seconds: f64) {
        self.latencies.push(LatencyRecord { id: id.into(), seconds });
    }

    pub fn add_cost(&mut self, cost_usd: f64) {
        self.cost_usd += cost_usd;
    }

    pub fn add_retry(&mut self) {
        self.retry_count += 1;
    }

    /// A cheap immutable copy, attached to every `LlmResponse`.
    pub fn snapshot(&self) -> Metrics {
        self.clone()
    }

    /// Per-field difference against an earlier snapshot, useful for
    /// accounting a single call's contribution.
    pub fn diff(&self, baseline: &Metrics) -> Metrics {
        Metrics {
            usage: Usage {
                input_tokens: self.usage.input_tokens.saturating_sub(baseline.usage.input_tokens),
                output_tokens: self.usage.output_tokens.saturating_sub(baseline.usage.output_tokens),
                cache_read_tokens: self
                    .usage
                    .cache_read_tokens
                    .saturating_sub(baseline.usage.cache_read_tokens),
                cache_write_tokens: self
                    .usage
                    .cache_write_tokens
                    .saturating_sub(baseline.usage.cache_write_tokens),
                reasoning_tokens: self
                    .usage
                    .reasoning_tokens
                    .saturating_sub(baseline.usage.reasoning_tokens),
            },
            cost_usd: self.cost_usd - baseline.cost_usd,
            latencies: self.latencies[baseline.latencies.len().min(self.latencies.len())..].to_vec(),
            retry_count: self.retry_count.saturating_sub(baseline.retry_count),
        }
    }

    pub fn merge(&mut self, other: &Metrics) {
        self.add_usage(other.usage);
        self.cost_usd += other.cost_usd;
        self.latencies.extend(other.latencies.iter().cloned());
        self.retry_count += other.retry_count;
    }
}

/// Strip secrets and `encrypted_content` from a string before it reaches a
/// DEBUG log line, and truncate values too long to be a useful log line.
pub fn redact(input: &str) -> String {
    const MAX_LEN: usize = 200;
    let lower = input.to_lowercase();
    if lower.contains("encrypted_content")
        || lower.contains("api_key")
        || lower.contains("bearer ")
        || lower.contains("authorization")
    {
        return "<redacted>".to_string();
    }
    if input.chars().count() > MAX_LEN {
        let truncated: String = input.chars().take(MAX_LEN).collect();
        format!("{truncated}... ({} chars)", input.chars().count())
    } else {
        input.to_string()
    }
}

/// Emit a DEBUG log line for a request/response pair with redaction applied.
pub fn log_call(path: &str, model: &str, latency_s: f64, usage: &Usage, status: &str) {
    log::debug!(
        "llm_call path={path} model={} latency={latency_s:.3}s input_tokens={} output_tokens={} status={status}",
        redact(model),
        usage.input_tokens,
        usage.output_tokens,
    );
}
