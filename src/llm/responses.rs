//! Responses-path wire item types: the `input` items sent to the provider
//! and the `output` items it returns.

use serde::{Deserialize, Serialize};

/// One element of the `input` array sent on the responses path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsesInputItem {
    Message { role: String, content: String },
    /// A tool result keyed by the original `call_id`, submitted in the next
    /// turn's input list.
    FunctionCallOutput { call_id: String, output: String },
    /// A previously-returned reasoning item re-emitted unchanged so the
    /// provider can preserve chain-of-thought across a stateless turn, when
    /// `enable_encrypted_reasoning` is set.
    Reasoning {
        #[serde(skip_serializing_if = "Option::is_none")]
        encrypted_content: Option<String>,
    },
}

/// One element of the `output` array in a `ResponsesAPIResponse`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsesOutputItem {
    Message { content: String },
    FunctionCall { call_id: String, name: String, arguments: String },
    Reasoning {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        summary: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        encrypted_content: Option<String>,
    },
}

/// Token usage as reported on the responses path, mapped onto the same
/// `Usage` shape as completions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponsesUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub reasoning_tokens: u64,
}

/// The provider's stateful response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsesApiResponse {
    pub id: String,
    pub output: Vec<ResponsesOutputItem>,
    #[serde(default)]
    pub usage: ResponsesUsage,
}
