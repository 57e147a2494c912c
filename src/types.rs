//! Core type definitions shared across the execution core: content parts,
//! the transport `Message` exchanged with the LLM adapter, normalized tool
//! calls, and the completions-path OpenAI wire shapes.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Role of a message participant in the transport form sent to a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    Developer,
    User,
    Assistant,
    Tool,
}

/// How much visual detail a vision-capable model should extract from an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageDetail {
    Low,
    High,
    Auto,
}

/// An image content part: either a remote URL or an inline base64 data URI.
///
/// `url()` always returns the form the OpenAI-compatible `image_url` part
/// expects, so callers never need to special-case the base64 path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageBlock {
    url: String,
    detail: ImageDetail,
}

impl ImageBlock {
    /// Build an image part from a remote URL (including `data:` URIs passed
    /// through as-is).
    pub fn from_url(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        if url.is_empty() {
            return Err(Error::invalid_input("image url must not be empty"));
        }
        Ok(Self { url, detail: ImageDetail::Auto })
    }

    /// Build an image part from raw base64 data and a MIME type, encoding it
    /// as a `data:` URI.
    pub fn from_base64(data: impl AsRef<str>, mime_type: impl AsRef<str>) -> Result<Self> {
        let data = data.as_ref();
        let mime = mime_type.as_ref();
        if data.is_empty() {
            return Err(Error::invalid_input("base64 image data must not be empty"));
        }
        if mime.is_empty() {
            return Err(Error::invalid_input("image mime type must not be empty"));
        }
        Ok(Self { url: format!("data:{mime};base64,{data}"), detail: ImageDetail::Auto })
    }

    /// Set the level of visual detail requested from the model.
    pub fn with_detail(mut self, detail: ImageDetail) -> Self {
        self.detail = detail;
        self
    }

    /// The resolved URL/data-URI to send to the provider.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The requested detail level.
    pub fn detail(&self) -> ImageDetail {
        self.detail
    }
}

/// Plain text content, kept as its own type so `ContentBlock::Text` carries
/// a named struct rather than a bare `String` (matches the wire shape of
/// tool-result and assistant text blocks).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextBlock {
    pub text: String,
}

impl TextBlock {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// A tool call requested by the model, normalized across both invocation
/// paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolUseBlock {
    pub id: String,
    pub name: String,
    /// Arguments as a raw JSON string, exactly as the provider returned them
    /// (may be malformed; the agent validates before dispatch).
    pub input: String,
}

/// The outcome of executing a `ToolUseBlock`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResultBlock {
    pub tool_use_id: String,
    pub content: String,
    #[serde(default)]
    pub is_error: bool,
}

/// A semantic unit of message content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text(TextBlock),
    Image(ImageBlock),
    ToolUse(ToolUseBlock),
    ToolResult(ToolResultBlock),
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text(TextBlock::new(text))
    }

    /// Plain text if this block is a `Text` variant, else `None`.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text(t) => Some(&t.text),
            _ => None,
        }
    }
}

/// A single message in the transport form exchanged between the Agent and
/// the LLM adapter. Not itself persisted — the event log is the durable
/// record; this is rebuilt from it each turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: Vec<ContentBlock>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolUseBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_summary: Option<String>,
}

impl Message {
    pub fn new(role: MessageRole, content: Vec<ContentBlock>) -> Self {
        Self {
            role,
            content,
            tool_calls: Vec::new(),
            tool_call_id: None,
            reasoning_summary: None,
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(MessageRole::System, vec![ContentBlock::text(text)])
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(MessageRole::User, vec![ContentBlock::text(text)])
    }

    pub fn assistant(content: Vec<ContentBlock>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    pub fn tool_result(tool_call_id: impl Into<String>, text: impl Into<String>) -> Self {
        let mut msg = Self::new(MessageRole::Tool, vec![ContentBlock::text(text)]);
        msg.tool_call_id = Some(tool_call_id.into());
        msg
    }

    /// Concatenation of every `Text` content part, for token estimation and
    /// condensation prompts.
    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentBlock::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ============================================================================
// OpenAI completions-path wire shapes
// ============================================================================

/// `image_url` part of an OpenAI Vision-style content array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIImageUrl {
    pub url: String,
    pub detail: ImageDetail,
}

/// One element of the OpenAI multi-part content array.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OpenAIContentPart {
    Text { text: String },
    ImageUrl { image_url: OpenAIImageUrl },
}

impl OpenAIContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        OpenAIContentPart::Text { text: text.into() }
    }

    pub fn image_url(url: impl Into<String>, detail: ImageDetail) -> Self {
        OpenAIContentPart::ImageUrl { image_url: OpenAIImageUrl { url: url.into(), detail } }
    }
}

/// OpenAI message `content` field: a bare string when the message is
/// text-only (kept for backward compatibility with providers that reject
/// array content), or a typed parts array once any image is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OpenAIContent {
    Text(String),
    Parts(Vec<OpenAIContentPart>),
}

/// Convert a transport `Message`'s content into the OpenAI wire shape: plain
/// string when it is text-only, parts array as soon as any image is present.
pub fn to_openai_content(content: &[ContentBlock]) -> OpenAIContent {
    let has_image = content.iter().any(|b| matches!(b, ContentBlock::Image(_)));
    if !has_image {
        let joined = content
            .iter()
            .filter_map(ContentBlock::as_text)
            .collect::<Vec<_>>()
            .join("\n");
        return OpenAIContent::Text(joined);
    }

    let parts = content
        .iter()
        .filter_map(|b| match b {
            ContentBlock::Text(t) => {
                if t.text.is_empty() {
                    log::warn!("empty text block included in multi-part content");
                }
                Some(OpenAIContentPart::text(t.text.clone()))
            }
            ContentBlock::Image(img) => {
                Some(OpenAIContentPart::image_url(img.url().to_string(), img.detail()))
            }
            _ => None,
        })
        .collect();
    OpenAIContent::Parts(parts)
}
