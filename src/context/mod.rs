//! The context pipeline: system prompt assembly, microagent activation, and
//! history condensation.

pub mod condenser;
pub mod microagents;
pub mod system_prompt;
pub mod view;

pub use condenser::{Condenser, LlmSummarizingCondenser, NoOpCondenser, Summarizer};
pub use microagents::{KnowledgeMicroagent, MicroagentSet, RepoMicroagent};
pub use system_prompt::{render_system_prompt, SystemPromptOptions};
pub use view::View;
