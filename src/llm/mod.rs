//! LLM 层：客户端抽象与实现（OpenAI 兼容 / Scripted Mock）

pub mod embedding;
pub mod message;
pub mod mock;
pub mod openai;
pub mod traits;

pub use embedding::{EmbeddingProvider, OpenAiEmbedder};
pub use message::{Message, Role};
pub use mock::ScriptedLlmClient;
pub use openai::{OpenAiClient, TokenUsage};
pub use traits::LlmClient;
