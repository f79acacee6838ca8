//! LLM 层：客户端抽象与实现（OpenAI 兼容 / Mock）以及结构化生成

pub mod mock;
pub mod openai;
pub mod structured;
pub mod traits;

pub use mock::MockLlmClient;
pub use openai::{OpenAiClient, TokenUsage};
pub use structured::{extract_json, StructuredGenerator};
pub use traits::{LlmClient, Message, Role};
