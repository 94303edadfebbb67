//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Scripted Mock）实现 LlmClient；角色层只依赖该 trait。

use async_trait::async_trait;

use crate::llm::Message;

/// LLM 客户端 trait：给定消息序列返回完成文本
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成；失败时返回错误字符串
    async fn complete(&self, messages: &[Message]) -> Result<String, String>;

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
