//! Scripted LLM 客户端（用于测试，无需 API）
//!
//! 按 FIFO 顺序回放预置回复，便于确定性地驱动整个编排状态机。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{LlmClient, Message};

/// Scripted 客户端：每次 complete 弹出一条预置回复；耗尽后返回错误
#[derive(Debug, Default)]
pub struct ScriptedLlmClient {
    replies: Mutex<VecDeque<String>>,
}

impl ScriptedLlmClient {
    pub fn new(replies: Vec<String>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
        }
    }

    /// 剩余未消费的回复条数
    pub fn remaining(&self) -> usize {
        self.replies.lock().map(|q| q.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, _messages: &[Message]) -> Result<String, String> {
        self.replies
            .lock()
            .map_err(|e| e.to_string())?
            .pop_front()
            .ok_or_else(|| "scripted replies exhausted".to_string())
    }
}
