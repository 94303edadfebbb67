//! Solver：读取完整审计历史，综合产出面向用户的最终回答
//!
//! Replanner 的 Respond 只负责路由控制流；终端展示的文本由 Solver 产出。

use std::sync::Arc;

use crate::core::AgentError;
use crate::llm::{LlmClient, Message};

pub const DEFAULT_SOLVER_PROMPT: &str = "\
You produce the final answer for the user. \
Given the original objective and the full planning and execution history, \
synthesize a clear, complete answer in natural language. \
Answer directly; do not describe the process unless it matters to the user.";

/// Solver：目标 + 历史 → 最终回答
pub struct Solver {
    llm: Arc<dyn LlmClient>,
    system_prompt: String,
}

impl Solver {
    pub fn new(llm: Arc<dyn LlmClient>, system_prompt: Option<String>) -> Self {
        Self {
            llm,
            system_prompt: system_prompt.unwrap_or_else(|| DEFAULT_SOLVER_PROMPT.to_string()),
        }
    }

    pub async fn solve(&self, goal: &str, history_transcript: &str) -> Result<String, AgentError> {
        let messages = [
            Message::system(self.system_prompt.clone()),
            Message::user(format!(
                "Objective:\n{}\n\nPlanning history:\n{}",
                goal, history_transcript
            )),
        ];
        self.llm
            .complete(&messages)
            .await
            .map_err(AgentError::LlmError)
    }
}
