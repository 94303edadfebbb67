//! Executor：执行当前计划的第 1 步
//!
//! 把整个当前计划渲染为编号清单，附上「执行第 1 步」的指令，随后进入
//! 模型主导的推理循环：工具调用 → 观察结果 → 下一次工具调用或最终回答。
//! 工具失败折叠为观察文本，推理循环继续；模型给出非工具最终消息时结束。

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::AgentError;
use crate::llm::{LlmClient, Message};
use crate::roles::planner::extract_json_block;
use crate::tools::ToolExecutor;

/// 单次任务内最大工具循环步数，防止死循环
const MAX_TOOL_STEPS: usize = 20;

/// 默认 system prompt 骨架；工具目录 JSON 在运行时拼入
pub const DEFAULT_EXECUTOR_PROMPT: &str = "\
You are a helpful agent that completes one task at a time using the tools below. \
To call a tool, reply with JSON only: {\"tool\": \"<name>\", \"args\": {...}}. \
When you have enough information, reply with your final answer as plain text (no JSON).";

/// LLM 返回的工具调用（简化 JSON：{"tool": "page_reader", "args": {"url": "..."}}）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    pub args: serde_json::Value,
}

/// 推理循环中单条模型输出的解析结果
#[derive(Debug, Clone)]
pub enum StepOutput {
    /// 非工具最终消息，结束本任务
    Response(String),
    /// 需要执行工具
    ToolCall(ToolCall),
}

/// 解析模型输出：若含有效 JSON 且 tool 非空则为 ToolCall，否则为 Response
pub fn parse_step_output(output: &str) -> Result<StepOutput, AgentError> {
    let trimmed = output.trim();
    let json_str = match extract_json_block(trimmed) {
        Some(s) => s,
        None => return Ok(StepOutput::Response(trimmed.to_string())),
    };

    let parsed: ToolCall = serde_json::from_str(json_str)
        .map_err(|e| AgentError::SchemaDecode(format!("{}: {}", e, json_str)))?;

    if parsed.tool.is_empty() {
        Ok(StepOutput::Response(trimmed.to_string()))
    } else {
        Ok(StepOutput::ToolCall(parsed))
    }
}

/// Executor 角色：名称可配置（绑定当前启用的工具集变体）
pub struct StepExecutor {
    name: String,
    llm: Arc<dyn LlmClient>,
    system_prompt: String,
}

impl StepExecutor {
    pub fn new(
        name: impl Into<String>,
        llm: Arc<dyn LlmClient>,
        system_prompt: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            llm,
            system_prompt: system_prompt.unwrap_or_else(|| DEFAULT_EXECUTOR_PROMPT.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 渲染任务描述：完整编号计划 + 执行第 1 步的指令
    pub fn format_task(plan: &[String]) -> String {
        let plan_str = plan
            .iter()
            .enumerate()
            .map(|(i, step)| format!("{}. {}", i + 1, step))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "For the following plan:\n{}\n\nYou are tasked with executing step 1, {}.",
            plan_str,
            plan.first().map(String::as_str).unwrap_or("")
        )
    }

    /// 执行当前计划的第 1 步，返回 (任务描述, 最终结果文本)
    pub async fn execute_step(
        &self,
        tools: &ToolExecutor,
        plan: &[String],
    ) -> Result<(String, String), AgentError> {
        let task = plan
            .first()
            .cloned()
            .ok_or_else(|| AgentError::SchemaDecode("current plan is empty".to_string()))?;
        let task_formatted = Self::format_task(plan);

        let system = format!(
            "{}\n\nAvailable tools:\n{}",
            self.system_prompt,
            tools.catalog_json()
        );
        let mut messages = vec![Message::system(system), Message::user(task_formatted)];

        let mut last_output = String::new();
        for _step in 0..MAX_TOOL_STEPS {
            let output = self
                .llm
                .complete(&messages)
                .await
                .map_err(AgentError::LlmError)?;
            last_output = output.clone();

            match parse_step_output(&output) {
                Ok(StepOutput::Response(resp)) => return Ok((task, resp)),
                Ok(StepOutput::ToolCall(tc)) => {
                    tracing::info!(executor = %self.name, tool = %tc.tool, "tool call");
                    let observation = match tools.execute(&tc.tool, tc.args).await {
                        Ok(r) => r,
                        // 工具失败是观察内容，不中断推理循环
                        Err(e) => format!("Error: {}", e),
                    };
                    messages.push(Message::assistant(format!(
                        "Tool call: {} | Result: {}",
                        tc.tool, observation
                    )));
                    messages.push(Message::user(format!(
                        "Observation from {}: {}",
                        tc.tool, observation
                    )));
                }
                Err(e) => {
                    // 工具调用 JSON 畸形：提示模型重试，仍占一步
                    messages.push(Message::user(format!(
                        "Your previous reply was not valid: {}. \
                         Reply with a valid tool-call JSON or a plain-text final answer.",
                        e
                    )));
                }
            }
        }

        Ok((
            task,
            format!(
                "Reached the tool-step limit ({}) without a final answer. Last output:\n{}",
                MAX_TOOL_STEPS, last_output
            ),
        ))
    }
}
