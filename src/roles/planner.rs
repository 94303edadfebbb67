//! Planner：目标 → 有序步骤表
//!
//! 输出为结构化 JSON（{"steps": [...]}) 而非自由文本；解码失败当轮致命，
//! 不做重试，直接以 SchemaDecode 返回调用方。

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::AgentError;
use crate::llm::{LlmClient, Message};

/// 默认 system prompt：要求每步独立可执行，不需要 Executor 再分解
pub const DEFAULT_PLANNER_PROMPT: &str = "\
For the given objective, come up with a simple step by step plan. \
Each step should be an independently actionable task that, if executed correctly, \
brings you closer to the objective; do not add superfluous steps. \
The result of the final step should be the final answer. \
Reply with JSON only: {\"steps\": [\"step 1\", \"step 2\", ...]}";

/// 计划：有序步骤表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub steps: Vec<String>,
}

/// 从 LLM 输出中提取 JSON 块（```json ... ``` 围栏或最外层花括号）
pub(crate) fn extract_json_block(output: &str) -> Option<&str> {
    let trimmed = output.trim();
    if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        let inner = rest
            .find("```")
            .map(|end| rest[..end].trim())
            .unwrap_or_else(|| rest.trim());
        return Some(inner);
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&trimmed[start..=end])
}

/// Planner：持有 LLM 与 system prompt
pub struct Planner {
    llm: Arc<dyn LlmClient>,
    system_prompt: String,
}

impl Planner {
    pub fn new(llm: Arc<dyn LlmClient>, system_prompt: Option<String>) -> Self {
        Self {
            llm,
            system_prompt: system_prompt.unwrap_or_else(|| DEFAULT_PLANNER_PROMPT.to_string()),
        }
    }

    /// 生成初始计划；空计划与解码失败均为 SchemaDecode
    pub async fn plan(&self, goal: &str) -> Result<Plan, AgentError> {
        let messages = [
            Message::system(self.system_prompt.clone()),
            Message::user(goal.to_string()),
        ];
        let output = self
            .llm
            .complete(&messages)
            .await
            .map_err(AgentError::LlmError)?;

        let json = extract_json_block(&output)
            .ok_or_else(|| AgentError::SchemaDecode(format!("no JSON in plan: {}", output)))?;
        let plan: Plan = serde_json::from_str(json)
            .map_err(|e| AgentError::SchemaDecode(format!("{}: {}", e, json)))?;
        if plan.steps.is_empty() {
            return Err(AgentError::SchemaDecode("plan has no steps".to_string()));
        }
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlmClient;

    #[test]
    fn test_extract_json_block_fenced_and_bare() {
        assert_eq!(
            extract_json_block("```json\n{\"steps\": []}\n```"),
            Some("{\"steps\": []}")
        );
        assert_eq!(
            extract_json_block("sure, here: {\"steps\": [\"a\"]} done"),
            Some("{\"steps\": [\"a\"]}")
        );
        assert_eq!(extract_json_block("no json here"), None);
    }

    #[tokio::test]
    async fn test_plan_decodes_steps() {
        let llm = Arc::new(ScriptedLlmClient::new(vec![
            r#"{"steps": ["look up office hours from page X"]}"#.to_string(),
        ]));
        let planner = Planner::new(llm, None);
        let plan = planner.plan("find the office hours on page X").await.unwrap();
        assert_eq!(plan.steps.len(), 1);
        assert!(plan.steps[0].contains("office hours"));
    }

    #[tokio::test]
    async fn test_malformed_plan_is_fatal() {
        let llm = Arc::new(ScriptedLlmClient::new(vec![
            r#"{"steps": "not a list"}"#.to_string(),
        ]));
        let planner = Planner::new(llm, None);
        let err = planner.plan("goal").await;
        assert!(matches!(err, Err(AgentError::SchemaDecode(_))));
    }

    #[tokio::test]
    async fn test_empty_plan_is_fatal() {
        let llm = Arc::new(ScriptedLlmClient::new(vec![r#"{"steps": []}"#.to_string()]));
        let planner = Planner::new(llm, None);
        let err = planner.plan("goal").await;
        assert!(matches!(err, Err(AgentError::SchemaDecode(_))));
    }
}
