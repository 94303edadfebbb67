//! Replanner：审视全部进度，给出最终回答或修订计划
//!
//! 输出是显式二选一的和类型（Respond / Plan），编排循环对其做穷尽匹配。
//! 完成与否完全交给模型判断，编排器不叠加自己的完成启发式。
//! 新计划整体替换旧计划，旧的未执行步骤被丢弃。

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::state::CompletedStep;
use crate::core::AgentError;
use crate::llm::{LlmClient, Message};
use crate::roles::planner::extract_json_block;

/// 默认 system prompt：要求二选一的 JSON 输出
pub const DEFAULT_REPLANNER_PROMPT: &str = "\
You revise plans based on execution progress. \
If the completed steps already answer the objective, reply with JSON \
{\"action\": \"respond\", \"response\": \"<final answer>\"}. \
Otherwise reply with JSON {\"action\": \"plan\", \"steps\": [\"...\"]} \
containing only the steps that still need to be done; do not repeat completed steps.";

/// Replanner 输出：最终回答（运行结束）或修订计划（运行继续），二者必居其一
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ReplanAction {
    Respond { response: String },
    Plan { steps: Vec<String> },
}

/// Replanner：输入为目标、当前计划与已完成步骤（不含审计历史）
pub struct Replanner {
    llm: Arc<dyn LlmClient>,
    system_prompt: String,
}

impl Replanner {
    pub fn new(llm: Arc<dyn LlmClient>, system_prompt: Option<String>) -> Self {
        Self {
            llm,
            system_prompt: system_prompt.unwrap_or_else(|| DEFAULT_REPLANNER_PROMPT.to_string()),
        }
    }

    fn render_progress(goal: &str, plan: &[String], completed: &[CompletedStep]) -> String {
        let plan_str = plan
            .iter()
            .enumerate()
            .map(|(i, s)| format!("{}. {}", i + 1, s))
            .collect::<Vec<_>>()
            .join("\n");
        let done_str = completed
            .iter()
            .map(|s| format!("- task: {}\n  result: {}", s.task, s.result))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "Your objective was this:\n{}\n\nYour current plan was this:\n{}\n\n\
             You have currently done these steps:\n{}",
            goal, plan_str, done_str
        )
    }

    /// 重规划；解码失败当轮致命（SchemaDecode）
    pub async fn replan(
        &self,
        goal: &str,
        plan: &[String],
        completed: &[CompletedStep],
    ) -> Result<ReplanAction, AgentError> {
        let messages = [
            Message::system(self.system_prompt.clone()),
            Message::user(Self::render_progress(goal, plan, completed)),
        ];
        let output = self
            .llm
            .complete(&messages)
            .await
            .map_err(AgentError::LlmError)?;

        let json = extract_json_block(&output)
            .ok_or_else(|| AgentError::SchemaDecode(format!("no JSON in replan: {}", output)))?;
        let action: ReplanAction = serde_json::from_str(json)
            .map_err(|e| AgentError::SchemaDecode(format!("{}: {}", e, json)))?;

        if let ReplanAction::Plan { steps } = &action {
            if steps.is_empty() {
                return Err(AgentError::SchemaDecode(
                    "revised plan has no steps".to_string(),
                ));
            }
        }
        Ok(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlmClient;

    fn completed(task: &str, result: &str) -> CompletedStep {
        CompletedStep {
            task: task.to_string(),
            result: result.to_string(),
        }
    }

    #[tokio::test]
    async fn test_respond_variant() {
        let llm = Arc::new(ScriptedLlmClient::new(vec![
            r#"{"action": "respond", "response": "Office hours are 9-17."}"#.to_string(),
        ]));
        let replanner = Replanner::new(llm, None);
        let action = replanner
            .replan(
                "find office hours",
                &["look up office hours".to_string()],
                &[completed("look up office hours", "hours: 9-17")],
            )
            .await
            .unwrap();
        match action {
            ReplanAction::Respond { response } => assert!(response.contains("9-17")),
            ReplanAction::Plan { .. } => panic!("expected Respond"),
        }
    }

    #[tokio::test]
    async fn test_plan_variant() {
        let llm = Arc::new(ScriptedLlmClient::new(vec![
            r#"{"action": "plan", "steps": ["open the contact page", "extract the phone number"]}"#
                .to_string(),
        ]));
        let replanner = Replanner::new(llm, None);
        let action = replanner.replan("goal", &["old step".to_string()], &[]).await.unwrap();
        match action {
            ReplanAction::Plan { steps } => assert_eq!(steps.len(), 2),
            ReplanAction::Respond { .. } => panic!("expected Plan"),
        }
    }

    #[tokio::test]
    async fn test_missing_fields_are_fatal() {
        let llm = Arc::new(ScriptedLlmClient::new(vec![
            r#"{"action": "respond"}"#.to_string(),
        ]));
        let replanner = Replanner::new(llm, None);
        let err = replanner.replan("goal", &[], &[]).await;
        assert!(matches!(err, Err(AgentError::SchemaDecode(_))));
    }

    #[tokio::test]
    async fn test_empty_revised_plan_is_fatal() {
        let llm = Arc::new(ScriptedLlmClient::new(vec![
            r#"{"action": "plan", "steps": []}"#.to_string(),
        ]));
        let replanner = Replanner::new(llm, None);
        let err = replanner.replan("goal", &[], &[]).await;
        assert!(matches!(err, Err(AgentError::SchemaDecode(_))));
    }
}
