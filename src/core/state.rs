//! 运行状态：编排循环独占持有，经由可变引用穿过每次状态转移
//!
//! plan 由 Planner / Replanner 整体替换；completed_steps 与 history 只追加，
//! 不重排不回改；final_answer 一旦置位即为终态，循环不再执行任何计划步骤。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 一条已完成的执行记录：任务描述与执行结果文本
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedStep {
    pub task: String,
    pub result: String,
}

/// 审计记录：角色名与该次转移产出的载荷；仅供观测与 Solver 读取
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: String,
    pub payload: Value,
    pub at: DateTime<Utc>,
}

/// 一次运行的全部可变状态
#[derive(Debug, Clone, Default)]
pub struct RunState {
    /// 用户原始目标，启动时设置一次后不再变更
    pub goal: String,
    /// 当前计划；首元素恒为下一个待执行任务
    pub plan: Vec<String>,
    /// 已执行步骤，每次 Executor 转移恰好追加一条
    pub completed_steps: Vec<CompletedStep>,
    /// 最终回答；Replanner 置位后循环转向 Solver
    pub final_answer: Option<String>,
    /// 审计历史，每次转移追加一条
    pub history: Vec<HistoryEntry>,
}

impl RunState {
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            ..Default::default()
        }
    }

    /// 整体替换计划（Planner 初始计划或 Replanner 修订计划；旧的未执行步骤被丢弃）
    pub fn replace_plan(&mut self, steps: Vec<String>) {
        self.plan = steps;
    }

    /// 追加一条已完成步骤
    pub fn push_completed(&mut self, task: impl Into<String>, result: impl Into<String>) {
        self.completed_steps.push(CompletedStep {
            task: task.into(),
            result: result.into(),
        });
    }

    /// 追加一条审计记录
    pub fn record(&mut self, role: &str, payload: Value) {
        self.history.push(HistoryEntry {
            role: role.to_string(),
            payload,
            at: Utc::now(),
        });
    }

    /// 是否已得出最终回答（非空才算）
    pub fn is_solved(&self) -> bool {
        self.final_answer
            .as_deref()
            .map(|s| !s.trim().is_empty())
            .unwrap_or(false)
    }

    /// 渲染历史为 Solver 输入的文本块
    pub fn history_transcript(&self) -> String {
        self.history
            .iter()
            .map(|e| format!("[{}] {}", e.role, e.payload))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completed_steps_append_only() {
        let mut state = RunState::new("goal");
        state.push_completed("t1", "r1");
        state.push_completed("t2", "r2");
        assert_eq!(state.completed_steps.len(), 2);
        assert_eq!(state.completed_steps[0].task, "t1");
        assert_eq!(state.completed_steps[1].result, "r2");
    }

    #[test]
    fn test_replace_plan_is_wholesale() {
        let mut state = RunState::new("goal");
        state.replace_plan(vec!["a".into(), "b".into(), "c".into()]);
        state.replace_plan(vec!["x".into()]);
        assert_eq!(state.plan, vec!["x".to_string()]);
    }

    #[test]
    fn test_is_solved_requires_non_empty_answer() {
        let mut state = RunState::new("goal");
        assert!(!state.is_solved());
        state.final_answer = Some("   ".into());
        assert!(!state.is_solved());
        state.final_answer = Some("done".into());
        assert!(state.is_solved());
    }

    #[test]
    fn test_history_transcript_order() {
        let mut state = RunState::new("goal");
        state.record("Planner", serde_json::json!(["s1"]));
        state.record("Executor", serde_json::json!({"task": "s1"}));
        let transcript = state.history_transcript();
        let planner_pos = transcript.find("[Planner]").unwrap();
        let executor_pos = transcript.find("[Executor]").unwrap();
        assert!(planner_pos < executor_pos);
    }
}
