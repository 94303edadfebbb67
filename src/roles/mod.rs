//! 四个协作角色，共享 LlmClient 抽象，各自有独立的输出契约：
//! Planner（有序步骤表）、Executor（单步任务 + 工具循环）、
//! Replanner（最终回答或修订计划的二选一）、Solver（最终自然语言回答）。

pub mod executor;
pub mod planner;
pub mod replanner;
pub mod solver;

pub use executor::{parse_step_output, StepExecutor, StepOutput, ToolCall};
pub use planner::{Plan, Planner};
pub use replanner::{ReplanAction, Replanner};
pub use solver::Solver;
