//! Scout - 计划 / 执行 / 重规划 / 求解 网页智能体
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型与运行状态（RunState）
//! - **graph**: 编排状态机（Planner → Executor → Replanner → Solver）
//! - **index**: 检索索引抽象与向量实现（嵌入 + 余弦相似度）
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Scripted Mock）
//! - **roles**: 四个角色（Planner / Executor / Replanner / Solver）
//! - **tools**: 工具目录（检索工具集 / 浏览器自动化工具集）与执行器

pub mod config;
pub mod core;
pub mod graph;
pub mod index;
pub mod llm;
pub mod roles;
pub mod tools;

pub use graph::{ExecutionGraph, ExecutorKind};
