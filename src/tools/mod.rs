//! 工具层
//!
//! 两个工具集实现同一 Tool trait：检索工具集（只读）与浏览器自动化工具集（有副作用）。
//! ToolRegistry 按名注册与查找并在调用前做 schema 校验；ToolExecutor 加超时、
//! 审计日志与变更后置钩子（自动截图）。

pub mod browser;
pub mod executor;
pub mod registry;
pub mod retrieval;

pub use executor::{PostActionHook, ToolExecutor};
pub use registry::{Tool, ToolRegistry};
