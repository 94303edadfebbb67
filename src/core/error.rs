//! Agent 错误类型
//!
//! 工具级失败在 Executor 角色内就地转为观察文本，不会以错误形式向上传播；
//! 结构化解码失败与构造期失败（配置、凭据、无效执行器）为致命错误，直接返回调用方。

use thiserror::Error;

/// Agent 运行过程中可能出现的错误（网络、解码、工具、配置等）
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("LLM error: {0}")]
    LlmError(String),

    /// 模型输出不符合请求的结构（Plan / Act JSON），当轮致命，不做本地恢复
    #[error("Schema decode error: {0}")]
    SchemaDecode(String),

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// 模型给出的参数未通过工具声明的 schema 校验
    #[error("Invalid tool arguments for {tool}: {reason}")]
    InvalidArgs { tool: String, reason: String },

    /// 构造期：无法识别的执行器名称
    #[error("Invalid executor: {0} (choose \"search\" or \"browser\")")]
    InvalidExecutor(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    /// 构造期：凭据表中缺少该会话
    #[error("Missing credentials for session: {0}")]
    CredentialMissing(String),

    #[error("Browser init failed: {0}")]
    BrowserInit(String),

    /// 会话尚未就绪时调用了自动化工具等待接口
    #[error("Browser session not ready: {0}")]
    BrowserNotReady(String),

    /// 单次角色调用超过时限
    #[error("Turn timeout in {0}")]
    TurnTimeout(String),

    /// 重规划轮数超过预算，Replanner 始终未给出最终回答
    #[error("Round budget exceeded after {0} rounds")]
    RoundBudgetExceeded(usize),
}
