//! 编排状态机：Planner → Executor → Replanner →（Executor | Solver）
//!
//! 每轮恰好执行当前计划的第 1 步；Replanner 的输出决定回边（继续执行）还是
//! 终边（Solver 产出最终回答）。完成判断完全由 Replanner 给出，循环本身只
//! 施加两道硬预算：重规划轮数上限与单次角色调用时限。
//! 状态（RunState）由循环独占持有，每次转移追加一条审计记录。

use std::future::Future;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::core::{AgentError, RunState};
use crate::index::{EmbeddingIndex, RetrievalIndex};
use crate::llm::{LlmClient, OpenAiClient, OpenAiEmbedder};
use crate::roles::{Planner, ReplanAction, Replanner, Solver, StepExecutor};
use crate::tools::browser::{BrowserDriver, BrowserToolset, CredentialStore};
use crate::tools::retrieval::build_retrieval_registry;
use crate::tools::ToolExecutor;

/// 执行器变体：决定注册哪套工具集（互斥，一次运行只启用一套）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorKind {
    /// 只读检索工具集（语料检索、链接探测、网页 / PDF 读取）
    Search,
    /// 浏览器自动化工具集（导航、点击、输入、上传，带自动截图）
    Browser,
}

impl ExecutorKind {
    /// 审计历史中使用的执行器角色名
    pub fn role_name(self) -> &'static str {
        match self {
            ExecutorKind::Search => "Search Executor",
            ExecutorKind::Browser => "Browser Executor",
        }
    }
}

impl FromStr for ExecutorKind {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "search" => Ok(ExecutorKind::Search),
            "browser" => Ok(ExecutorKind::Browser),
            other => Err(AgentError::InvalidExecutor(other.to_string())),
        }
    }
}

/// 四个角色各自的 LLM 客户端
pub struct RoleClients {
    pub planner: Arc<dyn LlmClient>,
    pub executor: Arc<dyn LlmClient>,
    pub replanner: Arc<dyn LlmClient>,
    pub solver: Arc<dyn LlmClient>,
}

impl RoleClients {
    /// 四个角色共用同一客户端（测试与单模型部署常用）
    pub fn shared(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            planner: llm.clone(),
            executor: llm.clone(),
            replanner: llm.clone(),
            solver: llm,
        }
    }
}

/// 编排状态机：持有四个角色、工具执行器与运行预算
pub struct ExecutionGraph {
    planner: Planner,
    executor: StepExecutor,
    replanner: Replanner,
    solver: Solver,
    tools: ToolExecutor,
    browser: Option<Arc<BrowserToolset>>,
    max_rounds: usize,
    turn_timeout: Duration,
    ready_timeout: Duration,
}

impl ExecutionGraph {
    /// 从配置构建：按执行器变体装配工具集，按角色装配 LLM 客户端
    pub fn from_config(kind: ExecutorKind, cfg: &AppConfig) -> Result<Self, AgentError> {
        let base_url = cfg.llm.base_url.as_deref();
        let clients = RoleClients {
            planner: role_client(base_url, &cfg.roles.planner),
            executor: role_client(base_url, &cfg.roles.executor),
            replanner: role_client(base_url, &cfg.roles.replanner),
            solver: role_client(base_url, &cfg.roles.solver),
        };

        match kind {
            ExecutorKind::Search => {
                let corpus_path = cfg.retrieval.corpus_path.as_ref().ok_or_else(|| {
                    AgentError::ConfigError(
                        "retrieval.corpus_path is required for the search executor".to_string(),
                    )
                })?;
                let embedder = Arc::new(OpenAiEmbedder::new(
                    base_url,
                    &cfg.llm.embedding_model,
                    None,
                ));
                let index = EmbeddingIndex::load(corpus_path, embedder)
                    .map_err(AgentError::ConfigError)?;
                Ok(Self::search(clients, Arc::new(index), cfg))
            }
            ExecutorKind::Browser => {
                #[cfg(feature = "browser")]
                {
                    let driver = Arc::new(crate::tools::browser::chrome::ChromeDriver::new());
                    Self::browser(clients, driver, cfg)
                }
                #[cfg(not(feature = "browser"))]
                {
                    let _ = clients;
                    Err(AgentError::ConfigError(
                        "built without the \"browser\" feature; no browser driver available"
                            .to_string(),
                    ))
                }
            }
        }
    }

    /// 装配检索变体（索引可注入，测试用假索引）
    pub fn search(
        clients: RoleClients,
        index: Arc<dyn RetrievalIndex>,
        cfg: &AppConfig,
    ) -> Self {
        let registry = build_retrieval_registry(index, &cfg.retrieval);
        let tools = ToolExecutor::new(registry, cfg.app.tool_timeout_secs);
        Self::assemble(clients, ExecutorKind::Search, tools, None, cfg)
    }

    /// 装配浏览器变体（驱动可注入）；凭据缺失或会话装配失败为致命错误
    pub fn browser(
        clients: RoleClients,
        driver: Arc<dyn BrowserDriver>,
        cfg: &AppConfig,
    ) -> Result<Self, AgentError> {
        let store = CredentialStore::from_config(&cfg.credentials);
        let toolset = Arc::new(BrowserToolset::new(driver, &store, &cfg.browser)?);
        let tools = ToolExecutor::new(toolset.registry(), cfg.app.tool_timeout_secs)
            .with_post_hook(toolset.snapshot_hook());
        Ok(Self::assemble(
            clients,
            ExecutorKind::Browser,
            tools,
            Some(toolset),
            cfg,
        ))
    }

    fn assemble(
        clients: RoleClients,
        kind: ExecutorKind,
        tools: ToolExecutor,
        browser: Option<Arc<BrowserToolset>>,
        cfg: &AppConfig,
    ) -> Self {
        Self {
            planner: Planner::new(clients.planner, cfg.roles.planner.system_prompt.clone()),
            executor: StepExecutor::new(
                kind.role_name(),
                clients.executor,
                cfg.roles.executor.system_prompt.clone(),
            ),
            replanner: Replanner::new(
                clients.replanner,
                cfg.roles.replanner.system_prompt.clone(),
            ),
            solver: Solver::new(clients.solver, cfg.roles.solver.system_prompt.clone()),
            tools,
            browser,
            max_rounds: cfg.app.max_rounds,
            turn_timeout: Duration::from_secs(cfg.app.turn_timeout_secs),
            ready_timeout: Duration::from_secs(cfg.browser.ready_timeout_secs),
        }
    }

    /// 等待浏览器会话预热完成；检索变体下为空操作
    pub async fn wait_browser_ready(&self) -> Result<(), AgentError> {
        match &self.browser {
            Some(toolset) => toolset.wait_ready(self.ready_timeout).await,
            None => Ok(()),
        }
    }

    /// 最近一次自动截图名称（检索变体下恒为 None）
    pub fn current_snapshot_name(&self) -> Option<String> {
        self.browser.as_ref().and_then(|t| t.current_snapshot_name())
    }

    /// 设置截图输出目录；检索变体下为空操作
    pub fn set_screenshot_dir(&self, dir: PathBuf) {
        if let Some(toolset) = &self.browser {
            toolset.set_screenshot_dir(dir);
        }
    }

    /// 运行到终态，返回最终回答
    pub async fn run(&self, goal: &str) -> Result<String, AgentError> {
        self.run_detailed(goal).await.map(|(answer, _)| answer)
    }

    /// 运行到终态，返回最终回答与完整运行状态（审计用）
    pub async fn run_detailed(&self, goal: &str) -> Result<(String, RunState), AgentError> {
        let run_id = uuid::Uuid::new_v4();
        tracing::info!(run_id = %run_id, goal, "run started");

        let mut state = RunState::new(goal);
        if let Some(toolset) = &self.browser {
            toolset.wait_ready(self.ready_timeout).await?;
        }

        let plan = self.turn("Planner", self.planner.plan(&state.goal)).await?;
        tracing::info!(steps = plan.steps.len(), "initial plan");
        state.record("Planner", serde_json::json!(&plan.steps));
        state.replace_plan(plan.steps);

        let executor_name = self.executor.name().to_string();
        let mut rounds = 0usize;
        loop {
            if rounds >= self.max_rounds {
                tracing::warn!(rounds, "round budget exceeded");
                return Err(AgentError::RoundBudgetExceeded(rounds));
            }

            let (task, result) = self
                .turn(
                    &executor_name,
                    self.executor.execute_step(&self.tools, &state.plan),
                )
                .await?;
            state.record(
                &executor_name,
                serde_json::json!({"task": &task, "result": &result}),
            );
            state.push_completed(task, result);

            let action = self
                .turn(
                    "Replanner",
                    self.replanner
                        .replan(&state.goal, &state.plan, &state.completed_steps),
                )
                .await?;
            match action {
                ReplanAction::Respond { response } => {
                    state.record("Replanner", serde_json::json!({"response": &response}));
                    state.final_answer = Some(response);
                }
                ReplanAction::Plan { steps } => {
                    state.record("Replanner", serde_json::json!({"steps": &steps}));
                    state.replace_plan(steps);
                }
            }

            if state.is_solved() {
                break;
            }
            rounds += 1;
        }

        let answer = self
            .turn(
                "Solver",
                self.solver.solve(&state.goal, &state.history_transcript()),
            )
            .await?;
        tracing::info!(run_id = %run_id, rounds, "run finished");
        Ok((answer, state))
    }

    /// 给单次角色调用施加时限；Executor 的整个工具循环算一次调用
    async fn turn<T>(
        &self,
        role: &str,
        fut: impl Future<Output = Result<T, AgentError>>,
    ) -> Result<T, AgentError> {
        match tokio::time::timeout(self.turn_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(AgentError::TurnTimeout(role.to_string())),
        }
    }
}

fn role_client(
    base_url: Option<&str>,
    role: &crate::config::RoleSection,
) -> Arc<dyn LlmClient> {
    let mut client = OpenAiClient::new(base_url, &role.model, None);
    if let Some(t) = role.temperature {
        client = client.with_temperature(t);
    }
    Arc::new(client)
}
