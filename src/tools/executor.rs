//! 工具执行器
//!
//! 持有 ToolRegistry 与全局超时，execute(tool_name, args) 在超时内调用 registry.execute，
//! 超时转为 AgentError::ToolTimeout；每次调用输出结构化审计日志（JSON）。
//! 变更型工具调用成功后触发后置钩子（浏览器工具集用它做自动截图），
//! 钩子位于分发层，工具实现本身不关心副作用顺序。

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::time::timeout;

use crate::core::AgentError;
use crate::tools::ToolRegistry;

/// 变更后置钩子：在每次变更型工具调用成功后被分发层调用一次
#[async_trait]
pub trait PostActionHook: Send + Sync {
    async fn after_mutation(&self, tool_name: &str) -> Result<(), String>;
}

/// 工具执行器：对每次调用施加超时，并将结果映射为 AgentError
pub struct ToolExecutor {
    registry: ToolRegistry,
    timeout: Duration,
    post_hook: Option<Arc<dyn PostActionHook>>,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
            post_hook: None,
        }
    }

    /// 注册变更后置钩子（浏览器工具集：自动截图）
    pub fn with_post_hook(mut self, hook: Arc<dyn PostActionHook>) -> Self {
        self.post_hook = Some(hook);
        self
    }

    /// 执行指定工具；超时返回 ToolTimeout；输出 JSON 审计日志；
    /// 变更型调用成功后触发后置钩子，钩子失败只记日志不改变结果
    pub async fn execute(
        &self,
        tool_name: &str,
        args: serde_json::Value,
    ) -> Result<String, AgentError> {
        let start = Instant::now();
        let args_preview = args_preview(&args);
        let mutating = self
            .registry
            .get(tool_name)
            .map(|t| t.mutating())
            .unwrap_or(false);

        let result = timeout(self.timeout, self.registry.execute(tool_name, args)).await;

        let (ok, outcome): (bool, &str) = match &result {
            Ok(Ok(_)) => (true, "ok"),
            Ok(Err(_)) => (false, "error"),
            Err(_) => (false, "timeout"),
        };
        let duration_ms = start.elapsed().as_millis() as u64;
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool_name,
            "ok": ok,
            "outcome": outcome,
            "mutating": mutating,
            "duration_ms": duration_ms,
            "args_preview": args_preview,
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        let content = match result {
            Ok(Ok(content)) => content,
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(AgentError::ToolTimeout(tool_name.to_string())),
        };

        if mutating {
            if let Some(hook) = &self.post_hook {
                if let Err(e) = hook.after_mutation(tool_name).await {
                    tracing::warn!(tool = tool_name, error = %e, "post-action hook failed");
                }
            }
        }

        Ok(content)
    }

    pub fn get_tool(&self, name: &str) -> Option<Arc<dyn crate::tools::Tool>> {
        self.registry.get(name)
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.registry.tool_names()
    }

    /// 工具目录 JSON，供 Executor 角色嵌入 system prompt
    pub fn catalog_json(&self) -> String {
        self.registry.to_schema_json()
    }
}

fn args_preview(args: &serde_json::Value) -> String {
    let s = args.to_string();
    if s.len() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::Tool;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }
        fn description(&self) -> &str {
            "Sleeps for a while"
        }
        async fn execute(&self, _args: serde_json::Value) -> Result<String, String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("done".to_string())
        }
    }

    struct MutatingTool;

    #[async_trait]
    impl Tool for MutatingTool {
        fn name(&self) -> &str {
            "mutate"
        }
        fn description(&self) -> &str {
            "Mutates session state"
        }
        fn mutating(&self) -> bool {
            true
        }
        async fn execute(&self, _args: serde_json::Value) -> Result<String, String> {
            Ok("mutated".to_string())
        }
    }

    struct CountingHook {
        count: AtomicUsize,
    }

    #[async_trait]
    impl PostActionHook for CountingHook {
        async fn after_mutation(&self, _tool_name: &str) -> Result<(), String> {
            self.count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_tool_timeout() {
        let mut registry = ToolRegistry::new();
        registry.register(SlowTool);
        let executor = ToolExecutor::new(registry, 1);
        let err = executor.execute("slow", serde_json::json!({})).await;
        assert!(matches!(err, Err(AgentError::ToolTimeout(_))));
    }

    #[tokio::test]
    async fn test_post_hook_fires_once_per_mutating_call() {
        let mut registry = ToolRegistry::new();
        registry.register(MutatingTool);
        let hook = Arc::new(CountingHook {
            count: AtomicUsize::new(0),
        });
        let executor = ToolExecutor::new(registry, 5).with_post_hook(hook.clone());
        executor.execute("mutate", serde_json::json!({})).await.unwrap();
        executor.execute("mutate", serde_json::json!({})).await.unwrap();
        assert_eq!(hook.count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_post_hook_skipped_for_read_only_tool() {
        struct ReadTool;
        #[async_trait]
        impl Tool for ReadTool {
            fn name(&self) -> &str {
                "read"
            }
            fn description(&self) -> &str {
                "Reads state"
            }
            async fn execute(&self, _args: serde_json::Value) -> Result<String, String> {
                Ok("content".to_string())
            }
        }
        let mut registry = ToolRegistry::new();
        registry.register(ReadTool);
        let hook = Arc::new(CountingHook {
            count: AtomicUsize::new(0),
        });
        let executor = ToolExecutor::new(registry, 5).with_post_hook(hook.clone());
        executor.execute("read", serde_json::json!({})).await.unwrap();
        assert_eq!(hook.count.load(Ordering::SeqCst), 0);
    }
}
