//! 浏览器自动化工具集
//!
//! 工具通过 BrowserDriver trait 操作单一进行中的浏览器会话（导航、定位点击、
//! 输入、下拉选择、上传）。三项横切关注点都在本模块解决：
//! - 变更型调用成功后由 SnapshotHook（分发层后置钩子）自动截图，顺序编号；
//! - 文本输入工具接受三值隐私标签（None / Account / Password），非 None 时
//!   忽略模型给出的文本、改用会话凭据，原始秘密不出现在模型可见文本中；
//! - 会话创建在构造时作为后台任务预热，首次自动化调用前须 wait_ready。

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::config::{BrowserSection, CredentialsSection};
use crate::core::AgentError;
use crate::tools::{PostActionHook, Tool, ToolRegistry};

#[cfg(feature = "browser")]
pub mod chrome;

// ---------------------------------------------------------------------------
// 凭据

/// 单个会话的隐私凭据
#[derive(Debug, Clone)]
pub struct Credentials {
    pub account: String,
    pub password: String,
}

/// 凭据表：会话 id → 凭据；构造期加载一次，缺失会话为致命错误
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    sessions: HashMap<String, Credentials>,
}

impl CredentialStore {
    pub fn from_config(cfg: &CredentialsSection) -> Self {
        let sessions = cfg
            .sessions
            .iter()
            .map(|(id, c)| {
                (
                    id.clone(),
                    Credentials {
                        account: c.account.clone(),
                        password: c.password.clone(),
                    },
                )
            })
            .collect();
        Self { sessions }
    }

    pub fn for_session(&self, session_id: &str) -> Result<Credentials, AgentError> {
        self.sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| AgentError::CredentialMissing(session_id.to_string()))
    }
}

/// 隐私分类标签：非 None 时由工具集内部做凭据替换
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, JsonSchema)]
pub enum PrivacyTag {
    #[default]
    None,
    Account,
    Password,
}

impl PrivacyTag {
    /// 解析实际输入文本：Account / Password 忽略模型提供的值
    fn resolve(self, supplied: &str, credentials: &Credentials) -> String {
        match self {
            PrivacyTag::None => supplied.to_string(),
            PrivacyTag::Account => credentials.account.clone(),
            PrivacyTag::Password => credentials.password.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// 驱动边界

/// 浏览器驱动接口：低层 DOM 操作在边界之外实现（Chrome 实现见 chrome 子模块）。
/// 每个动作返回文本状态；定位策略为 {可见文本, name 属性, id, aria-label+序号}。
pub trait BrowserDriver: Send + Sync {
    fn create_session(&self) -> Result<String, String>;
    fn navigate(&self, url: &str) -> Result<String, String>;
    fn page_content(&self) -> Result<String, String>;
    fn click_button_by_text(&self, text: &str) -> Result<String, String>;
    fn click_input_by_label(&self, label: &str) -> Result<String, String>;
    fn click_input_by_value(&self, value: &str) -> Result<String, String>;
    fn click_input_by_id(&self, id: &str) -> Result<String, String>;
    fn input_by_label(&self, label: &str, text: &str) -> Result<String, String>;
    fn input_by_name(&self, name: &str, text: &str) -> Result<String, String>;
    fn select_option(&self, option_text: &str) -> Result<String, String>;
    fn click_by_aria_label(&self, label: &str, index: usize) -> Result<String, String>;
    fn upload_file(&self, id: &str, file_path: &str) -> Result<String, String>;
    fn capture_snapshot(&self, dir: &Path, name: &str) -> Result<String, String>;
}

// ---------------------------------------------------------------------------
// 截图钩子

/// 截图状态：顺序计数、最近一次名称、输出目录（会话范围）
#[derive(Debug)]
struct SnapshotState {
    counter: AtomicUsize,
    last_name: Mutex<Option<String>>,
    dir: Mutex<PathBuf>,
}

/// 变更后置钩子实现：编号 page_snapshot_<n> 并调用驱动截图
pub struct SnapshotHook {
    driver: Arc<dyn BrowserDriver>,
    state: Arc<SnapshotState>,
}

#[async_trait]
impl PostActionHook for SnapshotHook {
    async fn after_mutation(&self, tool_name: &str) -> Result<(), String> {
        let n = self.state.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let name = format!("page_snapshot_{}", n);
        let dir = self
            .state
            .dir
            .lock()
            .map_err(|e| e.to_string())?
            .clone();
        self.driver.capture_snapshot(&dir, &name)?;
        tracing::info!(tool = tool_name, snapshot = %name, "auto snapshot");
        *self.state.last_name.lock().map_err(|e| e.to_string())? = Some(name);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// 工具集

/// 会话预热状态
enum WarmUp {
    Pending(tokio::task::JoinHandle<Result<String, String>>),
    Ready,
    Failed(String),
}

/// 浏览器工具集：持有驱动、截图状态与预热句柄；registry() 生成注册表，
/// snapshot_hook() 供 ToolExecutor 挂接
pub struct BrowserToolset {
    driver: Arc<dyn BrowserDriver>,
    credentials: Credentials,
    state: Arc<SnapshotState>,
    warm_up: tokio::sync::Mutex<WarmUp>,
}

impl BrowserToolset {
    /// 创建工具集并立即在后台预热浏览器会话；凭据按配置的会话 id 解析，缺失即失败
    pub fn new(
        driver: Arc<dyn BrowserDriver>,
        store: &CredentialStore,
        cfg: &BrowserSection,
    ) -> Result<Self, AgentError> {
        let credentials = store.for_session(&cfg.session_id)?;
        let state = Arc::new(SnapshotState {
            counter: AtomicUsize::new(0),
            last_name: Mutex::new(None),
            dir: Mutex::new(cfg.screenshot_dir.clone()),
        });
        let warm_driver = driver.clone();
        let handle = tokio::task::spawn_blocking(move || warm_driver.create_session());
        Ok(Self {
            driver,
            credentials,
            state,
            warm_up: tokio::sync::Mutex::new(WarmUp::Pending(handle)),
        })
    }

    /// 等待会话预热完成（有界超时）；自动化工具调用前必须先成功返回一次
    pub async fn wait_ready(&self, timeout: Duration) -> Result<(), AgentError> {
        let mut guard = self.warm_up.lock().await;
        match &mut *guard {
            WarmUp::Ready => Ok(()),
            WarmUp::Failed(e) => Err(AgentError::BrowserInit(e.clone())),
            WarmUp::Pending(handle) => {
                match tokio::time::timeout(timeout, handle).await {
                    Err(_) => Err(AgentError::BrowserNotReady(format!(
                        "still starting after {:?}",
                        timeout
                    ))),
                    Ok(Err(join_err)) => {
                        let e = format!("init task panicked: {}", join_err);
                        *guard = WarmUp::Failed(e.clone());
                        Err(AgentError::BrowserInit(e))
                    }
                    Ok(Ok(Err(e))) => {
                        *guard = WarmUp::Failed(e.clone());
                        Err(AgentError::BrowserInit(e))
                    }
                    Ok(Ok(Ok(status))) => {
                        tracing::info!(status = %status, "browser session ready");
                        *guard = WarmUp::Ready;
                        Ok(())
                    }
                }
            }
        }
    }

    /// 最近一次自动截图的名称
    pub fn current_snapshot_name(&self) -> Option<String> {
        self.state.last_name.lock().ok().and_then(|g| g.clone())
    }

    /// 设置截图输出目录（会话范围内即时生效）
    pub fn set_screenshot_dir(&self, dir: PathBuf) {
        if let Ok(mut g) = self.state.dir.lock() {
            tracing::info!(dir = %dir.display(), "screenshot dir set");
            *g = dir;
        }
    }

    /// 截图钩子，挂到 ToolExecutor 的变更后置钩子上
    pub fn snapshot_hook(&self) -> Arc<dyn PostActionHook> {
        Arc::new(SnapshotHook {
            driver: self.driver.clone(),
            state: self.state.clone(),
        })
    }

    /// 生成浏览器工具注册表
    pub fn registry(&self) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        let d = &self.driver;
        registry.register(NavigateTool { driver: d.clone() });
        registry.register(ReadPageTool { driver: d.clone() });
        registry.register(InputByLabelTool {
            driver: d.clone(),
            credentials: self.credentials.clone(),
        });
        registry.register(InputByNameTool {
            driver: d.clone(),
            credentials: self.credentials.clone(),
        });
        registry.register(ClickButtonByTextTool { driver: d.clone() });
        registry.register(ClickInputByLabelTool { driver: d.clone() });
        registry.register(ClickInputByValueTool { driver: d.clone() });
        registry.register(ClickInputByIdTool { driver: d.clone() });
        registry.register(SelectOptionTool { driver: d.clone() });
        registry.register(ClickByAriaLabelTool { driver: d.clone() });
        registry.register(UploadFileTool { driver: d.clone() });
        registry
    }
}

fn schema_of<T: JsonSchema>() -> Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// 工具实现

#[derive(Debug, Deserialize, JsonSchema)]
struct NavigateArgs {
    /// Destination URL
    url: String,
}

struct NavigateTool {
    driver: Arc<dyn BrowserDriver>,
}

#[async_trait]
impl Tool for NavigateTool {
    fn name(&self) -> &str {
        "navigate"
    }
    fn description(&self) -> &str {
        "Navigate the browser session to the specified URL. Args: {\"url\": \"https://...\"}."
    }
    fn parameters_schema(&self) -> Value {
        schema_of::<NavigateArgs>()
    }
    fn mutating(&self) -> bool {
        true
    }
    async fn execute(&self, args: Value) -> Result<String, String> {
        let args: NavigateArgs = serde_json::from_value(args).map_err(|e| e.to_string())?;
        self.driver.navigate(&args.url)
    }
}

struct ReadPageTool {
    driver: Arc<dyn BrowserDriver>,
}

#[async_trait]
impl Tool for ReadPageTool {
    fn name(&self) -> &str {
        "read_page"
    }
    fn description(&self) -> &str {
        "Get the HTML content of the current web page to gain information for the current step."
    }
    async fn execute(&self, _args: Value) -> Result<String, String> {
        self.driver.page_content()
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct InputByLabelArgs {
    /// Visible text of the label attached to the input element
    label_text: String,
    /// Text to type; ignored when privacy is Account or Password
    input_text: String,
    #[serde(default)]
    privacy: PrivacyTag,
}

struct InputByLabelTool {
    driver: Arc<dyn BrowserDriver>,
    credentials: Credentials,
}

#[async_trait]
impl Tool for InputByLabelTool {
    fn name(&self) -> &str {
        "input_text_by_label"
    }
    fn description(&self) -> &str {
        "Input text into the element specified by its label text. For account or password fields set \"privacy\" to \"Account\" or \"Password\"; the real value is substituted internally and must not be written in input_text."
    }
    fn parameters_schema(&self) -> Value {
        schema_of::<InputByLabelArgs>()
    }
    fn mutating(&self) -> bool {
        true
    }
    async fn execute(&self, args: Value) -> Result<String, String> {
        let args: InputByLabelArgs = serde_json::from_value(args).map_err(|e| e.to_string())?;
        // 日志只记模型可见参数，替换后的真实值不落日志
        tracing::info!(label = %args.label_text, privacy = ?args.privacy, "input by label");
        let text = args.privacy.resolve(&args.input_text, &self.credentials);
        self.driver.input_by_label(&args.label_text, &text)
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct InputByNameArgs {
    /// Value of the element's name attribute
    name: String,
    /// Text to type; ignored when privacy is Account or Password
    input_text: String,
    #[serde(default)]
    privacy: PrivacyTag,
}

struct InputByNameTool {
    driver: Arc<dyn BrowserDriver>,
    credentials: Credentials,
}

#[async_trait]
impl Tool for InputByNameTool {
    fn name(&self) -> &str {
        "input_text_by_name"
    }
    fn description(&self) -> &str {
        "Input text into the element specified by its name attribute. For account or password fields set \"privacy\" to \"Account\" or \"Password\"; the real value is substituted internally and must not be written in input_text."
    }
    fn parameters_schema(&self) -> Value {
        schema_of::<InputByNameArgs>()
    }
    fn mutating(&self) -> bool {
        true
    }
    async fn execute(&self, args: Value) -> Result<String, String> {
        let args: InputByNameArgs = serde_json::from_value(args).map_err(|e| e.to_string())?;
        tracing::info!(name = %args.name, privacy = ?args.privacy, "input by name");
        let text = args.privacy.resolve(&args.input_text, &self.credentials);
        self.driver.input_by_name(&args.name, &text)
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ButtonTextArgs {
    /// Visible text of the button
    button_text: String,
}

struct ClickButtonByTextTool {
    driver: Arc<dyn BrowserDriver>,
}

#[async_trait]
impl Tool for ClickButtonByTextTool {
    fn name(&self) -> &str {
        "click_button_by_text"
    }
    fn description(&self) -> &str {
        "Click the button specified by its visible text."
    }
    fn parameters_schema(&self) -> Value {
        schema_of::<ButtonTextArgs>()
    }
    fn mutating(&self) -> bool {
        true
    }
    async fn execute(&self, args: Value) -> Result<String, String> {
        let args: ButtonTextArgs = serde_json::from_value(args).map_err(|e| e.to_string())?;
        self.driver.click_button_by_text(&args.button_text)
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct LabelArgs {
    /// Visible text of the label
    label_text: String,
}

struct ClickInputByLabelTool {
    driver: Arc<dyn BrowserDriver>,
}

#[async_trait]
impl Tool for ClickInputByLabelTool {
    fn name(&self) -> &str {
        "click_input_by_label"
    }
    fn description(&self) -> &str {
        "Click the input specified by its label text. Use case: checkbox with a label."
    }
    fn parameters_schema(&self) -> Value {
        schema_of::<LabelArgs>()
    }
    fn mutating(&self) -> bool {
        true
    }
    async fn execute(&self, args: Value) -> Result<String, String> {
        let args: LabelArgs = serde_json::from_value(args).map_err(|e| e.to_string())?;
        self.driver.click_input_by_label(&args.label_text)
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ValueArgs {
    /// Value attribute of the input
    value: String,
}

struct ClickInputByValueTool {
    driver: Arc<dyn BrowserDriver>,
}

#[async_trait]
impl Tool for ClickInputByValueTool {
    fn name(&self) -> &str {
        "click_input_by_value"
    }
    fn description(&self) -> &str {
        "Click the input specified by its value attribute."
    }
    fn parameters_schema(&self) -> Value {
        schema_of::<ValueArgs>()
    }
    fn mutating(&self) -> bool {
        true
    }
    async fn execute(&self, args: Value) -> Result<String, String> {
        let args: ValueArgs = serde_json::from_value(args).map_err(|e| e.to_string())?;
        self.driver.click_input_by_value(&args.value)
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct IdArgs {
    /// Element id
    id: String,
}

struct ClickInputByIdTool {
    driver: Arc<dyn BrowserDriver>,
}

#[async_trait]
impl Tool for ClickInputByIdTool {
    fn name(&self) -> &str {
        "click_input_by_id"
    }
    fn description(&self) -> &str {
        "Click the input specified by its id. Use case: input box without a label."
    }
    fn parameters_schema(&self) -> Value {
        schema_of::<IdArgs>()
    }
    fn mutating(&self) -> bool {
        true
    }
    async fn execute(&self, args: Value) -> Result<String, String> {
        let args: IdArgs = serde_json::from_value(args).map_err(|e| e.to_string())?;
        self.driver.click_input_by_id(&args.id)
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct OptionArgs {
    /// Visible text of the dropdown option
    option_text: String,
}

struct SelectOptionTool {
    driver: Arc<dyn BrowserDriver>,
}

#[async_trait]
impl Tool for SelectOptionTool {
    fn name(&self) -> &str {
        "select_dropdown_option"
    }
    fn description(&self) -> &str {
        "Select the dropdown option specified by its text."
    }
    fn parameters_schema(&self) -> Value {
        schema_of::<OptionArgs>()
    }
    fn mutating(&self) -> bool {
        true
    }
    async fn execute(&self, args: Value) -> Result<String, String> {
        let args: OptionArgs = serde_json::from_value(args).map_err(|e| e.to_string())?;
        self.driver.select_option(&args.option_text)
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct AriaLabelArgs {
    /// Accessible name of the element (e.g. a date inside a calendar)
    aria_label: String,
    /// 1-based index among elements sharing the aria-label (e.g. which calendar)
    #[serde(default = "default_aria_index")]
    index: usize,
}

fn default_aria_index() -> usize {
    1
}

struct ClickByAriaLabelTool {
    driver: Arc<dyn BrowserDriver>,
}

#[async_trait]
impl Tool for ClickByAriaLabelTool {
    fn name(&self) -> &str {
        "click_span_by_aria_label"
    }
    fn description(&self) -> &str {
        "Click the span specified by its aria-label. Use case: clicking a date inside a calendar; index selects among repeated elements."
    }
    fn parameters_schema(&self) -> Value {
        schema_of::<AriaLabelArgs>()
    }
    fn mutating(&self) -> bool {
        true
    }
    async fn execute(&self, args: Value) -> Result<String, String> {
        let args: AriaLabelArgs = serde_json::from_value(args).map_err(|e| e.to_string())?;
        self.driver.click_by_aria_label(&args.aria_label, args.index)
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct UploadArgs {
    /// Id of the file input element
    id: String,
    /// Local path of the file to upload
    file_path: String,
}

struct UploadFileTool {
    driver: Arc<dyn BrowserDriver>,
}

#[async_trait]
impl Tool for UploadFileTool {
    fn name(&self) -> &str {
        "upload_file_by_id"
    }
    fn description(&self) -> &str {
        "Upload a file from the given local path to the element specified by its id."
    }
    fn parameters_schema(&self) -> Value {
        schema_of::<UploadArgs>()
    }
    fn mutating(&self) -> bool {
        true
    }
    async fn execute(&self, args: Value) -> Result<String, String> {
        let args: UploadArgs = serde_json::from_value(args).map_err(|e| e.to_string())?;
        self.driver.upload_file(&args.id, &args.file_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CredentialSection;
    use crate::tools::ToolExecutor;

    /// 记录型驱动：记下每次调用与实际输入的文本
    #[derive(Default)]
    pub(crate) struct FakeDriver {
        pub calls: Mutex<Vec<String>>,
        pub snapshots: Mutex<Vec<String>>,
        pub fail_session: bool,
    }

    impl BrowserDriver for FakeDriver {
        fn create_session(&self) -> Result<String, String> {
            if self.fail_session {
                Err("chrome not found".to_string())
            } else {
                Ok("session created".to_string())
            }
        }
        fn navigate(&self, url: &str) -> Result<String, String> {
            self.calls.lock().unwrap().push(format!("navigate:{}", url));
            Ok(format!("Navigated to {}", url))
        }
        fn page_content(&self) -> Result<String, String> {
            self.calls.lock().unwrap().push("page_content".to_string());
            Ok("<html></html>".to_string())
        }
        fn click_button_by_text(&self, text: &str) -> Result<String, String> {
            self.calls.lock().unwrap().push(format!("click_button:{}", text));
            Ok("clicked".to_string())
        }
        fn click_input_by_label(&self, label: &str) -> Result<String, String> {
            self.calls.lock().unwrap().push(format!("click_label:{}", label));
            Ok("clicked".to_string())
        }
        fn click_input_by_value(&self, value: &str) -> Result<String, String> {
            self.calls.lock().unwrap().push(format!("click_value:{}", value));
            Ok("clicked".to_string())
        }
        fn click_input_by_id(&self, id: &str) -> Result<String, String> {
            self.calls.lock().unwrap().push(format!("click_id:{}", id));
            Ok("clicked".to_string())
        }
        fn input_by_label(&self, label: &str, text: &str) -> Result<String, String> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("input_label:{}={}", label, text));
            Ok("typed".to_string())
        }
        fn input_by_name(&self, name: &str, text: &str) -> Result<String, String> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("input_name:{}={}", name, text));
            Ok("typed".to_string())
        }
        fn select_option(&self, option_text: &str) -> Result<String, String> {
            self.calls.lock().unwrap().push(format!("select:{}", option_text));
            Ok("selected".to_string())
        }
        fn click_by_aria_label(&self, label: &str, index: usize) -> Result<String, String> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("aria:{}[{}]", label, index));
            Ok("clicked".to_string())
        }
        fn upload_file(&self, id: &str, file_path: &str) -> Result<String, String> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("upload:{}:{}", id, file_path));
            Ok("uploaded".to_string())
        }
        fn capture_snapshot(&self, _dir: &Path, name: &str) -> Result<String, String> {
            self.snapshots.lock().unwrap().push(name.to_string());
            Ok(name.to_string())
        }
    }

    fn store() -> CredentialStore {
        let mut cfg = CredentialsSection::default();
        cfg.sessions.insert(
            "s1".to_string(),
            CredentialSection {
                account: "user-123".to_string(),
                password: "s3cret!".to_string(),
            },
        );
        CredentialStore::from_config(&cfg)
    }

    fn browser_cfg() -> BrowserSection {
        BrowserSection {
            session_id: "s1".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_missing_session_is_fatal() {
        let driver = Arc::new(FakeDriver::default());
        let mut cfg = browser_cfg();
        cfg.session_id = "nope".to_string();
        let err = BrowserToolset::new(driver, &store(), &cfg);
        assert!(matches!(err, Err(AgentError::CredentialMissing(_))));
    }

    #[tokio::test]
    async fn test_privacy_substitution_never_leaks_secret() {
        let driver = Arc::new(FakeDriver::default());
        let toolset = BrowserToolset::new(driver.clone(), &store(), &browser_cfg()).unwrap();
        let registry = toolset.registry();

        // 模型可见参数里只有占位文本，真实值由工具集替换
        let visible_args = serde_json::json!({
            "label_text": "Password",
            "input_text": "<provided externally>",
            "privacy": "Password"
        });
        assert!(!visible_args.to_string().contains("s3cret!"));
        registry
            .execute("input_text_by_label", visible_args)
            .await
            .unwrap();

        let calls = driver.calls.lock().unwrap();
        assert_eq!(calls[0], "input_label:Password=s3cret!");
    }

    #[tokio::test]
    async fn test_privacy_account_by_name() {
        let driver = Arc::new(FakeDriver::default());
        let toolset = BrowserToolset::new(driver.clone(), &store(), &browser_cfg()).unwrap();
        let registry = toolset.registry();
        registry
            .execute(
                "input_text_by_name",
                serde_json::json!({
                    "name": "username",
                    "input_text": "ignored",
                    "privacy": "Account"
                }),
            )
            .await
            .unwrap();
        let calls = driver.calls.lock().unwrap();
        assert_eq!(calls[0], "input_name:username=user-123");
    }

    #[tokio::test]
    async fn test_privacy_none_passes_text_through() {
        let driver = Arc::new(FakeDriver::default());
        let toolset = BrowserToolset::new(driver.clone(), &store(), &browser_cfg()).unwrap();
        let registry = toolset.registry();
        registry
            .execute(
                "input_text_by_label",
                serde_json::json!({"label_text": "Search", "input_text": "office hours"}),
            )
            .await
            .unwrap();
        let calls = driver.calls.lock().unwrap();
        assert_eq!(calls[0], "input_label:Search=office hours");
    }

    #[tokio::test]
    async fn test_auto_snapshot_sequential_per_mutating_call() {
        let driver = Arc::new(FakeDriver::default());
        let toolset = BrowserToolset::new(driver.clone(), &store(), &browser_cfg()).unwrap();
        let executor =
            ToolExecutor::new(toolset.registry(), 5).with_post_hook(toolset.snapshot_hook());

        executor
            .execute("navigate", serde_json::json!({"url": "http://x.test"}))
            .await
            .unwrap();
        executor
            .execute(
                "click_button_by_text",
                serde_json::json!({"button_text": "Submit"}),
            )
            .await
            .unwrap();
        // 只读工具不截图
        executor.execute("read_page", serde_json::json!({})).await.unwrap();

        let snapshots = driver.snapshots.lock().unwrap();
        assert_eq!(*snapshots, vec!["page_snapshot_1", "page_snapshot_2"]);
        assert_eq!(
            toolset.current_snapshot_name().as_deref(),
            Some("page_snapshot_2")
        );
    }

    #[tokio::test]
    async fn test_wait_ready_succeeds_and_is_idempotent() {
        let driver = Arc::new(FakeDriver::default());
        let toolset = BrowserToolset::new(driver, &store(), &browser_cfg()).unwrap();
        toolset.wait_ready(Duration::from_secs(5)).await.unwrap();
        toolset.wait_ready(Duration::from_secs(5)).await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_ready_reports_init_failure() {
        let driver = Arc::new(FakeDriver {
            fail_session: true,
            ..Default::default()
        });
        let toolset = BrowserToolset::new(driver, &store(), &browser_cfg()).unwrap();
        let err = toolset.wait_ready(Duration::from_secs(5)).await;
        assert!(matches!(err, Err(AgentError::BrowserInit(_))));
        // 失败状态被记住
        let err = toolset.wait_ready(Duration::from_secs(5)).await;
        assert!(matches!(err, Err(AgentError::BrowserInit(_))));
    }
}
