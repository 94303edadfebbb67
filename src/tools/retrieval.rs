//! 检索工具集：语料检索、链接爬取、页面阅读、PDF 阅读
//!
//! 全部为只读工具；任何网络抓取失败都以错误字符串返回（由 Executor 角色折叠为
//! 观察文本），不向上抛出，推理循环在抓取失败后可继续。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use regex::Regex;
use reqwest::Client;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::config::RetrievalSection;
use crate::index::RetrievalIndex;
use crate::tools::{Tool, ToolRegistry};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// 构建检索工具集的注册表
pub fn build_retrieval_registry(
    index: Arc<dyn RetrievalIndex>,
    cfg: &RetrievalSection,
) -> ToolRegistry {
    let client = http_client(cfg.fetch_timeout_secs);
    let mut registry = ToolRegistry::new();
    registry.register(CorpusSearchTool {
        index,
        top_k: cfg.top_k,
    });
    registry.register(LinkCrawlerTool {
        client: client.clone(),
        probe_timeout: Duration::from_secs(cfg.probe_timeout_secs),
    });
    registry.register(PageReaderTool {
        client: client.clone(),
        max_result_chars: cfg.max_result_chars,
    });
    registry.register(PdfReaderTool { client });
    registry
}

fn http_client(timeout_secs: u64) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_default()
}

fn schema_of<T: JsonSchema>() -> Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// corpus_search

#[derive(Debug, Deserialize, JsonSchema)]
struct QueryArgs {
    /// Query text for similarity search
    query: String,
}

/// 语料检索工具：查询 → top-k (段落, 链接)，拼接为 "link: …\n正文" 块
struct CorpusSearchTool {
    index: Arc<dyn RetrievalIndex>,
    top_k: usize,
}

#[async_trait]
impl Tool for CorpusSearchTool {
    fn name(&self) -> &str {
        "corpus_search"
    }

    fn description(&self) -> &str {
        "Similarity search over the indexed website corpus. Args: {\"query\": \"...\"}. Returns top passages with their source links."
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<QueryArgs>()
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let args: QueryArgs = serde_json::from_value(args).map_err(|e| e.to_string())?;
        tracing::info!(query = %args.query, "corpus search");
        let passages = self.index.search(&args.query, self.top_k).await?;
        let mut result = String::new();
        for p in &passages {
            result.push_str("link: ");
            result.push_str(&p.link);
            result.push('\n');
            result.push_str(&p.text);
            result.push('\n');
        }
        Ok(result)
    }
}

// ---------------------------------------------------------------------------
// link_crawler

#[derive(Debug, Deserialize, JsonSchema)]
struct UrlArgs {
    /// Page URL to operate on
    url: String,
}

/// 链接爬取工具：抓取页面、提取全部超链接、相对引用按页面自身 URL 解析、
/// 并发探测每条候选的可达性（短超时），探测失败或超时的直接丢弃
struct LinkCrawlerTool {
    client: Client,
    probe_timeout: Duration,
}

/// 从 HTML 中提取 (锚文本, href)；锚文本内部标签被剥掉，空文本与空 href 跳过
pub(crate) fn extract_anchors(html: &str) -> Vec<(String, String)> {
    // 锚文本可跨行，(?is) 使 . 匹配换行且忽略大小写
    let re = Regex::new(r#"(?is)<a\s[^>]*?href\s*=\s*["']([^"']*)["'][^>]*>(.*?)</a>"#)
        .expect("anchor regex");
    let tag_re = Regex::new(r"(?s)<[^>]*>").expect("tag regex");
    re.captures_iter(html)
        .filter_map(|cap| {
            let href = cap.get(1).map(|m| m.as_str().trim())?;
            let inner = cap.get(2).map(|m| m.as_str())?;
            let title = tag_re.replace_all(inner, "").trim().to_string();
            if href.is_empty() || title.is_empty() {
                return None;
            }
            Some((title, href.to_string()))
        })
        .collect()
}

/// 解析单条 href：绝对地址原样通过，相对地址按 base 解析，空 href 返回 None
pub(crate) fn resolve_href(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }
    base.join(href).ok().map(|u| u.to_string())
}

impl LinkCrawlerTool {
    /// 并发探测候选链接；仅保留成功响应的
    async fn probe_links(&self, candidates: Vec<(String, String)>) -> Vec<(String, String)> {
        let probes = candidates.into_iter().map(|(title, url)| {
            let client = self.client.clone();
            let probe_timeout = self.probe_timeout;
            async move {
                let probe = tokio::time::timeout(probe_timeout, client.get(&url).send()).await;
                match probe {
                    Ok(Ok(resp)) if resp.status().is_success() => Some((title, url)),
                    Ok(Ok(resp)) => {
                        tracing::debug!(url = %url, status = %resp.status(), "probe rejected");
                        None
                    }
                    Ok(Err(e)) => {
                        tracing::debug!(url = %url, error = %e, "probe failed");
                        None
                    }
                    Err(_) => {
                        tracing::debug!(url = %url, "probe timeout");
                        None
                    }
                }
            }
        });
        join_all(probes).await.into_iter().flatten().collect()
    }
}

#[async_trait]
impl Tool for LinkCrawlerTool {
    fn name(&self) -> &str {
        "link_crawler"
    }

    fn description(&self) -> &str {
        "Fetch a web page and extract all hyperlinks on it, returning only links that respond. Args: {\"url\": \"https://...\"}."
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<UrlArgs>()
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let args: UrlArgs = serde_json::from_value(args).map_err(|e| e.to_string())?;
        let base = Url::parse(args.url.trim())
            .map_err(|e| format!("Invalid URL [{}]: {}", args.url, e))?;

        let resp = self
            .client
            .get(base.clone())
            .send()
            .await
            .map_err(|e| format!("Can not access [{}]: {}", base, e))?;
        if !resp.status().is_success() {
            return Err(format!("Can not access [{}]: HTTP {}", base, resp.status()));
        }
        let html = resp
            .text()
            .await
            .map_err(|e| format!("Read body [{}]: {}", base, e))?;

        let candidates: Vec<(String, String)> = extract_anchors(&html)
            .into_iter()
            .filter_map(|(title, href)| resolve_href(&base, &href).map(|url| (title, url)))
            .collect();

        let reachable = self.probe_links(candidates).await;
        tracing::info!(url = %base, count = reachable.len(), "links crawled");

        Ok(reachable
            .iter()
            .map(|(title, url)| format!("[{}]: [{}]", title, url))
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

// ---------------------------------------------------------------------------
// page_reader

/// 页面阅读工具：抓取页面、剥离标记、去掉空行
struct PageReaderTool {
    client: Client,
    max_result_chars: usize,
}

#[async_trait]
impl Tool for PageReaderTool {
    fn name(&self) -> &str {
        "page_reader"
    }

    fn description(&self) -> &str {
        "Fetch a web page and return its readable text content. Args: {\"url\": \"https://...\"}."
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<UrlArgs>()
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let args: UrlArgs = serde_json::from_value(args).map_err(|e| e.to_string())?;
        let url = args.url.trim();
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("Can not access [{}]: {}", url, e))?;
        if !resp.status().is_success() {
            return Err(format!("Can not access [{}]: HTTP {}", url, resp.status()));
        }
        let html = resp
            .text()
            .await
            .map_err(|e| format!("Read body [{}]: {}", url, e))?;

        let text = match html2text::from_read(html.as_bytes(), 120) {
            Ok(t) => t,
            Err(e) => return Err(format!("Extract text [{}]: {}", url, e)),
        };
        let cleaned = text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        Ok(truncate_chars(&cleaned, self.max_result_chars))
    }
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        s.chars().take(max_chars).collect::<String>() + "\n...[truncated]"
    } else {
        s.to_string()
    }
}

// ---------------------------------------------------------------------------
// pdf_reader

/// PDF 阅读工具：抓取字节、解码各页文本并拼接
struct PdfReaderTool {
    client: Client,
}

#[async_trait]
impl Tool for PdfReaderTool {
    fn name(&self) -> &str {
        "pdf_reader"
    }

    fn description(&self) -> &str {
        "Fetch a PDF file by URL and return its extracted text. Args: {\"url\": \"https://....pdf\"}."
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<UrlArgs>()
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let args: UrlArgs = serde_json::from_value(args).map_err(|e| e.to_string())?;
        let url = args.url.trim();
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("Can not access PDF [{}]: {}", url, e))?;
        if !resp.status().is_success() {
            return Err(format!("PDF download failed [{}]: HTTP {}", url, resp.status()));
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| format!("Read PDF bytes [{}]: {}", url, e))?;

        pdf_extract::extract_text_from_mem(&bytes)
            .map_err(|e| format!("Decode PDF [{}]: {}", url, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_anchors_skips_empty() {
        let html = r#"
            <a href="a.html">Page A</a>
            <a href="http://other.com/b">Other</a>
            <a href="">Empty href</a>
            <a href="c.html">   </a>
        "#;
        let anchors = extract_anchors(html);
        assert_eq!(anchors.len(), 2);
        assert_eq!(anchors[0], ("Page A".to_string(), "a.html".to_string()));
        assert_eq!(anchors[1].1, "http://other.com/b");
    }

    #[test]
    fn test_extract_anchors_strips_inner_tags() {
        let html = r#"<a href="x.html"><span>Go</span> here</a>"#;
        let anchors = extract_anchors(html);
        assert_eq!(anchors[0].0, "Go here");
    }

    #[test]
    fn test_resolve_href_relative_absolute_empty() {
        let base = Url::parse("http://site.edu/dir/index.html").unwrap();
        assert_eq!(
            resolve_href(&base, "a.html").as_deref(),
            Some("http://site.edu/dir/a.html")
        );
        assert_eq!(
            resolve_href(&base, "http://other.com/b").as_deref(),
            Some("http://other.com/b")
        );
        assert_eq!(resolve_href(&base, ""), None);
    }

    #[test]
    fn test_resolve_href_root_relative() {
        let base = Url::parse("http://site.edu/dir/index.html").unwrap();
        assert_eq!(
            resolve_href(&base, "/top.html").as_deref(),
            Some("http://site.edu/top.html")
        );
    }

    #[tokio::test]
    async fn test_fetch_failure_is_text_error() {
        // 连接拒绝：本地未监听的端口
        let client = http_client(2);
        let tool = PageReaderTool {
            client,
            max_result_chars: 1000,
        };
        let err = tool
            .execute(serde_json::json!({"url": "http://127.0.0.1:1/none"}))
            .await
            .unwrap_err();
        assert!(err.contains("Can not access"));
    }

    #[test]
    fn test_truncate_chars() {
        let s = "abcdef";
        assert_eq!(truncate_chars(s, 10), "abcdef");
        assert!(truncate_chars(s, 3).starts_with("abc"));
        assert!(truncate_chars(s, 3).contains("[truncated]"));
    }
}
