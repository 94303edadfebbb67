//! BrowserDriver 的 Headless Chrome 实现
//!
//! 需启用 feature "browser" 且系统已安装 Chrome/Chromium。
//! 定位用 XPath：可见文本 / name 属性 / id / aria-label + 序号。

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::protocol::cdp::DOM::SetFileInputFiles;
use headless_chrome::{Browser, Tab};

use crate::tools::browser::BrowserDriver;

/// Chrome 驱动：单会话，tab 为共享游标
#[derive(Default)]
pub struct ChromeDriver {
    browser: Mutex<Option<Browser>>,
    tab: Mutex<Option<Arc<Tab>>>,
}

impl ChromeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn tab(&self) -> Result<Arc<Tab>, String> {
        self.tab
            .lock()
            .map_err(|e| e.to_string())?
            .clone()
            .ok_or_else(|| "Browser session not created".to_string())
    }

    fn click_xpath(&self, xpath: &str, what: &str) -> Result<String, String> {
        let tab = self.tab()?;
        let element = tab
            .wait_for_xpath(xpath)
            .map_err(|e| format!("{} not found: {}", what, e))?;
        element.click().map_err(|e| format!("Click failed: {}", e))?;
        Ok(format!("Clicked {}", what))
    }

    fn type_xpath(&self, xpath: &str, what: &str, text: &str) -> Result<String, String> {
        let tab = self.tab()?;
        let element = tab
            .wait_for_xpath(xpath)
            .map_err(|e| format!("{} not found: {}", what, e))?;
        element
            .click()
            .and_then(|el| el.type_into(text))
            .map_err(|e| format!("Type failed: {}", e))?;
        Ok(format!("Typed into {}", what))
    }
}

impl BrowserDriver for ChromeDriver {
    fn create_session(&self) -> Result<String, String> {
        let browser = Browser::default().map_err(|e| format!("Launch failed: {}", e))?;
        let tab = browser
            .new_tab()
            .map_err(|e| format!("New tab failed: {}", e))?;
        *self.tab.lock().map_err(|e| e.to_string())? = Some(tab);
        *self.browser.lock().map_err(|e| e.to_string())? = Some(browser);
        Ok("Browser session created".to_string())
    }

    fn navigate(&self, url: &str) -> Result<String, String> {
        let tab = self.tab()?;
        tab.navigate_to(url)
            .and_then(|t| t.wait_until_navigated())
            .map_err(|e| format!("Navigate failed: {}", e))?;
        Ok(format!("Navigated to {}", url))
    }

    fn page_content(&self) -> Result<String, String> {
        let tab = self.tab()?;
        tab.get_content().map_err(|e| format!("Get content failed: {}", e))
    }

    fn click_button_by_text(&self, text: &str) -> Result<String, String> {
        self.click_xpath(
            &format!("//button[contains(normalize-space(.), '{}')]", text),
            &format!("button '{}'", text),
        )
    }

    fn click_input_by_label(&self, label: &str) -> Result<String, String> {
        self.click_xpath(
            &format!(
                "//input[@id=string(//label[contains(normalize-space(.), '{}')]/@for)]",
                label
            ),
            &format!("input labelled '{}'", label),
        )
    }

    fn click_input_by_value(&self, value: &str) -> Result<String, String> {
        self.click_xpath(
            &format!("//input[@value='{}']", value),
            &format!("input with value '{}'", value),
        )
    }

    fn click_input_by_id(&self, id: &str) -> Result<String, String> {
        self.click_xpath(
            &format!("//input[@id='{}']", id),
            &format!("input #{}", id),
        )
    }

    fn input_by_label(&self, label: &str, text: &str) -> Result<String, String> {
        self.type_xpath(
            &format!(
                "//input[@id=string(//label[contains(normalize-space(.), '{}')]/@for)]",
                label
            ),
            &format!("input labelled '{}'", label),
            text,
        )
    }

    fn input_by_name(&self, name: &str, text: &str) -> Result<String, String> {
        self.type_xpath(
            &format!("//*[@name='{}']", name),
            &format!("element named '{}'", name),
            text,
        )
    }

    fn select_option(&self, option_text: &str) -> Result<String, String> {
        self.click_xpath(
            &format!("//option[normalize-space(text())='{}']", option_text),
            &format!("option '{}'", option_text),
        )
    }

    fn click_by_aria_label(&self, label: &str, index: usize) -> Result<String, String> {
        self.click_xpath(
            &format!("(//span[@aria-label='{}'])[{}]", label, index),
            &format!("span aria-label '{}' [{}]", label, index),
        )
    }

    fn upload_file(&self, id: &str, file_path: &str) -> Result<String, String> {
        let tab = self.tab()?;
        let element = tab
            .wait_for_xpath(&format!("//input[@id='{}']", id))
            .map_err(|e| format!("File input #{} not found: {}", id, e))?;
        tab.call_method(SetFileInputFiles {
            files: vec![file_path.to_string()],
            node_id: None,
            backend_node_id: Some(element.backend_node_id),
            object_id: None,
        })
        .map_err(|e| format!("Upload failed: {}", e))?;
        Ok(format!("Uploaded {} to #{}", file_path, id))
    }

    fn capture_snapshot(&self, dir: &Path, name: &str) -> Result<String, String> {
        let tab = self.tab()?;
        let png = tab
            .capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
            .map_err(|e| format!("Screenshot failed: {}", e))?;
        fs::create_dir_all(dir).map_err(|e| e.to_string())?;
        let path = dir.join(format!("{}.png", name));
        fs::write(&path, png).map_err(|e| e.to_string())?;
        Ok(path.display().to_string())
    }
}
