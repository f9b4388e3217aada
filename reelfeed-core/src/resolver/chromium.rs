use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as ChromiumConfig};
use chromiumoxide::cdp::browser_protocol::page::{
    GetNavigationHistoryParams, NavigateParams, NavigateToHistoryEntryParams,
};
use chromiumoxide::cdp::browser_protocol::target::CreateTargetParams;
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::BrowserSection;

use super::error::{ResolverError, ResolverResult};
use super::session::{AnchorSnapshot, GatePage, SessionFactory};

const HANDLER_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Launches a fresh headless Chromium for every session.
#[derive(Debug, Clone)]
pub struct ChromiumSessionFactory {
    config: Arc<BrowserSection>,
    user_agent: String,
}

impl ChromiumSessionFactory {
    pub fn new(config: BrowserSection, user_agent: impl Into<String>) -> Self {
        Self {
            config: Arc::new(config),
            user_agent: user_agent.into(),
        }
    }

    pub fn config(&self) -> &BrowserSection {
        &self.config
    }

    fn build_chromium_config(&self) -> ResolverResult<ChromiumConfig> {
        let mut builder = ChromiumConfig::builder().chrome_executable(&self.config.executable_path);

        if !self.config.headless {
            builder = builder.with_head();
        }
        if !self.config.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(seconds) = self.config.request_timeout_seconds {
            builder = builder.request_timeout(Duration::from_secs(seconds));
        }

        let mut args = vec![format!("--user-agent={}", self.user_agent)];
        if self.config.disable_gpu {
            args.push("--disable-gpu".into());
        }
        args.push("--no-first-run".into());
        args.extend(self.config.extra_args.iter().cloned());
        builder = builder.args(args);

        builder.build().map_err(ResolverError::Configuration)
    }
}

#[async_trait(?Send)]
impl SessionFactory for ChromiumSessionFactory {
    async fn open(&self) -> ResolverResult<Box<dyn GatePage>> {
        let chromium_config = self.build_chromium_config()?;
        info!(
            executable = %self.config.executable_path,
            headless = self.config.headless,
            "Launching Chromium instance"
        );

        let (browser, mut handler) = Browser::launch(chromium_config)
            .await
            .map_err(|err| ResolverError::Launch(err.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(error = %err, "Chromium handler reported error");
                }
            }
        });

        let params = CreateTargetParams::new("about:blank");
        let page = match browser.new_page(params).await {
            Ok(page) => page,
            Err(err) => {
                let mut session = ChromiumSession {
                    browser: Some(browser),
                    page: None,
                    handler_task: Some(handler_task),
                };
                session.close().await?;
                return Err(ResolverError::Launch(format!("failed to open page: {err}")));
            }
        };

        Ok(Box::new(ChromiumSession {
            browser: Some(browser),
            page: Some(page),
            handler_task: Some(handler_task),
        }))
    }
}

/// A launched browser with the single page the resolver works on.
#[derive(Debug)]
pub struct ChromiumSession {
    browser: Option<Browser>,
    page: Option<Page>,
    handler_task: Option<JoinHandle<()>>,
}

impl ChromiumSession {
    fn page(&self) -> ResolverResult<&Page> {
        self.page
            .as_ref()
            .ok_or_else(|| ResolverError::Unexpected("page already closed".into()))
    }

    async fn wait_for_navigation(&self, what: &str, limit: Duration) -> ResolverResult<()> {
        let page = self.page()?;
        match timeout(limit, page.wait_for_navigation()).await {
            Ok(result) => {
                result?;
                Ok(())
            }
            Err(_) => Err(ResolverError::Timeout(what.to_string())),
        }
    }
}

#[async_trait(?Send)]
impl GatePage for ChromiumSession {
    async fn goto(&mut self, url: &str, limit: Duration) -> ResolverResult<String> {
        let page = self.page()?;
        let params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(ResolverError::Configuration)?;
        let navigation = async {
            page.goto(params).await?;
            page.wait_for_navigation().await?;
            Ok::<_, chromiumoxide::error::CdpError>(())
        };
        match timeout(limit, navigation).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                return Err(ResolverError::Navigation {
                    url: url.to_string(),
                    reason: err.to_string(),
                })
            }
            Err(_) => {
                return Err(ResolverError::Navigation {
                    url: url.to_string(),
                    reason: format!("timed out after {}s", limit.as_secs()),
                })
            }
        }
        self.current_url().await
    }

    async fn current_url(&mut self) -> ResolverResult<String> {
        Ok(self.page()?.url().await?.unwrap_or_default())
    }

    async fn text_of(&mut self, selector: &str) -> ResolverResult<Option<String>> {
        let elements = self.page()?.find_elements(selector).await?;
        match elements.first() {
            Some(element) => Ok(element.inner_text().await?),
            None => Ok(None),
        }
    }

    async fn click_and_wait(
        &mut self,
        selector: &str,
        limit: Duration,
    ) -> ResolverResult<Option<String>> {
        let elements = self.page()?.find_elements(selector).await?;
        let Some(trigger) = elements.first() else {
            return Ok(None);
        };
        trigger.click().await?;
        self.wait_for_navigation("navigation after gate click", limit)
            .await?;
        Ok(Some(self.current_url().await?))
    }

    async fn anchors(&mut self, selector: &str) -> ResolverResult<Vec<AnchorSnapshot>> {
        let elements = self.page()?.find_elements(selector).await?;
        let mut anchors = Vec::with_capacity(elements.len());
        for element in &elements {
            let text = element.inner_text().await?.unwrap_or_default();
            let href = element.attribute("href").await?;
            anchors.push(AnchorSnapshot { text, href });
        }
        Ok(anchors)
    }

    async fn go_back(&mut self, limit: Duration) -> ResolverResult<String> {
        let history = self
            .page()?
            .execute(GetNavigationHistoryParams::default())
            .await?
            .result;
        if history.current_index <= 0 {
            debug!("already at the first history entry");
            return self.current_url().await;
        }
        let previous = usize::try_from(history.current_index - 1)
            .ok()
            .and_then(|index| history.entries.get(index))
            .ok_or_else(|| ResolverError::Element("previous history entry".into()))?;
        self.page()?
            .execute(NavigateToHistoryEntryParams::new(previous.id))
            .await?;
        self.wait_for_navigation("history navigation", limit).await?;
        self.current_url().await
    }

    async fn close(&mut self) -> ResolverResult<()> {
        if let Some(page) = self.page.take() {
            if let Err(err) = page.close().await {
                debug!(error = %err, "failed to close page");
            }
        }
        if let Some(mut browser) = self.browser.take() {
            if let Err(err) = browser.close().await {
                warn!(error = %err, "Failed to close browser gracefully");
            }
        }
        if let Some(handle) = self.handler_task.take() {
            let abort = handle.abort_handle();
            match timeout(HANDLER_SHUTDOWN_GRACE, handle).await {
                Ok(Err(err)) if !err.is_cancelled() => {
                    warn!(error = %err, "Browser handler join error")
                }
                Ok(_) => {}
                Err(_) => {
                    warn!("Browser handler did not stop, aborting");
                    abort.abort();
                }
            }
        }
        Ok(())
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        if let Some(handle) = self.handler_task.take() {
            if !handle.is_finished() {
                warn!("ChromiumSession dropped without explicit close");
                handle.abort();
            }
        }
    }
}
