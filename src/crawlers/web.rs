use crate::config::WebDriverConfig;
use crate::crawlers::PageRenderer;
use crate::error::RenderError;
use async_trait::async_trait;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::{Map, Value, json};
use std::time::Duration;

const SCROLL_SCRIPT: &str = "window.scrollTo(0, document.body.scrollHeight);";
const OUTER_HTML_SCRIPT: &str = "return document.documentElement.outerHTML";

/// Renders pages through a WebDriver server (e.g. ChromeDriver).
///
/// The session is opened lazily on first navigation and must be released with
/// [`PageRenderer::close`].
pub struct WebDriverRenderer {
    webdriver_url: String,
    headless: bool,
    client: Option<Client>,
}

impl WebDriverRenderer {
    pub fn new(config: &WebDriverConfig) -> Self {
        Self {
            webdriver_url: config.url.clone(),
            headless: config.headless,
            client: None,
        }
    }

    fn client(&self) -> Result<&Client, RenderError> {
        self.client
            .as_ref()
            .ok_or_else(|| RenderError::Session("no open WebDriver session".into()))
    }

    async fn ensure_connected(&mut self) -> Result<&Client, RenderError> {
        if self.client.is_none() {
            ::log::debug!("Connecting to WebDriver");
            let client = connect_to_webdriver(&self.webdriver_url, self.headless).await?;
            self.client = Some(client);
        }
        self.client()
    }
}

/// Chrome capabilities: optional headless mode, and automation markers hidden
pub fn chrome_capabilities(headless: bool) -> Map<String, Value> {
    let mut args = vec!["--no-sandbox", "--enable-javascript", "--disable-blink-features=AutomationControlled"];
    if headless {
        args.insert(0, "--headless=new");
    }

    let mut caps = Map::new();
    caps.insert("browserName".to_string(), json!("chrome"));
    caps.insert(
        "goog:chromeOptions".to_string(),
        json!({
            "args": args,
            "excludeSwitches": ["enable-automation"],
            "useAutomationExtension": false,
        }),
    );
    caps
}

/// Connects to the WebDriver instance, trying common local ports if the
/// configured one is unreachable
async fn connect_to_webdriver(webdriver_url: &str, headless: bool) -> Result<Client, RenderError> {
    let mut builder = ClientBuilder::native();
    builder.capabilities(chrome_capabilities(headless));

    match builder.connect(webdriver_url).await {
        Ok(client) => {
            ::log::debug!("Connected to WebDriver at {}", webdriver_url);
            return Ok(client);
        }
        Err(e) => {
            ::log::error!("Failed to connect to WebDriver at {}: {}", webdriver_url, e);
        }
    }

    let fallback_urls = [
        "http://localhost:9515", // ChromeDriver default
        "http://127.0.0.1:4444",
    ];

    for url in fallback_urls.iter() {
        if *url == webdriver_url {
            continue;
        }

        ::log::info!("Trying fallback WebDriver URL: {}", url);
        if let Ok(client) = builder.connect(url).await {
            ::log::debug!("Connected to fallback WebDriver at {}", url);
            return Ok(client);
        }
    }

    ::log::error!(
        "Make sure a WebDriver server is running or set the WEBDRIVER_URL environment variable"
    );
    Err(RenderError::Session(format!(
        "could not connect to any WebDriver server (tried {webdriver_url})"
    )))
}

#[async_trait]
impl PageRenderer for WebDriverRenderer {
    async fn goto(&mut self, url: &str) -> Result<(), RenderError> {
        let client = self.ensure_connected().await?;
        client.goto(url).await?;
        Ok(())
    }

    async fn wait_for_selector(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), RenderError> {
        let client = self.client()?;
        client
            .wait()
            .at_most(timeout)
            .for_element(Locator::Css(selector))
            .await
            .map_err(|e| {
                ::log::debug!("Waiting for {} failed: {}", selector, e);
                RenderError::NotReady {
                    selector: selector.to_string(),
                    timeout,
                }
            })?;
        Ok(())
    }

    async fn scroll_to_bottom(&mut self) -> Result<(), RenderError> {
        self.client()?.execute(SCROLL_SCRIPT, vec![]).await?;
        Ok(())
    }

    async fn outer_html(&mut self) -> Result<String, RenderError> {
        match self.client()?.execute(OUTER_HTML_SCRIPT, vec![]).await? {
            Value::String(html) => Ok(html),
            other => Err(RenderError::Script(format!(
                "outerHTML returned {}",
                other
            ))),
        }
    }

    async fn close(&mut self) -> Result<(), RenderError> {
        if let Some(client) = self.client.take() {
            client.close().await?;
            ::log::debug!("Closed WebDriver session");
        }
        Ok(())
    }
}
