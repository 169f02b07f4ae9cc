//! Headless Chromium over CDP.
//!
//! [`ChromiumPage`] implements [`PageDriver`] by evaluating generated
//! JavaScript for queries and synthetic events, and by sending CDP input
//! events for trusted clicks and key presses. Console errors, warnings and
//! uncaught exceptions are forwarded into the page's [`ListenerRegistry`]
//! by background tasks started with the page and aborted when it drops.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchKeyEventParams, DispatchKeyEventType, DispatchMouseEventParams,
    DispatchMouseEventType, MouseButton,
};
use chromiumoxide::cdp::js_protocol::runtime::{
    ConsoleApiCalledType, EnableParams, EventConsoleApiCalled, EventExceptionThrown, RemoteObject,
};
use chromiumoxide::page::Page as CdpPage;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use tokio::task::JoinHandle;

use crate::diagnostics::{Diagnostic, ListenerRegistry};
use crate::driver::{global_path_segments, ElementHandle, PageDriver};
use crate::event::{DispatchTarget, KeyChord, SyntheticEvent};
use crate::result::{ProbeError, ProbeResult};
use crate::selector::{js_string, SelectorDescriptor};

/// Environment variable naming the browser executable
pub const CHROMIUM_PATH_ENV: &str = "CHROMIUM_PATH";

/// Browser launch options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChromiumConfig {
    /// Run without a window
    pub headless: bool,
    /// Keep the Chromium sandbox (disable in containers)
    pub sandbox: bool,
    /// Executable; auto-detected when `None`
    pub chromium_path: Option<String>,
    /// Viewport width
    pub viewport_width: u32,
    /// Viewport height
    pub viewport_height: u32,
}

impl Default for ChromiumConfig {
    fn default() -> Self {
        Self {
            headless: true,
            sandbox: true,
            chromium_path: None,
            viewport_width: 1280,
            viewport_height: 800,
        }
    }
}

impl ChromiumConfig {
    /// Show the browser window
    #[must_use]
    pub const fn headed(mut self) -> Self {
        self.headless = false;
        self
    }

    /// Disable the sandbox
    #[must_use]
    pub const fn no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }

    /// Use a specific executable
    #[must_use]
    pub fn with_chromium_path(mut self, path: impl Into<String>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }

    /// Set the viewport
    #[must_use]
    pub const fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }

    fn executable(&self) -> Option<String> {
        self.chromium_path
            .clone()
            .or_else(|| std::env::var(CHROMIUM_PATH_ENV).ok())
            .filter(|p| !p.trim().is_empty())
    }
}

/// A running Chromium instance
#[derive(Debug)]
pub struct ChromiumBrowser {
    config: ChromiumConfig,
    inner: CdpBrowser,
    handler: JoinHandle<()>,
}

impl ChromiumBrowser {
    /// Launch a browser
    pub async fn launch(config: ChromiumConfig) -> ProbeResult<Self> {
        let mut builder = CdpConfig::builder().window_size(config.viewport_width, config.viewport_height);
        if !config.headless {
            builder = builder.with_head();
        }
        if !config.sandbox {
            builder = builder.no_sandbox();
        }
        let executable = config.executable();
        if let Some(ref path) = executable {
            builder = builder.chrome_executable(path);
        }

        let cdp_config = builder.build().map_err(|message| {
            if executable.is_none() {
                tracing::debug!(%message, "chromium auto-detection failed");
                ProbeError::BrowserNotFound
            } else {
                ProbeError::BrowserLaunch { message }
            }
        })?;

        let (inner, mut handler) = CdpBrowser::launch(cdp_config)
            .await
            .map_err(|e| ProbeError::BrowserLaunch {
                message: e.to_string(),
            })?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });
        tracing::debug!(headless = config.headless, "chromium launched");

        Ok(Self {
            config,
            inner,
            handler,
        })
    }

    /// Launch options in use
    #[must_use]
    pub const fn config(&self) -> &ChromiumConfig {
        &self.config
    }

    /// Open a fresh blank page with diagnostics forwarding attached
    pub async fn new_page(&self) -> ProbeResult<ChromiumPage> {
        let page = self
            .inner
            .new_page("about:blank")
            .await
            .map_err(|e| ProbeError::driver(e.to_string()))?;
        ChromiumPage::attach(page).await
    }

    /// Close the browser
    pub async fn close(mut self) -> ProbeResult<()> {
        self.inner
            .close()
            .await
            .map_err(|e| ProbeError::driver(e.to_string()))?;
        Ok(())
    }
}

impl Drop for ChromiumBrowser {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

/// One browser tab
pub struct ChromiumPage {
    page: CdpPage,
    listeners: ListenerRegistry,
    forwarders: Vec<JoinHandle<()>>,
}

impl fmt::Debug for ChromiumPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChromiumPage")
            .field("forwarders", &self.forwarders.len())
            .finish_non_exhaustive()
    }
}

impl Drop for ChromiumPage {
    fn drop(&mut self) {
        for task in &self.forwarders {
            task.abort();
        }
    }
}

fn driver_error(e: impl fmt::Display) -> ProbeError {
    ProbeError::driver(e.to_string())
}

impl ChromiumPage {
    async fn attach(page: CdpPage) -> ProbeResult<Self> {
        page.execute(EnableParams::default())
            .await
            .map_err(driver_error)?;
        let listeners = ListenerRegistry::new();

        let mut console = page
            .event_listener::<EventConsoleApiCalled>()
            .await
            .map_err(driver_error)?;
        let registry = listeners.clone();
        let console_task = tokio::spawn(async move {
            while let Some(event) = console.next().await {
                let message = console_text(&event.args);
                let diagnostic = match event.r#type {
                    ConsoleApiCalledType::Error => Diagnostic::console_error(message),
                    ConsoleApiCalledType::Warning => Diagnostic::console_warning(message),
                    _ => continue,
                };
                registry.emit(&diagnostic);
            }
        });

        let mut exceptions = page
            .event_listener::<EventExceptionThrown>()
            .await
            .map_err(driver_error)?;
        let registry = listeners.clone();
        let exception_task = tokio::spawn(async move {
            while let Some(event) = exceptions.next().await {
                let details = &event.exception_details;
                let message = details
                    .exception
                    .as_ref()
                    .and_then(|e| e.description.clone())
                    .unwrap_or_else(|| details.text.clone());
                let mut diagnostic = Diagnostic::exception(message);
                if let Some(url) = &details.url {
                    diagnostic = diagnostic.with_source(url.clone());
                }
                registry.emit(&diagnostic);
            }
        });

        Ok(Self {
            page,
            listeners,
            forwarders: vec![console_task, exception_task],
        })
    }

    /// The underlying CDP page
    #[must_use]
    pub const fn cdp(&self) -> &CdpPage {
        &self.page
    }

    async fn eval(&self, script: &str) -> ProbeResult<Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| ProbeError::script(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn eval_as<T: for<'de> Deserialize<'de>>(&self, script: &str) -> ProbeResult<T> {
        let value = self.eval(script).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn point(&self, element: &ElementHandle) -> ProbeResult<(f64, f64)> {
        let point: ClickPoint = self.eval_as(&click_point_js(&nth_js(element)?)).await?;
        match (point.status.as_str(), point.x, point.y) {
            ("ok", Some(x), Some(y)) => Ok((x, y)),
            ("detached", ..) => Err(ProbeError::driver(format!(
                "element {} is no longer attached",
                element.selector
            ))),
            (status, ..) => Err(ProbeError::driver(format!(
                "element {} does not receive pointer events ({status})",
                element.selector
            ))),
        }
    }

    async fn mouse(&self, kind: DispatchMouseEventType, x: f64, y: f64) -> ProbeResult<()> {
        let mut builder = DispatchMouseEventParams::builder().r#type(kind.clone()).x(x).y(y);
        if kind != DispatchMouseEventType::MouseMoved {
            builder = builder.button(MouseButton::Left).click_count(1);
        }
        let params = builder.build().map_err(driver_error)?;
        self.page.execute(params).await.map_err(driver_error)?;
        Ok(())
    }

    async fn key(&self, kind: DispatchKeyEventType, chord: &KeyChord) -> ProbeResult<()> {
        let mut builder = DispatchKeyEventParams::builder()
            .r#type(kind.clone())
            .key(chord.key.clone())
            .modifiers(chord.modifiers.cdp_bits());
        if let Some(code) = chord.virtual_key_code() {
            builder = builder.windows_virtual_key_code(code);
        }
        if kind == DispatchKeyEventType::KeyDown {
            if let Some(text) = chord.text() {
                builder = builder.text(text);
            }
        }
        let params = builder.build().map_err(driver_error)?;
        self.page.execute(params).await.map_err(driver_error)?;
        Ok(())
    }
}

#[async_trait]
impl PageDriver for ChromiumPage {
    async fn navigate(&self, url: &str) -> ProbeResult<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| ProbeError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn current_url(&self) -> ProbeResult<String> {
        Ok(self
            .page
            .url()
            .await
            .map_err(driver_error)?
            .unwrap_or_default())
    }

    async fn count(&self, selector: &SelectorDescriptor) -> ProbeResult<usize> {
        selector.validate()?;
        match self.eval(&selector.to_js_count()).await {
            Ok(value) => Ok(value.as_u64().unwrap_or(0) as usize),
            Err(e) if is_selector_syntax_error(&e) => {
                Err(ProbeError::invalid_selector(selector.to_string(), e.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    async fn element(
        &self,
        selector: &SelectorDescriptor,
        index: usize,
    ) -> ProbeResult<Option<ElementHandle>> {
        let snapshot: Option<Snapshot> = self
            .eval_as(&snapshot_js(&selector.to_js_nth(index)))
            .await?;
        Ok(snapshot.map(|s| s.into_handle(selector.to_string(), index)))
    }

    async fn read_global(&self, path: &str) -> ProbeResult<Option<Value>> {
        let segments = global_path_segments(path)?;
        let value = self.eval(&read_global_js(&segments)).await?;
        Ok((!value.is_null()).then_some(value))
    }

    async fn evaluate(&self, script: &str) -> ProbeResult<Value> {
        self.eval(script).await
    }

    async fn click(&self, element: &ElementHandle) -> ProbeResult<()> {
        let (x, y) = self.point(element).await?;
        self.mouse(DispatchMouseEventType::MouseMoved, x, y).await?;
        self.mouse(DispatchMouseEventType::MousePressed, x, y).await?;
        self.mouse(DispatchMouseEventType::MouseReleased, x, y).await
    }

    async fn fill(&self, element: &ElementHandle, value: &str) -> ProbeResult<()> {
        let filled: bool = self.eval_as(&fill_js(&nth_js(element)?, value)).await?;
        if filled {
            Ok(())
        } else {
            Err(ProbeError::driver(format!(
                "element {} cannot be filled",
                element.selector
            )))
        }
    }

    async fn drag(&self, from: &ElementHandle, to: &ElementHandle) -> ProbeResult<()> {
        let source = nth_js(from)?;
        let target = nth_js(to)?;
        let draggable: bool = self
            .eval_as(&format!("(() => {{ const el = {source}; return !!(el && el.draggable); }})()"))
            .await?;
        if draggable {
            let dropped: bool = self.eval_as(&html5_drag_js(&source, &target)).await?;
            return if dropped {
                Ok(())
            } else {
                Err(ProbeError::driver("drag source or target detached"))
            };
        }

        let (x0, y0) = self.point(from).await?;
        let (x1, y1) = self.point(to).await?;
        self.mouse(DispatchMouseEventType::MouseMoved, x0, y0).await?;
        self.mouse(DispatchMouseEventType::MousePressed, x0, y0).await?;
        for step in 1..=5 {
            let t = f64::from(step) / 5.0;
            self.mouse(
                DispatchMouseEventType::MouseMoved,
                (x1 - x0).mul_add(t, x0),
                (y1 - y0).mul_add(t, y0),
            )
            .await?;
        }
        self.mouse(DispatchMouseEventType::MouseReleased, x1, y1).await
    }

    async fn press_key(&self, chord: &KeyChord) -> ProbeResult<()> {
        self.key(DispatchKeyEventType::KeyDown, chord).await?;
        self.key(DispatchKeyEventType::KeyUp, chord).await
    }

    async fn dispatch_event(
        &self,
        target: &DispatchTarget,
        event: &SyntheticEvent,
    ) -> ProbeResult<bool> {
        let target = match target {
            DispatchTarget::Document => "document".to_string(),
            DispatchTarget::Window => "window".to_string(),
            DispatchTarget::Element(el) => nth_js(el)?,
        };
        self.eval_as(&dispatch_js(&target, event)).await
    }

    async fn call_method(&self, object: &str, method: &str, args: &[Value]) -> ProbeResult<bool> {
        let segments = global_path_segments(object)?;
        self.eval_as(&call_method_js(&segments, method, args)).await
    }

    fn listeners(&self) -> &ListenerRegistry {
        &self.listeners
    }

    async fn close(&self) -> ProbeResult<()> {
        self.page.clone().close().await.map_err(driver_error)
    }
}

// ---------------------------------------------------------------------------
// Page-side scripts
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ClickPoint {
    status: String,
    x: Option<f64>,
    y: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Snapshot {
    tag: String,
    text: String,
    classes: Vec<String>,
    attributes: BTreeMap<String, String>,
    value: Option<String>,
}

impl Snapshot {
    fn into_handle(self, selector: String, index: usize) -> ElementHandle {
        let mut handle = ElementHandle::new(selector, index, self.tag);
        handle.text_content = Some(self.text);
        handle.classes = self.classes;
        handle.attributes = self.attributes;
        if let Some(value) = self.value {
            handle.attributes.insert("value".to_string(), value);
        }
        handle
    }
}

fn is_selector_syntax_error(e: &ProbeError) -> bool {
    let text = e.to_string();
    text.contains("SyntaxError") || text.contains("not a valid selector")
}

fn console_text(args: &[RemoteObject]) -> String {
    args.iter()
        .map(|arg| match (&arg.value, &arg.description) {
            (Some(Value::String(s)), _) => s.clone(),
            (Some(v), _) => v.to_string(),
            (None, Some(d)) => d.clone(),
            (None, None) => String::new(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn nth_js(element: &ElementHandle) -> ProbeResult<String> {
    let selector = SelectorDescriptor::parse(&element.selector)?;
    Ok(selector.to_js_nth(element.index))
}

fn snapshot_js(nth: &str) -> String {
    format!(
        "(() => {{ const el = {nth}; if (!el) return null; return {{ \
         tag: el.tagName.toLowerCase(), text: el.textContent || '', \
         classes: Array.from(el.classList), \
         attributes: Object.fromEntries(Array.from(el.attributes).map(a => [a.name, a.value])), \
         value: (typeof el.value === 'string') ? el.value : null }}; }})()"
    )
}

fn click_point_js(nth: &str) -> String {
    format!(
        "(() => {{ const el = {nth}; if (!el) return {{ status: 'detached' }}; \
         el.scrollIntoView({{ block: 'center', inline: 'center' }}); \
         const r = el.getBoundingClientRect(); \
         if (r.width === 0 || r.height === 0) return {{ status: 'hidden' }}; \
         const x = r.left + r.width / 2, y = r.top + r.height / 2; \
         const hit = document.elementFromPoint(x, y); \
         if (!hit || !(hit === el || el.contains(hit))) return {{ status: 'obscured' }}; \
         return {{ status: 'ok', x, y }}; }})()"
    )
}

fn fill_js(nth: &str, value: &str) -> String {
    format!(
        "(() => {{ const el = {nth}; if (!el) return false; const v = {value}; el.focus(); \
         if (el.isContentEditable) {{ el.textContent = v; }} \
         else if ('value' in el) {{ \
           const proto = Object.getPrototypeOf(el); \
           const desc = Object.getOwnPropertyDescriptor(proto, 'value'); \
           if (desc && desc.set) {{ desc.set.call(el, v); }} else {{ el.value = v; }} \
         }} else {{ return false; }} \
         el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
         el.dispatchEvent(new Event('change', {{ bubbles: true }})); \
         return true; }})()",
        value = js_string(value)
    )
}

fn html5_drag_js(source: &str, target: &str) -> String {
    format!(
        "(() => {{ const s = {source}, t = {target}; if (!s || !t) return false; \
         const dt = new DataTransfer(); \
         const fire = (el, type) => el.dispatchEvent(new DragEvent(type, \
           {{ bubbles: true, cancelable: true, dataTransfer: dt }})); \
         fire(s, 'dragstart'); fire(t, 'dragenter'); fire(t, 'dragover'); \
         fire(t, 'drop'); fire(s, 'dragend'); return true; }})()"
    )
}

fn dispatch_js(target: &str, event: &SyntheticEvent) -> String {
    format!(
        "(() => {{ const t = {target}; if (!t) return false; t.dispatchEvent({}); return true; }})()",
        event.to_js()
    )
}

fn segments_js(segments: &[&str]) -> String {
    let quoted: Vec<String> = segments.iter().map(|s| js_string(s)).collect();
    format!("[{}]", quoted.join(", "))
}

fn read_global_js(segments: &[&str]) -> String {
    format!(
        "(() => {{ let v = globalThis; \
         for (const k of {}) {{ if (v == null) return null; try {{ v = v[k]; }} catch (e) {{ return null; }} }} \
         if (v === undefined || typeof v === 'function' || typeof v === 'symbol') return null; \
         try {{ return JSON.parse(JSON.stringify(v)); }} catch (e) {{ return String(v); }} }})()",
        segments_js(segments)
    )
}

fn call_method_js(segments: &[&str], method: &str, args: &[Value]) -> String {
    format!(
        "(() => {{ let o = globalThis; \
         for (const k of {}) {{ if (o == null) return false; o = o[k]; }} \
         const m = {}; if (o == null || typeof o[m] !== 'function') return false; \
         o[m](...{}); return true; }})()",
        segments_js(segments),
        js_string(method),
        Value::Array(args.to_vec())
    )
}
