//! In-memory driver for unit testing session and orchestrator logic
//! without a browser.
//!
//! The controller scripts evaluation results and records every call the
//! code under test makes:
//!
//! ```ignore
//! let (driver, controller) = fake::pair();
//! controller.on_evaluate(|expr| expr.contains(".duration").then(|| json!(120.0)));
//!
//! // ... exercise the session controller ...
//!
//! assert!(matches!(controller.calls()[0], DriverCall::OpenTab));
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::capability::{BrowserDriver, TabHandle};
use crate::error::{Error, Result};

/// One recorded driver invocation, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
    OpenTab,
    Navigate { tab: TabHandle, url: String },
    Evaluate { tab: TabHandle, expression: String },
    CloseTab { tab: TabHandle },
}

type EvalHandler = Box<dyn FnMut(&str) -> Option<Value> + Send>;

#[derive(Default)]
struct FakeState {
    next_tab: u32,
    open_tabs: Vec<TabHandle>,
    calls: Vec<DriverCall>,
    eval_handlers: Vec<EvalHandler>,
    navigate_failure: Option<String>,
    open_failure: Option<String>,
}

/// Creates a connected driver/controller pair.
pub fn pair() -> (FakeDriver, FakeDriverController) {
    let state = Arc::new(Mutex::new(FakeState::default()));
    (
        FakeDriver {
            state: Arc::clone(&state),
        },
        FakeDriverController { state },
    )
}

#[derive(Clone)]
pub struct FakeDriver {
    state: Arc<Mutex<FakeState>>,
}

pub struct FakeDriverController {
    state: Arc<Mutex<FakeState>>,
}

impl FakeDriverController {
    /// Registers an evaluation handler. Handlers are tried in
    /// registration order; the first to return `Some` wins. Expressions
    /// no handler claims evaluate to `null`.
    pub fn on_evaluate<F>(&self, handler: F)
    where
        F: FnMut(&str) -> Option<Value> + Send + 'static,
    {
        self.state.lock().eval_handlers.push(Box::new(handler));
    }

    /// Makes the next `navigate` call fail with `reason`.
    pub fn fail_navigation(&self, reason: impl Into<String>) {
        self.state.lock().navigate_failure = Some(reason.into());
    }

    /// Makes the next `open_tab` call fail with `reason`.
    pub fn fail_open_tab(&self, reason: impl Into<String>) {
        self.state.lock().open_failure = Some(reason.into());
    }

    /// Snapshot of every call made so far.
    pub fn calls(&self) -> Vec<DriverCall> {
        self.state.lock().calls.clone()
    }

    /// Tabs that have been opened and not yet closed.
    pub fn open_tabs(&self) -> Vec<TabHandle> {
        self.state.lock().open_tabs.clone()
    }
}

#[async_trait]
impl BrowserDriver for FakeDriver {
    async fn open_tab(&self) -> Result<TabHandle> {
        let mut state = self.state.lock();
        state.calls.push(DriverCall::OpenTab);

        if let Some(reason) = state.open_failure.take() {
            return Err(Error::Protocol(reason));
        }

        state.next_tab += 1;
        let tab = TabHandle::new(
            format!("target@{}", state.next_tab),
            format!("session@{}", state.next_tab),
        );
        state.open_tabs.push(tab.clone());
        Ok(tab)
    }

    async fn navigate(&self, tab: &TabHandle, url: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(DriverCall::Navigate {
            tab: tab.clone(),
            url: url.to_string(),
        });

        match state.navigate_failure.take() {
            Some(reason) => Err(Error::Protocol(reason)),
            None => Ok(()),
        }
    }

    async fn evaluate(&self, tab: &TabHandle, expression: &str) -> Result<Value> {
        let mut state = self.state.lock();
        state.calls.push(DriverCall::Evaluate {
            tab: tab.clone(),
            expression: expression.to_string(),
        });

        if !state.open_tabs.contains(tab) {
            return Err(Error::Protocol(format!("no such tab: {tab}")));
        }

        for handler in state.eval_handlers.iter_mut() {
            if let Some(value) = handler(expression) {
                return Ok(value);
            }
        }
        Ok(Value::Null)
    }

    async fn close_tab(&self, tab: &TabHandle) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(DriverCall::CloseTab { tab: tab.clone() });

        let before = state.open_tabs.len();
        state.open_tabs.retain(|open| open != tab);
        if state.open_tabs.len() == before {
            return Err(Error::Protocol(format!("no such tab: {tab}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn records_calls_in_order() {
        let (driver, controller) = pair();

        let tab = driver.open_tab().await.unwrap();
        driver.navigate(&tab, "https://example.com").await.unwrap();
        driver.close_tab(&tab).await.unwrap();

        let calls = controller.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0], DriverCall::OpenTab);
        assert!(matches!(&calls[1], DriverCall::Navigate { url, .. } if url.as_str() == "https://example.com"));
        assert!(matches!(&calls[2], DriverCall::CloseTab { tab: closed } if *closed == tab));
        assert!(controller.open_tabs().is_empty());
    }

    #[tokio::test]
    async fn eval_handlers_tried_in_order() {
        let (driver, controller) = pair();
        controller.on_evaluate(|expr| expr.contains("duration").then(|| json!(42.0)));
        controller.on_evaluate(|_| Some(json!(true)));

        let tab = driver.open_tab().await.unwrap();
        assert_eq!(driver.evaluate(&tab, "video.duration").await.unwrap(), json!(42.0));
        assert_eq!(driver.evaluate(&tab, "anything else").await.unwrap(), json!(true));
    }

    #[tokio::test]
    async fn evaluate_on_closed_tab_is_an_error() {
        let (driver, _controller) = pair();

        let tab = driver.open_tab().await.unwrap();
        driver.close_tab(&tab).await.unwrap();

        assert!(driver.evaluate(&tab, "1 + 1").await.is_err());
    }

    #[tokio::test]
    async fn scripted_failures_fire_once() {
        let (driver, controller) = pair();
        controller.fail_navigation("net::ERR_NAME_NOT_RESOLVED");

        let tab = driver.open_tab().await.unwrap();
        assert!(driver.navigate(&tab, "https://bad.invalid").await.is_err());
        assert!(driver.navigate(&tab, "https://bad.invalid").await.is_ok());
    }
}
