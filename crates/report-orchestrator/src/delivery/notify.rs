//! HTTP notification calls

use std::time::Duration;

use reqwest::Client;
use tokio::runtime::Handle;

use super::{HttpNotifier, NotifyCall};
use crate::error::{Error, Result};

const NOTIFY_TIMEOUT: Duration = Duration::from_secs(30);

/// Issues notification calls with a shared `reqwest` client.
///
/// Calls are made from job worker threads, so each one is driven to
/// completion on the runtime captured at construction.
pub struct ReqwestNotifier {
    client: Client,
    handle: Handle,
}

impl ReqwestNotifier {
    /// Must be called from within a tokio runtime
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(NOTIFY_TIMEOUT)
            .pool_max_idle_per_host(2)
            .build()?;
        let handle = Handle::try_current()
            .map_err(|e| Error::internal(format!("no tokio runtime for notifier: {}", e)))?;
        Ok(Self { client, handle })
    }

    async fn send(&self, call: &NotifyCall) -> Result<()> {
        let request = match call.method.as_str() {
            "POST" => self.client.post(&call.url).form(&call.params),
            "GET" => self.client.get(&call.url).query(&call.params),
            other => return Err(Error::delivery(format!("unsupported notify method '{}'", other))),
        };
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::delivery(format!("notify {} returned {}", call.url, status)));
        }
        Ok(())
    }
}

impl HttpNotifier for ReqwestNotifier {
    fn notify(&self, call: &NotifyCall) -> Result<()> {
        self.handle.block_on(self.send(call))?;
        tracing::debug!("Notified {} {}", call.method, call.url);
        Ok(())
    }

    fn name(&self) -> &str {
        "http"
    }
}
