//! Active reachability checks feeding the connectivity monitor.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::task::JoinHandle;

use super::ConnectivityMonitor;

const PROBE_TIMEOUT_SECS: u64 = 3;

/// A source of "is the network reachable right now" answers.
pub trait ConnectivityProbe: Send + Sync + 'static {
    fn check(&self) -> impl Future<Output = bool> + Send;
}

/// Probes a URL with `HEAD`. Any HTTP response counts as online; transport
/// errors (DNS, refused, timeout) count as offline.
#[derive(Clone, Debug)]
pub struct HttpProbe {
    url: String,
    client: Client,
}

impl HttpProbe {
    pub fn new(url: impl Into<String>) -> reqwest::Result<Self> {
        Ok(Self {
            url: url.into(),
            client: Client::builder()
                .timeout(Duration::from_secs(PROBE_TIMEOUT_SECS))
                .build()?,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl ConnectivityProbe for HttpProbe {
    async fn check(&self) -> bool {
        match self.client.head(&self.url).send().await {
            Ok(response) => {
                tracing::trace!("Probe {} answered {}", self.url, response.status());
                true
            }
            Err(error) => {
                tracing::debug!("Probe {} failed: {}", self.url, error);
                false
            }
        }
    }
}

/// Running probe loop; dropping the handle stops it.
#[derive(Debug)]
pub struct ProbeHandle {
    task: JoinHandle<()>,
}

impl ProbeHandle {
    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for ProbeHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Poll `probe` every `interval` and forward results to `monitor` as
/// platform events.
pub fn spawn_probe<P: ConnectivityProbe>(
    monitor: Arc<ConnectivityMonitor>,
    probe: P,
    interval: Duration,
) -> ProbeHandle {
    let task = tokio::spawn(async move {
        loop {
            let online = probe.check().await;
            monitor.set_online(online);
            tokio::time::sleep(interval).await;
        }
    });
    ProbeHandle { task }
}
