use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use embraceu_core::connectivity::{spawn_probe, ConnectivityTransition};
use tokio::sync::broadcast::error::RecvError;

use crate::commands::common::{build_probe, open_queue, Connectivity};
use crate::config::CliConfig;
use crate::error::CliError;

pub async fn run_watch(
    interval_secs: Option<u64>,
    config: &CliConfig,
    store_path: &Path,
) -> Result<(), CliError> {
    if !config.has_remote() {
        return Err(CliError::RemoteNotConfigured);
    }
    let probe = build_probe(config)?.ok_or(CliError::RemoteNotConfigured)?;
    let interval = interval_secs
        .filter(|secs| *secs > 0)
        .map_or_else(|| config.probe_interval(), Duration::from_secs);

    let queue = open_queue(config, store_path, Connectivity::Detect).await?;
    let mut notices = queue.subscribe_notices();
    let mut transitions = queue.monitor().subscribe();
    let _auto_sync = queue.spawn_auto_sync();

    println!(
        "Watching {} every {}s ({} pending). Press Ctrl-C to stop.",
        probe.url(),
        interval.as_secs(),
        queue.pending_count()
    );
    let _probe = spawn_probe(Arc::clone(queue.monitor()), probe, interval);

    // Entries left over from an earlier run get one pass without waiting
    // for a transition.
    if queue.is_online() && queue.pending_count() > 0 {
        println!("{}", queue.sync_queue().await);
    }

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                println!("Stopped. {} pending.", queue.pending_count());
                break;
            }
            notice = notices.recv() => match notice {
                Ok(notice) => println!("{notice}"),
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!("Dropped {missed} queue notices");
                }
                Err(RecvError::Closed) => break,
            },
            transition = transitions.recv() => match transition {
                Ok(ConnectivityTransition::WentOnline) => println!("Back online"),
                Ok(ConnectivityTransition::WentOffline) => println!("Offline"),
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            },
        }
    }
    Ok(())
}
