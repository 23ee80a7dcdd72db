use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{Instrument, error, info, info_span, warn};

use crate::config::Config;
use crate::http::connection::{Connection, is_peer_error};
use crate::http::resolve::ServedRoot;

/// Pause after the first failed accept.
const ACCEPT_BACKOFF_MIN: Duration = Duration::from_millis(10);
/// Longest pause between failed accepts.
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Delay before retrying after `failures` consecutive accept errors.
///
/// Doubles from [`ACCEPT_BACKOFF_MIN`] up to [`ACCEPT_BACKOFF_MAX`], so a
/// process out of file descriptors does not spin on `accept`.
pub fn accept_backoff(failures: u32) -> Duration {
    let factor = 1u32.checked_shl(failures.saturating_sub(1)).unwrap_or(u32::MAX);
    ACCEPT_BACKOFF_MIN
        .saturating_mul(factor)
        .min(ACCEPT_BACKOFF_MAX)
}

/// Binds the configured address and serves until an unrecoverable error.
pub async fn run(cfg: &Config) -> anyhow::Result<()> {
    let addr = cfg.listen_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    serve(listener, cfg).await
}

/// Accepts connections on `listener` and spawns one task per connection.
///
/// At most `cfg.max_connections` are handled at once; further connections
/// wait in the accept backlog until a permit frees up.
pub async fn serve(listener: TcpListener, cfg: &Config) -> anyhow::Result<()> {
    let root = ServedRoot::new(&cfg.root)
        .with_context(|| format!("cannot serve {}", cfg.root.display()))?;
    let root = Arc::new(root);
    let permits = Arc::new(Semaphore::new(cfg.max_connections));

    info!(
        root = %root.path().display(),
        max_connections = cfg.max_connections,
        "Listening on {}",
        listener.local_addr()?
    );

    let mut failures = 0u32;

    loop {
        let permit = permits.clone().acquire_owned().await?;

        let (socket, peer) = match listener.accept().await {
            Ok(accepted) => {
                failures = 0;
                accepted
            }
            Err(e) => {
                failures = failures.saturating_add(1);
                let delay = accept_backoff(failures);
                warn!("Accept failed: {}, retrying in {:?}", e, delay);
                drop(permit);
                tokio::time::sleep(delay).await;
                continue;
            }
        };

        let root = root.clone();
        let limits = cfg.limits;
        let request_timeout = cfg.request_timeout;

        tokio::spawn(
            async move {
                let _permit = permit;
                let mut conn = Connection::new(socket, root, limits);

                match timeout(request_timeout, conn.run()).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) if is_peer_error(&e) => {
                        warn!("Connection from {} ended early: {}", peer, e)
                    }
                    Ok(Err(e)) => error!("Connection error from {}: {}", peer, e),
                    Err(_) => warn!("Connection from {} exceeded {:?}", peer, request_timeout),
                }
            }
            .instrument(info_span!("conn", %peer)),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_backoff_doubles_up_to_cap() {
        assert_eq!(accept_backoff(1), Duration::from_millis(10));
        assert_eq!(accept_backoff(2), Duration::from_millis(20));
        assert_eq!(accept_backoff(4), Duration::from_millis(80));
        assert_eq!(accept_backoff(8), ACCEPT_BACKOFF_MAX);
        assert_eq!(accept_backoff(40), ACCEPT_BACKOFF_MAX);
        assert_eq!(accept_backoff(u32::MAX), ACCEPT_BACKOFF_MAX);
    }
}
