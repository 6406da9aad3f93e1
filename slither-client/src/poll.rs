//! Periodic refetching, for views that have no push feed

use std::{future::Future, time::Duration};

use tokio::sync::oneshot;

use crate::api::Error;

/// Keeps a poller alive: dropping it stops the poller
///
/// Once dropped, no further result is handed over, including the one of a fetch
/// that was already in flight.
#[derive(Debug)]
pub struct PollGuard {
    _cancel: oneshot::Sender<()>,
}

impl PollGuard {
    pub fn stop(self) {}
}

/// Calls `fetch` every `period` and hands each result to `on_result`
///
/// The first fetch happens right away. Failures are logged and handed over like
/// successes, they do not stop the polling.
pub fn spawn_poller<F, Fut, T, H>(period: Duration, mut fetch: F, mut on_result: H) -> PollGuard
where
    F: 'static + Send + FnMut() -> Fut,
    Fut: Send + Future<Output = Result<T, Error>>,
    T: 'static + Send,
    H: 'static + Send + FnMut(Result<T, Error>),
{
    let (cancel, mut cancelled) = oneshot::channel::<()>();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = &mut cancelled => break,
                _ = ticker.tick() => (),
            }
            let res = tokio::select! {
                _ = &mut cancelled => break,
                res = fetch() => res,
            };
            if let Err(err) = &res {
                tracing::warn!(%err, "poll fetch failed");
            }
            on_result(res);
        }
        tracing::debug!("poller stopped");
    });
    PollGuard { _cancel: cancel }
}
