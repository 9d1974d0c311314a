use std::future::Future;
use std::time::Duration;

/// Polls `condition` every 10ms until it returns `true` or `timeout`
/// elapses, at which point it panics — used in place of a fixed `sleep`
/// so tests run as fast as the loop actually converges instead of
/// waiting out a worst-case delay every time.
pub async fn wait_until<F, Fut>(timeout: Duration, mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition().await {
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("condition not met within {timeout:?}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
