use std::time::Duration;

use tokio::time::sleep;
use tracing::debug;

use crate::browser::session::ProductListSession;
use crate::error::SessionError;

/// Scroll until the lazily-loaded product list stops growing.
///
/// The page gives no explicit "done" signal, so completion is inferred:
/// read the content extent, reveal the last card to trigger the next batch,
/// wait the fixed settle interval for asynchronous loading, and re-read.
/// Two consecutive equal reads terminate the loop.
///
/// The loop itself is unbounded; the caller's per-job timeout is the guard
/// against a page whose extent never stabilizes.
pub async fn load_all_cards<S>(session: &mut S, settle: Duration) -> Result<(), SessionError>
where
    S: ProductListSession + ?Sized,
{
    let mut last_extent = session.content_extent().await?;
    let mut rounds = 0u32;

    loop {
        session.reveal_last_card().await?;

        // Let asynchronously loaded content arrive before re-measuring
        sleep(settle).await;

        let extent = session.content_extent().await?;
        if extent == last_extent {
            break;
        }
        last_extent = extent;
        rounds += 1;
    }

    debug!(
        "product list settled at extent {} after {} scroll rounds",
        last_extent, rounds
    );

    Ok(())
}
