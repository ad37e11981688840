use tracing::info;

use crate::client::ServiceClient;
use crate::error::{ArtistryError, Result};
use crate::models::{RoomJobStatus, Stage};
use crate::poll::{poll_until, CancelHandle, PollError, PollPolicy, Probe};

/// Wait for a gateway room job to finish, polling with backoff.
///
/// A job that finishes as `failed` is returned as-is; only the wait itself
/// (cancelled, out of attempts, past the deadline, status call failing) is an error.
pub async fn wait_for_room_job(
    client: &dyn ServiceClient,
    job_id: &str,
    policy: &PollPolicy,
    cancel: &CancelHandle,
) -> Result<RoomJobStatus> {
    info!("⏳ Waiting for room job {}", job_id);
    let outcome = poll_until(policy, cancel, |attempt| async move {
        let status = client.room_job_status(job_id).await?;
        info!(job_id, attempt, status = ?status.status, "room job polled");
        Ok::<_, ArtistryError>(if status.is_finished() { Probe::Ready(status) } else { Probe::Pending })
    })
    .await;

    outcome.map_err(|err| match err {
        PollError::Probe(inner) => inner,
        other => ArtistryError::service(Stage::RoomJob, format!("job {job_id}: {other}")),
    })
}
