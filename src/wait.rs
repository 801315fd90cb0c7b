use std::time::Duration;

use crate::error::Error;
use crate::http::bigquery_job_client::BigqueryJobClient;
use crate::http::job::get::GetJobRequest;
use crate::http::job::{Job, JobState};
use crate::retry::run_with_retries;

/// Ceiling for the poll interval. The poll schedule is deliberately coarser
/// than the transport back-off: start at 30ms, double per round, cap at 1s.
const MAX_POLL_INTERVAL: Duration = Duration::from_millis(1000);
const INITIAL_POLL_INTERVAL: Duration = Duration::from_millis(30);

/// Polls job status until the job reaches DONE. Each status fetch is itself
/// wrapped in the 3-attempt transport retrier. A DONE job carrying an error
/// result yields a composite error: the server's top-level message plus the
/// JSON-encoded sub-error list.
pub(crate) async fn wait_for_job_completion(
    client: &BigqueryJobClient,
    project_id: &str,
    location: Option<&str>,
    job_id: &str,
) -> Result<Job, Error> {
    let request = GetJobRequest {
        location: location.map(str::to_string),
    };
    let mut interval = INITIAL_POLL_INTERVAL;
    let job = loop {
        let job = run_with_retries(|| client.get(project_id, job_id, &request), 3).await?;
        if job.status.state == JobState::Done {
            break job;
        }
        tracing::trace!(job_id, interval_ms = interval.as_millis() as u64, "job not done yet");
        tokio::time::sleep(interval).await;
        interval = (interval * 2).min(MAX_POLL_INTERVAL);
    };
    if let Some(error_result) = &job.status.error_result {
        let message = error_result.message.clone().unwrap_or_default();
        let details = serde_json::to_string(&job.status.errors).unwrap_or_default();
        return Err(Error::JobFailure { message, details });
    }
    Ok(job)
}
