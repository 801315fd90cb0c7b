use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};

use crate::http::error::Error;
use crate::http::job::Job;

pub fn build(base_url: &str, client: &Client, data: &Job) -> RequestBuilder {
    let url = format!("{}/projects/{}/jobs", base_url, data.job_reference.project_id);
    client.post(url).json(data)
}

/// Builds a `uploadType=multipart` job insert carrying the job configuration
/// as the metadata part and the load payload as an `application/octet-stream`
/// media part.
pub fn build_with_media(
    upload_base_url: &str,
    client: &Client,
    data: &Job,
    media: Vec<u8>,
) -> Result<RequestBuilder, Error> {
    let url = format!(
        "{}/projects/{}/jobs?uploadType=multipart",
        upload_base_url, data.job_reference.project_id
    );
    let metadata = Part::text(serde_json::to_string(data)?).mime_str("application/json; charset=UTF-8")?;
    let payload = Part::bytes(media).mime_str("application/octet-stream")?;
    let form = Form::new().part("metadata", metadata).part("media", payload);
    Ok(client.post(url).multipart(form))
}
