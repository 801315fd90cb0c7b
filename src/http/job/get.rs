use reqwest::{Client, RequestBuilder};

#[derive(Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct GetJobRequest {
    /// The geographic location of the job.
    /// Required for jobs started outside the US and EU multi-regions.
    pub location: Option<String>,
}

pub fn build(base_url: &str, client: &Client, project_id: &str, job_id: &str, data: &GetJobRequest) -> RequestBuilder {
    let url = format!("{}/projects/{}/jobs/{}", base_url, project_id, job_id);
    client.get(url).query(data)
}
