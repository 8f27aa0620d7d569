use crate::config::Endpoints;
use crate::error::ClientError;
use crate::state::MediaRef;
use rehab_protocol::{Metrics, StartSessionRequest};
use reqwest::multipart::{Form, Part};

/// REST surface of the tracking backend. One attempt per call, no retry and
/// no per-request timeout; a stuck request just delays that tick.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    endpoints: Endpoints,
}

impl RestClient {
    pub fn new(endpoints: Endpoints) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoints,
        }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub async fn start(&self, exercise: &str) -> Result<(), ClientError> {
        let resp = match self.endpoints.user_id.as_deref() {
            Some(user_id) => {
                self.http
                    .post(self.endpoints.route("/start_session"))
                    .json(&StartSessionRequest {
                        exercise: exercise.to_string(),
                        user_id: user_id.to_string(),
                    })
                    .send()
                    .await?
            }
            None => {
                let mut url = self.endpoints.route("/start_exercise");
                url.query_pairs_mut().append_pair("name", exercise);
                self.http.post(url).send().await?
            }
        };
        ensure_ok(resp).await?;
        Ok(())
    }

    /// Response body is ignored beyond the status line.
    pub async fn stop(&self) -> Result<(), ClientError> {
        let path = if self.endpoints.user_id.is_some() {
            "/stop_session"
        } else {
            "/stop"
        };
        let resp = self.http.post(self.endpoints.route(path)).send().await?;
        ensure_ok(resp).await?;
        Ok(())
    }

    pub async fn latest_metrics(&self) -> Result<Metrics, ClientError> {
        let resp = self.http.get(self.endpoints.route("/data")).send().await?;
        let resp = ensure_ok(resp).await?;
        Ok(resp.json::<Metrics>().await?)
    }

    pub async fn analyze(&self, media: &MediaRef) -> Result<Metrics, ClientError> {
        let part = Part::bytes(media.bytes.clone())
            .file_name(media.file_name.clone())
            .mime_str(&media.mime)?;
        let form = Form::new().part("file", part);
        let resp = self
            .http
            .post(self.endpoints.route("/analyze_frame"))
            .multipart(form)
            .send()
            .await?;
        let resp = ensure_ok(resp).await?;
        Ok(resp.json::<Metrics>().await?)
    }
}

async fn ensure_ok(resp: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ClientError::BadStatus { status, body })
}
