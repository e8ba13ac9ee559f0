// HTTP API adapter - dashboards, widgets and query execution over REST
use crate::application::query_runner::{LoadError, LoadRequest, QueryRunner};
use crate::application::remote::{DashboardLookup, DashboardRemote, RemoteError, WidgetRemote};
use crate::domain::position::WidgetId;
use crate::domain::query_result::{Column, QueryResult};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;

const JOB_SUCCESS: i64 = 3;
const JOB_FAILURE: i64 = 4;
const JOB_CANCELLED: i64 = 5;

#[derive(Debug, Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    poll_interval: Duration,
}

#[derive(Debug, Deserialize)]
struct ExecuteResponse {
    #[serde(default)]
    query_result: Option<WireQueryResult>,
    #[serde(default)]
    job: Option<Job>,
}

#[derive(Debug, Deserialize)]
struct JobResponse {
    job: Job,
}

#[derive(Debug, Deserialize)]
struct Job {
    id: String,
    status: i64,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    query_result_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct QueryResultResponse {
    query_result: WireQueryResult,
}

#[derive(Debug, Deserialize)]
struct WireQueryResult {
    id: i64,
    #[serde(default)]
    data: WireData,
}

#[derive(Debug, Default, Deserialize)]
struct WireData {
    #[serde(default)]
    columns: Vec<Column>,
    #[serde(default)]
    rows: Vec<Map<String, Value>>,
}

impl From<WireQueryResult> for QueryResult {
    fn from(wire: WireQueryResult) -> Self {
        QueryResult {
            id: Some(wire.id),
            columns: wire.data.columns,
            rows: wire.data.rows,
        }
    }
}

impl HttpApi {
    pub fn new(base_url: &str, api_key: String, poll_interval: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            poll_interval,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut builder = self
            .client
            .request(method, self.url(path))
            .header("Accept", "application/json");
        if !self.api_key.is_empty() {
            builder = builder.header("Authorization", format!("Key {}", self.api_key));
        }
        builder
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Value, RemoteError> {
        let response = builder
            .send()
            .await
            .context("Failed to send request to dashboard API")
            .map_err(RemoteError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(status = status.as_u16(), body = %body, "dashboard API request failed");
            return Err(RemoteError::from_status(status.as_u16(), body));
        }

        response
            .json::<Value>()
            .await
            .context("Failed to parse dashboard API response")
            .map_err(RemoteError::Transport)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, LoadError> {
        let value = self.send(self.request(Method::GET, path)).await.map_err(anyhow::Error::from)?;
        Ok(serde_json::from_value(value).with_context(|| format!("Unexpected response from {}", path))?)
    }

    async fn wait_for_job(&self, mut job: Job) -> Result<i64, LoadError> {
        loop {
            match job.status {
                JOB_SUCCESS => {
                    return job
                        .query_result_id
                        .ok_or_else(|| anyhow::anyhow!("job {} finished without a result", job.id).into());
                }
                JOB_FAILURE => {
                    return Err(LoadError::QueryResult(job.error.unwrap_or_default()));
                }
                JOB_CANCELLED => {
                    return Err(LoadError::QueryResult("Query was canceled".to_string()));
                }
                _ => {}
            }
            tokio::time::sleep(self.poll_interval).await;
            let path = format!("api/jobs/{}", urlencoding::encode(&job.id));
            job = self.get_json::<JobResponse>(&path).await?.job;
        }
    }
}

#[async_trait]
impl WidgetRemote for HttpApi {
    async fn save_widget(&self, id: Option<WidgetId>, payload: Value) -> Result<Value, RemoteError> {
        let path = match id {
            Some(id) => format!("api/widgets/{}", id),
            None => "api/widgets".to_string(),
        };
        self.send(self.request(Method::POST, &path).json(&payload)).await
    }

    async fn get_widget(&self, id: WidgetId) -> Result<Value, RemoteError> {
        self.send(self.request(Method::GET, &format!("api/widgets/{}", id))).await
    }
}

#[async_trait]
impl DashboardRemote for HttpApi {
    async fn save_dashboard(&self, payload: Value) -> Result<Value, RemoteError> {
        let id = payload
            .get("id")
            .and_then(Value::as_i64)
            .ok_or_else(|| RemoteError::Transport(anyhow::anyhow!("dashboard payload without id")))?;
        self.send(self.request(Method::POST, &format!("api/dashboards/{}", id)).json(&payload))
            .await
    }

    async fn get_dashboard(&self, lookup: &DashboardLookup) -> Result<Value, RemoteError> {
        let path = match lookup {
            DashboardLookup::Id(id) => format!("api/dashboards/{}", id),
            DashboardLookup::Slug(slug) => format!("api/dashboards/{}", urlencoding::encode(slug)),
        };
        self.send(self.request(Method::GET, &path)).await
    }

    async fn archive_dashboard(&self, id: i64) -> Result<Value, RemoteError> {
        self.send(self.request(Method::DELETE, &format!("api/dashboards/{}", id)))
            .await
    }
}

#[async_trait]
impl QueryRunner for HttpApi {
    async fn run(&self, request: LoadRequest) -> Result<QueryResult, LoadError> {
        let query_id = request.query.id;
        let mut body = json!({
            "id": query_id,
            "parameters": request.parameters,
        });
        if let Some(max_age) = request.max_age {
            body["max_age"] = max_age.into();
        }

        let path = format!("api/queries/{}/results", query_id);
        let response = self
            .send(self.request(Method::POST, &path).json(&body))
            .await
            .map_err(anyhow::Error::from)?;
        let response: ExecuteResponse =
            serde_json::from_value(response).context("Unexpected query execution response")?;

        if let Some(result) = response.query_result {
            return Ok(result.into());
        }
        let job = response
            .job
            .ok_or_else(|| anyhow::anyhow!("query {} returned neither a result nor a job", query_id))?;
        tracing::debug!(query_id, job_id = %job.id, "waiting for query job");

        let result_id = self.wait_for_job(job).await?;
        let response: QueryResultResponse = self.get_json(&format!("api/query_results/{}", result_id)).await?;
        Ok(response.query_result.into())
    }
}
