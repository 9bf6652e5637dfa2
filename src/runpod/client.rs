//! `RunPod` API client implementation.
//!
//! This module provides the HTTP client for the `RunPod` GraphQL API, plus
//! the REST endpoint used for template deletion.

use async_trait::async_trait;
use reqwest::{Client, Response, header};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, trace};

use crate::config::{ApiConfig, Credentials, TemplateSpec};
use crate::error::{PodrunError, Result, RunPodError};

use super::api::RunPodApi;
use super::types::{CreatePodRequest, GpuOffer, Pod, PodTemplate};

/// Maximum number of attempts for transient query failures.
const MAX_RETRIES: u32 = 3;

/// Delay between retries in milliseconds.
const RETRY_DELAY_MS: u64 = 1000;

/// Fields fetched for every pod.
const POD_FIELDS: &str = r"
    id
    name
    desiredStatus
    imageName
    gpuCount
    volumeInGb
    containerDiskInGb
    costPerHr
    machine {
        gpuTypeId
    }
";

/// Fields fetched for every template.
const TEMPLATE_FIELDS: &str = r"
    id
    name
    imageName
    containerDiskInGb
    volumeInGb
    volumeMountPath
    ports
";

/// `RunPod` API client.
#[derive(Debug, Clone)]
pub struct RunPodClient {
    /// HTTP client.
    client: Client,
    /// API credentials.
    credentials: Credentials,
    /// GraphQL endpoint.
    graphql_url: String,
    /// REST endpoint base, without trailing slash.
    rest_url: String,
}

/// GraphQL request structure.
#[derive(Debug, Serialize)]
struct GraphQLRequest {
    query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    variables: Option<serde_json::Value>,
}

/// GraphQL response structure.
#[derive(Debug, Deserialize)]
struct GraphQLResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQLError>>,
}

/// GraphQL error structure.
#[derive(Debug, Deserialize)]
struct GraphQLError {
    message: String,
}

impl RunPodClient {
    /// Creates a new `RunPod` API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(credentials: Credentials, api: &ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(api.timeout_secs))
            .build()
            .map_err(|e| RunPodError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            credentials,
            graphql_url: api.graphql_url.clone(),
            rest_url: api.rest_url.trim_end_matches('/').to_string(),
        })
    }

    /// Executes a GraphQL request that is safe to repeat, retrying transient failures.
    async fn query<T: for<'de> Deserialize<'de>>(
        &self,
        query: &str,
        variables: Option<serde_json::Value>,
    ) -> Result<T> {
        let request = GraphQLRequest {
            query: query.to_string(),
            variables,
        };

        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                debug!("Retry attempt {attempt} of {MAX_RETRIES}");
                tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS * u64::from(attempt)))
                    .await;
            }

            match self.execute_once::<T>(&request).await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() => last_error = Some(e),
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            PodrunError::RunPod(RunPodError::network("Max retries exceeded"))
        }))
    }

    /// Executes a GraphQL mutation exactly once.
    ///
    /// Mutations are not idempotent, so a lost response must not turn into a
    /// second template or pod.
    async fn mutate<T: for<'de> Deserialize<'de>>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T> {
        let request = GraphQLRequest {
            query: query.to_string(),
            variables: Some(variables),
        };
        self.execute_once(&request).await
    }

    /// Executes a single GraphQL request.
    async fn execute_once<T: for<'de> Deserialize<'de>>(
        &self,
        request: &GraphQLRequest,
    ) -> Result<T> {
        trace!("Executing GraphQL query: {}", request.query);

        let response = self
            .client
            .post(&self.graphql_url)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, self.bearer())
            .json(request)
            .send()
            .await
            .map_err(|e| RunPodError::network(format!("Request failed: {e}")))?;

        let response = Self::check_status(response).await?;

        let gql_response: GraphQLResponse<T> = response.json().await.map_err(|e| {
            PodrunError::RunPod(RunPodError::InvalidResponse {
                message: format!("Failed to parse response: {e}"),
            })
        })?;

        if let Some(errors) = gql_response.errors.filter(|e| !e.is_empty()) {
            let message = errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(PodrunError::RunPod(RunPodError::api_error(400, message)));
        }

        gql_response.data.ok_or_else(|| {
            PodrunError::RunPod(RunPodError::InvalidResponse {
                message: String::from("No data in response"),
            })
        })
    }

    /// Maps non-success HTTP statuses onto API errors.
    async fn check_status(response: Response) -> Result<Response> {
        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or_default();
            let retry_after = if retry_after == 0 { 60 } else { retry_after };

            return Err(PodrunError::RunPod(RunPodError::RateLimited {
                retry_after_secs: retry_after,
            }));
        }

        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(PodrunError::RunPod(RunPodError::AuthenticationFailed {
                message: String::from("Invalid API key"),
            }));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PodrunError::RunPod(RunPodError::api_error(
                status.as_u16(),
                body,
            )));
        }

        Ok(response)
    }

    /// Returns the authorization header value.
    fn bearer(&self) -> String {
        format!("Bearer {}", self.credentials.api_key())
    }
}

#[async_trait]
impl RunPodApi for RunPodClient {
    async fn gpu_offers(&self, min_memory_gb: u32) -> Result<Vec<GpuOffer>> {
        #[derive(Deserialize)]
        struct Response {
            #[serde(rename = "gpuTypes")]
            gpu_types: Vec<GpuOffer>,
        }

        let query = r"
            query GpuOffers($lowestPriceInput: GpuLowestPriceInput) {
                gpuTypes {
                    id
                    displayName
                    memoryInGb
                    lowestPrice(input: $lowestPriceInput) {
                        uninterruptablePrice
                        minimumBidPrice
                        stockStatus
                    }
                }
            }
        ";

        let variables = serde_json::json!({
            "lowestPriceInput": {
                "gpuCount": 1,
                "minMemoryInGb": min_memory_gb,
            }
        });

        let response: Response = self.query(query, Some(variables)).await?;
        debug!("Provider returned {} GPU types", response.gpu_types.len());
        Ok(response.gpu_types)
    }

    async fn list_templates(&self) -> Result<Vec<PodTemplate>> {
        #[derive(Deserialize)]
        struct Response {
            myself: MyselfResponse,
        }
        #[derive(Deserialize)]
        struct MyselfResponse {
            #[serde(rename = "podTemplates", default)]
            pod_templates: Vec<PodTemplate>,
        }

        let query = format!("query {{ myself {{ podTemplates {{ {TEMPLATE_FIELDS} }} }} }}");

        let response: Response = self.query(&query, None).await?;
        Ok(response.myself.pod_templates)
    }

    async fn create_template(&self, name: &str, spec: &TemplateSpec) -> Result<PodTemplate> {
        #[derive(Deserialize)]
        struct Response {
            #[serde(rename = "saveTemplate")]
            template: PodTemplate,
        }

        let query = format!(
            "mutation SaveTemplate($input: SaveTemplateInput!) {{ saveTemplate(input: $input) {{ {TEMPLATE_FIELDS} }} }}"
        );

        let variables = serde_json::json!({
            "input": {
                "name": name,
                "imageName": spec.image,
                "containerDiskInGb": spec.container_disk_gb,
                "volumeInGb": spec.volume_gb,
                "volumeMountPath": spec.volume_mount_path,
                "ports": spec.ports_string(),
                "dockerArgs": "",
                "env": [],
                "isServerless": false,
                "readme": "",
            }
        });

        let response: Response = self.mutate(&query, variables).await?;
        Ok(response.template)
    }

    async fn delete_template(&self, template_id: &str) -> Result<()> {
        let url = format!("{}/templates/{template_id}", self.rest_url);
        trace!("DELETE {url}");

        let response = self
            .client
            .delete(&url)
            .header(header::AUTHORIZATION, self.bearer())
            .send()
            .await
            .map_err(|e| RunPodError::network(format!("Request failed: {e}")))?;

        Self::check_status(response).await?;
        Ok(())
    }

    async fn create_pod(&self, request: &CreatePodRequest) -> Result<Pod> {
        #[derive(Deserialize)]
        struct Response {
            #[serde(rename = "podFindAndDeployOnDemand")]
            pod: Option<Pod>,
        }

        let query = format!(
            "mutation CreatePod($input: PodFindAndDeployOnDemandInput!) {{ podFindAndDeployOnDemand(input: $input) {{ {POD_FIELDS} }} }}"
        );

        let variables = serde_json::json!({ "input": request });
        let response: Response = self.mutate(&query, variables).await?;

        response.pod.ok_or_else(|| {
            PodrunError::RunPod(RunPodError::InvalidResponse {
                message: String::from("Pod creation returned no pod"),
            })
        })
    }

    async fn get_pod(&self, pod_id: &str) -> Result<Pod> {
        #[derive(Deserialize)]
        struct Response {
            pod: Option<Pod>,
        }

        let query = format!(
            "query Pod($podId: String!) {{ pod(input: {{ podId: $podId }}) {{ {POD_FIELDS} }} }}"
        );

        let variables = serde_json::json!({ "podId": pod_id });
        let response: Response = self.query(&query, Some(variables)).await?;

        response.pod.ok_or_else(|| {
            PodrunError::RunPod(RunPodError::PodNotFound {
                pod_id: pod_id.to_string(),
            })
        })
    }

    async fn terminate_pod(&self, pod_id: &str) -> Result<()> {
        #[derive(Deserialize)]
        struct Response {
            #[serde(rename = "podTerminate")]
            _result: Option<serde_json::Value>,
        }

        let query = r"
            mutation TerminatePod($podId: String!) {
                podTerminate(input: { podId: $podId })
            }
        ";

        // podTerminate is idempotent, so it takes the retrying path
        let variables = serde_json::json!({ "podId": pod_id });
        let _: Response = self.query(query, Some(variables)).await?;

        Ok(())
    }
}
