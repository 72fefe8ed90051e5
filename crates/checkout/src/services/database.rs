//! HTTP client for the internal database service implementing [`MirrorStore`].

use async_trait::async_trait;
use common::SessionId;
use reqwest::Client;

use crate::error::CheckoutError;
use crate::flow;
use crate::models::{MirrorRecord, MirrorStatus};
use crate::services::mirror::MirrorStore;
use crate::services::path_segment;

/// Mirror store backed by the database service's `/api/subscriptions` resource.
#[derive(Debug, Clone)]
pub struct HttpMirrorStore {
    client: Client,
    base_url: String,
}

impl HttpMirrorStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn collection_url(&self) -> String {
        format!("{}/api/subscriptions", self.base_url)
    }
}

#[async_trait]
impl MirrorStore for HttpMirrorStore {
    #[tracing::instrument(skip(self, record), fields(session_id = %record.stripe_session_id))]
    async fn register(&self, record: &MirrorRecord) -> Result<MirrorStatus, CheckoutError> {
        let response = self
            .client
            .post(self.collection_url())
            .json(record)
            .send()
            .await
            .map_err(|e| CheckoutError::Mirror {
                operation: flow::STEP_REGISTER_MIRROR,
                message: e.to_string(),
            })?;

        let status = MirrorStatus(response.status().as_u16());
        if !status.is_created() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), %body, "mirror registration not acknowledged");
        }
        Ok(status)
    }

    #[tracing::instrument(skip(self))]
    async fn remove(&self, session_id: &SessionId) -> Result<MirrorStatus, CheckoutError> {
        let url = format!(
            "{}/{}",
            self.collection_url(),
            path_segment(session_id.as_str())?
        );
        let response = self
            .client
            .delete(url)
            .send()
            .await
            .map_err(|e| CheckoutError::Mirror {
                operation: flow::STEP_REMOVE_MIRROR,
                message: e.to_string(),
            })?;

        Ok(MirrorStatus(response.status().as_u16()))
    }
}
