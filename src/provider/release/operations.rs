//! Service release operations

use super::{
    CreateReleaseRequest, ReleaseClient, ReleaseResponse, ServiceResponse, UpdateReleaseRequest,
    OPERATION_CREATE, OPERATION_DELETE, OPERATION_GET, OPERATION_LOOKUP, OPERATION_UPDATE,
};
use crate::provider::{
    CreatedResource, ExternalDetail, ExternalInfo, ExternalResourceAdapter, Params, ProviderError,
};
use async_trait::async_trait;
use reqwest::Method;
use tracing::{debug, info};

#[async_trait]
impl ExternalResourceAdapter for ReleaseClient {
    async fn create(
        &self,
        service_id: &str,
        release_id: &str,
        params: &Params,
    ) -> Result<CreatedResource, ProviderError> {
        let lookup_url = self.url(&["v1", "services", service_id]);
        let service: ServiceResponse = self
            .execute(
                OPERATION_LOOKUP,
                self.make_request(Method::GET, lookup_url),
            )
            .await?;
        debug!(
            service.id = %service.id,
            service.primary_key = %service.primary_key,
            "Resolved service before create"
        );

        let url = self.url(&["v1", "services", service_id, "releases"]);
        let body = CreateReleaseRequest { release_id, params };
        let response: ReleaseResponse = self
            .execute(
                OPERATION_CREATE,
                self.make_request(Method::POST, url).json(&body),
            )
            .await?;
        let info = response.into_info(OPERATION_CREATE)?;

        info!(
            service.id = %service_id,
            release.id = %info.id,
            "Created service release"
        );

        Ok(CreatedResource {
            info,
            primary_key: service.primary_key,
        })
    }

    async fn update(
        &self,
        service_id: &str,
        external_id: &str,
        params: &Params,
    ) -> Result<ExternalInfo, ProviderError> {
        let url = self.url(&["v1", "services", service_id, "releases", external_id]);
        let body = UpdateReleaseRequest { params };
        let response: ReleaseResponse = self
            .execute(
                OPERATION_UPDATE,
                self.make_request(Method::PUT, url).json(&body),
            )
            .await?;
        response.into_info(OPERATION_UPDATE)
    }

    async fn delete(
        &self,
        service_id: &str,
        external_id: &str,
    ) -> Result<ExternalInfo, ProviderError> {
        let url = self.url(&["v1", "services", service_id, "releases", external_id]);
        let response: ReleaseResponse = self
            .execute(OPERATION_DELETE, self.make_request(Method::DELETE, url))
            .await?;
        response.into_info(OPERATION_DELETE)
    }

    async fn get_status(
        &self,
        service_id: &str,
        external_id: &str,
    ) -> Result<ExternalInfo, ProviderError> {
        let url = self.url(&["v1", "services", service_id, "releases", external_id]);
        let response: ReleaseResponse = self
            .execute(OPERATION_GET, self.make_request(Method::GET, url))
            .await?;
        response.into_info(OPERATION_GET)
    }

    async fn get_detail(
        &self,
        service_id: &str,
        external_id: &str,
    ) -> Result<ExternalDetail, ProviderError> {
        let url = self.url(&["v1", "services", service_id, "releases", external_id]);
        self.execute(OPERATION_GET, self.make_request(Method::GET, url))
            .await
    }
}
