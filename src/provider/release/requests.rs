//! Service release request bodies

use crate::provider::Params;
use serde::Serialize;

/// `POST /v1/services/{serviceId}/releases`
#[derive(Debug, Serialize)]
pub struct CreateReleaseRequest<'a> {
    pub release_id: &'a str,
    pub params: &'a Params,
}

/// `PUT /v1/services/{serviceId}/releases/{id}`
#[derive(Debug, Serialize)]
pub struct UpdateReleaseRequest<'a> {
    pub params: &'a Params,
}
