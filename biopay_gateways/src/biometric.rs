use biopay_engine::{
    db_types::AccountId,
    traits::{BiometricSample, IdentityGateway, IdentityGatewayError},
};
use log::*;
use reqwest::Method;

use crate::{
    config::BiometricConfig,
    data_objects::{DeleteFaceBody, FaceSearchBody, FaceSearchResponse, LinkFaceBody, SuccessResponse},
    http::JsonClient,
    GatewayError,
};

/// Client for the biometric identity service. Only the top match of a search is considered.
#[derive(Clone)]
pub struct BiometricClient {
    http: JsonClient,
}

impl BiometricClient {
    pub fn new(config: BiometricConfig) -> Result<Self, GatewayError> {
        let http = JsonClient::new(&config.base_url, config.timeout)?;
        info!("🧑️ Biometric client for {} created", config.base_url);
        Ok(Self { http })
    }
}

fn service_error(e: GatewayError) -> IdentityGatewayError {
    match e {
        GatewayError::JsonError(s) => IdentityGatewayError::InvalidResponse(s),
        e => IdentityGatewayError::Unavailable(e.to_string()),
    }
}

impl IdentityGateway for BiometricClient {
    async fn search_face(&self, sample: &BiometricSample) -> Result<Option<AccountId>, IdentityGatewayError> {
        let body = FaceSearchBody { image_base64: sample.as_base64(), top_k: 1, search_type: "user" };
        let response = self
            .http
            .json_query::<FaceSearchResponse, _>(Method::POST, "/biometric/search", Some(body))
            .await
            .map_err(|e| {
                error!("🧑️ Face search failed. {e}");
                service_error(e)
            })?;
        let Some(top) = response.matches.first() else {
            debug!("🧑️ No face matches {sample:?}");
            return Ok(None);
        };
        match top.account_id() {
            Some(id) => {
                debug!("🧑️ {sample:?} matches account #{id}");
                Ok(Some(AccountId(id)))
            },
            None => Err(IdentityGatewayError::InvalidResponse(format!("Unusable user_id in match: {}", top.user_id))),
        }
    }

    async fn link_face(&self, account: AccountId, face_id: &str) -> Result<bool, IdentityGatewayError> {
        let body = LinkFaceBody { user_id: account.0, face_id };
        let response = self
            .http
            .json_query::<SuccessResponse, _>(Method::PUT, "/biometric/update-face-user", Some(body))
            .await
            .map_err(|e| {
                error!("🧑️ Could not link face {face_id} to account #{account}. {e}");
                service_error(e)
            })?;
        Ok(response.success)
    }

    async fn delete_face(&self, account: AccountId) -> Result<bool, IdentityGatewayError> {
        let body = DeleteFaceBody { user_id: account.0 };
        let response = self
            .http
            .json_query::<SuccessResponse, _>(Method::DELETE, "/biometric/delete", Some(body))
            .await
            .map_err(|e| {
                error!("🧑️ Could not delete the face of account #{account}. {e}");
                service_error(e)
            })?;
        Ok(response.success)
    }
}
