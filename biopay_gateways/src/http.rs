use std::{sync::Arc, time::Duration};

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::GatewayError;

/// A JSON-over-HTTP client bound to one base URL. Cheap to clone.
#[derive(Clone)]
pub struct JsonClient {
    base_url: String,
    client: Arc<Client>,
}

impl JsonClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let mut headers = HeaderMap::with_capacity(1);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Initialization(e.to_string()))?;
        let base_url = base_url.trim_end_matches('/').to_string();
        Ok(Self { base_url, client: Arc::new(client) })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub async fn json_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<B>,
    ) -> Result<T, GatewayError> {
        let url = self.url(path);
        trace!("Sending {method} request: {url}");
        let mut req = self.client.request(method, url);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| GatewayError::RequestError(e.to_string()))?;
        if response.status().is_success() {
            trace!("Request successful. {}", response.status());
            response.json::<T>().await.map_err(|e| GatewayError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| GatewayError::ResponseError(e.to_string()))?;
            Err(GatewayError::QueryError { status, message })
        }
    }

    /// GETs `path` and returns the raw body of a successful response.
    pub async fn get_text(&self, path: &str) -> Result<String, GatewayError> {
        let url = self.url(path);
        trace!("Sending GET request: {url}");
        let response = self.client.get(url).send().await.map_err(|e| GatewayError::RequestError(e.to_string()))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| GatewayError::ResponseError(e.to_string()))?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(GatewayError::QueryError { status: status.as_u16(), message: body })
        }
    }
}
