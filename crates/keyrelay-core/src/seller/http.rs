//! `reqwest` implementation of the Seller API transport.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;

use crate::{
    errors::Error,
    ports::SellerTransport,
    seller::types::{HttpReply, QueryParams},
    Result,
};

#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    endpoint: Url,
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { endpoint, http })
    }
}

#[async_trait]
impl SellerTransport for ReqwestTransport {
    async fn get(&self, params: &QueryParams) -> Result<HttpReply> {
        let resp = self
            .http
            .get(self.endpoint.clone())
            .query(params.pairs())
            .send()
            .await
            .map_err(|e| Error::External(format!("seller request error: {e}")))?;

        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::External(format!("seller body error: {e}")))?;

        Ok(HttpReply { status, body })
    }
}
