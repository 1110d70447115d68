use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{ports::SellerTransport, Result};

use super::types::*;

/// Seller API adapter.
///
/// Owns the credential and response-format parameters and never lets an error
/// escape: every failure comes back as a `success:false` response.
#[derive(Clone)]
pub struct SellerApi {
    transport: Arc<dyn SellerTransport>,
    seller_key: String,
}

impl SellerApi {
    pub fn new(transport: Arc<dyn SellerTransport>, seller_key: impl Into<String>) -> Self {
        Self {
            transport,
            seller_key: seller_key.into(),
        }
    }

    /// Call the Seller API.
    ///
    /// With `candidates`, each identifier is tried as `type` in order until the
    /// backend answers with anything other than "type doesn't exist"; if every
    /// candidate is rejected that way, the last rejection is returned.
    pub async fn call(&self, base: &QueryParams, candidates: Option<&[String]>) -> RawApiResponse {
        let mut params = self.with_fixed_params(base);

        let candidates = match candidates {
            Some(c) if !c.is_empty() => c,
            _ => return self.request(&params).await,
        };

        let mut last = RawApiResponse::failure("No response", ResponseSource::Transport);
        for (idx, candidate) in candidates.iter().enumerate() {
            params.set("type", candidate.as_str());
            let resp = self.request(&params).await;
            if !resp.is_type_missing() {
                return resp;
            }
            info!(
                candidate = candidate.as_str(),
                remaining = candidates.len() - idx - 1,
                "seller rejected type identifier, trying next candidate"
            );
            last = resp;
        }
        last
    }

    fn with_fixed_params(&self, base: &QueryParams) -> QueryParams {
        let mut params = base.clone();
        params.remove("sellerkey");
        params.remove("format");
        params.set("sellerkey", self.seller_key.as_str());
        params.set("format", "json");
        params
    }

    async fn request(&self, params: &QueryParams) -> RawApiResponse {
        debug!(kind = params.get("type").unwrap_or(""), "seller request");
        match self.send(params).await {
            Ok(reply) => {
                let resp = RawApiResponse::from_reply(&reply);
                if resp.source == ResponseSource::NonJson {
                    warn!(status = reply.status, "seller returned a non-JSON body");
                }
                resp
            }
            Err(e) => {
                warn!(error = %e, "seller request failed");
                RawApiResponse::failure(e.to_string(), ResponseSource::Transport)
            }
        }
    }

    async fn send(&self, params: &QueryParams) -> Result<HttpReply> {
        self.transport.get(params).await
    }
}
