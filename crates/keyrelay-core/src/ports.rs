use async_trait::async_trait;

use crate::{
    domain::UserId,
    seller::types::{HttpReply, QueryParams},
    Result,
};

/// Hexagonal port for the Seller API HTTP transport.
///
/// Implementations issue exactly one GET per call and return the raw reply;
/// status handling and body decoding belong to `seller::SellerApi`.
#[async_trait]
pub trait SellerTransport: Send + Sync {
    async fn get(&self, params: &QueryParams) -> Result<HttpReply>;
}

/// Hexagonal port answering "is this user an operator?".
///
/// Telegram implements it as membership of the configured operator chat.
#[async_trait]
pub trait RoleDirectory: Send + Sync {
    async fn is_operator(&self, user_id: UserId) -> Result<bool>;
}
