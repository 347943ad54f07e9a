//! # Plugin Contract
//!
//! The per-provider integration surface. Every capability is an opaque call
//! from the engine's point of view: it takes a provider cursor or payload and
//! returns either a page of provider-native items with a new cursor, or a
//! terminal outcome.
//!
//! All capabilities have a default implementation returning
//! [`PluginError::NotImplemented`], so a provider only implements what it
//! supports.

pub mod errors;
pub mod types;

pub use errors::{PluginError, PluginResult};
pub use types::*;

use async_trait::async_trait;

use crate::models::{PspAccount, PspBalance, PspConversion, PspOrder, PspOther, WebhookResponse};

#[async_trait]
pub trait Plugin: Send + Sync {
    /// Provider name this plugin talks to
    fn name(&self) -> &str;

    /// Validate provider credentials and declare the connector's task tree
    async fn install(&self, request: InstallRequest) -> PluginResult<InstallResponse>;

    async fn uninstall(&self, _request: UninstallRequest) -> PluginResult<()> {
        Ok(())
    }

    async fn fetch_next_accounts(&self, _request: FetchNextRequest) -> PluginResult<FetchNextResponse<PspAccount>> {
        Err(PluginError::not_implemented("fetch_next_accounts"))
    }

    async fn fetch_next_balances(&self, _request: FetchNextRequest) -> PluginResult<FetchNextResponse<PspBalance>> {
        Err(PluginError::not_implemented("fetch_next_balances"))
    }

    async fn fetch_next_external_accounts(
        &self,
        _request: FetchNextRequest,
    ) -> PluginResult<FetchNextResponse<PspAccount>> {
        Err(PluginError::not_implemented("fetch_next_external_accounts"))
    }

    async fn fetch_next_payments(&self, _request: FetchNextRequest) -> PluginResult<FetchNextPaymentsResponse> {
        Err(PluginError::not_implemented("fetch_next_payments"))
    }

    async fn fetch_next_orders(&self, _request: FetchNextRequest) -> PluginResult<FetchNextResponse<PspOrder>> {
        Err(PluginError::not_implemented("fetch_next_orders"))
    }

    async fn fetch_next_conversions(
        &self,
        _request: FetchNextRequest,
    ) -> PluginResult<FetchNextResponse<PspConversion>> {
        Err(PluginError::not_implemented("fetch_next_conversions"))
    }

    async fn fetch_next_others(&self, _request: FetchNextRequest) -> PluginResult<FetchNextResponse<PspOther>> {
        Err(PluginError::not_implemented("fetch_next_others"))
    }

    async fn create_webhooks(&self, _request: CreateWebhooksRequest) -> PluginResult<CreateWebhooksResponse> {
        Err(PluginError::not_implemented("create_webhooks"))
    }

    async fn translate_webhook(&self, _request: TranslateWebhookRequest) -> PluginResult<Vec<WebhookResponse>> {
        Err(PluginError::not_implemented("translate_webhook"))
    }

    async fn create_bank_account(&self, _request: CreateBankAccountRequest) -> PluginResult<CreateBankAccountResponse> {
        Err(PluginError::not_implemented("create_bank_account"))
    }

    async fn create_order(&self, _request: CreateOrderRequest) -> PluginResult<CreateOrderResponse> {
        Err(PluginError::not_implemented("create_order"))
    }

    async fn poll_order_status(&self, _request: PollOrderStatusRequest) -> PluginResult<PollOrderStatusResponse> {
        Err(PluginError::not_implemented("poll_order_status"))
    }

    async fn create_payout(&self, _request: CreatePaymentInitiationRequest) -> PluginResult<CreatePaymentInitiationResponse> {
        Err(PluginError::not_implemented("create_payout"))
    }

    async fn poll_payout_status(&self, _request: PollPaymentInitiationRequest) -> PluginResult<PollPaymentInitiationResponse> {
        Err(PluginError::not_implemented("poll_payout_status"))
    }

    async fn create_transfer(&self, _request: CreatePaymentInitiationRequest) -> PluginResult<CreatePaymentInitiationResponse> {
        Err(PluginError::not_implemented("create_transfer"))
    }

    async fn poll_transfer_status(&self, _request: PollPaymentInitiationRequest) -> PluginResult<PollPaymentInitiationResponse> {
        Err(PluginError::not_implemented("poll_transfer_status"))
    }

    async fn delete_user(&self, _request: DeleteUserRequest) -> PluginResult<()> {
        Err(PluginError::not_implemented("delete_user"))
    }

    async fn delete_user_connection(&self, _request: DeleteUserConnectionRequest) -> PluginResult<()> {
        Err(PluginError::not_implemented("delete_user_connection"))
    }

    async fn complete_user_link(&self, _request: CompleteUserLinkRequest) -> PluginResult<CompleteUserLinkResponse> {
        Err(PluginError::not_implemented("complete_user_link"))
    }
}
