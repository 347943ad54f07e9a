//! # Webhook Fan-out
//!
//! An inbound webhook is stored as received, translated by the connector's
//! plugin, and every translated response is stored by its own child
//! execution. Child ids derive from the response's idempotency key, so a
//! redelivered webhook cannot store the same response twice.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use super::capabilities::PaymentsCapability;
use super::pagination::FetchCapability;
use super::retry_policy::ActivityOptions;
use super::workflow::WorkflowRequest;
use super::EngineContext;
use crate::constants::STORE_WEBHOOK_PREFIX;
use crate::error::{EngineError, EngineResult, ResultExt};
use crate::events::DomainEvent;
use crate::models::{Account, AccountType, Balance, ConnectorId, Payment, Webhook, WebhookConfig, WebhookResponse};
use crate::plugin::TranslateWebhookRequest;
use crate::substrate::{ChildOptions, ExecutionContext};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandleWebhooksPayload {
    pub connector_id: ConnectorId,
    pub webhook: Webhook,
    pub config: Option<WebhookConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreWebhookTranslationPayload {
    pub connector_id: ConnectorId,
    pub response: WebhookResponse,
}

#[derive(Clone)]
pub struct WebhookFanout {
    ctx: Arc<EngineContext>,
}

impl WebhookFanout {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        Self { ctx }
    }

    pub async fn handle_webhooks(&self, exec: &ExecutionContext, payload: HandleWebhooksPayload) -> EngineResult<()> {
        let connector_id = &payload.connector_id;
        let activities = &self.ctx.activities;

        let webhook = &payload.webhook;
        activities
            .storage_call(exec, "webhooks_store", move |storage| async move {
                storage.webhooks_store(webhook.clone()).await
            })
            .await
            .context("storing webhook")?;

        let request = TranslateWebhookRequest {
            webhook: payload.webhook.clone(),
            config: payload.config.clone(),
        };
        let request = &request;
        let responses = activities
            .plugin_call(
                exec,
                ActivityOptions::infinite(),
                "translate_webhook",
                connector_id,
                move |plugin| async move { plugin.translate_webhook(request.clone()).await },
            )
            .await
            .context("translating webhook")?;

        info!(
            connector_id = %connector_id,
            webhook_id = %payload.webhook.id,
            responses = responses.len(),
            "🪝 WEBHOOK: Translated"
        );

        let children = responses
            .into_iter()
            .map(|response| self.start_store_translation(exec, connector_id, response));
        join_all(children).await.into_iter().collect::<EngineResult<Vec<()>>>()?;
        Ok(())
    }

    async fn start_store_translation(
        &self,
        exec: &ExecutionContext,
        connector_id: &ConnectorId,
        response: WebhookResponse,
    ) -> EngineResult<()> {
        let workflow_id = format!(
            "{STORE_WEBHOOK_PREFIX}-{}-{}-{}",
            self.ctx.stack(),
            connector_id,
            response.idempotency_key
        );
        let options = self
            .ctx
            .search_attributes(Some(connector_id))
            .into_iter()
            .fold(ChildOptions::awaited().with_workflow_id(workflow_id.clone()), |options, (key, value)| {
                options.with_search_attribute(key, value)
            });
        let request = WorkflowRequest::StoreWebhookTranslation(StoreWebhookTranslationPayload {
            connector_id: connector_id.clone(),
            response,
        });

        match self.ctx.start_child(exec, request, options).await {
            Ok(()) => Ok(()),
            Err(EngineError::Substrate(err)) if err.is_already_started() => {
                debug!(workflow_id = %workflow_id, "Webhook translation already stored");
                Ok(())
            }
            Err(err) => Err(err.with_context("storing webhook translation")),
        }
    }

    /// Store every entity of one translated response and emit its event
    pub async fn store_webhook_translation(
        &self,
        exec: &ExecutionContext,
        payload: StoreWebhookTranslationPayload,
    ) -> EngineResult<()> {
        let connector_id = &payload.connector_id;
        let response = payload.response;
        let activities = &self.ctx.activities;

        let accounts = [
            (response.account, AccountType::Internal),
            (response.external_account, AccountType::External),
        ];
        for (psp, account_type) in accounts {
            let Some(psp) = psp else { continue };
            let account = Account::from_psp(psp, account_type, connector_id).context("translating account")?;
            let record = &account;
            activities
                .storage_call(exec, "accounts_store", move |storage| async move {
                    storage.accounts_store(vec![record.clone()]).await
                })
                .await
                .context("storing account")?;
            self.ctx
                .emit(exec, DomainEvent::AccountSaved(account))
                .await
                .context("sending events")?;
        }

        if let Some(psp) = response.balance {
            let balance = Balance::from_psp(psp, connector_id).context("translating balance")?;
            let record = &balance;
            activities
                .storage_call(exec, "balances_store", move |storage| async move {
                    storage.balances_store(vec![record.clone()]).await
                })
                .await
                .context("storing balance")?;
            self.ctx
                .emit(exec, DomainEvent::BalanceSaved(balance))
                .await
                .context("sending events")?;
        }

        if let Some(psp) = response.payment {
            let payment = Payment::from_psp(psp, connector_id).context("translating payment")?;
            let record = &payment;
            activities
                .storage_call(exec, "payments_store", move |storage| async move {
                    storage.payments_store(vec![record.clone()]).await
                })
                .await
                .context("storing payment")?;
            PaymentsCapability.after_store(&self.ctx, exec, &payment).await?;
            self.ctx
                .emit(exec, DomainEvent::PaymentSaved(payment))
                .await
                .context("sending events")?;
        }

        Ok(())
    }
}
