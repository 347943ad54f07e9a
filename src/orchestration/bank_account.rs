//! Forwards a stored bank account to a connector and links the external
//! account the provider creates for it.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::retry_policy::ActivityOptions;
use super::task_reporter::TaskReporter;
use super::EngineContext;
use crate::error::{EngineResult, ResultExt};
use crate::events::DomainEvent;
use crate::models::{Account, AccountType, BankAccountRelatedAccount, ConnectorId, TaskId};
use crate::plugin::CreateBankAccountRequest;
use crate::substrate::ExecutionContext;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateBankAccountPayload {
    pub task_id: TaskId,
    pub connector_id: ConnectorId,
    pub bank_account_id: Uuid,
}

#[derive(Clone)]
pub struct BankAccountCreation {
    ctx: Arc<EngineContext>,
    reporter: TaskReporter,
}

impl BankAccountCreation {
    pub fn new(ctx: Arc<EngineContext>, reporter: TaskReporter) -> Self {
        Self { ctx, reporter }
    }

    pub async fn create_bank_account(&self, exec: &ExecutionContext, payload: CreateBankAccountPayload) -> EngineResult<()> {
        let connector_id = Some(&payload.connector_id);
        match self.forward(exec, &payload).await {
            Ok(account_id) => {
                self.reporter
                    .report_success(exec, &payload.task_id, connector_id, Some(account_id))
                    .await
            }
            Err(err) => self.reporter.fail(exec, &payload.task_id, connector_id, err).await,
        }
    }

    async fn forward(&self, exec: &ExecutionContext, payload: &CreateBankAccountPayload) -> EngineResult<String> {
        let activities = &self.ctx.activities;
        let connector_id = &payload.connector_id;
        let bank_account_id = payload.bank_account_id;

        let bank_account = activities
            .storage_call(exec, "bank_accounts_get", move |storage| async move {
                storage.bank_accounts_get(bank_account_id).await
            })
            .await
            .context("retrieving bank account")?;

        let request = CreateBankAccountRequest {
            bank_account: bank_account.clone(),
        };
        let request = &request;
        let response = activities
            .plugin_call(
                exec,
                ActivityOptions::infinite(),
                "create_bank_account",
                connector_id,
                move |plugin| async move { plugin.create_bank_account(request.clone()).await },
            )
            .await
            .context("creating bank account")?;

        let account = Account::from_psp(response.related_account, AccountType::External, connector_id)
            .context("translating account")?;
        let record = &account;
        activities
            .storage_call(exec, "accounts_store", move |storage| async move {
                storage.accounts_store(vec![record.clone()]).await
            })
            .await
            .context("storing account")?;
        self.ctx
            .emit(exec, DomainEvent::AccountSaved(account.clone()))
            .await
            .context("sending events")?;

        let related = BankAccountRelatedAccount {
            account_id: account.id.clone(),
            created_at: self.ctx.substrate.now(),
        };
        let related_ref = &related;
        activities
            .storage_call(exec, "bank_accounts_add_related_account", move |storage| async move {
                storage
                    .bank_accounts_add_related_account(bank_account_id, related_ref.clone())
                    .await
            })
            .await
            .context("adding related account")?;

        let mut updated = bank_account;
        if !updated.related_accounts.iter().any(|r| r.account_id == related.account_id) {
            updated.related_accounts.push(related);
        }
        self.ctx
            .emit(exec, DomainEvent::BankAccountRelatedAccountSaved(updated))
            .await
            .context("sending events")?;

        Ok(account.id.to_string())
    }
}
