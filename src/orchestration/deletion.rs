//! # Cascading Deletion
//!
//! Removes the payments and accounts of an end user for one scope. Payments
//! always go first since they reference accounts. Each step is an idempotent
//! bulk delete, so a failed cascade is safely re-run from the start; a failing
//! step aborts the rest of its branch.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::EngineContext;
use crate::error::{EngineResult, ResultExt};
use crate::models::{AccountId, ConnectorId};
use crate::substrate::ExecutionContext;

/// What part of an end user's data to delete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionScope {
    FromConnectionId(String),
    FromAccountId(AccountId),
    FromConnectorId(ConnectorId),
    /// Everything the end user owns
    WholePsu,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteConnectionData {
    pub psu_id: Uuid,
    pub scope: DeletionScope,
}

#[derive(Clone)]
pub struct DeletionOrchestrator {
    ctx: Arc<EngineContext>,
}

impl DeletionOrchestrator {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        Self { ctx }
    }

    pub async fn delete_connection_data(&self, exec: &ExecutionContext, request: DeleteConnectionData) -> EngineResult<()> {
        let psu_id = request.psu_id;
        let activities = &self.ctx.activities;

        match &request.scope {
            DeletionScope::FromConnectionId(connection_id) => {
                let connection_id = connection_id.as_str();
                activities
                    .storage_call(exec, "payments_delete_from_connection_id", move |storage| async move {
                        storage.payments_delete_from_connection_id(psu_id, connection_id).await
                    })
                    .await
                    .context("deleting payments")?;
                activities
                    .storage_call(exec, "accounts_delete_from_connection_id", move |storage| async move {
                        storage.accounts_delete_from_connection_id(psu_id, connection_id).await
                    })
                    .await
                    .context("deleting accounts")?;
            }
            DeletionScope::FromAccountId(account_id) => {
                activities
                    .storage_call(exec, "payments_delete_from_account_id", move |storage| async move {
                        storage.payments_delete_from_account_id(account_id).await
                    })
                    .await
                    .context("deleting payments from account ID")?;
                activities
                    .storage_call(exec, "accounts_delete", move |storage| async move {
                        storage.accounts_delete(account_id).await
                    })
                    .await
                    .context("deleting account")?;
            }
            DeletionScope::FromConnectorId(connector_id) => {
                activities
                    .storage_call(exec, "payments_delete_from_connector_id_and_psu", move |storage| async move {
                        storage.payments_delete_from_connector_id_and_psu(psu_id, connector_id).await
                    })
                    .await
                    .context("deleting payments")?;
                activities
                    .storage_call(exec, "accounts_delete_from_connector_id_and_psu", move |storage| async move {
                        storage.accounts_delete_from_connector_id_and_psu(psu_id, connector_id).await
                    })
                    .await
                    .context("deleting accounts")?;
            }
            DeletionScope::WholePsu => {
                activities
                    .storage_call(exec, "payments_delete_from_psu", move |storage| async move {
                        storage.payments_delete_from_psu(psu_id).await
                    })
                    .await
                    .context("deleting payments")?;
                activities
                    .storage_call(exec, "accounts_delete_from_psu", move |storage| async move {
                        storage.accounts_delete_from_psu(psu_id).await
                    })
                    .await
                    .context("deleting accounts")?;
            }
        }

        info!(psu_id = %psu_id, scope = ?request.scope, "🗑️ DELETION: Connection data deleted");
        Ok(())
    }
}
