//! # End-user Lifecycle
//!
//! Unlinking end users (payment service users) from open-banking connectors,
//! down to single bank connections, and completing hosted bank-linking flows.
//! Provider-side cleanup always runs before the local cascade so a failed
//! provider call leaves local data in place for the retry.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::deletion::{DeleteConnectionData, DeletionScope};
use super::retry_policy::ActivityOptions;
use super::task_reporter::TaskReporter;
use super::workflow::WorkflowRequest;
use super::EngineContext;
use crate::error::{EngineResult, ResultExt};
use crate::events::DomainEvent;
use crate::models::{BankBridge, ConnectorId, PaymentServiceUser, TaskId, UserLinkStatus};
use crate::plugin::{CompleteUserLinkRequest, DeleteUserConnectionRequest, DeleteUserRequest};
use crate::storage::PageRequest;
use crate::substrate::{ChildOptions, ExecutionContext};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletePsuPayload {
    pub task_id: TaskId,
    pub psu_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletePsuConnectorPayload {
    pub task_id: TaskId,
    pub psu_id: Uuid,
    pub connector_id: ConnectorId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletePsuConnectionPayload {
    pub task_id: TaskId,
    pub psu_id: Uuid,
    pub connector_id: ConnectorId,
    pub connection_id: String,
}

/// Callback of a hosted bank-linking flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompleteUserLinkPayload {
    pub connector_id: ConnectorId,
    pub attempt_id: Uuid,
    #[serde(default)]
    pub query_values: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub headers: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub body: Vec<u8>,
}

#[derive(Clone)]
pub struct UserLifecycle {
    ctx: Arc<EngineContext>,
    reporter: TaskReporter,
}

impl UserLifecycle {
    pub fn new(ctx: Arc<EngineContext>, reporter: TaskReporter) -> Self {
        Self { ctx, reporter }
    }

    /// Unlink the end user from every connector, then delete all of their data
    pub async fn delete_psu(&self, exec: &ExecutionContext, payload: DeletePsuPayload) -> EngineResult<()> {
        match self.unlink_psu(exec, &payload).await {
            Ok(()) => {
                self.reporter
                    .report_success(exec, &payload.task_id, None, Some(payload.psu_id.to_string()))
                    .await
            }
            Err(err) => self.reporter.fail(exec, &payload.task_id, None, err).await,
        }
    }

    async fn unlink_psu(&self, exec: &ExecutionContext, payload: &DeletePsuPayload) -> EngineResult<()> {
        let psu_id = payload.psu_id;
        let activities = &self.ctx.activities;
        let psu = self.load_psu(exec, psu_id).await?;

        let mut unlinked = 0;
        let mut next = Some(PageRequest::first(self.ctx.config.engine.list_page_size));
        while let Some(page_request) = next {
            let request = &page_request;
            let page = activities
                .storage_call(exec, "psu_bank_bridges_list", move |storage| async move {
                    storage.psu_bank_bridges_list(psu_id, request.clone()).await
                })
                .await
                .context("listing bank bridges")?;

            for bridge in &page.data {
                self.delete_user(exec, &psu, bridge).await?;
                self.cascade(
                    exec,
                    psu_id,
                    DeletionScope::FromConnectorId(bridge.connector_id.clone()),
                    Some(&bridge.connector_id),
                )
                .await?;
                unlinked += 1;
            }
            next = page_request.next(&page);
        }

        self.cascade(exec, psu_id, DeletionScope::WholePsu, None).await?;
        activities
            .storage_call(exec, "psus_delete", move |storage| async move { storage.psus_delete(psu_id).await })
            .await
            .context("deleting payment service user")?;
        self.ctx
            .emit(exec, DomainEvent::PsuDeleted { psu_id })
            .await
            .context("sending events")?;

        info!(psu_id = %psu_id, connectors = unlinked, "👤 PSU: Deleted");
        Ok(())
    }

    /// Unlink the end user from one connector and delete the data it produced
    pub async fn delete_psu_connector(
        &self,
        exec: &ExecutionContext,
        payload: DeletePsuConnectorPayload,
    ) -> EngineResult<()> {
        let connector_id = Some(&payload.connector_id);
        match self.unlink_connector(exec, &payload).await {
            Ok(()) => {
                self.reporter
                    .report_success(exec, &payload.task_id, connector_id, Some(payload.psu_id.to_string()))
                    .await
            }
            Err(err) => self.reporter.fail(exec, &payload.task_id, connector_id, err).await,
        }
    }

    async fn unlink_connector(&self, exec: &ExecutionContext, payload: &DeletePsuConnectorPayload) -> EngineResult<()> {
        let psu_id = payload.psu_id;
        let connector_id = &payload.connector_id;
        let psu = self.load_psu(exec, psu_id).await?;
        let bridge = self.load_bridge(exec, psu_id, connector_id).await?;

        self.delete_user(exec, &psu, &bridge).await?;
        self.cascade(
            exec,
            psu_id,
            DeletionScope::FromConnectorId(connector_id.clone()),
            Some(connector_id),
        )
        .await?;

        self.ctx
            .activities
            .storage_call(exec, "psu_bank_bridges_delete", move |storage| async move {
                storage.psu_bank_bridges_delete(psu_id, connector_id).await
            })
            .await
            .context("deleting bank bridge")?;

        info!(psu_id = %psu_id, connector_id = %connector_id, "👤 PSU: Connector unlinked");
        Ok(())
    }

    /// Remove one bank connection of the end user
    pub async fn delete_psu_connection(
        &self,
        exec: &ExecutionContext,
        payload: DeletePsuConnectionPayload,
    ) -> EngineResult<()> {
        let connector_id = Some(&payload.connector_id);
        match self.remove_connection(exec, &payload).await {
            Ok(()) => {
                self.reporter
                    .report_success(exec, &payload.task_id, connector_id, Some(payload.connection_id.clone()))
                    .await
            }
            Err(err) => self.reporter.fail(exec, &payload.task_id, connector_id, err).await,
        }
    }

    async fn remove_connection(&self, exec: &ExecutionContext, payload: &DeletePsuConnectionPayload) -> EngineResult<()> {
        let psu_id = payload.psu_id;
        let connector_id = &payload.connector_id;
        let connection_id = payload.connection_id.as_str();
        let activities = &self.ctx.activities;

        let psu = self.load_psu(exec, psu_id).await?;
        let bridge = self.load_bridge(exec, psu_id, connector_id).await?;
        let connection = activities
            .storage_call(exec, "psu_bank_bridge_connections_get", move |storage| async move {
                storage
                    .psu_bank_bridge_connections_get(psu_id, connector_id, connection_id)
                    .await
            })
            .await
            .context("retrieving bank connection")?;

        let request = DeleteUserConnectionRequest {
            psu,
            bank_bridge: bridge,
            connection,
        };
        let request = &request;
        activities
            .plugin_call(
                exec,
                ActivityOptions::infinite(),
                "delete_user_connection",
                connector_id,
                move |plugin| async move { plugin.delete_user_connection(request.clone()).await },
            )
            .await
            .context("deleting user connection")?;

        self.cascade(
            exec,
            psu_id,
            DeletionScope::FromConnectionId(connection_id.to_string()),
            Some(connector_id),
        )
        .await?;

        activities
            .storage_call(exec, "psu_bank_bridge_connections_delete", move |storage| async move {
                storage
                    .psu_bank_bridge_connections_delete(psu_id, connector_id, connection_id)
                    .await
            })
            .await
            .context("deleting bank connection")?;
        self.ctx
            .emit(
                exec,
                DomainEvent::UserConnectionDeleted {
                    psu_id,
                    connector_id: connector_id.clone(),
                    connection_id: connection_id.to_string(),
                },
            )
            .await
            .context("sending events")?;

        info!(
            psu_id = %psu_id,
            connector_id = %connector_id,
            connection_id = %connection_id,
            "👤 PSU: Connection deleted"
        );
        Ok(())
    }

    /// Settle a user-link attempt from the provider's callback
    ///
    /// A response whose error string is empty counts as success.
    pub async fn complete_user_link(&self, exec: &ExecutionContext, payload: CompleteUserLinkPayload) -> EngineResult<()> {
        let connector_id = &payload.connector_id;
        let attempt_id = payload.attempt_id;
        let activities = &self.ctx.activities;

        let mut attempt = activities
            .storage_call(exec, "user_link_attempts_get", move |storage| async move {
                storage.user_link_attempts_get(attempt_id).await
            })
            .await
            .context("retrieving user link attempt")?;

        let request = CompleteUserLinkRequest {
            attempt: attempt.clone(),
            query_values: payload.query_values.clone(),
            headers: payload.headers.clone(),
            body: payload.body.clone(),
        };
        let request = &request;
        let response = activities
            .plugin_call(
                exec,
                ActivityOptions::infinite(),
                "complete_user_link",
                connector_id,
                move |plugin| async move { plugin.complete_user_link(request.clone()).await },
            )
            .await
            .context("completing user link")?;

        let failure = match response.error {
            Some(link_error) if !link_error.error.is_empty() => Some(link_error.error),
            Some(_) => {
                warn!(attempt_id = %attempt_id, "Provider reported an empty user link error, treating as success");
                None
            }
            None => None,
        };

        match failure {
            None => {
                let connections = response.success.map(|s| s.connections).unwrap_or_default();
                for connection in connections {
                    let record = &connection;
                    activities
                        .storage_call(exec, "psu_bank_bridge_connections_store", move |storage| async move {
                            storage.psu_bank_bridge_connections_store(record.clone()).await
                        })
                        .await
                        .context("storing bank connection")?;
                    self.ctx
                        .emit(exec, DomainEvent::UserConnectionSaved(connection))
                        .await
                        .context("sending events")?;
                }
                attempt.status = UserLinkStatus::Completed;
                attempt.error = None;
            }
            Some(error) => {
                attempt.status = UserLinkStatus::Exited;
                attempt.error = Some(error);
            }
        }

        let record = &attempt;
        activities
            .storage_call(exec, "user_link_attempts_store", move |storage| async move {
                storage.user_link_attempts_store(record.clone()).await
            })
            .await
            .context("storing user link attempt")?;

        info!(
            attempt_id = %attempt_id,
            connector_id = %connector_id,
            status = ?attempt.status,
            "👤 PSU: User link settled"
        );
        self.ctx
            .emit(exec, DomainEvent::UserLinkStatusUpdated(attempt))
            .await
            .context("sending events")
    }

    async fn load_psu(&self, exec: &ExecutionContext, psu_id: Uuid) -> EngineResult<PaymentServiceUser> {
        self.ctx
            .activities
            .storage_call(exec, "psus_get", move |storage| async move { storage.psus_get(psu_id).await })
            .await
            .context("retrieving payment service user")
    }

    async fn load_bridge(
        &self,
        exec: &ExecutionContext,
        psu_id: Uuid,
        connector_id: &ConnectorId,
    ) -> EngineResult<BankBridge> {
        self.ctx
            .activities
            .storage_call(exec, "psu_bank_bridges_get", move |storage| async move {
                storage.psu_bank_bridges_get(psu_id, connector_id).await
            })
            .await
            .context("retrieving bank bridge")
    }

    async fn delete_user(&self, exec: &ExecutionContext, psu: &PaymentServiceUser, bridge: &BankBridge) -> EngineResult<()> {
        let request = DeleteUserRequest {
            psu: psu.clone(),
            bank_bridge: bridge.clone(),
        };
        let request = &request;
        self.ctx
            .activities
            .plugin_call(
                exec,
                ActivityOptions::infinite(),
                "delete_user",
                &bridge.connector_id,
                move |plugin| async move { plugin.delete_user(request.clone()).await },
            )
            .await
            .context("deleting user")
    }

    /// Run a deletion cascade as an awaited child
    async fn cascade(
        &self,
        exec: &ExecutionContext,
        psu_id: Uuid,
        scope: DeletionScope,
        connector_id: Option<&ConnectorId>,
    ) -> EngineResult<()> {
        let options = self
            .ctx
            .search_attributes(connector_id)
            .into_iter()
            .fold(ChildOptions::awaited(), |options, (key, value)| {
                options.with_search_attribute(key, value)
            });
        let request = WorkflowRequest::DeleteConnectionData(DeleteConnectionData { psu_id, scope });
        self.ctx
            .start_child(exec, request, options)
            .await
            .context("deleting connection data")
    }
}
