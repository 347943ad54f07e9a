//! # Connector Lifecycle
//!
//! Installing a connector registers its plugin, asks the plugin for its task
//! tree and walks the tree's root nodes. Uninstalling marks the connector as
//! being torn down, stops every schedule and running execution tagged with it,
//! lets the plugin release provider-side resources and then removes the
//! connector's data.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::retry_policy::ActivityOptions;
use super::task_reporter::TaskReporter;
use super::task_tree::TaskTreeInterpreter;
use super::EngineContext;
use crate::error::{EngineResult, ResultExt};
use crate::events::DomainEvent;
use crate::models::{Connector, ConnectorId, TaskId};
use crate::plugin::{InstallRequest, UninstallRequest};
use crate::storage::PageRequest;
use crate::substrate::ExecutionContext;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallConnectorPayload {
    pub connector: Connector,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UninstallConnectorPayload {
    pub task_id: TaskId,
    pub connector_id: ConnectorId,
}

#[derive(Clone)]
pub struct ConnectorLifecycle {
    ctx: Arc<EngineContext>,
    interpreter: TaskTreeInterpreter,
    reporter: TaskReporter,
}

impl ConnectorLifecycle {
    pub fn new(ctx: Arc<EngineContext>, interpreter: TaskTreeInterpreter, reporter: TaskReporter) -> Self {
        Self {
            ctx,
            interpreter,
            reporter,
        }
    }

    pub async fn install_connector(&self, exec: &ExecutionContext, payload: InstallConnectorPayload) -> EngineResult<()> {
        let connector = payload.connector;
        let connector_id = &connector.id;
        let activities = &self.ctx.activities;

        let record = &connector;
        activities
            .storage_call(exec, "connectors_store", move |storage| async move {
                storage.connectors_store(record.clone()).await
            })
            .await
            .context("storing connector")?;
        self.ctx.registry.load(&connector).context("loading connector")?;

        let request = InstallRequest {
            connector_id: connector_id.clone(),
            config: connector.config.clone(),
        };
        let request = &request;
        let response = activities
            .plugin_call(
                exec,
                ActivityOptions::infinite_long(),
                "install",
                connector_id,
                move |plugin| async move { plugin.install(request.clone()).await },
            )
            .await
            .context("installing connector")?;

        let tree = &response.workflow;
        activities
            .storage_call(exec, "connector_tasks_tree_store", move |storage| async move {
                storage.connector_tasks_tree_store(connector_id, tree.clone()).await
            })
            .await
            .context("storing connector task tree")?;

        self.interpreter
            .run_next_tasks(exec, connector_id, None, &response.workflow)
            .await
            .context("running connector task tree")?;

        info!(
            connector_id = %connector_id,
            root_tasks = response.workflow.len(),
            "🔌 CONNECTOR: Installed"
        );
        Ok(())
    }

    pub async fn uninstall_connector(
        &self,
        exec: &ExecutionContext,
        payload: UninstallConnectorPayload,
    ) -> EngineResult<()> {
        match self.uninstall(exec, &payload.connector_id).await {
            Ok(()) => {
                self.reporter
                    .report_success(exec, &payload.task_id, None, Some(payload.connector_id.to_string()))
                    .await
            }
            Err(err) => self.reporter.fail(exec, &payload.task_id, None, err).await,
        }
    }

    async fn uninstall(&self, exec: &ExecutionContext, connector_id: &ConnectorId) -> EngineResult<()> {
        let activities = &self.ctx.activities;

        // Fetch runs that see this flag stop spawning next tasks.
        self.ctx.registry.set_scheduled_for_deletion(connector_id, true);

        let webhook_configs = match activities
            .storage_call(exec, "webhooks_configs_get", move |storage| async move {
                storage.webhooks_configs_get(connector_id).await
            })
            .await
        {
            Ok(configs) => configs,
            Err(err) if err.is_not_found() => Vec::new(),
            Err(err) => return Err(err.with_context("retrieving webhook configs")),
        };

        let deleted_schedules = self.delete_schedules(exec, connector_id).await?;

        let substrate = &self.ctx.substrate;
        let terminated = activities
            .run(exec, ActivityOptions::infinite(), "terminate_workflows", move || async move {
                substrate.terminate_workflows(connector_id).await.map_err(Into::into)
            })
            .await
            .context("terminating workflows")?;

        let request = UninstallRequest {
            connector_id: connector_id.clone(),
            webhook_configs,
        };
        let request = &request;
        activities
            .plugin_call(
                exec,
                ActivityOptions::infinite_long(),
                "uninstall",
                connector_id,
                move |plugin| async move { plugin.uninstall(request.clone()).await },
            )
            .await
            .context("uninstalling connector")?;

        activities
            .storage_call(exec, "schedules_delete_from_connector", move |storage| async move {
                storage.schedules_delete_from_connector(connector_id).await
            })
            .await
            .context("deleting schedules")?;
        activities
            .storage_call(exec, "instances_delete_from_connector", move |storage| async move {
                storage.instances_delete_from_connector(connector_id).await
            })
            .await
            .context("deleting instances")?;
        activities
            .storage_call(exec, "states_delete_from_connector", move |storage| async move {
                storage.states_delete_from_connector(connector_id).await
            })
            .await
            .context("deleting states")?;
        activities
            .storage_call(exec, "webhooks_configs_delete_from_connector", move |storage| async move {
                storage.webhooks_configs_delete_from_connector(connector_id).await
            })
            .await
            .context("deleting webhook configs")?;
        activities
            .storage_call(exec, "webhooks_delete_from_connector", move |storage| async move {
                storage.webhooks_delete_from_connector(connector_id).await
            })
            .await
            .context("deleting webhooks")?;
        activities
            .storage_call(exec, "connectors_delete", move |storage| async move {
                storage.connectors_delete(connector_id).await
            })
            .await
            .context("deleting connector")?;

        self.ctx.registry.unload(connector_id);
        self.ctx
            .emit(
                exec,
                DomainEvent::ConnectorUninstalled {
                    connector_id: connector_id.clone(),
                    at: self.ctx.substrate.now(),
                },
            )
            .await
            .context("sending events")?;

        info!(
            connector_id = %connector_id,
            schedules = deleted_schedules,
            terminated = terminated,
            "🔌 CONNECTOR: Uninstalled"
        );
        Ok(())
    }

    /// Remove every schedule of the connector from the substrate and storage
    async fn delete_schedules(&self, exec: &ExecutionContext, connector_id: &ConnectorId) -> EngineResult<usize> {
        let activities = &self.ctx.activities;
        let mut deleted = 0;

        // Listing restarts from the first page since each page is deleted as it is read.
        let first = PageRequest::first(self.ctx.config.engine.list_page_size);
        loop {
            let page_request = &first;
            let page = activities
                .storage_call(exec, "schedules_list", move |storage| async move {
                    storage.schedules_list(connector_id, page_request.clone()).await
                })
                .await
                .context("listing schedules")?;

            for schedule in &page.data {
                self.ctx
                    .delete_schedule(exec, &schedule.id, connector_id)
                    .await
                    .context("deleting schedule")?;
                let schedule_id = schedule.id.as_str();
                activities
                    .storage_call(exec, "schedules_delete", move |storage| async move {
                        storage.schedules_delete(schedule_id).await
                    })
                    .await
                    .context("deleting schedule")?;
                deleted += 1;
            }

            if page.data.is_empty() || !page.has_more {
                return Ok(deleted);
            }
        }
    }
}
