//! # Storage Contract
//!
//! CRUD and bulk-delete operations the engine performs against the persistence
//! layer. Implementations must provide upsert semantics on every `*_store`
//! call and idempotent deletes, since the activity executor will repeat calls
//! after transient failures.
//!
//! Deleting a connector or an end user removes the records that belong to it.

pub mod errors;
pub mod memory;

pub use errors::{StorageError, StorageResult};
pub use memory::InMemoryStorage;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    Account, AccountId, Balance, BankAccount, BankAccountRelatedAccount, BankBridge, BankBridgeConnection,
    Connector, ConnectorId, ConnectorTaskTree, Conversion, Instance, Order, OrderId, Payment, PaymentId,
    PaymentInitiation, PaymentInitiationAdjustment, PaymentInitiationId, PaymentServiceUser, Schedule, State,
    StateId, Task, TaskId, UserLinkAttempt, Webhook, WebhookConfig,
};

/// Cursor-based page request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page_size: usize,
    pub cursor: Option<String>,
}

impl PageRequest {
    pub fn first(page_size: usize) -> Self {
        Self {
            page_size,
            cursor: None,
        }
    }

    /// Request for the page following `page`, if there is one
    pub fn next<T>(&self, page: &ListPage<T>) -> Option<Self> {
        if !page.has_more {
            return None;
        }
        page.next.as_ref().map(|cursor| Self {
            page_size: self.page_size,
            cursor: Some(cursor.clone()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListPage<T> {
    pub data: Vec<T>,
    pub has_more: bool,
    pub next: Option<String>,
}

#[async_trait]
pub trait Storage: Send + Sync {
    // Connectors
    async fn connectors_get(&self, id: &ConnectorId) -> StorageResult<Connector>;
    async fn connectors_store(&self, connector: Connector) -> StorageResult<()>;
    async fn connectors_delete(&self, id: &ConnectorId) -> StorageResult<()>;
    async fn connector_tasks_tree_store(
        &self,
        id: &ConnectorId,
        tree: Vec<ConnectorTaskTree>,
    ) -> StorageResult<()>;
    async fn connector_tasks_tree_get(&self, id: &ConnectorId) -> StorageResult<Vec<ConnectorTaskTree>>;

    // Pagination checkpoints
    async fn states_get(&self, id: &StateId) -> StorageResult<State>;
    async fn states_store(&self, state: State) -> StorageResult<()>;
    async fn states_delete_from_connector(&self, id: &ConnectorId) -> StorageResult<()>;

    // Schedules and instances
    async fn schedules_store(&self, schedule: Schedule) -> StorageResult<()>;
    async fn schedules_get(&self, id: &str) -> StorageResult<Schedule>;
    async fn schedules_delete(&self, id: &str) -> StorageResult<()>;
    async fn schedules_list(&self, connector_id: &ConnectorId, page: PageRequest) -> StorageResult<ListPage<Schedule>>;
    async fn schedules_delete_from_connector(&self, id: &ConnectorId) -> StorageResult<()>;
    async fn instances_store(&self, instance: Instance) -> StorageResult<()>;
    async fn instances_update(&self, instance: Instance) -> StorageResult<()>;
    async fn instances_get(&self, id: &str, schedule_id: &str) -> StorageResult<Instance>;
    async fn instances_delete_from_connector(&self, id: &ConnectorId) -> StorageResult<()>;

    // Tasks
    async fn tasks_store(&self, task: Task) -> StorageResult<()>;
    async fn tasks_get(&self, id: &TaskId) -> StorageResult<Task>;

    // Accounts and balances
    async fn accounts_store(&self, accounts: Vec<Account>) -> StorageResult<()>;
    async fn accounts_get(&self, id: &AccountId) -> StorageResult<Account>;
    async fn accounts_delete(&self, id: &AccountId) -> StorageResult<()>;
    async fn accounts_delete_from_connection_id(&self, psu_id: Uuid, connection_id: &str) -> StorageResult<()>;
    async fn accounts_delete_from_connector_id_and_psu(
        &self,
        psu_id: Uuid,
        connector_id: &ConnectorId,
    ) -> StorageResult<()>;
    async fn accounts_delete_from_psu(&self, psu_id: Uuid) -> StorageResult<()>;
    async fn balances_store(&self, balances: Vec<Balance>) -> StorageResult<()>;

    // Bank accounts
    async fn bank_accounts_store(&self, bank_account: BankAccount) -> StorageResult<()>;
    async fn bank_accounts_get(&self, id: Uuid) -> StorageResult<BankAccount>;
    async fn bank_accounts_add_related_account(
        &self,
        id: Uuid,
        related: BankAccountRelatedAccount,
    ) -> StorageResult<()>;

    // Payments
    async fn payments_store(&self, payments: Vec<Payment>) -> StorageResult<()>;
    async fn payments_get(&self, id: &PaymentId) -> StorageResult<Payment>;
    async fn payments_delete_from_reference(&self, connector_id: &ConnectorId, reference: &str) -> StorageResult<()>;
    async fn payments_delete_from_account_id(&self, account_id: &AccountId) -> StorageResult<()>;
    async fn payments_delete_from_connection_id(&self, psu_id: Uuid, connection_id: &str) -> StorageResult<()>;
    async fn payments_delete_from_connector_id_and_psu(
        &self,
        psu_id: Uuid,
        connector_id: &ConnectorId,
    ) -> StorageResult<()>;
    async fn payments_delete_from_psu(&self, psu_id: Uuid) -> StorageResult<()>;

    // Payment initiations
    async fn payment_initiations_store(&self, payment_initiation: PaymentInitiation) -> StorageResult<()>;
    async fn payment_initiations_get(&self, id: &PaymentInitiationId) -> StorageResult<PaymentInitiation>;
    async fn payment_initiations_related_payments_store(
        &self,
        id: &PaymentInitiationId,
        payment_id: &PaymentId,
        created_at: DateTime<Utc>,
    ) -> StorageResult<()>;
    async fn payment_initiation_ids_list_from_payment_id(
        &self,
        payment_id: &PaymentId,
    ) -> StorageResult<Vec<PaymentInitiationId>>;
    async fn payment_initiations_adjustments_store(
        &self,
        adjustment: PaymentInitiationAdjustment,
    ) -> StorageResult<()>;
    async fn payment_initiations_adjustments_list(
        &self,
        id: &PaymentInitiationId,
    ) -> StorageResult<Vec<PaymentInitiationAdjustment>>;

    // Orders and conversions
    async fn orders_get(&self, id: &OrderId) -> StorageResult<Order>;
    async fn orders_upsert(&self, orders: Vec<Order>) -> StorageResult<()>;
    async fn conversions_store(&self, conversions: Vec<Conversion>) -> StorageResult<()>;

    // Webhooks
    async fn webhooks_store(&self, webhook: Webhook) -> StorageResult<()>;
    async fn webhooks_configs_store(&self, configs: Vec<WebhookConfig>) -> StorageResult<()>;
    async fn webhooks_configs_get(&self, connector_id: &ConnectorId) -> StorageResult<Vec<WebhookConfig>>;
    async fn webhooks_configs_delete_from_connector(&self, id: &ConnectorId) -> StorageResult<()>;
    async fn webhooks_delete_from_connector(&self, id: &ConnectorId) -> StorageResult<()>;

    // End users
    async fn psus_store(&self, psu: PaymentServiceUser) -> StorageResult<()>;
    async fn psus_get(&self, id: Uuid) -> StorageResult<PaymentServiceUser>;
    async fn psus_delete(&self, id: Uuid) -> StorageResult<()>;
    async fn psu_bank_bridges_store(&self, bridge: BankBridge) -> StorageResult<()>;
    async fn psu_bank_bridges_get(&self, psu_id: Uuid, connector_id: &ConnectorId) -> StorageResult<BankBridge>;
    async fn psu_bank_bridges_list(&self, psu_id: Uuid, page: PageRequest) -> StorageResult<ListPage<BankBridge>>;
    async fn psu_bank_bridges_delete(&self, psu_id: Uuid, connector_id: &ConnectorId) -> StorageResult<()>;
    async fn psu_bank_bridge_connections_store(&self, connection: BankBridgeConnection) -> StorageResult<()>;
    async fn psu_bank_bridge_connections_get(
        &self,
        psu_id: Uuid,
        connector_id: &ConnectorId,
        connection_id: &str,
    ) -> StorageResult<BankBridgeConnection>;
    async fn psu_bank_bridge_connections_delete(
        &self,
        psu_id: Uuid,
        connector_id: &ConnectorId,
        connection_id: &str,
    ) -> StorageResult<()>;
    async fn user_link_attempts_store(&self, attempt: UserLinkAttempt) -> StorageResult<()>;
    async fn user_link_attempts_get(&self, id: Uuid) -> StorageResult<UserLinkAttempt>;
}
