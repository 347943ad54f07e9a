//! In-memory [`Storage`] implementation.
//!
//! Backs local runs and tests. Every call is appended to an operation journal,
//! and failures can be queued per operation to exercise retry and abort paths.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, VecDeque};
use uuid::Uuid;

use super::{ListPage, PageRequest, Storage, StorageError, StorageResult};
use crate::models::{
    Account, AccountId, Balance, BankAccount, BankAccountRelatedAccount, BankBridge, BankBridgeConnection,
    Connector, ConnectorId, ConnectorTaskTree, Conversion, ConversionId, Instance, Order, OrderId, Payment,
    PaymentId, PaymentInitiation, PaymentInitiationAdjustment, PaymentInitiationId, PaymentServiceUser, Schedule,
    State, StateId, Task, TaskId, UserLinkAttempt, Webhook, WebhookConfig,
};

#[derive(Default)]
struct Tables {
    connectors: HashMap<ConnectorId, Connector>,
    task_trees: HashMap<ConnectorId, Vec<ConnectorTaskTree>>,
    states: HashMap<StateId, State>,
    schedules: BTreeMap<String, Schedule>,
    instances: HashMap<(String, String), Instance>,
    tasks: HashMap<TaskId, Task>,
    accounts: HashMap<AccountId, Account>,
    balances: HashMap<(AccountId, String), Balance>,
    bank_accounts: HashMap<Uuid, BankAccount>,
    payments: HashMap<PaymentId, Payment>,
    payment_initiations: HashMap<PaymentInitiationId, PaymentInitiation>,
    related_payments: Vec<(PaymentInitiationId, PaymentId, DateTime<Utc>)>,
    adjustments: Vec<PaymentInitiationAdjustment>,
    orders: HashMap<OrderId, Order>,
    conversions: HashMap<ConversionId, Conversion>,
    webhooks: HashMap<String, Webhook>,
    webhook_configs: HashMap<(ConnectorId, String), WebhookConfig>,
    psus: HashMap<Uuid, PaymentServiceUser>,
    bank_bridges: BTreeMap<(Uuid, ConnectorId), BankBridge>,
    connections: HashMap<(Uuid, ConnectorId, String), BankBridgeConnection>,
    link_attempts: HashMap<Uuid, UserLinkAttempt>,
}

impl Tables {
    fn remove_accounts_where(&mut self, predicate: impl Fn(&Account) -> bool) {
        let removed: Vec<AccountId> = self
            .accounts
            .values()
            .filter(|account| predicate(account))
            .map(|account| account.id.clone())
            .collect();
        for id in &removed {
            self.accounts.remove(id);
        }
        self.balances.retain(|(account_id, _), _| !removed.contains(account_id));
    }
}

#[derive(Default)]
pub struct InMemoryStorage {
    tables: Mutex<Tables>,
    journal: Mutex<Vec<&'static str>>,
    failures: Mutex<HashMap<&'static str, VecDeque<StorageError>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call to `operation` fail with `error`
    ///
    /// Queued errors are consumed in order, one per call.
    pub fn fail_next(&self, operation: &'static str, error: StorageError) {
        self.failures.lock().entry(operation).or_default().push_back(error);
    }

    /// Names of every operation called so far, in call order
    pub fn journal(&self) -> Vec<&'static str> {
        self.journal.lock().clone()
    }

    pub fn calls(&self, operation: &str) -> usize {
        self.journal.lock().iter().filter(|op| **op == operation).count()
    }

    pub fn clear_journal(&self) {
        self.journal.lock().clear();
    }

    fn begin(&self, operation: &'static str) -> StorageResult<()> {
        self.journal.lock().push(operation);
        match self
            .failures
            .lock()
            .get_mut(operation)
            .and_then(VecDeque::pop_front)
        {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn paginate<T: Clone>(items: Vec<T>, page: &PageRequest) -> StorageResult<ListPage<T>> {
        let offset = match &page.cursor {
            Some(cursor) => cursor
                .parse::<usize>()
                .map_err(|_| StorageError::constraint(format!("invalid cursor: {cursor}")))?,
            None => 0,
        };
        let page_size = page.page_size.max(1);
        let data: Vec<T> = items.iter().skip(offset).take(page_size).cloned().collect();
        let consumed = offset + data.len();
        let has_more = consumed < items.len();

        Ok(ListPage {
            data,
            has_more,
            next: has_more.then(|| consumed.to_string()),
        })
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn connectors_get(&self, id: &ConnectorId) -> StorageResult<Connector> {
        self.begin("connectors_get")?;
        self.tables
            .lock()
            .connectors
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("connector", id))
    }

    async fn connectors_store(&self, connector: Connector) -> StorageResult<()> {
        self.begin("connectors_store")?;
        self.tables.lock().connectors.insert(connector.id.clone(), connector);
        Ok(())
    }

    async fn connectors_delete(&self, id: &ConnectorId) -> StorageResult<()> {
        self.begin("connectors_delete")?;
        let mut tables = self.tables.lock();
        tables.connectors.remove(id);
        tables.task_trees.remove(id);
        tables.states.retain(|state_id, _| &state_id.connector_id != id);
        tables.schedules.retain(|_, schedule| &schedule.connector_id != id);
        tables.instances.retain(|_, instance| &instance.connector_id != id);
        tables.remove_accounts_where(|account| &account.connector_id == id);
        tables.payments.retain(|_, payment| &payment.connector_id != id);
        tables.payment_initiations.retain(|_, pi| &pi.connector_id != id);
        tables.orders.retain(|_, order| &order.connector_id != id);
        tables.conversions.retain(|_, conversion| &conversion.connector_id != id);
        tables.webhooks.retain(|_, webhook| &webhook.connector_id != id);
        tables.webhook_configs.retain(|(connector_id, _), _| connector_id != id);
        tables.bank_bridges.retain(|(_, connector_id), _| connector_id != id);
        tables.connections.retain(|(_, connector_id, _), _| connector_id != id);
        Ok(())
    }

    async fn connector_tasks_tree_store(&self, id: &ConnectorId, tree: Vec<ConnectorTaskTree>) -> StorageResult<()> {
        self.begin("connector_tasks_tree_store")?;
        self.tables.lock().task_trees.insert(id.clone(), tree);
        Ok(())
    }

    async fn connector_tasks_tree_get(&self, id: &ConnectorId) -> StorageResult<Vec<ConnectorTaskTree>> {
        self.begin("connector_tasks_tree_get")?;
        self.tables
            .lock()
            .task_trees
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("connector tasks tree", id))
    }

    async fn states_get(&self, id: &StateId) -> StorageResult<State> {
        self.begin("states_get")?;
        self.tables
            .lock()
            .states
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("state", id))
    }

    async fn states_store(&self, state: State) -> StorageResult<()> {
        self.begin("states_store")?;
        self.tables.lock().states.insert(state.id.clone(), state);
        Ok(())
    }

    async fn states_delete_from_connector(&self, id: &ConnectorId) -> StorageResult<()> {
        self.begin("states_delete_from_connector")?;
        self.tables.lock().states.retain(|state_id, _| &state_id.connector_id != id);
        Ok(())
    }

    async fn schedules_store(&self, schedule: Schedule) -> StorageResult<()> {
        self.begin("schedules_store")?;
        self.tables.lock().schedules.insert(schedule.id.clone(), schedule);
        Ok(())
    }

    async fn schedules_get(&self, id: &str) -> StorageResult<Schedule> {
        self.begin("schedules_get")?;
        self.tables
            .lock()
            .schedules
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("schedule", id))
    }

    async fn schedules_delete(&self, id: &str) -> StorageResult<()> {
        self.begin("schedules_delete")?;
        self.tables.lock().schedules.remove(id);
        Ok(())
    }

    async fn schedules_list(&self, connector_id: &ConnectorId, page: PageRequest) -> StorageResult<ListPage<Schedule>> {
        self.begin("schedules_list")?;
        let schedules: Vec<Schedule> = self
            .tables
            .lock()
            .schedules
            .values()
            .filter(|schedule| &schedule.connector_id == connector_id)
            .cloned()
            .collect();
        Self::paginate(schedules, &page)
    }

    async fn schedules_delete_from_connector(&self, id: &ConnectorId) -> StorageResult<()> {
        self.begin("schedules_delete_from_connector")?;
        self.tables.lock().schedules.retain(|_, schedule| &schedule.connector_id != id);
        Ok(())
    }

    async fn instances_store(&self, instance: Instance) -> StorageResult<()> {
        self.begin("instances_store")?;
        self.tables
            .lock()
            .instances
            .insert((instance.id.clone(), instance.schedule_id.clone()), instance);
        Ok(())
    }

    async fn instances_update(&self, instance: Instance) -> StorageResult<()> {
        self.begin("instances_update")?;
        let mut tables = self.tables.lock();
        let key = (instance.id.clone(), instance.schedule_id.clone());
        match tables.instances.get_mut(&key) {
            Some(existing) => {
                *existing = instance;
                Ok(())
            }
            None => Err(StorageError::not_found("instance", &instance.id)),
        }
    }

    async fn instances_get(&self, id: &str, schedule_id: &str) -> StorageResult<Instance> {
        self.begin("instances_get")?;
        self.tables
            .lock()
            .instances
            .get(&(id.to_string(), schedule_id.to_string()))
            .cloned()
            .ok_or_else(|| StorageError::not_found("instance", id))
    }

    async fn instances_delete_from_connector(&self, id: &ConnectorId) -> StorageResult<()> {
        self.begin("instances_delete_from_connector")?;
        self.tables.lock().instances.retain(|_, instance| &instance.connector_id != id);
        Ok(())
    }

    async fn tasks_store(&self, task: Task) -> StorageResult<()> {
        self.begin("tasks_store")?;
        self.tables.lock().tasks.insert(task.id.clone(), task);
        Ok(())
    }

    async fn tasks_get(&self, id: &TaskId) -> StorageResult<Task> {
        self.begin("tasks_get")?;
        self.tables
            .lock()
            .tasks
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("task", id))
    }

    async fn accounts_store(&self, accounts: Vec<Account>) -> StorageResult<()> {
        self.begin("accounts_store")?;
        let mut tables = self.tables.lock();
        for account in accounts {
            tables.accounts.insert(account.id.clone(), account);
        }
        Ok(())
    }

    async fn accounts_get(&self, id: &AccountId) -> StorageResult<Account> {
        self.begin("accounts_get")?;
        self.tables
            .lock()
            .accounts
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("account", id))
    }

    async fn accounts_delete(&self, id: &AccountId) -> StorageResult<()> {
        self.begin("accounts_delete")?;
        self.tables.lock().remove_accounts_where(|account| &account.id == id);
        Ok(())
    }

    async fn accounts_delete_from_connection_id(&self, psu_id: Uuid, connection_id: &str) -> StorageResult<()> {
        self.begin("accounts_delete_from_connection_id")?;
        self.tables.lock().remove_accounts_where(|account| {
            account.psu_id() == Some(psu_id) && account.connection_id() == Some(connection_id)
        });
        Ok(())
    }

    async fn accounts_delete_from_connector_id_and_psu(
        &self,
        psu_id: Uuid,
        connector_id: &ConnectorId,
    ) -> StorageResult<()> {
        self.begin("accounts_delete_from_connector_id_and_psu")?;
        self.tables.lock().remove_accounts_where(|account| {
            account.psu_id() == Some(psu_id) && &account.connector_id == connector_id
        });
        Ok(())
    }

    async fn accounts_delete_from_psu(&self, psu_id: Uuid) -> StorageResult<()> {
        self.begin("accounts_delete_from_psu")?;
        self.tables
            .lock()
            .remove_accounts_where(|account| account.psu_id() == Some(psu_id));
        Ok(())
    }

    async fn balances_store(&self, balances: Vec<Balance>) -> StorageResult<()> {
        self.begin("balances_store")?;
        let mut tables = self.tables.lock();
        for balance in balances {
            let key = (balance.account_id.clone(), balance.asset.clone());
            match tables.balances.get_mut(&key) {
                Some(existing) if existing.last_updated_at > balance.last_updated_at => {}
                Some(existing) => {
                    existing.balance = balance.balance;
                    existing.last_updated_at = balance.last_updated_at;
                }
                None => {
                    tables.balances.insert(key, balance);
                }
            }
        }
        Ok(())
    }

    async fn bank_accounts_store(&self, bank_account: BankAccount) -> StorageResult<()> {
        self.begin("bank_accounts_store")?;
        self.tables.lock().bank_accounts.insert(bank_account.id, bank_account);
        Ok(())
    }

    async fn bank_accounts_get(&self, id: Uuid) -> StorageResult<BankAccount> {
        self.begin("bank_accounts_get")?;
        self.tables
            .lock()
            .bank_accounts
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("bank account", id))
    }

    async fn bank_accounts_add_related_account(&self, id: Uuid, related: BankAccountRelatedAccount) -> StorageResult<()> {
        self.begin("bank_accounts_add_related_account")?;
        let mut tables = self.tables.lock();
        let bank_account = tables
            .bank_accounts
            .get_mut(&id)
            .ok_or_else(|| StorageError::not_found("bank account", id))?;
        if !bank_account
            .related_accounts
            .iter()
            .any(|existing| existing.account_id == related.account_id)
        {
            bank_account.related_accounts.push(related);
        }
        Ok(())
    }

    async fn payments_store(&self, payments: Vec<Payment>) -> StorageResult<()> {
        self.begin("payments_store")?;
        let mut tables = self.tables.lock();
        for payment in payments {
            tables.payments.insert(payment.id.clone(), payment);
        }
        Ok(())
    }

    async fn payments_get(&self, id: &PaymentId) -> StorageResult<Payment> {
        self.begin("payments_get")?;
        self.tables
            .lock()
            .payments
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("payment", id))
    }

    async fn payments_delete_from_reference(&self, connector_id: &ConnectorId, reference: &str) -> StorageResult<()> {
        self.begin("payments_delete_from_reference")?;
        self.tables
            .lock()
            .payments
            .retain(|_, payment| !(&payment.connector_id == connector_id && payment.reference == reference));
        Ok(())
    }

    async fn payments_delete_from_account_id(&self, account_id: &AccountId) -> StorageResult<()> {
        self.begin("payments_delete_from_account_id")?;
        self.tables
            .lock()
            .payments
            .retain(|_, payment| !payment.involves_account(account_id));
        Ok(())
    }

    async fn payments_delete_from_connection_id(&self, psu_id: Uuid, connection_id: &str) -> StorageResult<()> {
        self.begin("payments_delete_from_connection_id")?;
        self.tables.lock().payments.retain(|_, payment| {
            !(payment.psu_id() == Some(psu_id) && payment.connection_id() == Some(connection_id))
        });
        Ok(())
    }

    async fn payments_delete_from_connector_id_and_psu(
        &self,
        psu_id: Uuid,
        connector_id: &ConnectorId,
    ) -> StorageResult<()> {
        self.begin("payments_delete_from_connector_id_and_psu")?;
        self.tables.lock().payments.retain(|_, payment| {
            !(payment.psu_id() == Some(psu_id) && &payment.connector_id == connector_id)
        });
        Ok(())
    }

    async fn payments_delete_from_psu(&self, psu_id: Uuid) -> StorageResult<()> {
        self.begin("payments_delete_from_psu")?;
        self.tables
            .lock()
            .payments
            .retain(|_, payment| payment.psu_id() != Some(psu_id));
        Ok(())
    }

    async fn payment_initiations_store(&self, payment_initiation: PaymentInitiation) -> StorageResult<()> {
        self.begin("payment_initiations_store")?;
        self.tables
            .lock()
            .payment_initiations
            .insert(payment_initiation.id.clone(), payment_initiation);
        Ok(())
    }

    async fn payment_initiations_get(&self, id: &PaymentInitiationId) -> StorageResult<PaymentInitiation> {
        self.begin("payment_initiations_get")?;
        self.tables
            .lock()
            .payment_initiations
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("payment initiation", id))
    }

    async fn payment_initiations_related_payments_store(
        &self,
        id: &PaymentInitiationId,
        payment_id: &PaymentId,
        created_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        self.begin("payment_initiations_related_payments_store")?;
        let mut tables = self.tables.lock();
        let exists = tables
            .related_payments
            .iter()
            .any(|(pi, payment, _)| pi == id && payment == payment_id);
        if !exists {
            tables
                .related_payments
                .push((id.clone(), payment_id.clone(), created_at));
        }
        Ok(())
    }

    async fn payment_initiation_ids_list_from_payment_id(
        &self,
        payment_id: &PaymentId,
    ) -> StorageResult<Vec<PaymentInitiationId>> {
        self.begin("payment_initiation_ids_list_from_payment_id")?;
        Ok(self
            .tables
            .lock()
            .related_payments
            .iter()
            .filter(|(_, payment, _)| payment == payment_id)
            .map(|(pi, _, _)| pi.clone())
            .collect())
    }

    async fn payment_initiations_adjustments_store(&self, adjustment: PaymentInitiationAdjustment) -> StorageResult<()> {
        self.begin("payment_initiations_adjustments_store")?;
        let mut tables = self.tables.lock();
        let duplicate = tables.adjustments.iter().any(|existing| {
            existing.payment_initiation_id == adjustment.payment_initiation_id
                && existing.created_at == adjustment.created_at
                && existing.status == adjustment.status
        });
        if !duplicate {
            tables.adjustments.push(adjustment);
        }
        Ok(())
    }

    async fn payment_initiations_adjustments_list(
        &self,
        id: &PaymentInitiationId,
    ) -> StorageResult<Vec<PaymentInitiationAdjustment>> {
        self.begin("payment_initiations_adjustments_list")?;
        Ok(self
            .tables
            .lock()
            .adjustments
            .iter()
            .filter(|adjustment| &adjustment.payment_initiation_id == id)
            .cloned()
            .collect())
    }

    async fn orders_get(&self, id: &OrderId) -> StorageResult<Order> {
        self.begin("orders_get")?;
        self.tables
            .lock()
            .orders
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("order", id))
    }

    async fn orders_upsert(&self, orders: Vec<Order>) -> StorageResult<()> {
        self.begin("orders_upsert")?;
        let mut tables = self.tables.lock();
        for order in orders {
            tables.orders.insert(order.id.clone(), order);
        }
        Ok(())
    }

    async fn conversions_store(&self, conversions: Vec<Conversion>) -> StorageResult<()> {
        self.begin("conversions_store")?;
        let mut tables = self.tables.lock();
        for conversion in conversions {
            tables.conversions.insert(conversion.id.clone(), conversion);
        }
        Ok(())
    }

    async fn webhooks_store(&self, webhook: Webhook) -> StorageResult<()> {
        self.begin("webhooks_store")?;
        self.tables.lock().webhooks.insert(webhook.id.clone(), webhook);
        Ok(())
    }

    async fn webhooks_configs_store(&self, configs: Vec<WebhookConfig>) -> StorageResult<()> {
        self.begin("webhooks_configs_store")?;
        let mut tables = self.tables.lock();
        for config in configs {
            tables
                .webhook_configs
                .insert((config.connector_id.clone(), config.name.clone()), config);
        }
        Ok(())
    }

    async fn webhooks_configs_get(&self, connector_id: &ConnectorId) -> StorageResult<Vec<WebhookConfig>> {
        self.begin("webhooks_configs_get")?;
        let configs: Vec<WebhookConfig> = self
            .tables
            .lock()
            .webhook_configs
            .values()
            .filter(|config| &config.connector_id == connector_id)
            .cloned()
            .collect();
        if configs.is_empty() {
            return Err(StorageError::not_found("webhook configs", connector_id));
        }
        Ok(configs)
    }

    async fn webhooks_configs_delete_from_connector(&self, id: &ConnectorId) -> StorageResult<()> {
        self.begin("webhooks_configs_delete_from_connector")?;
        self.tables
            .lock()
            .webhook_configs
            .retain(|(connector_id, _), _| connector_id != id);
        Ok(())
    }

    async fn webhooks_delete_from_connector(&self, id: &ConnectorId) -> StorageResult<()> {
        self.begin("webhooks_delete_from_connector")?;
        self.tables.lock().webhooks.retain(|_, webhook| &webhook.connector_id != id);
        Ok(())
    }

    async fn psus_store(&self, psu: PaymentServiceUser) -> StorageResult<()> {
        self.begin("psus_store")?;
        self.tables.lock().psus.insert(psu.id, psu);
        Ok(())
    }

    async fn psus_get(&self, id: Uuid) -> StorageResult<PaymentServiceUser> {
        self.begin("psus_get")?;
        self.tables
            .lock()
            .psus
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("payment service user", id))
    }

    async fn psus_delete(&self, id: Uuid) -> StorageResult<()> {
        self.begin("psus_delete")?;
        let mut tables = self.tables.lock();
        tables.psus.remove(&id);
        tables.bank_bridges.retain(|(psu_id, _), _| *psu_id != id);
        tables.connections.retain(|(psu_id, _, _), _| *psu_id != id);
        tables.link_attempts.retain(|_, attempt| attempt.psu_id != id);
        Ok(())
    }

    async fn psu_bank_bridges_store(&self, bridge: BankBridge) -> StorageResult<()> {
        self.begin("psu_bank_bridges_store")?;
        self.tables
            .lock()
            .bank_bridges
            .insert((bridge.psu_id, bridge.connector_id.clone()), bridge);
        Ok(())
    }

    async fn psu_bank_bridges_get(&self, psu_id: Uuid, connector_id: &ConnectorId) -> StorageResult<BankBridge> {
        self.begin("psu_bank_bridges_get")?;
        self.tables
            .lock()
            .bank_bridges
            .get(&(psu_id, connector_id.clone()))
            .cloned()
            .ok_or_else(|| StorageError::not_found("bank bridge", format!("{psu_id}/{connector_id}")))
    }

    async fn psu_bank_bridges_list(&self, psu_id: Uuid, page: PageRequest) -> StorageResult<ListPage<BankBridge>> {
        self.begin("psu_bank_bridges_list")?;
        let bridges: Vec<BankBridge> = self
            .tables
            .lock()
            .bank_bridges
            .values()
            .filter(|bridge| bridge.psu_id == psu_id)
            .cloned()
            .collect();
        Self::paginate(bridges, &page)
    }

    async fn psu_bank_bridges_delete(&self, psu_id: Uuid, connector_id: &ConnectorId) -> StorageResult<()> {
        self.begin("psu_bank_bridges_delete")?;
        let mut tables = self.tables.lock();
        tables.bank_bridges.remove(&(psu_id, connector_id.clone()));
        tables
            .connections
            .retain(|(psu, connector, _), _| !(*psu == psu_id && connector == connector_id));
        Ok(())
    }

    async fn psu_bank_bridge_connections_store(&self, connection: BankBridgeConnection) -> StorageResult<()> {
        self.begin("psu_bank_bridge_connections_store")?;
        let key = (
            connection.psu_id,
            connection.connector_id.clone(),
            connection.connection_id.clone(),
        );
        self.tables.lock().connections.insert(key, connection);
        Ok(())
    }

    async fn psu_bank_bridge_connections_get(
        &self,
        psu_id: Uuid,
        connector_id: &ConnectorId,
        connection_id: &str,
    ) -> StorageResult<BankBridgeConnection> {
        self.begin("psu_bank_bridge_connections_get")?;
        self.tables
            .lock()
            .connections
            .get(&(psu_id, connector_id.clone(), connection_id.to_string()))
            .cloned()
            .ok_or_else(|| StorageError::not_found("bank bridge connection", connection_id))
    }

    async fn psu_bank_bridge_connections_delete(
        &self,
        psu_id: Uuid,
        connector_id: &ConnectorId,
        connection_id: &str,
    ) -> StorageResult<()> {
        self.begin("psu_bank_bridge_connections_delete")?;
        self.tables
            .lock()
            .connections
            .remove(&(psu_id, connector_id.clone(), connection_id.to_string()));
        Ok(())
    }

    async fn user_link_attempts_store(&self, attempt: UserLinkAttempt) -> StorageResult<()> {
        self.begin("user_link_attempts_store")?;
        self.tables.lock().link_attempts.insert(attempt.id, attempt);
        Ok(())
    }

    async fn user_link_attempts_get(&self, id: Uuid) -> StorageResult<UserLinkAttempt> {
        self.begin("user_link_attempts_get")?;
        self.tables
            .lock()
            .link_attempts
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("user link attempt", id))
    }
}
