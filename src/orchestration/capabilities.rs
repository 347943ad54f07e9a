//! Fetch capabilities plugged into the pagination loop.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::pagination::{FetchCapability, FetchedPage};
use super::EngineContext;
use crate::error::{EngineResult, ResultExt};
use crate::events::DomainEvent;
use crate::models::{
    Account, AccountType, Balance, ConnectorId, Conversion, Order, Payment, PaymentInitiationAdjustment,
    PaymentInitiationAdjustmentStatus, PspAccount, PspBalance, PspConversion, PspOrder, PspOther, PspPayment,
    TaskType,
};
use crate::plugin::{FetchNextRequest, Plugin, PluginResult};
use crate::storage::{Storage, StorageResult};
use crate::substrate::ExecutionContext;

fn translate_all<P: Clone, E>(items: &[P], translate: impl Fn(P) -> EngineResult<E>) -> EngineResult<Vec<E>> {
    items.iter().cloned().map(translate).collect()
}

pub struct AccountsCapability;

#[async_trait]
impl FetchCapability for AccountsCapability {
    type Item = PspAccount;
    type Entity = Account;

    fn task_type(&self) -> TaskType {
        TaskType::FetchAccounts
    }

    async fn fetch_page(&self, plugin: Arc<dyn Plugin>, request: FetchNextRequest) -> PluginResult<FetchedPage<PspAccount>> {
        plugin.fetch_next_accounts(request).await.map(FetchedPage::from)
    }

    fn translate(&self, connector_id: &ConnectorId, items: &[PspAccount], _now: DateTime<Utc>) -> EngineResult<Vec<Account>> {
        translate_all(items, |psp| Account::from_psp(psp, AccountType::Internal, connector_id))
    }

    async fn store(&self, storage: Arc<dyn Storage>, entities: Vec<Account>) -> StorageResult<()> {
        storage.accounts_store(entities).await
    }

    fn events(&self, entity: &Account) -> Vec<DomainEvent> {
        vec![DomainEvent::AccountSaved(entity.clone())]
    }

    fn payload_id(&self, item: &PspAccount) -> String {
        item.reference.clone()
    }
}

pub struct ExternalAccountsCapability;

#[async_trait]
impl FetchCapability for ExternalAccountsCapability {
    type Item = PspAccount;
    type Entity = Account;

    fn task_type(&self) -> TaskType {
        TaskType::FetchExternalAccounts
    }

    async fn fetch_page(&self, plugin: Arc<dyn Plugin>, request: FetchNextRequest) -> PluginResult<FetchedPage<PspAccount>> {
        plugin.fetch_next_external_accounts(request).await.map(FetchedPage::from)
    }

    fn translate(&self, connector_id: &ConnectorId, items: &[PspAccount], _now: DateTime<Utc>) -> EngineResult<Vec<Account>> {
        translate_all(items, |psp| Account::from_psp(psp, AccountType::External, connector_id))
    }

    async fn store(&self, storage: Arc<dyn Storage>, entities: Vec<Account>) -> StorageResult<()> {
        storage.accounts_store(entities).await
    }

    fn events(&self, entity: &Account) -> Vec<DomainEvent> {
        vec![DomainEvent::AccountSaved(entity.clone())]
    }

    fn payload_id(&self, item: &PspAccount) -> String {
        item.reference.clone()
    }
}

pub struct BalancesCapability;

#[async_trait]
impl FetchCapability for BalancesCapability {
    type Item = PspBalance;
    type Entity = Balance;

    fn task_type(&self) -> TaskType {
        TaskType::FetchBalances
    }

    async fn fetch_page(&self, plugin: Arc<dyn Plugin>, request: FetchNextRequest) -> PluginResult<FetchedPage<PspBalance>> {
        plugin.fetch_next_balances(request).await.map(FetchedPage::from)
    }

    fn translate(&self, connector_id: &ConnectorId, items: &[PspBalance], _now: DateTime<Utc>) -> EngineResult<Vec<Balance>> {
        translate_all(items, |psp| Balance::from_psp(psp, connector_id))
    }

    async fn store(&self, storage: Arc<dyn Storage>, entities: Vec<Balance>) -> StorageResult<()> {
        storage.balances_store(entities).await
    }

    fn events(&self, entity: &Balance) -> Vec<DomainEvent> {
        vec![DomainEvent::BalanceSaved(entity.clone())]
    }

    fn payload_id(&self, item: &PspBalance) -> String {
        item.account_reference.clone()
    }
}

/// Payments, plus upstream deletions and payment-initiation adjustments
pub struct PaymentsCapability;

#[async_trait]
impl FetchCapability for PaymentsCapability {
    type Item = PspPayment;
    type Entity = Payment;

    fn task_type(&self) -> TaskType {
        TaskType::FetchPayments
    }

    async fn fetch_page(&self, plugin: Arc<dyn Plugin>, request: FetchNextRequest) -> PluginResult<FetchedPage<PspPayment>> {
        let response = plugin.fetch_next_payments(request).await?;
        Ok(FetchedPage {
            items: response.payments,
            to_delete: response.payments_to_delete,
            new_state: response.new_state,
            has_more: response.has_more,
        })
    }

    fn translate(&self, connector_id: &ConnectorId, items: &[PspPayment], _now: DateTime<Utc>) -> EngineResult<Vec<Payment>> {
        translate_all(items, |psp| Payment::from_psp(psp, connector_id))
    }

    async fn store(&self, storage: Arc<dyn Storage>, entities: Vec<Payment>) -> StorageResult<()> {
        storage.payments_store(entities).await
    }

    fn events(&self, entity: &Payment) -> Vec<DomainEvent> {
        vec![DomainEvent::PaymentSaved(entity.clone())]
    }

    fn payload_id(&self, item: &PspPayment) -> String {
        item.reference.clone()
    }

    /// Record the payment's status on every payment initiation it settles
    async fn after_store(&self, ctx: &EngineContext, exec: &ExecutionContext, entity: &Payment) -> EngineResult<()> {
        let payment_id = &entity.id;
        let initiation_ids = ctx
            .activities
            .storage_call(exec, "payment_initiation_ids_list_from_payment_id", move |storage| async move {
                storage.payment_initiation_ids_list_from_payment_id(payment_id).await
            })
            .await
            .context("listing payment initiations")?;

        for payment_initiation_id in initiation_ids {
            let adjustment = PaymentInitiationAdjustment {
                payment_initiation_id,
                created_at: entity.created_at,
                status: PaymentInitiationAdjustmentStatus::from_payment_status(entity.status),
                amount: Some(entity.amount),
                asset: Some(entity.asset.clone()),
                error: None,
            };
            let record = &adjustment;
            ctx.activities
                .storage_call(exec, "payment_initiations_adjustments_store", move |storage| async move {
                    storage.payment_initiations_adjustments_store(record.clone()).await
                })
                .await
                .context("storing payment initiation adjustment")?;
            ctx.emit(exec, DomainEvent::PaymentInitiationAdjustmentSaved(adjustment))
                .await
                .context("sending events")?;
        }
        Ok(())
    }
}

pub struct OrdersCapability;

#[async_trait]
impl FetchCapability for OrdersCapability {
    type Item = PspOrder;
    type Entity = Order;

    fn task_type(&self) -> TaskType {
        TaskType::FetchOrders
    }

    async fn fetch_page(&self, plugin: Arc<dyn Plugin>, request: FetchNextRequest) -> PluginResult<FetchedPage<PspOrder>> {
        plugin.fetch_next_orders(request).await.map(FetchedPage::from)
    }

    fn translate(&self, connector_id: &ConnectorId, items: &[PspOrder], now: DateTime<Utc>) -> EngineResult<Vec<Order>> {
        translate_all(items, |psp| Order::from_psp(psp, connector_id, now))
    }

    async fn store(&self, storage: Arc<dyn Storage>, entities: Vec<Order>) -> StorageResult<()> {
        storage.orders_upsert(entities).await
    }

    fn events(&self, entity: &Order) -> Vec<DomainEvent> {
        vec![DomainEvent::OrderSaved(entity.clone())]
    }

    fn payload_id(&self, item: &PspOrder) -> String {
        item.reference.clone()
    }
}

pub struct ConversionsCapability;

#[async_trait]
impl FetchCapability for ConversionsCapability {
    type Item = PspConversion;
    type Entity = Conversion;

    fn task_type(&self) -> TaskType {
        TaskType::FetchConversions
    }

    async fn fetch_page(
        &self,
        plugin: Arc<dyn Plugin>,
        request: FetchNextRequest,
    ) -> PluginResult<FetchedPage<PspConversion>> {
        plugin.fetch_next_conversions(request).await.map(FetchedPage::from)
    }

    fn translate(
        &self,
        connector_id: &ConnectorId,
        items: &[PspConversion],
        _now: DateTime<Utc>,
    ) -> EngineResult<Vec<Conversion>> {
        translate_all(items, |psp| Conversion::from_psp(psp, connector_id))
    }

    async fn store(&self, storage: Arc<dyn Storage>, entities: Vec<Conversion>) -> StorageResult<()> {
        storage.conversions_store(entities).await
    }

    fn events(&self, entity: &Conversion) -> Vec<DomainEvent> {
        vec![DomainEvent::ConversionSaved(entity.clone())]
    }

    fn payload_id(&self, item: &PspConversion) -> String {
        item.reference.clone()
    }
}

/// Free-form provider objects; nothing is stored, they only feed next tasks
pub struct OthersCapability;

#[async_trait]
impl FetchCapability for OthersCapability {
    type Item = PspOther;
    type Entity = PspOther;

    fn task_type(&self) -> TaskType {
        TaskType::FetchOthers
    }

    async fn fetch_page(&self, plugin: Arc<dyn Plugin>, request: FetchNextRequest) -> PluginResult<FetchedPage<PspOther>> {
        plugin.fetch_next_others(request).await.map(FetchedPage::from)
    }

    fn translate(&self, _connector_id: &ConnectorId, _items: &[PspOther], _now: DateTime<Utc>) -> EngineResult<Vec<PspOther>> {
        Ok(Vec::new())
    }

    async fn store(&self, _storage: Arc<dyn Storage>, _entities: Vec<PspOther>) -> StorageResult<()> {
        Ok(())
    }

    fn payload_id(&self, item: &PspOther) -> String {
        item.id.clone()
    }
}
