use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

use connector_engine::models::{
    ConnectorConfig, ConnectorId, ConnectorTaskTree, PspAccount, PspBalance, PspPaymentToDelete, PspPayment,
    WebhookResponse,
};
use connector_engine::plugin::{
    CompleteUserLinkRequest, CompleteUserLinkResponse, CreateBankAccountRequest, CreateBankAccountResponse,
    CreateOrderRequest, CreateOrderResponse, CreatePaymentInitiationRequest, CreatePaymentInitiationResponse,
    CreateWebhooksRequest, CreateWebhooksResponse, DeleteUserConnectionRequest, DeleteUserRequest, FetchNextPaymentsResponse,
    FetchNextRequest, FetchNextResponse, InstallRequest, InstallResponse, PollOrderStatusRequest,
    PollOrderStatusResponse, PollPaymentInitiationRequest, PollPaymentInitiationResponse, TranslateWebhookRequest,
    UninstallRequest,
};
use connector_engine::registry::PluginFactory;
use connector_engine::{Plugin, PluginError, PluginResult};

/// Scripted provider plugin
///
/// Fetch capabilities serve queued pages and fall back to an empty last page.
/// One-shot capabilities serve queued responses and fail as not implemented
/// once their queue is drained.
#[derive(Default)]
pub struct MockPlugin {
    calls: Mutex<Vec<String>>,
    fetch_requests: Mutex<Vec<FetchNextRequest>>,
    install_tree: Mutex<Vec<ConnectorTaskTree>>,
    uninstall_requests: Mutex<Vec<UninstallRequest>>,
    account_pages: Mutex<VecDeque<PluginResult<FetchNextResponse<PspAccount>>>>,
    balance_pages: Mutex<VecDeque<PluginResult<FetchNextResponse<PspBalance>>>>,
    payment_pages: Mutex<VecDeque<PluginResult<FetchNextPaymentsResponse>>>,
    webhooks_response: Mutex<CreateWebhooksResponse>,
    webhook_requests: Mutex<Vec<CreateWebhooksRequest>>,
    translations: Mutex<Vec<WebhookResponse>>,
    bank_account_responses: Mutex<VecDeque<PluginResult<CreateBankAccountResponse>>>,
    order_responses: Mutex<VecDeque<PluginResult<CreateOrderResponse>>>,
    order_polls: Mutex<VecDeque<PluginResult<PollOrderStatusResponse>>>,
    initiation_responses: Mutex<VecDeque<PluginResult<CreatePaymentInitiationResponse>>>,
    initiation_polls: Mutex<VecDeque<PluginResult<PollPaymentInitiationResponse>>>,
    delete_user_errors: Mutex<VecDeque<PluginError>>,
    user_link_responses: Mutex<VecDeque<PluginResult<CompleteUserLinkResponse>>>,
}

impl MockPlugin {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, capability: &str) -> usize {
        self.calls.lock().iter().filter(|call| *call == capability).count()
    }

    pub fn fetch_requests(&self) -> Vec<FetchNextRequest> {
        self.fetch_requests.lock().clone()
    }

    pub fn uninstall_requests(&self) -> Vec<UninstallRequest> {
        self.uninstall_requests.lock().clone()
    }

    pub fn webhook_requests(&self) -> Vec<CreateWebhooksRequest> {
        self.webhook_requests.lock().clone()
    }

    pub fn set_install_tree(&self, tree: Vec<ConnectorTaskTree>) {
        *self.install_tree.lock() = tree;
    }

    pub fn push_account_page(&self, items: Vec<PspAccount>, new_state: serde_json::Value, has_more: bool) {
        self.account_pages.lock().push_back(Ok(FetchNextResponse {
            items,
            new_state,
            has_more,
        }));
    }

    pub fn push_account_error(&self, error: PluginError) {
        self.account_pages.lock().push_back(Err(error));
    }

    pub fn push_balance_page(&self, items: Vec<PspBalance>, new_state: serde_json::Value, has_more: bool) {
        self.balance_pages.lock().push_back(Ok(FetchNextResponse {
            items,
            new_state,
            has_more,
        }));
    }

    pub fn push_payment_page(
        &self,
        payments: Vec<PspPayment>,
        payments_to_delete: Vec<PspPaymentToDelete>,
        new_state: serde_json::Value,
        has_more: bool,
    ) {
        self.payment_pages.lock().push_back(Ok(FetchNextPaymentsResponse {
            payments,
            payments_to_delete,
            new_state,
            has_more,
        }));
    }

    pub fn set_webhooks_response(&self, response: CreateWebhooksResponse) {
        *self.webhooks_response.lock() = response;
    }

    pub fn set_translations(&self, responses: Vec<WebhookResponse>) {
        *self.translations.lock() = responses;
    }

    pub fn push_bank_account_response(&self, response: PluginResult<CreateBankAccountResponse>) {
        self.bank_account_responses.lock().push_back(response);
    }

    pub fn push_order_response(&self, response: PluginResult<CreateOrderResponse>) {
        self.order_responses.lock().push_back(response);
    }

    pub fn push_order_poll(&self, response: PluginResult<PollOrderStatusResponse>) {
        self.order_polls.lock().push_back(response);
    }

    pub fn push_initiation_response(&self, response: PluginResult<CreatePaymentInitiationResponse>) {
        self.initiation_responses.lock().push_back(response);
    }

    pub fn push_initiation_poll(&self, response: PluginResult<PollPaymentInitiationResponse>) {
        self.initiation_polls.lock().push_back(response);
    }

    pub fn push_delete_user_error(&self, error: PluginError) {
        self.delete_user_errors.lock().push_back(error);
    }

    pub fn push_user_link_response(&self, response: PluginResult<CompleteUserLinkResponse>) {
        self.user_link_responses.lock().push_back(response);
    }

    fn record(&self, capability: &str) {
        self.calls.lock().push(capability.to_string());
    }

    fn next<T>(queue: &Mutex<VecDeque<PluginResult<T>>>, capability: &str) -> PluginResult<T> {
        queue
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(PluginError::not_implemented(capability)))
    }

    fn next_page<T>(
        queue: &Mutex<VecDeque<PluginResult<FetchNextResponse<T>>>>,
        request: &FetchNextRequest,
    ) -> PluginResult<FetchNextResponse<T>> {
        queue.lock().pop_front().unwrap_or_else(|| {
            Ok(FetchNextResponse {
                items: Vec::new(),
                new_state: request.state.clone(),
                has_more: false,
            })
        })
    }
}

#[async_trait]
impl Plugin for MockPlugin {
    fn name(&self) -> &str {
        "mockpay"
    }

    async fn install(&self, _request: InstallRequest) -> PluginResult<InstallResponse> {
        self.record("install");
        Ok(InstallResponse {
            workflow: self.install_tree.lock().clone(),
        })
    }

    async fn uninstall(&self, request: UninstallRequest) -> PluginResult<()> {
        self.record("uninstall");
        self.uninstall_requests.lock().push(request);
        Ok(())
    }

    async fn fetch_next_accounts(&self, request: FetchNextRequest) -> PluginResult<FetchNextResponse<PspAccount>> {
        self.record("fetch_next_accounts");
        self.fetch_requests.lock().push(request.clone());
        Self::next_page(&self.account_pages, &request)
    }

    async fn fetch_next_balances(&self, request: FetchNextRequest) -> PluginResult<FetchNextResponse<PspBalance>> {
        self.record("fetch_next_balances");
        self.fetch_requests.lock().push(request.clone());
        Self::next_page(&self.balance_pages, &request)
    }

    async fn fetch_next_payments(&self, request: FetchNextRequest) -> PluginResult<FetchNextPaymentsResponse> {
        self.record("fetch_next_payments");
        self.fetch_requests.lock().push(request.clone());
        self.payment_pages.lock().pop_front().unwrap_or_else(|| {
            Ok(FetchNextPaymentsResponse {
                payments: Vec::new(),
                payments_to_delete: Vec::new(),
                new_state: request.state.clone(),
                has_more: false,
            })
        })
    }

    async fn create_webhooks(&self, request: CreateWebhooksRequest) -> PluginResult<CreateWebhooksResponse> {
        self.record("create_webhooks");
        self.webhook_requests.lock().push(request);
        Ok(self.webhooks_response.lock().clone())
    }

    async fn translate_webhook(&self, _request: TranslateWebhookRequest) -> PluginResult<Vec<WebhookResponse>> {
        self.record("translate_webhook");
        Ok(self.translations.lock().clone())
    }

    async fn create_bank_account(&self, _request: CreateBankAccountRequest) -> PluginResult<CreateBankAccountResponse> {
        self.record("create_bank_account");
        Self::next(&self.bank_account_responses, "create_bank_account")
    }

    async fn create_order(&self, _request: CreateOrderRequest) -> PluginResult<CreateOrderResponse> {
        self.record("create_order");
        Self::next(&self.order_responses, "create_order")
    }

    async fn poll_order_status(&self, _request: PollOrderStatusRequest) -> PluginResult<PollOrderStatusResponse> {
        self.record("poll_order_status");
        Self::next(&self.order_polls, "poll_order_status")
    }

    async fn create_payout(&self, _request: CreatePaymentInitiationRequest) -> PluginResult<CreatePaymentInitiationResponse> {
        self.record("create_payout");
        Self::next(&self.initiation_responses, "create_payout")
    }

    async fn poll_payout_status(&self, _request: PollPaymentInitiationRequest) -> PluginResult<PollPaymentInitiationResponse> {
        self.record("poll_payout_status");
        Self::next(&self.initiation_polls, "poll_payout_status")
    }

    async fn create_transfer(&self, _request: CreatePaymentInitiationRequest) -> PluginResult<CreatePaymentInitiationResponse> {
        self.record("create_transfer");
        Self::next(&self.initiation_responses, "create_transfer")
    }

    async fn poll_transfer_status(&self, _request: PollPaymentInitiationRequest) -> PluginResult<PollPaymentInitiationResponse> {
        self.record("poll_transfer_status");
        Self::next(&self.initiation_polls, "poll_transfer_status")
    }

    async fn delete_user(&self, _request: DeleteUserRequest) -> PluginResult<()> {
        self.record("delete_user");
        match self.delete_user_errors.lock().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn delete_user_connection(&self, _request: DeleteUserConnectionRequest) -> PluginResult<()> {
        self.record("delete_user_connection");
        Ok(())
    }

    async fn complete_user_link(&self, _request: CompleteUserLinkRequest) -> PluginResult<CompleteUserLinkResponse> {
        self.record("complete_user_link");
        Self::next(&self.user_link_responses, "complete_user_link")
    }
}

/// Hands out the same scripted plugin for every connector
pub struct MockFactory {
    pub plugin: Arc<MockPlugin>,
}

impl PluginFactory for MockFactory {
    fn create(&self, _connector_id: &ConnectorId, _config: &ConnectorConfig) -> PluginResult<Arc<dyn Plugin>> {
        Ok(self.plugin.clone())
    }
}
