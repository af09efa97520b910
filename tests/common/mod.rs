use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use billing_engine::config::ReceiptConfig;
use billing_engine::entities::payment::{Environment, NewPaymentRecord, RecurrenceCadence};
use billing_engine::error::GatewayError;
use billing_engine::queue::{InMemoryReceiptQueue, ReceiptQueue};
use billing_engine::services::gateway::{
    AmountDetails, BillTo, CardInfo, ChargeRequest, GatewayClient, OrderInformation,
    PaymentInformation, PaymentResponse, SearchRequest, SearchResult, TransactionDetail,
};
use billing_engine::services::mailer::Mailer;
use billing_engine::services::receipts::ReceiptService;
use billing_engine::services::recurring::RecurringPaymentService;
use billing_engine::store::InMemoryPaymentStore;

/// Scripted gateway double. Every call is recorded; charge and search
/// responses are popped from scripts, transactions come from a lookup map.
#[derive(Default)]
pub struct MockGateway {
    pub charges: Mutex<Vec<(Environment, ChargeRequest)>>,
    pub charge_results: Mutex<VecDeque<Result<PaymentResponse, GatewayError>>>,
    pub transactions: Mutex<HashMap<String, TransactionDetail>>,
    pub transaction_requests: Mutex<Vec<String>>,
    pub search_results: Mutex<VecDeque<SearchResult>>,
    pub search_requests: Mutex<Vec<SearchRequest>>,
    generated_ids: AtomicU64,
}

impl MockGateway {
    #[allow(dead_code)]
    pub fn script_charge(&self, result: Result<PaymentResponse, GatewayError>) {
        self.charge_results.lock().push_back(result);
    }

    /// Registers a transaction as settled and queryable.
    pub fn put_transaction(&self, detail: TransactionDetail) {
        self.transactions.lock().insert(detail.id.clone(), detail);
    }

    #[allow(dead_code)]
    pub fn script_search(&self, result: SearchResult) {
        self.search_results.lock().push_back(result);
    }
}

#[async_trait]
impl GatewayClient for MockGateway {
    async fn create_payment(
        &self,
        environment: Environment,
        request: &ChargeRequest,
    ) -> Result<PaymentResponse, GatewayError> {
        self.charges.lock().push((environment, request.clone()));
        if let Some(result) = self.charge_results.lock().pop_front() {
            return result;
        }
        // Unscripted charges succeed with a generated transaction id.
        let n = self.generated_ids.fetch_add(1, Ordering::SeqCst);
        Ok(PaymentResponse {
            id: format!("TXN-GEN-{}", n),
            submit_time_utc: "2026-05-01T10:00:00Z".to_string(),
            status: "AUTHORIZED".to_string(),
        })
    }

    async fn get_transaction(
        &self,
        _environment: Environment,
        transaction_id: &str,
    ) -> Result<TransactionDetail, GatewayError> {
        self.transaction_requests
            .lock()
            .push(transaction_id.to_string());
        match self.transactions.lock().get(transaction_id) {
            Some(detail) => Ok(detail.clone()),
            None => Err(GatewayError::Api {
                status: 404,
                message: format!("transaction {} not found", transaction_id),
            }),
        }
    }

    async fn search_transactions(
        &self,
        _environment: Environment,
        request: &SearchRequest,
    ) -> Result<SearchResult, GatewayError> {
        self.search_requests.lock().push(request.clone());
        Ok(self.search_results.lock().pop_front().unwrap_or_default())
    }
}

pub struct SentMail {
    pub key: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Mailer double with a switchable outcome.
pub struct MockMailer {
    pub succeed: Mutex<bool>,
    pub sent: Mutex<Vec<SentMail>>,
}

impl Default for MockMailer {
    fn default() -> Self {
        Self {
            succeed: Mutex::new(true),
            sent: Mutex::new(Vec::new()),
        }
    }
}

impl MockMailer {
    #[allow(dead_code)]
    pub fn set_succeed(&self, succeed: bool) {
        *self.succeed.lock() = succeed;
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send(&self, key: &str, to: &str, subject: &str, body: &str) -> bool {
        self.sent.lock().push(SentMail {
            key: key.to_string(),
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        *self.succeed.lock()
    }
}

/// Fully wired engine over in-memory backends and gateway/mailer doubles.
/// The settle delay is zero so deferred receipts fire immediately.
pub struct TestEngine {
    pub store: Arc<InMemoryPaymentStore>,
    pub queue: Arc<InMemoryReceiptQueue>,
    pub gateway: Arc<MockGateway>,
    pub mailer: Arc<MockMailer>,
    pub receipts: Arc<ReceiptService>,
    pub recurring: Arc<RecurringPaymentService>,
}

pub fn test_engine() -> TestEngine {
    let store = Arc::new(InMemoryPaymentStore::default());
    let queue = Arc::new(InMemoryReceiptQueue::default());
    let gateway = Arc::new(MockGateway::default());
    let mailer = Arc::new(MockMailer::default());

    let receipts = Arc::new(ReceiptService::new(
        Arc::clone(&queue) as Arc<dyn ReceiptQueue>,
        Arc::clone(&mailer) as Arc<dyn Mailer>,
        ReceiptConfig {
            subject: "Your receipt".to_string(),
            message: "Thank you for your gift.".to_string(),
        },
    ));
    let recurring = Arc::new(RecurringPaymentService::new(
        Arc::clone(&store) as Arc<dyn billing_engine::store::PaymentRecordStore>,
        Arc::clone(&gateway) as Arc<dyn GatewayClient>,
        Arc::clone(&receipts),
        RecurrenceCadence::Monthly,
        Duration::ZERO,
    ));

    TestEngine {
        store,
        queue,
        gateway,
        mailer,
        receipts,
        recurring,
    }
}

/// Active recurring parent that is due for a charge right now.
#[allow(dead_code)]
pub fn recurring_parent(code: &str, max: u32) -> NewPaymentRecord {
    NewPaymentRecord {
        code: code.to_string(),
        payment_id: Some(format!("TXN-{}", code)),
        customer_id: Some(format!("CUST-{}", code)),
        authorized_amount: "25.00".to_string(),
        currency: "USD".to_string(),
        status: "TRANSMITTED".to_string(),
        recurring: true,
        recurring_active: true,
        recurring_next: Some(Utc::now().naive_utc() - chrono::Duration::hours(1)),
        recurring_max: max,
        environment: Environment::Development,
        order_details: None,
        submitted: Some("2026-04-01T10:00:00Z".to_string()),
    }
}

/// Plain transmitted record with a known transaction id, not recurring.
#[allow(dead_code)]
pub fn transmitted_record(code: &str) -> NewPaymentRecord {
    NewPaymentRecord {
        code: code.to_string(),
        payment_id: Some(format!("TXN-{}", code)),
        customer_id: None,
        authorized_amount: "25.00".to_string(),
        currency: "USD".to_string(),
        status: "TRANSMITTED".to_string(),
        recurring: false,
        recurring_active: false,
        recurring_next: None,
        recurring_max: 0,
        environment: Environment::Development,
        order_details: None,
        submitted: Some("2026-04-01T10:00:00Z".to_string()),
    }
}

/// Settled transaction with a complete billing block.
#[allow(dead_code)]
pub fn tx_detail(id: &str, email: &str) -> TransactionDetail {
    TransactionDetail {
        id: id.to_string(),
        submit_time_utc: Some("2026-05-01T10:00:00Z".to_string()),
        order_information: OrderInformation {
            bill_to: Some(BillTo {
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
                company: None,
                address1: "12 Analytical Row".to_string(),
                address2: None,
                locality: "London".to_string(),
                administrative_area: "LDN".to_string(),
                postal_code: "E1 6AN".to_string(),
                email: email.to_string(),
                phone_number: "5551234".to_string(),
            }),
            amount_details: AmountDetails {
                total_amount: Some("25.00".to_string()),
                authorized_amount: Some("25.00".to_string()),
                currency: Some("USD".to_string()),
            },
        },
        payment_information: PaymentInformation {
            card: Some(CardInfo {
                card_type: Some("001".to_string()),
                suffix: Some("1111".to_string()),
                expiration_month: Some("12".to_string()),
                expiration_year: Some("2031".to_string()),
            }),
            customer: None,
        },
    }
}
