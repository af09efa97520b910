//! Payment gateway client: typed call surface over the remote REST API.
//!
//! The gateway target is an immutable per-call value; nothing here mutates
//! shared environment state between requests.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{GatewayConfig, GatewayCredentials};
use crate::entities::payment::Environment;
use crate::error::GatewayError;

/// Follow-on charge against a stored credential. `previous_payment_id`
/// links the merchant-initiated transaction to the original authorization.
#[derive(Debug, Clone, PartialEq)]
pub struct ChargeRequest {
    pub code: String,
    pub total_amount: String,
    pub currency: String,
    pub customer_id: String,
    pub previous_payment_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    pub id: String,
    pub submit_time_utc: String,
    pub status: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillTo {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub company: Option<String>,
    pub address1: String,
    #[serde(default)]
    pub address2: Option<String>,
    pub locality: String,
    pub administrative_area: String,
    pub postal_code: String,
    pub email: String,
    pub phone_number: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmountDetails {
    #[serde(default)]
    pub total_amount: Option<String>,
    #[serde(default)]
    pub authorized_amount: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderInformation {
    #[serde(default)]
    pub bill_to: Option<BillTo>,
    #[serde(default)]
    pub amount_details: AmountDetails,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardInfo {
    /// Gateway card-type code, e.g. "001" for Visa.
    #[serde(rename = "type", default)]
    pub card_type: Option<String>,
    #[serde(default)]
    pub suffix: Option<String>,
    #[serde(default)]
    pub expiration_month: Option<String>,
    #[serde(default)]
    pub expiration_year: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRef {
    #[serde(default)]
    pub customer_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInformation {
    #[serde(default)]
    pub card: Option<CardInfo>,
    #[serde(default)]
    pub customer: Option<CustomerRef>,
}

/// Canonical transaction view, the superset both the receipt path and the
/// discovery path read from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDetail {
    pub id: String,
    #[serde(default)]
    pub submit_time_utc: Option<String>,
    #[serde(default)]
    pub order_information: OrderInformation,
    #[serde(default)]
    pub payment_information: PaymentInformation,
}

impl TransactionDetail {
    pub fn customer_id(&self) -> Option<&str> {
        self.payment_information
            .customer
            .as_ref()
            .and_then(|customer| customer.customer_id.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: String,
    pub sort: String,
    pub offset: u32,
    pub limit: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionSummary {
    pub id: String,
}

#[derive(Debug, Clone, Default)]
pub struct SearchResult {
    pub transaction_summaries: Vec<TransactionSummary>,
}

/// Human-readable card network name for a gateway card-type code.
pub fn card_type_name(code: &str) -> &'static str {
    match code {
        "001" => "Visa",
        "002" => "Mastercard",
        "003" => "American Express",
        "004" => "Discover",
        "005" => "Diners Club",
        "006" => "Carte Blanche",
        "007" => "JCB",
        _ => "Card",
    }
}

#[async_trait]
pub trait GatewayClient: Send + Sync {
    /// Submits a merchant-initiated follow-on charge with capture.
    async fn create_payment(
        &self,
        environment: Environment,
        request: &ChargeRequest,
    ) -> Result<PaymentResponse, GatewayError>;

    /// Fetches the canonical transaction for a remote transaction id.
    async fn get_transaction(
        &self,
        environment: Environment,
        transaction_id: &str,
    ) -> Result<TransactionDetail, GatewayError>;

    async fn search_transactions(
        &self,
        environment: Environment,
        request: &SearchRequest,
    ) -> Result<SearchResult, GatewayError>;
}

// Request envelope for the create-payment call. Field layout follows the
// gateway's camelCase API; only the parts the engine needs are modeled.

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatePaymentBody {
    client_reference_information: ClientReferenceInformation,
    order_information: OrderInformationBody,
    payment_information: PaymentInformationBody,
    processing_information: ProcessingInformation,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClientReferenceInformation {
    code: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OrderInformationBody {
    amount_details: AmountDetailsBody,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AmountDetailsBody {
    total_amount: String,
    currency: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PaymentInformationBody {
    customer: CustomerBody,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CustomerBody {
    customer_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProcessingInformation {
    capture: bool,
    commerce_indicator: String,
    authorization_options: AuthorizationOptions,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthorizationOptions {
    initiator: Initiator,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Initiator {
    #[serde(rename = "type")]
    initiator_type: String,
    stored_credential_used: bool,
    merchant_initiated_transaction: MerchantInitiatedTransaction,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MerchantInitiatedTransaction {
    #[serde(rename = "previousTransactionID")]
    previous_transaction_id: String,
}

#[derive(Serialize)]
struct SearchBody {
    query: String,
    sort: String,
    offset: u32,
    limit: u32,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct SearchResponseBody {
    #[serde(rename = "_embedded", default)]
    embedded: Option<EmbeddedSummaries>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct EmbeddedSummaries {
    #[serde(default)]
    transaction_summaries: Vec<TransactionSummary>,
}

fn charge_request_body(request: &ChargeRequest) -> CreatePaymentBody {
    CreatePaymentBody {
        client_reference_information: ClientReferenceInformation {
            code: request.code.clone(),
        },
        order_information: OrderInformationBody {
            amount_details: AmountDetailsBody {
                total_amount: request.total_amount.clone(),
                currency: request.currency.clone(),
            },
        },
        payment_information: PaymentInformationBody {
            customer: CustomerBody {
                customer_id: request.customer_id.clone(),
            },
        },
        processing_information: ProcessingInformation {
            capture: true,
            commerce_indicator: "recurring".to_string(),
            authorization_options: AuthorizationOptions {
                initiator: Initiator {
                    initiator_type: "merchant".to_string(),
                    stored_credential_used: true,
                    merchant_initiated_transaction: MerchantInitiatedTransaction {
                        previous_transaction_id: request.previous_payment_id.clone(),
                    },
                },
            },
        },
    }
}

#[derive(Clone)]
pub struct HttpGatewayClient {
    client: Client,
    config: GatewayConfig,
}

impl HttpGatewayClient {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap(),
            config,
        }
    }

    fn credentials(&self, environment: Environment) -> &GatewayCredentials {
        match environment {
            Environment::Development => &self.config.development,
            Environment::Production => &self.config.production,
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<String, GatewayError> {
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message: text,
            });
        }
        Ok(text)
    }

    fn parse<T: for<'de> Deserialize<'de>>(text: &str) -> Result<T, GatewayError> {
        serde_json::from_str(text).map_err(|e| GatewayError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl GatewayClient for HttpGatewayClient {
    async fn create_payment(
        &self,
        environment: Environment,
        request: &ChargeRequest,
    ) -> Result<PaymentResponse, GatewayError> {
        let creds = self.credentials(environment);
        let url = format!("{}/pts/v2/payments", creds.base_url);
        tracing::debug!(
            "Submitting charge {} for {} {} on {}",
            request.code,
            request.total_amount,
            request.currency,
            environment
        );

        let response = self
            .client
            .post(&url)
            .header("v-c-merchant-id", &creds.merchant_id)
            .bearer_auth(&creds.api_key)
            .json(&charge_request_body(request))
            .send()
            .await?;

        let text = Self::check_status(response).await?;
        Self::parse(&text)
    }

    async fn get_transaction(
        &self,
        environment: Environment,
        transaction_id: &str,
    ) -> Result<TransactionDetail, GatewayError> {
        let creds = self.credentials(environment);
        let url = format!("{}/tss/v2/transactions/{}", creds.base_url, transaction_id);

        let response = self
            .client
            .get(&url)
            .header("v-c-merchant-id", &creds.merchant_id)
            .bearer_auth(&creds.api_key)
            .send()
            .await?;

        let text = Self::check_status(response).await?;
        Self::parse(&text)
    }

    async fn search_transactions(
        &self,
        environment: Environment,
        request: &SearchRequest,
    ) -> Result<SearchResult, GatewayError> {
        let creds = self.credentials(environment);
        let url = format!("{}/tss/v2/searches", creds.base_url);

        let response = self
            .client
            .post(&url)
            .header("v-c-merchant-id", &creds.merchant_id)
            .bearer_auth(&creds.api_key)
            .json(&SearchBody {
                query: request.query.clone(),
                sort: request.sort.clone(),
                offset: request.offset,
                limit: request.limit,
            })
            .send()
            .await?;

        let text = Self::check_status(response).await?;
        let body: SearchResponseBody = Self::parse(&text)?;
        Ok(SearchResult {
            transaction_summaries: body.embedded.unwrap_or_default().transaction_summaries,
        })
    }
}
