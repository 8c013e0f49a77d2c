//! Shared fixture for webhook handler tests.

use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::adapters::memory::{InMemoryRecordStore, InMemoryTokenWallet};
use crate::adapters::stripe::MockPaymentGateway;
use crate::application::services::{CatalogSyncService, LedgerService, SubscriptionSyncService};
use crate::domain::catalog::SubscriptionPlan;
use crate::domain::foundation::{PaymentTransactionId, PlanId, UserId, WalletId};
use crate::domain::ledger::PaymentTransaction;
use crate::domain::subscription::{SubscriptionStatus, UserSubscription, UserSubscriptionUpsert};
use crate::domain::webhook::{
    GatewayPrice, GatewayProduct, GatewaySubscription, RecurringInterval, WebhookConfirmation,
    WebhookError,
};
use crate::ports::{from_record, Filter, RecordStore, Table};

use super::{GatewayWebhookHandler, ProcessWebhookCommand};

pub const USER: &str = "user-1";
pub const WALLET: &str = "wallet-1";
pub const CUSTOMER: &str = "cus_1";
pub const FREE_PRICE: &str = "price_FREE";

pub struct Fixture {
    pub store: Arc<InMemoryRecordStore>,
    pub wallet: Arc<InMemoryTokenWallet>,
    pub gateway: MockPaymentGateway,
    pub handler: GatewayWebhookHandler,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_gateway(MockPaymentGateway::new())
    }

    pub fn with_gateway(gateway: MockPaymentGateway) -> Self {
        let store = Arc::new(InMemoryRecordStore::new());
        let wallet = Arc::new(InMemoryTokenWallet::new().with_wallet(USER, wallet_id()));

        let handler = GatewayWebhookHandler::new(
            Arc::new(gateway.clone()),
            LedgerService::new(store.clone(), wallet.clone()),
            CatalogSyncService::new(store.clone(), FREE_PRICE),
            SubscriptionSyncService::new(store.clone()),
        );

        Self {
            store,
            wallet,
            gateway,
            handler,
        }
    }

    pub async fn handle(&self, payload: Vec<u8>) -> Result<WebhookConfirmation, WebhookError> {
        self.handler
            .handle(ProcessWebhookCommand {
                payload,
                signature: Some("t=1,v1=00".to_string()),
            })
            .await
    }

    // === Seeding ===

    /// A transaction created when checkout started, before payment.
    pub fn pending_transaction(&self, tokens: i64) -> PaymentTransaction {
        let row = self.store.seed(
            Table::PaymentTransactions,
            record(json!({
                "id": PaymentTransactionId::new().to_string(),
                "gateway_name": "stripe",
                "gateway_transaction_id": null,
                "user_id": USER,
                "target_wallet_id": WALLET,
                "status": "PENDING",
                "tokens_to_award": tokens,
                "metadata": {}
            })),
        );
        from_record(row).unwrap()
    }

    pub async fn seed_plan(&self, price_id: &str, tokens: Option<i64>) -> SubscriptionPlan {
        let mut price = price(price_id, true);
        if let Some(tokens) = tokens {
            price
                .metadata
                .insert("tokens_to_award".to_string(), tokens.to_string());
        }
        self.handler.catalog.upsert_plan(&product(), &price).await.unwrap()
    }

    pub async fn seed_user_subscription(&self, subscription_id: &str) -> UserSubscription {
        self.handler
            .subscriptions
            .upsert(UserSubscriptionUpsert {
                user_id: UserId::new(USER).unwrap(),
                gateway_customer_id: CUSTOMER.to_string(),
                gateway_subscription_id: subscription_id.to_string(),
                plan_id: PlanId::new(),
                status: SubscriptionStatus::Active,
                current_period_start: None,
                current_period_end: None,
                cancel_at_period_end: false,
            })
            .await
            .unwrap()
    }

    // === Inspection ===

    pub fn transaction(&self, id: &PaymentTransactionId) -> PaymentTransaction {
        self.transactions()
            .into_iter()
            .find(|tx| &tx.id == id)
            .unwrap()
    }

    pub fn transactions(&self) -> Vec<PaymentTransaction> {
        self.store
            .rows(Table::PaymentTransactions)
            .into_iter()
            .map(|row| from_record(row).unwrap())
            .collect()
    }

    pub async fn user_subscription(&self, subscription_id: &str) -> Option<UserSubscription> {
        self.store
            .find(
                Table::UserSubscriptions,
                &[Filter::eq("gateway_subscription_id", subscription_id)],
            )
            .await
            .unwrap()
            .into_iter()
            .next()
            .map(|row| from_record(row).unwrap())
    }

    pub fn plans(&self) -> Vec<SubscriptionPlan> {
        self.store
            .rows(Table::SubscriptionPlans)
            .into_iter()
            .map(|row| from_record(row).unwrap())
            .collect()
    }
}

pub fn wallet_id() -> WalletId {
    WalletId::new(WALLET).unwrap()
}

pub fn record(value: Value) -> serde_json::Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("test rows must be objects"),
    }
}

// === Gateway objects ===

pub fn product() -> GatewayProduct {
    GatewayProduct {
        id: "prod_1".to_string(),
        name: "Pro".to_string(),
        description: Some("Everything you need".to_string()),
        active: true,
        default_price_id: Some("price_monthly".to_string()),
        metadata: HashMap::new(),
    }
}

pub fn price(id: &str, recurring: bool) -> GatewayPrice {
    GatewayPrice {
        id: id.to_string(),
        product_id: "prod_1".to_string(),
        active: true,
        unit_amount: Some(1999),
        currency: Some("usd".to_string()),
        recurring: recurring.then(|| RecurringInterval {
            interval: "month".to_string(),
            interval_count: 1,
        }),
        metadata: HashMap::new(),
    }
}

pub fn gateway_subscription(id: &str, price_id: &str, status: SubscriptionStatus) -> GatewaySubscription {
    GatewaySubscription {
        id: id.to_string(),
        customer_id: CUSTOMER.to_string(),
        status,
        current_period_start: None,
        current_period_end: None,
        cancel_at_period_end: false,
        price_ids: vec![price_id.to_string()],
        metadata: HashMap::new(),
    }
}

// === Payloads ===

pub fn checkout_payload(mode: &str, metadata: Value, subscription: Option<&str>) -> Vec<u8> {
    MockPaymentGateway::event_payload(
        "checkout.session.completed",
        json!({
            "id": "cs_test_1",
            "object": "checkout.session",
            "mode": mode,
            "customer": CUSTOMER,
            "subscription": subscription,
            "payment_status": "paid",
            "metadata": metadata
        }),
    )
}

pub fn invoice_payload(event_type: &str, invoice_id: &str, price_id: Option<&str>, attempt: i32) -> Vec<u8> {
    invoice_payload_for(event_type, invoice_id, price_id, attempt, "subscription_cycle")
}

pub fn invoice_payload_for(
    event_type: &str,
    invoice_id: &str,
    price_id: Option<&str>,
    attempt: i32,
    billing_reason: &str,
) -> Vec<u8> {
    let lines = match price_id {
        Some(price_id) => json!([{"id": "il_1", "price": {"id": price_id}}]),
        None => json!([]),
    };
    MockPaymentGateway::event_payload(
        event_type,
        json!({
            "id": invoice_id,
            "object": "invoice",
            "customer": CUSTOMER,
            "subscription": "sub_1",
            "amount_paid": 1999,
            "currency": "usd",
            "attempt_count": attempt,
            "billing_reason": billing_reason,
            "lines": {"data": lines}
        }),
    )
}
