//! In-memory subscription and payment repositories.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::billing::{Payment, PaymentStatus, Subscription, SubscriptionStatus};
use crate::domain::foundation::DomainError;
use crate::ports::{PaymentRepository, SubscriptionRepository};

#[derive(Default)]
pub struct InMemorySubscriptionRepository {
    rows: Mutex<HashMap<String, Subscription>>,
}

impl InMemorySubscriptionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubscriptionRepository for InMemorySubscriptionRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Subscription>, DomainError> {
        Ok(self.rows.lock().await.get(id).cloned())
    }

    async fn upsert(&self, subscription: &Subscription) -> Result<bool, DomainError> {
        let mut rows = self.rows.lock().await;
        if let Some(existing) = rows.get(&subscription.id) {
            if existing.status == SubscriptionStatus::Cancelled {
                return Ok(false);
            }
        }
        rows.insert(subscription.id.clone(), subscription.clone());
        Ok(true)
    }
}

#[derive(Default)]
pub struct InMemoryPaymentRepository {
    rows: Mutex<HashMap<String, Payment>>,
}

impl InMemoryPaymentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentRepository for InMemoryPaymentRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Payment>, DomainError> {
        Ok(self.rows.lock().await.get(id).cloned())
    }

    async fn upsert(&self, payment: &Payment) -> Result<bool, DomainError> {
        let mut rows = self.rows.lock().await;
        if let Some(existing) = rows.get(&payment.id) {
            if existing.status == PaymentStatus::Succeeded {
                return Ok(false);
            }
        }
        rows.insert(payment.id.clone(), payment.clone());
        Ok(true)
    }
}
