use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use lms_core::{CourseId, UserId};

use crate::PaymentError;

/// Price charged for a course that has none set.
pub const DEFAULT_PRICE: f64 = 10.0;

/// Whole-unit price to the processor's minor unit (cents).
pub fn price_in_cents(price: Option<f64>) -> i64 {
    let price = match price {
        Some(p) if p > 0.0 => p,
        _ => DEFAULT_PRICE,
    };
    (price * 100.0).round() as i64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutMetadata {
    pub user_id: UserId,
    pub course_id: CourseId,
}

/// Everything the processor needs to host a one-item checkout.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutRequest {
    pub metadata: CheckoutMetadata,
    pub customer_email: String,
    pub product_name: String,
    pub product_description: String,
    pub unit_amount: i64,
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
}

/// The subset of a hosted checkout session the API hands back to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub client_reference_id: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_or_zero_price_falls_back_to_default() {
        assert_eq!(price_in_cents(None), 1000);
        assert_eq!(price_in_cents(Some(0.0)), 1000);
        assert_eq!(price_in_cents(Some(49.99)), 4999);
    }

    #[test]
    fn metadata_uses_camel_case_keys() {
        let meta = CheckoutMetadata {
            user_id: UserId::new(),
            course_id: CourseId::new(),
        };
        let json = serde_json::to_value(meta).unwrap();
        assert_eq!(json["userId"], meta.user_id.to_string());
        assert_eq!(json["courseId"], meta.course_id.to_string());
    }
}
