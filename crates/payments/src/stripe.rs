//! Stripe-compatible hosted checkout over the REST API.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::{CheckoutRequest, CheckoutSession, PaymentError, PaymentGateway};

pub const DEFAULT_API_BASE: &str = "https://api.stripe.com";

pub struct StripeGateway {
    client: reqwest::Client,
    api_base: String,
    secret_key: String,
}

impl StripeGateway {
    pub fn new(secret_key: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.into(),
            secret_key: secret_key.into(),
        }
    }

    fn form(request: &CheckoutRequest) -> Vec<(&'static str, String)> {
        vec![
            ("mode", "payment".to_string()),
            ("payment_method_types[0]", "card".to_string()),
            ("success_url", request.success_url.clone()),
            ("cancel_url", request.cancel_url.clone()),
            ("customer_email", request.customer_email.clone()),
            ("client_reference_id", request.metadata.course_id.to_string()),
            ("metadata[userId]", request.metadata.user_id.to_string()),
            ("metadata[courseId]", request.metadata.course_id.to_string()),
            ("line_items[0][quantity]", "1".to_string()),
            ("line_items[0][price_data][currency]", request.currency.clone()),
            ("line_items[0][price_data][unit_amount]", request.unit_amount.to_string()),
            ("line_items[0][price_data][product_data][name]", request.product_name.clone()),
            (
                "line_items[0][price_data][product_data][description]",
                request.product_description.clone(),
            ),
        ]
    }
}

impl std::fmt::Debug for StripeGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeGateway")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let url = format!("{}/v1/checkout/sessions", self.api_base.trim_end_matches('/'));
        debug!(course_id = %request.metadata.course_id, "creating checkout session");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .form(&Self::form(request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PaymentError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let session: CheckoutSession = response.json().await?;
        info!(session_id = %session.id, course_id = %request.metadata.course_id, "checkout session created");
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use lms_core::{CourseId, UserId};

    use super::*;
    use crate::CheckoutMetadata;

    #[test]
    fn form_carries_metadata_and_reference() {
        let request = CheckoutRequest {
            metadata: CheckoutMetadata {
                user_id: UserId::new(),
                course_id: CourseId::new(),
            },
            customer_email: "a@b.io".into(),
            product_name: "Rust Course".into(),
            product_description: "Access to full course content".into(),
            unit_amount: 1000,
            currency: "usd".into(),
            success_url: "http://x/courses/1?alert=booking".into(),
            cancel_url: "http://x/courses/1".into(),
        };
        let form = StripeGateway::form(&request);
        let get = |k: &str| form.iter().find(|(key, _)| *key == k).map(|(_, v)| v.clone());
        assert_eq!(get("client_reference_id"), Some(request.metadata.course_id.to_string()));
        assert_eq!(get("metadata[userId]"), Some(request.metadata.user_id.to_string()));
        assert_eq!(get("line_items[0][price_data][unit_amount]"), Some("1000".into()));
        assert_eq!(get("mode"), Some("payment".into()));
    }

    #[test]
    fn debug_hides_secret() {
        let gw = StripeGateway::new("sk_test_secret", DEFAULT_API_BASE);
        assert!(!format!("{gw:?}").contains("sk_test_secret"));
    }
}
