use async_trait::async_trait;
use tracing::warn;
use uuid::Uuid;

use crate::{CheckoutRequest, CheckoutSession, PaymentError, PaymentGateway};

/// Gateway used when no processor key is configured.
///
/// Sessions are fabricated locally and point straight at the success URL;
/// no payment is taken and no webhook will follow.
#[derive(Debug, Default, Clone)]
pub struct OfflineGateway;

#[async_trait]
impl PaymentGateway for OfflineGateway {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        warn!(course_id = %request.metadata.course_id, "offline payment gateway: no charge will be made");
        Ok(CheckoutSession {
            id: format!("cs_offline_{}", Uuid::now_v7().simple()),
            url: Some(request.success_url.clone()),
            amount_total: Some(request.unit_amount),
            currency: Some(request.currency.clone()),
            customer_email: Some(request.customer_email.clone()),
            client_reference_id: Some(request.metadata.course_id.to_string()),
            metadata: serde_json::to_value(request.metadata).unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use lms_core::{CourseId, UserId};

    use super::*;
    use crate::CheckoutMetadata;

    #[tokio::test]
    async fn offline_session_echoes_request() {
        let request = CheckoutRequest {
            metadata: CheckoutMetadata {
                user_id: UserId::new(),
                course_id: CourseId::new(),
            },
            customer_email: "s@lms.io".into(),
            product_name: "Course".into(),
            product_description: "d".into(),
            unit_amount: 2500,
            currency: "usd".into(),
            success_url: "http://localhost/courses/x?alert=booking".into(),
            cancel_url: "http://localhost/courses/x".into(),
        };
        let session = OfflineGateway.create_checkout_session(&request).await.unwrap();
        assert!(session.id.starts_with("cs_offline_"));
        assert_eq!(session.amount_total, Some(2500));
        assert_eq!(session.metadata["userId"], request.metadata.user_id.to_string());
    }
}
