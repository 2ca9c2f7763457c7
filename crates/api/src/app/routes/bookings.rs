//! Paid enrollment through the payment processor.
//!
//! Checkout is a redirect: the processor hosts the payment page and calls
//! `/webhook-checkout` once paid. The callback is trusted only after its
//! signature verifies; a duplicate delivery is acknowledged without
//! creating a second enrollment.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};

use lms_enrollment::{Enrollment, EnrollmentSource};
use lms_infra::StoreError;
use lms_payments::{CheckoutMetadata, CheckoutRequest, WebhookEvent, price_in_cents};

use crate::app::dto::{CoursePath, PathIds};
use crate::app::errors::{ApiError, ApiResult};
use crate::app::services::AppServices;
use crate::authz;
use crate::middleware::Authenticated;

const SIGNATURE_HEADER: &str = "Stripe-Signature";
const CURRENCY: &str = "usd";

pub fn router() -> Router {
    Router::new()
        .route("/bookings/checkout-session/:course_id", post(checkout_session))
        .route("/webhook-checkout", post(webhook_checkout))
}

pub async fn checkout_session(
    Extension(services): Extension<Arc<AppServices>>,
    Authenticated(ctx): Authenticated,
    PathIds(path): PathIds<CoursePath>,
) -> ApiResult<Response> {
    let course = services
        .content
        .find_course(path.course_id)
        .await?
        .ok_or_else(|| ApiError::not_found("No course found with that ID"))?;
    authz::ensure_visible(&course, Some(ctx.principal()))?;

    let base = services.settings.public_base_url.trim_end_matches('/');
    let request = CheckoutRequest {
        metadata: CheckoutMetadata {
            user_id: ctx.principal().id,
            course_id: course.id,
        },
        customer_email: ctx.user().email.clone(),
        product_name: format!("{} Course", course.title),
        product_description: course
            .description
            .clone()
            .unwrap_or_else(|| "Access to full course content".to_string()),
        unit_amount: price_in_cents(course.price),
        currency: CURRENCY.to_string(),
        success_url: format!("{base}/courses/{}?alert=booking", course.id),
        cancel_url: format!("{base}/courses/{}", course.id),
    };

    let session = services.gateway.create_checkout_session(&request).await?;
    info!(
        session_id = %session.id,
        course_id = %course.id,
        user_id = %ctx.principal().id,
        amount = request.unit_amount,
        "checkout session created"
    );

    Ok((StatusCode::OK, Json(json!({ "status": "success", "session": session }))).into_response())
}

/// Processor callback. A verification failure is a 400 and nothing is
/// enrolled; once verified the answer is always `{received: true}`.
pub async fn webhook_checkout(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    services.webhooks.verify(&body, signature, Utc::now())?;

    let event = match WebhookEvent::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "verified webhook with unreadable payload");
            return Ok(received());
        }
    };
    info!(event_type = %event.event_type, event_id = ?event.id, "webhook received");

    let completed = match event.checkout_completed() {
        Ok(Some(completed)) => completed,
        Ok(None) => return Ok(received()),
        Err(e) => {
            warn!(error = %e, event_id = ?event.id, "completed checkout without a usable enrollment target");
            return Ok(received());
        }
    };

    let enrollment = Enrollment::new(
        completed.user_id,
        completed.course_id,
        EnrollmentSource::Checkout,
        Utc::now(),
    );
    match services.enrollments.enroll(enrollment).await {
        Ok(_) => info!(
            user_id = %completed.user_id,
            course_id = %completed.course_id,
            event_id = ?event.id,
            "enrolled from checkout"
        ),
        Err(StoreError::Conflict(_)) => info!(
            user_id = %completed.user_id,
            course_id = %completed.course_id,
            "checkout replay; already enrolled"
        ),
        Err(StoreError::NotFound(msg)) => {
            warn!(user_id = %completed.user_id, course_id = %completed.course_id, %msg, "checkout for missing user or course")
        }
        Err(e) => return Err(e.into()),
    }

    Ok(received())
}

fn received() -> Response {
    (StatusCode::OK, Json(json!({ "received": true }))).into_response()
}
