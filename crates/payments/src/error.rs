use thiserror::Error;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payment processor request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("payment processor rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
}

/// Reasons a webhook callback is refused or ignored. Verification failures
/// map to 400; `Payload` only arises after the signature has verified.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WebhookError {
    #[error("missing signature header")]
    MissingSignature,

    #[error("unable to extract timestamp and signatures from header")]
    MalformedHeader,

    #[error("no signatures found matching the expected signature for payload")]
    SignatureMismatch,

    #[error("timestamp outside the tolerance zone")]
    TimestampOutsideTolerance,

    #[error("webhook secret is unusable")]
    InvalidSecret,

    #[error("invalid event payload: {0}")]
    Payload(String),
}
