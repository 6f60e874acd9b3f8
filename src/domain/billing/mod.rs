//! Billing domain - provider webhooks and the entities they drive.
//!
//! A webhook flows through this module as:
//!
//! 1. `webhook_verifier` - authenticity and freshness
//! 2. `webhook_event` - envelope parsing
//! 3. `event_kind` - classification into typed payloads
//! 4. `subscription` / `payment` - pure state transitions emitting `SideEffect`s

mod event_kind;
mod payment;
mod side_effect;
mod subscription;
mod webhook_errors;
mod webhook_event;
mod webhook_verifier;

pub use event_kind::{
    classify, Classified, CustomerRef, EventKind, PaymentPayload, SubscriptionPayload,
    PAYMENT_FAILED, PAYMENT_SUCCEEDED, SUBSCRIPTION_ACTIVE, SUBSCRIPTION_CANCELLED,
    SUBSCRIPTION_CREATED, SUBSCRIPTION_ON_HOLD, SUBSCRIPTION_RENEWED,
};
pub use payment::{apply_payment_event, Payment, PaymentStatus, PaymentTrigger};
pub use side_effect::{RevocationPolicy, SideEffect, Transition, TransitionContext};
pub use subscription::{
    apply_subscription_event, Subscription, SubscriptionStatus, SubscriptionTrigger,
};
pub use webhook_errors::WebhookError;
pub use webhook_event::WebhookEvent;
pub use webhook_verifier::{
    signature_header_value, verify, SignatureVerifier, WebhookHeaders, DEFAULT_TOLERANCE_SECS,
    WEBHOOK_ID_HEADER, WEBHOOK_SIGNATURE_HEADER, WEBHOOK_TIMESTAMP_HEADER,
};
