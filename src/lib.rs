//! alertmanager compatible webhook receiver that forwards alert groups as html
//! email through a transactional mail provider
//!
//! Every request is handled on its own: authenticate, normalize the payload,
//! render the email and send it with a single call to the provider.

pub mod alert;
pub mod alert_renderer;
pub mod alertmanager_webhook_receiver;
pub mod auth;
pub mod error;
pub mod log;
pub mod mailer;
pub mod metrics;
pub mod normalizer;
pub mod settings;
pub mod telemetry_endpoint;
pub mod timestamp;
