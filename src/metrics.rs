//! prometheus meters for the webhook receiver and the mailer

use std::fmt;

use prometheus::{
    exponential_buckets, histogram_opts, opts, Histogram, IntCounter, IntCounterVec, Registry,
};

#[derive(Clone)]
/// prometheus meters, registered in the registry served by the telemetry endpoint
pub struct Metrics {
    /// total number of deserialized webhooks
    pub(crate) received_webhooks: IntCounterVec,
    /// number of alerts contained in forwarded webhooks
    pub(crate) processed_alerts: IntCounter,
    /// webhooks acknowledged without sending an email
    pub(crate) ignored_webhooks: IntCounter,
    /// requests rejected by the auth guard
    pub(crate) rejected_auth: IntCounter,
    /// total number of send requests to the mail provider
    pub(crate) mail_requests: IntCounter,
    /// failed send requests
    pub(crate) mail_failures: IntCounterVec,
    /// time spent waiting for the mail provider
    pub(crate) mail_duration: Histogram,
}

impl Metrics {
    /// construct prometheus meters and register them in `registry`
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let received_webhooks = IntCounterVec::new(
            opts!("received_total", "total number of deserialized webhooks")
                .namespace("alertmail")
                .subsystem("webhook"),
            &["status"],
        )?;

        let processed_alerts = IntCounter::with_opts(
            opts!("alerts_processed_total", "number of alerts forwarded by email")
                .namespace("alertmail")
                .subsystem("webhook"),
        )?;

        let ignored_webhooks = IntCounter::with_opts(
            opts!("ignored_total", "webhooks without alerts")
                .namespace("alertmail")
                .subsystem("webhook"),
        )?;

        let rejected_auth = IntCounter::with_opts(
            opts!("unauthorized_total", "requests with missing or invalid credentials")
                .namespace("alertmail")
                .subsystem("webhook"),
        )?;

        let mail_requests = IntCounter::with_opts(
            opts!("requests_total", "total number of requests to the mail provider")
                .namespace("alertmail")
                .subsystem("mailer"),
        )?;

        let mail_failures = IntCounterVec::new(
            opts!("failures_total", "unsuccessful email dispatches")
                .namespace("alertmail")
                .subsystem("mailer"),
            &["reason", "status_code"],
        )?;

        let mail_duration = Histogram::with_opts(
            histogram_opts!(
                "request_duration_seconds",
                "total time of a mail provider request in seconds",
                exponential_buckets(0.01, 2., 12)?
            )
            .namespace("alertmail")
            .subsystem("mailer"),
        )?;

        registry.register(Box::new(received_webhooks.clone()))?;
        registry.register(Box::new(processed_alerts.clone()))?;
        registry.register(Box::new(ignored_webhooks.clone()))?;
        registry.register(Box::new(rejected_auth.clone()))?;
        registry.register(Box::new(mail_requests.clone()))?;
        registry.register(Box::new(mail_failures.clone()))?;
        registry.register(Box::new(mail_duration.clone()))?;

        Ok(Self {
            received_webhooks,
            processed_alerts,
            ignored_webhooks,
            rejected_auth,
            mail_requests,
            mail_failures,
            mail_duration,
        })
    }

    /// `status` is one of the bounded `FIRING`, `RESOLVED` or `OTHER` labels
    pub(crate) fn record_webhook(&self, status: &str) {
        self.received_webhooks.with_label_values(&[status]).inc();
    }

    /// counts failed dispatches, `status_code` is empty if the provider was never reached
    pub(crate) fn record_mail_failure(&self, reason: &str, status_code: Option<u16>) {
        let status_code = status_code.map(|code| code.to_string()).unwrap_or_default();
        self.mail_failures.with_label_values(&[reason, status_code.as_str()]).inc();
    }
}

impl fmt::Debug for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_in_separate_registries() {
        let first = Registry::new();
        let second = Registry::new();

        let metrics = Metrics::new(&first).unwrap();
        Metrics::new(&second).unwrap();

        metrics.record_webhook("FIRING");
        metrics.record_mail_failure("rejected", Some(400));
        metrics.record_mail_failure("no_recipients", None);

        assert_eq!(metrics.received_webhooks.with_label_values(&["FIRING"]).get(), 1);
        assert_eq!(metrics.mail_failures.with_label_values(&["rejected", "400"]).get(), 1);
        assert_eq!(metrics.mail_failures.with_label_values(&["no_recipients", ""]).get(), 1);
        assert!(first.gather().iter().any(|family| family.get_name() == "alertmail_webhook_received_total"));
    }

    #[test]
    fn double_registration_fails() {
        let registry = Registry::new();
        Metrics::new(&registry).unwrap();
        assert!(Metrics::new(&registry).is_err());
    }
}
