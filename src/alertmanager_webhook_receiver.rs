//! http endpoint receiving alert groups and forwarding them by email
use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, Extension, Json},
    http::HeaderMap,
    routing::post,
    Router,
};
use prometheus::Registry;
use serde::Deserialize;

use crate::{
    alert::WebhookPayload,
    alert_renderer::AlertRenderer,
    auth::AuthGuard,
    error::{Acknowledgement, AlertError},
    mailer::Mailer,
    metrics::Metrics,
    normalizer::{AlertStatus, NormalizedAlert},
    settings::{self, Settings},
};

#[derive(Debug, Deserialize, Clone)]
pub struct AlertReceiverSettings {
    #[serde(default = "settings::default_bind_address")]
    pub bind_address: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    8000
}

impl Default for AlertReceiverSettings {
    fn default() -> Self {
        Self { bind_address: settings::default_bind_address(), port: default_port() }
    }
}

impl AlertReceiverSettings {
    pub fn to_socket_addr(&self) -> SocketAddr {
        settings::socket_addr(self.bind_address, self.port)
    }
}

/// everything a request needs, built once at startup and shared read-only
#[derive(Debug)]
pub struct State {
    renderer: AlertRenderer,
    mailer: Mailer,
    auth: Option<AuthGuard>,
    subject_prefix: String,
    metrics: Metrics,
}

impl State {
    pub fn new(settings: &Settings, registry: &Registry) -> Result<Self> {
        let metrics = Metrics::new(registry).context("failed to register metrics")?;

        let renderer = AlertRenderer::new(settings.template.as_deref())
            .context("failed to construct alert renderer")?;

        let mailer = Mailer::new(&settings.mailer, metrics.clone())
            .context("failed to construct mailer")?;

        let auth = settings.auth.credentials().map(AuthGuard::new);
        if auth.is_none() {
            tracing::warn!("no credentials configured, webhook endpoint accepts unauthenticated requests");
        }

        Ok(Self {
            renderer,
            mailer,
            auth,
            subject_prefix: settings.mailer.subject_prefix.clone(),
            metrics,
        })
    }

    /// Authenticates, normalizes, renders and sends one alert group.
    async fn process(
        &self,
        headers: &HeaderMap,
        payload: Result<Json<WebhookPayload>, JsonRejection>,
    ) -> Result<Acknowledgement, AlertError> {
        if let Some(guard) = &self.auth {
            guard.check(headers).map_err(|err| {
                self.metrics.rejected_auth.inc();
                err
            })?;
        }

        let Json(payload) = payload.map_err(|err| AlertError::Validation(err.to_string()))?;

        let status = AlertStatus::parse(payload.status.as_deref());
        self.metrics.record_webhook(status.metric_label());
        tracing::debug!("received {status} webhook with {} alerts", payload.alerts.len());

        let alert = match NormalizedAlert::from_payload(&payload, &self.subject_prefix) {
            Ok(alert) => alert,
            Err(AlertError::EmptyPayload) => {
                self.metrics.ignored_webhooks.inc();
                tracing::debug!("ignoring webhook without alerts");
                return Ok(Acknowledgement::empty_payload());
            }
            Err(err) => return Err(err),
        };

        let html = self.renderer.render(&alert)?;
        self.mailer.send(&alert.subject, &html).await?;

        let items = alert.items.len();
        self.metrics.processed_alerts.inc_by(items as u64);
        tracing::info!(
            "sent {:?} to {} recipients ({items} alerts)",
            alert.subject,
            self.mailer.recipients().len()
        );

        Ok(Acknowledgement::delivered(items))
    }
}

async fn alert_receiver(
    Extension(state): Extension<Arc<State>>,
    headers: HeaderMap,
    payload: Result<Json<WebhookPayload>, JsonRejection>,
) -> Result<Json<Acknowledgement>, AlertError> {
    state.process(&headers, payload).await.map(Json)
}

pub fn router(state: Arc<State>) -> Router {
    Router::new().route("/alert", post(alert_receiver)).layer(Extension(state))
}

pub async fn run_alert_receiver(settings: &AlertReceiverSettings, state: Arc<State>) -> Result<()> {
    let addr = settings.to_socket_addr();
    tracing::info!("listening for alert webhooks on {addr}");

    axum::Server::try_bind(&addr)
        .with_context(|| format!("could not bind webhook receiver to {addr}"))?
        .serve(router(state).into_make_service())
        .await
        .context("alert webhook endpoint crashed")?;

    Ok(())
}
