//! alertmanager webhook receiver that forwards alert groups as html email
//!
//! Features:
//! - renders every alert group into one email with a card per alert
//! - configurable tera template, escaping all payload content
//! - optional http basic authentication
//! - prometheus metrics about received webhooks and sent emails

use std::sync::Arc;

use alertmail::{
	alertmanager_webhook_receiver::{self, State},
	log,
	settings::Settings,
	telemetry_endpoint,
};
use anyhow::{Context, Result};
use prometheus::Registry;

/// exit the complete program if one thread panics
fn setup_panic_handler() {
	let default_panic = std::panic::take_hook();
	std::panic::set_hook(Box::new(move |info| {
		default_panic(info);
		std::process::exit(1);
	}));
}

/// the entry point of the program
#[tokio::main]
pub async fn main() -> Result<()> {
	setup_panic_handler();

	let settings = Settings::load().context("failed to load config and command line arguments")?;

	log::setup_logging(&settings.log).context("could not setup logging")?;

	let registry = Registry::new();
	let state = Arc::new(State::new(&settings, &registry).context("failed to set up request state")?);

	tokio::try_join!(
		alertmanager_webhook_receiver::run_alert_receiver(&settings.alert_webhook_receiver, state),
		telemetry_endpoint::run_telemetry_endpoint(&settings.telemetry_endpoint, registry),
	)?;

	Ok(())
}
