//! Optional Sentry error tracking.
//!
//! The returned guard must live as long as the process so panics and
//! `error!` events raised during shutdown are still flushed. Admin keys
//! and client addresses are never attached to events.

pub fn init(dsn: &str, environment: Option<&str>) -> sentry::ClientInitGuard {
    let parsed_dsn = match dsn.parse() {
        Ok(d) => Some(d),
        Err(e) => {
            tracing::warn!(error = %e, "invalid Sentry DSN, error tracking disabled");
            None
        }
    };

    let guard = sentry::init(sentry::ClientOptions {
        dsn: parsed_dsn,
        environment: environment.map(|e| e.to_string().into()),
        release: Some(concat!("frontdoor@", env!("CARGO_PKG_VERSION")).into()),
        send_default_pii: false,
        ..Default::default()
    });

    if guard.is_enabled() {
        tracing::info!(environment = environment.unwrap_or("-"), "sentry error tracking enabled");
    }
    guard
}
