//! `frontdoor health`: check the health of a running instance.
//!
//! Sends a `GET /_frontdoor/health` request to the specified URL and displays
//! the response as formatted text or raw JSON.

use http_body_util::BodyExt;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use crate::cli::HealthArgs;
use crate::error::FrontdoorError;
use crate::health::HealthResponse;
use crate::server::HEALTH_PATH;

pub async fn execute(args: HealthArgs) -> Result<(), FrontdoorError> {
    let url = format!("{}{HEALTH_PATH}", args.url.trim_end_matches('/'));
    let uri: hyper::Uri =
        url.parse().map_err(
            |e: hyper::http::uri::InvalidUri| FrontdoorError::UriParse {
                source: Box::new(e),
            },
        )?;

    let connector = hyper_util::client::legacy::connect::HttpConnector::new();
    let client = Client::builder(TokioExecutor::new()).build(connector);

    let req = hyper::Request::builder()
        .uri(uri)
        .body(http_body_util::Full::new(bytes::Bytes::new()))
        .map_err(|e| FrontdoorError::HttpRequest {
            source: Box::new(e),
        })?;

    let response = tokio::time::timeout(std::time::Duration::from_secs(10), client.request(req))
        .await
        .map_err(|_| FrontdoorError::HttpRequest {
            source: "health check timed out after 10s".into(),
        })?
        .map_err(|e| FrontdoorError::HttpRequest {
            source: Box::new(e),
        })?;

    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .map_err(|e| FrontdoorError::HttpRequest {
            source: Box::new(e),
        })?
        .to_bytes();

    if !status.is_success() {
        return Err(FrontdoorError::HealthCheckFailed(status));
    }

    if args.json {
        println!("{}", String::from_utf8_lossy(&body));
        return Ok(());
    }

    let body_str = String::from_utf8_lossy(&body);
    match serde_json::from_str::<HealthResponse>(&body_str) {
        Ok(health) => {
            let uptime = format_uptime(health.uptime_seconds);
            let mark = if health.config.missing_templates.is_empty() { "\u{2713}" } else { "!" };
            println!("{mark} frontdoor is {} ({})", health.status, args.url);
            println!("  version:        {} [{}]", health.version, health.build);
            println!("  uptime:         {uptime}");
            println!("  config source:  {}", health.config.source);
            println!("  config version: {}", health.config.version);
            println!("  upstream:       {}", health.config.upstream);
            println!(
                "  bundle:         {} routes, {} templates",
                health.config.routes, health.config.templates
            );
            println!(
                "  brands:         {} ({})",
                health.config.brands,
                health.config.brand_ids.join(", ")
            );
            if !health.config.missing_templates.is_empty() {
                println!("  missing pages:  {}", health.config.missing_templates.join(", "));
            }
            println!(
                "  requests:       {} rendered, {} forwarded, {} failed, {} rejected",
                health.stats.pages_rendered,
                health.stats.requests_forwarded,
                health.stats.requests_failed,
                health.stats.requests_rejected
            );
        }
        Err(e) => {
            eprintln!("Failed to parse health response: {e}");
            println!("{}", String::from_utf8_lossy(&body));
        }
    }

    Ok(())
}

fn format_uptime(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{hours}h {minutes}m {secs}s")
    } else if minutes > 0 {
        format!("{minutes}m {secs}s")
    } else {
        format!("{secs}s")
    }
}
