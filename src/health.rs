use reqwest::Client;
use serde::Serialize;
use serde_with::skip_serializing_none;
use tracing::{info, warn};

use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Online,
    Offline,
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceHealth {
    pub name: String,
    pub url: String,
    pub status: ServiceStatus,
    pub error: Option<String>,
}

async fn probe(client: &Client, name: &str, base: &str) -> ServiceHealth {
    let url = format!("{}/", base.trim_end_matches('/'));
    let (status, error) = match client.get(&url).send().await {
        Ok(resp) if resp.status().is_success() => (ServiceStatus::Online, None),
        Ok(resp) => (ServiceStatus::Offline, Some(format!("HTTP Error {}", resp.status().as_u16()))),
        Err(e) if e.is_timeout() => (ServiceStatus::Offline, Some("timed out".to_string())),
        Err(e) => (ServiceStatus::Offline, Some(e.to_string())),
    };
    if status == ServiceStatus::Offline {
        warn!("🔌 {} at {} is offline: {}", name, url, error.as_deref().unwrap_or_default());
    }
    ServiceHealth { name: name.to_string(), url, status, error }
}

/// Probe every configured service at once. Never fails; unreachable services
/// are reported as offline.
pub async fn check_services(config: &Config) -> Vec<ServiceHealth> {
    let client = match Client::builder().timeout(config.health_timeout).build() {
        Ok(client) => client,
        Err(e) => {
            warn!("⚠️ Could not build health client, using defaults: {}", e);
            Client::new()
        }
    };
    let named = config.endpoints.named();
    let checks = named.iter().map(|(name, base)| probe(&client, name, base));
    let report = futures::future::join_all(checks).await;
    let online = report.iter().filter(|h| h.status == ServiceStatus::Online).count();
    info!("🩺 {}/{} services online", online, report.len());
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceEndpoints;
    use axum::{routing::get, Router};
    use std::time::Duration;

    #[tokio::test]
    async fn reports_each_service_without_failing() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let live = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, Router::new().route("/", get(|| async { "ok" }))).await.unwrap();
        });

        // Nothing listens on port 9 locally.
        let dead = "http://127.0.0.1:9".to_string();
        let config = Config {
            endpoints: ServiceEndpoints {
                gateway: live.clone(),
                detect: dead.clone(),
                segment: live.clone(),
                advise: dead.clone(),
                generate: live.clone(),
                commerce: dead,
            },
            health_timeout: Duration::from_millis(500),
            ..Config::default()
        };

        let report = check_services(&config).await;

        let names: Vec<&str> = report.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["Gateway", "Detect", "Segment", "Advise", "Generate", "Commerce"]);
        assert_eq!(report[0].status, ServiceStatus::Online);
        assert_eq!(report[0].url, format!("{live}/"));
        assert!(report[0].error.is_none());
        assert_eq!(report[1].status, ServiceStatus::Offline);
        assert!(report[1].error.is_some());
    }
}
