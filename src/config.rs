use std::time::Duration;

use tracing::warn;

use crate::poll::PollPolicy;

/// Base URLs of the downstream services.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceEndpoints {
    /// Persistence, sharing, auth and the async room-job API.
    pub gateway: String,
    pub detect: String,
    pub segment: String,
    /// Design advice plus cost estimates, DIY guides and proposals.
    pub advise: String,
    pub generate: String,
    pub commerce: String,
}

impl Default for ServiceEndpoints {
    fn default() -> Self {
        Self {
            gateway: "http://localhost:8000".into(),
            detect: "http://localhost:8001".into(),
            segment: "http://localhost:8002".into(),
            advise: "http://localhost:8003".into(),
            generate: "http://localhost:8004".into(),
            commerce: "http://localhost:8005".into(),
        }
    }
}

impl ServiceEndpoints {
    /// Name/base-url pairs, in the order health checks report them.
    pub fn named(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("Gateway", self.gateway.as_str()),
            ("Detect", self.detect.as_str()),
            ("Segment", self.segment.as_str()),
            ("Advise", self.advise.as_str()),
            ("Generate", self.generate.as_str()),
            ("Commerce", self.commerce.as_str()),
        ]
    }
}

/// Runtime configuration, built once at startup and handed to whoever needs it.
#[derive(Debug, Clone)]
pub struct Config {
    pub endpoints: ServiceEndpoints,
    /// Upper bound for every call except generation.
    pub request_timeout: Duration,
    /// Upper bound for a single-pass generation; two-pass gets twice this.
    pub generation_timeout: Duration,
    pub health_timeout: Duration,
    /// Persist finished runs through the gateway.
    pub save_results: bool,
    pub poll: PollPolicy,
    /// Finished runs the server keeps around; the oldest go first.
    pub max_finished_runs: usize,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoints: ServiceEndpoints::default(),
            request_timeout: Duration::from_secs(60),
            generation_timeout: Duration::from_secs(120),
            health_timeout: Duration::from_secs(2),
            save_results: true,
            poll: PollPolicy::default(),
            max_finished_runs: 100,
            port: 8080,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` uses the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Config::default();
        let url = |key: &str, fallback: String| {
            lookup(key)
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(fallback)
        };
        let endpoints = ServiceEndpoints {
            gateway: url("ARTISTRY_GATEWAY_URL", defaults.endpoints.gateway),
            detect: url("ARTISTRY_DETECT_URL", defaults.endpoints.detect),
            segment: url("ARTISTRY_SEGMENT_URL", defaults.endpoints.segment),
            advise: url("ARTISTRY_ADVISE_URL", defaults.endpoints.advise),
            generate: url("ARTISTRY_GENERATE_URL", defaults.endpoints.generate),
            commerce: url("ARTISTRY_COMMERCE_URL", defaults.endpoints.commerce),
        };

        let secs = |key: &str, fallback: Duration| match lookup(key) {
            None => fallback,
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(n) if n > 0 => Duration::from_secs(n),
                _ => {
                    warn!(key, value = %raw, "ignoring invalid timeout, using default");
                    fallback
                }
            },
        };

        let save_results = match lookup("ARTISTRY_SAVE_RESULTS").as_deref().map(str::trim) {
            None => defaults.save_results,
            Some("1") | Some("true") | Some("yes") => true,
            Some("0") | Some("false") | Some("no") => false,
            Some(other) => {
                warn!(value = other, "ignoring invalid ARTISTRY_SAVE_RESULTS");
                defaults.save_results
            }
        };

        let port = match lookup("PORT") {
            None => defaults.port,
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                warn!(value = %raw, "ignoring invalid PORT");
                defaults.port
            }),
        };

        let max_finished_runs = match lookup("ARTISTRY_MAX_FINISHED_RUNS") {
            None => defaults.max_finished_runs,
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                warn!(value = %raw, "ignoring invalid ARTISTRY_MAX_FINISHED_RUNS");
                defaults.max_finished_runs
            }),
        };

        Self {
            endpoints,
            request_timeout: secs("ARTISTRY_REQUEST_TIMEOUT_SECS", defaults.request_timeout),
            generation_timeout: secs("ARTISTRY_GENERATION_TIMEOUT_SECS", defaults.generation_timeout),
            health_timeout: defaults.health_timeout,
            save_results,
            poll: defaults.poll,
            max_finished_runs,
            port,
        }
    }

    /// A config whose every service lives at `base` (test fixtures, single-host deployments).
    pub fn single_host(base: &str) -> Self {
        let base = base.trim_end_matches('/').to_string();
        Self {
            endpoints: ServiceEndpoints {
                gateway: base.clone(),
                detect: base.clone(),
                segment: base.clone(),
                advise: base.clone(),
                generate: base.clone(),
                commerce: base,
            },
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_point_at_local_ports() {
        let config = Config::from_lookup(|_| None);
        assert_eq!(config.endpoints, ServiceEndpoints::default());
        assert_eq!(config.port, 8080);
        assert!(config.save_results);
    }

    #[test]
    fn overrides_are_trimmed_and_validated() {
        let config = Config::from_lookup(lookup_from(&[
            ("ARTISTRY_GENERATE_URL", "http://gpu-box:9000/"),
            ("ARTISTRY_REQUEST_TIMEOUT_SECS", "15"),
            ("ARTISTRY_GENERATION_TIMEOUT_SECS", "soon"),
            ("ARTISTRY_SAVE_RESULTS", "false"),
            ("ARTISTRY_MAX_FINISHED_RUNS", "5"),
            ("PORT", "3000"),
        ]));
        assert_eq!(config.endpoints.generate, "http://gpu-box:9000");
        assert_eq!(config.request_timeout, Duration::from_secs(15));
        assert_eq!(config.generation_timeout, Duration::from_secs(120));
        assert!(!config.save_results);
        assert_eq!(config.max_finished_runs, 5);
        assert_eq!(config.port, 3000);
    }

    #[test]
    fn single_host_routes_everything_to_one_base() {
        let config = Config::single_host("http://127.0.0.1:4000/");
        assert!(config.endpoints.named().iter().all(|(_, url)| *url == "http://127.0.0.1:4000"));
    }
}
