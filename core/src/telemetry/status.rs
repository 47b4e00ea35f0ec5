use crate::prelude::{WaterfallError, WaterfallResult};
use crate::scan::Detection;
use crate::telemetry::metrics::MetricsSnapshot;
use reqwest::blocking::Client;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// JSON document pushed to the status endpoint after each cycle.
///
/// Frequencies use the engine's reporting unit (MHz by default).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSummary {
    pub timestamp: f64,
    pub bucket: Option<String>,
    pub freq_min: f64,
    pub freq_max: f64,
    pub detections: Vec<Detection>,
    pub metrics: MetricsSnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_vars: Option<BTreeMap<String, String>>,
}

pub trait StatusReporter {
    fn report(&mut self, summary: &StatusSummary) -> WaterfallResult<()>;
}

/// Posts summaries as JSON over HTTP(S).
pub struct HttpStatusReporter {
    client: Client,
    endpoint: Url,
}

impl HttpStatusReporter {
    pub fn new(endpoint: &str) -> WaterfallResult<Self> {
        let endpoint = Url::parse(endpoint).map_err(|err| {
            WaterfallError::Configuration(format!("invalid api endpoint {:?}: {}", endpoint, err))
        })?;
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|err| WaterfallError::Status(err.to_string()))?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }
}

impl StatusReporter for HttpStatusReporter {
    fn report(&mut self, summary: &StatusSummary) -> WaterfallResult<()> {
        self.client
            .post(self.endpoint.clone())
            .json(summary)
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(|err| WaterfallError::Status(format!("{}: {}", self.endpoint, err)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> StatusSummary {
        StatusSummary {
            timestamp: 1.0,
            bucket: Some("2026-10-19/1792368000".into()),
            freq_min: 1.0,
            freq_max: 2.0,
            detections: vec![Detection::new(1.0, 1.5, 1.52, -10.0, "narrowband")],
            metrics: MetricsSnapshot::default(),
            config_vars: None,
        }
    }

    #[test]
    fn invalid_endpoint_is_a_configuration_error() {
        assert!(matches!(
            HttpStatusReporter::new("not a url"),
            Err(WaterfallError::Configuration(_))
        ));
    }

    #[test]
    fn unreachable_endpoint_reports_status_error() {
        let mut reporter = HttpStatusReporter::new("http://127.0.0.1:9/status").unwrap();
        assert!(matches!(
            reporter.report(&summary()),
            Err(WaterfallError::Status(_))
        ));
    }

    #[test]
    fn summary_serializes_without_empty_config_vars() {
        let json = serde_json::to_value(summary()).unwrap();
        assert!(json.get("config_vars").is_none());
        assert_eq!(json["detections"][0]["detector_type"], "narrowband");
    }
}
