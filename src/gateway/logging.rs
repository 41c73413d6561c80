use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const MASK: &str = "********";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub token: String,
}

impl std::fmt::Debug for SinkConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinkConfig")
            .field("enabled", &self.enabled)
            .field("endpoint", &self.endpoint)
            .field("token", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub splunk: SinkConfig,
    pub datadog: SinkConfig,
    pub elasticsearch: SinkConfig,
}

impl LoggingConfig {
    fn any_sink_enabled(&self) -> bool {
        self.splunk.enabled || self.datadog.enabled || self.elasticsearch.enabled
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct LogRecord {
    pub timestamp: String,
    pub level: LogLevel,
    pub component: String,
    pub message: String,
    pub metadata: Map<String, Value>,
}

/// JSON-line logger: every record goes to stdout; enabled sinks receive a
/// fire-and-forget copy. DEBUG records are dropped unless verbose logging is
/// on. Values under any key containing `apikey` are masked before the record
/// exists anywhere.
pub struct Logger {
    config: RwLock<Arc<LoggingConfig>>,
    verbose: AtomicBool,
    http: reqwest::Client,
}

impl Logger {
    pub fn new(config: LoggingConfig, verbose: bool) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            config: RwLock::new(Arc::new(config)),
            verbose: AtomicBool::new(verbose),
            http,
        }
    }

    pub fn config(&self) -> Arc<LoggingConfig> {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_config(&self, config: LoggingConfig) {
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(config);
    }

    pub fn verbose(&self) -> bool {
        self.verbose.load(Ordering::Relaxed)
    }

    pub fn set_verbose(&self, verbose: bool) {
        self.verbose.store(verbose, Ordering::Relaxed);
    }

    /// `metadata` is expected to be a JSON object; anything else is wrapped
    /// under a `data` key.
    pub fn log(&self, level: LogLevel, component: &str, message: &str, metadata: Value) {
        if !self.should_log(level) {
            return;
        }

        let metadata = match metadata {
            Value::Object(map) => mask_metadata(map),
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("data".to_string(), other);
                mask_metadata(map)
            }
        };

        let record = LogRecord {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            level,
            component: component.to_string(),
            message: message.to_string(),
            metadata,
        };

        if let Ok(line) = serde_json::to_string(&record) {
            println!("{line}");
        }

        self.fan_out(&record);
    }

    fn should_log(&self, level: LogLevel) -> bool {
        level != LogLevel::Debug || self.verbose()
    }

    fn fan_out(&self, record: &LogRecord) {
        let config = self.config();
        if !config.any_sink_enabled() {
            return;
        }
        let Ok(payload) = serde_json::to_value(record) else {
            return;
        };

        if config.splunk.enabled {
            let request = self
                .http
                .post(&config.splunk.endpoint)
                .header(
                    "authorization",
                    format!("Splunk {}", config.splunk.token),
                )
                .json(&serde_json::json!({ "event": payload.clone(), "sourcetype": "hydra-gateway" }));
            tokio::spawn(async move {
                let _ = request.send().await;
            });
        }

        if config.datadog.enabled {
            let request = self
                .http
                .post(&config.datadog.endpoint)
                .header("dd-api-key", config.datadog.token.clone())
                .json(&serde_json::json!([payload.clone()]));
            tokio::spawn(async move {
                let _ = request.send().await;
            });
        }

        if config.elasticsearch.enabled {
            let mut request = self.http.post(&config.elasticsearch.endpoint);
            if !config.elasticsearch.token.is_empty() {
                request = request.header(
                    "authorization",
                    format!("ApiKey {}", config.elasticsearch.token),
                );
            }
            let request = request.json(&payload);
            tokio::spawn(async move {
                let _ = request.send().await;
            });
        }
    }
}

fn mask_metadata(mut metadata: Map<String, Value>) -> Map<String, Value> {
    for (key, value) in metadata.iter_mut() {
        mask_value(key, value);
    }
    metadata
}

fn mask_value(key: &str, value: &mut Value) {
    if key.to_lowercase().contains("apikey") {
        *value = Value::String(MASK.to_string());
        return;
    }
    match value {
        Value::Object(map) => {
            for (key, value) in map.iter_mut() {
                mask_value(key, value);
            }
        }
        Value::Array(items) => {
            for item in items {
                if let Value::Object(map) = item {
                    for (key, value) in map.iter_mut() {
                        mask_value(key, value);
                    }
                }
            }
        }
        _ => {}
    }
}
