use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

use crate::analyzer::AnalyzerOptions;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub preview: PreviewConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PreviewConfig {
    /// Single-segment name accepted as the document content slot
    #[serde(default = "default_content_placeholder")]
    pub content_placeholder: String,
    /// Namespace whose paths are translation keys (`t.welcome.title`)
    #[serde(default = "default_translation_namespace")]
    pub translation_namespace: String,
    /// Example events synthesized for a digest step with no declared iterations
    #[serde(default = "default_digest_events")]
    pub default_digest_events: usize,
    /// Upper bound on example elements for any collection, declared or implied
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_suggest_payload_namespace")]
    pub suggest_payload_namespace: bool,
    /// Parsed templates kept by the evaluator
    #[serde(default = "default_template_cache_size")]
    pub template_cache_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Emit logs as JSON lines
    #[serde(default)]
    pub json: bool,
}

fn default_content_placeholder() -> String {
    crate::analyzer::CONTENT_PLACEHOLDER.to_string()
}

fn default_translation_namespace() -> String {
    "t".to_string()
}

fn default_digest_events() -> usize {
    3
}

fn default_max_iterations() -> usize {
    crate::mock::DEFAULT_MAX_ITERATIONS
}

fn default_suggest_payload_namespace() -> bool {
    true
}

fn default_template_cache_size() -> usize {
    256
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            // Start with default values
            .set_default("preview.content_placeholder", default_content_placeholder())?
            .set_default("preview.translation_namespace", default_translation_namespace())?
            .set_default("preview.default_digest_events", default_digest_events() as u64)?
            .set_default("preview.max_iterations", default_max_iterations() as u64)?
            .set_default("preview.suggest_payload_namespace", true)?
            .set_default("preview.template_cache_size", default_template_cache_size() as u64)?
            .set_default("telemetry.log_level", default_log_level())?
            .set_default("telemetry.json", false)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // PREVIEW__PREVIEW__DEFAULT_DIGEST_EVENTS, PREVIEW__TELEMETRY__LOG_LEVEL, etc.
            .add_source(
                Environment::with_prefix("PREVIEW")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }
}

impl PreviewConfig {
    /// Analyzer options carried by these settings
    pub fn analyzer_options(&self) -> AnalyzerOptions {
        AnalyzerOptions {
            content_placeholder: self.content_placeholder.clone(),
            translation_namespace: self.translation_namespace.clone(),
            suggest_payload_namespace: self.suggest_payload_namespace,
        }
    }
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            content_placeholder: default_content_placeholder(),
            translation_namespace: default_translation_namespace(),
            default_digest_events: default_digest_events(),
            max_iterations: default_max_iterations(),
            suggest_payload_namespace: default_suggest_payload_namespace(),
            template_cache_size: default_template_cache_size(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let preview = PreviewConfig::default();
        assert_eq!(preview.content_placeholder, "content");
        assert_eq!(preview.translation_namespace, "t");
        assert_eq!(preview.default_digest_events, 3);
        assert_eq!(preview.max_iterations, 50);
        assert!(preview.suggest_payload_namespace);

        let telemetry = TelemetryConfig::default();
        assert_eq!(telemetry.log_level, "info");
        assert!(!telemetry.json);
    }

    #[test]
    fn test_analyzer_options_follow_config() {
        let preview = PreviewConfig {
            translation_namespace: "i18n".to_string(),
            suggest_payload_namespace: false,
            ..PreviewConfig::default()
        };
        let options = preview.analyzer_options();
        assert_eq!(options.translation_namespace, "i18n");
        assert!(!options.suggest_payload_namespace);
        assert_eq!(options.content_placeholder, "content");
    }

    #[test]
    fn test_settings_load_with_defaults() {
        let settings = Settings::new().unwrap();
        assert!(settings.preview.template_cache_size > 0);
    }
}
