use crate::application::session::SessionSettings;
use crate::domain::sizing::{GridOptions, SizingRules, VisualizationSizing};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    pub api: ApiSettings,
    #[serde(default)]
    pub grid: GridOptions,
    #[serde(default)]
    pub persistence: PersistenceSettings,
    /// Sizing hints keyed by visualization type, e.g. `counter`. Keys are
    /// matched against the upper-case type names.
    #[serde(default)]
    pub visualizations: HashMap<String, VisualizationSizing>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiSettings {
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    /// Delay between polls of a running query job.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    500
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PersistenceSettings {
    pub layout_debounce_ms: u64,
    pub dashboard_update_debounce_ms: u64,
}

impl Default for PersistenceSettings {
    fn default() -> Self {
        Self {
            layout_debounce_ms: 2000,
            dashboard_update_debounce_ms: 300,
        }
    }
}

impl EngineConfig {
    pub fn sizing_rules(&self) -> SizingRules {
        let visualizations = self
            .visualizations
            .iter()
            .map(|(kind, sizing)| (kind.to_uppercase(), sizing.clone()))
            .collect();
        SizingRules::new(self.grid.clone(), visualizations)
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            rules: self.sizing_rules(),
            layout_debounce: Duration::from_millis(self.persistence.layout_debounce_ms),
            dashboard_update_debounce: Duration::from_millis(self.persistence.dashboard_update_debounce_ms),
        }
    }
}

/// Load `config/engine.toml`, overridden by `DASHBOARD__*` environment
/// variables (`DASHBOARD__API__API_KEY=...`).
pub fn load_engine_config() -> anyhow::Result<EngineConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/engine").required(false))
        .add_source(config::Environment::with_prefix("DASHBOARD").separator("__"))
        .build()?;

    Ok(settings.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{Config, File, FileFormat};

    fn parse(toml: &str) -> EngineConfig {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults_fill_missing_sections() {
        let config = parse(
            r#"
            [api]
            base_url = "http://localhost:5000"
            "#,
        );
        assert_eq!(config.grid.columns, 6);
        assert_eq!(config.grid.row_height, 50);
        assert_eq!(config.api.poll_interval_ms, 500);

        let settings = config.session_settings();
        assert_eq!(settings.layout_debounce, Duration::from_millis(2000));
        assert_eq!(settings.dashboard_update_debounce, Duration::from_millis(300));
    }

    #[test]
    fn test_visualization_hints_reach_sizing_rules() {
        let config = parse(
            r#"
            [api]
            base_url = "http://localhost:5000"
            api_key = "secret"

            [grid]
            row_height = 40

            [persistence]
            layout_debounce_ms = 500

            [visualizations.counter]
            auto_height = true
            min_rows = 5
            "#,
        );
        assert_eq!(config.grid.row_height, 40);
        assert_eq!(config.grid.margins, 15);
        assert_eq!(config.persistence.dashboard_update_debounce_ms, 300);

        let rules = config.sizing_rules();
        let position = rules.defaults_for(Some("COUNTER"));
        assert!(position.auto_height);
        assert_eq!(position.min_size_y, 5);
        assert_eq!(
            config.session_settings().layout_debounce,
            Duration::from_millis(500)
        );
    }
}
