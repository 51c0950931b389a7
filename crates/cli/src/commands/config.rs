use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use claimscope_core::config::{resolve_config_path, AppConfig, LoadOptions};
use toml::Value;

struct FieldSources<'a> {
    options: &'a LoadOptions,
    file_doc: Option<Value>,
    file_path: Option<PathBuf>,
}

impl FieldSources<'_> {
    fn source(&self, key_path: &str, env_keys: &[&str], overridden: bool) -> String {
        if overridden {
            return format!("override (--{})", override_flag(key_path));
        }

        for env_key in env_keys {
            if env::var_os(env_key).is_some() {
                return format!("env ({env_key})");
            }
        }

        if let Some(doc) = self.file_doc.as_ref() {
            if contains_path(doc, key_path) {
                let file_path = self
                    .file_path
                    .as_ref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "config file".to_string());
                return format!("file ({file_path})");
            }
        }

        "default".to_string()
    }

    fn line(&self, key_path: &str, value: &str, env_keys: &[&str]) -> String {
        let overrides = &self.options.overrides;
        let overridden = match key_path {
            "database.url" => overrides.database_url.is_some(),
            "pricing.region_id" => overrides.region_id.is_some(),
            "logging.level" => overrides.log_level.is_some(),
            "logging.format" => overrides.log_format.is_some(),
            _ => false,
        };
        render_line(key_path, value, self.source(key_path, env_keys, overridden))
    }
}

pub fn run(options: &LoadOptions) -> String {
    let config = match AppConfig::load(options.clone()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let file_path = resolve_config_path(options.config_path.as_deref());
    let sources = FieldSources {
        options,
        file_doc: load_config_file_doc(file_path.as_deref()),
        file_path,
    };

    let mut lines =
        vec!["effective config (source precedence: override > env > file > default):".to_string()];

    lines.push(sources.line("database.url", &config.database.url, &["CLAIMSCOPE_DATABASE_URL"]));
    lines.push(sources.line(
        "database.max_connections",
        &config.database.max_connections.to_string(),
        &["CLAIMSCOPE_DATABASE_MAX_CONNECTIONS"],
    ));
    lines.push(sources.line(
        "database.timeout_secs",
        &config.database.timeout_secs.to_string(),
        &["CLAIMSCOPE_DATABASE_TIMEOUT_SECS"],
    ));

    lines.push(sources.line(
        "pricing.region_id",
        &config.pricing.region_id,
        &["CLAIMSCOPE_PRICING_REGION_ID"],
    ));
    lines.push(sources.line(
        "pricing.tax_rate",
        &config.pricing.tax_rate.to_string(),
        &["CLAIMSCOPE_PRICING_TAX_RATE"],
    ));
    lines.push(sources.line(
        "pricing.overhead_pct",
        &config.pricing.overhead_pct.to_string(),
        &["CLAIMSCOPE_PRICING_OVERHEAD_PCT"],
    ));
    lines.push(sources.line(
        "pricing.profit_pct",
        &config.pricing.profit_pct.to_string(),
        &["CLAIMSCOPE_PRICING_PROFIT_PCT"],
    ));

    lines.push(sources.line(
        "export.labor_ratio",
        &config.export.labor_ratio.to_string(),
        &["CLAIMSCOPE_EXPORT_LABOR_RATIO"],
    ));
    lines.push(sources.line(
        "export.labor_ratio_floor",
        &config.export.labor_ratio_floor.to_string(),
        &[],
    ));
    lines.push(sources.line(
        "export.labor_ratio_ceiling",
        &config.export.labor_ratio_ceiling.to_string(),
        &[],
    ));
    lines.push(sources.line(
        "export.acv_ratio",
        &config.export.acv_ratio.to_string(),
        &["CLAIMSCOPE_EXPORT_ACV_RATIO"],
    ));
    lines.push(sources.line(
        "export.tax_rate",
        &config.export.tax_rate.to_string(),
        &["CLAIMSCOPE_EXPORT_TAX_RATE"],
    ));
    lines.push(sources.line(
        "export.labor_rate_per_hour",
        &config.export.labor_rate_per_hour.to_string(),
        &["CLAIMSCOPE_EXPORT_LABOR_RATE_PER_HOUR"],
    ));
    lines.push(sources.line(
        "export.carrier_id",
        &config.export.carrier_id,
        &["CLAIMSCOPE_EXPORT_CARRIER_ID"],
    ));
    lines.push(sources.line(
        "export.carrier_name",
        &config.export.carrier_name,
        &["CLAIMSCOPE_EXPORT_CARRIER_NAME"],
    ));
    lines.push(sources.line("export.price_list", &config.export.price_list, &[]));
    lines.push(sources.line(
        "export.adjuster_name",
        &config.export.adjuster_name,
        &["CLAIMSCOPE_EXPORT_ADJUSTER_NAME"],
    ));

    lines.push(sources.line(
        "logging.level",
        &config.logging.level,
        &["CLAIMSCOPE_LOGGING_LEVEL", "CLAIMSCOPE_LOG_LEVEL"],
    ));
    lines.push(sources.line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        &["CLAIMSCOPE_LOGGING_FORMAT", "CLAIMSCOPE_LOG_FORMAT"],
    ));

    lines.join("\n")
}

fn override_flag(key_path: &str) -> &'static str {
    match key_path {
        "database.url" => "database-url",
        "pricing.region_id" => "region",
        "logging.level" => "log-level",
        _ => "log-format",
    }
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
