use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{env, fs, net::SocketAddr, path::Path};
use tracing::{debug, info};

use crate::aggregate::Granularity;
use crate::load::{date_parser::DateParser, LoadOptions};
use crate::record::Field;
use crate::schema::Aliases;

/// Looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "crmdash.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatmapAxes {
    pub rows: Field,
    pub columns: Field,
}

impl Default for HeatmapAxes {
    fn default() -> Self {
        Self {
            rows: Field::Responsible,
            columns: Field::Stage,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub title: String,
    /// Worksheet to read; the first one when unset.
    pub sheet: Option<String>,
    /// Tried before the built-in timestamp formats.
    pub date_format: Option<String>,
    /// Delimiter for CSV input, a single character.
    pub csv_delimiter: char,
    pub aliases: Aliases,
    pub bind: SocketAddr,
    /// Rows shown in the page's data table.
    pub table_rows: usize,
    pub trend_granularity: Granularity,
    pub heatmap: HeatmapAxes,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            title: "Company Data Dashboard".into(),
            sheet: None,
            date_format: None,
            csv_delimiter: ',',
            aliases: Aliases::new(),
            bind: SocketAddr::from(([127, 0, 0, 1], 8501)),
            table_rows: 500,
            trend_granularity: Granularity::Day,
            heatmap: HeatmapAxes::default(),
        }
    }
}

impl Settings {
    /// Defaults, then the YAML file (explicit path, or `crmdash.yaml` if it
    /// exists), then `CRMDASH_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(p) => Self::from_file(p)?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        settings.apply_env(|k| env::var(k).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let settings: Settings = serde_yaml::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        info!(path = %path.display(), "loaded config");
        Ok(settings)
    }

    /// Overrides from the environment; `lookup` is `env::var` outside tests.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("CRMDASH_BIND") {
            self.bind = v
                .parse()
                .with_context(|| format!("CRMDASH_BIND: invalid address '{}'", v))?;
            debug!(bind = %self.bind, "bind from env");
        }
        if let Some(v) = lookup("CRMDASH_SHEET") {
            self.sheet = Some(v);
        }
        if let Some(v) = lookup("CRMDASH_DATE_FORMAT") {
            self.date_format = Some(v);
        }
        if let Some(v) = lookup("CRMDASH_TABLE_ROWS") {
            self.table_rows = v
                .parse()
                .with_context(|| format!("CRMDASH_TABLE_ROWS: not a number '{}'", v))?;
        }
        if let Some(v) = lookup("CRMDASH_TREND") {
            self.trend_granularity = v.parse().map_err(anyhow::Error::msg)?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if !self.csv_delimiter.is_ascii() {
            anyhow::bail!("csv_delimiter must be a single ASCII character");
        }
        if self.heatmap.rows.is_date() || self.heatmap.columns.is_date() {
            anyhow::bail!("heatmap axes must be categorical columns");
        }
        Ok(())
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            sheet: self.sheet.clone(),
            aliases: self.aliases.clone(),
            dates: DateParser::new(self.date_format.clone()),
            delimiter: Some(self.csv_delimiter as u8),
        }
    }
}
