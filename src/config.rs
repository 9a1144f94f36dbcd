use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VisError};

/// Image backend used for figures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Svg,
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Svg => "svg",
        }
    }
}

impl FromStr for ImageFormat {
    type Err = VisError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(ImageFormat::Png),
            "svg" => Ok(ImageFormat::Svg),
            other => Err(VisError::Config(format!("unknown image format '{}'", other))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VisConfig {
    /// Number of attributes to explain
    pub top_n: usize,
    /// Seed for the peak tie-break; the dump seed is used when unset
    pub rng_seed: Option<u64>,
    pub width: u32,
    /// Height of each panel; figures stack one panel per attribute
    pub panel_height: u32,
    pub format: ImageFormat,
    pub write_summary: bool,
}

impl Default for VisConfig {
    fn default() -> Self {
        Self {
            top_n: 3,
            rng_seed: None,
            width: 1200,
            panel_height: 300,
            format: ImageFormat::Png,
            write_summary: false,
        }
    }
}

impl VisConfig {
    /// Defaults overlaid with `TSVIS_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup("TSVIS_TOP_N") {
            config.top_n = parse_env("TSVIS_TOP_N", &raw)?;
        }
        if let Some(raw) = lookup("TSVIS_RNG_SEED") {
            config.rng_seed = Some(parse_env("TSVIS_RNG_SEED", &raw)?);
        }
        if let Some(raw) = lookup("TSVIS_WIDTH") {
            config.width = parse_env("TSVIS_WIDTH", &raw)?;
        }
        if let Some(raw) = lookup("TSVIS_PANEL_HEIGHT") {
            config.panel_height = parse_env("TSVIS_PANEL_HEIGHT", &raw)?;
        }
        if let Some(raw) = lookup("TSVIS_FORMAT") {
            config.format = raw.parse()?;
        }
        if let Some(raw) = lookup("TSVIS_SUMMARY") {
            config.write_summary = parse_flag("TSVIS_SUMMARY", &raw)?;
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.top_n == 0 {
            return Err(VisError::Config("top_n must be at least 1".to_string()));
        }
        if self.width == 0 || self.panel_height == 0 {
            return Err(VisError::Config(format!(
                "figure dimensions must be non-zero (width {}, panel height {})",
                self.width, self.panel_height
            )));
        }
        Ok(())
    }

    /// Seed for the random source, falling back to the producer's seed
    pub fn seed_or(&self, dump_seed: u64) -> u64 {
        self.rng_seed.unwrap_or(dump_seed)
    }
}

fn parse_env<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| VisError::Config(format!("{} has invalid value '{}'", key, raw)))
}

fn parse_flag(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(VisError::Config(format!("{} has invalid value '{}'", key, raw))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_vis_config_defaults() {
        let config = VisConfig::default();

        assert_eq!(config.top_n, 3);
        assert_eq!(config.rng_seed, None);
        assert_eq!(config.width, 1200);
        assert_eq!(config.panel_height, 300);
        assert_eq!(config.format, ImageFormat::Png);
        assert!(!config.write_summary);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn env_overrides_are_applied() {
        let config = VisConfig::from_lookup(lookup_from(&[
            ("TSVIS_TOP_N", "5"),
            ("TSVIS_RNG_SEED", "17"),
            ("TSVIS_FORMAT", "SVG"),
            ("TSVIS_SUMMARY", "1"),
        ]))
        .unwrap();

        assert_eq!(config.top_n, 5);
        assert_eq!(config.rng_seed, Some(17));
        assert_eq!(config.format, ImageFormat::Svg);
        assert!(config.write_summary);
        assert_eq!(config.seed_or(3), 17);
    }

    #[test]
    fn env_rejects_garbage() {
        let err = VisConfig::from_lookup(lookup_from(&[("TSVIS_TOP_N", "three")])).unwrap_err();
        assert!(matches!(err, VisError::Config(_)));

        let err = VisConfig::from_lookup(lookup_from(&[("TSVIS_FORMAT", "pdf")])).unwrap_err();
        assert!(format!("{}", err).contains("pdf"));
    }

    #[test]
    fn summary_flag_is_strict() {
        let err = VisConfig::from_lookup(lookup_from(&[("TSVIS_SUMMARY", "garbage")])).unwrap_err();
        assert!(matches!(err, VisError::Config(_)));
        assert!(format!("{}", err).contains("TSVIS_SUMMARY"));

        let config = VisConfig::from_lookup(lookup_from(&[("TSVIS_SUMMARY", "No")])).unwrap();
        assert!(!config.write_summary);
        let config = VisConfig::from_lookup(lookup_from(&[("TSVIS_SUMMARY", "TRUE")])).unwrap();
        assert!(config.write_summary);
    }

    #[test]
    fn zero_top_n_is_a_config_error() {
        let config = VisConfig {
            top_n: 0,
            ..VisConfig::default()
        };
        assert!(matches!(config.validate(), Err(VisError::Config(_))));
    }

    #[test]
    fn dump_seed_used_without_override() {
        assert_eq!(VisConfig::default().seed_or(42), 42);
    }
}
