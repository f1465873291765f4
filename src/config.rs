//! Generator configuration (output location and naming of emitted C).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::Level;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Directory the header and source are written to.
    pub output_dir: PathBuf,
    /// File stem: `<stem>.h` and `<stem>.c`.
    pub file_stem: String,
    /// Prefix of every emitted symbol (`<prefix>_<Message>_T`, ...).
    pub symbol_prefix: String,
    /// Emit the identifier -> message demux switch.
    pub emit_demux: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            output_dir: PathBuf::from("."),
            file_stem: "Can_Library".to_string(),
            symbol_prefix: "Can".to_string(),
            emit_demux: true,
        }
    }
}

impl GeneratorConfig {
    /// Load configuration from a TOML file; missing keys take their defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn header_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.h", self.file_stem))
    }

    pub fn source_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.c", self.file_stem))
    }
}

/// Log level for a `-v` count: WARN by default, then INFO, then DEBUG.
pub fn log_level(verbose: u8) -> Level {
    match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_levels() {
        assert_eq!(log_level(0), Level::WARN);
        assert_eq!(log_level(1), Level::INFO);
        assert_eq!(log_level(2), Level::DEBUG);
        assert_eq!(log_level(9), Level::DEBUG);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: GeneratorConfig = toml::from_str("symbol_prefix = \"CANlib\"\n").unwrap();
        assert_eq!(cfg.symbol_prefix, "CANlib");
        assert_eq!(cfg.file_stem, "Can_Library");
        assert!(cfg.emit_demux);
    }

    #[test]
    fn toml_round_trip() {
        let cfg = GeneratorConfig {
            output_dir: PathBuf::from("out"),
            emit_demux: false,
            ..GeneratorConfig::default()
        };
        let text = cfg.to_toml().unwrap();
        let back: GeneratorConfig = toml::from_str(&text).unwrap();
        assert_eq!(back, cfg);
        assert_eq!(back.source_path(), PathBuf::from("out").join("Can_Library.c"));
    }
}
