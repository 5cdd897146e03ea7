//! Loading definition maps from configuration files.
//!
//! Definitions are plain serde data, so any self-describing format works.
//! JSON is always available; YAML needs the `yaml` feature.

use std::io::Read;
use std::path::Path;

use tracing::debug;

use crate::definition::DefinitionMap;
use crate::error::{DiError, DiResult};

/// Configuration formats understood by [`from_path`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    #[cfg(feature = "yaml")]
    Yaml,
}

impl Format {
    /// Picks a format from a file extension.
    pub fn from_extension(extension: &str) -> Option<Format> {
        match extension.to_ascii_lowercase().as_str() {
            "json" => Some(Format::Json),
            #[cfg(feature = "yaml")]
            "yaml" | "yml" => Some(Format::Yaml),
            _ => None,
        }
    }
}

/// Parses a JSON definition map.
///
/// # Examples
///
/// ```
/// use rewire::config;
/// use rewire::definition::RawDefinition;
///
/// let definitions = config::from_json_str(r#"{
///     "app": { "db": "db" },
///     "db": "Postgres.connect#reconnect"
/// }"#).unwrap();
///
/// assert_eq!(definitions.len(), 2);
/// assert_eq!(definitions["db"], RawDefinition::from("Postgres.connect#reconnect"));
/// ```
pub fn from_json_str(source: &str) -> DiResult<DefinitionMap> {
    Ok(serde_json::from_str(source)?)
}

/// Parses a JSON definition map from a reader.
pub fn from_json_reader<R: Read>(reader: R) -> DiResult<DefinitionMap> {
    Ok(serde_json::from_reader(reader)?)
}

/// Parses a YAML definition map.
#[cfg(feature = "yaml")]
pub fn from_yaml_str(source: &str) -> DiResult<DefinitionMap> {
    Ok(serde_yaml::from_str(source)?)
}

/// Parses a YAML definition map from a reader.
#[cfg(feature = "yaml")]
pub fn from_yaml_reader<R: Read>(reader: R) -> DiResult<DefinitionMap> {
    Ok(serde_yaml::from_reader(reader)?)
}

/// Reads a definition map from a file, choosing the format by extension.
pub fn from_path(path: impl AsRef<Path>) -> DiResult<DefinitionMap> {
    let path = path.as_ref();
    let format = path
        .extension()
        .and_then(|extension| extension.to_str())
        .and_then(Format::from_extension)
        .ok_or_else(|| DiError::Config(format!("unsupported config file: {}", path.display())))?;
    let file = std::fs::File::open(path)
        .map_err(|e| DiError::Config(format!("{}: {e}", path.display())))?;
    let reader = std::io::BufReader::new(file);

    let definitions = match format {
        Format::Json => from_json_reader(reader)?,
        #[cfg(feature = "yaml")]
        Format::Yaml => from_yaml_reader(reader)?,
    };
    debug!(path = %path.display(), definitions = definitions.len(), "definitions loaded");
    Ok(definitions)
}
