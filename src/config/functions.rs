//! JSON loading and saving of [`TrainingConfig`]s.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{Error, TrainingConfig};

/// The versioned envelope a configuration is stored in.
#[derive(Serialize, Deserialize)]
#[serde(tag = "version", content = "config")]
enum PortableConfig {
    #[serde(rename = "1")]
    V1(TrainingConfig),
}

impl PortableConfig {
    fn into_latest(self) -> TrainingConfig {
        match self {
            Self::V1(config) => config,
        }
    }
}

/// Parses a configuration of any supported version and checks that it can be built.
pub(crate) fn load_str(s: &str) -> Result<TrainingConfig, Error> {
    let config = serde_json::from_str::<PortableConfig>(s)?.into_latest();
    config.validate()?;
    Ok(config)
}

pub(crate) fn load_file<P: AsRef<Path>>(path: P) -> Result<TrainingConfig, Error> {
    load_str(&fs::read_to_string(path)?)
}

/// Writes `config` as pretty JSON, tagged with the latest version.
pub(crate) fn to_string(config: &TrainingConfig) -> Result<String, Error> {
    let envelope = PortableConfig::V1(config.clone());
    Ok(serde_json::to_string_pretty(&envelope)?)
}

/// Writes [`to_string`]'s output to `path`. With `create_dirs`, missing parent directories are
/// created first.
pub(crate) fn to_file<P: AsRef<Path>>(
    config: &TrainingConfig,
    path: P,
    create_dirs: bool,
) -> Result<(), Error> {
    let path = path.as_ref();
    let json = to_string(config)?;

    match path.parent() {
        Some(dir) if create_dirs && !dir.as_os_str().is_empty() => fs::create_dir_all(dir)?,
        _ => {}
    }

    fs::write(path, json)?;
    Ok(())
}
