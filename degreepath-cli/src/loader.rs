//! Reads an area specification, a transcript, area pointers, and
//! exceptions from YAML or JSON files and hands them to
//! `degreepath-core`. Loading is this binary's concern, not the core's.

use std::fs;
use std::path::Path;

use degreepath_core::{AreaPointer, AreaSpec, Exception, ExceptionSet, SpecificationError, Transcript};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse {path} as YAML: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("could not parse {path} as JSON: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Specification(#[from] SpecificationError),
}

fn read_to_string(path: &Path) -> Result<String, LoadError> {
    fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Parses `path` as YAML if its extension is `.yaml`/`.yml`, JSON
/// otherwise.
fn parse<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, LoadError> {
    let contents = read_to_string(path)?;
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    if is_yaml {
        serde_yaml::from_str(&contents).map_err(|source| LoadError::Yaml {
            path: path.display().to_string(),
            source,
        })
    } else {
        serde_json::from_str(&contents).map_err(|source| LoadError::Json {
            path: path.display().to_string(),
            source,
        })
    }
}

/// Loads and validates an area specification, compiling any declared
/// emphases into synthetic named requirements before running
/// `AreaSpec::validate`.
pub fn load_area(path: &Path) -> Result<AreaSpec, LoadError> {
    let mut area: AreaSpec = parse(path)?;
    area.compile_emphases();
    area.validate()?;
    Ok(area)
}

pub fn load_transcript(path: &Path) -> Result<Transcript, LoadError> {
    parse(path)
}

pub fn load_area_pointers(path: &Path) -> Result<Vec<AreaPointer>, LoadError> {
    parse(path)
}

pub fn load_exceptions(path: &Path) -> Result<ExceptionSet, LoadError> {
    let exceptions: Vec<Exception> = parse(path)?;
    Ok(ExceptionSet::new(exceptions))
}
