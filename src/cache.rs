use blake3::Hash;
use memmap2::MmapOptions;
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    ffi::OsStr,
    fs::{self, File},
    io,
    path::Path,
};
use thiserror::Error;

/// What was compiled last time for one target in one production mode.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BuildCache {
    pub(crate) configuration: Option<String>,
    #[serde(default)]
    pub(crate) sources: HashMap<String, SourceRecord>,
    /// Sources whose objects went into the current output.
    #[serde(default)]
    pub(crate) linked_sources: BTreeSet<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SourceRecord {
    pub(crate) hash: String,
    /// Fingerprint of the full compiler command line.
    pub(crate) arguments: String,
    /// Headers reported by the compiler, with their hashes.
    #[serde(default)]
    pub(crate) dependencies: BTreeMap<String, String>,
}

/// Paths needed to decide whether one source is up to date.
pub(crate) struct SourceState<'a> {
    pub(crate) key: &'a str,
    pub(crate) source_file: &'a Path,
    pub(crate) object_file: &'a Path,
    pub(crate) depfile: &'a Path,
    pub(crate) arguments: &'a str,
}

impl BuildCache {
    /// A missing or unreadable cache is an empty one, which rebuilds everything.
    pub(crate) fn load(path: &Path) -> BuildCache {
        fs::read_to_string(path)
            .ok()
            .and_then(|content| serde_json::from_str::<BuildCache>(&content).ok())
            .unwrap_or_default()
    }

    pub(crate) fn save(&self, path: &Path) -> Result<(), CacheError> {
        let content = serde_json::to_string_pretty(self)?;

        fs::write(path, content)?;

        Ok(())
    }

    pub(crate) fn output_contains_exactly<'a>(
        &self,
        sources: impl IntoIterator<Item = &'a str>,
    ) -> bool {
        self.linked_sources
            .iter()
            .map(String::as_str)
            .eq(sources.into_iter().collect::<BTreeSet<_>>())
    }

    pub(crate) fn has_configuration(&self, configuration_hash: &Hash) -> bool {
        self.configuration.as_deref() == Some(configuration_hash.to_hex().as_str())
    }

    /// `base_path` resolves relative header paths the compiler reported.
    pub(crate) fn is_up_to_date(
        &self,
        configuration_hash: &Hash,
        base_path: &Path,
        state: &SourceState<'_>,
    ) -> bool {
        if !self.has_configuration(configuration_hash) {
            return false;
        }

        let record = match self.sources.get(state.key) {
            Some(record) => record,
            None => return false,
        };

        if record.arguments != state.arguments {
            return false;
        }

        if !state.object_file.is_file() || !state.depfile.is_file() {
            return false;
        }

        if !file_matches(state.source_file, &record.hash) {
            return false;
        }

        record
            .dependencies
            .iter()
            .all(|(dependency, hash)| file_matches(&base_path.join(dependency), hash))
    }
}

fn file_matches(path: &Path, expected_hash: &str) -> bool {
    hash_file(path)
        .map(|hash| hash.to_hex().as_str() == expected_hash)
        .unwrap_or(false)
}

pub(crate) fn hash_file(path: &Path) -> Result<Hash, io::Error> {
    let file = File::open(path)?;

    if file.metadata()?.len() == 0 {
        return Ok(blake3::hash(&[]));
    }

    let file_content = unsafe { MmapOptions::new().map(&file)? };

    Ok(blake3::hash(&file_content))
}

pub(crate) fn hash_arguments<'a>(arguments: impl IntoIterator<Item = &'a OsStr>) -> String {
    let mut hasher = blake3::Hasher::new();

    for argument in arguments {
        hasher.update(argument.to_string_lossy().as_bytes());
        hasher.update(&[0]);
    }

    hasher.finalize().to_hex().to_string()
}

#[derive(Error, Debug)]
pub(crate) enum CacheError {
    #[error("failed to serialize cache: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("failed to write cache: {0}")]
    Io(#[from] io::Error),
}
