use serde::{Deserialize, Serialize};

/// Source paths to leave out of a target's compilation set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct FilterConfiguration {
    /// Names matched against the immediate parent directory of a source.
    #[serde(default)]
    pub(crate) exclude_directories: Vec<String>,
    /// Globs matched against the project-relative source path.
    #[serde(default)]
    pub(crate) exclude_patterns: Vec<String>,
}
