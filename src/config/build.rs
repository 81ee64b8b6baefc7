use crate::config::{ProjectConfiguration, TargetConfiguration};
use serde::{Deserialize, Serialize};

/// Root of `mmake.toml`.
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct BuildConfiguration {
    pub(crate) project: ProjectConfiguration,
    #[serde(default)]
    pub(crate) shared: TargetConfiguration,
    #[serde(default)]
    pub(crate) targets: Vec<TargetConfiguration>,
}

impl BuildConfiguration {
    pub(crate) fn from_toml(content: &str) -> Result<BuildConfiguration, toml::de::Error> {
        toml::from_str::<BuildConfiguration>(content)
    }

    /// Targets with the `[shared]` table spread underneath each of them.
    pub(crate) fn merged_targets(&self) -> Vec<TargetConfiguration> {
        self.targets
            .iter()
            .cloned()
            .map(|target| target.merged_over(&self.shared))
            .collect()
    }
}
