use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct ProjectConfiguration {
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    #[serde(default)]
    pub(crate) distribution: Distribution,
    #[serde(default = "default_sources")]
    pub(crate) sources: Vec<String>,
}

fn default_sources() -> Vec<String> {
    ["src/**/*.c", "src/**/*.cc", "src/**/*.cpp", "src/**/*.cxx"]
        .iter()
        .map(|pattern| String::from(*pattern))
        .collect()
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) enum Distribution {
    #[default]
    Executable,
    StaticLibrary,
}
