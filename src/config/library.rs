use serde::{Deserialize, Serialize};

/// One entry of a target's `libraries` list.
///
/// Either half may be omitted, but not both. A value wrapped in backticks is a
/// shell command whose output is the actual value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct LibraryConfiguration {
    pub(crate) include: Option<String>,
    pub(crate) binary: Option<String>,
}

impl LibraryConfiguration {
    pub(crate) fn is_empty(&self) -> bool {
        self.include.is_none() && self.binary.is_none()
    }
}
