use crate::config::CompilerKind;
use serde::{Deserialize, Serialize};

/// Per-machine tool locations, kept next to the mmake executable.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ToolchainConfiguration {
    pub(crate) node_location: Option<String>,
    #[serde(default)]
    pub(crate) gcc: ToolLocations,
    #[serde(default)]
    pub(crate) clang: ToolLocations,
    #[serde(default)]
    pub(crate) emscripten: ToolLocations,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ToolLocations {
    pub(crate) c_compiler_location: Option<String>,
    pub(crate) cpp_compiler_location: Option<String>,
    pub(crate) archiver_location: Option<String>,
}

impl ToolchainConfiguration {
    /// Looks every known tool up in `PATH`. Missing tools stay unset.
    pub(crate) fn detect() -> ToolchainConfiguration {
        let mut clang = ToolLocations::detect(CompilerKind::Clang);

        if clang.archiver_location.is_none() {
            clang.archiver_location = locate("ar");
        }

        ToolchainConfiguration {
            node_location: locate("node"),
            gcc: ToolLocations::detect(CompilerKind::Gcc),
            clang,
            emscripten: ToolLocations::detect(CompilerKind::Emscripten),
        }
    }

    pub(crate) fn node_location(&self) -> Option<String> {
        self.node_location.clone().or_else(|| locate("node"))
    }

    pub(crate) fn locations(&self, compiler: CompilerKind) -> &ToolLocations {
        match compiler {
            CompilerKind::Gcc => &self.gcc,
            CompilerKind::Clang => &self.clang,
            CompilerKind::Emscripten => &self.emscripten,
        }
    }
}

impl ToolLocations {
    fn detect(compiler: CompilerKind) -> ToolLocations {
        let [c_compiler, cpp_compiler, archiver] = compiler.tool_names();

        ToolLocations {
            c_compiler_location: locate(c_compiler),
            cpp_compiler_location: locate(cpp_compiler),
            archiver_location: locate(archiver),
        }
    }
}

pub(crate) fn locate(name: &str) -> Option<String> {
    which::which(name)
        .ok()
        .map(|path| path.to_string_lossy().into_owned())
}
