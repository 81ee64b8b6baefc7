use crate::config::{
    CStandard, CppStandard, FilterConfiguration, FlagsConfiguration, LibraryConfiguration,
    OptimizationLevel,
};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// A target as written in `mmake.toml`.
///
/// The `[shared]` table uses the same shape, which is why every field is
/// optional here; required fields are checked once the shared part has been
/// merged in.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct TargetConfiguration {
    pub(crate) target: Option<String>,
    pub(crate) compiler: Option<CompilerKind>,
    pub(crate) libraries: Option<Vec<LibraryConfiguration>>,
    pub(crate) filter: Option<FilterConfiguration>,
    pub(crate) flags: Option<FlagsConfiguration>,
    pub(crate) suppressed_warnings: Option<Vec<String>>,
    pub(crate) c_standard: Option<CStandard>,
    pub(crate) cpp_standard: Option<CppStandard>,
    pub(crate) optimization: Option<OptimizationLevel>,
    pub(crate) enable_all_warnings: Option<bool>,
    pub(crate) treat_all_warnings_as_errors: Option<bool>,
}

impl TargetConfiguration {
    /// Fields set on `self` win, everything else comes from `shared`.
    pub(crate) fn merged_over(self, shared: &TargetConfiguration) -> TargetConfiguration {
        TargetConfiguration {
            target: self.target.or_else(|| shared.target.clone()),
            compiler: self.compiler.or(shared.compiler),
            libraries: self.libraries.or_else(|| shared.libraries.clone()),
            filter: self.filter.or_else(|| shared.filter.clone()),
            flags: self.flags.or_else(|| shared.flags.clone()),
            suppressed_warnings: self
                .suppressed_warnings
                .or_else(|| shared.suppressed_warnings.clone()),
            c_standard: self.c_standard.or(shared.c_standard),
            cpp_standard: self.cpp_standard.or(shared.cpp_standard),
            optimization: self.optimization.or(shared.optimization),
            enable_all_warnings: self.enable_all_warnings.or(shared.enable_all_warnings),
            treat_all_warnings_as_errors: self
                .treat_all_warnings_as_errors
                .or(shared.treat_all_warnings_as_errors),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) enum CompilerKind {
    Gcc,
    Clang,
    #[serde(alias = "emcc")]
    Emscripten,
}

impl CompilerKind {
    pub(crate) fn produces_webassembly(&self) -> bool {
        matches!(self, CompilerKind::Emscripten)
    }

    /// Executable names of the C driver, the C++ driver and the archiver, looked up in `PATH`.
    pub(crate) fn tool_names(&self) -> [&'static str; 3] {
        match self {
            CompilerKind::Gcc => ["gcc", "g++", "ar"],
            CompilerKind::Clang => ["clang", "clang++", "llvm-ar"],
            CompilerKind::Emscripten => ["emcc", "em++", "emar"],
        }
    }
}

impl Display for CompilerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CompilerKind::Gcc => "gcc",
            CompilerKind::Clang => "clang",
            CompilerKind::Emscripten => "emscripten",
        })
    }
}
