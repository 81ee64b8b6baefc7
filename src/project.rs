use crate::config::{
    BuildConfiguration, CStandard, CompilerKind, CppStandard, Distribution, FilterConfiguration,
    FlagsConfiguration, LibraryConfiguration, OptimizationLevel, ProductionMode,
    TargetConfiguration,
};
use crate::{PathExtension, BUILD_CONFIGURATION_FILE, MMAKE_BUILD_DIRECTORY, MMAKE_CACHE_DIRECTORY};
use blake3::Hash;
use glob::{glob, MatchOptions, Pattern};
use itertools::Itertools;
use lazy_static::lazy_static;
use pathdiff::diff_paths;
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

pub const NAME_PATTERN: &str = r"^[A-Za-z0-9_\-\.]+$";

lazy_static! {
    static ref NAME_REGEX: Regex = Regex::new(NAME_PATTERN).unwrap();
}

const EXECUTABLE_SUFFIX: &str = if cfg!(target_os = "windows") {
    ".exe"
} else {
    ""
};

const LIBRARY_FILE_EXTENSIONS: &[&str] = &["a", "so", "dylib", "lib", "dll", "bc"];

const PATTERN_MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum Language {
    C,
    Cpp,
}

impl Language {
    pub(crate) fn from_path(path: &Path) -> Option<Language> {
        match path.extension()?.to_str()? {
            "c" => Some(Language::C),
            "cc" | "cpp" | "cxx" | "c++" => Some(Language::Cpp),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct SourceFile {
    /// Relative to the project directory, `/`-separated.
    pub(crate) path: String,
    pub(crate) language: Language,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Library {
    /// Linked with `-l<name>`.
    System(String),
    /// Archive or shared object handed to the linker as is.
    File(PathBuf),
}

#[derive(Debug)]
pub(crate) struct Target {
    pub(crate) id: String,
    pub(crate) compiler: CompilerKind,
    pub(crate) sources: Vec<SourceFile>,
    /// As written; backtick commands run in [`Target::resolve_libraries`].
    pub(crate) libraries: Vec<LibraryConfiguration>,
    pub(crate) flags: FlagsConfiguration,
    pub(crate) suppressed_warnings: Vec<String>,
    pub(crate) c_standard: CStandard,
    pub(crate) cpp_standard: CppStandard,
    pub(crate) optimization: Option<OptimizationLevel>,
    pub(crate) enable_all_warnings: bool,
    pub(crate) treat_all_warnings_as_errors: bool,
}

/// Include directories and link inputs of a target after running its library commands.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct LinkInputs {
    pub(crate) includes: Vec<String>,
    pub(crate) libraries: Vec<Library>,
}

impl Target {
    pub(crate) fn resolve_libraries(
        &self,
        base_path: &Path,
    ) -> Result<LinkInputs, BuildConfigurationError> {
        let mut link_inputs = LinkInputs::default();

        for library in &self.libraries {
            let (include, binary) = resolve_library(base_path, library)?;

            link_inputs.includes.extend(include);
            link_inputs.libraries.extend(binary);
        }

        Ok(link_inputs)
    }

    pub(crate) fn flags_for(&self, mode: ProductionMode) -> Vec<String> {
        self.flags.for_mode(mode)
    }

    pub(crate) fn optimization_for(&self, mode: ProductionMode) -> OptimizationLevel {
        self.optimization
            .unwrap_or_else(|| mode.default_optimization())
    }

    pub(crate) fn warning_suppression_flags(&self) -> Vec<String> {
        self.suppressed_warnings
            .iter()
            .map(|warning| {
                if warning.starts_with("-Wno-") {
                    warning.clone()
                } else {
                    format!("-Wno-{}", warning.trim_start_matches("-W"))
                }
            })
            .collect()
    }

    pub(crate) fn uses_cpp(&self) -> bool {
        self.sources
            .iter()
            .any(|source| source.language == Language::Cpp)
    }
}

#[derive(Debug)]
pub(crate) struct Project {
    pub(crate) base_path: PathBuf,
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) distribution: Distribution,
    pub(crate) configuration_hash: Hash,
    pub(crate) targets: Vec<Target>,
}

impl Project {
    pub(crate) fn open(path: impl AsRef<Path>) -> Result<Project, ProjectOpenError> {
        let base_path = path.as_ref();

        let build_configuration_binary_content = fs::read(base_path.join(BUILD_CONFIGURATION_FILE))
            .map_err(ProjectOpenError::InvalidProjectPath)?;
        let build_configuration_content = String::from_utf8(build_configuration_binary_content)
            .map_err(|error| {
                BuildConfigurationError::SyntaxError(format!("mmake.toml is not UTF-8: {error}"))
            })?;

        Ok(Project::from_configuration(
            base_path,
            &build_configuration_content,
        )?)
    }

    pub(crate) fn from_configuration(
        base_path: &Path,
        build_configuration_content: &str,
    ) -> Result<Project, BuildConfigurationError> {
        let build_configuration = BuildConfiguration::from_toml(build_configuration_content)
            .map_err(|error| BuildConfigurationError::SyntaxError(error.to_string()))?;
        let configuration_hash = blake3::hash(build_configuration_content.as_bytes());

        if !NAME_REGEX.is_match(&build_configuration.project.name) {
            return Err(BuildConfigurationError::InvalidName(
                build_configuration.project.name,
            ));
        }

        if build_configuration.targets.is_empty() {
            return Err(BuildConfigurationError::NoTargets);
        }

        let sources = discover_sources(base_path, &build_configuration.project.sources)?;

        let mut seen_targets = HashSet::new();
        let targets = build_configuration
            .merged_targets()
            .into_iter()
            .enumerate()
            .map(|(index, target_configuration)| {
                let target = Target::resolve(index, target_configuration, &sources)?;

                if !seen_targets.insert(target.id.clone()) {
                    return Err(BuildConfigurationError::DuplicateTarget(target.id));
                }

                Ok(target)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Project {
            base_path: base_path.to_path_buf(),
            name: build_configuration.project.name,
            description: build_configuration.project.description,
            distribution: build_configuration.project.distribution,
            configuration_hash,
            targets,
        })
    }

    /// Targets named on the command line, or all of them when none was named.
    pub(crate) fn select_targets(&self, ids: &[String]) -> Result<Vec<&Target>, String> {
        if ids.is_empty() {
            return Ok(self.targets.iter().collect());
        }

        ids.iter()
            .unique()
            .map(|id| {
                self.targets
                    .iter()
                    .find(|target| &target.id == id)
                    .ok_or_else(|| id.clone())
            })
            .collect()
    }

    pub(crate) fn build_directory(&self, target: &Target, mode: ProductionMode) -> PathBuf {
        self.base_path
            .join(MMAKE_BUILD_DIRECTORY)
            .join(&target.id)
            .join(mode.name())
    }

    pub(crate) fn cache_directory(&self, target: &Target, mode: ProductionMode) -> PathBuf {
        self.base_path
            .join(MMAKE_CACHE_DIRECTORY)
            .join(&target.id)
            .join(mode.name())
    }

    pub(crate) fn output_path(&self, target: &Target, mode: ProductionMode) -> PathBuf {
        let build_directory = self.build_directory(target, mode);

        match self.distribution {
            Distribution::StaticLibrary => build_directory.join(format!("lib{}.a", self.name)),
            Distribution::Executable if target.compiler.produces_webassembly() => {
                build_directory.join(format!("{}.js", self.name))
            }
            Distribution::Executable => {
                build_directory.join(format!("{}{}", self.name, EXECUTABLE_SUFFIX))
            }
        }
    }
}

impl Target {
    fn resolve(
        index: usize,
        configuration: TargetConfiguration,
        sources: &[SourceFile],
    ) -> Result<Target, BuildConfigurationError> {
        let id = configuration
            .target
            .ok_or(BuildConfigurationError::MissingTargetName(index))?;

        if !NAME_REGEX.is_match(&id) {
            return Err(BuildConfigurationError::InvalidTargetName(id));
        }

        let compiler = configuration
            .compiler
            .ok_or_else(|| BuildConfigurationError::MissingCompiler(id.clone()))?;

        let sources = filter_sources(sources, &configuration.filter.unwrap_or_default())?;

        let libraries = configuration.libraries.unwrap_or_default();

        if libraries.iter().any(LibraryConfiguration::is_empty) {
            return Err(BuildConfigurationError::EmptyLibrary(id));
        }

        Ok(Target {
            sources,
            libraries,
            compiler,
            flags: configuration.flags.unwrap_or_default(),
            suppressed_warnings: configuration.suppressed_warnings.unwrap_or_default(),
            c_standard: configuration
                .c_standard
                .unwrap_or_else(CStandard::latest),
            cpp_standard: configuration
                .cpp_standard
                .unwrap_or_else(CppStandard::latest),
            optimization: configuration.optimization,
            enable_all_warnings: configuration.enable_all_warnings.unwrap_or(false),
            treat_all_warnings_as_errors: configuration
                .treat_all_warnings_as_errors
                .unwrap_or(false),
            id,
        })
    }
}

fn discover_sources(
    base_path: &Path,
    patterns: &[String],
) -> Result<Vec<SourceFile>, BuildConfigurationError> {
    let escaped_base_path = Pattern::escape(&base_path.to_string_lossy());

    patterns
        .iter()
        .map(|source| {
            let pattern = Path::new(&escaped_base_path).join(source);

            glob(&pattern.to_string_lossy())
                .map_err(|err| BuildConfigurationError::IncorrectWildcard(String::from(err.msg)))?
                .map(|path| {
                    path.map_err(|_| BuildConfigurationError::IncorrectSource(source.clone()))
                })
                .collect::<Result<Vec<_>, _>>()
        })
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .flatten()
        .filter(|path| path.is_file())
        .map(|path| {
            let relative_path = diff_paths(&path, base_path).unwrap_or(path);
            let source = relative_path.to_forward_slashes();

            match Language::from_path(&relative_path) {
                Some(language) => Ok(SourceFile {
                    path: source,
                    language,
                }),
                None => Err(BuildConfigurationError::UnsupportedSource(source)),
            }
        })
        .collect::<Result<Vec<_>, _>>()
        .map(|sources| sources.into_iter().unique().collect())
}

fn filter_sources(
    sources: &[SourceFile],
    filter: &FilterConfiguration,
) -> Result<Vec<SourceFile>, BuildConfigurationError> {
    let exclude_patterns = filter
        .exclude_patterns
        .iter()
        .map(|pattern| {
            Pattern::new(pattern)
                .map_err(|_| BuildConfigurationError::IncorrectFilter(pattern.clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(sources
        .iter()
        .filter(|source| {
            let parent_directory_name = Path::new(&source.path)
                .parent()
                .and_then(|parent| parent.file_name())
                .map(|name| name.to_string_lossy());

            let excluded_by_directory = parent_directory_name
                .map(|name| {
                    filter
                        .exclude_directories
                        .iter()
                        .any(|directory| *directory == name)
                })
                .unwrap_or(false);

            let excluded_by_pattern = exclude_patterns
                .iter()
                .any(|pattern| pattern.matches_with(&source.path, PATTERN_MATCH_OPTIONS));

            !excluded_by_directory && !excluded_by_pattern
        })
        .cloned()
        .collect())
}

fn resolve_library(
    base_path: &Path,
    library: &LibraryConfiguration,
) -> Result<(Option<String>, Option<Library>), BuildConfigurationError> {
    let include = library
        .include
        .as_deref()
        .map(|include| evaluate_value(base_path, include))
        .transpose()?
        .map(|include| {
            base_path
                .join(include)
                .to_string_lossy()
                .into_owned()
        });

    let binary = library
        .binary
        .as_deref()
        .map(|binary| evaluate_value(base_path, binary))
        .transpose()?
        .map(|binary| {
            if is_library_file(&binary) {
                Library::File(base_path.join(binary))
            } else {
                Library::System(binary)
            }
        });

    Ok((include, binary))
}

fn is_library_file(binary: &str) -> bool {
    let path = Path::new(binary);

    binary.contains(std::path::is_separator)
        || path
            .extension()
            .and_then(|extension| extension.to_str())
            .map(|extension| LIBRARY_FILE_EXTENSIONS.contains(&extension))
            .unwrap_or(false)
}

/// Values wrapped in backticks are shell commands, e.g. `` `llvm-config --includedir` ``.
fn evaluate_value(base_path: &Path, value: &str) -> Result<String, BuildConfigurationError> {
    let trimmed = value.trim();

    let command = match trimmed
        .strip_prefix('`')
        .and_then(|rest| rest.strip_suffix('`'))
    {
        Some(command) => command,
        None => return Ok(String::from(trimmed)),
    };

    let command_failed = |reason: String| BuildConfigurationError::LibraryCommandFailed {
        command: String::from(command),
        reason,
    };

    let mut shell = if cfg!(target_os = "windows") {
        let mut shell = Command::new("cmd");
        shell.arg("/C");
        shell
    } else {
        let mut shell = Command::new("sh");
        shell.arg("-c");
        shell
    };

    let output = shell
        .arg(command)
        .current_dir(if base_path.as_os_str().is_empty() {
            Path::new(".")
        } else {
            base_path
        })
        .output()
        .map_err(|error| command_failed(error.to_string()))?;

    if !output.status.success() {
        return Err(command_failed(
            String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        ));
    }

    let value = String::from_utf8_lossy(&output.stdout).trim().to_owned();

    if value.is_empty() {
        return Err(command_failed(String::from("command printed nothing")));
    }

    Ok(value)
}

#[derive(Error, Debug)]
pub(crate) enum ProjectOpenError {
    #[error("specified path doesn't contain mmake.toml")]
    InvalidProjectPath(#[source] io::Error),
    #[error("mmake.toml is invalid: {0}")]
    InvalidBuildConfiguration(#[from] BuildConfigurationError),
}

#[derive(Error, Debug)]
pub(crate) enum BuildConfigurationError {
    #[error("syntax error: {0}")]
    SyntaxError(String),
    #[error("invalid project name: {0}")]
    InvalidName(String),
    #[error("project declares no targets")]
    NoTargets,
    #[error("target #{0} has no name")]
    MissingTargetName(usize),
    #[error("invalid target name: {0}")]
    InvalidTargetName(String),
    #[error("target declared twice: {0}")]
    DuplicateTarget(String),
    #[error("target {0} doesn't select a compiler")]
    MissingCompiler(String),
    #[error("target {0} has a library with neither include nor binary")]
    EmptyLibrary(String),
    #[error("found incorrect wildcard: {0}")]
    IncorrectWildcard(String),
    #[error("found incorrect source: {0}")]
    IncorrectSource(String),
    #[error("not a C or C++ source: {0}")]
    UnsupportedSource(String),
    #[error("found incorrect filter: {0}")]
    IncorrectFilter(String),
    #[error("library command `{command}` failed: {reason}")]
    LibraryCommandFailed { command: String, reason: String },
}
