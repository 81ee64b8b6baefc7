use super::{Task, TaskContext};
use crate::{
    cache::{hash_arguments, hash_file, BuildCache, CacheError, SourceRecord, SourceState},
    config::Distribution,
    headers::{self, DepfileError},
    tools::{
        create_archiver, create_compiler, Archiver, CompilationSettings, Compiler,
        LinkingSettings, ToolError,
    },
    BuildConfigurationError, Library, PathExtension, Project, SourceFile, Target,
    MMAKE_HASHES_FILE,
};
use eyre::WrapErr;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    fs, io, iter,
    path::{Path, PathBuf},
};
use thiserror::Error;

const OBJECT_FILE_EXTENSION: &str = "o";
const DEPFILE_EXTENSION: &str = "d";
const OBJECTS_DIRECTORY: &str = "objects";

pub(crate) struct Build {}

/// Where one source's artifacts go and the command line that produces them.
struct SourcePlan<'a> {
    source: &'a SourceFile,
    source_file: PathBuf,
    object_file: PathBuf,
    depfile: PathBuf,
    arguments: String,
}

impl SourcePlan<'_> {
    fn state(&self) -> SourceState<'_> {
        SourceState {
            key: &self.source.path,
            source_file: &self.source_file,
            object_file: &self.object_file,
            depfile: &self.depfile,
            arguments: &self.arguments,
        }
    }
}

impl Build {
    pub(crate) fn new() -> Self {
        Self {}
    }

    /// Mirrors the source tree below the objects directory; `..` can't escape it.
    fn object_path(&self, object_directory: &Path, source: &SourceFile) -> PathBuf {
        object_directory.join(
            source
                .path
                .split('/')
                .map(|part| if part == ".." { "__" } else { part })
                .collect::<PathBuf>(),
        )
    }

    fn plan_sources<'a>(
        &self,
        project: &Project,
        target: &'a Target,
        compiler: &dyn Compiler,
        settings: &CompilationSettings<'_>,
        object_directory: &Path,
    ) -> Result<Vec<SourcePlan<'a>>, ProjectBuildError> {
        target
            .sources
            .iter()
            .map(|source| {
                let object_path = self.object_path(object_directory, source);
                let source_file = project.base_path.join(&source.path);
                let object_file = object_path.with_appended_extension(OBJECT_FILE_EXTENSION);
                let depfile = object_path.with_appended_extension(DEPFILE_EXTENSION);

                let command = compiler
                    .compile_command(
                        source.language,
                        &source_file,
                        &object_file,
                        &depfile,
                        settings,
                    )
                    .map_err(ProjectBuildError::ToolchainError)?;
                let arguments =
                    hash_arguments(iter::once(command.get_program()).chain(command.get_args()));

                Ok(SourcePlan {
                    source,
                    source_file,
                    object_file,
                    depfile,
                    arguments,
                })
            })
            .collect()
    }

    fn collect_sources_to_compile<'p, 'a>(
        &self,
        project: &Project,
        cache: &BuildCache,
        plans: &'p [SourcePlan<'a>],
    ) -> Vec<&'p SourcePlan<'a>> {
        plans
            .par_iter()
            .filter(|plan| {
                !cache.is_up_to_date(&project.configuration_hash, &project.base_path, &plan.state())
            })
            .collect::<Vec<_>>()
    }

    fn compile_sources(
        &self,
        project: &Project,
        compiler: &dyn Compiler,
        settings: &CompilationSettings<'_>,
        plans: &[&SourcePlan<'_>],
        verbose: bool,
    ) -> (HashMap<String, SourceRecord>, Vec<SourceFileBuildError>) {
        plans
            .par_iter()
            .fold(
                || (HashMap::new(), Vec::new()),
                |(mut records, mut errors), plan| {
                    println!("Compiling {}", plan.source.path);

                    match self.compile_source_file(project, compiler, settings, plan, verbose) {
                        Ok(record) => {
                            records.insert(plan.source.path.clone(), record);

                            println!("Compiled {}", plan.source.path);
                        }
                        Err(err) => errors.push(err),
                    }

                    (records, errors)
                },
            )
            .reduce(
                || (HashMap::new(), Vec::new()),
                |(mut records1, mut errors1), (records2, errors2)| {
                    records1.extend(records2);
                    errors1.extend(errors2);

                    (records1, errors1)
                },
            )
    }

    fn compile_source_file(
        &self,
        project: &Project,
        compiler: &dyn Compiler,
        settings: &CompilationSettings<'_>,
        plan: &SourcePlan<'_>,
        verbose: bool,
    ) -> Result<SourceRecord, SourceFileBuildError> {
        let path = &plan.source.path;

        if let Some(parent) = plan.object_file.parent() {
            fs::create_dir_all(parent).map_err(|error| {
                SourceFileBuildError::FailedToCreateDirectory {
                    path: path.clone(),
                    error,
                }
            })?;
        }

        compiler
            .compile_source_file(
                plan.source.language,
                &plan.source_file,
                &plan.object_file,
                &plan.depfile,
                settings,
                verbose,
            )
            .map_err(|error| SourceFileBuildError::FailedToCompile {
                path: path.clone(),
                error,
            })?;

        let hash = hash_file(&plan.source_file).map_err(|error| {
            SourceFileBuildError::FailedToHash {
                path: path.clone(),
                error,
            }
        })?;

        let depfile_content = fs::read_to_string(&plan.depfile).map_err(|error| {
            SourceFileBuildError::FailedToReadDepfile {
                path: path.clone(),
                error,
            }
        })?;
        let dependencies = headers::dependencies(&depfile_content, &plan.object_file)
            .map_err(|error| SourceFileBuildError::InvalidDepfile {
                path: path.clone(),
                error,
            })?;

        let dependencies = dependencies
            .into_iter()
            .filter(|dependency| {
                let dependency = project.base_path.join(dependency);

                dependency != plan.source_file && dependency != plan.object_file
            })
            .map(|dependency| {
                hash_file(&project.base_path.join(&dependency))
                    .map(|hash| (dependency.clone(), hash.to_hex().to_string()))
                    .map_err(|error| SourceFileBuildError::FailedToHash {
                        path: dependency,
                        error,
                    })
            })
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        Ok(SourceRecord {
            hash: hash.to_hex().to_string(),
            arguments: plan.arguments.clone(),
            dependencies,
        })
    }

    fn create_directories(&self, directories: &[&Path]) -> Result<(), io::Error> {
        for directory in directories {
            fs::create_dir_all(directory)?;
        }

        Ok(())
    }

    fn build_target(
        &self,
        context: &TaskContext,
        target: &Target,
        compiler: &dyn Compiler,
        archiver: Option<&dyn Archiver>,
    ) -> Result<(), ProjectBuildError> {
        let project = &context.project;
        let mode = context.mode;

        println!("Building {} [{} {}]", project.name, target.id, mode);

        let build_directory = project.build_directory(target, mode);
        let cache_directory = project.cache_directory(target, mode);
        let object_directory = build_directory.join(OBJECTS_DIRECTORY);

        self.create_directories(&[object_directory.as_path(), cache_directory.as_path()])
            .map_err(ProjectBuildError::FailedToCreateDirectories)?;

        let link_inputs = target
            .resolve_libraries(&project.base_path)
            .map_err(ProjectBuildError::InvalidLibrary)?;
        let flags = target.flags_for(mode);
        let warning_suppression_flags = target.warning_suppression_flags();
        let optimization = target.optimization_for(mode);

        let compilation_settings = CompilationSettings {
            c_standard: target.c_standard,
            cpp_standard: target.cpp_standard,
            optimization,
            mode_flags: mode.default_flags(),
            flags: &flags,
            warning_suppression_flags: &warning_suppression_flags,
            includes: &link_inputs.includes,
            enable_all_warnings: target.enable_all_warnings,
            treat_all_warnings_as_errors: target.treat_all_warnings_as_errors,
            working_directory: &project.base_path,
        };

        let plans = self.plan_sources(
            project,
            target,
            compiler,
            &compilation_settings,
            &object_directory,
        )?;

        if plans.is_empty() {
            return Err(ProjectBuildError::NothingToBuild(target.id.clone()));
        }

        let planned = plans
            .iter()
            .map(|plan| plan.source.path.as_str())
            .collect::<HashSet<_>>();

        let cache_path = cache_directory.join(MMAKE_HASHES_FILE);
        let cache = BuildCache::load(&cache_path);
        let sources_to_compile = self.collect_sources_to_compile(project, &cache, &plans);
        let output_file = project.output_path(target, mode);

        // a removed source still has its object in the previous output
        let output_is_current = output_file.is_file()
            && cache.output_contains_exactly(planned.iter().copied());

        if sources_to_compile.is_empty() && output_is_current {
            println!("Nothing to build for {}", target.id);

            return Ok(());
        }

        let (records, errors) = self.compile_sources(
            project,
            compiler,
            &compilation_settings,
            &sources_to_compile,
            context.verbose,
        );

        let compiled = sources_to_compile
            .iter()
            .map(|plan| plan.source.path.as_str())
            .collect::<HashSet<_>>();

        let BuildCache {
            sources: cached_sources,
            linked_sources,
            ..
        } = cache;

        let mut current_cache = BuildCache {
            configuration: Some(project.configuration_hash.to_hex().to_string()),
            sources: cached_sources
                .into_iter()
                .filter(|(source, _)| {
                    planned.contains(source.as_str()) && !compiled.contains(source.as_str())
                })
                .collect(),
            linked_sources,
        };

        current_cache.sources.extend(records);
        current_cache
            .save(&cache_path)
            .map_err(ProjectBuildError::FailedToSaveCache)?;

        if !errors.is_empty() {
            return Err(ProjectBuildError::CompilationError(errors));
        }

        let object_files = plans
            .iter()
            .map(|plan| plan.object_file.clone())
            .collect::<Vec<_>>();

        self.generate_output(
            context,
            target,
            compiler,
            archiver,
            &object_files,
            &output_file,
            &flags,
            &link_inputs.libraries,
        )?;

        current_cache.linked_sources = planned
            .iter()
            .map(|source| String::from(*source))
            .collect();
        current_cache
            .save(&cache_path)
            .map_err(ProjectBuildError::FailedToSaveCache)?;

        println!("Built {} [{} {}]", project.name, target.id, mode);

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn generate_output(
        &self,
        context: &TaskContext,
        target: &Target,
        compiler: &dyn Compiler,
        archiver: Option<&dyn Archiver>,
        object_files: &[PathBuf],
        output_file: &Path,
        flags: &[String],
        libraries: &[Library],
    ) -> Result<(), ProjectBuildError> {
        let project = &context.project;

        match project.distribution {
            Distribution::Executable => {
                let linking_settings = LinkingSettings {
                    optimization: target.optimization_for(context.mode),
                    flags,
                    libraries,
                    use_cpp_driver: target.uses_cpp(),
                    working_directory: &project.base_path,
                };

                if target.compiler.produces_webassembly() {
                    println!("Generating WebAssembly module");
                } else {
                    println!("Generating executable");
                }

                compiler
                    .link_object_files(
                        object_files,
                        output_file,
                        &linking_settings,
                        context.verbose,
                    )
                    .map_err(ProjectBuildError::LinkageError)?;

                println!("Generated {}", output_file.display());
            }
            Distribution::StaticLibrary => {
                let archiver = archiver.ok_or(ProjectBuildError::ToolchainError(
                    ToolError::NotFound {
                        tool: "archiver",
                        compiler: target.compiler,
                    },
                ))?;

                println!("Generating static library");

                // `ar rcs` keeps members of sources that no longer exist
                if output_file.is_file() {
                    fs::remove_file(output_file).map_err(ProjectBuildError::FailedToRemoveOutput)?;
                }

                archiver
                    .archive_object_files(object_files, output_file, context.verbose)
                    .map_err(ProjectBuildError::ArchivalError)?;

                println!("Generated {}", output_file.display());
            }
        }

        Ok(())
    }
}

impl Task for Build {
    fn id(&self) -> &'static str {
        "build"
    }

    fn dependencies(&self) -> &[&'static str] {
        &[]
    }

    fn on_execute(&mut self, context: &TaskContext) -> eyre::Result<()> {
        let toolchain_configuration = &context.toolchain_configuration;

        for target in context.selected_targets()? {
            let compiler = create_compiler(target.compiler, toolchain_configuration);
            let archiver = match context.project.distribution {
                Distribution::StaticLibrary => Some(
                    create_archiver(target.compiler, toolchain_configuration)
                        .wrap_err_with(|| format!("Cannot archive target {}", target.id))?,
                ),
                Distribution::Executable => None,
            };

            self.build_target(context, target, compiler.as_ref(), archiver.as_deref())
                .wrap_err_with(|| {
                    format!(
                        "Failed to build {} for target {}",
                        context.project.name, target.id
                    )
                })?;
        }

        Ok(())
    }
}

fn describe_errors(errors: &[SourceFileBuildError]) -> String {
    errors
        .iter()
        .map(|error| error.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Error, Debug)]
pub(crate) enum ProjectBuildError {
    #[error("failed to create build directories: {0}")]
    FailedToCreateDirectories(io::Error),
    #[error("failed to remove previous output: {0}")]
    FailedToRemoveOutput(io::Error),
    #[error("target {0} has no sources")]
    NothingToBuild(String),
    #[error("{0}")]
    InvalidLibrary(BuildConfigurationError),
    #[error("{0}")]
    ToolchainError(ToolError),
    #[error("failed to save hashes: {0}")]
    FailedToSaveCache(CacheError),
    #[error("failed to compile {} source file(s):\n{}", .0.len(), describe_errors(.0))]
    CompilationError(Vec<SourceFileBuildError>),
    #[error("failed to link: {0}")]
    LinkageError(ToolError),
    #[error("failed to archive: {0}")]
    ArchivalError(ToolError),
}

#[derive(Error, Debug)]
pub(crate) enum SourceFileBuildError {
    #[error("failed to create object directory for {path}: {error}")]
    FailedToCreateDirectory { path: String, error: io::Error },
    #[error("failed to compile {path}:\n{error}")]
    FailedToCompile { path: String, error: ToolError },
    #[error("failed to hash {path}: {error}")]
    FailedToHash { path: String, error: io::Error },
    #[error("failed to read depfile of {path}: {error}")]
    FailedToReadDepfile { path: String, error: io::Error },
    #[error("invalid depfile of {path}: {error}")]
    InvalidDepfile { path: String, error: DepfileError },
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::{ProductionMode, ToolchainConfiguration};
    use crate::{Language, BUILD_CONFIGURATION_FILE};
    use std::process::Command;
    use tempfile::TempDir;

    /// Stands in for a real compiler: records every compilation in a log,
    /// writes an object and a depfile naming only the source.
    struct ShellCompiler {
        log: PathBuf,
        fail: bool,
    }

    impl Compiler for ShellCompiler {
        fn compile_command(
            &self,
            _language: Language,
            source_file: &Path,
            output_file: &Path,
            depfile: &Path,
            _settings: &CompilationSettings<'_>,
        ) -> Result<Command, ToolError> {
            let script = if self.fail {
                r#"echo "error: $1" >&2; exit 1"#
            } else {
                r#"echo "$1" >> "$4" && echo object > "$2" && printf '%s: %s\n' "$2" "$1" > "$3""#
            };

            let mut command = Command::new("sh");

            command
                .arg("-c")
                .arg(script)
                .arg("sh")
                .arg(source_file)
                .arg(output_file)
                .arg(depfile)
                .arg(&self.log);

            Ok(command)
        }

        fn link_command(
            &self,
            object_files: &[PathBuf],
            output_file: &Path,
            _settings: &LinkingSettings<'_>,
        ) -> Result<Command, ToolError> {
            let mut command = Command::new("sh");

            command
                .arg("-c")
                .arg(r#"out="$1"; shift; cat "$@" > "$out""#)
                .arg("sh")
                .arg(output_file)
                .args(object_files);

            Ok(command)
        }
    }

    /// Appends to an existing archive the way `ar rcs` keeps old members.
    struct ShellArchiver {}

    impl Archiver for ShellArchiver {
        fn archive_command(
            &self,
            object_files: &[PathBuf],
            output_file: &Path,
        ) -> Result<Command, ToolError> {
            let mut command = Command::new("sh");

            command
                .arg("-c")
                .arg(r#"out="$1"; shift; cat "$@" >> "$out""#)
                .arg("sh")
                .arg(output_file)
                .args(object_files);

            Ok(command)
        }
    }

    fn open_context(directory: &Path) -> TaskContext {
        TaskContext {
            project: Project::open(directory).unwrap(),
            toolchain_configuration: ToolchainConfiguration::default(),
            mode: ProductionMode::Debug,
            target_ids: vec![],
            arguments: vec![],
            verbose: false,
        }
    }

    fn create_project(distribution: &str) -> (TempDir, TaskContext) {
        let directory = tempfile::tempdir().unwrap();

        fs::create_dir_all(directory.path().join("src")).unwrap();
        fs::write(directory.path().join("src/a.cpp"), "int main() {}\n").unwrap();
        fs::write(directory.path().join("src/b.c"), "int b;\n").unwrap();
        fs::write(
            directory.path().join(BUILD_CONFIGURATION_FILE),
            format!(
                "[project]\nname = \"demo\"\ndistribution = \"{distribution}\"\n\
                 [[targets]]\ntarget = \"native\"\ncompiler = \"gcc\"\n"
            ),
        )
        .unwrap();

        let context = open_context(directory.path());

        (directory, context)
    }

    fn shell_compiler(directory: &TempDir, fail: bool) -> ShellCompiler {
        ShellCompiler {
            log: directory.path().join("compilations.log"),
            fail,
        }
    }

    /// Every fake object is one line, so lines in an output count the objects in it.
    fn object_count(output_file: &Path) -> usize {
        fs::read_to_string(output_file).unwrap().lines().count()
    }

    fn compilations(log: &Path) -> Vec<String> {
        fs::read_to_string(log)
            .unwrap_or_default()
            .lines()
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_only_changed_sources_are_recompiled() {
        let (directory, context) = create_project("executable");
        let compiler = shell_compiler(&directory, false);
        let target = &context.project.targets[0];
        let build = Build::new();

        build.build_target(&context, target, &compiler, None).unwrap();

        assert_eq!(compilations(&compiler.log).len(), 2);
        assert!(context
            .project
            .output_path(target, ProductionMode::Debug)
            .is_file());

        build.build_target(&context, target, &compiler, None).unwrap();

        assert_eq!(compilations(&compiler.log).len(), 2);

        fs::write(directory.path().join("src/b.c"), "int b = 1;\n").unwrap();

        build.build_target(&context, target, &compiler, None).unwrap();

        let compilations = compilations(&compiler.log);

        assert_eq!(compilations.len(), 3);
        assert!(compilations[2].ends_with("src/b.c"));
    }

    #[test]
    fn test_relinks_when_output_is_missing() {
        let (directory, context) = create_project("executable");
        let compiler = shell_compiler(&directory, false);
        let target = &context.project.targets[0];
        let build = Build::new();
        let output_file = context.project.output_path(target, ProductionMode::Debug);

        build.build_target(&context, target, &compiler, None).unwrap();
        fs::remove_file(&output_file).unwrap();
        build.build_target(&context, target, &compiler, None).unwrap();

        assert!(output_file.is_file());
        assert_eq!(compilations(&compiler.log).len(), 2);
    }

    #[test]
    fn test_compilation_errors_are_collected() {
        let (directory, context) = create_project("executable");
        let compiler = shell_compiler(&directory, true);
        let target = &context.project.targets[0];

        let result = Build::new().build_target(&context, target, &compiler, None);

        match result {
            Err(ProjectBuildError::CompilationError(errors)) => {
                assert_eq!(errors.len(), 2);
                assert!(errors.iter().all(|error| matches!(
                    error,
                    SourceFileBuildError::FailedToCompile {
                        error: ToolError::Failed(stderr),
                        ..
                    } if stderr.starts_with("error: ")
                )));
            }
            other => panic!("unexpected result: {:?}", other),
        }

        let cache = BuildCache::load(
            &context
                .project
                .cache_directory(target, ProductionMode::Debug)
                .join(MMAKE_HASHES_FILE),
        );

        assert!(cache.sources.is_empty());
    }

    #[test]
    fn test_removed_source_is_dropped_from_the_executable() {
        let (directory, context) = create_project("executable");
        let compiler = shell_compiler(&directory, false);
        let build = Build::new();
        let output_file = context
            .project
            .output_path(&context.project.targets[0], ProductionMode::Debug);

        build
            .build_target(&context, &context.project.targets[0], &compiler, None)
            .unwrap();

        assert_eq!(object_count(&output_file), 2);

        fs::remove_file(directory.path().join("src/b.c")).unwrap();

        let context = open_context(directory.path());

        build
            .build_target(&context, &context.project.targets[0], &compiler, None)
            .unwrap();

        assert_eq!(object_count(&output_file), 1);
        assert_eq!(compilations(&compiler.log).len(), 2);
    }

    #[test]
    fn test_static_library_is_archived_from_scratch() {
        let (directory, context) = create_project("staticLibrary");
        let compiler = shell_compiler(&directory, false);
        let archiver = ShellArchiver {};
        let build = Build::new();
        let target = &context.project.targets[0];
        let output_file = context.project.output_path(target, ProductionMode::Debug);

        assert!(output_file.ends_with("libdemo.a"));

        build
            .build_target(&context, target, &compiler, Some(&archiver))
            .unwrap();

        assert_eq!(object_count(&output_file), 2);

        fs::write(directory.path().join("src/a.cpp"), "int main() { return 1; }\n").unwrap();

        build
            .build_target(&context, target, &compiler, Some(&archiver))
            .unwrap();

        assert_eq!(object_count(&output_file), 2);

        fs::remove_file(directory.path().join("src/b.c")).unwrap();

        let context = open_context(directory.path());

        build
            .build_target(&context, &context.project.targets[0], &compiler, Some(&archiver))
            .unwrap();

        assert_eq!(object_count(&output_file), 1);
    }

    #[test]
    fn test_static_library_needs_an_archiver() {
        let (directory, context) = create_project("staticLibrary");
        let compiler = shell_compiler(&directory, false);

        let result =
            Build::new().build_target(&context, &context.project.targets[0], &compiler, None);

        assert!(matches!(
            result,
            Err(ProjectBuildError::ToolchainError(ToolError::NotFound {
                tool: "archiver",
                ..
            }))
        ));
    }

    #[test]
    fn test_object_paths_stay_inside_the_objects_directory() {
        let source = SourceFile {
            path: String::from("../shared/util.cpp"),
            language: Language::Cpp,
        };

        assert_eq!(
            Build::new().object_path(Path::new("/build/objects"), &source),
            PathBuf::from("/build/objects/__/shared/util.cpp")
        );
    }
}
