mod gcc;

use std::{
    io,
    path::{Path, PathBuf},
    process::Command,
};

pub(crate) use gcc::*;
use thiserror::Error;

use crate::config::{
    locate, CStandard, CompilerKind, CppStandard, OptimizationLevel, ToolchainConfiguration,
};
use crate::{Language, Library};

pub(crate) trait Archiver: Send + Sync {
    fn archive_command(
        &self,
        object_files: &[PathBuf],
        output_file: &Path,
    ) -> Result<Command, ToolError>;

    fn archive_object_files(
        &self,
        object_files: &[PathBuf],
        output_file: &Path,
        verbose: bool,
    ) -> Result<(), ToolError> {
        run_command(self.archive_command(object_files, output_file)?, verbose)
    }
}

/// Everything about compiling one source of a target except the file paths.
pub(crate) struct CompilationSettings<'a> {
    pub(crate) c_standard: CStandard,
    pub(crate) cpp_standard: CppStandard,
    pub(crate) optimization: OptimizationLevel,
    pub(crate) mode_flags: &'a [&'static str],
    pub(crate) flags: &'a [String],
    pub(crate) warning_suppression_flags: &'a [String],
    pub(crate) includes: &'a [String],
    pub(crate) enable_all_warnings: bool,
    pub(crate) treat_all_warnings_as_errors: bool,
    pub(crate) working_directory: &'a Path,
}

pub(crate) struct LinkingSettings<'a> {
    pub(crate) optimization: OptimizationLevel,
    pub(crate) flags: &'a [String],
    pub(crate) libraries: &'a [Library],
    pub(crate) use_cpp_driver: bool,
    pub(crate) working_directory: &'a Path,
}

pub(crate) trait Compiler: Send + Sync {
    fn compile_command(
        &self,
        language: Language,
        source_file: &Path,
        output_file: &Path,
        depfile: &Path,
        settings: &CompilationSettings<'_>,
    ) -> Result<Command, ToolError>;

    fn link_command(
        &self,
        object_files: &[PathBuf],
        output_file: &Path,
        settings: &LinkingSettings<'_>,
    ) -> Result<Command, ToolError>;

    fn compile_source_file(
        &self,
        language: Language,
        source_file: &Path,
        output_file: &Path,
        depfile: &Path,
        settings: &CompilationSettings<'_>,
        verbose: bool,
    ) -> Result<(), ToolError> {
        let command =
            self.compile_command(language, source_file, output_file, depfile, settings)?;

        run_command(command, verbose)
    }

    fn link_object_files(
        &self,
        object_files: &[PathBuf],
        output_file: &Path,
        settings: &LinkingSettings<'_>,
        verbose: bool,
    ) -> Result<(), ToolError> {
        run_command(
            self.link_command(object_files, output_file, settings)?,
            verbose,
        )
    }
}

/// Compiler front end for `kind`, preferring configured locations over `PATH`.
pub(crate) fn create_compiler(
    kind: CompilerKind,
    toolchain_configuration: &ToolchainConfiguration,
) -> Box<dyn Compiler> {
    let locations = toolchain_configuration.locations(kind);
    let [c_compiler, cpp_compiler, _] = kind.tool_names();

    Box::new(GccFlavorCompiler::new(
        kind,
        locations
            .c_compiler_location
            .clone()
            .or_else(|| locate(c_compiler)),
        locations
            .cpp_compiler_location
            .clone()
            .or_else(|| locate(cpp_compiler)),
    ))
}

pub(crate) fn create_archiver(
    kind: CompilerKind,
    toolchain_configuration: &ToolchainConfiguration,
) -> Result<Box<dyn Archiver>, ToolError> {
    let [_, _, archiver] = kind.tool_names();

    toolchain_configuration
        .locations(kind)
        .archiver_location
        .clone()
        .or_else(|| locate(archiver))
        .map(|location| {
            let archiver: Box<dyn Archiver> = Box::new(GccFlavorArchiver::new(location));

            archiver
        })
        .ok_or(ToolError::NotFound {
            tool: "archiver",
            compiler: kind,
        })
}

pub(crate) fn describe_command(command: &Command) -> String {
    std::iter::once(command.get_program())
        .chain(command.get_args())
        .map(|part| part.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

fn run_command(mut command: Command, verbose: bool) -> Result<(), ToolError> {
    if verbose {
        println!("{}", describe_command(&command));
    }

    let output = command.output().map_err(|source| ToolError::FailedToStart {
        program: command.get_program().to_string_lossy().into_owned(),
        source,
    })?;

    if output.status.success() {
        let warnings = String::from_utf8_lossy(&output.stderr);

        if !warnings.trim().is_empty() {
            eprint!("{warnings}");
        }

        Ok(())
    } else {
        Err(ToolError::Failed(
            String::from_utf8_lossy(&output.stderr).into_owned(),
        ))
    }
}

#[derive(Error, Debug)]
pub(crate) enum ToolError {
    #[error("{tool} not found for the {compiler} toolchain")]
    NotFound {
        tool: &'static str,
        compiler: CompilerKind,
    },
    #[error("failed to start {program}: {source}")]
    FailedToStart { program: String, source: io::Error },
    #[error("{0}")]
    Failed(String),
}
