mod cache;
mod config;
mod extensions;
mod headers;
mod project;
mod task;
mod tools;

pub(crate) use extensions::*;
pub(crate) use project::*;
pub(crate) use task::*;

use clap::{Arg, ArgAction, Command};
use config::{ProductionMode, ToolchainConfiguration};
use eyre::{eyre, WrapErr};
use itertools::Itertools;
use std::{
    collections::{HashMap, VecDeque},
    env,
    fs::{self, File},
    io::Write,
    path::PathBuf,
    process,
};

pub const BUILD_CONFIGURATION_FILE: &str = "mmake.toml";
pub const MMAKE_DIRECTORY: &str = ".mmake";
pub const MMAKE_BUILD_DIRECTORY: &str = ".mmake/build";
pub const MMAKE_CACHE_DIRECTORY: &str = ".mmake/cache";
pub const MMAKE_HASHES_FILE: &str = "hashes.json";

const TOOLCHAIN_CONFIGURATION_VARIABLE: &str = "MMAKE_TOOLCHAIN_CONFIGURATION";

fn main() -> eyre::Result<()> {
    let toolchain_configuration = deserialize_toolchain_configuration()
        .wrap_err("Failed to deserialize toolchain configuration")?;

    let mut tasks: HashMap<&str, Box<dyn Task>> = HashMap::new();

    tasks.insert("build", Box::new(Build::new()));
    tasks.insert("run", Box::new(Run::new()));
    tasks.insert("clean", Box::new(Clean::new()));
    tasks.insert("targets", Box::new(Targets::new()));

    let matches = Command::new("mmake")
        .version("0.1")
        .about("Build system for C/C++ projects targeting native code and WebAssembly")
        .subcommand_required(true)
        .arg(
            Arg::new("release")
                .long("release")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Build with release flags"),
        )
        .arg(
            Arg::new("target")
                .long("target")
                .short('t')
                .global(true)
                .action(ArgAction::Append)
                .value_name("ID")
                .help("Only work on this target (repeatable)"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Print every tool command line"),
        )
        .subcommand(Command::new("build").about("Compile and link the selected targets"))
        .subcommand(
            Command::new("run")
                .about("Build and run the first selected target")
                .arg(
                    Arg::new("arguments")
                        .num_args(0..)
                        .last(true)
                        .help("Arguments passed to the program"),
                ),
        )
        .subcommand(Command::new("clean").about("Remove build outputs and caches"))
        .subcommand(Command::new("targets").about("List the resolved targets"))
        .get_matches();

    let Some((subcommand, parameters)) = matches.subcommand() else {
        return Ok(());
    };

    let project = match Project::open(env::current_dir()?) {
        Ok(project) => project,
        Err(error) => {
            report_project_open_error(error);
            process::exit(1);
        }
    };

    let mode = if parameters.get_flag("release") {
        ProductionMode::Release
    } else {
        ProductionMode::Debug
    };

    let context = TaskContext {
        project,
        toolchain_configuration,
        mode,
        target_ids: parameters
            .get_many::<String>("target")
            .map(|ids| ids.cloned().collect())
            .unwrap_or_default(),
        arguments: parameters
            .try_get_many::<String>("arguments")
            .ok()
            .flatten()
            .map(|arguments| arguments.cloned().collect())
            .unwrap_or_default(),
        verbose: parameters.get_flag("verbose"),
    };

    if let Err(error) = execute_task_and_its_dependencies(&mut tasks, subcommand, &context) {
        eprintln!("{error:?}");
        process::exit(1);
    }

    Ok(())
}

fn report_project_open_error(error: ProjectOpenError) {
    match error {
        ProjectOpenError::InvalidProjectPath(_error) => {
            eprintln!("There is no {BUILD_CONFIGURATION_FILE} in the current directory")
        }
        ProjectOpenError::InvalidBuildConfiguration(build_configuration_error) => {
            match build_configuration_error {
                BuildConfigurationError::SyntaxError(error) => {
                    eprintln!("Syntax error occured:");

                    for line in error.lines() {
                        eprintln!("{line}");
                    }
                }
                BuildConfigurationError::InvalidName(name) => eprintln!("Project's name {name} consists of invalid characters. Valid characters are: {NAME_PATTERN}"),
                BuildConfigurationError::InvalidTargetName(name) => eprintln!("Target's name {name} consists of invalid characters. Valid characters are: {NAME_PATTERN}"),
                BuildConfigurationError::MissingTargetName(index) => {
                    eprintln!("Target #{index} has no name");
                }
                BuildConfigurationError::IncorrectWildcard(wildcard) => eprintln!("Incorrect wildcard: {wildcard}"),
                BuildConfigurationError::IncorrectSource(source) => {
                    eprintln!("Incorrect source: {}", source);
                }
                BuildConfigurationError::IncorrectFilter(filter) => {
                    eprintln!("Incorrect filter: {}", filter);
                }
                error => eprintln!("Invalid {BUILD_CONFIGURATION_FILE}: {error}"),
            }
        }
    }
}

fn execute_task_and_its_dependencies(
    tasks: &mut HashMap<&str, Box<dyn Task>>,
    task_id: &str,
    context: &TaskContext,
) -> eyre::Result<()> {
    let mut processing_stack = VecDeque::new();
    let mut result_stack = VecDeque::new();

    processing_stack.push_front(task_id);

    while let Some(current_task_id) = processing_stack.pop_front() {
        result_stack.push_front(current_task_id);

        let task = tasks
            .get(current_task_id)
            .ok_or_else(|| eyre!("Unknown task: {current_task_id}"))?;

        for dependency in task.dependencies() {
            processing_stack.push_front(dependency);
        }
    }

    for task_id in result_stack.into_iter().unique() {
        tasks
            .get_mut(task_id)
            .ok_or_else(|| eyre!("Unknown task: {task_id}"))?
            .on_execute(context)?;
    }

    Ok(())
}

fn toolchain_configuration_path() -> eyre::Result<PathBuf> {
    if let Some(path) = env::var_os(TOOLCHAIN_CONFIGURATION_VARIABLE) {
        return Ok(PathBuf::from(path));
    }

    let mut executable_path = env::current_exe()?;
    executable_path.pop();
    executable_path.push("config.toml");

    Ok(executable_path)
}

fn deserialize_toolchain_configuration() -> eyre::Result<ToolchainConfiguration> {
    let toolchain_configuration_path = toolchain_configuration_path()?;

    if !toolchain_configuration_path.exists() {
        let toolchain_configuration = ToolchainConfiguration::detect();
        let toolchain_configuration_toml = toml::to_string_pretty(&toolchain_configuration)?;

        let written = File::options()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&toolchain_configuration_path)
            .and_then(|mut file| file.write_all(toolchain_configuration_toml.as_bytes()));

        if let Err(error) = written {
            eprintln!(
                "Couldn't save toolchain configuration to {}: {error}",
                toolchain_configuration_path.display()
            );
        }

        return Ok(toolchain_configuration);
    }

    let toolchain_configuration_content = fs::read_to_string(&toolchain_configuration_path)?;
    let toolchain_configuration =
        toml::from_str::<ToolchainConfiguration>(&toolchain_configuration_content)
            .wrap_err_with(|| format!("Invalid {}", toolchain_configuration_path.display()))?;

    Ok(toolchain_configuration)
}
