use super::{Task, TaskContext};
use crate::config::Distribution;
use eyre::{bail, eyre, WrapErr};
use std::process::Command;

pub(crate) struct Run {}

impl Run {
    pub(crate) fn new() -> Self {
        Self {}
    }
}

impl Task for Run {
    fn id(&self) -> &'static str {
        "run"
    }

    fn dependencies(&self) -> &[&'static str] {
        &["build"]
    }

    fn on_execute(&mut self, context: &TaskContext) -> eyre::Result<()> {
        let project = &context.project;

        if project.distribution != Distribution::Executable {
            bail!("Cannot run {} because it is not an executable", project.name);
        }

        let target = context
            .selected_targets()?
            .into_iter()
            .next()
            .ok_or_else(|| eyre!("Project {} has no targets", project.name))?;

        let output_file = project.output_path(target, context.mode);

        let mut command = if target.compiler.produces_webassembly() {
            let node_location = context
                .toolchain_configuration
                .node_location()
                .ok_or_else(|| eyre!("Node.js is needed to run target {}", target.id))?;

            let mut command = Command::new(node_location);
            command.arg(&output_file);
            command
        } else {
            Command::new(&output_file)
        };

        command.args(&context.arguments);
        command.current_dir(&project.base_path);

        println!("Running {} [{}]", project.name, target.id);

        let status = command
            .status()
            .wrap_err_with(|| format!("Failed to run {}", output_file.display()))?;

        if !status.success() {
            bail!("{} exited with {}", project.name, status);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProductionMode, ToolchainConfiguration};
    use crate::{Project, BUILD_CONFIGURATION_FILE};
    use std::{fs, path::Path};

    fn context(directory: &Path, project: &str, arguments: Vec<String>) -> TaskContext {
        fs::write(directory.join(BUILD_CONFIGURATION_FILE), project).unwrap();

        TaskContext {
            project: Project::open(directory).unwrap(),
            toolchain_configuration: ToolchainConfiguration {
                node_location: Some(String::from("sh")),
                ..ToolchainConfiguration::default()
            },
            mode: ProductionMode::Debug,
            target_ids: vec![],
            arguments,
            verbose: false,
        }
    }

    #[test]
    fn test_static_library_cannot_run() {
        let directory = tempfile::tempdir().unwrap();
        let context = context(
            directory.path(),
            "[project]\nname = \"demo\"\ndistribution = \"staticLibrary\"\n\
             [[targets]]\ntarget = \"native\"\ncompiler = \"gcc\"\n",
            vec![],
        );

        let error = Run::new().on_execute(&context).unwrap_err();

        assert!(error.to_string().contains("not an executable"));
    }

    #[test]
    fn test_missing_executable_is_an_error() {
        let directory = tempfile::tempdir().unwrap();
        let context = context(
            directory.path(),
            "[project]\nname = \"demo\"\n[[targets]]\ntarget = \"native\"\ncompiler = \"gcc\"\n",
            vec![],
        );

        assert!(Run::new().on_execute(&context).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_webassembly_runs_through_node() {
        let directory = tempfile::tempdir().unwrap();
        let context = context(
            directory.path(),
            "[project]\nname = \"demo\"\n[[targets]]\ntarget = \"wasm\"\ncompiler = \"emcc\"\n",
            vec![String::from("one"), String::from("two")],
        );
        let target = &context.project.targets[0];
        let output_file = context.project.output_path(target, ProductionMode::Debug);

        assert!(output_file.ends_with("demo.js"));

        // `sh` stands in for node, so the module is a script recording its arguments
        fs::create_dir_all(output_file.parent().unwrap()).unwrap();
        fs::write(&output_file, "printf '%s\\n' \"$@\" > arguments.log\n").unwrap();

        Run::new().on_execute(&context).unwrap();

        assert_eq!(
            fs::read_to_string(directory.path().join("arguments.log")).unwrap(),
            "one\ntwo\n"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_program_is_an_error() {
        let directory = tempfile::tempdir().unwrap();
        let context = context(
            directory.path(),
            "[project]\nname = \"demo\"\n[[targets]]\ntarget = \"wasm\"\ncompiler = \"emscripten\"\n",
            vec![],
        );
        let output_file = context
            .project
            .output_path(&context.project.targets[0], ProductionMode::Debug);

        fs::create_dir_all(output_file.parent().unwrap()).unwrap();
        fs::write(&output_file, "exit 3\n").unwrap();

        let error = Run::new().on_execute(&context).unwrap_err();

        assert!(error.to_string().contains("exited with"));
    }
}
