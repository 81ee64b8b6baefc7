mod build;
mod clean;
mod run;
mod targets;

pub(crate) use build::*;
pub(crate) use clean::*;
pub(crate) use run::*;
pub(crate) use targets::*;

use crate::{
    config::{ProductionMode, ToolchainConfiguration},
    Project, Target,
};
use eyre::eyre;

pub(crate) struct TaskContext {
    pub(crate) project: Project,
    pub(crate) toolchain_configuration: ToolchainConfiguration,
    pub(crate) mode: ProductionMode,
    /// Targets named with `--target`; empty selects every target.
    pub(crate) target_ids: Vec<String>,
    /// Passed to the executable by the run task.
    pub(crate) arguments: Vec<String>,
    pub(crate) verbose: bool,
}

impl TaskContext {
    pub(crate) fn selected_targets(&self) -> eyre::Result<Vec<&Target>> {
        self.project
            .select_targets(&self.target_ids)
            .map_err(|unknown| eyre!("Project {} has no target {}", self.project.name, unknown))
    }
}

pub(crate) trait Task {
    fn id(&self) -> &'static str;
    fn dependencies(&self) -> &[&'static str];

    fn on_execute(&mut self, context: &TaskContext) -> eyre::Result<()>;
}
