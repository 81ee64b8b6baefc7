use super::{Task, TaskContext};
use crate::{config::ProductionMode, MMAKE_DIRECTORY};
use eyre::WrapErr;
use std::{fs, path::Path};

pub(crate) struct Clean {}

impl Clean {
    pub(crate) fn new() -> Self {
        Self {}
    }

    fn remove(&self, directory: &Path) -> eyre::Result<()> {
        if directory.exists() {
            fs::remove_dir_all(directory)
                .wrap_err_with(|| format!("Failed to remove {}", directory.display()))?;

            println!("Removed {}", directory.display());
        }

        Ok(())
    }
}

impl Task for Clean {
    fn id(&self) -> &'static str {
        "clean"
    }

    fn dependencies(&self) -> &[&'static str] {
        &[]
    }

    /// Without `--target` everything mmake produced goes; with it only those targets' trees.
    fn on_execute(&mut self, context: &TaskContext) -> eyre::Result<()> {
        let project = &context.project;

        if context.target_ids.is_empty() {
            return self.remove(&project.base_path.join(MMAKE_DIRECTORY));
        }

        for target in context.selected_targets()? {
            for mode in ProductionMode::ALL {
                self.remove(&project.build_directory(target, mode))?;
                self.remove(&project.cache_directory(target, mode))?;
            }
        }

        Ok(())
    }
}
