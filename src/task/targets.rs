use super::{Task, TaskContext};
use crate::config::ProductionMode;
use crate::{Project, Target};

pub(crate) struct Targets {}

impl Targets {
    pub(crate) fn new() -> Self {
        Self {}
    }

    fn describe(&self, project: &Project, target: &Target, mode: ProductionMode) -> Vec<String> {
        let mut lines = vec![
            format!("{} ({})", target.id, target.compiler),
            format!("  sources: {}", target.sources.len()),
            format!(
                "  output: {}",
                project.output_path(target, mode).display()
            ),
        ];

        // backtick commands are shown unevaluated
        for library in &target.libraries {
            if let Some(include) = &library.include {
                lines.push(format!("  include: {}", include));
            }

            if let Some(binary) = &library.binary {
                lines.push(format!("  library: {}", binary));
            }
        }

        let flags = target
            .flags_for(mode)
            .into_iter()
            .chain(target.warning_suppression_flags())
            .collect::<Vec<_>>();

        if !flags.is_empty() {
            lines.push(format!("  {} flags: {}", mode, flags.join(" ")));
        }

        lines
    }
}

impl Task for Targets {
    fn id(&self) -> &'static str {
        "targets"
    }

    fn dependencies(&self) -> &[&'static str] {
        &[]
    }

    fn on_execute(&mut self, context: &TaskContext) -> eyre::Result<()> {
        let project = &context.project;

        match &project.description {
            Some(description) => println!("{}: {}", project.name, description),
            None => println!("{}", project.name),
        }

        for target in context.selected_targets()? {
            for line in self.describe(project, target, context.mode) {
                println!("{line}");
            }
        }

        Ok(())
    }
}
