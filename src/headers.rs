use std::path::{Path, PathBuf};
use thiserror::Error;

/// Everything `target` depends on according to a make-style depfile written by `-MMD`.
pub(crate) fn dependencies(content: &str, target: &Path) -> Result<Vec<String>, DepfileError> {
    let target = target.to_string_lossy();

    let depfile = match depfile::parse(content) {
        Ok(depfile) => depfile,
        Err(_) => return Err(DepfileError::Malformed),
    };

    let dependencies = depfile
        .recurse_deps(&*target)
        .map(|dependency| PathBuf::from(dependency).to_string_lossy().into_owned())
        .collect::<Vec<_>>();

    // the source itself is always a prerequisite
    if dependencies.is_empty() {
        return Err(DepfileError::MissingRule(target.into_owned()));
    }

    Ok(dependencies)
}

#[derive(Error, Debug)]
pub(crate) enum DepfileError {
    #[error("depfile couldn't be parsed")]
    Malformed,
    #[error("depfile has no rule for {0}")]
    MissingRule(String),
}
