use std::{
    ffi::OsString,
    path::{Component, Path, PathBuf},
};

pub trait PathExtension {
    /// `src/main.cpp` with `o` becomes `src/main.cpp.o`.
    fn with_appended_extension(&self, extension: &str) -> PathBuf;

    /// Project-relative key used in caches and filters, independent of the host separator.
    fn to_forward_slashes(&self) -> String;
}

impl PathExtension for Path {
    fn with_appended_extension(&self, extension: &str) -> PathBuf {
        let mut path = OsString::from(self.as_os_str());

        path.push(".");
        path.push(extension);

        PathBuf::from(path)
    }

    fn to_forward_slashes(&self) -> String {
        self.components()
            .filter_map(|component| match component {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                Component::ParentDir => Some(String::from("..")),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/")
    }
}
