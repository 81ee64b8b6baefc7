use super::{Archiver, CompilationSettings, Compiler, LinkingSettings, ToolError};
use crate::{config::CompilerKind, Language, Library};
use std::{
    path::{Path, PathBuf},
    process::Command,
};

/// `ar`, `llvm-ar` and `emar` all take the same arguments.
pub(crate) struct GccFlavorArchiver {
    location: String,
}

impl GccFlavorArchiver {
    pub(crate) fn new(location: String) -> GccFlavorArchiver {
        GccFlavorArchiver { location }
    }
}

impl Archiver for GccFlavorArchiver {
    fn archive_command(
        &self,
        object_files: &[PathBuf],
        output_file: &Path,
    ) -> Result<Command, ToolError> {
        let mut command = Command::new(&self.location);

        command.arg("rcs");
        command.arg(output_file);

        for object_file in object_files {
            command.arg(object_file);
        }

        Ok(command)
    }
}

/// Drives gcc, clang and Emscripten, whose drivers share the gcc command line.
pub(crate) struct GccFlavorCompiler {
    kind: CompilerKind,
    c_location: Option<String>,
    cpp_location: Option<String>,
}

impl GccFlavorCompiler {
    pub(crate) fn new(
        kind: CompilerKind,
        c_location: Option<String>,
        cpp_location: Option<String>,
    ) -> GccFlavorCompiler {
        GccFlavorCompiler {
            kind,
            c_location,
            cpp_location,
        }
    }

    fn driver(&self, language: Language) -> Result<Command, ToolError> {
        let (location, tool) = match language {
            Language::C => (&self.c_location, "C compiler"),
            Language::Cpp => (&self.cpp_location, "C++ compiler"),
        };

        location
            .as_ref()
            .map(Command::new)
            .ok_or(ToolError::NotFound {
                tool,
                compiler: self.kind,
            })
    }
}

impl Compiler for GccFlavorCompiler {
    fn compile_command(
        &self,
        language: Language,
        source_file: &Path,
        output_file: &Path,
        depfile: &Path,
        settings: &CompilationSettings<'_>,
    ) -> Result<Command, ToolError> {
        let mut command = self.driver(language)?;

        command.current_dir(settings.working_directory);

        command.arg("-c");

        match language {
            Language::C => {
                command.arg("-xc");
                command.arg(settings.c_standard.flag());
            }
            Language::Cpp => {
                command.arg("-xc++");
                command.arg(settings.cpp_standard.flag());
            }
        }

        command.arg(settings.optimization.flag());
        command.args(settings.mode_flags);

        if settings.enable_all_warnings {
            command.arg("-Wall");
            command.arg("-Wpedantic");
        }

        if settings.treat_all_warnings_as_errors {
            command.arg("-Werror");
        }

        command.args(settings.flags);
        command.args(settings.warning_suppression_flags);

        command.arg("-MMD");
        command.arg("-MF");
        command.arg(depfile);

        command.arg(source_file);

        command.arg("-o");
        command.arg(output_file);

        for include in settings.includes {
            command.arg(format!("-I{}", include));
        }

        Ok(command)
    }

    fn link_command(
        &self,
        object_files: &[PathBuf],
        output_file: &Path,
        settings: &LinkingSettings<'_>,
    ) -> Result<Command, ToolError> {
        let mut command = self.driver(if settings.use_cpp_driver {
            Language::Cpp
        } else {
            Language::C
        })?;

        command.current_dir(settings.working_directory);

        for object_file in object_files {
            command.arg(object_file);
        }

        command.arg("-o");
        command.arg(output_file);

        command.arg(settings.optimization.flag());
        command.args(settings.flags);

        for library in settings.libraries {
            match library {
                Library::File(path) => {
                    command.arg(path);
                }
                Library::System(name) => {
                    command.arg(format!("-l{}", name));
                }
            }
        }

        Ok(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CStandard, CppStandard, OptimizationLevel};
    use std::ffi::OsStr;

    fn arguments(command: &Command) -> Vec<&str> {
        command
            .get_args()
            .map(|argument| argument.to_str().unwrap())
            .collect()
    }

    fn compiler() -> GccFlavorCompiler {
        GccFlavorCompiler::new(
            CompilerKind::Emscripten,
            Some(String::from("emcc")),
            Some(String::from("em++")),
        )
    }

    #[test]
    fn test_compile_command() {
        let flags = vec![String::from("-pthread")];
        let warning_suppression_flags = vec![String::from("-Wno-unused-parameter")];
        let includes = vec![String::from("/opt/json/include")];
        let settings = CompilationSettings {
            c_standard: CStandard::Eleven,
            cpp_standard: CppStandard::Seventeen,
            optimization: OptimizationLevel::Zero,
            mode_flags: &["-g"],
            flags: &flags,
            warning_suppression_flags: &warning_suppression_flags,
            includes: &includes,
            enable_all_warnings: true,
            treat_all_warnings_as_errors: false,
            working_directory: Path::new("/project"),
        };

        let command = compiler()
            .compile_command(
                Language::Cpp,
                Path::new("src/main.cpp"),
                Path::new("obj/src/main.cpp.o"),
                Path::new("obj/src/main.cpp.d"),
                &settings,
            )
            .unwrap();

        assert_eq!(command.get_program(), OsStr::new("em++"));
        assert_eq!(command.get_current_dir(), Some(Path::new("/project")));
        assert_eq!(
            arguments(&command),
            vec![
                "-c",
                "-xc++",
                "-std=c++17",
                "-O0",
                "-g",
                "-Wall",
                "-Wpedantic",
                "-pthread",
                "-Wno-unused-parameter",
                "-MMD",
                "-MF",
                "obj/src/main.cpp.d",
                "src/main.cpp",
                "-o",
                "obj/src/main.cpp.o",
                "-I/opt/json/include",
            ]
        );

        let command = compiler()
            .compile_command(
                Language::C,
                Path::new("src/lzma.c"),
                Path::new("lzma.c.o"),
                Path::new("lzma.c.d"),
                &settings,
            )
            .unwrap();

        assert_eq!(command.get_program(), OsStr::new("emcc"));
        assert_eq!(&arguments(&command)[..3], &["-c", "-xc", "-std=c11"]);
    }

    #[test]
    fn test_link_command() {
        let flags = vec![String::from("-pthread")];
        let libraries = vec![
            Library::System(String::from("stdc++fs")),
            Library::File(PathBuf::from("/opt/lib/libz.a")),
        ];
        let settings = LinkingSettings {
            optimization: OptimizationLevel::Three,
            flags: &flags,
            libraries: &libraries,
            use_cpp_driver: true,
            working_directory: Path::new("/project"),
        };

        let command = compiler()
            .link_command(
                &[PathBuf::from("a.cpp.o"), PathBuf::from("b.c.o")],
                Path::new("out/app.js"),
                &settings,
            )
            .unwrap();

        assert_eq!(command.get_program(), OsStr::new("em++"));
        assert_eq!(
            arguments(&command),
            vec![
                "a.cpp.o",
                "b.c.o",
                "-o",
                "out/app.js",
                "-O3",
                "-pthread",
                "-lstdc++fs",
                "/opt/lib/libz.a",
            ]
        );
    }

    #[test]
    fn test_missing_driver_is_reported() {
        let compiler = GccFlavorCompiler::new(CompilerKind::Gcc, Some(String::from("gcc")), None);
        let settings = LinkingSettings {
            optimization: OptimizationLevel::Zero,
            flags: &[],
            libraries: &[],
            use_cpp_driver: true,
            working_directory: Path::new("."),
        };

        assert!(matches!(
            compiler.link_command(&[], Path::new("app"), &settings),
            Err(ToolError::NotFound {
                tool: "C++ compiler",
                compiler: CompilerKind::Gcc,
            })
        ));
    }

    #[test]
    fn test_archive_command() {
        let command = GccFlavorArchiver::new(String::from("emar"))
            .archive_command(&[PathBuf::from("a.c.o")], Path::new("libdemo.a"))
            .unwrap();

        assert_eq!(command.get_program(), OsStr::new("emar"));
        assert_eq!(arguments(&command), vec!["rcs", "libdemo.a", "a.c.o"]);
    }
}
