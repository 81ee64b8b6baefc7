use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub(crate) enum ProductionMode {
    #[default]
    Debug,
    Release,
}

impl ProductionMode {
    pub(crate) const ALL: [ProductionMode; 2] = [ProductionMode::Debug, ProductionMode::Release];

    pub(crate) fn name(&self) -> &'static str {
        match self {
            ProductionMode::Debug => "debug",
            ProductionMode::Release => "release",
        }
    }

    pub(crate) fn default_optimization(&self) -> OptimizationLevel {
        match self {
            ProductionMode::Debug => OptimizationLevel::Zero,
            ProductionMode::Release => OptimizationLevel::Three,
        }
    }

    /// Flags every compilation in this mode receives next to the optimization level.
    pub(crate) fn default_flags(&self) -> &'static [&'static str] {
        match self {
            ProductionMode::Debug => &["-g"],
            ProductionMode::Release => &["-DNDEBUG"],
        }
    }
}

impl Display for ProductionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// `flags` of a target: either one list shared by every production mode, or
/// a table with a shared part and per-mode additions.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub(crate) enum FlagsConfiguration {
    Shared(Vec<String>),
    PerMode(ModeFlags),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ModeFlags {
    #[serde(default)]
    pub(crate) shared: Vec<String>,
    #[serde(default)]
    pub(crate) debug: Vec<String>,
    #[serde(default)]
    pub(crate) release: Vec<String>,
}

impl Default for FlagsConfiguration {
    fn default() -> Self {
        Self::Shared(Vec::new())
    }
}

impl FlagsConfiguration {
    #[cfg(test)]
    pub(crate) fn share(flags: &[&str]) -> Self {
        Self::Shared(flags.iter().map(|flag| String::from(*flag)).collect())
    }

    pub(crate) fn for_mode(&self, mode: ProductionMode) -> Vec<String> {
        let (shared, specific): (&[String], &[String]) = match self {
            FlagsConfiguration::Shared(shared) => (shared.as_slice(), &[][..]),
            FlagsConfiguration::PerMode(ModeFlags {
                shared,
                debug,
                release,
            }) => match mode {
                ProductionMode::Debug => (shared.as_slice(), debug.as_slice()),
                ProductionMode::Release => (shared.as_slice(), release.as_slice()),
            },
        };

        shared
            .iter()
            .chain(specific)
            .filter(|flag| !flag.trim().is_empty())
            .map(|flag| normalize_flag(flag))
            .collect()
    }
}

fn normalize_flag(flag: &str) -> String {
    let flag = flag.trim();

    if flag.starts_with('-') {
        String::from(flag)
    } else {
        format!("-{flag}")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub(crate) enum OptimizationLevel {
    #[serde(rename = "0")]
    Zero,
    #[serde(rename = "1")]
    One,
    #[serde(rename = "2")]
    Two,
    #[serde(rename = "3")]
    Three,
    #[serde(rename = "fast", alias = "4")]
    Fast,
    #[serde(rename = "size", alias = "s")]
    Size,
    #[serde(rename = "debug", alias = "g")]
    Debug,
}

impl OptimizationLevel {
    pub(crate) fn flag(&self) -> &'static str {
        match self {
            OptimizationLevel::Zero => "-O0",
            OptimizationLevel::One => "-O1",
            OptimizationLevel::Two => "-O2",
            OptimizationLevel::Three => "-O3",
            OptimizationLevel::Fast => "-Ofast",
            OptimizationLevel::Size => "-Os",
            OptimizationLevel::Debug => "-Og",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_flags_apply_to_every_mode() {
        let flags = FlagsConfiguration::share(&["pthread", "-fno-rtti"]);

        for mode in ProductionMode::ALL {
            assert_eq!(flags.for_mode(mode), vec!["-pthread", "-fno-rtti"]);
        }
    }

    #[test]
    fn test_per_mode_flags_follow_shared_flags() {
        let flags = FlagsConfiguration::PerMode(ModeFlags {
            shared: vec![String::from("pthread")],
            debug: vec![String::from("fsanitize=address")],
            release: vec![String::from("flto"), String::from("  ")],
        });

        assert_eq!(
            flags.for_mode(ProductionMode::Debug),
            vec!["-pthread", "-fsanitize=address"]
        );
        assert_eq!(
            flags.for_mode(ProductionMode::Release),
            vec!["-pthread", "-flto"]
        );
    }

    #[test]
    fn test_flags_deserialize_from_list_or_table() {
        #[derive(Deserialize)]
        struct Wrapper {
            flags: FlagsConfiguration,
        }

        let list = toml::from_str::<Wrapper>(r#"flags = ["pthread"]"#).unwrap();
        assert_eq!(list.flags, FlagsConfiguration::share(&["pthread"]));

        let table = toml::from_str::<Wrapper>(r#"flags = { release = ["flto"] }"#).unwrap();
        assert_eq!(
            table.flags,
            FlagsConfiguration::PerMode(ModeFlags {
                release: vec![String::from("flto")],
                ..ModeFlags::default()
            })
        );
    }

    #[test]
    fn test_misspelled_mode_is_rejected() {
        #[derive(Debug, Deserialize)]
        struct Wrapper {
            #[allow(dead_code)]
            flags: FlagsConfiguration,
        }

        assert!(toml::from_str::<Wrapper>(r#"flags = { relase = ["flto"] }"#).is_err());
        assert!(toml::from_str::<Wrapper>(r#"flags = { shared = ["g"], test = [] }"#).is_err());
    }

    #[test]
    fn test_optimization_aliases() {
        #[derive(Deserialize)]
        struct Wrapper {
            optimization: OptimizationLevel,
        }

        let level = toml::from_str::<Wrapper>(r#"optimization = "4""#).unwrap();
        assert_eq!(level.optimization, OptimizationLevel::Fast);
        assert_eq!(level.optimization.flag(), "-Ofast");
    }
}
