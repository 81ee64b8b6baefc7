use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub(crate) enum CppStandard {
    #[serde(rename = "98")]
    NinetyEight,
    #[serde(rename = "03")]
    Three,
    #[serde(rename = "11")]
    Eleven,
    #[serde(rename = "14")]
    Fourteen,
    #[serde(rename = "17")]
    Seventeen,
    #[serde(rename = "20")]
    Twenty,
    #[serde(rename = "23")]
    TwentyThree,
}

impl CppStandard {
    pub(crate) fn latest() -> CppStandard {
        CppStandard::Twenty
    }

    pub(crate) fn flag(&self) -> &'static str {
        match self {
            CppStandard::NinetyEight => "-std=c++98",
            CppStandard::Three => "-std=c++03",
            CppStandard::Eleven => "-std=c++11",
            CppStandard::Fourteen => "-std=c++14",
            CppStandard::Seventeen => "-std=c++17",
            CppStandard::Twenty => "-std=c++20",
            CppStandard::TwentyThree => "-std=c++23",
        }
    }
}
