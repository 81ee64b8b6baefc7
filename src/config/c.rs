use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub(crate) enum CStandard {
    #[serde(rename = "89")]
    EightyNine,
    #[serde(rename = "99")]
    NinetyNine,
    #[serde(rename = "11")]
    Eleven,
    #[serde(rename = "17")]
    Seventeen,
    #[serde(rename = "23")]
    TwentyThree,
}

impl CStandard {
    /// Newest standard every supported front end accepts.
    pub(crate) fn latest() -> CStandard {
        CStandard::Seventeen
    }

    pub(crate) fn flag(&self) -> &'static str {
        match self {
            CStandard::EightyNine => "-std=c89",
            CStandard::NinetyNine => "-std=c99",
            CStandard::Eleven => "-std=c11",
            CStandard::Seventeen => "-std=c17",
            CStandard::TwentyThree => "-std=c2x",
        }
    }
}
