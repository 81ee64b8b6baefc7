mod build;
mod c;
mod cpp;
mod filter;
mod flags;
mod library;
mod project;
mod target;
mod toolchain;

pub(crate) use build::*;
pub(crate) use c::*;
pub(crate) use cpp::*;
pub(crate) use filter::*;
pub(crate) use flags::*;
pub(crate) use library::*;
pub(crate) use project::*;
pub(crate) use target::*;
pub(crate) use toolchain::*;
