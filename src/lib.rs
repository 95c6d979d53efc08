//! Hash-consed IR, control-flow analysis, and SPIR-V emission for a structured GPU shader
//! compiler core. See `DESIGN.md` for how each module here is grounded, and `SPEC_FULL.md` for
//! the full component breakdown this crate implements.

pub mod arena;
pub mod cfg;
pub mod config;
pub mod ctxhash;
pub mod emit;
pub mod entity;
pub mod error;
pub mod ir;
pub mod passes;
pub mod rewrite;
pub mod typeck;

pub use arena::{Arena, ArenaConfig};
pub use config::CompilerConfig;
pub use error::{CompileError, CompileResult};
pub use ir::{Abstraction, Node, Root};
