pub mod cleanup;
pub mod compare;
pub mod compiler;
pub mod control;
pub mod executor;
pub mod folder;
pub mod ground_truth;
pub mod input;
pub mod outcome;
pub mod pool;
pub mod report;
pub mod worker;

pub use compare::*;
pub use compiler::{compile_all, CompileOutcome, CompiledArtifacts, Compiler};
pub use control::*;
pub use executor::*;
pub use folder::*;
pub use ground_truth::{GroundTruthEntry, GroundTruthError};
pub use input::*;
pub use outcome::*;
pub use pool::*;
pub use report::*;
pub use worker::*;
