// Core modules implementing pair extraction, key grammar, tree assembly, and errors.
pub mod assemble;
pub mod error;
pub mod keypath;
pub mod node;
pub mod pair;
