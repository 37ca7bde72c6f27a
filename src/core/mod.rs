//! Core stack logic: config, graph, assets, assembly and synthesis.

pub mod arn;
pub mod assembler;
pub mod asset;
pub mod diff;
pub mod error;
pub mod graph;
pub mod hasher;
pub mod parser;
pub mod synth;
pub mod types;

pub use error::SynthError;
