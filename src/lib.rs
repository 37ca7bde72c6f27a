//! Kiln: EC2 Image Builder pipeline stacks as CloudFormation cloud assemblies.
//!
//! A stack is declared once in `stack.yaml`, assembled into a graph of typed
//! resource declarations, and synthesized into a template plus asset manifest
//! for a separate deploy tool.

pub mod cli;
pub mod core;
