//! # plugin-analyzer
//!
//! Static analysis of compiled Gradle plugins for API-compatibility hazards.
//!
//! ## Architecture
//!
//! - **scan** / **catalog**: Enumerate class files in directories, jars and single files
//! - **classfile** / **descriptor** / **bytecode**: JVM class-file decoding
//! - **universe**: The frozen, name-ordered set of classes an artifact sees
//! - **origin**: Package patterns and the internal/runtime/public/external split
//! - **repository**: Memoized type sets (task types, plugin types, referenced types)
//! - **analysis**: The individual checks
//! - **analyzer**: Runs the checks in their fixed order over one artifact
//! - **report** / **aggregate** / **render**: Findings, grouping and markdown/JSON output
//! - **resolve**: Coordinates to binaries in a Maven-layout repository
//! - **cache**: LMDB cache of decoded universes keyed by content hash
//! - **batch**: Parallel analysis of many artifacts
//! - **config** / **cli**: Settings, manifests and the command line

pub mod aggregate;
pub mod analysis;
pub mod analyzer;
pub mod batch;
pub mod bytecode;
pub mod cache;
pub mod catalog;
pub mod classfile;
pub mod cli;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod origin;
pub mod render;
pub mod report;
pub mod repository;
pub mod resolve;
pub mod scan;
pub mod universe;
