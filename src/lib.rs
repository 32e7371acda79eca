// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # switch-topo
//!
//! Turns captured switch CLI transcripts into a reconciled, trust-labelled
//! link graph, runs anomaly rules over it, and draws topology diagrams.
//!
//! ## Architecture
//!
//! - **Canonicalizer** (`canon`): one spelling per interface name
//! - **Transcript intake** (`transcript`): encoding detection, size ceiling, content hash, prompt segmentation
//! - **Field parsers** (`parser`): LLDP neighbors, Eth-Trunk groups, interface states, spanning tree
//! - **Import** (`import`): one transcript → one atomic write, idempotent by content hash
//! - **Storage** (`store`): `GraphReader`/`GraphWriter` contract, redb-backed `TopoStore`
//! - **Anomaly rules** (`anomaly`): loops, placeholder neighbors, inconsistent trunks, unstable timers
//! - **Export** (`export`): Mermaid, Markdown and Graphviz diagrams
//!
//! ## Library usage
//!
//! ```no_run
//! use std::path::Path;
//!
//! use switch_topo::export::{ExportRequest, export};
//! use switch_topo::import::{ImportConfig, import_file};
//! use switch_topo::store::TopoStore;
//!
//! let store = TopoStore::open(Path::new("topo.redb")).unwrap();
//! let report = import_file(&store, Path::new("Core_20240101.log"), &ImportConfig::default()).unwrap();
//! println!("{}: {} links", report.status, report.counts.links);
//!
//! let diagram = export(&store.read().unwrap(), &ExportRequest::device("Core")).unwrap();
//! println!("{}", diagram.text);
//! ```

pub mod anomaly;
pub mod canon;
pub mod config;
pub mod error;
pub mod export;
pub mod import;
pub mod model;
pub mod parser;
pub mod paths;
pub mod store;
pub mod transcript;
