//! # GitKB
//!
//! A Git-friendly knowledge-base catalog for sales and technical assets:
//! win stories, plays, templates, and code references.
//!
//! The catalog logic (query engine, stage bucketing, schemas, wizards)
//! lives in [`gitkb_core`]. This crate adds the parts that touch the outside
//! world: configuration, the file-backed and HTTP repositories, metadata
//! extraction, directory import, the REST server, and the `gitkb` CLI.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌────────────────┐
//! │  Importer   │──▶│  Repository  │──▶│ memory | files │
//! │ walk+extract│   │    trait     │   │    | remote    │
//! └─────────────┘   └──────┬───────┘   └────────────────┘
//!                          │
//!                ┌─────────┴─────────┐
//!                ▼                   ▼
//!           ┌──────────┐       ┌──────────┐
//!           │   CLI    │       │   REST   │
//!           │ (gitkb)  │       │  (axum)  │
//!           └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! gitkb import ./field-docs --dry-run   # preview drafts
//! gitkb import ./field-docs             # save them
//! gitkb search "openshift" --filter offering=RHOV --sort newest
//! gitkb guide --deal-type new-logo --stage discovery --offering RHOV
//! gitkb serve                           # start the REST API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`logging`] | Tracing subscriber setup |
//! | [`catalog`] | Opens the configured repository |
//! | [`file_store`] | On-disk repository |
//! | [`client`] | Repository over the REST API |
//! | [`extract`] | Text and metadata extraction |
//! | [`import`] | Bulk directory import |
//! | [`server`] | REST server |
//! | [`search`], [`get`], [`guide`], [`plays`], [`schemas`], [`stats`] | CLI commands |

pub mod catalog;
pub mod client;
pub mod config;
pub mod extract;
pub mod file_store;
pub mod get;
pub mod guide;
pub mod import;
pub mod logging;
pub mod plays;
pub mod schemas;
pub mod search;
pub mod server;
pub mod stats;
