//! Formulas Engine - registry sync for small, reusable editor automations.
//!
//! A formula is a single source file identified by its name. The engine keeps
//! a registry of formulas that exist locally, are offered by a remote
//! catalog, or both, and keeps the two in step.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Formulas Engine                             │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────────┐  │
//! │  │  Catalog    │  │ Reconciler  │  │    Registry Store       │  │
//! │  │  (HTTP)     │  │  (merge)    │  │  (TOML, XDG dirs)       │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//!         │                 │                 │
//!         ▼                 ▼                 ▼
//!    ┌─────────┐      ┌───────────┐      ┌──────────────┐
//!    │ Search  │      │ Downloads │      │ Local files  │
//!    └─────────┘      └───────────┘      └──────────────┘
//! ```

pub mod config;
pub mod nicify;
pub mod params;
pub mod record;
pub mod registry;

pub use config::FormulasConfig;
pub use nicify::nicify;
pub use params::{ParamKind, ParamSpec, ParamValue};
pub use record::FormulaRecord;
pub use registry::{Registry, RegistryError};
