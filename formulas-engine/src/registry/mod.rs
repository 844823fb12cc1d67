//! Registry of formulas known locally and from the remote catalog.
//!
//! The registry lets users:
//! - Browse formulas from the catalog alongside locally authored ones
//! - Download formula sources and keep them up to date
//! - Hide formulas from listings
//! - Search by name, including multi-word searches over the display name
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    Formulas CLI                      │
//! │  ┌─────────┐  ┌──────────┐  ┌───────────────────┐  │
//! │  │  Sync   │  │ Download │  │   List/Search     │  │
//! │  └─────────┘  └──────────┘  └───────────────────┘  │
//! └─────────────────────────────────────────────────────┘
//!         │                 │                 │
//!         ▼                 ▼                 ▼
//!    ┌──────────────────────────────────────────┐
//!    │        Catalog (HTTP, JSON array)        │
//!    │   retries with backoff on 429 / 5xx      │
//!    └──────────────────────────────────────────┘
//!         │
//!         ▼
//!    ┌──────────────────────────────────────────┐
//!    │   Reconcile: merge remote into local     │
//!    │   keep user state, flag updates, prune   │
//!    └──────────────────────────────────────────┘
//!         │
//!         ▼
//!    ┌──────────────────────────────────────────┐
//!    │         XDG Directories                  │
//!    │  Config | Data (registry.toml, sources)  │
//!    └──────────────────────────────────────────┘
//! ```
//!
//! # Example Usage
//!
//! ```bash
//! # Refresh the registry from the catalog
//! formulas sync
//!
//! # Search by words of the display name
//! formulas search "prefab selection"
//!
//! # Download a formula
//! formulas download createPrefabFromSelection
//!
//! # Update everything with a newer remote source
//! formulas update
//! ```

use std::collections::BTreeMap;

use crate::record::FormulaRecord;

pub mod catalog;
pub mod cli;
pub mod error;
pub mod reconcile;
pub mod scan;
pub mod search;
pub mod service;
pub mod store;
pub mod tracker;

/// All known formulas, keyed and ordered by name.
pub type Registry = BTreeMap<String, FormulaRecord>;

pub use catalog::{Catalog, HttpCatalog, parse_catalog};
pub use cli::{FormulasCommand, execute};
pub use error::{RegistryError, Result};
pub use reconcile::{MergeReport, merge, merge_with_report, needs_update};
pub use scan::{ScanReport, scan_local};
pub use search::{FilterOptions, filter};
pub use service::{FormulaService, SyncReport, UpdateOutcome};
pub use store::RegistryStore;
pub use tracker::{DownloadGuard, DownloadTracker};
