// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! # aumos-remediation-std
//!
//! Storage backends for `aumos-remediation-core` that need the filesystem.
//!
//! [`FileStorage`] keeps workflows, human tasks, decisions and the audit
//! chain in one JSON document, suitable for CLI tools and single-process
//! deployments that do not need a database.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use aumos_remediation_std::storage::FileStorage;
//! use aumos_remediation_core::{
//!     config::Config, engine::RemediationEngine, executor::NoopActionHandler,
//!     reasoner::UnavailableReasoner,
//! };
//!
//! let storage = FileStorage::open("/var/lib/aumos/remediation.json")
//!     .expect("failed to open storage file");
//!
//! let engine = RemediationEngine::new(
//!     Config::default(),
//!     storage,
//!     UnavailableReasoner,
//!     NoopActionHandler,
//! );
//! ```

pub mod storage;

pub use storage::file::FileStorage;
