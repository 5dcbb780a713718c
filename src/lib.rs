//! fundme-deploy - deployment steps for the FundMe crowdfunding contract
//!
//! # Architecture
//!
//! ## Deploy steps
//! - [`scripts`] - mock price feed provisioning and FundMe deployment
//! - [`runner`] - tag based step selection and sequential execution
//!
//! ## Deployment framework
//! - [`deployments`] - `deploy`, `get` and named accounts
//! - [`persistence`] - deployment record store (SQLite)
//! - [`artifacts`] - compiled contract artifacts
//! - [`verify`] - source verification delegation
//!
//! ## Chain access
//! - [`backend`] - transport trait
//! - [`rpc`] - alloy provider backend, local signing and development nodes
//! - [`contract`] - FundMe contract client
//! - [`testing`] - in-memory chain for tests
//!
//! ## Configuration & Utilities
//! - [`config`] - configuration management
//! - [`network`] - network identity and static network tables
//! - [`abi`] - constructor encoding and revert decoding
//! - [`cli`] - shared binary setup
//! - [`error`] - error types

#![forbid(unsafe_code)]

// ============================================================================
// Deploy steps
// ============================================================================
pub mod runner;
pub mod scripts;

// ============================================================================
// Deployment framework
// ============================================================================
pub mod artifacts;
pub mod deployments;
pub mod persistence;
pub mod verify;

// ============================================================================
// Chain access
// ============================================================================
pub mod backend;
pub mod contract;
pub mod rpc;
pub mod testing;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod abi;
pub mod cli;
pub mod config;
pub mod error;
pub mod network;
