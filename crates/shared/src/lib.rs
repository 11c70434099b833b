//! Shared utilities and common types for the ride dispatch core.
//!
//! This crate provides functionality used across all other crates:
//! - Cryptographic utilities (hashing, short-code generation)
//! - JWT encode/decode for bearer auth
//! - Common validation logic

pub mod crypto;
pub mod jwt;
pub mod validation;
