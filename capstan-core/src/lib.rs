//! Capstan Core
//!
//! Core types for the Capstan job runner.
//!
//! This crate contains:
//! - Domain types: the entities the runner and store operate on
//!   (Project, Job, Run)
//! - DTOs: creation requests whose IDs are assigned by the store

pub mod domain;
pub mod dto;
