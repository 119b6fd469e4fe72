//! Core functionality shared by every CAT crate.
//!
//! This crate provides the configuration model, setup errors, logging
//! initialisation and the small value types the key-derivation chain and the
//! certificate authority agree on.

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use config::{
    CaSettings, CatConfig, CommonSettings, EntityRecord, LogSettings, ServerSettings,
    ServiceSettings,
};
pub use error::{Error, Result};
pub use types::{IdentityKind, PseudoRandomFunction, SecretString};
