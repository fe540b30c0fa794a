pub mod api;
pub mod booster;
pub mod cache;
pub mod card;
pub mod catalog;
pub mod client_db;
pub mod config;
pub mod error;
pub mod extract;
pub mod filter;
pub mod linker;
pub mod list_sheets;
pub mod persist;
pub mod pipeline;
pub mod promoter;
pub mod ratings;
pub mod rules;
pub mod selector;
pub mod sets;
pub mod supplemental;
pub mod symbols;
pub mod translations;

pub use config::{Config, ForceFlags, Mode};
pub use error::{Error, Result};
pub use pipeline::{run, WrittenArtifacts};
