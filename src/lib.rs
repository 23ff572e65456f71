pub mod app;
pub mod config;
pub mod confounds;
pub mod descriptor;
pub mod diagnostics;
pub mod domain;
pub mod error;
pub mod events;
pub mod layout;
pub mod metadata;
pub mod output;
pub mod participants;
