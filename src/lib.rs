pub mod app;
pub mod classify;
pub mod companion;
pub mod config;
pub mod consent;
pub mod domain;
pub mod error;
pub mod fs_util;
pub mod inventory;
pub mod linker;
pub mod output;
pub mod prepare;
pub mod reconcile;
