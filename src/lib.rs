pub mod cli;
pub mod commands;
pub mod env_loader;
pub mod error;
pub mod esmp;
pub mod logging;
pub mod notion;
pub mod storage;
