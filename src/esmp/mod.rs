pub mod audit;
pub mod config;
pub mod identity;
pub mod notifier;
pub mod paths;
pub mod reconcile;
pub mod records;
pub mod retry;
pub mod session;
pub mod source;
#[cfg(test)]
pub(crate) mod testing;
pub mod util;
pub mod watcher;
