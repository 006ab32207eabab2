pub mod config;
pub mod constants;
pub mod core;
pub mod errors;
pub mod execution;
pub mod logging;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;
