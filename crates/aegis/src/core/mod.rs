pub mod account_aggregator;
pub mod activity_log;
pub mod address_resolver;
pub mod advisory;
pub mod console;
pub mod orchestrator;
pub mod price_oracle;
pub mod projection;
pub mod rate_listener;
pub mod session;
