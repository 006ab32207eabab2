pub mod aave_client;
pub mod contracts;
pub mod tx_submitter;
