//! An interactive client for beanstalkd-compatible work queues.
pub mod clear;
pub mod client;
pub mod codec;
pub mod commands;
pub mod complete;
pub mod session;
pub mod types;

#[cfg(test)]
pub(crate) mod test_queue;
