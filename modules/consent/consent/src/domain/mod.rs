pub mod engine;
pub mod error;
pub mod model;
pub mod ports;
pub mod registry;
pub mod renewal;
pub mod sampling;
pub mod storage;
pub mod submitter;
