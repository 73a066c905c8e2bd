//! Library surface of the meshlink daemon: configuration loading, exposed
//! separately so integration tests can exercise it.

pub mod config;
