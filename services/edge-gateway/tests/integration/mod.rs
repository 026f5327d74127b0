//! Integration Tests Module
//!
//! Router-level tests against mock identity and backend servers.
