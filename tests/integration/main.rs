//! Integration tests for the harvester
//!
//! These tests use wiremock to stand in for the suggest endpoint and drive
//! the gateway and the full harvest cycle over real HTTP.

mod gateway_tests;
mod harvest_tests;
