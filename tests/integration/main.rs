//! Integration tests against the in-memory store and a live server

mod api_tests;
mod common;
mod http;
mod inventory_invariant;
mod reminder_flow;
mod workflows;
