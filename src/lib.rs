// Clippy allows for reasonable defaults
#![allow(clippy::redundant_closure)] // |x| f(x) can be clearer than f

pub mod config;
pub mod generation;
pub mod jira;
pub mod server;
pub mod shutdown;
pub mod testdata;
