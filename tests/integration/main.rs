//! Integration coverage for the read-through cache service.

mod host;
mod support;
mod topology;
