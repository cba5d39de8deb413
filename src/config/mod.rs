//! Per-service configuration resolution.
//!
//! Every invocation builds its configuration fresh from an explicit
//! [`EnvSnapshot`] -- defaults, then environment overrides, then (for the
//! Redis password only) an existing on-disk config file. Configs are
//! validated on construction and never mutated afterwards.

mod resolve;
mod snapshot;

pub use resolve::{
    read_redis_password, GcloudConfig, OtelConfig, PostgresConfig, RedisConfig,
};
pub use snapshot::EnvSnapshot;
