//! Token blacklist adapters. The in-memory store lives next to the codec in
//! `tenantry-auth`; this module adds shared backends.

#[cfg(feature = "redis")]
pub mod redis;

#[cfg(feature = "redis")]
pub use self::redis::{RedisBlacklistError, RedisTokenBlacklist};
