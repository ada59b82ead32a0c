//! Infrastructure layer: storage adapters behind the tenancy and auth traits.
//!
//! In-memory adapters are always available; Postgres and Redis adapters are
//! behind the `postgres` and `redis` features.

pub mod blacklist;
pub mod connection;
pub mod credentials;
pub mod directory;
pub mod memory;
pub mod seed;

pub use connection::{RecordingConnectionSwitch, SwitchEvent, TracingConnectionSwitch};
pub use credentials::{InMemoryCredentialProvider, RecordStorage};
pub use directory::InMemoryTenantRepository;
pub use memory::InMemoryBackend;
pub use seed::{DevSeed, SeedError, SeedTargets};
