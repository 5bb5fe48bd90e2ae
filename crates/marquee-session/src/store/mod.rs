/*
[INPUT]:  Credential values and a persistent key-value backend
[OUTPUT]: Memory-cached, persisted credential pair with expiry
[POS]:    Storage layer - no network access, no refresh policy
[UPDATE]: When storage keys, backends, or degradation rules change
*/

pub mod credentials;
pub mod kv;

pub use credentials::{ACCESS_TOKEN_KEY, CredentialStore, REFRESH_TOKEN_KEY, TOKEN_EXPIRY_KEY};
pub use kv::{FileStore, KeyValueStore, MemoryStore, StoreError};
