/// Rule configuration loading and validation.
pub mod config;
/// The `Encryptor` capability and the reference AES-256-GCM-SIV implementation.
pub mod encryptor;
/// Policy store and value cipher service.
pub mod policy;
