//! Persistent key/value storage for the credential pool.
//!
//! The pool record is sealed with a [`Cipher`]; the cursor and usage
//! history are stored in plain form. Storage itself sits behind the
//! [`KvBackend`] trait so tests can run against [`MemoryBackend`].

mod backend;
mod cipher;
mod store;

pub use backend::{FileBackend, KvBackend, MemoryBackend};
pub use cipher::{Cipher, PlainCipher, StaticKeyCipher};
pub use store::{KeyValueStore, StorageKeys, StoreError, UsageHistory};
