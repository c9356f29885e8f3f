//! Test and helper mocks for shutter_core

use shutter_traits::{BoxError, KeyValueStore};

/// A store that remembers nothing; every read is "never written".
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStore;

impl KeyValueStore for NullStore {
    fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, BoxError> {
        Ok(None)
    }

    fn put(&mut self, _key: &str, _value: &[u8]) -> Result<(), BoxError> {
        Ok(())
    }
}
