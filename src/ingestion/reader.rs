use std::collections::HashMap;
use std::io::Read;
use std::sync::{Arc, Mutex, OnceLock};

use crate::error::Error;

/// Process-wide mapping from an opaque ID to a byte stream. Callers register
/// a stream before executing a LOAD/STREAM statement that references it; a
/// registered stream unregisters itself when a read observes EOF.
fn registry() -> &'static Mutex<HashMap<String, Arc<Mutex<Box<dyn Read + Send>>>>> {
    static REGISTRY: OnceLock<Mutex<HashMap<String, Arc<Mutex<Box<dyn Read + Send>>>>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Registers a reader under the given ID, replacing any previous entry.
pub fn register(id: impl Into<String>, reader: impl Read + Send + 'static) {
    registry()
        .lock()
        .expect("reader registry lock poisoned")
        .insert(id.into(), Arc::new(Mutex::new(Box::new(reader))));
}

/// Returns the registered reader by ID.
pub fn get(id: &str) -> Result<RegisteredReader, Error> {
    let slot = registry()
        .lock()
        .expect("reader registry lock poisoned")
        .get(id)
        .cloned()
        .ok_or_else(|| Error::UnknownReader(id.to_string()))?;
    Ok(RegisteredReader {
        id: id.to_string(),
        inner: slot,
    })
}

/// Removes a registered reader.
pub fn unregister(id: &str) {
    registry().lock().expect("reader registry lock poisoned").remove(id);
}

pub fn is_registered(id: &str) -> bool {
    registry()
        .lock()
        .expect("reader registry lock poisoned")
        .contains_key(id)
}

/// Handle to a registered stream. The stream itself is not safe for
/// concurrent reads; the inner lock serializes them.
pub struct RegisteredReader {
    id: String,
    inner: Arc<Mutex<Box<dyn Read + Send>>>,
}

impl std::fmt::Debug for RegisteredReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredReader").field("id", &self.id).finish()
    }
}

impl Read for RegisteredReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self
            .inner
            .lock()
            .expect("registered reader lock poisoned")
            .read(buf)?;
        if n == 0 && !buf.is_empty() {
            unregister(&self.id);
        }
        Ok(n)
    }
}
