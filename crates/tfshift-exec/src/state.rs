//! State and plan documents
//!
//! Both are opaque byte snapshots: tfshift never interprets their contents,
//! it only hands them back to terraform.

use std::path::Path;
use std::sync::Arc;

/// Immutable snapshot of a terraform state document
///
/// Cloning is cheap; every transform returns a new `State`.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct State {
    bytes: Arc<[u8]>,
}

impl State {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        let bytes: Vec<u8> = bytes.into();
        Self {
            bytes: Arc::from(bytes),
        }
    }

    /// An empty document, which terraform treats as "no state yet"
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }
}

impl std::fmt::Debug for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "State({} bytes)", self.bytes.len())
    }
}

/// A saved plan file produced by `terraform plan -out`
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Plan {
    bytes: Arc<[u8]>,
}

impl Plan {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        let bytes: Vec<u8> = bytes.into();
        Self {
            bytes: Arc::from(bytes),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl std::fmt::Debug for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Plan({} bytes)", self.bytes.len())
    }
}

/// Where a state document lives for a single command
///
/// `Memory` documents are copied to a scratch file and read back, so the
/// caller receives a new `State`. `File` documents are mutated in place.
#[derive(Debug, Clone, Copy)]
pub enum StateRef<'a> {
    Memory(&'a State),
    File(&'a Path),
}

impl StateRef<'_> {
    pub fn is_file(&self) -> bool {
        matches!(self, StateRef::File(_))
    }
}
