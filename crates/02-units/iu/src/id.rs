use std::borrow::Borrow;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Serialize, Serializer};

static NEXT_IU_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of an incremental unit. Never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct IuId(u64);

impl IuId {
    pub(crate) fn next() -> Self {
        IuId(NEXT_IU_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Id minted by another process or network. Only meaningful as a link
    /// target; never handed to a unit built here.
    pub fn from_raw(raw: u64) -> Self {
        IuId(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for IuId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "iu#{}", self.0)
    }
}

/// Name of a module; unique within one network.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(Arc<str>);

impl ModuleId {
    pub fn new(name: impl AsRef<str>) -> Self {
        ModuleId(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ModuleId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModuleId({})", self.0)
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModuleId {
    fn from(name: &str) -> Self {
        ModuleId::new(name)
    }
}

impl From<String> for ModuleId {
    fn from(name: String) -> Self {
        ModuleId(Arc::from(name))
    }
}

impl Serialize for ModuleId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}
