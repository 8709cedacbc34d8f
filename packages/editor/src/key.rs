//! Node identity.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_KEY: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a node across every state it appears in.
///
/// Keys are handed out from a process-wide counter, so ordering keys orders
/// nodes by creation. The root always has [`NodeKey::ROOT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey(u64);

impl NodeKey {
    pub const ROOT: NodeKey = NodeKey(0);

    pub(crate) fn generate() -> Self {
        NodeKey(NEXT_KEY.fetch_add(1, Ordering::Relaxed))
    }

    pub fn is_root(self) -> bool {
        self == Self::ROOT
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "root")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl FromStr for NodeKey {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "root" {
            return Ok(Self::ROOT);
        }
        s.parse::<u64>().map(NodeKey)
    }
}
