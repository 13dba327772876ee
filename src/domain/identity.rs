// ============================================================
// Layer 3 — Host Identity
// ============================================================
// Every worker in the cluster runs the same program. The platform
// tells each one who it is (`current`) and who the designated
// leader is (`master`). Leadership is a static equality check on
// that injected configuration; nothing is elected at runtime.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostIdentity {
    pub current: String,
    pub master:  String,
}

impl HostIdentity {
    pub fn new(current: impl Into<String>, master: impl Into<String>) -> Self {
        Self { current: current.into(), master: master.into() }
    }

    /// The leader is the only worker allowed to persist final artifacts.
    pub fn is_leader(&self) -> bool {
        self.current == self.master
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leader_when_hosts_match() {
        assert!(HostIdentity::new("algo-1", "algo-1").is_leader());
    }

    #[test]
    fn test_follower_when_hosts_differ() {
        assert!(!HostIdentity::new("algo-2", "algo-1").is_leader());
    }

    #[test]
    fn test_comparison_is_exact() {
        // No trimming or case folding: the platform hands out exact names.
        assert!(!HostIdentity::new("ALGO-1", "algo-1").is_leader());
        assert!(!HostIdentity::new("algo-1 ", "algo-1").is_leader());
    }
}
