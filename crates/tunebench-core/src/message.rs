//! Message types for actor communication
//!
//! Message handlers are implemented in `actor::tuning`.

use crate::config::{EnvTestSpec, ProfileSpec, RingBufferSpec};

/// List nodes matching the configured selector
#[derive(Debug, Default)]
pub struct ListNodes {
    /// Bypass the cache
    pub force_refresh: bool,
}

/// Drop every cached inventory fact
#[derive(Debug)]
pub struct InvalidateInventory;

/// Set ring buffer sizes
#[derive(Debug)]
pub struct ApplyRingBuffers {
    /// Explicit targets; `None` means every selected node
    pub targets: Option<Vec<String>>,
    pub specs: Vec<RingBufferSpec>,
}

/// Switch the tuned profile
#[derive(Debug)]
pub struct ApplyProfile {
    /// Explicit targets; `None` means every selected node
    pub targets: Option<Vec<String>>,
    pub profile: ProfileSpec,
}

/// Reboot nodes and wait for them to come back
#[derive(Debug)]
pub struct RebootNodes {
    /// Explicit targets; `None` means every selected node
    pub targets: Option<Vec<String>>,
}

/// Run a client/server environment test
#[derive(Debug)]
pub struct RunEnvTest {
    pub spec: EnvTestSpec,
}
