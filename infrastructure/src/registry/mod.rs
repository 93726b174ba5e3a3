//! Backend tool registry.
//!
//! Tracks which connected backend advertises which tools. Registration
//! replaces a backend's whole descriptor set, so a reconnect with an
//! updated schema needs no separate update path.
//!
//! # Ambiguity policy
//!
//! Two backends may advertise the same tool name. Resolution then picks
//! the backend with the highest registration sequence, so the most recently
//! registered one wins. The policy is deliberate and covered by tests;
//! it is what lets an upgraded bot take over a name from a stale instance
//! that has not disconnected yet.
//!
//! The registry has its own lock, independent of the session store, and
//! resolution takes a read lock only; orchestration steps resolving
//! tools never contend with each other.

use crossbar_application::ports::tool_registry::{RegistryError, ToolRegistryPort};
use crossbar_domain::{BackendId, ToolDescriptor};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, info};

struct BackendEntry {
    /// Monotonic sequence stamped at registration; higher wins conflicts.
    seq: u64,
    tools: Vec<ToolDescriptor>,
}

#[derive(Default)]
struct RegistryInner {
    backends: HashMap<BackendId, BackendEntry>,
    next_seq: u64,
}

impl RegistryInner {
    /// The winning (descriptor, backend) for a name, if any backend
    /// advertises it.
    fn winner(&self, tool_name: &str) -> Option<(&ToolDescriptor, &BackendId)> {
        self.backends
            .iter()
            .filter_map(|(backend, entry)| {
                entry
                    .tools
                    .iter()
                    .find(|t| t.name == tool_name)
                    .map(|t| (entry.seq, t, backend))
            })
            .max_by_key(|(seq, _, _)| *seq)
            .map(|(_, tool, backend)| (tool, backend))
    }
}

/// Registry of tools advertised by connected backends.
pub struct BackendToolRegistry {
    inner: RwLock<RegistryInner>,
}

impl BackendToolRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner::default()),
        }
    }

    /// Number of currently registered backends.
    pub fn backend_count(&self) -> usize {
        self.inner.read().unwrap().backends.len()
    }
}

impl Default for BackendToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistryPort for BackendToolRegistry {
    fn register(&self, backend: BackendId, tools: Vec<ToolDescriptor>) {
        let mut inner = self.inner.write().unwrap();
        inner.next_seq += 1;
        let seq = inner.next_seq;
        info!(
            backend = %backend,
            tools = tools.len(),
            seq,
            "registered backend tools"
        );
        inner.backends.insert(backend, BackendEntry { seq, tools });
    }

    fn unregister(&self, backend: &BackendId) {
        let mut inner = self.inner.write().unwrap();
        if inner.backends.remove(backend).is_some() {
            info!(backend = %backend, "unregistered backend");
        }
    }

    fn resolve(&self, tool_name: &str) -> Result<(ToolDescriptor, BackendId), RegistryError> {
        let inner = self.inner.read().unwrap();
        inner
            .winner(tool_name)
            .map(|(tool, backend)| (tool.clone(), backend.clone()))
            .ok_or_else(|| {
                debug!(tool = tool_name, "resolution failed");
                RegistryError::UnknownTool(tool_name.to_string())
            })
    }

    fn descriptors(&self) -> Vec<ToolDescriptor> {
        let inner = self.inner.read().unwrap();
        // collect distinct names, then let the ambiguity policy pick each
        // name's descriptor
        let mut names: Vec<&str> = inner
            .backends
            .values()
            .flat_map(|e| e.tools.iter().map(|t| t.name.as_str()))
            .collect();
        names.sort_unstable();
        names.dedup();

        names
            .into_iter()
            .filter_map(|name| inner.winner(name).map(|(tool, _)| tool.clone()))
            .collect()
    }
}
