//! L2 Organism Layer: Mounted composition arena
//!
//! Holds every live [`CompositionRoot`] keyed by a [`SessionId`]. Unmounting
//! a session drops its root, which releases all of its host listeners.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::composition::{CompositionRoot, FrameSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Default)]
pub struct MotionRegistry {
    roots: BTreeMap<SessionId, CompositionRoot>,
}

impl MotionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `root` and return its session handle
    pub fn mount(&mut self, root: CompositionRoot) -> SessionId {
        let id = SessionId::new();
        tracing::info!("Mounted composition session {}", id);
        self.roots.insert(id, root);
        id
    }

    /// Tear down a session; false when it was not mounted
    pub fn unmount(&mut self, id: SessionId) -> bool {
        match self.roots.remove(&id) {
            Some(root) => {
                root.unmount();
                tracing::info!("Unmounted composition session {}", id);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: SessionId) -> Option<&CompositionRoot> {
        self.roots.get(&id)
    }

    pub fn get_mut(&mut self, id: SessionId) -> Option<&mut CompositionRoot> {
        self.roots.get_mut(&id)
    }

    pub fn sessions(&self) -> impl Iterator<Item = SessionId> + '_ {
        self.roots.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Advance every mounted root by one frame
    pub fn tick_all(&mut self, dt: f64) -> Vec<(SessionId, FrameSnapshot)> {
        self.roots
            .iter_mut()
            .map(|(id, root)| (*id, root.tick(dt).clone()))
            .collect()
    }
}

impl fmt::Debug for MotionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MotionRegistry")
            .field("sessions", &self.roots.keys().collect::<Vec<_>>())
            .finish()
    }
}
