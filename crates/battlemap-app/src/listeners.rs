//! Window listener bookkeeping for the replay host.
//!
//! A browser host would add window event listeners in `attach` and remove
//! them in `detach`. The replay host records which listeners are live and
//! only routes pointer moves and releases while one is attached.

use battlemap_core::gesture::{ListenerKind, ListenerRegistry, SessionId};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct WindowListeners {
    active: HashMap<SessionId, Vec<ListenerKind>>,
    attached: usize,
    detached: usize,
}

impl WindowListeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any live session listens for `kind`.
    pub fn is_listening(&self, kind: ListenerKind) -> bool {
        self.active.values().any(|kinds| kinds.contains(&kind))
    }

    /// Number of live sessions.
    pub fn live(&self) -> usize {
        self.active.len()
    }

    /// Total attach and detach calls so far.
    pub fn totals(&self) -> (usize, usize) {
        (self.attached, self.detached)
    }
}

impl ListenerRegistry for WindowListeners {
    fn attach(&mut self, session: SessionId, kinds: &[ListenerKind]) {
        log::trace!("attach {:?} for {}", kinds, session);
        self.attached += 1;
        self.active.insert(session, kinds.to_vec());
    }

    fn detach(&mut self, session: SessionId, kinds: &[ListenerKind]) {
        log::trace!("detach {:?} for {}", kinds, session);
        self.detached += 1;
        if self.active.remove(&session).is_none() {
            log::warn!("detach for unknown session {}", session);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_attach_detach() {
        let mut listeners = WindowListeners::new();
        let id = Uuid::new_v4();
        assert!(!listeners.is_listening(ListenerKind::PointerMove));

        listeners.attach(id, &[ListenerKind::PointerMove, ListenerKind::PointerUp]);
        assert!(listeners.is_listening(ListenerKind::PointerUp));
        assert!(!listeners.is_listening(ListenerKind::KeyUp));
        assert_eq!(listeners.live(), 1);

        listeners.detach(id, &[ListenerKind::PointerMove, ListenerKind::PointerUp]);
        assert_eq!(listeners.live(), 0);
        assert_eq!(listeners.totals(), (1, 1));
    }
}
