//! Per-switch session state.
//!
//! A session is created when a switch completes the handshake and destroyed
//! on disconnect. It records the policy compiled for the switch (driving
//! packet-in evaluation) and the edge table the switch is known to hold,
//! which the consistent updater diffs against.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::message::{Priority, SwitchId};
use crate::ofp_conn::ConnHandle;
use crate::policy::Policy;
use crate::table::FlowEntry;

pub struct SwitchSession {
    pub id: SwitchId,
    conn: ConnHandle,
    /// Policy last installed on this switch; packet-ins are evaluated
    /// against it. `None` until the first install completes.
    pub compiled_local: Option<Arc<dyn Policy>>,
    /// Edge table as of the last acknowledged install, in strictly
    /// decreasing priority.
    pub installed_edge: Vec<(Priority, FlowEntry)>,
}

impl SwitchSession {
    pub fn new(id: SwitchId, conn: ConnHandle) -> SwitchSession {
        SwitchSession {
            id,
            conn,
            compiled_local: None,
            installed_edge: Vec::new(),
        }
    }

    pub fn conn(&self) -> ConnHandle {
        self.conn.clone()
    }
}

/// Shared map of live switch sessions.
#[derive(Clone, Default)]
pub struct SessionMap(Arc<Mutex<HashMap<SwitchId, SwitchSession>>>);

impl SessionMap {
    pub fn new() -> SessionMap {
        SessionMap::default()
    }

    /// Insert a session, returning true when it replaced a live one with the
    /// same datapath id.
    pub fn insert(&self, session: SwitchSession) -> bool {
        self.0
            .lock()
            .unwrap()
            .insert(session.id, session)
            .is_some()
    }

    pub fn remove(&self, sw: SwitchId) -> bool {
        self.0.lock().unwrap().remove(&sw).is_some()
    }

    pub fn contains(&self, sw: SwitchId) -> bool {
        self.0.lock().unwrap().contains_key(&sw)
    }

    /// Ids of all connected switches, in stable order.
    pub fn switches(&self) -> Vec<SwitchId> {
        let mut ids: Vec<_> = self.0.lock().unwrap().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn conn(&self, sw: SwitchId) -> Option<ConnHandle> {
        self.0.lock().unwrap().get(&sw).map(|s| s.conn())
    }

    pub fn policy(&self, sw: SwitchId) -> Option<Arc<dyn Policy>> {
        self.0
            .lock()
            .unwrap()
            .get(&sw)
            .and_then(|s| s.compiled_local.clone())
    }

    pub fn set_policy(&self, sw: SwitchId, policy: Arc<dyn Policy>) {
        if let Some(session) = self.0.lock().unwrap().get_mut(&sw) {
            session.compiled_local = Some(policy);
        }
    }

    pub fn installed_edge(&self, sw: SwitchId) -> Vec<(Priority, FlowEntry)> {
        self.0
            .lock()
            .unwrap()
            .get(&sw)
            .map(|s| s.installed_edge.clone())
            .unwrap_or_default()
    }

    pub fn set_installed_edge(&self, sw: SwitchId, table: Vec<(Priority, FlowEntry)>) {
        debug_assert!(table.windows(2).all(|w| w[0].0 > w[1].0));
        if let Some(session) = self.0.lock().unwrap().get_mut(&sw) {
            session.installed_edge = table;
        }
    }
}
