//! Barrier coordination.
//!
//! Every in-flight barrier request is registered here under its transaction
//! id as a one-shot completion; replies carry only the xid and switch id, so
//! the registry is a process-wide map rather than per-session closures.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use log::{debug, error};
use tokio::sync::oneshot;

use crate::error::Error;
use crate::message::{Message, SwitchId};
use crate::ofp_conn::ConnHandle;
use crate::ofp_header::Xid;

/// Hard deadline for a barrier reply.
pub const BARRIER_TIMEOUT: Duration = Duration::from_secs(15);

struct Waiter {
    switch: SwitchId,
    tx: oneshot::Sender<()>,
}

/// Process-wide map from outstanding barrier xids to completion signals.
pub struct BarrierRegistry {
    next_xid: AtomicU32,
    pending: Mutex<HashMap<Xid, Waiter>>,
}

impl Default for BarrierRegistry {
    fn default() -> Self {
        BarrierRegistry::new()
    }
}

impl BarrierRegistry {
    pub fn new() -> BarrierRegistry {
        BarrierRegistry {
            // xid 0 is reserved for unsolicited messages
            next_xid: AtomicU32::new(1),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Fresh transaction id; monotonically allocated.
    pub fn allocate_xid(&self) -> Xid {
        self.next_xid.fetch_add(1, Ordering::Relaxed)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    /// Resolve the waiter registered under `xid`, if any. Unknown xids are
    /// logged and ignored.
    pub fn resolve(&self, xid: Xid) {
        match self.pending.lock().unwrap().remove(&xid) {
            Some(waiter) => {
                if waiter.tx.send(()).is_err() {
                    debug!("barrier reply xid {} arrived after its waiter gave up", xid);
                }
            }
            None => error!("barrier reply with unknown xid {}", xid),
        }
    }

    /// Drop every waiter registered for `sw`, resolving each with a
    /// disconnect error.
    pub fn abandon_switch(&self, sw: SwitchId) {
        self.pending.lock().unwrap().retain(|_, w| w.switch != sw);
    }

    fn request(&self, sw: SwitchId, conn: &ConnHandle) -> Result<(Xid, oneshot::Receiver<()>), Error> {
        let xid = self.allocate_xid();
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .unwrap()
            .insert(xid, Waiter { switch: sw, tx });
        if let Err(e) = conn.send(xid, Message::BarrierRequest) {
            self.pending.lock().unwrap().remove(&xid);
            return Err(e);
        }
        Ok((xid, rx))
    }

    /// Emit a barrier request to the switch and wait for its reply.
    pub async fn send_barrier(&self, sw: SwitchId, conn: &ConnHandle) -> Result<(), Error> {
        let (_xid, rx) = self.request(sw, conn)?;
        rx.await.map_err(|_| Error::SwitchDisconnect(sw))
    }

    /// [`send_barrier`](Self::send_barrier) under a hard deadline.
    ///
    /// On timeout the registry entry stays behind: the late reply (or the
    /// switch teardown) removes it, and finding no live waiter then is
    /// benign.
    pub async fn send_barrier_timeout(
        &self,
        sw: SwitchId,
        conn: &ConnHandle,
        deadline: Duration,
    ) -> Result<(), Error> {
        let (xid, rx) = self.request(sw, conn)?;
        match tokio::time::timeout(deadline, rx).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(Error::SwitchDisconnect(sw)),
            Err(_) => Err(Error::BarrierTimeout { xid }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::time::Instant;

    #[test]
    fn xids_are_monotonic() {
        let registry = BarrierRegistry::new();
        let a = registry.allocate_xid();
        let b = registry.allocate_xid();
        assert!(b > a);
    }

    #[test]
    fn unknown_xid_is_ignored() {
        let registry = BarrierRegistry::new();
        registry.resolve(42);
        assert_eq!(registry.pending_count(), 0);
    }

    #[tokio::test]
    async fn barrier_resolves_on_reply() {
        let registry = Arc::new(BarrierRegistry::new());
        let (conn, mut rx) = ConnHandle::pair();

        let waiting = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.send_barrier(1, &conn).await })
        };

        let (xid, msg) = rx.recv().await.unwrap();
        assert_eq!(msg, Message::BarrierRequest);
        registry.resolve(xid);

        waiting.await.unwrap().unwrap();
        assert_eq!(registry.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn barrier_times_out_after_deadline() {
        let registry = BarrierRegistry::new();
        // switch that never replies
        let (conn, mut rx) = ConnHandle::pair();

        let started = Instant::now();
        let result = registry.send_barrier_timeout(1, &conn, BARRIER_TIMEOUT).await;
        assert!(matches!(result, Err(Error::BarrierTimeout { .. })));
        assert!(started.elapsed() >= BARRIER_TIMEOUT);

        // the entry stays for the late reply to clean up
        assert_eq!(registry.pending_count(), 1);
        let (xid, _) = rx.try_recv().expect("barrier request was sent");
        registry.resolve(xid);
        assert_eq!(registry.pending_count(), 0);
    }

    #[tokio::test]
    async fn abandoning_a_switch_fails_its_waiters() {
        let registry = Arc::new(BarrierRegistry::new());
        let (conn, _rx) = ConnHandle::pair();

        let waiting = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.send_barrier(7, &conn).await })
        };
        tokio::task::yield_now().await;

        registry.abandon_switch(7);
        assert!(matches!(
            waiting.await.unwrap(),
            Err(Error::SwitchDisconnect(7))
        ));
        assert_eq!(registry.pending_count(), 0);
    }

    #[tokio::test]
    async fn send_failure_cleans_the_entry() {
        let registry = BarrierRegistry::new();
        let (conn, rx) = ConnHandle::pair();
        drop(rx);
        assert!(matches!(
            registry.send_barrier(3, &conn).await,
            Err(Error::SendDropped)
        ));
        assert_eq!(registry.pending_count(), 0);
    }
}
