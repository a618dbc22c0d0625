//! Single-slot pending reply guard.
//!
//! The permission/service bridges keep at most one asynchronous reply
//! outstanding. A new method call always wins the slot: whatever was still
//! pending is failed with the fault recorded when it was installed.

use std::sync::Mutex;

use esprov_proto::Fault;
use tokio::sync::oneshot;

type ReplyResult = Result<bool, Fault>;

pub struct ReplySlot {
    inner: Mutex<Option<Pending>>,
}

struct Pending {
    tx: oneshot::Sender<ReplyResult>,
    superseded: Fault,
}

impl ReplySlot {
    pub fn new() -> Self {
        Self { inner: Mutex::new(None) }
    }

    /// Fail whatever reply is still outstanding. Called at the top of every
    /// method of the owning bridge.
    pub fn supersede(&self) {
        if let Some(pending) = self.inner.lock().unwrap().take() {
            log::debug!("superseding pending reply");
            let _ = pending.tx.send(Err(pending.superseded));
        }
    }

    /// Install a fresh waiter, superseding any prior one. `superseded` is
    /// the fault the waiter receives if the next call arrives first.
    pub fn begin(&self, superseded: Fault) -> oneshot::Receiver<ReplyResult> {
        let (tx, rx) = oneshot::channel();
        let prior = self.inner.lock().unwrap().replace(Pending { tx, superseded });
        if let Some(pending) = prior {
            log::debug!("superseding pending reply");
            let _ = pending.tx.send(Err(pending.superseded));
        }
        rx
    }

    /// Complete the outstanding reply. Returns `false` when nothing was
    /// waiting (a late OS callback after a supersede).
    pub fn resolve(&self, result: ReplyResult) -> bool {
        match self.inner.lock().unwrap().take() {
            Some(pending) => pending.tx.send(result).is_ok(),
            None => false,
        }
    }
}

impl Default for ReplySlot {
    fn default() -> Self {
        Self::new()
    }
}
