use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// In-flight marker for a controller (Pending/Sending). Claimed with compare-and-swap before
/// any side effect; released when the returned guard drops.
#[derive(Debug, Default)]
pub(crate) struct BusyFlag(Arc<AtomicBool>);

impl BusyFlag {
    pub fn try_claim(&self) -> Option<BusyGuard> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard(self.0.clone()))
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn probe(&self) -> BusyProbe {
        BusyProbe(self.0.clone())
    }
}

pub(crate) struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Read-only view of a [`BusyFlag`] for presentation layers (typing/pending indicators).
/// The default probe is permanently idle.
#[derive(Debug, Clone, Default)]
pub struct BusyProbe(Arc<AtomicBool>);

impl BusyProbe {
    pub fn get(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_is_exclusive_until_guard_drops() {
        let flag = BusyFlag::default();
        let probe = flag.probe();
        let guard = flag.try_claim();
        assert!(guard.is_some());
        assert!(flag.try_claim().is_none());
        assert!(probe.get());
        drop(guard);
        assert!(!flag.is_set());
        assert!(flag.try_claim().is_some());
    }
}
