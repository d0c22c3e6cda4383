use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use storm_core::{Flow, HookArg, HookFn};

// ============================================================================
// Mock Infrastructure
// ============================================================================

/// Stand-in for a mapped instance owning an event bus
#[derive(Debug)]
#[allow(dead_code)]
pub struct Owner {
    pub name: String,
}

impl Owner {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
        })
    }
}

/// Hook that counts its invocations and answers with a fixed flow
#[derive(Clone)]
pub struct CountingHook {
    pub hook: HookFn<Owner>,
    calls: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl CountingHook {
    pub fn new(name: &'static str, flow: Flow) -> Self {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let hook = HookFn::new(name, move |_: &Owner, _: &[HookArg]| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(flow)
        });
        Self { hook, calls }
    }

    pub fn continuing(name: &'static str) -> Self {
        Self::new(name, Flow::Continue)
    }

    pub fn detaching(name: &'static str) -> Self {
        Self::new(name, Flow::Detach)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}
