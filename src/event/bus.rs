use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use parking_lot::ReentrantMutex;
use tracing::{debug, error};

use super::hook::{Flow, Hook, HookArg, HookError, HookFn};

type HookTable<O> = HashMap<String, HashSet<Hook<O>>>;

/// Outcome of a single `emit` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitReport {
    /// Hooks that were called
    pub invoked: usize,
    /// Hooks that returned an error or panicked
    pub failed: usize,
    /// Hooks removed because they asked to detach
    pub detached: usize,
}

/// Hook dispatcher owned by a single object
///
/// Hooks are stored per event name without ordering: no call order may be
/// assumed when an event is emitted. The owner is held weakly and passed
/// as the first argument to every hook; once it is gone, emitting is a
/// no-op.
///
/// Cloning yields another handle to the same hook table.
pub struct EventBus<O> {
    owner: Weak<O>,
    /// Guards bookkeeping only; hooks always run with the lock released.
    hooks: Arc<ReentrantMutex<RefCell<HookTable<O>>>>,
}

impl<O> Clone for EventBus<O> {
    fn clone(&self) -> Self {
        Self {
            owner: self.owner.clone(),
            hooks: Arc::clone(&self.hooks),
        }
    }
}

impl<O> fmt::Debug for EventBus<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.hooks.lock();
        let table = guard.borrow();
        f.debug_struct("EventBus")
            .field("owner_alive", &(self.owner.strong_count() > 0))
            .field("events", &table.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<O> EventBus<O> {
    /// Creates a bus owned by `owner`
    pub fn new(owner: &Arc<O>) -> Self {
        Self::with_owner(Arc::downgrade(owner))
    }

    /// Creates a bus from an existing weak handle, e.g. inside `Arc::new_cyclic`
    pub fn with_owner(owner: Weak<O>) -> Self {
        Self {
            owner,
            hooks: Arc::new(ReentrantMutex::new(RefCell::new(HashMap::new()))),
        }
    }

    /// The owner, if it is still alive
    pub fn owner(&self) -> Option<Arc<O>> {
        self.owner.upgrade()
    }

    /// Registers `callback` for `name` with the given extra data
    ///
    /// Registering the same (callback, data) pair twice is a no-op. Returns
    /// whether the pair was newly added.
    pub fn hook(&self, name: &str, callback: &HookFn<O>, data: Vec<HookArg>) -> bool {
        let guard = self.hooks.lock();
        let mut table = guard.borrow_mut();
        let inserted = table.entry(name.to_string()).or_default().insert(Hook {
            callback: callback.clone(),
            data,
        });

        debug!(
            event = %name,
            hook = callback.name(),
            inserted,
            "Hook registered"
        );
        inserted
    }

    /// Unregisters the (callback, data) pair for `name`
    ///
    /// Unknown pairs are ignored. Returns whether anything was removed.
    pub fn unhook(&self, name: &str, callback: &HookFn<O>, data: &[HookArg]) -> bool {
        let probe = Hook {
            callback: callback.clone(),
            data: data.to_vec(),
        };

        let guard = self.hooks.lock();
        let mut table = guard.borrow_mut();
        let Some(hooks) = table.get_mut(name) else {
            return false;
        };
        let removed = hooks.remove(&probe);
        if hooks.is_empty() {
            table.remove(name);
        }

        debug!(event = %name, hook = callback.name(), removed, "Hook unregistered");
        removed
    }

    /// Whether any hook is registered for `name`
    pub fn has_hooks(&self, name: &str) -> bool {
        self.hook_count(name) > 0
    }

    /// Number of (callback, data) pairs registered for `name`
    pub fn hook_count(&self, name: &str) -> usize {
        let guard = self.hooks.lock();
        let table = guard.borrow();
        table.get(name).map_or(0, HashSet::len)
    }

    /// Calls every hook registered for `name`
    ///
    /// Each hook receives the owner, then `args`, then its own extra data.
    /// The hook set is copied under the lock and the hooks run after it is
    /// released, so a hook may freely hook, unhook or emit on this bus.
    /// Hooks added while an emit is running are picked up by the next emit.
    pub fn emit(&self, name: &str, args: &[HookArg]) -> EmitReport {
        let mut report = EmitReport::default();

        let Some(owner) = self.owner.upgrade() else {
            debug!(event = %name, "Owner dropped - skipping emit");
            return report;
        };

        let snapshot: Vec<Hook<O>> = {
            let guard = self.hooks.lock();
            let table = guard.borrow();
            match table.get(name) {
                Some(hooks) => hooks.iter().cloned().collect(),
                None => Vec::new(),
            }
        };

        if snapshot.is_empty() {
            return report;
        }

        let mut detached = Vec::new();
        for hook in snapshot {
            let mut call_args = Vec::with_capacity(args.len() + hook.data.len());
            call_args.extend_from_slice(args);
            call_args.extend_from_slice(&hook.data);

            report.invoked += 1;
            let outcome =
                panic::catch_unwind(AssertUnwindSafe(|| hook.callback.call(&owner, &call_args)))
                    .unwrap_or_else(|payload| Err(HookError::Panic(panic_message(payload.as_ref()))));

            match outcome {
                Ok(Flow::Continue) => {}
                Ok(Flow::Detach) => detached.push(hook),
                Err(e) => {
                    report.failed += 1;
                    let trace = Backtrace::capture();
                    error!(
                        event = %name,
                        hook = hook.callback.name(),
                        error = %e,
                        details = ?e,
                        trace = %trace,
                        "Error executing hook"
                    );
                }
            }
        }

        if !detached.is_empty() {
            let guard = self.hooks.lock();
            let mut table = guard.borrow_mut();
            // Another thread may have unhooked everything in the meantime
            if let Some(current) = table.get_mut(name) {
                for hook in &detached {
                    if current.remove(hook) {
                        report.detached += 1;
                    }
                }
                if current.is_empty() {
                    table.remove(name);
                }
            }
        }

        debug!(
            event = %name,
            invoked = report.invoked,
            failed = report.failed,
            detached = report.detached,
            "Event emitted"
        );
        report
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
