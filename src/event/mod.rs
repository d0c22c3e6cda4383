// Object lifecycle hooks
//
// Every mapped instance owns an `EventBus`. Interested parties hook
// callbacks onto named events ("changed", "loaded", "flushed", ...) and the
// object-mapping layer emits those events as the instance changes state.

pub use bus::{EmitReport, EventBus};
pub use hook::{Flow, HookArg, HookError, HookFn, HookResult};

mod bus;
mod hook;
