use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What a hook wants the bus to do with it after it ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep the hook registered
    Continue,
    /// Unregister the hook once the current emit finishes
    Detach,
}

/// Errors a hook can report back to the bus
///
/// These never reach the caller of `emit`; the bus logs them and moves on
/// to the next hook.
#[derive(Debug, Error)]
pub enum HookError {
    #[error("Hook failed: {0}")]
    Failed(String),

    #[error("Hook panicked: {0}")]
    Panic(String),
}

impl HookError {
    /// Create a failure with the given message
    pub fn failed(msg: impl Into<String>) -> Self {
        HookError::Failed(msg.into())
    }
}

pub type HookResult = Result<Flow, HookError>;

/// A value passed to hooks, either at emit time or as extra data bound at
/// registration time
///
/// Extra data takes part in hook identity, so every variant is hashable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HookArg {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
    Bytes(Vec<u8>),
}

impl HookArg {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            HookArg::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            HookArg::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            HookArg::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<bool> for HookArg {
    fn from(value: bool) -> Self {
        HookArg::Bool(value)
    }
}

impl From<i64> for HookArg {
    fn from(value: i64) -> Self {
        HookArg::Int(value)
    }
}

impl From<i32> for HookArg {
    fn from(value: i32) -> Self {
        HookArg::Int(value.into())
    }
}

impl From<&str> for HookArg {
    fn from(value: &str) -> Self {
        HookArg::Text(value.to_string())
    }
}

impl From<String> for HookArg {
    fn from(value: String) -> Self {
        HookArg::Text(value)
    }
}

impl From<Vec<u8>> for HookArg {
    fn from(value: Vec<u8>) -> Self {
        HookArg::Bytes(value)
    }
}

type Callback<O> = dyn Fn(&O, &[HookArg]) -> HookResult + Send + Sync;

/// Handle to a hook callback
///
/// The callback receives the bus owner followed by the emit arguments and
/// then the extra data the hook was registered with. Clones share identity:
/// two handles compare equal only when they point at the same callback.
pub struct HookFn<O> {
    name: Cow<'static, str>,
    callback: Arc<Callback<O>>,
}

impl<O> HookFn<O> {
    pub fn new<F>(name: impl Into<Cow<'static, str>>, callback: F) -> Self
    where
        F: Fn(&O, &[HookArg]) -> HookResult + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            callback: Arc::new(callback),
        }
    }

    /// Human-readable name used when logging hook failures
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn call(&self, owner: &O, args: &[HookArg]) -> HookResult {
        (self.callback)(owner, args)
    }

    fn addr(&self) -> *const () {
        Arc::as_ptr(&self.callback) as *const ()
    }
}

impl<O> Clone for HookFn<O> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            callback: Arc::clone(&self.callback),
        }
    }
}

impl<O> PartialEq for HookFn<O> {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl<O> Eq for HookFn<O> {}

impl<O> Hash for HookFn<O> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl<O> fmt::Debug for HookFn<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookFn")
            .field("name", &self.name)
            .field("addr", &self.addr())
            .finish()
    }
}

/// A registered (callback, extra data) pair
pub(crate) struct Hook<O> {
    pub(crate) callback: HookFn<O>,
    pub(crate) data: Vec<HookArg>,
}

impl<O> Clone for Hook<O> {
    fn clone(&self) -> Self {
        Self {
            callback: self.callback.clone(),
            data: self.data.clone(),
        }
    }
}

impl<O> PartialEq for Hook<O> {
    fn eq(&self, other: &Self) -> bool {
        self.callback == other.callback && self.data == other.data
    }
}

impl<O> Eq for Hook<O> {}

impl<O> Hash for Hook<O> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.callback.hash(state);
        self.data.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_clones_share_identity() {
        let hook = HookFn::<()>::new("noop", |_: &(), _: &[HookArg]| Ok(Flow::Continue));
        let other = HookFn::<()>::new("noop", |_: &(), _: &[HookArg]| Ok(Flow::Continue));

        assert_eq!(hook, hook.clone());
        assert_ne!(hook, other, "same name does not make the same hook");
    }

    #[test]
    fn test_hook_identity_includes_data() {
        let callback = HookFn::<()>::new("noop", |_: &(), _: &[HookArg]| Ok(Flow::Continue));
        let mut set = HashSet::new();

        set.insert(Hook {
            callback: callback.clone(),
            data: vec![HookArg::from(1)],
        });
        set.insert(Hook {
            callback: callback.clone(),
            data: vec![HookArg::from(1)],
        });
        set.insert(Hook {
            callback,
            data: vec![HookArg::from("other")],
        });

        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_arg_accessors() {
        assert_eq!(HookArg::from("name").as_str(), Some("name"));
        assert_eq!(HookArg::from(true).as_bool(), Some(true));
        assert_eq!(HookArg::from(7i64).as_int(), Some(7));
        assert_eq!(HookArg::Null.as_str(), None);
    }
}
