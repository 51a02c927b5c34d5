//! Forced routing context.
//!
//! # Responsibilities
//! - Let an enclosing call pin every nested call to one endpoint class
//! - Restore the enclosing decision exactly when a scope ends
//!
//! # Design Decisions
//! - The context is a value carried through the call chain, never a
//!   thread-local or a global; tasks that interleave on one worker cannot see
//!   each other's frames
//! - Frames form a persistent linked stack, so cloning a context is one `Arc`
//!   bump and a child scope never mutates its parent
//! - `enter` offers RAII scoping on a mutable context; the guard borrows the
//!   context mutably, so nested guards are released in strict LIFO order

use std::borrow::Cow;
use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use crate::routing::types::TargetClass;

#[derive(Debug)]
struct Frame {
    /// `None` is an explicit UNSET frame that hides enclosing forces.
    target: Option<TargetClass>,
    reason: Cow<'static, str>,
    parent: Option<Arc<Frame>>,
    depth: usize,
}

/// Stack of forced routing decisions for one logical call chain.
#[derive(Debug, Clone, Default)]
pub struct RoutingContext {
    top: Option<Arc<Frame>>,
}

impl RoutingContext {
    /// An empty context: nothing is forced.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forced target of the innermost frame, or `None` when nothing is forced.
    pub fn current(&self) -> Option<TargetClass> {
        self.top.as_ref().and_then(|frame| frame.target)
    }

    /// Reason recorded by the innermost frame.
    pub fn reason(&self) -> Option<&str> {
        self.top.as_ref().map(|frame| frame.reason.as_ref())
    }

    /// Reasons of every frame, innermost first.
    pub fn reasons(&self) -> impl Iterator<Item = &str> {
        std::iter::successors(self.top.as_deref(), |frame| frame.parent.as_deref())
            .map(|frame| frame.reason.as_ref())
    }

    /// Number of frames on the stack.
    pub fn depth(&self) -> usize {
        self.top.as_ref().map_or(0, |frame| frame.depth)
    }

    pub fn is_empty(&self) -> bool {
        self.top.is_none()
    }

    /// Child context forcing `target`. `self` is left untouched.
    pub fn forced(&self, target: TargetClass, reason: impl Into<Cow<'static, str>>) -> Self {
        self.push(Some(target), reason.into())
    }

    /// Child context with nothing forced, shadowing any enclosing force.
    pub fn released(&self, reason: impl Into<Cow<'static, str>>) -> Self {
        self.push(None, reason.into())
    }

    /// Run `f` with `target` forced for everything it triggers.
    pub fn with_forced<R>(
        &self,
        target: TargetClass,
        reason: impl Into<Cow<'static, str>>,
        f: impl FnOnce(&RoutingContext) -> R,
    ) -> R {
        let child = self.forced(target, reason);
        f(&child)
    }

    /// Run `f` with any enclosing force lifted.
    pub fn with_released<R>(
        &self,
        reason: impl Into<Cow<'static, str>>,
        f: impl FnOnce(&RoutingContext) -> R,
    ) -> R {
        let child = self.released(reason);
        f(&child)
    }

    /// Async form of [`with_forced`](Self::with_forced).
    ///
    /// The child context moves into the future, so dropping the future
    /// (cancellation, timeout) drops the frame with it.
    pub async fn with_forced_async<F, Fut, R>(
        &self,
        target: TargetClass,
        reason: impl Into<Cow<'static, str>>,
        f: F,
    ) -> R
    where
        F: FnOnce(RoutingContext) -> Fut,
        Fut: Future<Output = R>,
    {
        f(self.forced(target, reason)).await
    }

    /// Push a frame onto this context until the returned guard is dropped.
    pub fn enter(
        &mut self,
        target: TargetClass,
        reason: impl Into<Cow<'static, str>>,
    ) -> ContextGuard<'_> {
        let child = self.forced(target, reason);
        let previous = std::mem::replace(&mut self.top, child.top);
        ContextGuard {
            ctx: self,
            previous,
        }
    }

    fn push(&self, target: Option<TargetClass>, reason: Cow<'static, str>) -> Self {
        let depth = self.depth() + 1;
        Self {
            top: Some(Arc::new(Frame {
                target,
                reason,
                parent: self.top.clone(),
                depth,
            })),
        }
    }
}

/// Scope guard returned by [`RoutingContext::enter`].
///
/// Restores the previous top frame on drop, including during unwinding.
#[derive(Debug)]
pub struct ContextGuard<'a> {
    ctx: &'a mut RoutingContext,
    previous: Option<Arc<Frame>>,
}

impl Deref for ContextGuard<'_> {
    type Target = RoutingContext;

    fn deref(&self) -> &Self::Target {
        self.ctx
    }
}

impl DerefMut for ContextGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.ctx
    }
}

impl Drop for ContextGuard<'_> {
    fn drop(&mut self) {
        self.ctx.top = self.previous.take();
    }
}
