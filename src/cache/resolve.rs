use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::error::Result;

use super::slot::Slot;
use super::SlotFuture;

/// Resolves to the value of a cache slot, sharing the in flight load if there is one.
#[must_use = "futures do nothing unless you `.await` or poll them"]
#[pin_project::pin_project(project = ResolveProj)]
pub enum Resolve<V> {
    Ready(Option<Result<V>>),
    Waiting(#[pin] SlotFuture<V>),
}

impl<V> From<Slot<V>> for Resolve<V> {
    fn from(slot: Slot<V>) -> Self {
        match slot {
            Slot::Pending(fut) => Resolve::Waiting(fut),
            Slot::Resolved(v) => Resolve::Ready(Some(Ok(v))),
            Slot::Failed(e) => Resolve::Ready(Some(Err(e))),
        }
    }
}

impl<V: Clone> Future for Resolve<V> {
    type Output = Result<V>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.project() {
            ResolveProj::Ready(out) => {
                Poll::Ready(out.take().expect("Resolve polled after completion"))
            }
            ResolveProj::Waiting(fut) => fut.poll(cx),
        }
    }
}
