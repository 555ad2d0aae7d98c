//! # DomPatcher
//!
//! Owns one render target node and keeps it in sync with a render function:
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use trellis_dom::*;
//!
//! let doc = Rc::new(RefCell::new(Document::new()));
//! let frames = Rc::new(FrameQueue::new());
//! let patcher = DomPatcher::new(
//!     doc.clone(),
//!     &1,
//!     |n: &i32| Ok(h("p").child(format!("n = {n}")).into()),
//!     PatcherOptions::new(frames.clone()),
//! )
//! .unwrap();
//!
//! patcher.update(&2).unwrap();
//! patcher.update(&3).unwrap();
//! frames.run_frame(); // one render, showing 3
//! let el = patcher.el().unwrap();
//! assert_eq!(doc.borrow().text_content(el), "n = 3");
//! ```
//!
//! In [`UpdateMode::Async`] every update before the next frame is coalesced
//! and only the latest state is rendered. [`UpdateMode::Sync`] renders inline.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::diff;
use crate::document::{Document, NodeId};
use crate::error::RenderError;
use crate::scheduler::FrameScheduler;
use crate::vnode::VNode;

pub type RenderFn<S> = Rc<dyn Fn(&S) -> Result<VNode, RenderError>>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UpdateMode {
    #[default]
    Async,
    Sync,
}

#[derive(Clone)]
pub struct PatcherOptions {
    pub mode: UpdateMode,
    pub scheduler: Rc<dyn FrameScheduler>,
}

impl PatcherOptions {
    pub fn new(scheduler: Rc<dyn FrameScheduler>) -> Self {
        Self {
            mode: UpdateMode::Async,
            scheduler,
        }
    }

    pub fn sync(mut self, sync: bool) -> Self {
        self.mode = if sync {
            UpdateMode::Sync
        } else {
            UpdateMode::Async
        };
        self
    }
}

pub struct DomPatcher<S: Clone + 'static> {
    inner: Rc<Inner<S>>,
}

impl<S: Clone + 'static> Clone for DomPatcher<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct Inner<S> {
    doc: RefCell<Option<Rc<RefCell<Document>>>>,
    render: RefCell<Option<RenderFn<S>>>,
    state: RefCell<Option<S>>,
    pending: RefCell<Option<S>>,
    vtree: RefCell<Option<VNode>>,
    el: Cell<Option<NodeId>>,
    mode: UpdateMode,
    scheduler: Rc<dyn FrameScheduler>,
    frame_requested: Cell<bool>,
    renders: Cell<u64>,
}

impl<S: Clone + 'static> DomPatcher<S> {
    /// Renders `state` once and builds the (detached) target node.
    pub fn new(
        doc: Rc<RefCell<Document>>,
        state: &S,
        render: impl Fn(&S) -> Result<VNode, RenderError> + 'static,
        options: PatcherOptions,
    ) -> Result<Self, RenderError> {
        let render: RenderFn<S> = Rc::new(render);
        let vnode = render(state)?;
        let el = diff::create(&mut doc.borrow_mut(), &vnode)?;
        Ok(Self {
            inner: Rc::new(Inner {
                doc: RefCell::new(Some(doc)),
                render: RefCell::new(Some(render)),
                state: RefCell::new(Some(state.clone())),
                pending: RefCell::new(None),
                vtree: RefCell::new(Some(vnode)),
                el: Cell::new(Some(el)),
                mode: options.mode,
                scheduler: options.scheduler,
                frame_requested: Cell::new(false),
                renders: Cell::new(1),
            }),
        })
    }

    /// Current root node; `None` once disconnected.
    pub fn el(&self) -> Option<NodeId> {
        self.inner.el.get()
    }

    pub fn mode(&self) -> UpdateMode {
        self.inner.mode
    }

    pub fn is_connected(&self) -> bool {
        self.inner.render.borrow().is_some()
    }

    /// Number of successful renders, the initial one included.
    pub fn render_count(&self) -> u64 {
        self.inner.renders.get()
    }

    pub fn has_pending(&self) -> bool {
        self.inner.pending.borrow().is_some()
    }

    pub fn update(&self, state: &S) -> Result<(), RenderError> {
        if !self.is_connected() {
            return Ok(());
        }
        match self.inner.mode {
            UpdateMode::Sync => {
                *self.inner.state.borrow_mut() = Some(state.clone());
                self.render()
            }
            UpdateMode::Async => {
                *self.inner.pending.borrow_mut() = Some(state.clone());
                if !self.inner.frame_requested.replace(true) {
                    let weak = Rc::downgrade(&self.inner);
                    self.inner.scheduler.request_frame(Box::new(move || {
                        if let Some(inner) = weak.upgrade() {
                            DomPatcher { inner }.flush_pending();
                        }
                    }));
                }
                Ok(())
            }
        }
    }

    fn flush_pending(&self) {
        self.inner.frame_requested.set(false);
        let Some(next) = self.inner.pending.borrow_mut().take() else {
            return;
        };
        *self.inner.state.borrow_mut() = Some(next);
        if let Err(err) = self.render() {
            log::warn!("deferred render failed: {err}");
        }
    }

    /// Renders the current state and patches the DOM.
    pub fn render(&self) -> Result<(), RenderError> {
        let Some(render) = self.inner.render.borrow().clone() else {
            return Ok(());
        };
        let Some(state) = self.inner.state.borrow().clone() else {
            return Ok(());
        };
        let vnode = render(&state)?;

        // the render function may have disconnected us
        let Some(doc) = self.inner.doc.borrow().clone() else {
            return Ok(());
        };
        let el = {
            let mut doc = doc.borrow_mut();
            let old = self.inner.vtree.borrow();
            match (old.as_ref(), self.inner.el.get()) {
                (Some(old), Some(el)) => diff::patch(&mut doc, el, old, &vnode)?,
                _ => diff::create(&mut doc, &vnode)?,
            }
        };
        self.inner.el.set(Some(el));
        *self.inner.vtree.borrow_mut() = Some(vnode);
        self.inner.renders.set(self.inner.renders.get() + 1);
        Ok(())
    }

    /// Drops every reference held by the patcher. Safe to call repeatedly.
    pub fn disconnect(&self) {
        self.inner.render.borrow_mut().take();
        self.inner.state.borrow_mut().take();
        self.inner.pending.borrow_mut().take();
        self.inner.vtree.borrow_mut().take();
        self.inner.doc.borrow_mut().take();
        self.inner.el.set(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::FrameQueue;
    use crate::vnode::h;

    fn counting_patcher(
        mode: UpdateMode,
    ) -> (Rc<RefCell<Document>>, Rc<FrameQueue>, Rc<Cell<u32>>, DomPatcher<i32>) {
        let doc = Rc::new(RefCell::new(Document::new()));
        let frames = Rc::new(FrameQueue::new());
        let calls = Rc::new(Cell::new(0));
        let c = calls.clone();
        let patcher = DomPatcher::new(
            doc.clone(),
            &0,
            move |n: &i32| {
                c.set(c.get() + 1);
                Ok(h("span").child(n.to_string()).into())
            },
            PatcherOptions::new(frames.clone()).sync(mode == UpdateMode::Sync),
        )
        .unwrap();
        (doc, frames, calls, patcher)
    }

    #[test]
    fn async_updates_coalesce_to_latest_state() {
        let (doc, frames, calls, patcher) = counting_patcher(UpdateMode::Async);
        assert_eq!(calls.get(), 1);

        patcher.update(&1).unwrap();
        patcher.update(&2).unwrap();
        patcher.update(&3).unwrap();
        assert_eq!(calls.get(), 1);
        assert_eq!(frames.pending(), 1);

        frames.run_frame();
        assert_eq!(calls.get(), 2);
        let el = patcher.el().unwrap();
        assert_eq!(doc.borrow().text_content(el), "3");
    }

    #[test]
    fn sync_updates_render_inline() {
        let (doc, frames, calls, patcher) = counting_patcher(UpdateMode::Sync);
        patcher.update(&7).unwrap();
        assert_eq!(calls.get(), 2);
        assert_eq!(frames.pending(), 0);
        assert_eq!(doc.borrow().text_content(patcher.el().unwrap()), "7");
    }

    #[test]
    fn pending_frame_after_disconnect_is_a_no_op() {
        let (_doc, frames, calls, patcher) = counting_patcher(UpdateMode::Async);
        patcher.update(&5).unwrap();
        patcher.disconnect();
        patcher.disconnect();
        frames.run_frame();
        assert_eq!(calls.get(), 1);
        assert_eq!(patcher.el(), None);
    }

    #[test]
    fn failing_render_keeps_previous_output() {
        let doc = Rc::new(RefCell::new(Document::new()));
        let frames = Rc::new(FrameQueue::new());
        let patcher = DomPatcher::new(
            doc.clone(),
            &1,
            |n: &i32| {
                if *n < 0 {
                    Err(RenderError::new("negative"))
                } else {
                    Ok(h("b").child(n.to_string()).into())
                }
            },
            PatcherOptions::new(frames).sync(true),
        )
        .unwrap();
        let el = patcher.el().unwrap();

        assert_eq!(patcher.update(&-1), Err(RenderError::new("negative")));
        assert_eq!(doc.borrow().text_content(el), "1");

        patcher.update(&4).unwrap();
        assert_eq!(doc.borrow().text_content(el), "4");
        assert_eq!(patcher.render_count(), 2);
    }
}
