//! # Host document and virtual DOM
//!
//! `trellis-dom` is the platform layer under the component core:
//!
//! - [`Document`]: arena of elements, text nodes and shadow roots that
//!   records custom-element [`Reaction`]s instead of running callbacks.
//! - [`VNode`] / [`h`]: virtual nodes produced by templates.
//! - [`diff`]: structural diff applied directly to a document.
//! - [`DomPatcher`]: owns one render target and batches updates per frame.
//! - [`FrameScheduler`] / [`FrameQueue`]: the frame boundary async patchers
//!   wait on.
//!
//! ```rust
//! use trellis_dom::*;
//!
//! let mut doc = Document::new();
//! let node = diff::create(&mut doc, &h("p").child("hello").into()).unwrap();
//! let body = doc.body();
//! doc.append_child(body, node).unwrap();
//! assert_eq!(doc.outer_html(body), "<body><p>hello</p></body>");
//! ```

pub mod diff;
pub mod document;
pub mod error;
mod html;
pub mod patcher;
pub mod scheduler;
pub mod vnode;

pub use document::{Document, ElementDefinitions, Event, Listener, NodeId, Reaction};
pub use error::{DomError, RenderError};
pub use patcher::{DomPatcher, PatcherOptions, RenderFn, UpdateMode};
pub use scheduler::{FrameCallback, FrameQueue, FrameScheduler};
pub use vnode::{VElement, VNode, h, text};
