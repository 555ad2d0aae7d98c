//! Structural diff between two virtual trees, applied straight to a
//! [`Document`].
//!
//! The live subtree under a patched node is assumed to be exactly what the
//! previous virtual tree produced. When that does not hold (someone else
//! mutated the children) the children are rebuilt from scratch.
//!
//! Defined custom elements render their own content, so only their
//! attributes and listeners are patched.

use std::collections::HashMap;

use crate::document::{Document, NodeId};
use crate::error::DomError;
use crate::vnode::{VElement, VNode};

/// Builds a detached DOM subtree for `vnode`.
pub fn create(doc: &mut Document, vnode: &VNode) -> Result<NodeId, DomError> {
    match vnode {
        VNode::Text(t) => Ok(doc.create_text(t.clone())),
        VNode::Element(el) => {
            let node = doc.create_element_with_attrs(&el.tag, el.attrs.iter().cloned());
            doc.set_listeners(node, el.listeners.iter().cloned())?;
            for child in &el.children {
                let c = create(doc, child)?;
                doc.append_child(node, c)?;
            }
            Ok(node)
        }
    }
}

/// Patches `node` (rendered from `old`) so it matches `new`.
///
/// Returns the node now representing `new`; it differs from `node` when the
/// element had to be replaced.
pub fn patch(doc: &mut Document, node: NodeId, old: &VNode, new: &VNode) -> Result<NodeId, DomError> {
    match (old, new) {
        (VNode::Text(a), VNode::Text(b)) => {
            if a != b {
                doc.set_text(node, b.clone())?;
            }
            Ok(node)
        }
        (VNode::Element(a), VNode::Element(b)) if a.tag == b.tag && a.key == b.key => {
            patch_attrs(doc, node, a, b)?;
            doc.set_listeners(node, b.listeners.iter().cloned())?;
            if !doc.is_defined(&b.tag) {
                patch_children(doc, node, &a.children, &b.children)?;
            }
            Ok(node)
        }
        _ => {
            let replacement = create(doc, new)?;
            if let Some(parent) = doc.parent(node) {
                doc.replace_child(parent, replacement, node)?;
            }
            Ok(replacement)
        }
    }
}

fn patch_attrs(doc: &mut Document, node: NodeId, old: &VElement, new: &VElement) -> Result<(), DomError> {
    for (name, _) in &old.attrs {
        if new.get_attr(name).is_none() {
            doc.remove_attribute(node, name)?;
        }
    }
    for (name, value) in &new.attrs {
        if old.get_attr(name) != Some(value.as_str()) {
            doc.set_attribute(node, name, value.clone())?;
        }
    }
    Ok(())
}

fn patch_children(doc: &mut Document, parent: NodeId, old: &[VNode], new: &[VNode]) -> Result<(), DomError> {
    let live = doc.children(parent).to_vec();
    if live.len() != old.len() {
        log::warn!(
            "patch: {} live children but {} expected; rebuilding",
            live.len(),
            old.len()
        );
        for c in live {
            doc.remove_child(parent, c)?;
        }
        for v in new {
            let c = create(doc, v)?;
            doc.append_child(parent, c)?;
        }
        return Ok(());
    }

    let keyed: HashMap<&str, usize> = old
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.key().map(|k| (k, i)))
        .collect();
    let mut used = vec![false; old.len()];
    let mut placed = Vec::with_capacity(new.len());

    for (i, v) in new.iter().enumerate() {
        let matched = match v.key() {
            Some(k) => keyed.get(k).copied().filter(|&j| !used[j]),
            None => (i < old.len() && old[i].key().is_none() && !used[i]).then_some(i),
        };
        let node = match matched {
            Some(j) => {
                used[j] = true;
                patch(doc, live[j], &old[j], v)?
            }
            None => create(doc, v)?,
        };
        placed.push(node);
    }

    for (j, &c) in live.iter().enumerate() {
        if !used[j] {
            doc.remove_child(parent, c)?;
        }
    }

    for (i, &node) in placed.iter().enumerate() {
        let at = doc.children(parent).get(i).copied();
        if at != Some(node) {
            doc.insert_before(parent, node, at)?;
        }
    }
    Ok(())
}
