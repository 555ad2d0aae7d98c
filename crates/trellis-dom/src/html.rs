use std::fmt::Write;

use crate::document::{Document, NodeId, NodeKind};

impl Document {
    /// Serialises `node` and its light-tree descendants.
    pub fn outer_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_node(node, &mut out);
        out
    }

    /// Serialises the children of `node` (works for shadow roots too).
    pub fn inner_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        for &c in self.children(node) {
            self.write_node(c, &mut out);
        }
        out
    }

    fn write_node(&self, node: NodeId, out: &mut String) {
        let Some(n) = self.nodes.get(node) else {
            return;
        };
        match &n.kind {
            NodeKind::Text(t) => escape(t, false, out),
            NodeKind::Element(el) => {
                let _ = write!(out, "<{}", el.tag);
                for (k, v) in &el.attrs {
                    let _ = write!(out, " {k}=\"");
                    escape(v, true, out);
                    out.push('"');
                }
                out.push('>');
                for &c in &n.children {
                    self.write_node(c, out);
                }
                let _ = write!(out, "</{}>", el.tag);
            }
            NodeKind::Document | NodeKind::ShadowRoot { .. } => {
                for &c in &n.children {
                    self.write_node(c, out);
                }
            }
        }
    }
}

fn escape(s: &str, attr: bool, out: &mut String) {
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' if !attr => out.push_str("&lt;"),
            '>' if !attr => out.push_str("&gt;"),
            '"' if attr => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
}
