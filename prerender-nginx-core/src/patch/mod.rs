//! Idempotent structural patches
//!
//! Every patch follows the same protocol: build the canonical subtree,
//! look for an existing node with the same `(name, args)` among the target
//! scope's children, and either replace that node's children in place or
//! insert the new subtree at a computed position. Applying a patch twice
//! leaves the tree exactly as applying it once.

mod locations;
mod maps;

pub use locations::{
    add_prerender_location, prerender_location, rewrite_root_location, root_rewrite,
    PRERENDER_INT_TYPE, PRERENDER_LOCATION,
};
pub use maps::{add_map_section, prerender_maps, BOT_USER_AGENTS, STATIC_EXTENSIONS};

use crate::tree::DirectiveNode;

/// What a patch did to its target scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// An existing node at this index got a fresh body
    Replaced(usize),
    /// The subtree was inserted at this index
    Inserted(usize),
}

impl Applied {
    /// Index of the patched node in its scope
    pub fn index(self) -> usize {
        match self {
            Applied::Replaced(idx) | Applied::Inserted(idx) => idx,
        }
    }
}

/// Replace the body of the node matching `node`'s `(name, args)`, or insert
/// `node` at `at` (clamped to the scope length)
pub(crate) fn upsert(scope: &mut Vec<DirectiveNode>, node: DirectiveNode, at: usize) -> Applied {
    match scope
        .iter()
        .position(|d| d.name == node.name && d.args == node.args)
    {
        Some(idx) => {
            scope[idx].children = node.children;
            Applied::Replaced(idx)
        }
        None => {
            let at = at.min(scope.len());
            scope.insert(at, node);
            Applied::Inserted(at)
        }
    }
}
