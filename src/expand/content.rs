//! Content placeholder injection

use crate::ast::{insert_before, remove_child, Node};

/// Replace every `@<keyword>` placeholder in `fragment` with a fresh copy of
/// `content`, or drop the placeholders when there is no content.
///
/// `in_root` says whether `fragment` is a top-level node list; nested
/// containers are always treated as blocks. Injected nodes are not searched
/// for further placeholders.
pub fn inject_content(fragment: &mut Vec<Node>, content: &[Node], keyword: &str, in_root: bool) {
    let mut index = 0;
    while index < fragment.len() {
        if fragment[index].is_at_rule(keyword) {
            tracing::trace!(nodes = content.len(), "injecting content");
            if !content.is_empty() {
                insert_before(fragment, index, content.to_vec(), in_root);
                index += content.len();
            }
            remove_child(fragment, index, in_root);
            continue;
        }

        if let Some(children) = fragment[index].children_mut() {
            inject_content(children, content, keyword, false);
        }
        index += 1;
    }
}
