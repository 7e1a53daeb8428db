use crate::dom::{Document, NodeId};
use crate::error::{AnchorError, Result};

fn id_selector(tag: &str, id: &str) -> Result<String> {
    if id.contains('"') || id.contains('\\') {
        return Err(AnchorError::EncodingFailure(format!(
            "id {:?} cannot be quoted in a selector",
            id
        )));
    }
    Ok(format!("{}[id=\"{}\"]", tag, id))
}

/// 1-based position among element siblings with the same tag
fn nth_of_type(doc: &Document, node: NodeId, tag: &str) -> usize {
    let Some(parent) = doc.parent(node) else {
        return 1;
    };
    doc.children(parent)
        .iter()
        .take_while(|&&c| c != node)
        .filter(|&&c| doc.tag_name(c) == Some(tag))
        .count()
        + 1
}

/// Selector addressing a block element
///
/// `tag[id="..."]` for elements with an id, otherwise a child path from the
/// nearest ancestor with an id.
pub fn block_selector(doc: &Document, node: NodeId) -> Result<String> {
    let mut steps = Vec::new();
    let mut current = node;
    loop {
        let tag = doc
            .tag_name(current)
            .ok_or_else(|| AnchorError::EncodingFailure("block has no ancestor with an id".into()))?;

        if let Some(id) = doc.attr(current, "id") {
            steps.push(id_selector(tag, id)?);
            break;
        }
        steps.push(format!("{}:nth-of-type({})", tag, nth_of_type(doc, current, tag)));
        current = doc
            .parent(current)
            .ok_or_else(|| AnchorError::EncodingFailure("block is detached".into()))?;
    }

    steps.reverse();
    Ok(steps.join(" > "))
}
