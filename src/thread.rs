use std::collections::HashMap;

use crate::api::Comment;

#[derive(Debug, Clone, PartialEq)]
pub struct RenderNode {
    pub comment: Comment,
    pub depth: usize,
    pub label: String,
    pub in_reply_to: Option<String>,
    pub replying: bool,
    pub can_delete: bool,
}

pub fn can_delete(comment: &Comment, viewer: Option<&str>) -> bool {
    viewer.map_or(false, |username| username == comment.author)
}

// Depth-first pre-order over the comment forest: roots in input order, each
// comment's subtree before its next sibling. Root i is labeled "i", the j-th
// child of label L is labeled "L.j". Accepts flat payloads (parent refs) and
// pre-nested payloads (children attached) with identical output.
pub fn build(
    comments: &[Comment],
    reply_target: Option<&str>,
    viewer: Option<&str>,
) -> Vec<RenderNode> {
    let flat = flatten(comments);

    let mut index_of: HashMap<&str, usize> = HashMap::with_capacity(flat.len());
    for (idx, comment) in flat.iter().enumerate() {
        index_of.entry(comment.id.as_str()).or_insert(idx);
    }

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); flat.len()];
    let mut roots: Vec<usize> = Vec::new();
    let mut orphans: Vec<usize> = Vec::new();
    for (idx, comment) in flat.iter().enumerate() {
        match comment.parent_id.as_deref() {
            None => roots.push(idx),
            Some(parent) if parent == comment.id => orphans.push(idx),
            Some(parent) => match index_of.get(parent) {
                Some(&parent_idx) => children[parent_idx].push(idx),
                // parent missing from the payload: promote rather than drop
                None => orphans.push(idx),
            },
        }
    }
    roots.extend(orphans);

    struct Frame {
        idx: usize,
        depth: usize,
        label: String,
        parent_author: Option<String>,
    }

    // Explicit stack instead of recursion so pathologically deep threads
    // cannot exhaust the call stack.
    let mut stack: Vec<Frame> = Vec::with_capacity(roots.len());
    for (position, &idx) in roots.iter().enumerate().rev() {
        stack.push(Frame {
            idx,
            depth: 0,
            label: (position + 1).to_string(),
            parent_author: None,
        });
    }

    let mut nodes: Vec<RenderNode> = Vec::with_capacity(flat.len());
    while let Some(frame) = stack.pop() {
        let comment = &flat[frame.idx];
        for (position, &child) in children[frame.idx].iter().enumerate().rev() {
            stack.push(Frame {
                idx: child,
                depth: frame.depth + 1,
                label: format!("{}.{}", frame.label, position + 1),
                parent_author: Some(comment.author.clone()),
            });
        }
        nodes.push(RenderNode {
            replying: reply_target == Some(comment.id.as_str()),
            can_delete: can_delete(comment, viewer),
            comment: comment.clone(),
            depth: frame.depth,
            label: frame.label,
            in_reply_to: frame.parent_author,
        });
    }
    nodes
}

// Pre-order flattening of nested payloads; parent ids are derived from the
// nesting, and the replies vectors are emptied so each comment appears once.
// Flat input passes through unchanged.
pub fn flatten(comments: &[Comment]) -> Vec<Comment> {
    let mut flat: Vec<Comment> = Vec::with_capacity(comments.len());
    let mut stack: Vec<(Comment, Option<String>)> = comments
        .iter()
        .rev()
        .map(|comment| (comment.clone(), comment.parent_id.clone()))
        .collect();

    while let Some((mut comment, parent_id)) = stack.pop() {
        let replies = std::mem::take(&mut comment.replies);
        for reply in replies.into_iter().rev() {
            stack.push((reply, Some(comment.id.clone())));
        }
        comment.parent_id = parent_id;
        flat.push(comment);
    }
    flat
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn comment(id: &str, parent: Option<&str>, author: &str) -> Comment {
        Comment {
            id: id.to_owned(),
            parent_id: parent.map(str::to_owned),
            author: author.to_owned(),
            body: format!("body of {id}"),
            created_at: Utc::now(),
            vote_count: 0,
            replies: Vec::new(),
        }
    }

    fn labels(nodes: &[RenderNode]) -> Vec<(String, String)> {
        nodes
            .iter()
            .map(|node| (node.comment.id.clone(), node.label.clone()))
            .collect()
    }

    #[test]
    fn flat_input_gets_preorder_and_dotted_labels() {
        let comments = vec![
            comment("a", None, "ada"),
            comment("b", Some("a"), "alan"),
            comment("c", None, "grace"),
        ];
        let nodes = build(&comments, None, None);
        assert_eq!(
            labels(&nodes),
            vec![
                ("a".to_owned(), "1".to_owned()),
                ("b".to_owned(), "1.1".to_owned()),
                ("c".to_owned(), "2".to_owned()),
            ]
        );
        assert_eq!(nodes[1].depth, 1);
        assert_eq!(nodes[1].in_reply_to.as_deref(), Some("ada"));
        assert_eq!(nodes[2].in_reply_to, None);
    }

    #[test]
    fn nested_input_matches_flat_input() {
        let flat_form = vec![
            comment("a", None, "ada"),
            comment("b", Some("a"), "alan"),
            comment("c", Some("b"), "grace"),
            comment("d", None, "kay"),
        ];

        let mut root = comment("a", None, "ada");
        let mut child = comment("b", None, "alan");
        child.replies.push(comment("c", None, "grace"));
        root.replies.push(child);
        let nested_form = vec![root, comment("d", None, "kay")];

        let from_flat = build(&flat_form, None, None);
        let from_nested = build(&nested_form, None, None);
        assert_eq!(labels(&from_flat), labels(&from_nested));
        assert_eq!(
            from_flat
                .iter()
                .map(|node| node.depth)
                .collect::<Vec<_>>(),
            from_nested
                .iter()
                .map(|node| node.depth)
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn descendants_are_contiguous_before_the_next_sibling() {
        let comments = vec![
            comment("r1", None, "ada"),
            comment("r1c1", Some("r1"), "alan"),
            comment("r1c1c1", Some("r1c1"), "grace"),
            comment("r1c2", Some("r1"), "kay"),
            comment("r2", None, "barbara"),
        ];
        let nodes = build(&comments, None, None);
        let order: Vec<&str> = nodes
            .iter()
            .map(|node| node.comment.id.as_str())
            .collect();
        assert_eq!(order, vec!["r1", "r1c1", "r1c1c1", "r1c2", "r2"]);
    }

    #[test]
    fn labels_are_unique() {
        let comments = vec![
            comment("a", None, "ada"),
            comment("b", Some("a"), "alan"),
            comment("c", Some("a"), "grace"),
            comment("d", Some("c"), "kay"),
            comment("e", None, "barbara"),
        ];
        let nodes = build(&comments, None, None);
        let mut seen: Vec<&str> = nodes.iter().map(|node| node.label.as_str()).collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), nodes.len());
    }

    #[test]
    fn orphans_are_promoted_to_roots_after_the_genuine_ones() {
        let comments = vec![
            comment("a", None, "ada"),
            comment("lost", Some("gone"), "alan"),
            comment("selfie", Some("selfie"), "grace"),
        ];
        let nodes = build(&comments, None, None);
        assert_eq!(
            labels(&nodes),
            vec![
                ("a".to_owned(), "1".to_owned()),
                ("lost".to_owned(), "2".to_owned()),
                ("selfie".to_owned(), "3".to_owned()),
            ]
        );
        assert!(nodes.iter().all(|node| node.depth == 0));
    }

    #[test]
    fn at_most_one_node_is_replying() {
        let comments = vec![
            comment("a", None, "ada"),
            comment("b", None, "alan"),
            comment("c", None, "grace"),
        ];
        let nodes = build(&comments, Some("b"), None);
        let replying: Vec<&str> = nodes
            .iter()
            .filter(|node| node.replying)
            .map(|node| node.comment.id.as_str())
            .collect();
        assert_eq!(replying, vec!["b"]);
    }

    #[test]
    fn can_delete_requires_an_exact_username_match() {
        let owned = comment("a", None, "ada");
        assert!(!can_delete(&owned, None));
        assert!(!can_delete(&owned, Some("alan")));
        assert!(!can_delete(&owned, Some("Ada")));
        assert!(can_delete(&owned, Some("ada")));
    }

    #[test]
    fn deep_threads_do_not_overflow_the_stack() {
        let mut comments = vec![comment("n0", None, "ada")];
        for i in 1..5_000 {
            comments.push(comment(
                &format!("n{i}"),
                Some(&format!("n{}", i - 1)),
                "ada",
            ));
        }
        let nodes = build(&comments, None, None);
        assert_eq!(nodes.len(), 5_000);
        assert_eq!(nodes.last().unwrap().depth, 4_999);
        assert!(nodes.last().unwrap().label.starts_with("1.1."));
    }
}
