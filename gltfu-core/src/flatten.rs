//! Hierarchy flattening: bake parent transforms into descendants.
//!
//! Skinned joints and animated nodes (plus everything below them) are
//! off-limits: a baked world matrix cannot be decomposed back into the
//! authored rotation/scale axes that animation curves and skinning need.
//! Flattened nodes keep their world matrix as the stored 16-element form;
//! the node table is left uncompacted for a later prune.

use crate::document::Document;
use crate::error::{GltfError, Result};
use crate::math::node_local_matrix;
use glam::DMat4;
use std::collections::VecDeque;
use tracing::info;

/// Flatten the node hierarchy in place. Returns the number of nodes
/// re-parented to their scene roots.
///
/// `_cleanup` is reserved; unreachable nodes are left for the prune pass.
pub fn process(document: &mut Document, _cleanup: bool) -> Result<usize> {
    let total = document.nodes.len();
    if total == 0 {
        return Ok(0);
    }

    let debug = std::env::var_os("GLTFU_DEBUG_FLATTEN").is_some();

    // Parent lookup in one sweep. The forest invariant means each slot is
    // written at most once.
    let mut parent = vec![usize::MAX; total];
    for (index, node) in document.nodes.iter().enumerate() {
        for &child in &node.children {
            if child < total {
                parent[child] = index;
            }
        }
    }

    // Off-limits: joints, TRS-animated nodes, and all their descendants.
    let mut skip = vec![false; total];
    let mut queue = VecDeque::new();
    let enqueue = |index: usize, skip: &mut Vec<bool>, queue: &mut VecDeque<usize>| {
        if index < total && !skip[index] {
            skip[index] = true;
            queue.push_back(index);
        }
    };

    for skin in &document.skins {
        for &joint in &skin.joints {
            enqueue(joint, &mut skip, &mut queue);
        }
    }
    for animation in &document.animations {
        for channel in &animation.channels {
            let animates_transform =
                matches!(channel.target.path.as_str(), "translation" | "rotation" | "scale");
            if animates_transform {
                if let Some(target) = channel.target.node {
                    enqueue(target, &mut skip, &mut queue);
                }
            }
        }
    }
    while let Some(current) = queue.pop_front() {
        let children = document.nodes[current].children.clone();
        for child in children {
            enqueue(child, &mut skip, &mut queue);
        }
    }

    // Scenes referencing each root node.
    let mut scenes_for_root: Vec<Vec<usize>> = vec![Vec::new(); total];
    for (scene_index, scene) in document.scenes.iter().enumerate() {
        for &root in &scene.nodes {
            if root < total {
                scenes_for_root[root].push(scene_index);
            }
        }
    }

    // World matrix, depth, and owning root per node, memoized along the
    // parent chain. The chain length is bounded by the node count; anything
    // longer is a cycle.
    let mut world = vec![DMat4::IDENTITY; total];
    let mut depth = vec![0usize; total];
    let mut root_of = vec![usize::MAX; total];
    let mut computed = vec![false; total];

    for start in 0..total {
        let mut chain = Vec::new();
        let mut current = start;
        while !computed[current] {
            chain.push(current);
            if chain.len() > total {
                return Err(GltfError::pass_failed(
                    "flatten",
                    format!("node hierarchy contains a cycle through node {current}"),
                ));
            }
            let p = parent[current];
            if p == usize::MAX {
                break;
            }
            current = p;
        }

        for &index in chain.iter().rev() {
            let local = node_local_matrix(&document.nodes[index]);
            let p = parent[index];
            if p != usize::MAX && computed[p] {
                world[index] = world[p] * local;
                depth[index] = depth[p] + 1;
                root_of[index] = root_of[p];
            } else {
                world[index] = local;
                depth[index] = 0;
                root_of[index] = index;
            }
            computed[index] = true;
        }
    }

    // Deeper nodes first, so a parent is never re-parented before its
    // children have been moved out.
    let mut candidates: Vec<usize> = (0..total)
        .filter(|&index| parent[index] != usize::MAX && !skip[index])
        .collect();
    candidates.sort_by(|&a, &b| depth[b].cmp(&depth[a]));

    let mut flattened = 0;
    for index in candidates {
        let parent_index = parent[index];

        if debug {
            info!(
                node = index,
                parent = parent_index,
                depth = depth[index],
                "flattening node"
            );
        }

        document.nodes[index].set_matrix(world[index].to_cols_array());
        document.nodes[parent_index]
            .children
            .retain(|&child| child != index);

        for &scene_index in &scenes_for_root[root_of[index]] {
            let roots = &mut document.scenes[scene_index].nodes;
            if !roots.contains(&index) {
                roots.push(index);
            }
        }

        parent[index] = usize::MAX;
        flattened += 1;
    }

    Ok(flattened)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Node, Scene};

    fn two_level_chain() -> Document {
        let mut doc = Document::new();
        doc.nodes.push(Node {
            translation: Some([1.0, 0.0, 0.0]),
            children: vec![1],
            ..Default::default()
        });
        doc.nodes.push(Node {
            translation: Some([0.0, 2.0, 0.0]),
            mesh: Some(0),
            ..Default::default()
        });
        doc.scenes.push(Scene {
            name: None,
            nodes: vec![0],
        });
        doc
    }

    #[test]
    fn bakes_world_translation_and_reparents() {
        let mut doc = two_level_chain();
        let flattened = process(&mut doc, true).unwrap();
        assert_eq!(flattened, 1);

        let matrix = doc.nodes[1].matrix.unwrap();
        assert_eq!(matrix[12], 1.0);
        assert_eq!(matrix[13], 2.0);
        assert_eq!(matrix[14], 0.0);
        assert!(doc.nodes[1].translation.is_none());

        assert!(doc.nodes[0].children.is_empty());
        assert_eq!(doc.scenes[0].nodes, vec![0, 1]);
    }

    #[test]
    fn animated_subtree_is_untouched() {
        let mut doc = two_level_chain();
        doc.animations.push(crate::document::Animation {
            name: None,
            channels: vec![crate::document::AnimationChannel {
                sampler: 0,
                target: crate::document::AnimationTarget {
                    node: Some(1),
                    path: "rotation".to_string(),
                },
            }],
            samplers: Vec::new(),
        });

        let flattened = process(&mut doc, true).unwrap();
        assert_eq!(flattened, 0);
        assert_eq!(doc.nodes[0].children, vec![1]);
        assert!(doc.nodes[1].matrix.is_none());
    }

    #[test]
    fn joints_are_untouched() {
        let mut doc = two_level_chain();
        doc.skins.push(crate::document::Skin {
            joints: vec![1],
            ..Default::default()
        });

        let flattened = process(&mut doc, true).unwrap();
        assert_eq!(flattened, 0);
    }

    #[test]
    fn weights_animation_does_not_block_flatten() {
        let mut doc = two_level_chain();
        doc.animations.push(crate::document::Animation {
            name: None,
            channels: vec![crate::document::AnimationChannel {
                sampler: 0,
                target: crate::document::AnimationTarget {
                    node: Some(1),
                    path: "weights".to_string(),
                },
            }],
            samplers: Vec::new(),
        });

        assert_eq!(process(&mut doc, true).unwrap(), 1);
    }

    #[test]
    fn deep_chain_flattens_children_first() {
        let mut doc = Document::new();
        for i in 0..4 {
            doc.nodes.push(Node {
                translation: Some([1.0, 0.0, 0.0]),
                children: if i < 3 { vec![i + 1] } else { Vec::new() },
                ..Default::default()
            });
        }
        doc.nodes[3].mesh = Some(0);
        doc.scenes.push(Scene {
            name: None,
            nodes: vec![0],
        });

        let flattened = process(&mut doc, true).unwrap();
        assert_eq!(flattened, 3);
        assert_eq!(doc.nodes[3].matrix.unwrap()[12], 4.0);
        assert_eq!(doc.scenes[0].nodes, vec![0, 3, 2, 1]);
    }

    #[test]
    fn cycle_is_a_structural_error() {
        let mut doc = Document::new();
        doc.nodes.push(Node {
            children: vec![1],
            ..Default::default()
        });
        doc.nodes.push(Node {
            children: vec![0],
            ..Default::default()
        });
        doc.scenes.push(Scene {
            name: None,
            nodes: vec![0],
        });

        assert!(process(&mut doc, true).is_err());
    }
}
