//! Radix prefix tree over packed IP addresses (§4.3, §4.6).
//!
//! Answers "every network containing this address", not just
//! longest-prefix-match, in O(address bits). The same structure serves both
//! IPv4 (32-bit prefixes) and IPv6 (128-bit prefixes) — only the address
//! byte width differs, so the tree itself is address-width agnostic and
//! walks bits off whatever slice it's handed.

use crate::model::RecordId;

use super::idset::IdSet;

#[derive(Default)]
struct Node {
    ids: IdSet,
    network: Option<String>,
    children: [Option<Box<Node>>; 2],
}

/// Bit `index` of `bytes`, counting from the most significant bit of the
/// first byte (network order).
fn bit_at(bytes: &[u8], index: u8) -> usize {
    let byte = bytes[(index / 8) as usize];
    usize::from((byte >> (7 - (index % 8))) & 1)
}

#[derive(Default)]
pub struct CidrTree {
    root: Node,
}

impl CidrTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `id` under the network `addr/prefix_len`, labelling the node
    /// with `network`'s canonical CIDR text the first time it's created.
    pub fn insert(&mut self, addr: &[u8], prefix_len: u8, network: String, id: RecordId) {
        let mut node = &mut self.root;
        for i in 0..prefix_len {
            let bit = bit_at(addr, i);
            node = node.children[bit].get_or_insert_with(|| Box::new(Node::default()));
        }
        node.network.get_or_insert(network);
        node.ids.insert(id);
    }

    /// Remove `id` from `addr/prefix_len`, pruning now-dead nodes on the
    /// way back up.
    pub fn remove(&mut self, addr: &[u8], prefix_len: u8, id: RecordId) {
        Self::remove_rec(&mut self.root, addr, prefix_len, 0, id);
    }

    fn remove_rec(node: &mut Node, addr: &[u8], prefix_len: u8, depth: u8, id: RecordId) -> bool {
        if depth == prefix_len {
            node.ids.remove(id);
            return node.ids.is_empty() && node.children.iter().all(Option::is_none);
        }

        let bit = bit_at(addr, depth);
        let mut prune = false;
        if let Some(child) = node.children[bit].as_mut() {
            if Self::remove_rec(child, addr, prefix_len, depth + 1, id) {
                prune = true;
            }
        }
        if prune {
            node.children[bit] = None;
        }

        node.ids.is_empty() && node.children.iter().all(Option::is_none)
    }

    /// Every `(network, id)` pair whose network contains `addr`, walked
    /// root-to-leaf along `addr`'s bits.
    pub fn containing(&self, addr: &[u8]) -> Vec<(String, RecordId)> {
        let mut out = Vec::new();
        let mut node = &self.root;
        Self::collect(node, &mut out);

        for i in 0..u8::try_from(addr.len() * 8).unwrap_or(u8::MAX) {
            let bit = bit_at(addr, i);
            match &node.children[bit] {
                Some(child) => {
                    node = child;
                    Self::collect(node, &mut out);
                }
                None => break,
            }
        }

        out
    }

    fn collect(node: &Node, out: &mut Vec<(String, RecordId)>) {
        if let Some(network) = &node.network {
            for id in node.ids.iter() {
                out.push((network.clone(), id));
            }
        }
    }

    /// Number of distinct networks held, for invariant 4 (key-set parity
    /// with the Subnet4/Subnet6 indices).
    pub fn network_count(&self) -> usize {
        fn count(node: &Node) -> usize {
            let here = usize::from(node.network.is_some());
            here + node
                .children
                .iter()
                .filter_map(Option::as_ref)
                .map(|child| count(child))
                .sum::<usize>()
        }
        count(&self.root)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn direct_and_containing_match() {
        let mut tree = CidrTree::new();
        // 10.4.0.0/16
        tree.insert(&[10, 4, 0, 0], 16, "10.4.0.0/16".to_string(), 444);

        let matches = tree.containing(&[10, 4, 4, 4]);
        assert_eq!(matches, vec![("10.4.0.0/16".to_string(), 444)]);

        let miss = tree.containing(&[10, 5, 0, 0]);
        assert!(miss.is_empty());
    }

    #[test]
    fn nested_networks_all_match() {
        let mut tree = CidrTree::new();
        tree.insert(&[10, 0, 0, 0], 8, "10.0.0.0/8".to_string(), 1);
        tree.insert(&[10, 4, 0, 0], 16, "10.4.0.0/16".to_string(), 2);

        let mut matches = tree.containing(&[10, 4, 4, 4]);
        matches.sort();
        assert_eq!(
            matches,
            vec![
                ("10.0.0.0/8".to_string(), 1),
                ("10.4.0.0/16".to_string(), 2),
            ]
        );
    }

    #[test]
    fn remove_prunes_dead_branches() {
        let mut tree = CidrTree::new();
        tree.insert(&[10, 4, 0, 0], 16, "10.4.0.0/16".to_string(), 444);
        tree.remove(&[10, 4, 0, 0], 16, 444);
        assert!(tree.containing(&[10, 4, 4, 4]).is_empty());
        assert_eq!(tree.network_count(), 0);
    }

    #[test]
    fn ipv6_prefixes_use_the_same_trie() {
        let mut tree = CidrTree::new();
        let network = [0x20, 0x01, 0x0d, 0xb8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        tree.insert(&network, 32, "2001:db8::/32".to_string(), 7);

        let mut addr = network;
        addr[15] = 1;
        assert_eq!(
            tree.containing(&addr),
            vec![("2001:db8::/32".to_string(), 7)]
        );
    }
}
