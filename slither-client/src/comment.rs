use std::collections::HashMap;

use crate::api::{self, CommentId, Error};

/// Replies are offered on comments up to this depth (roots are at depth 0)
pub const MAX_REPLY_DEPTH: usize = 3;

pub fn can_reply_at(depth: usize) -> bool {
    depth < MAX_REPLY_DEPTH
}

#[derive(Clone, Debug)]
pub struct CommentNode {
    pub comment: api::Comment,

    /// Direct replies, in the order the service returned them
    pub replies: im::Vector<CommentNode>,
}

impl CommentNode {
    pub fn new(comment: api::Comment) -> CommentNode {
        CommentNode {
            comment,
            replies: im::Vector::new(),
        }
    }

    /// Number of comments in this subtree, including self
    pub fn len(&self) -> usize {
        1 + Preorder::new(&self.replies).count()
    }
}

impl PartialEq for CommentNode {
    fn eq(&self, other: &CommentNode) -> bool {
        // a pre-order listing with depths determines the tree
        self.comment == other.comment
            && Preorder::new(&self.replies)
                .map(|(n, d)| (&n.comment, d))
                .eq(Preorder::new(&other.replies).map(|(n, d)| (&n.comment, d)))
    }
}

impl Eq for CommentNode {}

impl Drop for CommentNode {
    fn drop(&mut self) {
        // unlink level by level, so that long reply chains do not drop recursively
        let mut pending = std::mem::take(&mut self.replies);
        while let Some(mut n) = pending.pop_back() {
            pending.append(std::mem::take(&mut n.replies));
        }
    }
}

/// Depth-first, pre-order traversal that keeps its own stack
struct Preorder<'a> {
    stack: Vec<(&'a im::Vector<CommentNode>, usize)>,
}

impl<'a> Preorder<'a> {
    fn new(roots: &'a im::Vector<CommentNode>) -> Preorder<'a> {
        Preorder {
            stack: vec![(roots, 0)],
        }
    }

    /// Sibling indices leading to the node last returned by `next`
    fn path(&self) -> Vec<usize> {
        self.stack[..self.stack.len().saturating_sub(1)]
            .iter()
            .map(|(_, i)| i - 1)
            .collect()
    }
}

impl<'a> Iterator for Preorder<'a> {
    type Item = (&'a CommentNode, usize);

    fn next(&mut self) -> Option<(&'a CommentNode, usize)> {
        loop {
            let top = self.stack.len().checked_sub(1)?;
            let (nodes, i) = self.stack[top];
            match nodes.get(i) {
                None => {
                    self.stack.pop();
                }
                Some(n) => {
                    self.stack[top].1 += 1;
                    self.stack.push((&n.replies, 0));
                    return Some((n, top));
                }
            }
        }
    }
}

/// The nested replies of a post
///
/// Cloning is cheap, and a clone is not affected by later mutations of the
/// original.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CommentForest {
    roots: im::Vector<CommentNode>,
}

#[derive(Clone, Copy)]
enum Mark {
    New,
    Visiting(usize),
    Done,
}

impl CommentForest {
    pub fn new() -> CommentForest {
        CommentForest::default()
    }

    /// Nests a flat comment list
    ///
    /// Comments whose parent is not in `flat` become roots. Parents do not need
    /// to come before their replies. If parent links form a cycle, the comment
    /// of the cycle that comes first in `flat` becomes a root.
    pub fn build(flat: &[api::Comment]) -> CommentForest {
        let n = flat.len();
        let mut index = HashMap::with_capacity(n);
        for (i, c) in flat.iter().enumerate() {
            index.entry(&c.id).or_insert(i);
        }

        let mut orphans = 0;
        let mut parent = flat
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let p = c.parent_id.as_ref()?;
                match index.get(p) {
                    Some(&p) if p != i => Some(p),
                    _ => {
                        orphans += 1;
                        None
                    }
                }
            })
            .collect::<Vec<_>>();
        if orphans > 0 {
            tracing::debug!(orphans, "promoted comments with unknown parent to top-level");
        }

        // Break parent cycles, walking each chain at most once
        let mut mark = vec![Mark::New; n];
        let mut path: Vec<usize> = Vec::new();
        for start in 0..n {
            let mut cur = Some(start);
            while let Some(c) = cur {
                match mark[c] {
                    Mark::Done => break,
                    Mark::Visiting(pos) => {
                        if let Some(&breaker) = path[pos..].iter().min() {
                            tracing::warn!(
                                comment = %flat[breaker].id,
                                "comment parent links form a cycle, promoting to top-level"
                            );
                            parent[breaker] = None;
                        }
                        break;
                    }
                    Mark::New => {
                        mark[c] = Mark::Visiting(path.len());
                        path.push(c);
                        cur = parent[c];
                    }
                }
            }
            for p in path.drain(..) {
                mark[p] = Mark::Done;
            }
        }

        let mut children = vec![Vec::new(); n];
        let mut roots = Vec::new();
        for (i, p) in parent.iter().enumerate() {
            match p {
                Some(p) => children[*p].push(i),
                None => roots.push(i),
            }
        }

        // Assemble bottom-up, without recursing on the depth of the tree
        let mut order = Vec::with_capacity(n);
        let mut stack = roots.iter().rev().copied().collect::<Vec<_>>();
        while let Some(i) = stack.pop() {
            order.push(i);
            stack.extend(children[i].iter().rev());
        }
        let mut built = (0..n).map(|_| None).collect::<Vec<Option<CommentNode>>>();
        for &i in order.iter().rev() {
            let replies = children[i]
                .iter()
                .filter_map(|c| built[*c].take())
                .collect();
            built[i] = Some(CommentNode {
                comment: flat[i].clone(),
                replies,
            });
        }
        CommentForest {
            roots: roots.iter().filter_map(|r| built[*r].take()).collect(),
        }
    }

    pub fn roots(&self) -> &im::Vector<CommentNode> {
        &self.roots
    }

    pub fn len(&self) -> usize {
        Preorder::new(&self.roots).count()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn find(&self, id: &CommentId) -> Option<&CommentNode> {
        Preorder::new(&self.roots)
            .find(|(n, _)| n.comment.id == *id)
            .map(|(n, _)| n)
    }

    pub fn depth_of(&self, id: &CommentId) -> Option<usize> {
        Preorder::new(&self.roots)
            .find(|(n, _)| n.comment.id == *id)
            .map(|(_, depth)| depth)
    }

    /// Whether a reply may be posted under comment `id`
    pub fn can_reply_to(&self, id: &CommentId) -> bool {
        self.depth_of(id).map_or(false, can_reply_at)
    }

    /// Calls `f` on every comment in display order, along with its depth
    pub fn walk<F>(&self, mut f: F)
    where
        F: FnMut(&CommentNode, usize),
    {
        for (n, depth) in Preorder::new(&self.roots) {
            f(n, depth);
        }
    }

    /// Pre-order listing, which `build` turns back into the same forest
    pub fn flatten(&self) -> Vec<api::Comment> {
        let mut res = Vec::with_capacity(self.len());
        self.walk(|n, _| res.push(n.comment.clone()));
        res
    }

    pub fn push_root(&mut self, comment: api::Comment) {
        self.roots.push_back(CommentNode::new(comment));
    }

    pub fn insert_reply(
        &mut self,
        parent_id: &CommentId,
        comment: api::Comment,
    ) -> Result<(), Error> {
        match self.find_mut(parent_id) {
            Some(parent) => {
                parent.replies.push_back(CommentNode::new(comment));
                Ok(())
            }
            None => {
                tracing::warn!(parent = %parent_id, comment = %comment.id, "reply parent not found");
                Err(Error::CommentNotFound(parent_id.clone()))
            }
        }
    }

    /// Replaces the contents of comment `id`, keeping its replies and position
    pub fn update_node(&mut self, id: &CommentId, updated: api::Comment) -> Result<(), Error> {
        let node = self.find_mut_or_warn(id)?;
        node.comment = api::Comment {
            id: node.comment.id.clone(),
            parent_id: node.comment.parent_id.clone(),
            ..updated
        };
        Ok(())
    }

    pub fn edit_text(&mut self, id: &CommentId, text: String) -> Result<(), Error> {
        let node = self.find_mut_or_warn(id)?;
        node.comment.text = text;
        node.comment.is_edited = true;
        Ok(())
    }

    /// Removes comment `id` along with all its replies, returning the subtree
    pub fn remove_node(&mut self, id: &CommentId) -> Result<CommentNode, Error> {
        match self.remove(id, false) {
            Some(removed) => Ok(removed),
            None => {
                tracing::warn!(comment = %id, "removed comment not found");
                Err(Error::CommentNotFound(id.clone()))
            }
        }
    }

    /// Removes comment `id`, moving its direct replies to where it stood
    pub fn remove_node_keep_replies(&mut self, id: &CommentId) -> Result<api::Comment, Error> {
        match self.remove(id, true) {
            Some(removed) => Ok(removed.comment.clone()),
            None => {
                tracing::warn!(comment = %id, "removed comment not found");
                Err(Error::CommentNotFound(id.clone()))
            }
        }
    }

    fn path_to(&self, id: &CommentId) -> Option<Vec<usize>> {
        let mut nodes = Preorder::new(&self.roots);
        while let Some((n, _)) = nodes.next() {
            if n.comment.id == *id {
                return Some(nodes.path());
            }
        }
        None
    }

    /// The sibling list reached by following `path` down from the roots
    fn siblings_mut(&mut self, path: &[usize]) -> Option<&mut im::Vector<CommentNode>> {
        let mut nodes = &mut self.roots;
        for &i in path {
            nodes = &mut nodes.get_mut(i)?.replies;
        }
        Some(nodes)
    }

    fn find_mut(&mut self, id: &CommentId) -> Option<&mut CommentNode> {
        let path = self.path_to(id)?;
        let (&last, parents) = path.split_last()?;
        self.siblings_mut(parents)?.get_mut(last)
    }

    fn remove(&mut self, id: &CommentId, keep_replies: bool) -> Option<CommentNode> {
        let path = self.path_to(id)?;
        let (&idx, parents) = path.split_last()?;
        let nodes = self.siblings_mut(parents)?;
        let mut removed = nodes.remove(idx);
        if keep_replies {
            let replies = std::mem::take(&mut removed.replies);
            for (i, r) in replies.into_iter().enumerate() {
                nodes.insert(idx + i, r);
            }
        }
        Some(removed)
    }

    fn find_mut_or_warn(&mut self, id: &CommentId) -> Result<&mut CommentNode, Error> {
        match self.find_mut(id) {
            Some(node) => Ok(node),
            None => {
                tracing::warn!(comment = %id, "updated comment not found");
                Err(Error::CommentNotFound(id.clone()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::api::{PostId, Time, UserId};

    fn comment(id: &str, parent: Option<&str>) -> api::Comment {
        api::Comment {
            id: CommentId::from(id),
            parent_id: parent.map(CommentId::from),
            post_id: PostId::from("p"),
            author_id: UserId(String::from("u")),
            author_name: String::from("Ranger"),
            text: format!("text of {id}"),
            created_at: "2024-03-01T10:00:00Z".parse::<Time>().unwrap(),
            is_edited: false,
            reactions: Vec::new(),
        }
    }

    fn ids(nodes: &im::Vector<CommentNode>) -> Vec<&str> {
        nodes.iter().map(|n| &n.comment.id.0 as &str).collect()
    }

    fn child<'a>(forest: &'a CommentForest, id: &str) -> &'a CommentNode {
        forest.find(&CommentId::from(id)).unwrap()
    }

    fn example() -> CommentForest {
        CommentForest::build(&[
            comment("1", None),
            comment("2", Some("1")),
            comment("3", Some("2")),
            comment("4", Some("99")),
        ])
    }

    #[test]
    fn nests_and_promotes_orphans() {
        let forest = example();
        assert_eq!(ids(forest.roots()), vec!["1", "4"]);
        assert_eq!(ids(&child(&forest, "1").replies), vec!["2"]);
        assert_eq!(ids(&child(&forest, "2").replies), vec!["3"]);
        assert!(child(&forest, "3").replies.is_empty());
        assert!(child(&forest, "4").replies.is_empty());
        assert_eq!(forest.len(), 4);
    }

    #[test]
    fn insert_reply_appends_to_parent() {
        let mut forest = example();
        forest
            .insert_reply(&CommentId::from("2"), comment("5", Some("2")))
            .unwrap();
        assert_eq!(ids(&child(&forest, "2").replies), vec!["3", "5"]);
        assert!(child(&forest, "5").replies.is_empty());
    }

    #[test]
    fn remove_node_drops_the_subtree() {
        let mut forest = example();
        forest
            .insert_reply(&CommentId::from("2"), comment("5", Some("2")))
            .unwrap();
        let removed = forest.remove_node(&CommentId::from("2")).unwrap();
        assert_eq!(removed.len(), 3);
        assert!(child(&forest, "1").replies.is_empty());
        for gone in ["2", "3", "5"] {
            assert!(forest.find(&CommentId::from(gone)).is_none(), "{gone} still there");
        }
        assert_eq!(ids(forest.roots()), vec!["1", "4"]);
    }

    #[test]
    fn remove_node_keep_replies_reparents() {
        let mut forest = CommentForest::build(&[
            comment("1", None),
            comment("2", Some("1")),
            comment("3", Some("2")),
            comment("4", Some("2")),
            comment("5", Some("1")),
        ]);
        let removed = forest
            .remove_node_keep_replies(&CommentId::from("2"))
            .unwrap();
        assert_eq!(removed.id, CommentId::from("2"));
        assert_eq!(ids(&child(&forest, "1").replies), vec!["3", "4", "5"]);
        assert_eq!(forest.len(), 4);
    }

    #[test]
    fn update_preserves_replies() {
        let mut forest = example();
        let before = child(&forest, "1").replies.clone();
        let mut updated = comment("1", None);
        updated.text = String::from("edited");
        updated.is_edited = true;
        forest.update_node(&CommentId::from("1"), updated).unwrap();
        let node = child(&forest, "1");
        assert_eq!(node.comment.text, "edited");
        assert!(node.comment.is_edited);
        assert_eq!(node.replies, before);
    }

    #[test]
    fn update_keeps_tree_position() {
        let mut forest = example();
        let mut updated = comment("999", Some("4"));
        updated.text = String::from("moved?");
        forest.update_node(&CommentId::from("3"), updated).unwrap();
        let node = child(&forest, "3");
        assert_eq!(node.comment.parent_id, Some(CommentId::from("2")));
        assert_eq!(node.comment.text, "moved?");
        assert_eq!(forest.depth_of(&CommentId::from("3")), Some(2));
    }

    #[test]
    fn edit_text_marks_edited() {
        let mut forest = example();
        forest
            .edit_text(&CommentId::from("3"), String::from("fixed typo"))
            .unwrap();
        let node = child(&forest, "3");
        assert_eq!(node.comment.text, "fixed typo");
        assert!(node.comment.is_edited);
    }

    #[test]
    fn missing_targets_are_reported() {
        let mut forest = example();
        let snapshot = forest.clone();
        let missing = CommentId::from("nope");
        assert_eq!(
            forest.insert_reply(&missing, comment("5", Some("nope"))),
            Err(Error::CommentNotFound(missing.clone()))
        );
        assert_eq!(
            forest.update_node(&missing, comment("nope", None)),
            Err(Error::CommentNotFound(missing.clone()))
        );
        assert_eq!(
            forest.remove_node(&missing).map(|_| ()),
            Err(Error::CommentNotFound(missing.clone()))
        );
        assert_eq!(forest, snapshot);
    }

    #[test]
    fn clones_are_snapshots() {
        let mut forest = example();
        let snapshot = forest.clone();
        forest.remove_node(&CommentId::from("1")).unwrap();
        forest.push_root(comment("6", None));
        assert_eq!(snapshot.len(), 4);
        assert_eq!(ids(snapshot.roots()), vec!["1", "4"]);
        assert_eq!(ids(forest.roots()), vec!["4", "6"]);
    }

    #[test]
    fn parents_may_come_after_replies() {
        let forest = CommentForest::build(&[
            comment("3", Some("2")),
            comment("2", Some("1")),
            comment("1", None),
        ]);
        assert_eq!(ids(forest.roots()), vec!["1"]);
        assert_eq!(forest.depth_of(&CommentId::from("3")), Some(2));
    }

    #[test]
    fn cycles_are_broken_at_first_comment() {
        let forest = CommentForest::build(&[
            comment("a", Some("b")),
            comment("b", Some("a")),
            comment("c", Some("c")),
            comment("d", Some("b")),
        ]);
        assert_eq!(ids(forest.roots()), vec!["a", "c"]);
        assert_eq!(ids(&child(&forest, "a").replies), vec!["b"]);
        assert_eq!(ids(&child(&forest, "b").replies), vec!["d"]);
        assert_eq!(forest.len(), 4);
    }

    #[test]
    fn reply_depth_policy() {
        let forest = CommentForest::build(&[
            comment("0", None),
            comment("1", Some("0")),
            comment("2", Some("1")),
            comment("3", Some("2")),
            comment("4", Some("3")),
        ]);
        assert!(forest.can_reply_to(&CommentId::from("0")));
        assert!(forest.can_reply_to(&CommentId::from("2")));
        assert!(!forest.can_reply_to(&CommentId::from("3")));
        // deeper comments are still represented
        assert_eq!(forest.depth_of(&CommentId::from("4")), Some(4));
        assert!(!forest.can_reply_to(&CommentId::from("missing")));
    }

    #[test]
    fn walk_yields_display_order() {
        let forest = example();
        let mut seen = Vec::new();
        forest.walk(|n, depth| seen.push((n.comment.id.0.clone(), depth)));
        assert_eq!(
            seen,
            vec![
                (String::from("1"), 0),
                (String::from("2"), 1),
                (String::from("3"), 2),
                (String::from("4"), 0),
            ]
        );
    }

    fn chain(depth: usize) -> Vec<api::Comment> {
        (0..depth)
            .map(|i| {
                let parent = (i > 0).then(|| (i - 1).to_string());
                comment(&i.to_string(), parent.as_deref())
            })
            .collect()
    }

    #[test]
    fn deep_reply_chains() {
        const DEPTH: usize = 3000;
        let flat = chain(DEPTH);
        let mut forest = CommentForest::build(&flat);
        let last = CommentId((DEPTH - 1).to_string());
        assert_eq!(forest.len(), DEPTH);
        assert_eq!(forest.roots().len(), 1);
        assert_eq!(forest.depth_of(&last), Some(DEPTH - 1));
        assert!(!forest.can_reply_to(&last));
        assert_eq!(forest.flatten(), flat);
        assert!(forest == CommentForest::build(&flat));

        forest
            .insert_reply(&last, comment("tail", Some(&last.0)))
            .unwrap();
        forest
            .edit_text(&CommentId::from("1500"), String::from("halfway"))
            .unwrap();
        assert_eq!(child(&forest, "1500").comment.text, "halfway");
        assert_eq!(forest.depth_of(&CommentId::from("tail")), Some(DEPTH));

        let removed = forest.remove_node(&CommentId::from("1")).unwrap();
        assert_eq!(removed.len(), DEPTH);
        assert_eq!(forest.len(), 1);
        drop(removed);

        let mut kept = CommentForest::build(&flat);
        kept.remove_node_keep_replies(&CommentId::from("0")).unwrap();
        assert_eq!(kept.depth_of(&last), Some(DEPTH - 2));
        drop(kept);
        drop(forest);
    }

    #[test]
    fn thousands_of_comments() {
        let flat = (0..3000usize)
            .map(|i| {
                // mostly short threads, with some chains running across many comments
                let parent = (i % 7 != 0).then(|| (i - 1 - (i * 37) % i.min(64)).to_string());
                comment(&i.to_string(), parent.as_deref())
            })
            .collect::<Vec<_>>();
        let forest = CommentForest::build(&flat);
        assert_eq!(forest.len(), 3000);
        let deepest = flat
            .iter()
            .filter_map(|c| forest.depth_of(&c.id))
            .max()
            .unwrap();
        assert!(deepest > 1, "forest is flat");
        let mut rebuilt = forest.flatten();
        rebuilt.sort_by_key(|c| c.id.0.parse::<usize>().unwrap());
        assert_eq!(rebuilt, flat);
    }

    fn flat_from(shape: &[(u8, Option<u8>)]) -> Vec<api::Comment> {
        shape
            .iter()
            .enumerate()
            .map(|(i, (_, parent))| {
                let parent = parent.map(|p| p.to_string());
                comment(&i.to_string(), parent.as_deref())
            })
            .collect()
    }

    /// Checks every node sits under its declared parent, or is a root
    fn check_links(nodes: &im::Vector<CommentNode>, parent: Option<&CommentId>) {
        let mut last = None;
        for n in nodes.iter() {
            if let Some(p) = parent {
                assert_eq!(n.comment.parent_id.as_ref(), Some(p));
            }
            let idx = n.comment.id.0.parse::<usize>().unwrap();
            assert!(last < Some(idx), "siblings out of input order");
            last = Some(idx);
            check_links(&n.replies, Some(&n.comment.id));
        }
    }

    #[test]
    fn build_partitions_any_input() {
        bolero::check!()
            .with_type::<Vec<(u8, Option<u8>)>>()
            .cloned()
            .for_each(|shape| {
                let flat = flat_from(&shape);
                let forest = CommentForest::build(&flat);
                assert_eq!(forest.len(), flat.len());
                let listed = forest.flatten();
                let unique = listed.iter().map(|c| &c.id).collect::<HashSet<_>>();
                assert_eq!(unique.len(), flat.len());
                check_links(forest.roots(), None);

                let known = flat.iter().map(|c| &c.id).collect::<HashSet<_>>();
                for c in flat.iter() {
                    let orphan = match &c.parent_id {
                        None => true,
                        Some(p) => !known.contains(p),
                    };
                    if orphan {
                        assert_eq!(forest.depth_of(&c.id), Some(0), "{c:?} not promoted");
                    }
                }
            });
    }

    #[test]
    fn insert_reply_matches_rebuild() {
        bolero::check!()
            .with_type::<(Vec<u8>, u8)>()
            .cloned()
            .for_each(|(parents, new_parent)| {
                // only well-ordered inputs: every parent precedes its replies
                let mut flat = parents
                    .iter()
                    .enumerate()
                    .map(|(i, p)| {
                        let parent = (i > 0 && *p % 4 != 0).then(|| (*p as usize % i).to_string());
                        comment(&i.to_string(), parent.as_deref())
                    })
                    .collect::<Vec<_>>();
                if flat.is_empty() {
                    return;
                }
                let parent = CommentId((new_parent as usize % flat.len()).to_string());
                let new = comment("new", Some(&parent.0));

                let mut forest = CommentForest::build(&flat);
                forest.insert_reply(&parent, new.clone()).unwrap();
                flat.push(new);
                assert_eq!(forest, CommentForest::build(&flat));
            });
    }
}
