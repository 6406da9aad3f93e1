use std::collections::HashMap;

use crate::{
    api::{self, CommentId, Error, PostId},
    Post,
};

/// Issue order of a remote call, see `FeedState::apply_sequenced`
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Seq(pub u64);

/// A server-confirmed change, to be replayed on the local feed
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Mutation {
    PostCreated(api::Post),
    CommentCreated {
        post: PostId,
        comment: api::Comment,
    },
    CommentUpdated {
        post: PostId,
        id: CommentId,
        comment: api::Comment,
    },
    CommentDeleted {
        post: PostId,
        id: CommentId,
    },
    Reacted {
        post: PostId,
        record: Reacted,
    },
}

/// Canonical record returned by the service after a reaction or a like
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Reacted {
    Post(api::Post),
    Comment(api::Comment),
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
enum Target {
    Post(PostId),
    Comment(PostId, CommentId),
}

impl Mutation {
    /// The record this mutation overwrites, if it overwrites one
    fn replaced_target(&self) -> Option<Target> {
        match self {
            Mutation::PostCreated(_)
            | Mutation::CommentCreated { .. }
            | Mutation::CommentDeleted { .. } => None,
            Mutation::CommentUpdated { post, id, .. } => {
                Some(Target::Comment(post.clone(), id.clone()))
            }
            Mutation::Reacted {
                post,
                record: Reacted::Post(_),
            } => Some(Target::Post(post.clone())),
            Mutation::Reacted {
                post,
                record: Reacted::Comment(c),
            } => Some(Target::Comment(post.clone(), c.id.clone())),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct FeedState {
    posts: im::Vector<Post>,
    next_seq: u64,
    applied: HashMap<Target, Seq>,
}

impl FeedState {
    pub fn new() -> FeedState {
        FeedState::default()
    }

    /// Replaces the whole feed with freshly fetched posts
    pub fn replace_posts(&mut self, posts: Vec<api::Post>) {
        self.posts = posts.into_iter().map(Post::from).collect();
        self.applied.clear();
    }

    pub fn posts(&self) -> &im::Vector<Post> {
        &self.posts
    }

    pub fn post(&self, id: &PostId) -> Option<&Post> {
        self.posts.iter().find(|p| p.id == *id)
    }

    fn post_mut(&mut self, id: &PostId) -> Result<&mut Post, Error> {
        match self.posts.iter_mut().find(|p| p.id == *id) {
            Some(p) => Ok(p),
            None => {
                tracing::warn!(post = %id, "post not found in local feed");
                Err(Error::PostNotFound(id.clone()))
            }
        }
    }

    pub fn on_post_created(&mut self, post: api::Post) {
        if let Some(p) = self.posts.iter_mut().find(|p| p.id == post.id) {
            p.refresh_from(post);
            return;
        }
        self.posts.push_front(Post::from(post));
    }

    pub fn on_comment_created(
        &mut self,
        post_id: &PostId,
        comment: api::Comment,
    ) -> Result<(), Error> {
        let post = self.post_mut(post_id)?;
        if post.comments.find(&comment.id).is_some() {
            tracing::debug!(comment = %comment.id, "comment already known, updating instead");
            let id = comment.id.clone();
            return post.comments.update_node(&id, comment);
        }
        match comment.parent_id.clone() {
            Some(parent) if post.comments.find(&parent).is_some() => {
                post.comments.insert_reply(&parent, comment)
            }
            Some(parent) => {
                // same placement a rebuild from the flat list would give it
                tracing::warn!(%parent, comment = %comment.id, "reply to unknown comment, showing it top-level");
                post.comments.push_root(comment);
                Ok(())
            }
            None => {
                post.comments.push_root(comment);
                Ok(())
            }
        }
    }

    pub fn on_comment_updated(
        &mut self,
        post_id: &PostId,
        comment_id: &CommentId,
        comment: api::Comment,
    ) -> Result<(), Error> {
        self.post_mut(post_id)?
            .comments
            .update_node(comment_id, comment)
    }

    pub fn on_comment_deleted(
        &mut self,
        post_id: &PostId,
        comment_id: &CommentId,
    ) -> Result<(), Error> {
        let removed = self.post_mut(post_id)?.comments.remove_node(comment_id)?;
        tracing::debug!(comment = %comment_id, dropped = removed.len(), "removed comment subtree");
        Ok(())
    }

    /// Takes the service's canonical record, aggregates included
    pub fn on_reaction(&mut self, post_id: &PostId, record: Reacted) -> Result<(), Error> {
        let post = self.post_mut(post_id)?;
        match record {
            Reacted::Post(p) => {
                post.refresh_from(p);
                Ok(())
            }
            Reacted::Comment(c) => {
                let id = c.id.clone();
                post.comments.update_node(&id, c)
            }
        }
    }

    /// Applies `m` unconditionally: the last response applied wins
    pub fn apply(&mut self, m: Mutation) -> Result<(), Error> {
        match m {
            Mutation::PostCreated(p) => {
                self.on_post_created(p);
                Ok(())
            }
            Mutation::CommentCreated { post, comment } => self.on_comment_created(&post, comment),
            Mutation::CommentUpdated { post, id, comment } => {
                self.on_comment_updated(&post, &id, comment)
            }
            Mutation::CommentDeleted { post, id } => self.on_comment_deleted(&post, &id),
            Mutation::Reacted { post, record } => self.on_reaction(&post, record),
        }
    }

    /// Numbers a remote call about to be issued
    pub fn next_seq(&mut self) -> Seq {
        self.next_seq += 1;
        Seq(self.next_seq)
    }

    /// Applies `m` unless a more recently issued call already overwrote the same
    /// record
    ///
    /// Returns whether `m` was applied. Creations and deletions are never stale.
    pub fn apply_sequenced(&mut self, seq: Seq, m: Mutation) -> Result<bool, Error> {
        let target = m.replaced_target();
        if let Some(target) = &target {
            if let Some(last) = self.applied.get(target) {
                if *last > seq {
                    tracing::debug!(?seq, ?last, "dropping stale response");
                    return Ok(false);
                }
            }
        }
        self.apply(m)?;
        if let Some(target) = target {
            self.applied.insert(target, seq);
        }
        Ok(true)
    }
}
