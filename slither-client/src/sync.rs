use crate::{
    api::{
        Backend, CommentId, EditComment, Error, NewComment, NewPost, PostId, React, ReactionType,
    },
    FeedState, Mutation, Reacted, Seq,
};

/// A feed view: local state kept in sync with a remote service
///
/// Every action waits for the service's answer before touching the local state.
/// Failures leave the state as it was, and are kept as a dismissible message
/// until the next failure or `dismiss_error`. Nothing is retried.
pub struct Feed<B> {
    backend: B,
    state: FeedState,
    last_error: Option<String>,
}

impl<B: Backend + Send> Feed<B> {
    pub fn new(backend: B) -> Feed<B> {
        Feed {
            backend,
            state: FeedState::new(),
            last_error: None,
        }
    }

    pub fn state(&self) -> &FeedState {
        &self.state
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.last_error = None;
    }

    fn surface<T>(&mut self, res: Result<T, Error>) -> Result<T, Error> {
        if let Err(err) = &res {
            tracing::warn!(%err, "feed action failed");
            self.last_error = Some(err.to_string());
        }
        res
    }

    /// Mirrors a call the service answered, `seq` being its issue order
    ///
    /// Only the service's failures are reported: once it accepted the call, a
    /// local mismatch (such as a post missing from the local feed) is logged and
    /// fixed by the next `refresh`.
    fn apply_after<T, F>(
        &mut self,
        seq: Seq,
        res: Result<T, Error>,
        to_mutation: F,
    ) -> Result<T, Error>
    where
        F: FnOnce(&T) -> Mutation,
    {
        let v = self.surface(res)?;
        if let Err(err) = self.state.apply_sequenced(seq, to_mutation(&v)) {
            tracing::warn!(%err, "service accepted the call but the local feed could not follow");
        }
        Ok(v)
    }

    pub async fn refresh(&mut self) -> Result<(), Error> {
        let res = self.backend.fetch_posts().await;
        let res = res.map(|posts| self.state.replace_posts(posts));
        self.surface(res)
    }

    pub async fn create_post(&mut self, p: NewPost) -> Result<PostId, Error> {
        if let Err(e) = p.validate() {
            return self.surface(Err(e));
        }
        let seq = self.state.next_seq();
        let res = self.backend.create_post(p).await;
        self.apply_after(seq, res, |p| Mutation::PostCreated(p.clone()))
            .map(|p| p.id)
    }

    pub async fn comment(&mut self, post: &PostId, c: NewComment) -> Result<CommentId, Error> {
        if let Err(e) = c.validate() {
            return self.surface(Err(e));
        }
        let too_deep = match (&c.parent_id, self.state.post(post)) {
            (Some(parent), Some(p)) => {
                p.comments.find(parent).is_some() && !p.comments.can_reply_to(parent)
            }
            _ => false,
        };
        if too_deep {
            tracing::debug!(post = %post, "reply nested too deep");
            return self.surface(Err(Error::PermissionDenied));
        }
        let seq = self.state.next_seq();
        let res = self.backend.create_comment(post, c).await;
        self.apply_after(seq, res, |c| Mutation::CommentCreated {
            post: post.clone(),
            comment: c.clone(),
        })
        .map(|c| c.id)
    }

    pub async fn edit_comment(
        &mut self,
        post: &PostId,
        comment: &CommentId,
        text: String,
    ) -> Result<(), Error> {
        let e = EditComment { text };
        if let Err(e) = e.validate() {
            return self.surface(Err(e));
        }
        let seq = self.state.next_seq();
        let res = self.backend.edit_comment(post, comment, e).await;
        self.apply_after(seq, res, |c| Mutation::CommentUpdated {
            post: post.clone(),
            id: comment.clone(),
            comment: c.clone(),
        })
        .map(|_| ())
    }

    pub async fn delete_comment(&mut self, post: &PostId, comment: &CommentId) -> Result<(), Error> {
        let seq = self.state.next_seq();
        let res = self.backend.delete_comment(post, comment).await;
        self.apply_after(seq, res, |_| Mutation::CommentDeleted {
            post: post.clone(),
            id: comment.clone(),
        })
    }

    pub async fn react_to_comment(
        &mut self,
        post: &PostId,
        comment: &CommentId,
        kind: ReactionType,
    ) -> Result<(), Error> {
        let seq = self.state.next_seq();
        let res = self
            .backend
            .react_to_comment(post, comment, React { kind })
            .await;
        self.apply_after(seq, res, |c| Mutation::Reacted {
            post: post.clone(),
            record: Reacted::Comment(c.clone()),
        })
        .map(|_| ())
    }

    pub async fn react_to_post(&mut self, post: &PostId, kind: ReactionType) -> Result<(), Error> {
        let seq = self.state.next_seq();
        let res = self.backend.react_to_post(post, React { kind }).await;
        self.apply_after(seq, res, |p| Mutation::Reacted {
            post: post.clone(),
            record: Reacted::Post(p.clone()),
        })
        .map(|_| ())
    }

    pub async fn like_post(&mut self, post: &PostId) -> Result<(), Error> {
        let seq = self.state.next_seq();
        let res = self.backend.like_post(post).await;
        self.apply_after(seq, res, |p| Mutation::Reacted {
            post: post.clone(),
            record: Reacted::Post(p.clone()),
        })
        .map(|_| ())
    }
}
