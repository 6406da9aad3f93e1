use std::collections::{btree_map, BTreeMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use slither_api::{
    set_reaction, AuthToken, Backend, Comment, CommentId, CurrentUser, EditComment, Error,
    NewComment, NewPost, NewUser, Post, PostId, React, UserId,
};
use uuid::Uuid;

/// In-memory feed service, answering like the real one would
pub struct MockServer {
    users: BTreeMap<UserId, DbUser>,

    /// Newest first
    posts: Vec<Post>,
}

#[derive(Debug)]
struct DbUser {
    user: CurrentUser,
    sessions: HashSet<AuthToken>,
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

impl MockServer {
    pub fn new() -> MockServer {
        MockServer {
            users: BTreeMap::new(),
            posts: Vec::new(),
        }
    }

    /// Return the current number of users
    pub fn test_num_users(&self) -> usize {
        self.users.len()
    }

    /// Creates a user, returning a first token for them
    pub fn admin_create_user(&mut self, u: NewUser) -> Result<AuthToken, Error> {
        u.validate()?;

        if self.users.values().any(|db| db.user.display_name == u.display_name) {
            return Err(Error::NameAlreadyUsed(u.display_name));
        }

        match self.users.entry(u.uid.clone()) {
            btree_map::Entry::Occupied(_) => Err(Error::NameAlreadyUsed(u.uid.0)),
            btree_map::Entry::Vacant(entry) => {
                let tok = AuthToken::generate();
                let mut sessions = HashSet::new();
                sessions.insert(tok);
                entry.insert(DbUser {
                    user: CurrentUser {
                        uid: u.uid,
                        display_name: u.display_name,
                        email: u.email,
                        email_verified: false,
                    },
                    sessions,
                });
                Ok(tok)
            }
        }
    }

    fn resolve(&self, tok: AuthToken) -> Result<&DbUser, Error> {
        self.users
            .values()
            .find(|u| u.sessions.contains(&tok))
            .ok_or(Error::PermissionDenied)
    }

    fn resolve_mut(&mut self, tok: AuthToken) -> Result<&mut DbUser, Error> {
        self.users
            .values_mut()
            .find(|u| u.sessions.contains(&tok))
            .ok_or(Error::PermissionDenied)
    }

    fn post_mut(&mut self, id: &PostId) -> Result<&mut Post, Error> {
        self.posts
            .iter_mut()
            .find(|p| p.id == *id)
            .ok_or_else(|| Error::PostNotFound(id.clone()))
    }

    pub fn unauth(&mut self, tok: AuthToken) -> Result<(), Error> {
        let u = self.resolve_mut(tok)?;
        u.sessions.remove(&tok);
        Ok(())
    }

    pub fn whoami(&self, tok: AuthToken) -> Result<CurrentUser, Error> {
        Ok(self.resolve(tok)?.user.clone())
    }

    pub fn fetch_posts(&self, tok: AuthToken) -> Result<Vec<Post>, Error> {
        self.resolve(tok)?;
        Ok(self.posts.clone())
    }

    pub fn create_post(&mut self, tok: AuthToken, p: NewPost) -> Result<Post, Error> {
        let user = self.resolve(tok)?.user.clone();
        p.validate()?;
        let post = Post {
            id: PostId(new_id()),
            author_id: user.uid,
            author_name: user.display_name,
            animal_name: p.animal_name,
            experience: p.experience,
            photo_url: p.photo_url.filter(|u| !u.trim().is_empty()),
            likes: 0,
            liked_by: HashSet::new(),
            reactions: Vec::new(),
            created_at: Utc::now(),
            comments: Vec::new(),
        };
        self.posts.insert(0, post.clone());
        Ok(post)
    }

    pub fn create_comment(
        &mut self,
        tok: AuthToken,
        post: &PostId,
        c: NewComment,
    ) -> Result<Comment, Error> {
        let user = self.resolve(tok)?.user.clone();
        c.validate()?;
        let p = self.post_mut(post)?;
        if let Some(parent) = &c.parent_id {
            if !p.comments.iter().any(|c| c.id == *parent) {
                return Err(Error::CommentNotFound(parent.clone()));
            }
        }
        let comment = Comment {
            id: CommentId(new_id()),
            parent_id: c.parent_id,
            post_id: post.clone(),
            author_id: user.uid,
            author_name: user.display_name,
            text: c.text,
            created_at: Utc::now(),
            is_edited: false,
            reactions: Vec::new(),
        };
        p.comments.push(comment.clone());
        Ok(comment)
    }

    /// Finds a comment `user` is allowed to modify
    fn own_comment_mut<'a>(
        p: &'a mut Post,
        comment: &CommentId,
        user: &UserId,
    ) -> Result<&'a mut Comment, Error> {
        let c = p
            .comments
            .iter_mut()
            .find(|c| c.id == *comment)
            .ok_or_else(|| Error::CommentNotFound(comment.clone()))?;
        if c.author_id != *user {
            return Err(Error::PermissionDenied);
        }
        Ok(c)
    }

    pub fn edit_comment(
        &mut self,
        tok: AuthToken,
        post: &PostId,
        comment: &CommentId,
        e: EditComment,
    ) -> Result<Comment, Error> {
        let user = self.resolve(tok)?.user.uid.clone();
        e.validate()?;
        let c = Self::own_comment_mut(self.post_mut(post)?, comment, &user)?;
        c.text = e.text;
        c.is_edited = true;
        Ok(c.clone())
    }

    /// Deletes a comment along with all the replies below it
    pub fn delete_comment(
        &mut self,
        tok: AuthToken,
        post: &PostId,
        comment: &CommentId,
    ) -> Result<(), Error> {
        let user = self.resolve(tok)?.user.uid.clone();
        let p = self.post_mut(post)?;
        Self::own_comment_mut(p, comment, &user)?;
        let mut doomed = HashSet::new();
        doomed.insert(comment.clone());
        loop {
            let before = doomed.len();
            for c in p.comments.iter() {
                if c.parent_id.as_ref().map_or(false, |parent| doomed.contains(parent)) {
                    doomed.insert(c.id.clone());
                }
            }
            if doomed.len() == before {
                break;
            }
        }
        p.comments.retain(|c| !doomed.contains(&c.id));
        tracing::debug!(comments = doomed.len(), "deleted comment subtree");
        Ok(())
    }

    pub fn react_to_comment(
        &mut self,
        tok: AuthToken,
        post: &PostId,
        comment: &CommentId,
        r: React,
    ) -> Result<Comment, Error> {
        let user = self.resolve(tok)?.user.uid.clone();
        let c = self
            .post_mut(post)?
            .comments
            .iter_mut()
            .find(|c| c.id == *comment)
            .ok_or_else(|| Error::CommentNotFound(comment.clone()))?;
        set_reaction(&mut c.reactions, &user, r.kind);
        Ok(c.clone())
    }

    pub fn react_to_post(&mut self, tok: AuthToken, post: &PostId, r: React) -> Result<Post, Error> {
        let user = self.resolve(tok)?.user.uid.clone();
        let p = self.post_mut(post)?;
        set_reaction(&mut p.reactions, &user, r.kind);
        Ok(p.clone())
    }

    /// Likes the post, or takes the like back if it was already there
    pub fn like_post(&mut self, tok: AuthToken, post: &PostId) -> Result<Post, Error> {
        let user = self.resolve(tok)?.user.uid.clone();
        let p = self.post_mut(post)?;
        if p.liked_by.remove(&user) {
            p.likes = p.likes.saturating_sub(1);
        } else {
            p.liked_by.insert(user);
            p.likes += 1;
        }
        Ok(p.clone())
    }
}

/// A `Backend` acting as the user of `token` on a `MockServer`
pub struct MockSession<'a> {
    server: &'a mut MockServer,
    token: AuthToken,
}

impl<'a> MockSession<'a> {
    pub fn new(server: &'a mut MockServer, token: AuthToken) -> MockSession<'a> {
        MockSession { server, token }
    }
}

#[async_trait]
impl<'a> Backend for MockSession<'a> {
    async fn whoami(&mut self) -> Result<CurrentUser, Error> {
        self.server.whoami(self.token)
    }

    async fn fetch_posts(&mut self) -> Result<Vec<Post>, Error> {
        self.server.fetch_posts(self.token)
    }

    async fn create_post(&mut self, p: NewPost) -> Result<Post, Error> {
        self.server.create_post(self.token, p)
    }

    async fn create_comment(&mut self, post: &PostId, c: NewComment) -> Result<Comment, Error> {
        self.server.create_comment(self.token, post, c)
    }

    async fn edit_comment(
        &mut self,
        post: &PostId,
        comment: &CommentId,
        e: EditComment,
    ) -> Result<Comment, Error> {
        self.server.edit_comment(self.token, post, comment, e)
    }

    async fn delete_comment(&mut self, post: &PostId, comment: &CommentId) -> Result<(), Error> {
        self.server.delete_comment(self.token, post, comment)
    }

    async fn react_to_comment(
        &mut self,
        post: &PostId,
        comment: &CommentId,
        r: React,
    ) -> Result<Comment, Error> {
        self.server.react_to_comment(self.token, post, comment, r)
    }

    async fn react_to_post(&mut self, post: &PostId, r: React) -> Result<Post, Error> {
        self.server.react_to_post(self.token, post, r)
    }

    async fn like_post(&mut self, post: &PostId) -> Result<Post, Error> {
        self.server.like_post(self.token, post)
    }
}

#[cfg(test)]
mod tests {
    use slither_api::ReactionType;

    use super::*;

    fn user(name: &str) -> NewUser {
        NewUser {
            uid: UserId(String::from(name)),
            display_name: String::from(name),
            email: format!("{name}@example.org"),
        }
    }

    fn post(server: &mut MockServer, tok: AuthToken) -> PostId {
        server
            .create_post(
                tok,
                NewPost {
                    animal_name: String::from("Green Vine Snake"),
                    experience: String::from("hanging from the guava tree"),
                    photo_url: None,
                },
            )
            .unwrap()
            .id
    }

    fn comment(
        server: &mut MockServer,
        tok: AuthToken,
        post: &PostId,
        parent: Option<&CommentId>,
    ) -> CommentId {
        server
            .create_comment(
                tok,
                post,
                NewComment {
                    text: String::from("nice"),
                    parent_id: parent.cloned(),
                },
            )
            .unwrap()
            .id
    }

    #[test]
    fn users_are_unique() {
        let mut server = MockServer::new();
        server.admin_create_user(user("asha")).unwrap();
        assert_eq!(
            server.admin_create_user(user("asha")),
            Err(Error::NameAlreadyUsed(String::from("asha")))
        );
        assert_eq!(server.test_num_users(), 1);
    }

    #[test]
    fn tokens_stop_working_after_unauth() {
        let mut server = MockServer::new();
        let tok = server.admin_create_user(user("asha")).unwrap();
        assert_eq!(server.whoami(tok).unwrap().display_name, "asha");
        server.unauth(tok).unwrap();
        assert_eq!(server.whoami(tok), Err(Error::PermissionDenied));
        assert_eq!(server.fetch_posts(AuthToken::stub()), Err(Error::PermissionDenied));
    }

    #[test]
    fn newest_posts_first() {
        let mut server = MockServer::new();
        let tok = server.admin_create_user(user("asha")).unwrap();
        let first = post(&mut server, tok);
        let second = post(&mut server, tok);
        let posts = server.fetch_posts(tok).unwrap();
        assert_eq!(posts[0].id, second);
        assert_eq!(posts[1].id, first);
    }

    #[test]
    fn replies_need_an_existing_parent() {
        let mut server = MockServer::new();
        let tok = server.admin_create_user(user("asha")).unwrap();
        let p = post(&mut server, tok);
        let missing = CommentId::from("missing");
        assert_eq!(
            server.create_comment(
                tok,
                &p,
                NewComment {
                    text: String::from("hi"),
                    parent_id: Some(missing.clone()),
                }
            ),
            Err(Error::CommentNotFound(missing))
        );
    }

    #[test]
    fn only_authors_edit_and_delete() {
        let mut server = MockServer::new();
        let asha = server.admin_create_user(user("asha")).unwrap();
        let ravi = server.admin_create_user(user("ravi")).unwrap();
        let p = post(&mut server, asha);
        let c = comment(&mut server, asha, &p, None);
        let edit = EditComment {
            text: String::from("not mine"),
        };
        assert_eq!(
            server.edit_comment(ravi, &p, &c, edit.clone()),
            Err(Error::PermissionDenied)
        );
        assert_eq!(server.delete_comment(ravi, &p, &c), Err(Error::PermissionDenied));
        let edited = server.edit_comment(asha, &p, &c, edit).unwrap();
        assert!(edited.is_edited);
    }

    #[test]
    fn delete_takes_replies_along() {
        let mut server = MockServer::new();
        let tok = server.admin_create_user(user("asha")).unwrap();
        let p = post(&mut server, tok);
        let root = comment(&mut server, tok, &p, None);
        let child = comment(&mut server, tok, &p, Some(&root));
        comment(&mut server, tok, &p, Some(&child));
        let other = comment(&mut server, tok, &p, None);
        server.delete_comment(tok, &p, &root).unwrap();
        let posts = server.fetch_posts(tok).unwrap();
        let left = posts[0].comments.iter().map(|c| &c.id).collect::<Vec<_>>();
        assert_eq!(left, vec![&other]);
    }

    #[test]
    fn reactions_and_likes() {
        let mut server = MockServer::new();
        let asha = server.admin_create_user(user("asha")).unwrap();
        let ravi = server.admin_create_user(user("ravi")).unwrap();
        let p = post(&mut server, asha);
        let c = comment(&mut server, asha, &p, None);

        server
            .react_to_comment(ravi, &p, &c, React { kind: ReactionType::Like })
            .unwrap();
        let c = server
            .react_to_comment(ravi, &p, &c, React { kind: ReactionType::Angry })
            .unwrap();
        assert_eq!(c.reactions.len(), 1);
        assert_eq!(c.reactions[0].kind, ReactionType::Angry);

        let reacted = server
            .react_to_post(asha, &p, React { kind: ReactionType::Love })
            .unwrap();
        assert_eq!(reacted.reactions.len(), 1);

        assert_eq!(server.like_post(ravi, &p).unwrap().likes, 1);
        assert_eq!(server.like_post(asha, &p).unwrap().likes, 2);
        let unliked = server.like_post(ravi, &p).unwrap();
        assert_eq!(unliked.likes, 1);
        assert!(!unliked.liked_by.contains(&UserId(String::from("ravi"))));
    }
}
