use async_trait::async_trait;
use chrono::Utc;

pub use uuid::{uuid, Uuid};
pub type Time = chrono::DateTime<Utc>;

mod auth;
pub use auth::AuthToken;

mod comment;
pub use comment::{Comment, CommentId, EditComment, NewComment};

mod error;
pub use error::Error;

mod post;
pub use post::{NewPost, Post, PostId};

mod reaction;
pub use reaction::{reaction_counts, set_reaction, React, Reaction, ReactionType};

mod user;
pub use user::{CurrentUser, NewUser, UserId};

pub const STUB_UUID: Uuid = uuid!("ffffffff-ffff-ffff-ffff-ffffffffffff");

// The `validate` functions throughout slither-api reject input before it reaches
// the service. They only check presence and encoding, the service stays the sole
// source of truth for everything else.
pub fn validate_string(s: &str) -> Result<(), Error> {
    if s.contains('\0') {
        return Err(Error::NullByteInString(String::from(s)));
    }
    Ok(())
}

/// The remote feed service, as seen by a logged-in user
///
/// Every call is a round-trip to the service: callers must only apply local
/// changes once the returned future resolved to `Ok`.
#[async_trait]
pub trait Backend {
    async fn whoami(&mut self) -> Result<CurrentUser, Error>;
    async fn fetch_posts(&mut self) -> Result<Vec<Post>, Error>;
    async fn create_post(&mut self, p: NewPost) -> Result<Post, Error>;
    async fn create_comment(&mut self, post: &PostId, c: NewComment) -> Result<Comment, Error>;
    async fn edit_comment(
        &mut self,
        post: &PostId,
        comment: &CommentId,
        e: EditComment,
    ) -> Result<Comment, Error>;
    async fn delete_comment(&mut self, post: &PostId, comment: &CommentId) -> Result<(), Error>;
    async fn react_to_comment(
        &mut self,
        post: &PostId,
        comment: &CommentId,
        r: React,
    ) -> Result<Comment, Error>;
    async fn react_to_post(&mut self, post: &PostId, r: React) -> Result<Post, Error>;
    async fn like_post(&mut self, post: &PostId) -> Result<Post, Error>;
}
