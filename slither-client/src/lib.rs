mod comment;
pub use comment::{can_reply_at, CommentForest, CommentNode, MAX_REPLY_DEPTH};

mod feed;
pub use feed::{FeedState, Mutation, Reacted, Seq};

pub mod poll;

mod post;
pub use post::Post;

mod remote;
pub use remote::RemoteFeed;

mod session;
pub use session::Session;

mod sync;
pub use sync::Feed;

pub mod api {
    pub use slither_api::*;
}
