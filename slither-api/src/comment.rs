use std::fmt;

use crate::{Error, PostId, Reaction, Time, UserId};

#[derive(
    Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
#[serde(transparent)]
pub struct CommentId(pub String);

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CommentId {
    fn from(s: &str) -> CommentId {
        CommentId(String::from(s))
    }
}

/// A comment as stored by the service: flat, referencing its parent by id
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: CommentId,
    #[serde(default)]
    pub parent_id: Option<CommentId>,
    pub post_id: PostId,
    pub author_id: UserId,
    pub author_name: String,
    pub text: String,
    pub created_at: Time,
    #[serde(default)]
    pub is_edited: bool,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub text: String,
    #[serde(default)]
    pub parent_id: Option<CommentId>,
}

impl NewComment {
    pub fn validate(&self) -> Result<(), Error> {
        validate_comment_text(&self.text)?;
        if let Some(p) = &self.parent_id {
            crate::validate_string(&p.0)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct EditComment {
    pub text: String,
}

impl EditComment {
    pub fn validate(&self) -> Result<(), Error> {
        validate_comment_text(&self.text)
    }
}

fn validate_comment_text(text: &str) -> Result<(), Error> {
    if text.trim().is_empty() {
        return Err(Error::EmptyComment);
    }
    crate::validate_string(text)
}
