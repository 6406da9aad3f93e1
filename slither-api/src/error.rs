use anyhow::{anyhow, Context};
use serde_json::json;

use crate::{CommentId, PostId};

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Unknown error: {0}")]
    Unknown(String),

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Post {0} does not exist")]
    PostNotFound(PostId),

    #[error("Comment {0} does not exist")]
    CommentNotFound(CommentId),

    #[error("A post needs some text or a photo")]
    EmptyPost,

    #[error("A comment cannot be empty")]
    EmptyComment,

    #[error("Null byte in string is not allowed {0:?}")]
    NullByteInString(String),

    #[error("Name already used {0}")]
    NameAlreadyUsed(String),

    #[error("Could not reach the server: {0}")]
    Unreachable(String),
}

impl Error {
    pub fn status_code(&self) -> http::StatusCode {
        use http::StatusCode;
        match self {
            Error::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::PermissionDenied => StatusCode::FORBIDDEN,
            Error::PostNotFound(_) => StatusCode::NOT_FOUND,
            Error::CommentNotFound(_) => StatusCode::NOT_FOUND,
            Error::EmptyPost => StatusCode::BAD_REQUEST,
            Error::EmptyComment => StatusCode::BAD_REQUEST,
            Error::NullByteInString(_) => StatusCode::BAD_REQUEST,
            Error::NameAlreadyUsed(_) => StatusCode::CONFLICT,
            Error::Unreachable(_) => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn contents(&self) -> Vec<u8> {
        serde_json::to_vec(&match self {
            Error::Unknown(msg) => json!({
                "message": msg,
                "type": "unknown",
            }),
            Error::PermissionDenied => json!({
                "message": "permission denied",
                "type": "permission-denied",
            }),
            Error::PostNotFound(p) => json!({
                "message": "post not found",
                "type": "post-not-found",
                "post": p,
            }),
            Error::CommentNotFound(c) => json!({
                "message": "comment not found",
                "type": "comment-not-found",
                "comment": c,
            }),
            Error::EmptyPost => json!({
                "message": "a post needs some text or a photo",
                "type": "empty-post",
            }),
            Error::EmptyComment => json!({
                "message": "a comment cannot be empty",
                "type": "empty-comment",
            }),
            Error::NullByteInString(s) => json!({
                "message": "there was a null byte in argument string",
                "type": "null-byte",
                "string": s,
            }),
            Error::NameAlreadyUsed(n) => json!({
                "message": "name already used",
                "type": "conflict-name",
                "name": n,
            }),
            Error::Unreachable(msg) => json!({
                "message": msg,
                "type": "unreachable",
            }),
        })
        .expect("serializing error contents")
    }

    pub fn parse(body: &[u8]) -> anyhow::Result<Error> {
        let data: serde_json::Value =
            serde_json::from_slice(body).context("parsing error contents")?;
        macro_rules! field {
            ($name:expr, $what:expr) => {
                String::from(
                    data.get($name)
                        .and_then(|v| v.as_str())
                        .ok_or_else(|| anyhow!("error is {} without a {}", $what, $name))?,
                )
            };
        }
        Ok(
            match data
                .get("type")
                .and_then(|t| t.as_str())
                .ok_or_else(|| anyhow!("error type is not a string"))?
            {
                "unknown" => Error::Unknown(String::from(
                    data.get("message")
                        .and_then(|msg| msg.as_str())
                        .unwrap_or(""),
                )),
                "permission-denied" => Error::PermissionDenied,
                "post-not-found" => Error::PostNotFound(PostId(field!("post", "a missing post"))),
                "comment-not-found" => {
                    Error::CommentNotFound(CommentId(field!("comment", "a missing comment")))
                }
                "empty-post" => Error::EmptyPost,
                "empty-comment" => Error::EmptyComment,
                "null-byte" => Error::NullByteInString(field!("string", "a null-byte-in-string")),
                "conflict-name" => Error::NameAlreadyUsed(field!("name", "a name conflict")),
                "unreachable" => Error::Unreachable(String::from(
                    data.get("message")
                        .and_then(|msg| msg.as_str())
                        .unwrap_or(""),
                )),
                _ => return Err(anyhow!("error contents has unknown type")),
            },
        )
    }
}
