use std::{collections::HashSet, fmt};

use crate::{Comment, Error, Reaction, Time, UserId};

#[derive(
    Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
#[serde(transparent)]
pub struct PostId(pub String);

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PostId {
    fn from(s: &str) -> PostId {
        PostId(String::from(s))
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: PostId,
    pub author_id: UserId,
    pub author_name: String,
    pub animal_name: String,
    pub experience: String,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub liked_by: HashSet<UserId>,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
    pub created_at: Time,

    /// Flat list, in the order the service returned it
    #[serde(default)]
    pub comments: Vec<Comment>,
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPost {
    pub animal_name: String,
    pub experience: String,
    #[serde(default)]
    pub photo_url: Option<String>,
}

impl NewPost {
    /// A post needs at least some text or a photo
    pub fn validate(&self) -> Result<(), Error> {
        let has_photo = self.photo_url.as_deref().map_or(false, |u| !u.trim().is_empty());
        if self.experience.trim().is_empty() && !has_photo {
            return Err(Error::EmptyPost);
        }
        crate::validate_string(&self.animal_name)?;
        crate::validate_string(&self.experience)?;
        if let Some(url) = &self.photo_url {
            crate::validate_string(url)?;
        }
        Ok(())
    }
}
