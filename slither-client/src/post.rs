use std::collections::HashSet;

use crate::{
    api::{self, PostId, Reaction, Time, UserId},
    CommentForest,
};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Post {
    pub id: PostId,
    pub author_id: UserId,
    pub author_name: String,
    pub animal_name: String,
    pub experience: String,
    pub photo_url: Option<String>,
    pub likes: u64,
    pub liked_by: HashSet<UserId>,
    pub reactions: Vec<Reaction>,
    pub created_at: Time,

    pub comments: CommentForest,
}

impl From<api::Post> for Post {
    fn from(p: api::Post) -> Post {
        let comments = CommentForest::build(&p.comments);
        Post {
            id: p.id,
            author_id: p.author_id,
            author_name: p.author_name,
            animal_name: p.animal_name,
            experience: p.experience,
            photo_url: p.photo_url,
            likes: p.likes,
            liked_by: p.liked_by,
            reactions: p.reactions,
            created_at: p.created_at,
            comments,
        }
    }
}

impl Post {
    pub fn is_liked_by(&self, user: &UserId) -> bool {
        self.liked_by.contains(user)
    }

    /// Takes the service's version of everything but the comments
    pub fn refresh_from(&mut self, p: api::Post) {
        self.author_id = p.author_id;
        self.author_name = p.author_name;
        self.animal_name = p.animal_name;
        self.experience = p.experience;
        self.photo_url = p.photo_url;
        self.likes = p.likes;
        self.liked_by = p.liked_by;
        self.reactions = p.reactions;
        self.created_at = p.created_at;
    }
}
