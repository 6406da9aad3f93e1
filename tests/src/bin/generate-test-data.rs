//! Prints a JSON feed fixture, as `GET /posts` would answer it

use std::collections::HashSet;

use anyhow::Context;
use chrono::{Duration, Utc};
use rand::{seq::SliceRandom, Rng};
use slither_api::{Comment, CommentId, Post, PostId, Reaction, ReactionType, Time, UserId};

const NUM_USERS: usize = 8;
const NUM_POSTS: usize = 20;
const MAX_COMMENTS_PER_POST: usize = 40;
const MAX_REACTIONS: usize = 5;

/// Chance for a comment to answer an earlier one rather than the post
const REPLY_PROBABILITY: f64 = 0.6;

/// Chance for a comment to swap places with another one, so replies sometimes
/// come before their parent
const SHUFFLE_PROBABILITY: f64 = 0.05;

const ANIMALS: &[&str] = &[
    "Indian Cobra",
    "Common Krait",
    "Russell's Viper",
    "Saw-scaled Viper",
    "Indian Rat Snake",
    "Checkered Keelback",
    "Green Vine Snake",
    "Indian Rock Python",
];

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn gen_time(rng: &mut impl Rng, after: Time) -> Time {
    let since = (Utc::now() - after).num_minutes().max(1);
    after + Duration::minutes(rng.gen_range(0..since))
}

fn gen_reactions(rng: &mut impl Rng, users: &[(UserId, String)]) -> Vec<Reaction> {
    let n = rng.gen_range(0..=MAX_REACTIONS.min(users.len()));
    users
        .choose_multiple(rng, n)
        .map(|(user_id, _)| Reaction {
            user_id: user_id.clone(),
            kind: *ReactionType::ALL
                .choose(rng)
                .unwrap_or(&ReactionType::Like),
        })
        .collect()
}

fn gen_post(rng: &mut impl Rng, users: &[(UserId, String)]) -> anyhow::Result<Post> {
    let (author_id, author_name) = users.choose(rng).context("no users")?.clone();
    let id = PostId(new_id());
    let created_at = gen_time(rng, Utc::now() - Duration::days(30));

    let mut comments: Vec<Comment> = Vec::new();
    for _ in 0..rng.gen_range(0..MAX_COMMENTS_PER_POST) {
        let (commenter_id, commenter_name) = users.choose(rng).context("no users")?.clone();
        let parent = match rng.gen_bool(REPLY_PROBABILITY) {
            true => comments.choose(rng).map(|c| (c.id.clone(), c.created_at)),
            false => None,
        };
        let after = parent.as_ref().map_or(created_at, |(_, t)| *t);
        comments.push(Comment {
            id: CommentId(new_id()),
            parent_id: parent.map(|(id, _)| id),
            post_id: id.clone(),
            author_id: commenter_id,
            author_name: commenter_name,
            text: lipsum::lipsum_words(rng.gen_range(3..40)),
            created_at: gen_time(rng, after),
            is_edited: rng.gen_bool(0.1),
            reactions: gen_reactions(rng, users),
        });
    }
    for i in 0..comments.len() {
        if rng.gen_bool(SHUFFLE_PROBABILITY) {
            let j = rng.gen_range(0..comments.len());
            comments.swap(i, j);
        }
    }

    let num_likes = rng.gen_range(0..users.len());
    let liked_by = users
        .choose_multiple(rng, num_likes)
        .map(|(u, _)| u.clone())
        .collect::<HashSet<_>>();
    Ok(Post {
        id,
        author_id,
        author_name,
        animal_name: String::from(*ANIMALS.choose(rng).context("no animals")?),
        experience: lipsum::lipsum(rng.gen_range(10..80)),
        photo_url: rng
            .gen_bool(0.3)
            .then(|| format!("https://photos.example.org/{}.jpg", new_id())),
        likes: liked_by.len() as u64,
        liked_by,
        reactions: gen_reactions(rng, users),
        created_at,
        comments,
    })
}

fn main() -> anyhow::Result<()> {
    let mut rng = rand::thread_rng();

    let users = (0..NUM_USERS)
        .map(|i| {
            let name = lipsum::lipsum_words(1);
            (UserId(new_id()), format!("{}{i}", name.trim_end_matches('.')))
        })
        .collect::<Vec<_>>();

    let mut posts = (0..NUM_POSTS)
        .map(|_| gen_post(&mut rng, &users))
        .collect::<anyhow::Result<Vec<_>>>()?;
    posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    println!(
        "{}",
        serde_json::to_string_pretty(&posts).context("serializing posts")?
    );
    Ok(())
}
