use bolero::generator::TypeGenerator;
use std::{collections::BTreeMap, fmt, str::FromStr};

use crate::UserId;

#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    bolero::generator::TypeGenerator,
    serde::Deserialize,
    serde::Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ReactionType {
    Like,
    Love,
    Laugh,
    Wow,
    Sad,
    Angry,
}

impl ReactionType {
    pub const ALL: [ReactionType; 6] = [
        ReactionType::Like,
        ReactionType::Love,
        ReactionType::Laugh,
        ReactionType::Wow,
        ReactionType::Sad,
        ReactionType::Angry,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReactionType::Like => "like",
            ReactionType::Love => "love",
            ReactionType::Laugh => "laugh",
            ReactionType::Wow => "wow",
            ReactionType::Sad => "sad",
            ReactionType::Angry => "angry",
        }
    }
}

impl fmt::Display for ReactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReactionType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<ReactionType> {
        ReactionType::ALL
            .iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| anyhow::anyhow!("unknown reaction type {s:?}"))
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    pub user_id: UserId,
    #[serde(rename = "type")]
    pub kind: ReactionType,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct React {
    #[serde(rename = "type")]
    pub kind: ReactionType,
}

/// Records `user`'s reaction, replacing any reaction they had already left
///
/// Only one reaction per user is kept, the last one written wins. Duplicates
/// already present in `reactions` for this user are collapsed too.
pub fn set_reaction(reactions: &mut Vec<Reaction>, user: &UserId, kind: ReactionType) {
    match reactions.iter().position(|r| r.user_id == *user) {
        Some(first) => {
            reactions[first].kind = kind;
            let mut idx = 0;
            reactions.retain(|r| {
                let keep = idx <= first || r.user_id != *user;
                idx += 1;
                keep
            });
        }
        None => reactions.push(Reaction {
            user_id: user.clone(),
            kind,
        }),
    }
}

/// Aggregate counts, as the service reports them
pub fn reaction_counts(reactions: &[Reaction]) -> BTreeMap<ReactionType, usize> {
    let mut res = BTreeMap::new();
    for r in reactions {
        *res.entry(r.kind).or_insert(0) += 1;
    }
    res
}
