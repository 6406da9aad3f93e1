use std::time::Duration;

use anyhow::Context;
use slither_client::{
    api::{
        reaction_counts, AuthToken, Backend, CommentId, NewComment, NewPost, NewUser, PostId,
        Reaction, ReactionType, UserId, Uuid,
    },
    can_reply_at, poll, Feed, FeedState, RemoteFeed, Session,
};
use tracing_subscriber::EnvFilter;

#[derive(structopt::StructOpt)]
struct Opt {
    #[structopt(short, long, env = "SLITHER_HOST", default_value = "http://127.0.0.1:3000")]
    host: String,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(structopt::StructOpt)]
enum Command {
    /// Show all posts along with their comments
    Feed,

    /// Share a sighting
    Post {
        animal_name: String,

        /// What happened
        experience: String,

        #[structopt(long)]
        photo_url: Option<String>,
    },

    /// Comment on a post, or reply to a comment with --parent
    Comment {
        #[structopt(parse(from_str))]
        post: PostId,
        text: String,

        #[structopt(long, parse(from_str))]
        parent: Option<CommentId>,
    },

    /// Change the text of one of your comments
    Edit {
        #[structopt(parse(from_str))]
        post: PostId,
        #[structopt(parse(from_str))]
        comment: CommentId,
        text: String,
    },

    /// Delete one of your comments, along with its replies
    Delete {
        #[structopt(parse(from_str))]
        post: PostId,
        #[structopt(parse(from_str))]
        comment: CommentId,
    },

    /// React to a post, or to a comment with --comment
    React {
        #[structopt(parse(from_str))]
        post: PostId,

        /// One of like, love, laugh, wow, sad, angry
        kind: ReactionType,

        #[structopt(long, parse(from_str))]
        comment: Option<CommentId>,
    },

    /// Like a post, or take the like back
    Like {
        #[structopt(parse(from_str))]
        post: PostId,
    },

    /// Keep printing the feed as it changes, until ctrl-c
    Watch {
        /// Seconds between two fetches
        #[structopt(long, default_value = "5")]
        period: u64,
    },

    /// Create a user
    CreateUser {
        uid: String,
        display_name: String,
        email: String,
    },

    /// Show who the token belongs to
    Whoami,
}

fn token_from_env(var: &str) -> anyhow::Result<AuthToken> {
    let tok = std::env::var(var).with_context(|| format!("retrieving {var} environment variable"))?;
    let tok = Uuid::try_parse(&tok).with_context(|| format!("parsing {var} as an auth token"))?;
    Ok(AuthToken(tok))
}

fn format_reactions(reactions: &[Reaction]) -> String {
    reaction_counts(reactions)
        .into_iter()
        .map(|(kind, n)| format!(" {kind}x{n}"))
        .collect()
}

fn print_feed(state: &FeedState) {
    for p in state.posts() {
        println!(
            "[{}] {} by {}, {}",
            p.id,
            p.animal_name,
            p.author_name,
            p.created_at.format("%Y-%m-%d %H:%M")
        );
        println!("  {}", p.experience);
        if let Some(url) = &p.photo_url {
            println!("  photo: {url}");
        }
        println!("  {} likes{}", p.likes, format_reactions(&p.reactions));
        p.comments.walk(|n, depth| {
            let c = &n.comment;
            let indent = "    ".repeat(depth + 1);
            let edited = if c.is_edited { " (edited)" } else { "" };
            let closed = if can_reply_at(depth) { "" } else { " (no more replies)" };
            println!(
                "{indent}[{}] {}: {}{edited}{}{closed}",
                c.id,
                c.author_name,
                c.text,
                format_reactions(&c.reactions)
            );
        });
        println!();
    }
}

async fn login(host: String) -> anyhow::Result<Session> {
    Session::login(host, token_from_env("SLITHER_TOKEN")?)
        .await
        .context("logging in")
}

async fn open_feed(host: String) -> anyhow::Result<Feed<RemoteFeed>> {
    Ok(Feed::new(login(host).await?.remote()))
}

/// Opens a feed already holding the current posts
async fn synced_feed(host: String) -> anyhow::Result<Feed<RemoteFeed>> {
    let mut feed = open_feed(host).await?;
    feed.refresh().await.context("fetching feed")?;
    tracing::debug!(posts = feed.state().posts().len(), "feed fetched");
    Ok(feed)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let opt = <Opt as structopt::StructOpt>::from_args();

    match opt.cmd {
        Command::CreateUser {
            uid,
            display_name,
            email,
        } => {
            let user = NewUser {
                uid: UserId(uid),
                display_name,
                email,
            };
            user.validate()?;
            let admin = token_from_env("ADMIN_TOKEN")?;
            let tok = RemoteFeed::admin_create_user(&opt.host, admin, &user)
                .await
                .context("creating user")?;
            tracing::info!(uid = %user.uid, "user created");
            println!("{}", tok.0);
        }
        Command::Whoami => {
            let session = login(opt.host).await?;
            let u = &session.user;
            println!("{} ({}) <{}>", u.display_name, u.uid, u.email);
        }
        Command::Feed => {
            let feed = synced_feed(opt.host).await?;
            print_feed(feed.state());
        }
        Command::Post {
            animal_name,
            experience,
            photo_url,
        } => {
            let mut feed = open_feed(opt.host).await?;
            let id = feed
                .create_post(NewPost {
                    animal_name,
                    experience,
                    photo_url,
                })
                .await
                .context("creating post")?;
            println!("{id}");
        }
        Command::Comment { post, text, parent } => {
            // the depth check needs to know the thread
            let mut feed = synced_feed(opt.host).await?;
            let id = feed
                .comment(
                    &post,
                    NewComment {
                        text,
                        parent_id: parent,
                    },
                )
                .await
                .context("posting comment")?;
            println!("{id}");
        }
        Command::Edit {
            post,
            comment,
            text,
        } => {
            let mut feed = synced_feed(opt.host).await?;
            feed.edit_comment(&post, &comment, text)
                .await
                .context("editing comment")?;
        }
        Command::Delete { post, comment } => {
            let mut feed = synced_feed(opt.host).await?;
            feed.delete_comment(&post, &comment)
                .await
                .context("deleting comment")?;
        }
        Command::React {
            post,
            kind,
            comment: Some(comment),
        } => {
            let mut feed = synced_feed(opt.host).await?;
            feed.react_to_comment(&post, &comment, kind)
                .await
                .context("reacting to comment")?;
        }
        Command::React {
            post,
            kind,
            comment: None,
        } => {
            let mut feed = synced_feed(opt.host).await?;
            feed.react_to_post(&post, kind)
                .await
                .context("reacting to post")?;
        }
        Command::Like { post } => {
            let mut feed = synced_feed(opt.host).await?;
            feed.like_post(&post).await.context("liking post")?;
        }
        Command::Watch { period } => {
            let remote = login(opt.host).await?.remote();
            let mut state = FeedState::new();
            let guard = poll::spawn_poller(
                Duration::from_secs(period),
                move || {
                    let mut remote = remote.clone();
                    async move { remote.fetch_posts().await }
                },
                move |res| match res {
                    Ok(posts) => {
                        state.replace_posts(posts);
                        print_feed(&state);
                        println!("----");
                    }
                    Err(err) => tracing::warn!(%err, "failed refreshing feed"),
                },
            );
            tokio::signal::ctrl_c()
                .await
                .context("waiting for ctrl-c")?;
            tracing::debug!("stopping the poller");
            guard.stop();
        }
    }

    Ok(())
}
