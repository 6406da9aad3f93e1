#![cfg(test)]

use bolero::generator::TypeGenerator;
use std::{cmp, collections::HashSet, fmt::Debug, ops::RangeTo, panic::AssertUnwindSafe};

use axum::{
    extract::FromRequestParts,
    http::{self, request},
    Router,
};
use slither_api::{
    AuthToken, Comment, CommentId, EditComment, Error as ApiError, NewComment, NewPost, NewUser,
    Post, PostId, React, ReactionType, UserId,
};
use tower::{Service, ServiceExt};

use crate::{extractors::*, *};

macro_rules! do_tokio_test {
    ( $name:ident, $gen:expr, $fn:expr ) => {
        #[test]
        fn $name() {
            let runtime = AssertUnwindSafe(
                tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("failed initializing tokio runtime"),
            );
            bolero::check!()
                .with_generator($gen)
                .cloned()
                .for_each(move |v| {
                    let () = runtime.block_on($fn(v));
                })
        }
    };
}

do_tokio_test!(
    fuzz_preauth_extractor,
    bolero::generator::gen::<String>(),
    |token| async move {
        if let Ok(req) = http::Request::builder()
            .method(http::Method::GET)
            .uri("/")
            .header(http::header::AUTHORIZATION, token)
            .body(())
        {
            let mut req = req.into_parts().0;
            let res = PreAuth::from_request_parts(&mut req, &()).await;
            match res {
                Ok(_) => (),
                Err(Error::Api(ApiError::PermissionDenied)) => (),
                Err(e) => panic!("got unexpected error: {e}"),
            }
        }
    }
);

pub async fn call<Req, Resp>(
    app: &mut Router,
    req: request::Request<axum::body::Body>,
    req_body: &Req,
) -> Result<Resp, ApiError>
where
    Req: Debug,
    Resp: 'static + for<'de> serde::Deserialize<'de>,
{
    app.ready().await.expect("waiting for app to be ready");
    let resp = app.call(req).await.expect("running request");
    let status = resp.status();
    let body = hyper::body::to_bytes(resp.into_body())
        .await
        .expect("recovering resp bytes");
    if status == http::StatusCode::OK {
        if std::any::TypeId::of::<Resp>() == std::any::TypeId::of::<()>() {
            // the server answers () with an empty body, which serde_json does not parse
            return Ok(serde_json::from_slice(b"null").unwrap());
        }
        return Ok(serde_json::from_slice(&body).unwrap_or_else(|err| {
            panic!(
                r#"
                    Failed parsing resp body!

                    The error is the following:
                    ---
                    {err}
                    ---

                    Response body is:
                    ---
                    {body:?}
                    ---

                    Request was:
                    ---
                    {req_body:?}
                    ---
                "#
            )
        }));
    }
    Err(ApiError::parse(&body)
        .unwrap_or_else(|err| panic!("parsing error response body {err}, body is {body:?}")))
}

pub async fn run_on_app<Req, Resp>(
    app: &mut Router,
    method: &str,
    uri: &str,
    token: Option<AuthToken>,
    body: &Req,
) -> Result<Resp, ApiError>
where
    Req: Debug + serde::Serialize,
    Resp: 'static + for<'de> serde::Deserialize<'de>,
{
    let req = request::Builder::new()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json");
    let req = match token {
        Some(token) => req.header(http::header::AUTHORIZATION, format!("bearer {}", token.0)),
        None => req,
    };
    let req = req
        .body(axum::body::Body::from(
            serde_json::to_vec(body).expect("serializing request body to json"),
        ))
        .expect("building request");
    call(app, req, body).await
}

fn resize_int(fuzz_id: usize, RangeTo { end }: RangeTo<usize>) -> Option<usize> {
    if end == 0 {
        return None;
    }
    let bucket_size = cmp::max(1, usize::MAX / end); // in case we rounded to 0
    let id = fuzz_id / bucket_size;
    Some(cmp::min(id, end - 1)) // in case id was actually over end - 1 due to rounding
}

#[derive(Clone, Debug, bolero::generator::TypeGenerator)]
enum FuzzOp {
    CreateUser {
        #[generator(bolero::generator::gen_with::<String>().len(1..20usize))]
        name: String,
    },
    Unauth {
        sid: usize,
    },
    CreatePost {
        sid: usize,
        experience: String,
    },
    Comment {
        sid: usize,
        post: usize,
        parent: Option<usize>,
        text: String,
    },
    Edit {
        sid: usize,
        comment: usize,
        text: String,
    },
    Delete {
        sid: usize,
        comment: usize,
    },
    React {
        sid: usize,
        comment: usize,
        kind: ReactionType,
    },
    ReactToPost {
        sid: usize,
        post: usize,
        kind: ReactionType,
    },
    Like {
        sid: usize,
        post: usize,
    },
}

/// Drives random traffic through the router, checking it never fails internally
struct Fuzzer {
    admin_token: AuthToken,
    app: Router,
    sessions: Vec<AuthToken>,
    posts: Vec<PostId>,
    comments: Vec<(PostId, CommentId)>,
}

fn no_internal_error<T: Debug>(name: &str, res: &Result<T, ApiError>) {
    if let Err(ApiError::Unknown(msg)) = res {
        panic!("{name} failed internally: {msg}");
    }
}

impl Fuzzer {
    fn new() -> Fuzzer {
        let admin_token = AuthToken::generate();
        Fuzzer {
            admin_token,
            app: app(AppState::new(Some(admin_token))),
            sessions: Vec::new(),
            posts: Vec::new(),
            comments: Vec::new(),
        }
    }

    fn session(&self, sid: usize) -> Option<AuthToken> {
        resize_int(sid, ..self.sessions.len()).map(|i| self.sessions[i])
    }

    fn post(&self, post: usize) -> Option<PostId> {
        resize_int(post, ..self.posts.len()).map(|i| self.posts[i].clone())
    }

    fn comment(&self, comment: usize) -> Option<(PostId, CommentId)> {
        resize_int(comment, ..self.comments.len()).map(|i| self.comments[i].clone())
    }

    async fn execute_fuzz_op(&mut self, op: FuzzOp) {
        match op {
            FuzzOp::CreateUser { name } => {
                let user = NewUser {
                    uid: UserId(name.clone()),
                    display_name: name.clone(),
                    email: format!("{name}@example.org"),
                };
                let res: Result<AuthToken, _> = run_on_app(
                    &mut self.app,
                    "POST",
                    "/admin/create-user",
                    Some(self.admin_token),
                    &user,
                )
                .await;
                no_internal_error("CreateUser", &res);
                if let Ok(tok) = res {
                    self.sessions.push(tok);
                }
            }
            FuzzOp::Unauth { sid } => {
                if let Some(tok) = self.session(sid) {
                    let res: Result<(), _> =
                        run_on_app(&mut self.app, "POST", "/unauth", Some(tok), &()).await;
                    no_internal_error("Unauth", &res);
                }
            }
            FuzzOp::CreatePost { sid, experience } => {
                if let Some(tok) = self.session(sid) {
                    let p = NewPost {
                        animal_name: String::from("Rat Snake"),
                        experience,
                        photo_url: None,
                    };
                    let res: Result<Post, _> =
                        run_on_app(&mut self.app, "POST", "/posts", Some(tok), &p).await;
                    no_internal_error("CreatePost", &res);
                    if let Ok(p) = res {
                        self.posts.push(p.id);
                    }
                }
            }
            FuzzOp::Comment {
                sid,
                post,
                parent,
                text,
            } => {
                if let (Some(tok), Some(post)) = (self.session(sid), self.post(post)) {
                    let c = NewComment {
                        text,
                        parent_id: parent.and_then(|p| self.comment(p)).map(|(_, c)| c),
                    };
                    let uri = format!("/posts/{post}/comments");
                    let res: Result<Comment, _> =
                        run_on_app(&mut self.app, "POST", &uri, Some(tok), &c).await;
                    no_internal_error("Comment", &res);
                    if let Ok(c) = res {
                        self.comments.push((post, c.id));
                    }
                }
            }
            FuzzOp::Edit { sid, comment, text } => {
                if let (Some(tok), Some((post, comment))) =
                    (self.session(sid), self.comment(comment))
                {
                    let uri = format!("/posts/{post}/comments/{comment}");
                    let e = EditComment { text };
                    let res: Result<Comment, _> =
                        run_on_app(&mut self.app, "PUT", &uri, Some(tok), &e).await;
                    no_internal_error("Edit", &res);
                }
            }
            FuzzOp::Delete { sid, comment } => {
                if let (Some(tok), Some((post, comment))) =
                    (self.session(sid), self.comment(comment))
                {
                    let uri = format!("/posts/{post}/comments/{comment}");
                    let res: Result<(), _> =
                        run_on_app(&mut self.app, "DELETE", &uri, Some(tok), &()).await;
                    no_internal_error("Delete", &res);
                }
            }
            FuzzOp::React { sid, comment, kind } => {
                if let (Some(tok), Some((post, comment))) =
                    (self.session(sid), self.comment(comment))
                {
                    let uri = format!("/posts/{post}/comments/{comment}/react");
                    let res: Result<Comment, _> =
                        run_on_app(&mut self.app, "POST", &uri, Some(tok), &React { kind }).await;
                    no_internal_error("React", &res);
                }
            }
            FuzzOp::ReactToPost { sid, post, kind } => {
                if let (Some(tok), Some(post)) = (self.session(sid), self.post(post)) {
                    let uri = format!("/posts/{post}/react");
                    let res: Result<Post, _> =
                        run_on_app(&mut self.app, "POST", &uri, Some(tok), &React { kind }).await;
                    no_internal_error("ReactToPost", &res);
                }
            }
            FuzzOp::Like { sid, post } => {
                if let (Some(tok), Some(post)) = (self.session(sid), self.post(post)) {
                    let uri = format!("/posts/{post}/like");
                    let res: Result<Post, _> =
                        run_on_app(&mut self.app, "POST", &uri, Some(tok), &()).await;
                    no_internal_error("Like", &res);
                }
            }
        }
    }

    /// Every reply left in the store still has its parent next to it
    async fn check_no_dangling_replies(&mut self) {
        let tok = AuthToken::generate();
        let user = NewUser {
            uid: UserId(format!("checker-{}", tok.0)),
            display_name: format!("checker-{}", tok.0),
            email: String::from("checker@example.org"),
        };
        let tok: AuthToken = run_on_app(
            &mut self.app,
            "POST",
            "/admin/create-user",
            Some(self.admin_token),
            &user,
        )
        .await
        .expect("creating checker user");
        let posts: Vec<Post> = run_on_app(&mut self.app, "GET", "/posts", Some(tok), &())
            .await
            .expect("fetching posts");
        for p in posts {
            let ids = p.comments.iter().map(|c| &c.id).collect::<HashSet<_>>();
            for c in p.comments.iter() {
                if let Some(parent) = &c.parent_id {
                    assert!(ids.contains(parent), "{} lost its parent {parent}", c.id);
                }
            }
        }
    }
}

do_tokio_test!(
    random_traffic_keeps_the_store_consistent,
    bolero::generator::gen_with::<Vec<FuzzOp>>().len(1..50usize),
    |ops: Vec<FuzzOp>| async move {
        let mut fuzzer = Fuzzer::new();
        for op in ops {
            fuzzer.execute_fuzz_op(op).await;
        }
        fuzzer.check_no_dangling_replies().await;
    }
);
