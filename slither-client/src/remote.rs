use async_trait::async_trait;

use crate::api::{
    AuthToken, Backend, Comment, CommentId, CurrentUser, EditComment, Error, NewComment, NewPost,
    NewUser, Post, PostId, React,
};

/// `Backend` talking to the feed service over HTTP
#[derive(Clone, Debug)]
pub struct RemoteFeed {
    client: reqwest::Client,
    host: String,
    token: AuthToken,
}

fn unreachable(e: reqwest::Error) -> Error {
    Error::Unreachable(e.to_string())
}

/// Turns a non-success answer into an `Error`, keeping whatever text the server
/// sent when it is not one of ours (such as a framework rejection)
fn error_from_response(status: reqwest::StatusCode, body: &[u8]) -> Error {
    Error::parse(body).unwrap_or_else(|err| {
        tracing::error!(?err, %status, "server answered with an unparseable error");
        let text = String::from_utf8_lossy(body);
        match text.trim() {
            "" => Error::Unknown(format!("server answered {status}")),
            text => Error::Unknown(format!("server answered {status}: {text}")),
        }
    })
}

async fn call<R>(req: reqwest::RequestBuilder, token: AuthToken) -> Result<R, Error>
where
    R: for<'de> serde::Deserialize<'de>,
{
    let resp = req
        .bearer_auth(token.0)
        .send()
        .await
        .map_err(unreachable)?;
    let status = resp.status();
    let body = resp.bytes().await.map_err(unreachable)?;
    if !status.is_success() {
        return Err(error_from_response(status, &body));
    }
    // empty answers are how the server says ()
    let body: &[u8] = match body.is_empty() {
        true => b"null",
        false => &body,
    };
    serde_json::from_slice(body)
        .map_err(|err| Error::Unknown(format!("failed to parse server answer: {err}")))
}

impl RemoteFeed {
    pub fn new(host: String, token: AuthToken) -> RemoteFeed {
        RemoteFeed {
            client: reqwest::Client::new(),
            host: String::from(host.trim_end_matches('/')),
            token,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.host, path)
    }

    fn comment_url(&self, post: &PostId, comment: &CommentId) -> String {
        self.url(&format!("/posts/{post}/comments/{comment}"))
    }

    pub async fn unauth(&self) -> Result<(), Error> {
        call(self.client.post(self.url("/unauth")), self.token).await
    }

    pub async fn admin_create_user(
        host: &str,
        admin_token: AuthToken,
        user: &NewUser,
    ) -> Result<AuthToken, Error> {
        let url = format!("{}/admin/create-user", host.trim_end_matches('/'));
        call(reqwest::Client::new().post(url).json(user), admin_token).await
    }
}

#[async_trait]
impl Backend for RemoteFeed {
    async fn whoami(&mut self) -> Result<CurrentUser, Error> {
        call(self.client.get(self.url("/whoami")), self.token).await
    }

    async fn fetch_posts(&mut self) -> Result<Vec<Post>, Error> {
        call(self.client.get(self.url("/posts")), self.token).await
    }

    async fn create_post(&mut self, p: NewPost) -> Result<Post, Error> {
        call(self.client.post(self.url("/posts")).json(&p), self.token).await
    }

    async fn create_comment(&mut self, post: &PostId, c: NewComment) -> Result<Comment, Error> {
        let url = self.url(&format!("/posts/{post}/comments"));
        call(self.client.post(url).json(&c), self.token).await
    }

    async fn edit_comment(
        &mut self,
        post: &PostId,
        comment: &CommentId,
        e: EditComment,
    ) -> Result<Comment, Error> {
        let url = self.comment_url(post, comment);
        call(self.client.put(url).json(&e), self.token).await
    }

    async fn delete_comment(&mut self, post: &PostId, comment: &CommentId) -> Result<(), Error> {
        let url = self.comment_url(post, comment);
        call(self.client.delete(url), self.token).await
    }

    async fn react_to_comment(
        &mut self,
        post: &PostId,
        comment: &CommentId,
        r: React,
    ) -> Result<Comment, Error> {
        let url = format!("{}/react", self.comment_url(post, comment));
        call(self.client.post(url).json(&r), self.token).await
    }

    async fn react_to_post(&mut self, post: &PostId, r: React) -> Result<Post, Error> {
        let url = self.url(&format!("/posts/{post}/react"));
        call(self.client.post(url).json(&r), self.token).await
    }

    async fn like_post(&mut self, post: &PostId) -> Result<Post, Error> {
        let url = self.url(&format!("/posts/{post}/like"));
        call(self.client.post(url), self.token).await
    }
}
