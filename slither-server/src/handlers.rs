use axum::{
    extract::{Path, State},
    Json,
};
use slither_api::{
    AuthToken, Comment, CommentId, CurrentUser, EditComment, NewComment, NewPost, NewUser, Post,
    PostId, React,
};

use crate::{extractors::*, Error};

pub async fn admin_create_user(
    AdminAuth: AdminAuth,
    State(store): State<Store>,
    Json(data): Json<NewUser>,
) -> Result<Json<AuthToken>, Error> {
    let uid = data.uid.clone();
    let tok = store.write().await.admin_create_user(data)?;
    tracing::info!(user = %uid, "created user");
    Ok(Json(tok))
}

pub async fn unauth(PreAuth(token): PreAuth, State(store): State<Store>) -> Result<(), Error> {
    Ok(store.write().await.unauth(token)?)
}

pub async fn whoami(auth: Auth) -> Json<CurrentUser> {
    Json(auth.user)
}

pub async fn fetch_posts(auth: Auth, State(store): State<Store>) -> Result<Json<Vec<Post>>, Error> {
    Ok(Json(store.read().await.fetch_posts(auth.token)?))
}

pub async fn create_post(
    auth: Auth,
    State(store): State<Store>,
    Json(data): Json<NewPost>,
) -> Result<Json<Post>, Error> {
    let post = store.write().await.create_post(auth.token, data)?;
    tracing::debug!(post = %post.id, user = %auth.user.uid, "created post");
    Ok(Json(post))
}

pub async fn create_comment(
    auth: Auth,
    State(store): State<Store>,
    Path(post): Path<PostId>,
    Json(data): Json<NewComment>,
) -> Result<Json<Comment>, Error> {
    let c = store.write().await.create_comment(auth.token, &post, data)?;
    tracing::debug!(%post, comment = %c.id, user = %auth.user.uid, "created comment");
    Ok(Json(c))
}

pub async fn edit_comment(
    auth: Auth,
    State(store): State<Store>,
    Path((post, comment)): Path<(PostId, CommentId)>,
    Json(data): Json<EditComment>,
) -> Result<Json<Comment>, Error> {
    Ok(Json(
        store
            .write()
            .await
            .edit_comment(auth.token, &post, &comment, data)?,
    ))
}

pub async fn delete_comment(
    auth: Auth,
    State(store): State<Store>,
    Path((post, comment)): Path<(PostId, CommentId)>,
) -> Result<(), Error> {
    store
        .write()
        .await
        .delete_comment(auth.token, &post, &comment)?;
    tracing::debug!(%post, %comment, user = %auth.user.uid, "deleted comment");
    Ok(())
}

pub async fn react_to_comment(
    auth: Auth,
    State(store): State<Store>,
    Path((post, comment)): Path<(PostId, CommentId)>,
    Json(data): Json<React>,
) -> Result<Json<Comment>, Error> {
    Ok(Json(
        store
            .write()
            .await
            .react_to_comment(auth.token, &post, &comment, data)?,
    ))
}

pub async fn react_to_post(
    auth: Auth,
    State(store): State<Store>,
    Path(post): Path<PostId>,
    Json(data): Json<React>,
) -> Result<Json<Post>, Error> {
    Ok(Json(store.write().await.react_to_post(auth.token, &post, data)?))
}

pub async fn like_post(
    auth: Auth,
    State(store): State<Store>,
    Path(post): Path<PostId>,
) -> Result<Json<Post>, Error> {
    Ok(Json(store.write().await.like_post(auth.token, &post)?))
}
