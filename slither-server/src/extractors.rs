use std::sync::Arc;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{self, request},
};
use slither_api::{AuthToken, CurrentUser, Uuid};
use slither_mock_server::MockServer;
use tokio::sync::RwLock;

use crate::Error;

/// All the service's data, shared between the request handlers
pub type Store = Arc<RwLock<MockServer>>;

#[derive(Clone, axum::extract::FromRef)]
pub struct AppState {
    pub store: Store,
    pub admin_token: Option<AuthToken>,
}

impl AppState {
    pub fn new(admin_token: Option<AuthToken>) -> AppState {
        AppState {
            store: Arc::new(RwLock::new(MockServer::new())),
            admin_token,
        }
    }
}

pub struct PreAuth(pub AuthToken);

#[async_trait]
impl<S: Sync> FromRequestParts<S> for PreAuth {
    type Rejection = Error;

    async fn from_request_parts(req: &mut request::Parts, _state: &S) -> Result<PreAuth, Error> {
        match req.headers.get(http::header::AUTHORIZATION) {
            None => Err(Error::permission_denied()),
            Some(auth) => {
                let auth = auth.to_str().map_err(|_| Error::permission_denied())?;
                let mut auth = auth.split(' ');
                if !auth
                    .next()
                    .ok_or(Error::permission_denied())?
                    .eq_ignore_ascii_case("bearer")
                {
                    return Err(Error::permission_denied());
                }
                let token = auth.next().ok_or(Error::permission_denied())?;
                if auth.next().is_some() {
                    return Err(Error::permission_denied());
                }
                let token = Uuid::try_parse(token).map_err(|_| Error::permission_denied())?;
                Ok(PreAuth(AuthToken(token)))
            }
        }
    }
}

/// A token that belongs to a live session
pub struct Auth {
    pub token: AuthToken,
    pub user: CurrentUser,
}

#[async_trait]
impl FromRequestParts<AppState> for Auth {
    type Rejection = Error;

    async fn from_request_parts(req: &mut request::Parts, state: &AppState) -> Result<Auth, Error> {
        let token = PreAuth::from_request_parts(req, state).await?.0;
        let user = state.store.read().await.whoami(token)?;
        Ok(Auth { token, user })
    }
}

pub struct AdminAuth;

#[async_trait]
impl FromRequestParts<AppState> for AdminAuth {
    type Rejection = Error;

    async fn from_request_parts(
        req: &mut request::Parts,
        state: &AppState,
    ) -> Result<AdminAuth, Error> {
        let token = PreAuth::from_request_parts(req, state).await?.0;
        if Some(token) == state.admin_token {
            Ok(AdminAuth)
        } else {
            Err(Error::permission_denied())
        }
    }
}
