use crate::{
    api::{AuthToken, Backend, CurrentUser, Error},
    RemoteFeed,
};

/// A logged-in user on a given host
///
/// Built by `login` and consumed by `logout`: there is no other place holding
/// the token.
#[derive(Clone, Debug)]
pub struct Session {
    pub host: String,
    pub token: AuthToken,
    pub user: CurrentUser,
}

impl Session {
    /// Checks `token` with the service and recovers who it belongs to
    pub async fn login(host: String, token: AuthToken) -> Result<Session, Error> {
        let mut remote = RemoteFeed::new(host, token);
        let user = remote.whoami().await?;
        tracing::info!(user = %user.uid, host = remote.host(), "logged in");
        Ok(Session {
            host: String::from(remote.host()),
            token,
            user,
        })
    }

    pub fn remote(&self) -> RemoteFeed {
        RemoteFeed::new(self.host.clone(), self.token)
    }

    pub async fn logout(self) -> Result<(), Error> {
        self.remote().unauth().await?;
        tracing::info!(user = %self.user.uid, "logged out");
        Ok(())
    }
}
