use std::fmt;

use crate::Error;

#[derive(
    Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
#[serde(transparent)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity handed out by the authentication provider
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    pub uid: UserId,
    pub display_name: String,
    pub email: String,
    pub email_verified: bool,
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub uid: UserId,
    pub display_name: String,
    pub email: String,
}

impl NewUser {
    pub fn validate(&self) -> Result<(), Error> {
        crate::validate_string(&self.uid.0)?;
        crate::validate_string(&self.display_name)?;
        crate::validate_string(&self.email)?;
        Ok(())
    }
}
