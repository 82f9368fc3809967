//! Session surface. Token refresh, persistence, and auth-state plumbing are
//! not here: the client holds whatever token it was configured with and
//! these calls just read or end the session behind it.

use cove_types::api::Session;

use crate::client::RemoteClient;
use crate::error::Result;

impl RemoteClient {
    /// Who the configured access token belongs to.
    pub async fn session(&self) -> Result<Session> {
        let response = self
            .authed(self.http.get(self.auth_url("user")))
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// Invalidate the access token server-side.
    pub async fn sign_out(&self) -> Result<()> {
        let response = self
            .authed(self.http.post(self.auth_url("logout")))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}
