use crate::api::client::ApiClient;
use crate::api::models::{Page, UserRecord};
use crate::config::Session;
use crate::error::Result;

/// Registered shop users (`/users`).
#[derive(Clone)]
pub struct UsersApi {
    client: ApiClient,
    session: Session,
}

impl UsersApi {
    pub fn new(client: ApiClient, session: Session) -> Self {
        Self { client, session }
    }

    pub async fn list(&self, page: u32, limit: u32) -> Result<Page<UserRecord>> {
        let req = self
            .client
            .get("/users", &self.session)
            .query(&[("page", page), ("limit", limit)]);
        self.client.send_page(req, &self.session).await
    }

    pub async fn get(&self, id: &str) -> Result<UserRecord> {
        let req = self.client.get(&format!("/users/{id}"), &self.session);
        self.client.send(req, &self.session).await
    }
}
