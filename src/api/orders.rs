use crate::api::client::ApiClient;
use crate::api::models::{Order, OrderStatus, OrderUpdate, Page};
use crate::config::Session;
use crate::error::{ApiError, Result};

#[derive(Clone)]
pub struct OrdersApi {
    client: ApiClient,
    session: Session,
}

impl OrdersApi {
    pub fn new(client: ApiClient, session: Session) -> Self {
        Self { client, session }
    }

    pub async fn list(&self, page: u32, limit: u32, status: Option<OrderStatus>) -> Result<Page<Order>> {
        let mut query = vec![("page", page.to_string()), ("limit", limit.to_string())];
        if let Some(status) = status {
            query.push(("status", status_label(status).to_string()));
        }
        let req = self.client.get("/orders", &self.session).query(&query);
        self.client.send_page(req, &self.session).await
    }

    pub async fn get(&self, id: &str) -> Result<Order> {
        let req = self.client.get(&format!("/orders/{id}"), &self.session);
        self.client.send(req, &self.session).await
    }

    pub async fn update(&self, id: &str, update: &OrderUpdate) -> Result<String> {
        if update.status.is_none() && update.payment_status.is_none() {
            return Err(ApiError::validation("Nothing to update"));
        }
        let req = self.client.put(&format!("/orders/{id}"), &self.session).json(update);
        self.client.send_ack(req, &self.session).await
    }

    pub async fn delete(&self, id: &str) -> Result<String> {
        let req = self.client.delete(&format!("/orders/{id}"), &self.session);
        self.client.send_ack(req, &self.session).await
    }
}

pub fn status_label(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Pending => "Pending",
        OrderStatus::Processing => "Processing",
        OrderStatus::Delivered => "Delivered",
        OrderStatus::Cancelled => "Cancelled",
    }
}
