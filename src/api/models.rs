use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Uniform `{success, message, data}` wrapper every endpoint answers with.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

/// One page of a list endpoint. The backend nests the rows under a
/// resource-specific key (`items`, `orders`, `users`) next to the counters.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub pages: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawPage {
    #[serde(default)]
    total: u64,
    #[serde(default = "first_page")]
    page: u32,
    #[serde(default = "first_page")]
    pages: u32,
    #[serde(flatten)]
    rest: serde_json::Map<String, Value>,
}

fn first_page() -> u32 {
    1
}

impl RawPage {
    pub(crate) fn into_page<T: DeserializeOwned>(self) -> Result<Page<T>, serde_json::Error> {
        let rows = self
            .rest
            .into_iter()
            .find_map(|(_, v)| match v {
                Value::Array(rows) => Some(rows),
                _ => None,
            })
            .unwrap_or_default();
        let items = serde_json::from_value(Value::Array(rows))?;
        Ok(Page { items, total: self.total, page: self.page, pages: self.pages })
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Participant {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub participants: Vec<Participant>,
    #[serde(default)]
    pub last_message_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Sender and receiver come back either as a bare id or populated.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum UserRef {
    Id(String),
    Expanded(Participant),
}

impl UserRef {
    pub fn id(&self) -> &str {
        match self {
            UserRef::Id(id) => id,
            UserRef::Expanded(p) => &p.id,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Attachment {
    pub url: String,
    #[serde(default)]
    pub public_id: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(alias = "conversationId")]
    pub conversation: String,
    pub sender: UserRef,
    pub receiver: UserRef,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub attachment: Option<Attachment>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub read_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceipt {
    pub conversation_id: String,
    pub user_id: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AuthTokens {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    pub user: Participant,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub bg_color: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Ingredient {
    pub name: String,
    /// Existing image URL; kept as-is when the item is edited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Category comes back as an id on list endpoints and populated elsewhere.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum CategoryRef {
    Id(String),
    Expanded(Category),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub category: Option<CategoryRef>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub ingredients: Vec<Ingredient>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Pending,
    Processing,
    Delivered,
    Cancelled,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    Paid,
    Pending,
    Failed,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct OrderLine {
    pub item: Product,
    pub quantity: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub user: Participant,
    #[serde(default)]
    pub items: Vec<OrderLine>,
    pub total_amount: f64,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub phone: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub estimated_delivery: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<PaymentStatus>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    #[serde(default)]
    pub total_amount: f64,
}

/// A registered shop user as listed by `/users`.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub orders: Vec<OrderSummary>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl UserRecord {
    pub fn total_spent(&self) -> f64 {
        self.orders.iter().map(|o| o.total_amount).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_accepts_bare_and_populated_senders() {
        let raw = json!({
            "_id": "m1",
            "conversation": "c1",
            "sender": {"_id": "u1", "name": "Ops", "email": "ops@x", "role": "admin"},
            "receiver": "u2",
            "text": "hi",
            "createdAt": "2024-05-01T10:00:00Z"
        });
        let msg: Message = serde_json::from_value(raw).unwrap();
        assert_eq!(msg.sender.id(), "u1");
        assert_eq!(msg.receiver.id(), "u2");
        assert!(msg.attachment.is_none());
        assert!(msg.read_at.is_none());
    }

    #[test]
    fn page_picks_the_named_row_array() {
        let raw = json!({"total": 3, "page": 2, "pages": 3, "users": [
            {"_id": "a", "name": "A", "orders": [{"totalAmount": 4.5}, {"totalAmount": 0.5}]}
        ]});
        let page: Page<UserRecord> = serde_json::from_value::<RawPage>(raw)
            .unwrap()
            .into_page()
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.page, 2);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].total_spent(), 5.0);
    }

    #[test]
    fn order_update_only_sends_set_fields() {
        let update = OrderUpdate { status: Some(OrderStatus::Delivered), payment_status: None };
        assert_eq!(serde_json::to_value(&update).unwrap(), json!({"status": "Delivered"}));
    }
}
