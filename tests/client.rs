//! REST client against a canned in-process HTTP server.

use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use storefront_admin::api::auth::AuthApi;
use storefront_admin::api::catalog::{CatalogApi, CategoryForm, ProductForm};
use storefront_admin::api::chat::{ChatApi, FileUpload, HttpChatApi, OutgoingMessage};
use storefront_admin::api::client::{ApiClient, ClearSession};
use storefront_admin::api::models::{Ingredient, OrderStatus, OrderUpdate, Participant, PaymentStatus};
use storefront_admin::api::orders::OrdersApi;
use storefront_admin::api::users::UsersApi;
use storefront_admin::config::Session;
use storefront_admin::ApiError;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

#[derive(Debug, Clone)]
struct Seen {
    method: String,
    path: String,
    query: String,
    authorization: Option<String>,
    content_type: Option<String>,
    body: String,
}

impl Seen {
    /// Names of the multipart parts, in the order they were sent.
    fn part_names(&self) -> Vec<String> {
        self.body
            .split("; name=\"")
            .skip(1)
            .filter_map(|rest| rest.split('"').next())
            .map(str::to_string)
            .collect()
    }

    fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

struct Backend {
    origin: String,
    seen: Arc<Mutex<Vec<Seen>>>,
}

impl Backend {
    /// Answers `"METHOD /path"` (query stripped) with the given status and body.
    async fn start(routes: Vec<(&str, u16, serde_json::Value)>) -> Self {
        let routes: HashMap<String, (u16, String)> = routes
            .into_iter()
            .map(|(route, status, body)| (route.to_string(), (status, body.to_string())))
            .collect();
        let routes = Arc::new(routes);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let origin = format!("http://{}", listener.local_addr().unwrap());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let log = seen.clone();
        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else { break };
                let routes = routes.clone();
                let log = log.clone();
                tokio::spawn(async move {
                    let Some(request) = read_request(&mut stream).await else { return };
                    let key = format!("{} {}", request.method, request.path);
                    log.lock().unwrap().push(request);
                    let (status, body) = routes
                        .get(&key)
                        .cloned()
                        .unwrap_or((404, json!({"success": false, "message": "no route"}).to_string()));
                    let response = format!(
                        "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = stream.write_all(response.as_bytes()).await;
                    let _ = stream.shutdown().await;
                });
            }
        });
        Self { origin, seen }
    }

    fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    fn last(&self) -> Seen {
        self.seen().pop().unwrap()
    }
}

async fn read_request(stream: &mut tokio::net::TcpStream) -> Option<Seen> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let head_end = loop {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };
    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let mut lines = head.lines();
    let mut first = lines.next()?.split_whitespace();
    let method = first.next()?.to_string();
    let target = first.next()?;
    let (path, query) = target.split_once('?').unwrap_or((target, ""));
    let (path, query) = (path.to_string(), query.to_string());

    let mut length = 0usize;
    let mut authorization = None;
    let mut content_type = None;
    for line in lines {
        let Some((name, value)) = line.split_once(':') else { continue };
        match name.trim().to_ascii_lowercase().as_str() {
            "content-length" => length = value.trim().parse().unwrap_or(0),
            "authorization" => authorization = Some(value.trim().to_string()),
            "content-type" => content_type = Some(value.trim().to_string()),
            _ => {}
        }
    }
    while buf.len() < head_end + length {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let end = buf.len().min(head_end + length);
    let body = String::from_utf8_lossy(&buf[head_end..end]).to_string();
    Some(Seen { method, path, query, authorization, content_type, body })
}

fn admin() -> Participant {
    Participant {
        id: "admin".into(),
        name: "Admin".into(),
        email: "admin@shop.test".into(),
        role: "admin".into(),
    }
}

fn message_json(id: &str) -> serde_json::Value {
    json!({
        "_id": id,
        "conversation": "c1",
        "sender": "admin",
        "receiver": {"_id": "u2", "name": "Alice"},
        "text": "hi",
        "createdAt": "2024-05-01T10:00:00.000Z"
    })
}

#[tokio::test]
async fn envelope_data_is_unwrapped_and_bearer_sent() {
    let backend = Backend::start(vec![(
        "GET /chat/conversations",
        200,
        json!({"success": true, "message": "ok", "data": [
            {"_id": "c1", "participants": [{"_id": "admin"}, {"_id": "u2", "name": "Alice"}]}
        ]}),
    )])
    .await;
    let session = Session::new(Some("tok".into()), Some(admin()));
    let api = HttpChatApi::new(ApiClient::new(&backend.origin).unwrap(), session);

    let conversations = api.list_conversations().await.unwrap();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0].participants[1].name, "Alice");

    let seen = backend.seen();
    assert_eq!(seen[0].method, "GET");
    assert_eq!(seen[0].authorization.as_deref(), Some("Bearer tok"));
}

#[tokio::test]
async fn success_false_is_a_rejection_with_the_backend_message() {
    let backend = Backend::start(vec![
        ("GET /chat/conversations", 200, json!({"success": false, "message": "Not allowed"})),
        ("GET /chat/messages/c1", 200, json!({"success": false})),
    ])
    .await;
    let api = HttpChatApi::new(ApiClient::new(&backend.origin).unwrap(), Session::default());

    match api.list_conversations().await {
        Err(ApiError::Rejected(msg)) => assert_eq!(msg, "Not allowed"),
        other => panic!("unexpected {other:?}"),
    }
    match api.get_messages("c1", 1, 50).await {
        Err(ApiError::Rejected(msg)) => assert_eq!(msg, "Request failed"),
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn unauthorized_from_any_endpoint_clears_the_session_once() {
    let backend = Backend::start(vec![
        ("GET /chat/conversations", 401, json!({"success": false, "message": "jwt expired"})),
        ("GET /orders", 401, json!({"success": false, "message": "jwt expired"})),
    ])
    .await;
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();
    let client = ApiClient::new(&backend.origin)
        .unwrap()
        .with_policy(ClearSession::with_listener(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

    let session = Session::new(Some("tok".into()), Some(admin()));
    let chat = HttpChatApi::new(client.clone(), session.clone());
    let err = chat.list_conversations().await.unwrap_err();
    assert!(err.is_unauthorized());
    assert!(!session.is_authenticated());
    assert_eq!(session.user(), None);
    assert_eq!(fired.load(Ordering::SeqCst), 1);

    // non-chat calls go through the same policy
    let orders = OrdersApi::new(client, Session::new(Some("tok2".into()), Some(admin())));
    assert!(orders.list(1, 10, None).await.unwrap_err().is_unauthorized());
    assert_eq!(fired.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn other_error_statuses_carry_the_envelope_message() {
    let backend = Backend::start(vec![(
        "POST /chat/conversations",
        404,
        json!({"success": false, "message": "User not found"}),
    )])
    .await;
    let session = Session::new(Some("tok".into()), Some(admin()));
    let api = HttpChatApi::new(ApiClient::new(&backend.origin).unwrap(), session.clone());

    match api.get_or_create_conversation("nobody").await {
        Err(ApiError::Status { status, body }) => {
            assert_eq!(status.as_u16(), 404);
            assert_eq!(body, "User not found");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(session.is_authenticated());
}

#[tokio::test]
async fn send_returns_the_first_stored_message() {
    let backend = Backend::start(vec![
        (
            "POST /chat/messages/c1",
            201,
            json!({"success": true, "message": "sent", "data": [message_json("m1"), message_json("m0")]}),
        ),
        ("POST /chat/messages/c2", 201, json!({"success": true, "data": []})),
        (
            "POST /chat/messages/c1/read",
            200,
            json!({"success": true, "data": {"conversationId": "c1", "userId": "admin"}}),
        ),
    ])
    .await;
    let session = Session::new(Some("tok".into()), Some(admin()));
    let api = HttpChatApi::new(ApiClient::new(&backend.origin).unwrap(), session);

    let sent = api.send_message("c1", OutgoingMessage::text("u2", "hi")).await.unwrap();
    assert_eq!(sent.id, "m1");
    assert_eq!(sent.sender.id(), "admin");
    assert_eq!(sent.receiver.id(), "u2");

    let err = api.send_message("c2", OutgoingMessage::text("u2", "hi")).await.unwrap_err();
    assert!(matches!(err, ApiError::Empty(_)));

    let receipt = api.mark_read("c1").await.unwrap();
    assert_eq!(receipt.conversation_id, "c1");
}

fn ack() -> serde_json::Value {
    json!({"success": true, "message": "done"})
}

fn signed_in() -> Session {
    Session::new(Some("tok".into()), Some(admin()))
}

#[tokio::test]
async fn a_rejected_login_is_not_a_session_expiry() {
    let backend = Backend::start(vec![(
        "POST /auth/login",
        401,
        json!({"success": false, "message": "Invalid credentials"}),
    )])
    .await;
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();
    let client = ApiClient::new(&backend.origin)
        .unwrap()
        .with_policy(ClearSession::with_listener(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
    let session = Session::default();

    let err = AuthApi::new(client, session.clone()).login("a@shop.test", "wrong").await.unwrap_err();
    match err {
        ApiError::Status { status, body } => {
            assert_eq!(status.as_u16(), 401);
            assert_eq!(body, "Invalid credentials");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(fired.load(Ordering::SeqCst), 0);
    assert!(backend.last().authorization.is_none());
}

#[tokio::test]
async fn sends_use_json_or_multipart_on_the_wire() {
    let stored = json!({"success": true, "data": [message_json("m1")]});
    let backend = Backend::start(vec![("POST /chat/messages/c1", 201, stored)]).await;
    let api = HttpChatApi::new(ApiClient::new(&backend.origin).unwrap(), signed_in());

    api.send_message("c1", OutgoingMessage::text("u2", "hi")).await.unwrap();
    let plain = backend.last();
    assert_eq!(plain.content_type.as_deref(), Some("application/json"));
    assert_eq!(plain.json(), json!({"receiverId": "u2", "text": "hi"}));

    let with_file = OutgoingMessage {
        text: "menu".into(),
        receiver_id: "u2".into(),
        file: Some(FileUpload::new("menu.png", b"png-bytes".to_vec())),
    };
    api.send_message("c1", with_file).await.unwrap();
    let multipart = backend.last();
    assert!(multipart.content_type.as_ref().unwrap().starts_with("multipart/form-data"));
    assert_eq!(multipart.part_names(), ["receiverId", "text", "attachment"]);
    assert!(multipart.body.contains("filename=\"menu.png\""));
}

#[tokio::test]
async fn category_writes_send_name_colour_and_image() {
    let backend = Backend::start(vec![
        ("POST /categories", 201, ack()),
        ("PUT /categories/k1", 200, ack()),
        ("DELETE /categories/k1", 200, ack()),
    ])
    .await;
    let api = CatalogApi::new(ApiClient::new(&backend.origin).unwrap(), signed_in());

    let form = CategoryForm {
        name: "Drinks".into(),
        bg_color: "#FFB020".into(),
        image: Some(FileUpload::new("drinks.jpg", vec![1, 2, 3])),
    };
    assert_eq!(api.create_category(form.clone()).await.unwrap(), "done");
    let created = backend.last();
    assert_eq!(created.part_names(), ["name", "bgColor", "image"]);
    assert!(created.body.contains("#FFB020"));

    api.update_category("k1", CategoryForm { image: None, ..form }).await.unwrap();
    let updated = backend.last();
    assert_eq!((updated.method.as_str(), updated.path.as_str()), ("PUT", "/categories/k1"));
    assert_eq!(updated.part_names(), ["name", "bgColor"]);

    api.delete_category("k1").await.unwrap();
    assert_eq!(backend.last().method, "DELETE");
    assert_eq!(backend.seen().len(), 3);
}

#[tokio::test]
async fn item_writes_carry_ingredients_as_json() {
    let backend = Backend::start(vec![
        (
            "GET /items",
            200,
            json!({"success": true, "data": {"total": 11, "page": 2, "pages": 2, "items": [
                {"_id": "p9", "name": "Fries", "price": 3.5, "category": "k1"}
            ]}}),
        ),
        ("POST /items", 201, ack()),
        ("PUT /items/p1", 200, ack()),
        ("DELETE /items/p1", 200, ack()),
    ])
    .await;
    let api = CatalogApi::new(ApiClient::new(&backend.origin).unwrap(), signed_in());

    let page = api.products(2, 10).await.unwrap();
    assert_eq!(backend.last().query, "page=2&limit=10");
    assert_eq!((page.total, page.page, page.items[0].id.as_str()), (11, 2, "p9"));

    let form = ProductForm {
        name: "Burger".into(),
        category_id: "k1".into(),
        description: "Beef".into(),
        price: 9.5,
        ingredients: vec![Ingredient { name: "Cheese".into(), image: None }],
        image: None,
    };
    api.create_product(form.clone()).await.unwrap();
    let created = backend.last();
    assert_eq!(
        created.part_names(),
        ["name", "category", "description", "price", "ingredients"]
    );
    assert!(created.body.contains(r#"[{"name":"Cheese"}]"#));

    api.update_product("p1", form).await.unwrap();
    assert_eq!(backend.last().path, "/items/p1");
    api.delete_product("p1").await.unwrap();
    assert_eq!(backend.last().method, "DELETE");
}

#[tokio::test]
async fn order_calls_filter_update_and_delete() {
    let order = json!({
        "_id": "o1",
        "user": {"_id": "u2", "name": "Alice"},
        "totalAmount": 24.0,
        "status": "Pending",
        "paymentStatus": "Pending"
    });
    let backend = Backend::start(vec![
        (
            "GET /orders",
            200,
            json!({"success": true, "data": {"total": 1, "page": 1, "pages": 1, "orders": [order.clone()]}}),
        ),
        ("GET /orders/o1", 200, json!({"success": true, "data": order})),
        ("PUT /orders/o1", 200, ack()),
        ("DELETE /orders/o1", 200, ack()),
    ])
    .await;
    let api = OrdersApi::new(ApiClient::new(&backend.origin).unwrap(), signed_in());

    let page = api.list(1, 10, Some(OrderStatus::Delivered)).await.unwrap();
    assert_eq!(backend.last().query, "page=1&limit=10&status=Delivered");
    assert_eq!(page.items[0].user.name, "Alice");

    let fetched = api.get("o1").await.unwrap();
    assert_eq!(fetched.payment_status, PaymentStatus::Pending);

    let update = OrderUpdate { payment_status: Some(PaymentStatus::Paid), ..OrderUpdate::default() };
    api.update("o1", &update).await.unwrap();
    let put = backend.last();
    assert_eq!(put.method, "PUT");
    assert_eq!(put.json(), json!({"paymentStatus": "Paid"}));

    assert!(matches!(api.update("o1", &OrderUpdate::default()).await, Err(ApiError::Validation(_))));
    api.delete("o1").await.unwrap();
    assert_eq!(backend.last().method, "DELETE");
    assert_eq!(backend.seen().len(), 4);
}

#[tokio::test]
async fn a_single_user_is_fetched_by_id() {
    let backend = Backend::start(vec![(
        "GET /users/u2",
        200,
        json!({"success": true, "data": {
            "_id": "u2", "name": "Alice", "email": "alice@shop.test",
            "orders": [{"totalAmount": 10.0}, {"totalAmount": 4.5}]
        }}),
    )])
    .await;
    let api = UsersApi::new(ApiClient::new(&backend.origin).unwrap(), signed_in());

    let user = api.get("u2").await.unwrap();
    assert_eq!(user.email, "alice@shop.test");
    assert_eq!(user.total_spent(), 14.5);
    assert_eq!(backend.last().authorization.as_deref(), Some("Bearer tok"));
}
