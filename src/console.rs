//! Line-oriented front end: the sidebar is `/list`, the thread prints as
//! messages arrive, anything not starting with `/` is sent.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use storefront_admin::api::auth::{AuthApi, ResetFlow, ResetStep};
use storefront_admin::api::catalog::CatalogApi;
use storefront_admin::api::chat::{FileUpload, HttpChatApi};
use storefront_admin::api::client::{ApiClient, ClearSession};
use storefront_admin::api::events::{ChannelHandle, RealtimeChannel};
use storefront_admin::api::models::{OrderStatus, OrderUpdate, PaymentStatus};
use storefront_admin::api::orders::{status_label, OrdersApi};
use storefront_admin::api::users::UsersApi;
use storefront_admin::chat::projection::filter_customers;
use storefront_admin::chat::{ChatController, Customer, NoticeLevel, SelectionState};
use storefront_admin::config::{Session, Settings};
use storefront_admin::storage::Cache;
use storefront_admin::{ApiError, Result};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

type Controller = ChatController<HttpChatApi, ChannelHandle>;

const HELP: &str = "\
commands:
  /list [search]        conversations
  /open <n>             open conversation n from /list
  /new <email|user id>  start a conversation with a shop user
  /attach <path> [text] send a file
  /reload               reload conversations
  /users [page]         shop users
  /orders [status]      orders, optionally filtered (Pending, Processing, Delivered, Cancelled)
  /order <id> <status>  set order status or payment status (Paid, Failed)
  /categories           menu categories
  /items [page]         menu items
  /passwd               change password
  /logout, /quit
anything else is sent to the open conversation";

struct Console {
    client: ApiClient,
    session: Session,
    controller: Arc<Controller>,
    cache: Option<Cache>,
    listed: Vec<Customer>,
    printed: usize,
}

pub async fn run() -> Result<()> {
    let settings = Settings::load();
    let origin = settings.origin();
    let session = settings.session();
    let expired = Arc::new(AtomicBool::new(false));
    let client = ApiClient::new(&origin)?.with_policy(ClearSession::with_listener({
        let expired = expired.clone();
        move || {
            expired.store(true, Ordering::SeqCst);
            forget_credentials();
        }
    }));

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    println!("storefront admin @ {origin}");
    if !session.is_authenticated() && !login(&client, &session, &mut input).await? {
        return Ok(());
    }
    expired.store(false, Ordering::SeqCst);

    let chat = Arc::new(HttpChatApi::new(client.clone(), session.clone()));
    let RealtimeChannel { handle, mut events, task } = RealtimeChannel::connect(&origin, &session)?;
    let controller = Arc::new(ChatController::new(chat, handle.clone(), session.user()));

    let owner = session.user_id().unwrap_or_default();
    let cache = match Cache::open_default(&owner) {
        Ok(cache) => Some(cache),
        Err(e) => {
            log::warn!("conversation cache unavailable: {e}");
            None
        }
    };
    if let Some(cached) = cache.as_ref().and_then(|c| c.conversations().ok()) {
        controller.seed_conversations(cached);
    }

    let mut console = Console { client, session, controller, cache, listed: Vec::new(), printed: 0 };
    console.reload().await;
    console.list("");
    println!("type /help for commands");

    loop {
        if expired.load(Ordering::SeqCst) {
            println!("! session expired, run again to log in");
            console.drop_cache();
            break;
        }
        tokio::select! {
            line = input.next_line() => {
                let Some(line) = line? else { break };
                match console.command(line.trim(), &mut input).await {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => println!("! {e}"),
                }
                console.flush();
            }
            event = events.recv() => {
                let Some(event) = event else { break };
                if console.controller.handle_event(event) {
                    console.print_new_rows();
                }
            }
        }
    }

    console.controller.close();
    handle.shutdown();
    let _ = task.await;
    Ok(())
}

fn forget_credentials() {
    if let Err(e) = Settings::forget_login() {
        log::warn!("could not clear stored token: {e}");
    }
}

async fn prompt(input: &mut Lines<BufReader<Stdin>>, label: &str) -> Result<Option<String>> {
    println!("{label}");
    Ok(input.next_line().await?.map(|l| l.trim().to_string()))
}

/// Returns false when stdin closed before a login succeeded.
async fn login(client: &ApiClient, session: &Session, input: &mut Lines<BufReader<Stdin>>) -> Result<bool> {
    let auth = AuthApi::new(client.clone(), session.clone());
    loop {
        let Some(email) = prompt(input, "email (or 'forgot'):").await? else {
            return Ok(false);
        };
        if email == "forgot" {
            reset_password(&auth, input).await?;
            continue;
        }
        let Some(password) = prompt(input, "password:").await? else {
            return Ok(false);
        };
        match auth.login(&email, &password).await {
            Ok(tokens) => {
                if let Err(e) = Settings::remember_login(&tokens.access_token, &tokens.user) {
                    println!("! failed to save settings: {e}");
                }
                return Ok(true);
            }
            Err(e) => println!("! login failed: {e}"),
        }
    }
}

async fn reset_password(auth: &AuthApi, input: &mut Lines<BufReader<Stdin>>) -> Result<()> {
    let mut flow = ResetFlow::new();
    loop {
        let step = flow.step().clone();
        let result = match step {
            ResetStep::Email => {
                let Some(email) = prompt(input, "registered email:").await? else { return Ok(()) };
                flow.request_code(auth, &email).await.map(|_| "OTP sent to your email")
            }
            ResetStep::Otp { .. } => {
                let Some(otp) = prompt(input, "code from the email:").await? else { return Ok(()) };
                flow.verify(auth, &otp).await.map(|_| "OTP verified")
            }
            ResetStep::Reset { .. } => {
                let Some(new) = prompt(input, "new password:").await? else { return Ok(()) };
                let Some(confirm) = prompt(input, "confirm password:").await? else { return Ok(()) };
                flow.reset(auth, &new, &confirm).await.map(|_| "Password reset successful")
            }
            ResetStep::Done => return Ok(()),
        };
        match result {
            Ok(msg) => println!("{msg}"),
            Err(e) => println!("! {e}"),
        }
    }
}

impl Console {
    async fn reload(&mut self) {
        if self.controller.load_conversations().await.is_ok() {
            if let Some(cache) = self.cache.as_mut() {
                if let Err(e) = cache.replace_conversations(&self.controller.conversations()) {
                    log::warn!("failed to cache conversations: {e}");
                }
            }
        }
        self.flush();
    }

    fn drop_cache(&mut self) {
        if let Some(cache) = self.cache.as_mut() {
            if let Err(e) = cache.clear() {
                log::warn!("failed to clear conversation cache: {e}");
            }
        }
    }

    fn list(&mut self, query: &str) {
        let customers = self.controller.customers();
        let selected = self.controller.selection().customer_id().map(str::to_string);
        self.listed = filter_customers(&customers, query).into_iter().cloned().collect();
        if self.listed.is_empty() {
            println!("No conversations found");
        }
        for (i, c) in self.listed.iter().enumerate() {
            let mark = if selected.as_deref() == Some(c.id.as_str()) { '*' } else { ' ' };
            println!("{mark}{:>3}  {}  <{}>", i + 1, c.name, c.subtitle());
        }
    }

    async fn open(&mut self, customer_id: &str) -> Result<()> {
        self.printed = 0;
        self.controller.select_customer(customer_id).await?;
        if let Some(c) = self.controller.selected_customer() {
            println!("── {} <{}>", c.name, c.email);
        }
        if self.controller.messages().is_empty() {
            println!("(no messages yet)");
        }
        self.print_new_rows();
        Ok(())
    }

    /// Returns false to quit.
    async fn command(&mut self, line: &str, input: &mut Lines<BufReader<Stdin>>) -> Result<bool> {
        if line.is_empty() {
            return Ok(true);
        }
        if !line.starts_with('/') {
            self.controller.send(line, None).await?;
            self.print_new_rows();
            return Ok(true);
        }

        let (cmd, arg) = line.split_once(' ').map(|(c, a)| (c, a.trim())).unwrap_or((line, ""));
        match cmd {
            "/help" => println!("{HELP}"),
            "/quit" => return Ok(false),
            "/logout" => {
                self.session.clear();
                forget_credentials();
                self.drop_cache();
                return Ok(false);
            }
            "/list" => self.list(arg),
            "/reload" => {
                self.reload().await;
                self.list("");
            }
            "/open" => {
                let customer = arg
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|i| self.listed.get(i))
                    .cloned()
                    .ok_or_else(|| ApiError::validation("Pick a number from /list"))?;
                self.open(&customer.id).await?;
            }
            "/new" => {
                let users = UsersApi::new(self.client.clone(), self.session.clone());
                let page = users.list(1, 100).await?;
                let user = page
                    .items
                    .into_iter()
                    .find(|u| u.id == arg || u.email.eq_ignore_ascii_case(arg))
                    .ok_or_else(|| ApiError::validation(format!("No user matches {arg}")))?;
                let customer = Customer {
                    id: user.id.clone(),
                    name: user.name,
                    email: user.email,
                    ..Customer::default()
                };
                self.controller.add_prospect(customer);
                self.open(&user.id).await?;
            }
            "/attach" => {
                let (path, text) = arg.split_once(' ').unwrap_or((arg, ""));
                if path.is_empty() {
                    return Err(ApiError::validation("Usage: /attach <path> [text]"));
                }
                let file = FileUpload::from_path(Path::new(path)).await?;
                self.controller.send(text, Some(file)).await?;
                self.print_new_rows();
            }
            "/users" => {
                let page_no = arg.parse().unwrap_or(1);
                let page = UsersApi::new(self.client.clone(), self.session.clone()).list(page_no, 10).await?;
                for u in &page.items {
                    println!(
                        "{}  {} <{}>  {}  {} orders  ${:.2}",
                        u.id,
                        u.name,
                        u.email,
                        u.phone.as_deref().unwrap_or("N/A"),
                        u.orders.len(),
                        u.total_spent()
                    );
                }
                println!("page {}/{} ({} users)", page.page, page.pages, page.total);
            }
            "/orders" => {
                let status = if arg.is_empty() { None } else { Some(parse_order_status(arg)?) };
                let page = OrdersApi::new(self.client.clone(), self.session.clone()).list(1, 10, status).await?;
                for o in &page.items {
                    println!(
                        "{}  {:<10}  {:?}  ${:.2}  {}",
                        o.id,
                        status_label(o.status),
                        o.payment_status,
                        o.total_amount,
                        o.user.name
                    );
                }
                println!("page {}/{} ({} orders)", page.page, page.pages, page.total);
            }
            "/order" => {
                let (id, value) = arg
                    .split_once(' ')
                    .ok_or_else(|| ApiError::validation("Usage: /order <id> <status>"))?;
                let update = match value.trim() {
                    "Paid" => OrderUpdate { payment_status: Some(PaymentStatus::Paid), ..OrderUpdate::default() },
                    "Failed" => OrderUpdate { payment_status: Some(PaymentStatus::Failed), ..OrderUpdate::default() },
                    other => OrderUpdate { status: Some(parse_order_status(other)?), ..OrderUpdate::default() },
                };
                let msg = OrdersApi::new(self.client.clone(), self.session.clone()).update(id, &update).await?;
                println!("{msg}");
            }
            "/categories" => {
                for c in CatalogApi::new(self.client.clone(), self.session.clone()).categories().await? {
                    println!("{}  {}", c.id, c.name);
                }
            }
            "/items" => {
                let page_no = arg.parse().unwrap_or(1);
                let page = CatalogApi::new(self.client.clone(), self.session.clone()).products(page_no, 10).await?;
                for p in &page.items {
                    println!("{}  {}  ${:.2}", p.id, p.name, p.price);
                }
                println!("page {}/{} ({} items)", page.page, page.pages, page.total);
            }
            "/passwd" => {
                let auth = AuthApi::new(self.client.clone(), self.session.clone());
                let current = prompt(input, "current password:").await?.unwrap_or_default();
                let new = prompt(input, "new password:").await?.unwrap_or_default();
                let confirm = prompt(input, "confirm password:").await?.unwrap_or_default();
                println!("{}", auth.change_password(&current, &new, &confirm).await?);
            }
            other => println!("unknown command {other}, try /help"),
        }
        Ok(true)
    }

    fn print_new_rows(&mut self) {
        let rows = self.controller.rows();
        for row in rows.iter().skip(self.printed) {
            let who = if row.own { "you" } else { "them" };
            println!("[{}] {who}: {}", row.time_label, row.text);
            if let Some(url) = &row.attachment_url {
                println!("        attachment: {url}");
            }
        }
        self.printed = rows.len();
        self.controller.take_scroll_request();
    }

    fn flush(&self) {
        for notice in self.controller.take_notices() {
            match notice.level {
                NoticeLevel::Info => println!("· {}", notice.text),
                NoticeLevel::Error => println!("! {}", notice.text),
            }
        }
        if let SelectionState::Failed { reason, .. } = self.controller.selection() {
            log::debug!("selection failed: {reason}");
        }
    }
}

fn parse_order_status(value: &str) -> Result<OrderStatus> {
    match value {
        "Pending" => Ok(OrderStatus::Pending),
        "Processing" => Ok(OrderStatus::Processing),
        "Delivered" => Ok(OrderStatus::Delivered),
        "Cancelled" => Ok(OrderStatus::Cancelled),
        other => Err(ApiError::validation(format!("Unknown order status {other}"))),
    }
}
