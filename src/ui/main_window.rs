use adw::prelude::*;
use adw::Application;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use storefront_admin::api::chat::HttpChatApi;
use storefront_admin::api::events::{ChannelHandle, RealtimeChannel};
use storefront_admin::api::users::UsersApi;
use storefront_admin::chat::thread::{empty_hint, header, MessageThread};
use storefront_admin::chat::{ChatController, Customer, NoticeLevel, SelectionState};
use storefront_admin::storage::Cache;
use storefront_admin::utils::run_async_to_main;
use storefront_admin::{ApiError, Result};

use crate::app::Services;
use crate::ui::chat_view::{ChatView, ThreadModel};
use crate::ui::sidebar::Sidebar;

type Controller = ChatController<HttpChatApi, ChannelHandle>;

/// Widgets and state of the messages page; cloned into every callback.
#[derive(Clone)]
struct Page {
    app: Application,
    window: adw::ApplicationWindow,
    overlay: adw::ToastOverlay,
    sidebar: Rc<Sidebar>,
    chat: Rc<ChatView>,
    controller: Arc<Controller>,
    services: Services,
    cache: Rc<RefCell<Option<Cache>>>,
}

impl Page {
    fn refresh(&self) {
        let selection = self.controller.selection();
        let customers = self.controller.customers();
        self.sidebar.set_items(customers, selection.customer_id());

        let customer = self.controller.selected_customer();
        let active = selection.conversation_id().is_some();
        let (title, subtitle) = header(customer.as_ref(), selection.conversation_id());
        let rows = self.controller.rows();
        let mut thread = MessageThread::new();
        thread.replace(self.controller.messages());
        let hint = empty_hint(self.controller.is_loading(), active, &thread);
        let hint = match &selection {
            SelectionState::Failed { .. } => Some("Could not open this conversation. Select it again to retry."),
            _ => hint,
        };
        self.chat.render(ThreadModel {
            title: &title,
            subtitle: &subtitle,
            active,
            rows: &rows,
            hint,
            scroll: self.controller.take_scroll_request(),
        });
        self.show_notices();
    }

    fn show_notices(&self) {
        for notice in self.controller.take_notices() {
            if notice.level == NoticeLevel::Error {
                log::warn!("{}", notice.text);
            }
            self.overlay.add_toast(adw::Toast::new(&notice.text));
        }
    }

    /// Shared completion handling: a 401 sends the operator back to login.
    fn finish<T>(&self, res: &Result<T>) {
        if let Err(ApiError::Unauthorized) = res {
            self.controller.close();
            if let Some(cache) = self.cache.borrow_mut().as_mut() {
                if let Err(e) = cache.clear() {
                    log::warn!("failed to clear conversation cache: {e}");
                }
            }
            crate::ui::login::show_login_window(&self.app, self.services.clone());
            self.window.close();
            return;
        }
        self.refresh();
    }

    fn reload(&self) {
        let controller = self.controller.clone();
        let page = self.clone();
        run_async_to_main(
            async move { controller.load_conversations().await },
            move |res| {
                if res.is_ok() {
                    if let Some(cache) = page.cache.borrow_mut().as_mut() {
                        if let Err(e) = cache.replace_conversations(&page.controller.conversations()) {
                            log::warn!("failed to cache conversations: {e}");
                        }
                    }
                }
                page.finish(&res);
            },
        );
    }

    fn select(&self, customer_id: String) {
        let controller = self.controller.clone();
        let page = self.clone();
        run_async_to_main(
            async move { controller.select_customer(&customer_id).await },
            move |res| page.finish(&res),
        );
        // shows the Resolving state right away
        self.refresh();
    }

    fn start_with(&self, query: String) {
        let users = UsersApi::new(self.services.client.clone(), self.services.session.clone());
        let page = self.clone();
        run_async_to_main(
            async move {
                let listed = users.list(1, 100).await?;
                Ok::<_, ApiError>(listed.items.into_iter().find(|u| {
                    u.id == query || u.email.eq_ignore_ascii_case(&query)
                }))
            },
            move |res| match res {
                Ok(Some(user)) => {
                    let id = user.id.clone();
                    page.controller.add_prospect(Customer {
                        id: user.id,
                        name: user.name,
                        email: user.email,
                        ..Customer::default()
                    });
                    page.select(id);
                }
                Ok(None) => page.overlay.add_toast(adw::Toast::new("No customer with that email.")),
                Err(e) => {
                    page.overlay.add_toast(adw::Toast::new(&format!("Failed to load customers: {e}")));
                    page.finish(&Err::<(), _>(e));
                }
            },
        );
    }
}

pub fn show_main_window(app: &Application, services: Services) {
    let window = adw::ApplicationWindow::builder()
        .application(app)
        .title("Storefront Admin")
        .default_width(960)
        .default_height(640)
        .build();

    let overlay = adw::ToastOverlay::new();
    let split = adw::Flap::builder()
        .reveal_flap(true)
        .locked(true)
        .modal(false)
        .build();

    let sidebar = Sidebar::new();
    split.set_flap(Some(&sidebar.widget()));
    let chat = ChatView::new();
    split.set_content(Some(&chat.widget()));
    overlay.set_child(Some(&split));

    let container = gtk4::Box::new(gtk4::Orientation::Vertical, 0);
    let header_bar = adw::HeaderBar::new();
    let title = gtk4::Label::new(Some("Messages"));
    header_bar.set_title_widget(Some(&title));
    let new_chat_btn = gtk4::Button::with_label("New Chat");
    new_chat_btn.add_css_class("suggested-action");
    header_bar.pack_end(&new_chat_btn);
    let reload_btn = gtk4::Button::from_icon_name("view-refresh-symbolic");
    header_bar.pack_start(&reload_btn);
    container.append(&header_bar);
    container.append(&overlay);
    window.set_content(Some(&container));

    let channel = match RealtimeChannel::connect(&services.origin, &services.session) {
        Ok(channel) => channel,
        Err(e) => {
            log::error!("cannot open realtime channel: {e}");
            overlay.add_toast(adw::Toast::new("Live updates unavailable"));
            window.present();
            return;
        }
    };
    let RealtimeChannel { handle, mut events, .. } = channel;
    let api = Arc::new(HttpChatApi::new(services.client.clone(), services.session.clone()));
    let controller = Arc::new(ChatController::new(api, handle.clone(), services.session.user()));

    let owner = services.session.user_id().unwrap_or_default();
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

    let page = Page {
        app: app.clone(),
        window: window.clone(),
        overlay: overlay.clone(),
        sidebar: sidebar.clone(),
        chat: chat.clone(),
        controller: controller.clone(),
        services,
        cache: Rc::new(RefCell::new(cache)),
    };

    {
        let page = page.clone();
        sidebar.connect_selected(move |id| page.select(id));
    }
    {
        let page = page.clone();
        let controller = controller.clone();
        chat.connect_send(move |text, file| {
            let controller = controller.clone();
            let page = page.clone();
            run_async_to_main(
                async move { controller.send(&text, file).await },
                move |res| page.finish(&res),
            );
        });
    }
    {
        let page = page.clone();
        reload_btn.connect_clicked(move |_| page.reload());
    }
    {
        let page = page.clone();
        gtk4::glib::MainContext::default().spawn_local(async move {
            while let Some(event) = events.recv().await {
                if page.controller.handle_event(event) {
                    page.refresh();
                }
            }
        });
    }
    {
        let controller = controller.clone();
        window.connect_close_request(move |_| {
            controller.close();
            handle.shutdown();
            gtk4::glib::Propagation::Proceed
        });
    }
    {
        let page = page.clone();
        new_chat_btn.connect_clicked(move |_| show_new_chat_dialog(&page));
    }

    window.present();
    page.refresh();
    page.reload();
}

fn show_new_chat_dialog(page: &Page) {
    let dialog = gtk4::Dialog::builder()
        .title("Start New Chat")
        .transient_for(&page.window)
        .modal(true)
        .build();
    let content = gtk4::Box::new(gtk4::Orientation::Vertical, 12);
    content.set_margin_top(12);
    content.set_margin_bottom(12);
    content.set_margin_start(12);
    content.set_margin_end(12);

    let info = gtk4::Label::new(Some("Customer email or id:"));
    info.set_halign(gtk4::Align::Start);
    content.append(&info);
    let entry = gtk4::Entry::new();
    entry.set_placeholder_text(Some("customer@example.com"));
    entry.set_hexpand(true);
    content.append(&entry);

    dialog.set_child(Some(&content));
    let _ = dialog.add_button("Cancel", gtk4::ResponseType::Cancel);
    let ok_btn = dialog.add_button("Start", gtk4::ResponseType::Ok);
    ok_btn.add_css_class("suggested-action");
    dialog.set_default_response(gtk4::ResponseType::Ok);

    let page = page.clone();
    dialog.connect_response(move |dlg, resp| {
        if resp == gtk4::ResponseType::Ok {
            let query = entry.text().trim().to_string();
            if query.is_empty() {
                page.overlay.add_toast(adw::Toast::new("Please enter an email or id."));
                return;
            }
            page.start_with(query);
        }
        dlg.close();
    });

    dialog.present();
}
