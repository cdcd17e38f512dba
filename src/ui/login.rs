use adw::prelude::*;
use adw::Application;
use gtk4 as gtk;
use std::cell::RefCell;
use std::rc::Rc;
use storefront_admin::api::auth::{AuthApi, ResetFlow, ResetStep};
use storefront_admin::config::Settings;
use storefront_admin::utils::run_async_to_main;

use crate::app::Services;

pub fn show_login_window(app: &Application, services: Services) {
    let window = adw::ApplicationWindow::builder()
        .application(app)
        .title("Storefront Admin Login")
        .default_width(420)
        .default_height(300)
        .resizable(false)
        .build();

    let toast_overlay = adw::ToastOverlay::new();

    let root = gtk::Box::new(gtk::Orientation::Vertical, 12);
    root.set_margin_top(24);
    root.set_margin_bottom(24);
    root.set_margin_start(24);
    root.set_margin_end(24);

    let title = gtk::Label::new(Some("Sign in to the dashboard"));
    title.add_css_class("title-2");
    title.set_halign(gtk::Align::Start);
    root.append(&title);

    let email_entry = gtk::Entry::new();
    email_entry.set_placeholder_text(Some("Email"));
    email_entry.set_hexpand(true);

    let pass_entry = gtk::PasswordEntry::new();
    pass_entry.set_placeholder_text(Some("Password"));
    pass_entry.set_hexpand(true);

    let form = gtk::Box::new(gtk::Orientation::Vertical, 8);
    form.append(&email_entry);
    form.append(&pass_entry);
    root.append(&form);

    let status = gtk::Label::new(Some(&services.origin));
    status.add_css_class("dim-label");
    status.set_halign(gtk::Align::Start);
    root.append(&status);

    let buttons = gtk::Box::new(gtk::Orientation::Horizontal, 8);
    buttons.set_halign(gtk::Align::End);
    let forgot_btn = gtk::Button::with_label("Forgot password?");
    forgot_btn.add_css_class("flat");
    let login_btn = gtk::Button::with_label("Sign in");
    login_btn.add_css_class("suggested-action");
    buttons.append(&forgot_btn);
    buttons.append(&login_btn);
    root.append(&buttons);

    toast_overlay.set_child(Some(&root));
    let container = gtk::Box::new(gtk::Orientation::Vertical, 0);
    let header = adw::HeaderBar::new();
    let header_title = gtk::Label::new(Some("Storefront Admin"));
    header.set_title_widget(Some(&header_title));
    container.append(&header);
    container.append(&toast_overlay);
    window.set_content(Some(&container));

    let on_login = {
        let app = app.clone();
        let window = window.clone();
        let overlay = toast_overlay.clone();
        let email_entry = email_entry.clone();
        let pass_entry = pass_entry.clone();
        let login_btn = login_btn.clone();
        let status = status.clone();
        let services = services.clone();
        move || {
            let email = email_entry.text().to_string();
            let password = pass_entry.text().to_string();
            if email.trim().is_empty() || password.is_empty() {
                overlay.add_toast(adw::Toast::new("Please enter email and password."));
                return;
            }

            status.set_label("Signing in…");
            login_btn.set_sensitive(false);
            let auth = AuthApi::new(services.client.clone(), services.session.clone());

            let app = app.clone();
            let window = window.clone();
            let overlay = overlay.clone();
            let status = status.clone();
            let login_btn = login_btn.clone();
            let services = services.clone();
            run_async_to_main(
                async move { auth.login(&email, &password).await },
                move |res| {
                    login_btn.set_sensitive(true);
                    match res {
                        Ok(tokens) => {
                            if let Err(e) = Settings::remember_login(&tokens.access_token, &tokens.user) {
                                overlay.add_toast(adw::Toast::new(&format!("Failed to save settings: {}", e)));
                            }
                            crate::ui::main_window::show_main_window(&app, services);
                            window.close();
                        }
                        Err(err) => {
                            log::warn!("login failed: {err}");
                            status.set_label("Login failed");
                            overlay.add_toast(adw::Toast::new(&err.to_string()));
                        }
                    }
                },
            );
        }
    };

    let on_login: Rc<dyn Fn()> = Rc::new(on_login);
    {
        let on_login = on_login.clone();
        login_btn.connect_clicked(move |_| (on_login)());
    }
    {
        let on_login = on_login.clone();
        email_entry.connect_activate(move |_| (on_login)());
    }
    {
        let on_login = on_login.clone();
        pass_entry.connect_activate(move |_| (on_login)());
    }
    {
        let window = window.clone();
        let overlay = toast_overlay.clone();
        forgot_btn.connect_clicked(move |_| show_reset_dialog(&window, &overlay, &services));
    }

    window.present();
}

/// Email -> code -> new password, one field at a time.
fn show_reset_dialog(parent: &adw::ApplicationWindow, overlay: &adw::ToastOverlay, services: &Services) {
    let dialog = gtk::Dialog::builder()
        .title("Reset password")
        .transient_for(parent)
        .modal(true)
        .build();
    let content = gtk::Box::new(gtk::Orientation::Vertical, 12);
    content.set_margin_top(12);
    content.set_margin_bottom(12);
    content.set_margin_start(12);
    content.set_margin_end(12);

    let info = gtk::Label::new(Some("Enter your registered email address, we'll send you a code."));
    info.set_wrap(true);
    info.set_halign(gtk::Align::Start);
    content.append(&info);

    let field = gtk::Entry::new();
    field.set_placeholder_text(Some("Email"));
    content.append(&field);
    let confirm = gtk::PasswordEntry::new();
    confirm.set_placeholder_text(Some("Confirm password"));
    confirm.set_visible(false);
    content.append(&confirm);

    let next_btn = gtk::Button::with_label("Continue");
    next_btn.add_css_class("suggested-action");
    next_btn.set_halign(gtk::Align::End);
    content.append(&next_btn);
    dialog.set_child(Some(&content));

    let auth = AuthApi::new(services.client.clone(), services.session.clone());
    let flow: Rc<RefCell<Option<ResetFlow>>> = Rc::new(RefCell::new(Some(ResetFlow::new())));
    let overlay = overlay.clone();
    let dialog_for_next = dialog.clone();
    next_btn.connect_clicked(move |btn| {
        // the flow is away on the runtime while a step is in flight
        let Some(mut current) = flow.borrow_mut().take() else { return };
        let value = field.text().to_string();
        let second = confirm.text().to_string();
        let auth = auth.clone();
        btn.set_sensitive(false);

        let flow = flow.clone();
        let btn = btn.clone();
        let field = field.clone();
        let confirm = confirm.clone();
        let info = info.clone();
        let overlay = overlay.clone();
        let dialog = dialog_for_next.clone();
        run_async_to_main(
            async move {
                let res = match current.step().clone() {
                    ResetStep::Email => current.request_code(&auth, &value).await,
                    ResetStep::Otp { .. } => current.verify(&auth, &value).await,
                    ResetStep::Reset { .. } => current.reset(&auth, &value, &second).await,
                    ResetStep::Done => Ok(()),
                };
                (current, res)
            },
            move |(current, res)| {
                btn.set_sensitive(true);
                if let Err(e) = &res {
                    overlay.add_toast(adw::Toast::new(&e.to_string()));
                }
                field.set_text("");
                match current.step() {
                    ResetStep::Email => {}
                    ResetStep::Otp { .. } => {
                        info.set_label("OTP sent to your email. Enter the code.");
                        field.set_placeholder_text(Some("Code"));
                    }
                    ResetStep::Reset { .. } => {
                        info.set_label("OTP verified. Choose a new password.");
                        field.set_placeholder_text(Some("New password"));
                        field.set_visibility(false);
                        confirm.set_visible(true);
                    }
                    ResetStep::Done => {
                        overlay.add_toast(adw::Toast::new("Password reset successful"));
                        dialog.close();
                    }
                }
                *flow.borrow_mut() = Some(current);
            },
        );
    });

    dialog.present();
}
