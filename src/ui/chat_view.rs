use gtk4::prelude::*;
use gtk4 as gtk;
use std::cell::RefCell;
use std::rc::Rc;
use storefront_admin::api::chat::FileUpload;
use storefront_admin::chat::thread::{Composer, ThreadRow};

pub struct ChatView {
    root: gtk::Box,
    title: gtk::Label,
    subtitle: gtk::Label,
    scroller: gtk::ScrolledWindow,
    messages_box: gtk::Box,
    entry: gtk::Entry,
    send_btn: gtk::Button,
    attach_btn: gtk::Button,
    file_label: gtk::Label,
    composer: RefCell<Composer>,
    active: RefCell<bool>,
    chooser: RefCell<Option<gtk::FileChooserNative>>,
}

/// Everything the view shows for one render pass.
pub struct ThreadModel<'a> {
    pub title: &'a str,
    pub subtitle: &'a str,
    pub active: bool,
    pub rows: &'a [ThreadRow],
    pub hint: Option<&'a str>,
    pub scroll: bool,
}

impl ChatView {
    pub fn new() -> Rc<Self> {
        let root = gtk::Box::new(gtk::Orientation::Vertical, 6);
        root.set_margin_top(8);
        root.set_margin_bottom(8);
        root.set_margin_start(8);
        root.set_margin_end(8);

        let title = gtk::Label::new(Some("Select a conversation"));
        title.add_css_class("heading");
        title.set_halign(gtk::Align::Start);
        let subtitle = gtk::Label::new(Some("No conversation selected"));
        subtitle.add_css_class("dim-label");
        subtitle.set_halign(gtk::Align::Start);
        root.append(&title);
        root.append(&subtitle);
        root.append(&gtk::Separator::new(gtk::Orientation::Horizontal));

        let scroller = gtk::ScrolledWindow::builder()
            .vexpand(true)
            .hexpand(true)
            .build();
        let messages_box = gtk::Box::new(gtk::Orientation::Vertical, 6);
        scroller.set_child(Some(&messages_box));
        root.append(&scroller);

        let input_row = gtk::Box::new(gtk::Orientation::Horizontal, 6);
        let attach_btn = gtk::Button::from_icon_name("mail-attachment-symbolic");
        let entry = gtk::Entry::new();
        entry.set_hexpand(true);
        let send_btn = gtk::Button::with_label("Send");
        send_btn.add_css_class("suggested-action");
        input_row.append(&attach_btn);
        input_row.append(&entry);
        input_row.append(&send_btn);
        root.append(&input_row);

        let file_label = gtk::Label::new(None);
        file_label.add_css_class("dim-label");
        file_label.set_halign(gtk::Align::Start);
        file_label.set_visible(false);
        root.append(&file_label);

        let view = Rc::new(Self {
            root,
            title,
            subtitle,
            scroller,
            messages_box,
            entry,
            send_btn,
            attach_btn,
            file_label,
            composer: RefCell::new(Composer::default()),
            active: RefCell::new(false),
            chooser: RefCell::new(None),
        });
        view.sync_composer();

        {
            let weak = Rc::downgrade(&view);
            view.entry.connect_changed(move |entry| {
                if let Some(view) = weak.upgrade() {
                    view.composer.borrow_mut().text = entry.text().to_string();
                    view.sync_composer();
                }
            });
        }
        {
            let weak = Rc::downgrade(&view);
            view.attach_btn.connect_clicked(move |_| {
                if let Some(view) = weak.upgrade() {
                    view.pick_file();
                }
            });
        }
        view
    }

    pub fn widget(&self) -> gtk::Widget {
        self.root.clone().upcast()
    }

    /// `f` gets the draft text and file; the composer is cleared right away.
    pub fn connect_send(self: &Rc<Self>, f: impl Fn(String, Option<FileUpload>) + 'static) {
        let send: Rc<dyn Fn()> = {
            let weak = Rc::downgrade(self);
            Rc::new(move || {
                let Some(view) = weak.upgrade() else { return };
                if !view.composer.borrow().can_send(*view.active.borrow()) {
                    return;
                }
                let (text, file) = view.composer.borrow_mut().take();
                view.entry.set_text("");
                view.sync_composer();
                f(text, file);
            })
        };
        {
            let send = send.clone();
            self.send_btn.connect_clicked(move |_| (send)());
        }
        self.entry.connect_activate(move |_| (send)());
    }

    fn pick_file(self: &Rc<Self>) {
        let chooser = gtk::FileChooserNative::new(
            Some("Attach a file"),
            None::<&gtk::Window>,
            gtk::FileChooserAction::Open,
            Some("Attach"),
            Some("Cancel"),
        );
        let weak = Rc::downgrade(self);
        chooser.connect_response(move |dialog, response| {
            let Some(view) = weak.upgrade() else { return };
            if response == gtk::ResponseType::Accept {
                if let Some(path) = dialog.file().and_then(|f| f.path()) {
                    match std::fs::read(&path) {
                        Ok(bytes) => {
                            let name = path
                                .file_name()
                                .map(|n| n.to_string_lossy().into_owned())
                                .unwrap_or_else(|| "attachment".into());
                            view.composer.borrow_mut().file = Some(FileUpload::new(name, bytes));
                        }
                        Err(e) => log::warn!("could not read {}: {e}", path.display()),
                    }
                }
            }
            view.sync_composer();
            view.chooser.borrow_mut().take();
        });
        chooser.show();
        *self.chooser.borrow_mut() = Some(chooser);
    }

    fn sync_composer(&self) {
        let active = *self.active.borrow();
        let composer = self.composer.borrow();
        self.entry.set_sensitive(active);
        self.attach_btn.set_sensitive(active);
        self.entry.set_placeholder_text(Some(Composer::placeholder(active)));
        self.send_btn.set_sensitive(composer.can_send(active));
        match &composer.file {
            Some(file) => {
                self.file_label.set_label(&format!("Selected file: {}", file.file_name));
                self.file_label.set_visible(true);
            }
            None => self.file_label.set_visible(false),
        }
    }

    pub fn render(&self, model: ThreadModel<'_>) {
        self.title.set_label(model.title);
        self.subtitle.set_label(model.subtitle);
        *self.active.borrow_mut() = model.active;
        self.sync_composer();

        while let Some(child) = self.messages_box.first_child() {
            self.messages_box.remove(&child);
        }
        if let Some(hint) = model.hint {
            let lbl = gtk::Label::new(Some(hint));
            lbl.add_css_class("dim-label");
            lbl.set_margin_top(16);
            self.messages_box.append(&lbl);
        }
        for row in model.rows {
            self.messages_box.append(&bubble(row));
        }

        if model.scroll {
            let adj = self.scroller.vadjustment();
            gtk4::glib::idle_add_local_once(move || {
                adj.set_value(adj.upper() - adj.page_size());
            });
        }
    }
}

fn bubble(row: &ThreadRow) -> gtk::Box {
    let bubble = gtk::Box::new(gtk::Orientation::Vertical, 2);
    bubble.add_css_class("card");
    bubble.set_halign(if row.own { gtk::Align::End } else { gtk::Align::Start });
    bubble.set_margin_start(8);
    bubble.set_margin_end(8);

    if !row.text.is_empty() {
        let text = gtk::Label::new(Some(&row.text));
        text.set_wrap(true);
        text.set_xalign(0.0);
        text.set_selectable(true);
        text.set_margin_top(6);
        text.set_margin_start(10);
        text.set_margin_end(10);
        bubble.append(&text);
    }
    if let Some(url) = &row.attachment_url {
        let link = gtk::LinkButton::with_label(url, "Attachment");
        link.set_halign(gtk::Align::Start);
        bubble.append(&link);
    }
    let time = gtk::Label::new(Some(&row.time_label));
    time.add_css_class("caption");
    time.add_css_class("dim-label");
    time.set_halign(gtk::Align::End);
    time.set_margin_bottom(4);
    time.set_margin_end(10);
    bubble.append(&time);
    bubble
}
