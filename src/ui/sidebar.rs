use gtk4::prelude::*;
use gtk4 as gtk;
use std::cell::RefCell;
use std::rc::Rc;
use storefront_admin::chat::projection::filter_customers;
use storefront_admin::chat::Customer;

pub struct Sidebar {
    root: gtk::Box,
    search: gtk::SearchEntry,
    list: gtk::ListBox,
    customers: RefCell<Vec<Customer>>,
    selected: RefCell<Option<String>>,
    // ids in the order the rows are currently shown
    shown: Rc<RefCell<Vec<String>>>,
}

impl Sidebar {
    pub fn new() -> Rc<Self> {
        let root = gtk::Box::new(gtk::Orientation::Vertical, 6);
        root.set_margin_top(8);
        root.set_margin_bottom(8);
        root.set_margin_start(8);
        root.set_margin_end(8);
        root.set_width_request(280);

        let search = gtk::SearchEntry::new();
        search.set_placeholder_text(Some("Search..."));
        root.append(&search);

        let scroller = gtk::ScrolledWindow::builder().vexpand(true).build();
        let list = gtk::ListBox::new();
        list.add_css_class("navigation-sidebar");
        let empty = gtk::Label::new(Some("No conversations found"));
        empty.add_css_class("dim-label");
        empty.set_margin_top(16);
        list.set_placeholder(Some(&empty));
        scroller.set_child(Some(&list));
        root.append(&scroller);

        let sidebar = Rc::new(Self {
            root,
            search,
            list,
            customers: RefCell::new(Vec::new()),
            selected: RefCell::new(None),
            shown: Rc::new(RefCell::new(Vec::new())),
        });
        {
            let weak = Rc::downgrade(&sidebar);
            sidebar.search.connect_search_changed(move |_| {
                if let Some(sidebar) = weak.upgrade() {
                    sidebar.render();
                }
            });
        }
        sidebar
    }

    pub fn widget(&self) -> gtk::Widget {
        self.root.clone().upcast()
    }

    pub fn connect_selected(&self, f: impl Fn(String) + 'static) {
        let shown = self.shown.clone();
        self.list.connect_row_activated(move |_, row| {
            let Ok(idx) = usize::try_from(row.index()) else { return };
            if let Some(id) = shown.borrow().get(idx).cloned() {
                f(id);
            }
        });
    }

    pub fn set_items(&self, customers: Vec<Customer>, selected: Option<&str>) {
        *self.customers.borrow_mut() = customers;
        *self.selected.borrow_mut() = selected.map(str::to_string);
        self.render();
    }

    fn render(&self) {
        while let Some(row) = self.list.row_at_index(0) {
            self.list.remove(&row);
        }
        let customers = self.customers.borrow();
        let selected = self.selected.borrow();
        let filtered = filter_customers(&customers, &self.search.text());
        let mut shown = self.shown.borrow_mut();
        shown.clear();

        for customer in filtered {
            let row = gtk::ListBoxRow::new();
            let col = gtk::Box::new(gtk::Orientation::Vertical, 2);
            col.set_margin_top(8);
            col.set_margin_bottom(8);
            col.set_margin_start(8);
            col.set_margin_end(8);

            let name = gtk::Label::new(Some(&customer.name));
            name.add_css_class("heading");
            name.set_halign(gtk::Align::Start);
            let detail = gtk::Label::new(Some(customer.subtitle()));
            detail.add_css_class("dim-label");
            detail.set_halign(gtk::Align::Start);
            detail.set_ellipsize(gtk4::pango::EllipsizeMode::End);
            col.append(&name);
            col.append(&detail);
            row.set_child(Some(&col));
            self.list.append(&row);
            if selected.as_deref() == Some(customer.id.as_str()) {
                self.list.select_row(Some(&row));
            }
            shown.push(customer.id.clone());
        }
    }
}
