#[cfg(feature = "gui")]
mod app;
#[cfg(not(feature = "gui"))]
mod console;
#[cfg(feature = "gui")]
mod ui;

fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

#[cfg(feature = "gui")]
fn main() {
    use adw::prelude::*;

    init_logging();
    let app = adw::Application::builder()
        .application_id("com.example.StorefrontAdmin")
        .build();
    app.connect_activate(|app| {
        crate::app::build_ui(app);
    });
    app.run();
}

#[cfg(not(feature = "gui"))]
fn main() {
    init_logging();
    if let Err(e) = storefront_admin::utils::RUNTIME.block_on(console::run()) {
        log::error!("{e}");
        std::process::exit(1);
    }
}
