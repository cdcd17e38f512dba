use adw::prelude::*;
use adw::Application;
use storefront_admin::api::client::{ApiClient, ClearSession};
use storefront_admin::config::{Session, Settings};

/// What every window needs to talk to the backend.
#[derive(Clone)]
pub struct Services {
    pub origin: String,
    pub client: ApiClient,
    pub session: Session,
}

impl Services {
    pub fn from_settings(settings: &Settings) -> storefront_admin::Result<Self> {
        let origin = settings.origin();
        let client = ApiClient::new(&origin)?.with_policy(ClearSession::with_listener(|| {
            if let Err(e) = Settings::forget_login() {
                log::warn!("could not clear stored token: {e}");
            }
        }));
        Ok(Self { origin, client, session: settings.session() })
    }
}

pub fn build_ui(app: &Application) {
    let settings = Settings::load();
    let services = match Services::from_settings(&settings) {
        Ok(services) => services,
        Err(e) => {
            log::error!("bad backend origin {}: {e}", settings.base_url);
            app.quit();
            return;
        }
    };
    if services.session.is_authenticated() {
        crate::ui::main_window::show_main_window(app, services);
    } else {
        crate::ui::login::show_login_window(app, services);
    }
}
