use url::Url;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
const DEFAULT_WS_URL: &str = "ws://127.0.0.1:8000/ws/track";

/// Where the backend lives. No config file and nothing persisted; the CLI
/// overrides these from flags or environment.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub base_url: Url,
    pub ws_url: Url,
    /// When set, session start/stop use the identity-aware dialect
    /// (`/start_session` + `/stop_session`) instead of the query-string one.
    pub user_id: Option<String>,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base url"),
            ws_url: Url::parse(DEFAULT_WS_URL).expect("default ws url"),
            user_id: None,
        }
    }
}

impl Endpoints {
    pub fn route(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        url.set_path(path);
        url
    }
}
