use std::sync::Arc;

use anyhow::{Context, Result};

use crate::api;
use crate::config;
use crate::data::{
    self, BoardCommentService, BoardFeedService, BoardInteractionService, CommentService,
    FeedService, InteractionService, MockCommentService, MockFeedService, MockInteractionService,
};
use crate::session;
use crate::storage;
use crate::ui;
use crate::votes::VoteStore;

pub fn run() -> Result<()> {
    let cfg = config::load(config::LoadOptions::default()).context("load config")?;
    let config_path = config::default_path();
    let display_path = friendly_path(config_path.as_ref());

    let store =
        Arc::new(storage::Store::open(storage::Options::default()).context("open storage")?);

    let session = Arc::new(session::Manager::load(store.clone()).context("load session")?);
    if !cfg.session.username.is_empty() && !cfg.session.token.is_empty() {
        session
            .login(&cfg.session.username, &cfg.session.token)
            .context("apply configured session")?;
    }

    let user_agent = cfg.api.user_agent.clone();
    let credentials: Arc<dyn api::CredentialProvider> = session.clone();

    let status: String;
    let feed_service: Arc<dyn FeedService>;
    let comment_service: Arc<dyn CommentService>;
    let interaction_service: Arc<dyn InteractionService>;

    match api::Client::new(
        credentials,
        api::ClientConfig {
            user_agent,
            base_url: Some(cfg.api.base_url.clone()),
            http_client: None,
        },
    ) {
        Ok(client) => {
            let client = Arc::new(client);
            feed_service = Arc::new(BoardFeedService::new(client.clone()));
            comment_service = Arc::new(BoardCommentService::new(client.clone()));
            interaction_service = Arc::new(BoardInteractionService::new(client));
            status = "Browsing the paper feed. j/k navigate, Enter opens comments, q quits."
                .to_string();
        }
        Err(err) => {
            feed_service = Arc::new(MockFeedService);
            comment_service = Arc::new(MockCommentService);
            interaction_service = Arc::new(MockInteractionService);
            status = format!("Offline mode ({err}); showing sample papers.");
        }
    }

    let votes =
        VoteStore::load(store.clone(), interaction_service.clone()).context("load vote store")?;

    let options = ui::Options {
        status_message: status,
        feed_service,
        comment_service,
        interaction_service,
        votes,
        session,
        default_sort: data::sort_mode_from_key("hot"),
        page_size: cfg.ui.page_size,
        fetch_limit: cfg.api.fetch_limit,
        refresh_interval: cfg.ui.refresh_interval,
        config_path: display_path,
    };

    let mut model = ui::Model::new(options);
    model.run()?;

    Ok(())
}

fn friendly_path(path: Option<&std::path::PathBuf>) -> String {
    if let Some(path) = path {
        if let Some(home) = dirs::home_dir() {
            if let Ok(stripped) = path.strip_prefix(&home) {
                let mut display = String::from("~");
                if !stripped.as_os_str().is_empty() {
                    display.push_str(&format!("/{}", stripped.display()));
                }
                return display;
            }
        }
        path.display().to_string()
    } else {
        "~/.config/an-tui/config.yaml".to_string()
    }
}
