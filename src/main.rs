use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::{eyre, Result};

use dreamsync::{
    cli::{Cli, SurfaceKind},
    config::Config,
    infrastructure::{
        api::{HttpApi, PageSource, Reauthenticating},
        auth::{self, AuthSession, HttpTokenRefresher},
        realtime::RealtimeConfig,
        socket::WsTransport,
    },
    integration::surfaces,
    model::{dream::DreamFilter, item::Item, post::FeedFilter},
    utils::{initialize_logging, initialize_panic_handler},
    ListSurface, SurfaceUpdate,
};

struct Runtime {
    config: Config,
    auth: AuthSession,
    refresher: Arc<HttpTokenRefresher>,
}

impl Runtime {
    /// Retry requests rejected with an expired token after refreshing it
    fn reauthenticating<A>(&self, inner: A) -> Reauthenticating<A, HttpTokenRefresher> {
        Reauthenticating::new(inner, self.auth.clone(), Arc::clone(&self.refresher))
    }
}

async fn follow<T, S>(mut surface: ListSurface<T, S>, args: &Cli, runtime: Runtime) -> Result<()>
where
    T: Item,
    S: PageSource<T>,
{
    surface.mount();
    let updates = surface.settle().await;
    print_updates(&surface, updates)?;
    for _ in 1..args.pages {
        if !surface.state().has_more() {
            break;
        }
        surface.sentinel_visibility_changed(false);
        surface.sentinel_visibility_changed(true);
        let updates = surface.settle().await;
        print_updates(&surface, updates)?;
    }
    for item in surface.state().items() {
        println!("{}", serde_json::to_string(item)?);
    }
    if surface.state().is_empty_state() {
        println!("(no items)");
    }

    if args.follow {
        surface.connect_realtime(
            WsTransport::new(runtime.config.socket_url.as_str()),
            runtime.auth.clone(),
            Arc::clone(&runtime.refresher),
            RealtimeConfig::from(&runtime.config),
        );
        loop {
            let update = tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                update = surface.next() => update,
            };
            match update {
                Some(SurfaceUpdate::Reconciled { id, changed: true }) => {
                    if let Some(item) = surface.state().get(&id) {
                        println!("{}", serde_json::to_string(item)?);
                    }
                }
                Some(SurfaceUpdate::RealtimeEnded) => {
                    eprintln!("Realtime updates stopped");
                    break;
                }
                Some(_) => {}
                None => break,
            }
        }
    }

    surface.unmount().await;
    Ok(())
}

fn print_updates<T, S>(surface: &ListSurface<T, S>, updates: Vec<SurfaceUpdate>) -> Result<()>
where
    T: Item,
    S: PageSource<T>,
{
    for update in updates {
        let Some(e) = update.error() else {
            continue;
        };
        if let SurfaceUpdate::PageFailed(_) = update {
            let page = surface.state().page();
            return Err(eyre!("Failed to load page {page}: {e}"));
        }
        tracing::debug!("{e}");
    }
    Ok(())
}

async fn tokio_main() -> Result<()> {
    initialize_logging()?;

    initialize_panic_handler()?;

    let args = <Cli as Parser>::parse();

    let config = Config::new()?;

    let client = reqwest::Client::new();
    let auth = AuthSession::global();
    let refresher = Arc::new(HttpTokenRefresher::new(
        client.clone(),
        &config.api_url,
        config.refresh_token.clone(),
    ));
    if config.refresh_token.is_some() {
        // Requests still go out unauthenticated when this fails
        if let Err(e) =
            auth::ensure_fresh(&auth, refresher.as_ref(), config.token_refresh_lead()).await
        {
            tracing::warn!("Continuing without access token: {e}");
        }
    }

    let api = HttpApi::new(client, &config.api_url, auth.clone());
    let limit = config.page_limit;
    let parent = args.parent.clone().unwrap_or_default();
    let runtime = Runtime {
        config,
        auth,
        refresher,
    };

    match args.surface {
        SurfaceKind::Dreams => {
            let filter = DreamFilter {
                sort: args.sort.as_deref().unwrap_or("recent").parse()?,
                search: args.search.clone().unwrap_or_default(),
                ..Default::default()
            };
            let source = runtime.reauthenticating(api.dream_pages());
            let surface = surfaces::dreams(source, &filter, limit);
            follow(surface, &args, runtime).await
        }
        SurfaceKind::Feed => {
            let filter = FeedFilter {
                sort: args.sort.as_deref().unwrap_or("recent").parse()?,
                search: args.search.clone().unwrap_or_default(),
                ..Default::default()
            };
            let source = runtime.reauthenticating(api.feed_pages());
            let surface = surfaces::post_feed(source, &filter, limit);
            follow(surface, &args, runtime).await
        }
        SurfaceKind::Comments => {
            let source = runtime.reauthenticating(api.comment_pages(&parent));
            let surface = surfaces::comments(source, limit);
            follow(surface, &args, runtime).await
        }
        SurfaceKind::Replies => {
            let source = runtime.reauthenticating(api.reply_pages(&parent));
            let surface = surfaces::replies(source, limit);
            follow(surface, &args, runtime).await
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = tokio_main().await {
        eprintln!("{} error: Something went wrong", env!("CARGO_PKG_NAME"));
        Err(e)
    } else {
        Ok(())
    }
}
