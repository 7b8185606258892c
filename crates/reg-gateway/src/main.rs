//! Voice-server registration gateway - Main entry point.

use anyhow::Context;
use chat_client::{ChatClient, UpdateReceiver};
use identity_store::{IdentityStore, TokenStore};
use reg_gateway::chat::{AdminCommands, ChatMessenger, ChatRouter};
use reg_gateway::config::Config;
use reg_gateway::error::AppResult;
use reg_gateway::tasks::spawn_reconciler;
use reg_gateway::web::{create_router, WebState};
use registration_core::{
    ApprovalCoordinator, BanWatcher, LocaleCatalog, Messenger, RegistrationFlow,
    RegistrationPolicy, Registrar, SessionStore, WebRegistration,
};
use secrecy::ExposeSecret;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio_stream::StreamExt;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use voice_directory::{rights_from_names, AccountDirectory, EventWatcher, HttpDirectory};

#[tokio::main]
async fn main() -> AppResult<()> {
    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;

    // Initialize logging
    init_logging(&config.gateway.log_level);

    info!("Starting voice-server registration gateway...");

    // Durable stores
    let store = IdentityStore::open(config.storage.identity_path()).await?;
    let tokens = TokenStore::open(config.storage.tokens_path()).await?;

    // Voice-server directory client
    let mut directory_client = HttpDirectory::new(&config.directory.service_url)?;
    if let Some(token) = &config.directory.api_token {
        directory_client = directory_client.with_token(token.expose_secret());
    }
    if directory_client.health_check().await {
        info!("Directory daemon healthy at {}", config.directory.service_url);
    } else {
        warn!(
            "Directory daemon not reachable at {} - will retry on requests",
            config.directory.service_url
        );
    }
    let directory: Arc<dyn AccountDirectory> = Arc::new(directory_client.clone());

    // Chat transport
    let chat = Arc::new(ChatClient::new(&config.chat.service_url)?);
    if !chat.health_check().await {
        error!("Chat gateway not reachable at {}", config.chat.service_url);
        return Err(anyhow::anyhow!("Chat gateway not reachable").into());
    }
    info!("Chat gateway healthy");

    // Locales, policy, artifacts
    let locales = Arc::new(LocaleCatalog::new());
    let policy = RegistrationPolicy {
        require_approval: config.registration.require_approval,
        forced_locale: config.registration.forced_language.clone(),
        broadcast_enabled: config.registration.broadcast_enabled,
        admin_ids: config.registration.admin_ids(),
        default_rights: rights_from_names(&config.registration.default_rights()),
    };
    info!(
        "Registration policy: approval={}, admins={}, broadcast={}",
        policy.require_approval,
        policy.admin_ids.len(),
        policy.broadcast_enabled
    );

    let server_profile = artifact_gen::ServerProfile {
        server_name: config.server.name.clone(),
        host: config.server.host.clone(),
        public_host: config.server.public_host.clone(),
        tcp_port: config.server.tcp_port,
        udp_port: config.server.udp_port(),
        encrypted: config.server.encrypted,
    };
    let mut generator = artifact_gen::ArtifactGenerator::new(
        server_profile,
        config.storage.files_dir(),
        config.storage.bundles_dir(),
        tokens.clone(),
        config.cleanup.token_ttl,
    );
    if let Some(template_dir) = &config.web.client_template_dir {
        match generator.install_template(template_dir.clone()).await {
            Ok(()) => info!("Client bundle template installed from {:?}", template_dir),
            Err(e) => warn!(
                "Client bundle template unavailable ({}); bundle downloads disabled",
                e
            ),
        }
    }
    let generator = Arc::new(generator);

    // Workflow wiring
    let messenger: Arc<dyn Messenger> = Arc::new(ChatMessenger::new(chat.clone()));
    let sessions = SessionStore::new();
    let registrar = Arc::new(Registrar::new(
        store.clone(),
        directory.clone(),
        generator.clone(),
        messenger,
        locales.clone(),
        policy.clone(),
    ));
    let flow = Arc::new(RegistrationFlow::new(
        sessions.clone(),
        store.clone(),
        directory.clone(),
        registrar.clone(),
        locales.clone(),
        policy.clone(),
    ));
    let coordinator = Arc::new(ApprovalCoordinator::new(
        store.clone(),
        registrar.clone(),
        sessions.clone(),
    ));

    // Ban propagation off the directory event feed
    let ban_watcher = BanWatcher::new(store.clone(), registrar.clone());
    let event_watcher = EventWatcher::new(
        directory_client.clone(),
        config.directory.event_poll_interval,
    );
    tokio::spawn(async move {
        ban_watcher.run(event_watcher.stream()).await;
    });

    // Reconciliation sweep
    spawn_reconciler(store.clone(), generator.clone(), config.cleanup.clone());

    // Web front-end
    if config.web.enabled {
        let web_state = WebState {
            service: Arc::new(WebRegistration::new(
                store.clone(),
                directory.clone(),
                registrar.clone(),
            )),
            artifacts: generator.clone(),
            server_name: config.server.name.clone(),
            locale: locales.bootstrap().to_string(),
        };
        let app = create_router(web_state);
        let bind_addr = config.web.bind_addr;
        tokio::spawn(async move {
            let listener = match tokio::net::TcpListener::bind(bind_addr).await {
                Ok(listener) => listener,
                Err(e) => {
                    error!("Failed to bind web server to {}: {}", bind_addr, e);
                    return;
                }
            };
            info!("Web registration listening on {}", bind_addr);
            if let Err(e) = axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            {
                error!("Web server error: {}", e);
            }
        });
    } else {
        info!("Web registration disabled");
    }

    // Chat event loop
    let router = ChatRouter::new(
        chat.clone(),
        flow,
        coordinator,
        AdminCommands::new(store.clone(), directory.clone()),
        policy,
    );
    let receiver = UpdateReceiver::new((*chat).clone(), config.chat.poll_interval);
    let mut stream = Box::pin(receiver.stream());

    info!("Listening for chat events...");

    loop {
        tokio::select! {
            Some(event) = stream.next() => {
                router.dispatch(event).await;
            }
            _ = signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    info!("Shutting down...");
    Ok(())
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
