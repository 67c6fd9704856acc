use std::{sync::Arc, time::Duration};

use tokio::sync::Semaphore;

use super::{LoopbackChannel, LoopbackConnection, LoopbackFactory, LoopbackPlayer};
use crate::{
    commands::{AllowAll, CommandRouter, PermissionCheck},
    common::{RoomId, UserId},
    configs::Config,
    display::EmbedRenderer,
    session::{SessionController, SessionParts, SessionRegistry},
    track::Track,
};

/// One room wired to loopback collaborators.
pub struct LoopbackRig {
    pub room_id: RoomId,
    pub bot: UserId,
    pub config: Arc<Config>,
    pub connection: Arc<LoopbackConnection>,
    pub player: Arc<LoopbackPlayer>,
    pub channel: Arc<LoopbackChannel>,
    pub factory: Arc<LoopbackFactory>,
    pub permissions: Arc<dyn PermissionCheck>,
    pub registry: Arc<SessionRegistry>,
    pub router: CommandRouter,
}

impl LoopbackRig {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);
        let registry = Arc::new(SessionRegistry::new());
        let bot = UserId(1);
        Self {
            room_id: RoomId::from("loopback-room"),
            bot,
            connection: LoopbackConnection::new(),
            player: LoopbackPlayer::new(),
            channel: LoopbackChannel::new(bot),
            factory: Arc::new(LoopbackFactory::new()),
            permissions: Arc::new(AllowAll),
            router: CommandRouter::new(registry.clone(), config.clone()),
            registry,
            config,
        }
    }

    pub fn with_permissions<P: PermissionCheck + 'static>(mut self, check: P) -> Self {
        self.permissions = Arc::new(check);
        self
    }

    pub fn with_gated_factory(mut self, gate: Arc<Semaphore>) -> Self {
        self.factory = Arc::new(LoopbackFactory::gated(gate));
        self
    }

    pub fn with_failing_titles(mut self, titles: &[&str]) -> Self {
        self.factory = Arc::new(LoopbackFactory::failing_titles(titles));
        self
    }

    pub fn parts(&self) -> SessionParts {
        SessionParts {
            connection: self.connection.clone(),
            player: self.player.clone(),
            channel: self.channel.clone(),
            renderer: Arc::new(EmbedRenderer::default()),
            permissions: self.permissions.clone(),
        }
    }

    /// The room's session, created on first use.
    pub fn session(&self) -> Arc<SessionController> {
        self.registry.get_or_insert_with(&self.room_id, || {
            SessionController::new(
                self.room_id.clone(),
                self.parts(),
                self.config.clone(),
                self.registry.clone(),
            )
        })
    }

    pub fn track(&self, title: &str, duration_secs: Option<u64>) -> Track {
        Track::new(
            title,
            format!("https://example.com/{}", title),
            duration_secs.map(Duration::from_secs),
            self.factory.clone(),
        )
    }
}
