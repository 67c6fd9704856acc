//! Control commands issued by users, either directly through the router or
//! through reactions on the now-playing message.

pub mod permissions;

use std::sync::Arc;

use tracing::{debug, info};

pub use permissions::{AllowAll, PermissionCheck};

use crate::{
    common::{CommandError, RoomId, UserId},
    configs::Config,
    display::Notice,
    player::PlayerStatus,
    queue::MAX_VOLUME,
    session::{SessionController, SessionParts, SessionRegistry, SessionStore},
    track::Track,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Skip,
    Pause,
    Resume,
    /// Pause while Playing, resume otherwise.
    TogglePause,
    ToggleLoop,
    Shuffle,
    Stop,
    SetVolume(u8),
    /// Relative change, clamped to 0..=100.
    StepVolume(i32),
    ToggleMute,
}

/// A request from an external command handler.
#[derive(Debug, Clone)]
pub struct ControlRequest {
    pub room_id: RoomId,
    pub user_id: UserId,
    pub command: Command,
}

/// Runs `command` against `session` on behalf of `user`.
///
/// On success the confirmation notice (if any) has already been posted as
/// ephemeral feedback. A volume step that hits the bound changes nothing and
/// returns `Ok(None)`.
pub async fn execute(
    session: &Arc<SessionController>,
    user: UserId,
    command: Command,
) -> Result<Option<Notice>, CommandError> {
    if session.is_torn_down() {
        return Err(CommandError::NoSession(session.room_id().clone()));
    }
    if !session.can_control(user) {
        debug!(
            "[{}] {:?} refused for user {}",
            session.room_id(),
            command,
            user
        );
        return Err(CommandError::PermissionDenied);
    }

    let notice = match command {
        Command::Skip => {
            if !session.skip() {
                return Err(CommandError::InvalidState);
            }
            Some(Notice::Skipped { by: user })
        }
        Command::Pause => pause(session, user)?,
        Command::Resume => resume(session, user)?,
        Command::TogglePause => match session.player_status() {
            PlayerStatus::Playing => pause(session, user)?,
            _ => resume(session, user)?,
        },
        Command::ToggleLoop => Some(Notice::Loop {
            by: user,
            enabled: session.toggle_loop(),
        }),
        Command::Shuffle => {
            session.shuffle().await;
            Some(Notice::Shuffled { by: user })
        }
        Command::Stop => {
            session.stop().await;
            Some(Notice::Stopped { by: user })
        }
        Command::SetVolume(percent) => {
            if percent > MAX_VOLUME {
                return Err(CommandError::InvalidArgument(format!(
                    "volume must be between 0 and {}",
                    MAX_VOLUME
                )));
            }
            Some(Notice::VolumeChanged {
                by: user,
                percent: session.set_volume(percent),
            })
        }
        Command::StepVolume(delta) => {
            let (before, after) = session.adjust_volume(delta);
            (before != after).then_some(Notice::VolumeChanged {
                by: user,
                percent: after,
            })
        }
        Command::ToggleMute => Some(if session.toggle_mute() {
            Notice::Muted { by: user }
        } else {
            Notice::Unmuted { by: user }
        }),
    };

    if let Some(notice) = &notice {
        session.notify(notice.clone());
    }
    Ok(notice)
}

fn pause(session: &SessionController, user: UserId) -> Result<Option<Notice>, CommandError> {
    if !session.pause() {
        return Err(CommandError::InvalidState);
    }
    Ok(Some(Notice::Paused { by: user }))
}

fn resume(session: &SessionController, user: UserId) -> Result<Option<Notice>, CommandError> {
    if !session.resume() {
        return Err(CommandError::InvalidState);
    }
    Ok(Some(Notice::Resumed { by: user }))
}

/// Resolves requests against the session registry.
#[derive(Clone)]
pub struct CommandRouter {
    registry: Arc<SessionRegistry>,
    config: Arc<Config>,
}

impl CommandRouter {
    pub fn new(registry: Arc<SessionRegistry>, config: Arc<Config>) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub async fn dispatch(&self, request: ControlRequest) -> Result<Option<Notice>, CommandError> {
        let session = self
            .registry
            .get(&request.room_id)
            .ok_or_else(|| CommandError::NoSession(request.room_id.clone()))?;
        execute(&session, request.user_id, request.command).await
    }

    /// Queues `tracks` in `room_id`, creating the session with `parts` if the
    /// room has none.
    ///
    /// A session found in the registry may be tearing down concurrently; in
    /// that case it is evicted and a fresh one is created once.
    pub async fn play<F>(
        &self,
        room_id: RoomId,
        user_id: UserId,
        tracks: Vec<Track>,
        parts: F,
    ) -> Result<Arc<SessionController>, CommandError>
    where
        F: Fn() -> SessionParts,
    {
        let mut retried = false;
        loop {
            let session = self.registry.get_or_insert_with(&room_id, || {
                info!("[{}] Creating session", room_id);
                SessionController::new(
                    room_id.clone(),
                    parts(),
                    self.config.clone(),
                    self.registry.clone(),
                )
            });

            if !session.can_control(user_id) {
                return Err(CommandError::PermissionDenied);
            }

            match session.enqueue(tracks.clone()).await {
                Ok(()) => return Ok(session),
                Err(CommandError::NoSession(_)) if !retried => {
                    debug!("[{}] Session was tearing down, recreating", room_id);
                    self.registry.evict(&room_id, &session);
                    retried = true;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{loopback::LoopbackRig, voice::VoiceConnection};

    async fn settle() {
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
    }

    fn request(rig: &LoopbackRig, user: u64, command: Command) -> ControlRequest {
        ControlRequest {
            room_id: rig.room_id.clone(),
            user_id: UserId(user),
            command,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn missing_session_is_reported() {
        let rig = LoopbackRig::new(Config::default());
        let result = rig.router.dispatch(request(&rig, 7, Command::Skip)).await;
        assert_eq!(result, Err(CommandError::NoSession(rig.room_id.clone())));
    }

    #[tokio::test(start_paused = true)]
    async fn play_creates_the_session_once() {
        let rig = LoopbackRig::new(Config::default());
        let first = rig
            .router
            .play(rig.room_id.clone(), UserId(7), vec![rig.track("a", Some(60))], || rig.parts())
            .await
            .expect("play");
        let second = rig
            .router
            .play(rig.room_id.clone(), UserId(7), vec![rig.track("b", Some(60))], || rig.parts())
            .await
            .expect("play");
        settle().await;

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(rig.registry.len(), 1);
        let titles: Vec<_> = first.queue_snapshot().into_iter().map(|t| t.title).collect();
        assert_eq!(titles, vec!["a", "b"]);
        assert_eq!(rig.player.started_titles(), vec!["a"]);
    }

    #[tokio::test(start_paused = true)]
    async fn play_replaces_a_torn_down_session() {
        let rig = LoopbackRig::new(Config::default());
        let old = rig.session();
        rig.connection.destroy();
        settle().await;
        assert!(old.is_torn_down());

        // Simulate a lookup that raced with the teardown.
        rig.registry.insert(rig.room_id.clone(), old.clone());

        let fresh = rig
            .router
            .play(rig.room_id.clone(), UserId(7), vec![rig.track("a", None)], || rig.parts())
            .await
            .expect("play");
        assert!(!Arc::ptr_eq(&old, &fresh));
        assert!(!fresh.is_torn_down());
    }

    #[tokio::test(start_paused = true)]
    async fn denied_user_changes_nothing() {
        let rig = LoopbackRig::new(Config::default()).with_permissions(|u: UserId| u == UserId(7));
        let session = rig.session();
        session
            .enqueue(vec![rig.track("a", Some(60)), rig.track("b", Some(60))])
            .await
            .expect("enqueue");
        settle().await;

        for command in [
            Command::Skip,
            Command::ToggleLoop,
            Command::Stop,
            Command::SetVolume(10),
            Command::ToggleMute,
        ] {
            let result = rig.router.dispatch(request(&rig, 8, command)).await;
            assert_eq!(result, Err(CommandError::PermissionDenied));
        }
        settle().await;

        assert_eq!(session.queue_snapshot().len(), 2);
        assert!(!session.loop_enabled());
        assert!(!session.muted());
        assert_eq!(session.volume(), 100);
        assert!(!session.is_stopped());
        assert!(rig.channel.messages().iter().all(|m| !m.text().contains("<@8>")));
    }

    #[tokio::test(start_paused = true)]
    async fn successful_commands_post_ephemeral_feedback() {
        let rig = LoopbackRig::new(Config::default());
        let session = rig.session();
        session
            .enqueue(vec![rig.track("a", Some(60))])
            .await
            .expect("enqueue");
        settle().await;
        rig.player.begin_playback();
        settle().await;

        let notice = rig
            .router
            .dispatch(request(&rig, 7, Command::ToggleLoop))
            .await
            .expect("loop");
        assert_eq!(
            notice,
            Some(Notice::Loop {
                by: UserId(7),
                enabled: true
            })
        );
        settle().await;
        assert!(rig.channel.live_texts().contains(&"<@7> loop is now **on**".to_string()));

        tokio::time::sleep(Duration::from_millis(5_001)).await;
        settle().await;
        assert!(!rig.channel.live_texts().contains(&"<@7> loop is now **on**".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn pause_and_resume_follow_player_state() {
        let rig = LoopbackRig::new(Config::default());
        let session = rig.session();

        let result = rig.router.dispatch(request(&rig, 7, Command::Pause)).await;
        assert_eq!(result, Err(CommandError::InvalidState));

        session
            .enqueue(vec![rig.track("a", Some(60))])
            .await
            .expect("enqueue");
        settle().await;
        assert_eq!(session.player_status(), PlayerStatus::Buffering);
        let result = rig
            .router
            .dispatch(request(&rig, 7, Command::TogglePause))
            .await;
        assert_eq!(result, Err(CommandError::InvalidState));
        assert_eq!(session.player_status(), PlayerStatus::Buffering);

        rig.player.begin_playback();
        settle().await;

        rig.router
            .dispatch(request(&rig, 7, Command::TogglePause))
            .await
            .expect("pause");
        assert_eq!(session.player_status(), PlayerStatus::Paused);
        rig.router
            .dispatch(request(&rig, 7, Command::TogglePause))
            .await
            .expect("resume");
        assert_eq!(session.player_status(), PlayerStatus::Playing);
    }

    #[tokio::test(start_paused = true)]
    async fn volume_commands_validate_and_apply() {
        let rig = LoopbackRig::new(Config::default());
        let session = rig.session();
        session
            .enqueue(vec![rig.track("a", Some(60))])
            .await
            .expect("enqueue");
        settle().await;

        let result = rig
            .router
            .dispatch(request(&rig, 7, Command::SetVolume(150)))
            .await;
        assert!(matches!(result, Err(CommandError::InvalidArgument(_))));
        assert_eq!(session.volume(), 100);

        rig.router
            .dispatch(request(&rig, 7, Command::SetVolume(40)))
            .await
            .expect("volume");
        assert_eq!(session.volume(), 40);
        assert_eq!(rig.player.volume_factor(), Some(0.4));

        rig.router
            .dispatch(request(&rig, 7, Command::ToggleMute))
            .await
            .expect("mute");
        assert_eq!(rig.player.volume_factor(), Some(0.0));

        let at_bound = rig
            .router
            .dispatch(request(&rig, 7, Command::StepVolume(100)))
            .await
            .expect("step");
        assert!(at_bound.is_some());
        let clamped = rig
            .router
            .dispatch(request(&rig, 7, Command::StepVolume(10)))
            .await
            .expect("step");
        assert_eq!(clamped, None);
    }
}
