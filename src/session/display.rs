use std::sync::Arc;

use tracing::{debug, error, warn};

use super::SessionController;
use crate::{
    commands::{self, Command},
    common::CommandError,
    display::{Control, DisplayMessage, DisplayPayload, Notice, Reaction, post_notice},
    track::Track,
};

impl SessionController {
    fn render(&self) -> DisplayPayload {
        let queue = self.queue_snapshot();
        let now_playing = self.engine.current_info();
        self.renderer.render(now_playing.as_ref(), &queue)
    }

    /// Publishes the now-playing message for `track` and re-arms the
    /// reaction collector for its duration.
    ///
    /// The first call of a session sends the message and adds the control
    /// reactions; later calls edit it in place.
    pub(crate) async fn show_now_playing(self: &Arc<Self>, track: Track) {
        let mut display = self.display.lock().await;
        if self.is_stopped() {
            return;
        }

        let payload = self.render();
        let message = match display.as_ref() {
            Some(message) => {
                if let Err(e) = message.edit(payload).await {
                    warn!("[{}] Failed to edit now-playing message: {}", self.room_id, e);
                }
                message.clone()
            }
            None => match self.channel.send(payload).await {
                Ok(message) => {
                    *display = Some(message.clone());
                    for control in Control::ALL {
                        if let Err(e) = message.react(control.emoji()).await {
                            warn!(
                                "[{}] Failed to add {} control: {}",
                                self.room_id,
                                control.emoji(),
                                e
                            );
                        }
                    }
                    message
                }
                Err(e) => {
                    error!("[{}] Failed to send now-playing message: {}", self.room_id, e);
                    post_notice(self.channel.clone(), Notice::Failure(e.to_string()));
                    return;
                }
            },
        };

        self.arm_collector(message, &track);
    }

    /// Re-renders the now-playing message, if there is one.
    pub async fn edit_display(&self) {
        let display = self.display.lock().await;
        let Some(message) = display.as_ref() else {
            return;
        };
        if let Err(e) = message.edit(self.render()).await {
            warn!("[{}] Failed to edit now-playing message: {}", self.room_id, e);
        }
    }

    pub(super) async fn close_display(&self) {
        let message = self.display.lock().await.take();
        self.cancel_collector();
        if let Some(message) = message {
            if let Err(e) = message.delete().await {
                warn!("[{}] Failed to delete now-playing message: {}", self.room_id, e);
            }
        }
    }

    pub(super) fn cancel_collector(&self) {
        if let Some(token) = self.collector.lock().take() {
            token.cancel();
        }
    }

    /// Listens for control reactions on `message` until `track`'s duration
    /// (or the fallback window) elapses, replacing any previous collector.
    fn arm_collector(self: &Arc<Self>, message: Arc<dyn DisplayMessage>, track: &Track) {
        let window = self.config.controls.listening_window(track.duration());
        let token = self.cancel.child_token();
        if let Some(previous) = self.collector.lock().replace(token.clone()) {
            previous.cancel();
        }

        let reactions = message.reactions();
        // Reactions made while nobody was listening are not replayed.
        let stale = reactions.drain().count();
        if stale > 0 {
            debug!("[{}] Discarded {} stale reactions", self.room_id, stale);
        }

        let bot = self.channel.self_user_id();
        let weak = Arc::downgrade(self);
        let room_id = self.room_id.clone();
        debug!(
            "[{}] Collecting reactions for '{}' for {:?}",
            room_id,
            track.title(),
            window
        );

        tokio::spawn(async move {
            let deadline = tokio::time::sleep(window);
            tokio::pin!(deadline);
            loop {
                let reaction = tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = &mut deadline => {
                        debug!("[{}] Reaction window closed", room_id);
                        break;
                    }
                    received = reactions.recv_async() => match received {
                        Ok(reaction) => reaction,
                        Err(_) => break,
                    },
                };
                if reaction.user_id == bot {
                    continue;
                }
                let Some(session) = weak.upgrade() else {
                    break;
                };
                if !session.handle_reaction(&message, reaction).await {
                    token.cancel();
                    break;
                }
            }
        });
    }

    /// Runs the control behind a reaction and removes the reaction. Returns
    /// false when the collector should end.
    async fn handle_reaction(
        self: &Arc<Self>,
        message: &Arc<dyn DisplayMessage>,
        reaction: Reaction,
    ) -> bool {
        {
            let message = message.clone();
            let reaction = reaction.clone();
            let room_id = self.room_id.clone();
            tokio::spawn(async move {
                if let Err(e) = message.remove_reaction(&reaction).await {
                    warn!("[{}] Failed to remove reaction: {}", room_id, e);
                }
            });
        }

        let Some(control) = Control::from_emoji(&reaction.emoji) else {
            return true;
        };
        let step = i32::from(self.config.controls.volume_step);
        let command = match control {
            Control::Skip => Command::Skip,
            Control::PlayPause => Command::TogglePause,
            Control::Mute => Command::ToggleMute,
            Control::VolumeDown => Command::StepVolume(-step),
            Control::VolumeUp => Command::StepVolume(step),
            Control::Loop => Command::ToggleLoop,
            Control::Shuffle => Command::Shuffle,
            Control::Stop => Command::Stop,
        };

        match commands::execute(self, reaction.user_id, command).await {
            Ok(_) => control != Control::Stop,
            Err(CommandError::NoSession(_)) => false,
            Err(e) => {
                debug!(
                    "[{}] {} from {} ignored: {}",
                    self.room_id, reaction.emoji, reaction.user_id, e
                );
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::{
        common::UserId,
        configs::Config,
        display::Control,
        loopback::LoopbackRig,
        player::PlayerStatus,
    };

    async fn settle() {
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
    }

    const LISTENER: UserId = UserId(7);

    #[tokio::test(start_paused = true)]
    async fn first_track_sends_display_later_tracks_edit_it() {
        let rig = LoopbackRig::new(Config::default());
        let session = rig.session();
        session
            .enqueue(vec![rig.track("A", Some(60)), rig.track("B", Some(60))])
            .await
            .expect("enqueue");
        settle().await;
        rig.player.begin_playback();
        settle().await;

        let messages = rig.channel.messages();
        assert_eq!(messages.len(), 1);
        let display = messages[0].clone();
        let emojis: Vec<_> = Control::ALL.iter().map(|c| c.emoji().to_string()).collect();
        assert_eq!(display.reactions_added(), emojis);
        assert_eq!(display.text(), "🎶 A\n🎶 B\n");

        rig.player.finish();
        settle().await;
        rig.player.begin_playback();
        settle().await;

        assert_eq!(rig.channel.messages().len(), 1);
        assert_eq!(display.edits().last().map(|p| p.content.as_str()), Some("🎶 B\n"));
        assert_eq!(display.edits().last().map(|p| p.embeds[0]["title"].clone()), Some("B".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn enqueue_and_shuffle_refresh_the_display() {
        let rig = LoopbackRig::new(Config::default());
        let session = rig.session();
        session
            .enqueue(vec![rig.track("A", Some(60))])
            .await
            .expect("enqueue");
        settle().await;
        rig.player.begin_playback();
        settle().await;
        let display = rig.channel.messages()[0].clone();

        session
            .enqueue(vec![rig.track("B", Some(60)), rig.track("C", Some(60))])
            .await
            .expect("enqueue");
        assert_eq!(display.edits().len(), 1);
        assert_eq!(display.edits()[0].content, "🎶 A\n🎶 B\n🎶 C\n");

        session.shuffle().await;
        assert_eq!(display.edits().len(), 2);
        assert!(display.edits()[1].content.starts_with("🎶 A\n"));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_deletes_the_display() {
        let rig = LoopbackRig::new(Config::default());
        let session = rig.session();
        session
            .enqueue(vec![rig.track("A", Some(60))])
            .await
            .expect("enqueue");
        settle().await;
        rig.player.begin_playback();
        settle().await;
        let display = rig.channel.messages()[0].clone();

        display.react_as(LISTENER, Control::Stop.emoji());
        settle().await;

        assert!(display.is_deleted());
        assert!(session.is_stopped());
        assert!(rig.channel.texts().contains(&"<@7> ⏹ stopped the music!".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_send_reports_and_skips_controls() {
        let rig = LoopbackRig::new(Config::default());
        let session = rig.session();
        session
            .enqueue(vec![rig.track("A", Some(60))])
            .await
            .expect("enqueue");
        settle().await;

        rig.channel.set_failing(true);
        rig.player.begin_playback();
        settle().await;
        rig.channel.set_failing(false);
        settle().await;

        assert!(rig.channel.messages().is_empty());
        assert_eq!(session.player_status(), PlayerStatus::Playing);
    }

    #[tokio::test(start_paused = true)]
    async fn volume_reactions_step_and_clamp() {
        let mut config = Config::default();
        config.player.default_volume = 50;
        let rig = LoopbackRig::new(config);
        let session = rig.session();
        session
            .enqueue(vec![rig.track("A", Some(600))])
            .await
            .expect("enqueue");
        settle().await;
        rig.player.begin_playback();
        settle().await;
        let display = rig.channel.messages()[0].clone();

        let mut seen = Vec::new();
        for _ in 0..6 {
            display.react_as(LISTENER, Control::VolumeUp.emoji());
            settle().await;
            seen.push(session.volume());
        }
        assert_eq!(seen, vec![60, 70, 80, 90, 100, 100]);
        assert_eq!(rig.player.volume_factor(), Some(1.0));

        seen.clear();
        for _ in 0..11 {
            display.react_as(LISTENER, Control::VolumeDown.emoji());
            settle().await;
            seen.push(session.volume());
        }
        assert_eq!(seen, vec![90, 80, 70, 60, 50, 40, 30, 20, 10, 0, 0]);
        assert_eq!(rig.player.volume_factor(), Some(0.0));

        // Every reaction is consumed, including the clamped ones.
        assert_eq!(display.removed().len(), 17);
    }

    #[tokio::test(start_paused = true)]
    async fn reactions_map_to_controls() {
        let rig = LoopbackRig::new(Config::default());
        let session = rig.session();
        session
            .enqueue(vec![rig.track("A", Some(600)), rig.track("B", Some(600))])
            .await
            .expect("enqueue");
        settle().await;
        rig.player.begin_playback();
        settle().await;
        let display = rig.channel.messages()[0].clone();

        display.react_as(LISTENER, Control::PlayPause.emoji());
        settle().await;
        assert_eq!(session.player_status(), PlayerStatus::Paused);
        display.react_as(LISTENER, Control::PlayPause.emoji());
        settle().await;
        assert_eq!(session.player_status(), PlayerStatus::Playing);

        display.react_as(LISTENER, Control::Mute.emoji());
        settle().await;
        assert!(session.muted());
        display.react_as(LISTENER, Control::Loop.emoji());
        settle().await;
        assert!(session.loop_enabled());

        display.react_as(LISTENER, Control::Skip.emoji());
        settle().await;
        assert_eq!(session.now_playing().map(|t| t.title).as_deref(), Some("B"));
        assert_eq!(
            session.queue_snapshot().into_iter().map(|t| t.title).collect::<Vec<_>>(),
            vec!["B", "A"]
        );

        display.react_as(LISTENER, "👍");
        settle().await;
        assert_eq!(display.removed().len(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn bot_reactions_are_ignored() {
        let rig = LoopbackRig::new(Config::default());
        let session = rig.session();
        session
            .enqueue(vec![rig.track("A", Some(600))])
            .await
            .expect("enqueue");
        settle().await;
        rig.player.begin_playback();
        settle().await;
        let display = rig.channel.messages()[0].clone();

        display.react_as(rig.bot, Control::Stop.emoji());
        settle().await;

        assert!(!session.is_stopped());
        assert!(display.removed().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn denied_reactions_are_removed_without_effect() {
        let rig = LoopbackRig::new(Config::default()).with_permissions(|u: UserId| u == LISTENER);
        let session = rig.session();
        session
            .enqueue(vec![rig.track("A", Some(600))])
            .await
            .expect("enqueue");
        settle().await;
        rig.player.begin_playback();
        settle().await;
        let display = rig.channel.messages()[0].clone();

        display.react_as(UserId(8), Control::Mute.emoji());
        display.react_as(UserId(8), Control::Stop.emoji());
        settle().await;
        assert!(!session.muted());
        assert!(!session.is_stopped());
        assert_eq!(display.removed().len(), 2);

        display.react_as(LISTENER, Control::Mute.emoji());
        settle().await;
        assert!(session.muted());
    }

    #[tokio::test(start_paused = true)]
    async fn window_expires_with_the_track() {
        let rig = LoopbackRig::new(Config::default());
        let session = rig.session();
        session
            .enqueue(vec![rig.track("A", Some(3))])
            .await
            .expect("enqueue");
        settle().await;
        rig.player.begin_playback();
        settle().await;
        let display = rig.channel.messages()[0].clone();

        tokio::time::sleep(Duration::from_secs(4)).await;
        display.react_as(LISTENER, Control::Mute.emoji());
        settle().await;

        assert!(!session.muted());
        assert!(display.removed().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn collector_is_rearmed_for_each_track() {
        let rig = LoopbackRig::new(Config::default());
        let session = rig.session();
        session
            .enqueue(vec![rig.track("A", Some(3)), rig.track("B", Some(100))])
            .await
            .expect("enqueue");
        settle().await;
        rig.player.begin_playback();
        settle().await;
        let display = rig.channel.messages()[0].clone();

        rig.player.finish();
        settle().await;
        rig.player.begin_playback();
        settle().await;

        tokio::time::sleep(Duration::from_secs(10)).await;
        display.react_as(LISTENER, Control::Mute.emoji());
        settle().await;
        assert!(session.muted());

        tokio::time::sleep(Duration::from_secs(91)).await;
        display.react_as(LISTENER, Control::Mute.emoji());
        settle().await;
        assert!(session.muted());
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_duration_uses_fallback_window() {
        let rig = LoopbackRig::new(Config::default());
        let session = rig.session();
        session
            .enqueue(vec![rig.track("live", None)])
            .await
            .expect("enqueue");
        settle().await;
        rig.player.begin_playback();
        settle().await;
        let display = rig.channel.messages()[0].clone();

        tokio::time::sleep(Duration::from_secs(599)).await;
        display.react_as(LISTENER, Control::Mute.emoji());
        settle().await;
        assert!(session.muted());

        tokio::time::sleep(Duration::from_secs(2)).await;
        display.react_as(LISTENER, Control::Mute.emoji());
        settle().await;
        assert!(session.muted());
    }
}
