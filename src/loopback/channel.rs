use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{
    common::{AnyResult, UserId},
    display::{DisplayMessage, DisplayPayload, Reaction, TextChannel},
};

pub struct LoopbackChannel {
    bot: UserId,
    messages: Mutex<Vec<Arc<LoopbackMessage>>>,
    failing: AtomicBool,
}

impl LoopbackChannel {
    pub fn new(bot: UserId) -> Arc<Self> {
        Arc::new(Self {
            bot,
            messages: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
        })
    }

    /// Every message sent, deleted ones included, oldest first.
    pub fn messages(&self) -> Vec<Arc<LoopbackMessage>> {
        self.messages.lock().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.messages.lock().iter().map(|m| m.text()).collect()
    }

    /// Texts of messages that have not been deleted.
    pub fn live_texts(&self) -> Vec<String> {
        self.messages
            .lock()
            .iter()
            .filter(|m| !m.is_deleted())
            .map(|m| m.text())
            .collect()
    }

    /// While set, `send` fails.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Release);
    }
}

#[async_trait]
impl TextChannel for LoopbackChannel {
    fn self_user_id(&self) -> UserId {
        self.bot
    }

    async fn send(&self, payload: DisplayPayload) -> AnyResult<Arc<dyn DisplayMessage>> {
        if self.failing.load(Ordering::Acquire) {
            return Err("missing permissions to send messages".into());
        }
        let message = Arc::new(LoopbackMessage::new(payload));
        self.messages.lock().push(message.clone());
        Ok(message as Arc<dyn DisplayMessage>)
    }
}

pub struct LoopbackMessage {
    sent: DisplayPayload,
    edits: Mutex<Vec<DisplayPayload>>,
    deleted: AtomicBool,
    delete_delay: Mutex<Option<Duration>>,
    reactions_added: Mutex<Vec<String>>,
    removed: Mutex<Vec<Reaction>>,
    tx: flume::Sender<Reaction>,
    rx: flume::Receiver<Reaction>,
}

impl LoopbackMessage {
    fn new(sent: DisplayPayload) -> Self {
        let (tx, rx) = flume::unbounded();
        Self {
            sent,
            edits: Mutex::new(Vec::new()),
            deleted: AtomicBool::new(false),
            delete_delay: Mutex::new(None),
            reactions_added: Mutex::new(Vec::new()),
            removed: Mutex::new(Vec::new()),
            tx,
            rx,
        }
    }

    /// Content as originally sent.
    pub fn text(&self) -> String {
        self.sent.content.clone()
    }

    pub fn edits(&self) -> Vec<DisplayPayload> {
        self.edits.lock().clone()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::Acquire)
    }

    /// Emoji added through `react`, in order.
    pub fn reactions_added(&self) -> Vec<String> {
        self.reactions_added.lock().clone()
    }

    pub fn removed(&self) -> Vec<Reaction> {
        self.removed.lock().clone()
    }

    /// Makes `delete` take `delay` before it lands.
    pub fn set_delete_delay(&self, delay: Duration) {
        *self.delete_delay.lock() = Some(delay);
    }

    /// A user adds `emoji` to the message.
    pub fn react_as(&self, user_id: UserId, emoji: &str) {
        let _ = self.tx.send(Reaction {
            emoji: emoji.to_string(),
            user_id,
        });
    }
}

#[async_trait]
impl DisplayMessage for LoopbackMessage {
    async fn edit(&self, payload: DisplayPayload) -> AnyResult<()> {
        if self.is_deleted() {
            return Err("unknown message".into());
        }
        self.edits.lock().push(payload);
        Ok(())
    }

    async fn delete(&self) -> AnyResult<()> {
        let delay = *self.delete_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.deleted.swap(true, Ordering::AcqRel) {
            return Err("unknown message".into());
        }
        Ok(())
    }

    async fn react(&self, emoji: &str) -> AnyResult<()> {
        self.reactions_added.lock().push(emoji.to_string());
        Ok(())
    }

    async fn remove_reaction(&self, reaction: &Reaction) -> AnyResult<()> {
        self.removed.lock().push(reaction.clone());
        Ok(())
    }

    fn reactions(&self) -> flume::Receiver<Reaction> {
        self.rx.clone()
    }
}
