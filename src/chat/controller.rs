//! Page controller for the staff chat: owns the conversation list, the
//! sidebar projection, the selected thread and the room membership.
//!
//! Network calls run without holding the state lock, so completions can
//! arrive in any order. Every selection bumps a generation counter and a
//! completion whose generation is no longer current is thrown away.

use crate::api::chat::{ChatApi, FileUpload, OutgoingMessage, DEFAULT_LIMIT, DEFAULT_PAGE};
use crate::api::events::{ChannelEvent, RoomChannel};
use crate::api::models::{Conversation, Message, Participant};
use crate::chat::projection::{project_customers, Customer};
use crate::chat::thread::{MessageThread, ThreadRow};
use crate::error::{ApiError, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SelectionState {
    #[default]
    Idle,
    /// `conversation_id` is set once the room is known and joined.
    Resolving { customer_id: String, conversation_id: Option<String>, generation: u64 },
    Active { customer_id: String, conversation_id: String, generation: u64 },
    Failed { customer_id: String, reason: String },
}

impl SelectionState {
    pub fn customer_id(&self) -> Option<&str> {
        match self {
            SelectionState::Idle => None,
            SelectionState::Resolving { customer_id, .. }
            | SelectionState::Active { customer_id, .. }
            | SelectionState::Failed { customer_id, .. } => Some(customer_id),
        }
    }

    pub fn conversation_id(&self) -> Option<&str> {
        match self {
            SelectionState::Active { conversation_id, .. } => Some(conversation_id),
            _ => None,
        }
    }

    /// The joined room, including while its history is still loading.
    pub fn room(&self) -> Option<&str> {
        match self {
            SelectionState::Resolving { conversation_id: Some(id), .. }
            | SelectionState::Active { conversation_id: id, .. } => Some(id),
            _ => None,
        }
    }
}

/// How a selection ended for the caller that started it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectOutcome {
    Active { conversation_id: String },
    /// Another selection started meanwhile; this one's results were dropped.
    Superseded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Transient message for the user (toast, console line).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

#[derive(Default)]
struct ChatState {
    me: Option<Participant>,
    conversations: Vec<Conversation>,
    /// Users picked to start a chat with that have no conversation yet.
    prospects: Vec<Customer>,
    customers: Vec<Customer>,
    selection: SelectionState,
    generation: u64,
    list_generation: u64,
    joined_room: Option<String>,
    thread: MessageThread,
    /// Pushes for the joined room that arrived before its history.
    pending: Vec<Message>,
    /// Last seen message text per conversation id.
    previews: HashMap<String, String>,
    loading: bool,
    notices: Vec<Notice>,
}

impl ChatState {
    fn rebuild_customers(&mut self) {
        let mut customers = project_customers(&self.conversations, self.me.as_ref().map(|p| p.id.as_str()));
        for prospect in &self.prospects {
            if !customers.iter().any(|c| c.id == prospect.id) {
                customers.push(prospect.clone());
            }
        }
        for customer in &mut customers {
            if let Some(preview) = customer.conversation_id.as_ref().and_then(|id| self.previews.get(id)) {
                customer.last_message_preview = Some(preview.clone());
            }
        }
        self.customers = customers;
    }

    fn remember_preview(&mut self, message: &Message) {
        let text = if message.text.trim().is_empty() && message.attachment.is_some() {
            "Attachment".to_string()
        } else {
            message.text.trim().to_string()
        };
        self.previews.insert(message.conversation.clone(), text);
        self.rebuild_customers();
    }

    /// Appends to the visible thread and keeps the sidebar preview current.
    fn append(&mut self, message: Message) -> bool {
        let preview = message.clone();
        if !self.thread.append(message) {
            return false;
        }
        self.remember_preview(&preview);
        true
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    fn notify(&mut self, level: NoticeLevel, text: impl Into<String>) {
        self.notices.push(Notice { level, text: text.into() });
    }
}

pub struct ChatController<A: ChatApi + ?Sized, R: RoomChannel> {
    api: Arc<A>,
    channel: R,
    state: Mutex<ChatState>,
}

impl<A: ChatApi + ?Sized, R: RoomChannel> ChatController<A, R> {
    pub fn new(api: Arc<A>, channel: R, me: Option<Participant>) -> Self {
        let state = ChatState { me, ..ChatState::default() };
        Self { api, channel, state: Mutex::new(state) }
    }

    fn state(&self) -> MutexGuard<'_, ChatState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_identity(&self, me: Option<Participant>) {
        let mut st = self.state();
        st.me = me;
        st.rebuild_customers();
    }

    /// Shows conversations from the cache before the network answers.
    pub fn seed_conversations(&self, conversations: Vec<Conversation>) {
        let mut st = self.state();
        if st.conversations.is_empty() {
            st.conversations = conversations;
            st.rebuild_customers();
        }
    }

    /// Fetches the conversation list and rebuilds the sidebar from scratch.
    pub async fn load_conversations(&self) -> Result<()> {
        let generation = {
            let mut st = self.state();
            st.list_generation += 1;
            st.list_generation
        };
        let result = self.api.list_conversations().await;
        let mut st = self.state();
        if st.list_generation != generation {
            log::debug!("dropping stale conversation list");
            return Ok(());
        }
        match result {
            Ok(conversations) => {
                log::debug!("loaded {} conversations", conversations.len());
                st.conversations = conversations;
                st.rebuild_customers();
                Ok(())
            }
            Err(e) => {
                st.notify(NoticeLevel::Error, "Failed to load conversations");
                Err(e)
            }
        }
    }

    /// Adds a user to the sidebar so a conversation can be started with them.
    pub fn add_prospect(&self, customer: Customer) {
        let mut st = self.state();
        if st.customers.iter().any(|c| c.id == customer.id) {
            return;
        }
        st.prospects.push(Customer { conversation_id: None, ..customer });
        st.rebuild_customers();
    }

    /// Idle/Active -> Resolving -> Active. Creates the conversation first
    /// when the customer has none.
    pub async fn select_customer(&self, customer_id: &str) -> Result<SelectOutcome> {
        let (generation, customer) = {
            let mut st = self.state();
            let customer = st
                .customers
                .iter()
                .find(|c| c.id == customer_id)
                .cloned()
                .ok_or_else(|| ApiError::validation("Unknown customer"))?;
            st.generation += 1;
            let generation = st.generation;
            if let Some(room) = st.joined_room.take() {
                self.channel.leave(&room);
            }
            st.selection =
                SelectionState::Resolving { customer_id: customer.id.clone(), conversation_id: None, generation };
            st.thread.clear();
            st.pending.clear();
            st.loading = true;
            (generation, customer)
        };

        let conversation_id = match &customer.conversation_id {
            Some(id) => id.clone(),
            None => match self.api.get_or_create_conversation(&customer.id).await {
                Ok(conversation) => {
                    let id = conversation.id.clone();
                    let mut st = self.state();
                    if !st.conversations.iter().any(|c| c.id == id) {
                        st.conversations.insert(0, conversation);
                    }
                    if let Some(p) = st.prospects.iter_mut().find(|p| p.id == customer.id) {
                        p.conversation_id = Some(id.clone());
                    }
                    st.rebuild_customers();
                    st.notify(NoticeLevel::Info, format!("Started a conversation with {}", customer.name));
                    id
                }
                Err(e) => return self.fail(generation, &customer.id, "Failed to open conversation", e),
            },
        };

        {
            let mut st = self.state();
            if !st.is_current(generation) {
                return Ok(SelectOutcome::Superseded);
            }
            self.channel.join(&conversation_id);
            st.joined_room = Some(conversation_id.clone());
            st.selection = SelectionState::Resolving {
                customer_id: customer.id.clone(),
                conversation_id: Some(conversation_id.clone()),
                generation,
            };
        }

        let messages = match self.api.get_messages(&conversation_id, DEFAULT_PAGE, DEFAULT_LIMIT).await {
            Ok(messages) => messages,
            Err(e) => return self.fail(generation, &customer.id, "Failed to load messages", e),
        };

        {
            let mut st = self.state();
            if !st.is_current(generation) {
                log::debug!("dropping messages of superseded selection {conversation_id}");
                return Ok(SelectOutcome::Superseded);
            }
            st.thread.replace(messages);
            for pushed in std::mem::take(&mut st.pending) {
                st.thread.append(pushed);
            }
            if let Some(last) = st.thread.messages().last().cloned() {
                st.remember_preview(&last);
            }
            st.loading = false;
            st.selection = SelectionState::Active {
                customer_id: customer.id.clone(),
                conversation_id: conversation_id.clone(),
                generation,
            };
        }

        if let Err(e) = self.api.mark_read(&conversation_id).await {
            log::warn!("mark read failed for {conversation_id}: {e}");
            self.state().notify(NoticeLevel::Error, "Failed to mark conversation as read");
        }
        Ok(SelectOutcome::Active { conversation_id })
    }

    fn fail(&self, generation: u64, customer_id: &str, text: &str, e: ApiError) -> Result<SelectOutcome> {
        log::warn!("{text}: {e}");
        let mut st = self.state();
        if !st.is_current(generation) {
            return Ok(SelectOutcome::Superseded);
        }
        st.loading = false;
        st.pending.clear();
        st.selection = SelectionState::Failed { customer_id: customer_id.to_string(), reason: e.to_string() };
        st.notify(NoticeLevel::Error, text);
        Err(e)
    }

    /// Posts a message to the active conversation and appends the stored
    /// copy the backend returns.
    pub async fn send(&self, text: &str, file: Option<FileUpload>) -> Result<Message> {
        let (generation, conversation_id, receiver_id) = {
            let st = self.state();
            match &st.selection {
                SelectionState::Active { customer_id, conversation_id, generation } => {
                    (*generation, conversation_id.clone(), customer_id.clone())
                }
                _ => return Err(ApiError::validation("Select a conversation first")),
            }
        };
        let text = text.trim();
        if text.is_empty() && file.is_none() {
            return Err(ApiError::validation("Message is empty"));
        }

        let outgoing = OutgoingMessage { text: text.to_string(), receiver_id, file };
        match self.api.send_message(&conversation_id, outgoing).await {
            Ok(message) => {
                let mut st = self.state();
                if st.is_current(generation) {
                    st.append(message.clone());
                }
                Ok(message)
            }
            Err(e) => {
                log::warn!("send to {conversation_id} failed: {e}");
                self.state().notify(NoticeLevel::Error, "Failed to send message");
                Err(e)
            }
        }
    }

    /// Applies a push from the realtime channel. Returns true when the
    /// visible thread changed.
    pub fn handle_event(&self, event: ChannelEvent) -> bool {
        match event {
            ChannelEvent::Messages(batch) => {
                let Some(message) = batch.into_iter().next() else {
                    return false;
                };
                let mut st = self.state();
                if st.selection.room() != Some(message.conversation.as_str()) {
                    log::debug!("push for inactive room {}", message.conversation);
                    return false;
                }
                if st.selection.conversation_id().is_none() {
                    // history still loading; merged once it arrives
                    if !st.pending.iter().any(|m| m.id == message.id) {
                        st.pending.push(message);
                    }
                    return false;
                }
                st.append(message)
            }
            ChannelEvent::Connected => {
                log::debug!("realtime channel ready");
                false
            }
            ChannelEvent::Disconnected(reason) => {
                log::info!("realtime channel gone: {}", reason.unwrap_or_else(|| "closed".into()));
                false
            }
        }
    }

    /// Leaves the joined room; called when the page goes away.
    pub fn close(&self) {
        if let Some(room) = self.state().joined_room.take() {
            self.channel.leave(&room);
        }
    }

    pub fn me(&self) -> Option<Participant> {
        self.state().me.clone()
    }

    pub fn conversations(&self) -> Vec<Conversation> {
        self.state().conversations.clone()
    }

    pub fn customers(&self) -> Vec<Customer> {
        self.state().customers.clone()
    }

    pub fn selection(&self) -> SelectionState {
        self.state().selection.clone()
    }

    pub fn selected_customer(&self) -> Option<Customer> {
        let st = self.state();
        let id = st.selection.customer_id()?;
        st.customers.iter().find(|c| c.id == id).cloned()
    }

    pub fn joined_room(&self) -> Option<String> {
        self.state().joined_room.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state().loading
    }

    pub fn messages(&self) -> Vec<Message> {
        self.state().thread.messages().to_vec()
    }

    pub fn rows(&self) -> Vec<ThreadRow> {
        let st = self.state();
        let me = st.me.as_ref().map(|p| p.id.as_str()).unwrap_or_default();
        st.thread.rows(me)
    }

    pub fn take_scroll_request(&self) -> bool {
        self.state().thread.take_scroll_request()
    }

    pub fn take_notices(&self) -> Vec<Notice> {
        std::mem::take(&mut self.state().notices)
    }
}
