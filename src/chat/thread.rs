use crate::api::chat::FileUpload;
use crate::api::models::Message;
use crate::chat::projection::Customer;

#[derive(Debug, Clone, PartialEq)]
pub struct ThreadRow {
    pub id: String,
    pub text: String,
    pub attachment_url: Option<String>,
    pub time_label: String,
    pub own: bool,
}

/// Messages of the selected conversation, in arrival order.
#[derive(Debug, Default, Clone)]
pub struct MessageThread {
    messages: Vec<Message>,
    scroll_pending: bool,
}

impl MessageThread {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&mut self, messages: Vec<Message>) {
        self.messages = messages;
        self.scroll_pending = true;
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.scroll_pending = false;
    }

    /// Appends unless a message with the same id is already shown. Our own
    /// sends come back both from the POST and from the room push.
    pub fn append(&mut self, message: Message) -> bool {
        if self.messages.iter().any(|m| m.id == message.id) {
            return false;
        }
        self.messages.push(message);
        self.scroll_pending = true;
        true
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// True once after the thread grew, so the view can scroll to the end.
    pub fn take_scroll_request(&mut self) -> bool {
        std::mem::take(&mut self.scroll_pending)
    }

    pub fn rows(&self, me: &str) -> Vec<ThreadRow> {
        self.messages
            .iter()
            .map(|m| ThreadRow {
                id: m.id.clone(),
                text: m.text.clone(),
                attachment_url: m.attachment.as_ref().map(|a| a.url.clone()),
                time_label: m.created_at.with_timezone(&chrono::Local).format("%H:%M").to_string(),
                own: m.sender.id() == me,
            })
            .collect()
    }
}

pub fn header(customer: Option<&Customer>, conversation_id: Option<&str>) -> (String, String) {
    match customer {
        Some(c) => (c.name.clone(), c.email.clone()),
        None if conversation_id.is_some() => ("Select a conversation".into(), "Conversation".into()),
        None => ("Select a conversation".into(), "No conversation selected".into()),
    }
}

pub fn empty_hint(loading: bool, active: bool, thread: &MessageThread) -> Option<&'static str> {
    if loading && thread.is_empty() {
        Some("Loading messages...")
    } else if !loading && !active {
        Some("Start by selecting a conversation on the left.")
    } else {
        None
    }
}

/// Draft being typed. Only usable while a conversation is active.
#[derive(Debug, Default, Clone)]
pub struct Composer {
    pub text: String,
    pub file: Option<FileUpload>,
}

impl Composer {
    pub fn placeholder(active: bool) -> &'static str {
        if active {
            "Type your message here..."
        } else {
            "Select a conversation first..."
        }
    }

    pub fn can_send(&self, active: bool) -> bool {
        active && (!self.text.trim().is_empty() || self.file.is_some())
    }

    /// Takes the trimmed text and file, leaving the composer empty.
    pub fn take(&mut self) -> (String, Option<FileUpload>) {
        let draft = std::mem::take(self);
        (draft.text.trim().to_string(), draft.file)
    }
}
