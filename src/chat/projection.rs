use crate::api::models::{Conversation, Participant};

/// Sidebar row: the non-operator side of a conversation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub email: String,
    pub conversation_id: Option<String>,
    /// Filled by the controller from messages it has seen this session.
    pub last_message_preview: Option<String>,
    /// Always false: the backend sends no unread counts and pushes for
    /// other rooms are dropped.
    pub has_unread: bool,
}

impl Customer {
    pub fn from_participant(p: &Participant, conversation_id: Option<String>) -> Self {
        Self {
            id: p.id.clone(),
            name: p.name.clone(),
            email: p.email.clone(),
            conversation_id,
            ..Self::default()
        }
    }

    /// Second line of the sidebar row.
    pub fn subtitle(&self) -> &str {
        self.last_message_preview.as_deref().unwrap_or(&self.email)
    }
}

/// The participant that is not `me`. `None` when `me` is not part of the
/// conversation or nobody else is.
pub fn other_participant<'a>(conversation: &'a Conversation, me: &str) -> Option<&'a Participant> {
    if !conversation.participants.iter().any(|p| p.id == me) {
        return None;
    }
    conversation.participants.iter().find(|p| p.id != me)
}

/// Rebuilds the sidebar from scratch. Without a known identity nothing can
/// be projected and the list is empty for this pass.
pub fn project_customers(conversations: &[Conversation], me: Option<&str>) -> Vec<Customer> {
    let Some(me) = me else {
        return Vec::new();
    };
    conversations
        .iter()
        .filter_map(|c| {
            other_participant(c, me).map(|p| Customer::from_participant(p, Some(c.id.clone())))
        })
        .collect()
}

/// Case-insensitive search over name, email and preview.
pub fn filter_customers<'a>(customers: &'a [Customer], query: &str) -> Vec<&'a Customer> {
    let q = query.trim().to_lowercase();
    if q.is_empty() {
        return customers.iter().collect();
    }
    customers
        .iter()
        .filter(|c| {
            c.name.to_lowercase().contains(&q)
                || c.email.to_lowercase().contains(&q)
                || c.last_message_preview
                    .as_deref()
                    .is_some_and(|p| p.to_lowercase().contains(&q))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person(id: &str, name: &str) -> Participant {
        Participant {
            id: id.into(),
            name: name.into(),
            email: format!("{id}@example.com"),
            role: "user".into(),
        }
    }

    fn conversation(id: &str, a: &str, b: &str) -> Conversation {
        Conversation {
            id: id.into(),
            participants: vec![person(a, a), person(b, b)],
            last_message_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn other_participant_is_symmetric_for_pairs() {
        let c = conversation("c1", "ops", "alice");
        assert_eq!(other_participant(&c, "ops").map(|p| p.id.as_str()), Some("alice"));
        assert_eq!(other_participant(&c, "alice").map(|p| p.id.as_str()), Some("ops"));
        assert!(other_participant(&c, "mallory").is_none());
    }

    #[test]
    fn projection_keeps_backend_order_and_conversation_ids() {
        let convs = vec![
            conversation("c2", "ops", "bob"),
            conversation("c1", "alice", "ops"),
            conversation("c3", "carol", "dave"),
        ];
        let customers = project_customers(&convs, Some("ops"));
        let ids: Vec<_> = customers.iter().map(|c| (c.id.as_str(), c.conversation_id.as_deref())).collect();
        assert_eq!(ids, [("bob", Some("c2")), ("alice", Some("c1"))]);
        assert!(project_customers(&convs, None).is_empty());
    }

    #[test]
    fn search_matches_name_email_and_preview() {
        let mut customers = project_customers(
            &[conversation("c1", "ops", "alice"), conversation("c2", "ops", "bob")],
            Some("ops"),
        );
        customers[1].last_message_preview = Some("Where is my Pizza?".into());
        assert_eq!(filter_customers(&customers, "ALICE").len(), 1);
        assert_eq!(filter_customers(&customers, "pizza")[0].id, "bob");
        assert_eq!(filter_customers(&customers, "example.com").len(), 2);
        assert_eq!(filter_customers(&customers, "  ").len(), 2);
        assert_eq!(customers[0].subtitle(), "alice@example.com");
    }
}
