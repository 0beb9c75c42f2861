use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use switchboard_core::message::Message;

/// Ordered message history for one conversation. Mutated only by the turn
/// that owns its conversation; reads return a snapshot.
pub struct ConversationMemory {
    messages: Mutex<Vec<Message>>,
    max_messages: Option<usize>,
}

impl ConversationMemory {
    fn new(max_messages: Option<usize>) -> Self {
        Self { messages: Mutex::new(Vec::new()), max_messages }
    }

    /// Chronological snapshot used to seed the next engine run.
    pub async fn messages(&self) -> Vec<Message> {
        self.messages.lock().await.clone()
    }

    /// Appends one message, evicting the oldest entries when a cap is set.
    pub async fn append(&self, message: Message) {
        let mut messages = self.messages.lock().await;
        messages.push(message);
        if let Some(cap) = self.max_messages {
            while messages.len() > cap {
                messages.remove(0);
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.messages.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.lock().await.is_empty()
    }
}

/// Process-wide store keyed by conversation identifier. Lookup and creation
/// happen under one lock, so concurrent turns for an unseen identifier can
/// never race two handles into existence. Handles are never evicted; the
/// optional per-conversation message cap bounds growth instead.
pub struct ConversationStore {
    conversations: Mutex<HashMap<String, Arc<ConversationMemory>>>,
    max_messages: Option<usize>,
}

impl ConversationStore {
    pub fn new(max_messages: Option<usize>) -> Self {
        Self { conversations: Mutex::new(HashMap::new()), max_messages }
    }

    pub async fn get_or_create(&self, conversation_id: &str) -> Arc<ConversationMemory> {
        let mut conversations = self.conversations.lock().await;
        if let Some(memory) = conversations.get(conversation_id) {
            return Arc::clone(memory);
        }

        let memory = Arc::new(ConversationMemory::new(self.max_messages));
        conversations.insert(conversation_id.to_owned(), Arc::clone(&memory));
        memory
    }

    pub async fn len(&self) -> usize {
        self.conversations.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.conversations.lock().await.is_empty()
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use switchboard_core::message::{Message, Role};

    use super::ConversationStore;

    #[tokio::test]
    async fn distinct_conversations_get_independent_histories() {
        let store = ConversationStore::default();
        let first = store.get_or_create("conv-1").await;
        let second = store.get_or_create("conv-2").await;

        assert!(!Arc::ptr_eq(&first, &second));

        first.append(Message::user("only in conv-1")).await;
        assert_eq!(first.len().await, 1);
        assert!(second.is_empty().await);
    }

    #[tokio::test]
    async fn repeated_lookup_returns_same_handle() {
        let store = ConversationStore::default();
        let first = store.get_or_create("conv-1").await;
        let again = store.get_or_create("conv-1").await;

        assert!(Arc::ptr_eq(&first, &again));

        first.append(Message::assistant("visible through both")).await;
        let messages = again.messages().await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::Assistant);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn insertion_order_is_preserved() {
        let store = ConversationStore::default();
        let memory = store.get_or_create("conv-1").await;

        memory.append(Message::user("first")).await;
        memory.append(Message::assistant("second")).await;
        memory.append(Message::user("third")).await;

        let contents: Vec<String> =
            memory.messages().await.into_iter().map(|message| message.content).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn message_cap_drops_oldest_entries() {
        let store = ConversationStore::new(Some(2));
        let memory = store.get_or_create("conv-1").await;

        memory.append(Message::user("one")).await;
        memory.append(Message::assistant("two")).await;
        memory.append(Message::user("three")).await;

        let contents: Vec<String> =
            memory.messages().await.into_iter().map(|message| message.content).collect();
        assert_eq!(contents, vec!["two", "three"]);
    }
}
