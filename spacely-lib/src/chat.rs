use crate::address::Address;
use crate::contracts::{chat, u64_arg, Contracts, EntryFunctionPayload};
use crate::decode::{de_opt_id, de_u64, first_vec};
use crate::error::{Error, ErrorKind};
use crate::indexer::Indexer;
use crate::poller::{Poller, Subscription};
use crate::RunState;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tokio::sync::watch;

pub const MESSAGE_MAX: usize = 500;

/// How many messages to ask the indexer for when the chain read fails
pub const INDEXER_CONVERSATION_LIMIT: u32 = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectMessage {
    #[serde(default, deserialize_with = "de_opt_id")]
    pub id: Option<String>,
    pub sender: Address,
    #[serde(default)]
    pub sender_username: String,
    pub recipient: Address,
    pub content: String,
    #[serde(deserialize_with = "de_u64")]
    pub timestamp: u64,
}

impl DirectMessage {
    pub fn is_from(&self, who: &Address) -> bool {
        &self.sender == who
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunityMessage {
    #[serde(default, deserialize_with = "de_opt_id")]
    pub id: Option<String>,
    pub sender: Address,
    #[serde(default)]
    pub sender_username: String,
    pub content: String,
    #[serde(default)]
    pub is_anonymous: bool,
    #[serde(deserialize_with = "de_u64")]
    pub timestamp: u64,
}

impl CommunityMessage {
    pub fn author(&self) -> String {
        if self.is_anonymous {
            "Anonymous".to_owned()
        } else if !self.sender_username.is_empty() {
            self.sender_username.clone()
        } else {
            self.sender.short()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub other_party: Address,
    #[serde(default)]
    pub other_party_username: String,
    #[serde(deserialize_with = "de_u64")]
    pub last_message_timestamp: u64,
    #[serde(default, deserialize_with = "de_u64")]
    pub unread_count: u64,
}

/// Messages are shown oldest first
pub fn sort_oldest_first(messages: &mut [DirectMessage]) {
    messages.sort_by_key(|m| m.timestamp);
}

/// Message text must have something in it and fit in 500 characters
pub fn validate_message(text: &str) -> Result<&str, Error> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ErrorKind::InvalidMessage("Please enter a message".to_owned()).into());
    }
    if text.chars().count() > MESSAGE_MAX {
        return Err(ErrorKind::InvalidMessage(format!(
            "Message is too long (max {} characters)",
            MESSAGE_MAX
        ))
        .into());
    }
    Ok(text)
}

impl Contracts {
    /// Messages between two accounts, oldest first
    pub async fn get_conversation(
        &self,
        me: &Address,
        other: &Address,
    ) -> Result<Vec<DirectMessage>, Error> {
        let r = self
            .view(
                chat::GET_CONVERSATION,
                vec![json!(me.as_str()), json!(other.as_str())],
            )
            .await?;
        let mut messages: Vec<DirectMessage> = first_vec(&r.into_inner())?;
        sort_oldest_first(&mut messages);
        Ok(messages)
    }

    pub async fn get_conversations(
        &self,
        user: &Address,
    ) -> Result<Vec<ConversationSummary>, Error> {
        let r = self
            .view(chat::GET_CONVERSATIONS, vec![json!(user.as_str())])
            .await?;
        first_vec(&r.into_inner())
    }

    pub async fn get_direct_messages(&self, user: &Address) -> Result<Vec<DirectMessage>, Error> {
        let r = self
            .view(chat::GET_DIRECT_MESSAGES, vec![json!(user.as_str())])
            .await?;
        let mut messages: Vec<DirectMessage> = first_vec(&r.into_inner())?;
        sort_oldest_first(&mut messages);
        Ok(messages)
    }

    pub async fn get_unread_count(&self, user: &Address) -> Result<u64, Error> {
        self.view(chat::GET_UNREAD_COUNT, vec![json!(user.as_str())])
            .await?
            .u64(0)
    }

    pub async fn has_inbox(&self, user: &Address) -> Result<bool, Error> {
        self.view(chat::HAS_INBOX, vec![json!(user.as_str())])
            .await?
            .bool(0)
    }

    pub async fn get_message_count(&self) -> Result<u64, Error> {
        self.view(chat::GET_MESSAGE_COUNT, vec![]).await?.u64(0)
    }

    pub async fn get_recent_messages(&self, limit: u64) -> Result<Vec<CommunityMessage>, Error> {
        let r = self
            .view(chat::GET_RECENT_MESSAGES, vec![u64_arg(limit)])
            .await?;
        first_vec(&r.into_inner())
    }

    pub async fn get_all_messages(&self) -> Result<Vec<CommunityMessage>, Error> {
        let r = self.view(chat::GET_ALL_MESSAGES, vec![]).await?;
        first_vec(&r.into_inner())
    }

    pub fn post_message_payload(&self, text: &str) -> Result<EntryFunctionPayload, Error> {
        let text = validate_message(text)?;
        Ok(self.payload(chat::POST_MESSAGE, vec![json!(text)]))
    }

    pub fn post_anonymous_payload(&self, text: &str) -> Result<EntryFunctionPayload, Error> {
        let text = validate_message(text)?;
        Ok(self.payload(chat::POST_ANONYMOUS, vec![json!(text)]))
    }

    pub fn send_direct_message_payload(
        &self,
        recipient: &Address,
        text: &str,
    ) -> Result<EntryFunctionPayload, Error> {
        let text = validate_message(text)?;
        Ok(self.payload(
            chat::SEND_DIRECT_MESSAGE,
            vec![json!(recipient.as_str()), json!(text)],
        ))
    }

    pub fn mark_conversation_read_payload(&self, other: &Address) -> EntryFunctionPayload {
        self.payload(chat::MARK_CONVERSATION_READ, vec![json!(other.as_str())])
    }

    pub fn initialize_inbox_payload(&self) -> EntryFunctionPayload {
        self.payload(chat::INITIALIZE_INBOX, vec![])
    }
}

/// Read a conversation from the chain, falling back to the indexer if the
/// chain read fails and an indexer is configured.
pub async fn load_conversation(
    contracts: &Contracts,
    indexer: Option<&Indexer>,
    me: &Address,
    other: &Address,
) -> Result<Vec<DirectMessage>, Error> {
    match contracts.get_conversation(me, other).await {
        Ok(messages) => Ok(messages),
        Err(e) => {
            let Some(indexer) = indexer else {
                return Err(e);
            };
            tracing::warn!("Conversation view failed ({}), trying the indexer", e);
            match indexer
                .direct_messages(me, other, INDEXER_CONVERSATION_LIMIT)
                .await
            {
                Some(mut messages) => {
                    sort_oldest_first(&mut messages);
                    Ok(messages)
                }
                None => Err(e),
            }
        }
    }
}

/// Polled conversations and conversation lists
#[derive(Clone)]
pub struct Chat {
    conversations: Poller<(Address, Address), Vec<DirectMessage>>,
    inboxes: Poller<Address, Vec<ConversationSummary>>,
}

impl Chat {
    pub fn new(
        contracts: Contracts,
        indexer: Option<Indexer>,
        messages_interval: Duration,
        conversations_interval: Duration,
        runstate: watch::Receiver<RunState>,
    ) -> Chat {
        let c = contracts.clone();
        let conversations = Poller::with_shutdown(
            "conversation",
            messages_interval,
            move |(me, other): (Address, Address)| {
                let contracts = c.clone();
                let indexer = indexer.clone();
                async move { load_conversation(&contracts, indexer.as_ref(), &me, &other).await }
            },
            runstate.clone(),
        );

        let inboxes = Poller::with_shutdown(
            "conversations",
            conversations_interval,
            move |user: Address| {
                let contracts = contracts.clone();
                async move { contracts.get_conversations(&user).await }
            },
            runstate,
        );

        Chat {
            conversations,
            inboxes,
        }
    }

    pub fn watch_conversation(
        &self,
        me: Address,
        other: Address,
    ) -> Subscription<(Address, Address), Vec<DirectMessage>> {
        self.conversations.subscribe((me, other))
    }

    pub fn watch_conversations(&self, user: Address) -> Subscription<Address, Vec<ConversationSummary>> {
        self.inboxes.subscribe(user)
    }

    /// Re-read a conversation now, e.g. right after sending into it
    pub fn refresh_conversation(&self, me: &Address, other: &Address) {
        self.conversations.refresh(&(me.clone(), other.clone()));
        self.inboxes.refresh(me);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::indexer::test::MockGraphql;
    use crate::people::test::{alice, MockChain};
    use serde_json::Value;
    use std::sync::Arc;

    fn bob() -> Address {
        Address::try_from_chain("0xb0b").unwrap()
    }

    fn conversation_json() -> Value {
        json!([
            {"sender": bob().as_str(), "sender_username": "bob", "recipient": alice().as_str(),
             "content": "second", "timestamp": "200", "id": 2},
            {"sender": alice().as_str(), "sender_username": "alice", "recipient": bob().as_str(),
             "content": "first", "timestamp": "100", "id": 1},
        ])
    }

    #[tokio::test]
    async fn test_get_conversation_sorted() {
        let chain = Arc::new(MockChain::default());
        chain.answer("chat::get_conversation", vec![conversation_json()]);
        let messages = chain
            .contracts()
            .get_conversation(&alice(), &bob())
            .await
            .unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "first");
        assert_eq!(messages[0].id.as_deref(), Some("1"));
        assert!(messages[0].is_from(&alice()));
        assert!(!messages[1].is_from(&alice()));
    }

    #[tokio::test]
    async fn test_empty_conversation_shapes() {
        let chain = Arc::new(MockChain::default());
        let contracts = chain.contracts();
        chain.answer("chat::get_conversation", vec![]);
        assert!(contracts.get_conversation(&alice(), &bob()).await.unwrap().is_empty());
        chain.answer("chat::get_conversation", vec![json!({"vec": []})]);
        assert!(contracts.get_conversation(&alice(), &bob()).await.unwrap().is_empty());
        chain.answer("chat::get_conversation", vec![json!("nope")]);
        assert!(contracts.get_conversation(&alice(), &bob()).await.is_err());
    }

    #[tokio::test]
    async fn test_counts() {
        let chain = Arc::new(MockChain::default());
        chain.answer("chat::get_unread_count", vec![json!("3")]);
        chain.answer("chat::has_inbox", vec![json!(true)]);
        chain.answer("chat::get_message_count", vec![json!("41")]);
        let contracts = chain.contracts();
        assert_eq!(contracts.get_unread_count(&alice()).await.unwrap(), 3);
        assert!(contracts.has_inbox(&alice()).await.unwrap());
        assert_eq!(contracts.get_message_count().await.unwrap(), 41);
    }

    #[tokio::test]
    async fn test_recent_messages() {
        let chain = Arc::new(MockChain::default());
        chain.answer(
            "chat::get_recent_messages",
            vec![json!([
                {"sender": bob().as_str(), "sender_username": "bob", "content": "hi",
                 "is_anonymous": true, "timestamp": 5}
            ])],
        );
        let messages = chain.contracts().get_recent_messages(10).await.unwrap();
        assert_eq!(messages[0].author(), "Anonymous");
        assert_eq!(chain.calls.lock()[0].arguments, vec![json!("10")]);
    }

    #[test]
    fn test_validate_message() {
        assert!(validate_message("   ").is_err());
        assert_eq!(validate_message(" hi ").unwrap(), "hi");
        assert!(validate_message(&"a".repeat(500)).is_ok());
        assert!(validate_message(&"a".repeat(501)).is_err());
    }

    #[test]
    fn test_payloads() {
        let contracts = Arc::new(MockChain::default()).contracts();
        let p = contracts.send_direct_message_payload(&bob(), "hello").unwrap();
        assert_eq!(p.function(), "0x1::chat::send_direct_message");
        assert_eq!(p.arguments(), &[json!(bob().as_str()), json!("hello")]);
        assert!(contracts.send_direct_message_payload(&bob(), "").is_err());
        let p = contracts.post_anonymous_payload("psst").unwrap();
        assert_eq!(p.function(), "0x1::chat::post_anonymous");
        assert!(contracts.initialize_inbox_payload().arguments().is_empty());
    }

    #[tokio::test]
    async fn test_indexer_fallback() {
        let chain = Arc::new(MockChain::default());
        chain.reject("chat::get_conversation", 500);
        let graphql = Arc::new(MockGraphql::default());
        graphql.answer(json!({"direct_messages": conversation_json()}));
        let indexer = Indexer::new(graphql.clone());
        let contracts = chain.contracts();

        let messages = load_conversation(&contracts, Some(&indexer), &alice(), &bob())
            .await
            .unwrap();
        assert_eq!(messages[0].content, "first");
        assert_eq!(graphql.calls.lock().len(), 1);

        // Without an indexer the chain error comes through
        let e = load_conversation(&contracts, None, &alice(), &bob())
            .await
            .unwrap_err();
        assert!(matches!(e.kind, ErrorKind::ViewRejected { status: 500, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_conversation() {
        let chain = Arc::new(MockChain::default());
        chain.answer("chat::get_conversation", vec![conversation_json()]);
        let (_write, read) = watch::channel(RunState::Online);
        let chat = Chat::new(
            chain.contracts(),
            None,
            Duration::from_secs(10),
            Duration::from_secs(15),
            read,
        );
        let mut sub = chat.watch_conversation(alice(), bob());
        let polled = sub.changed().await.unwrap();
        assert_eq!(polled.value.unwrap().len(), 2);
    }
}
