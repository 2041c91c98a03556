//! The GraphQL indexer. It is optional: every query logs its failure and
//! yields `None`, and callers fall back to what they have.

use crate::address::Address;
use crate::chat::{CommunityMessage, ConversationSummary, DirectMessage};
use crate::decode::de_u64;
use crate::error::{Error, ErrorKind};
use crate::people::{Person, Role};
use crate::USER_AGENT;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

const DIRECT_MESSAGES_QUERY: &str = r#"
query GetDirectMessages($sender: String!, $recipient: String!, $limit: Int!) {
    direct_messages(
        where: {
            _or: [
                {sender: {_eq: $sender}, recipient: {_eq: $recipient}},
                {sender: {_eq: $recipient}, recipient: {_eq: $sender}}
            ]
        }
        order_by: [{timestamp: desc}]
        limit: $limit
    ) {
        sender
        recipient
        content
        timestamp
        id
    }
}"#;

const CONVERSATIONS_QUERY: &str = r#"
query GetConversations($userAddress: String!) {
    conversations(
        where: {user_address: {_eq: $userAddress}}
        order_by: [{last_message_timestamp: desc}]
    ) {
        id
        user_address
        other_party
        other_party_username
        last_message_timestamp
        unread_count
    }
}"#;

const RECENT_MESSAGES_QUERY: &str = r#"
query GetRecentMessages($limit: Int!) {
    messages(
        order_by: [{timestamp: desc}]
        limit: $limit
        where: {is_deleted: {_neq: true}}
    ) {
        id
        sender
        sender_username
        content
        is_anonymous
        timestamp
    }
}"#;

const PROFILE_QUERY: &str = r#"
query GetProfile($userAddress: String!) {
    profiles(where: {address: {_eq: $userAddress}}) {
        address
        username
        twitter
        pfp
        sent
        received
        status
    }
}"#;

const TOP_PROFILES_QUERY: &str = r#"
query GetTopProfiles($limit: Int!) {
    profiles(
        order_by: [{received: desc}]
        limit: $limit
    ) {
        address
        username
        twitter
        pfp
        sent
        received
        status
    }
}"#;

/// Runs a GraphQL query and hands back its `data`
#[async_trait]
pub trait GraphqlSource: Send + Sync {
    async fn query(&self, query: &str, variables: Value) -> Result<Value, Error>;
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Option<Vec<GraphqlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

/// GraphQL over HTTP POST
pub struct HttpGraphql {
    client: Client,
    url: url::Url,
    set_user_agent: bool,
}

impl HttpGraphql {
    pub fn new(url: &str, timeout: Duration, set_user_agent: bool) -> Result<HttpGraphql, Error> {
        let client = Client::builder()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .timeout(timeout)
            .build()?;
        Ok(HttpGraphql {
            client,
            url: url::Url::parse(url)?,
            set_user_agent,
        })
    }
}

#[async_trait]
impl GraphqlSource for HttpGraphql {
    async fn query(&self, query: &str, variables: Value) -> Result<Value, Error> {
        let mut req = self
            .client
            .post(self.url.as_str())
            .json(&json!({ "query": query, "variables": variables }));
        if self.set_user_agent {
            req = req.header("User-Agent", USER_AGENT);
        }

        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ErrorKind::Indexer(format!("query failed: {}", status)).into());
        }

        let bytes = response.bytes().await?;
        unwrap_response(&bytes)
    }
}

fn unwrap_response(bytes: &[u8]) -> Result<Value, Error> {
    let response: GraphqlResponse = serde_json::from_slice(bytes)?;
    if let Some(errors) = response.errors {
        let messages: Vec<String> = errors.into_iter().map(|e| e.message).collect();
        return Err(ErrorKind::Indexer(messages.join("; ")).into());
    }
    response
        .data
        .filter(|d| !d.is_null())
        .ok_or_else(|| ErrorKind::Indexer("no data".to_owned()).into())
}

/// A profile row as the indexer has it
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IndexedProfile {
    pub address: Address,
    pub username: String,
    #[serde(default)]
    pub twitter: String,
    #[serde(default)]
    pub pfp: String,
    #[serde(default, deserialize_with = "de_u64")]
    pub sent: u64,
    #[serde(default, deserialize_with = "de_u64")]
    pub received: u64,
    #[serde(default, deserialize_with = "de_u64")]
    pub status: u64,
}

impl From<IndexedProfile> for Person {
    fn from(p: IndexedProfile) -> Person {
        Person {
            address: p.address,
            username: p.username,
            twitter: p.twitter,
            pfp: p.pfp,
            sent: p.sent,
            received: p.received,
            role: Role::from_status(p.status),
        }
    }
}

/// Typed indexer queries
#[derive(Clone)]
pub struct Indexer {
    source: Arc<dyn GraphqlSource>,
}

impl Indexer {
    pub fn new(source: Arc<dyn GraphqlSource>) -> Indexer {
        Indexer { source }
    }

    async fn rows<T: DeserializeOwned>(
        &self,
        name: &str,
        field: &str,
        query: &str,
        variables: Value,
    ) -> Option<Vec<T>> {
        tracing::debug!(target: "indexer", "{}", name);
        match self.fetch_rows(field, query, variables).await {
            Ok(rows) => Some(rows),
            Err(e) => {
                tracing::error!(target: "indexer", "{} failed: {}", name, e);
                None
            }
        }
    }

    async fn fetch_rows<T: DeserializeOwned>(
        &self,
        field: &str,
        query: &str,
        variables: Value,
    ) -> Result<Vec<T>, Error> {
        let mut data = self.source.query(query, variables).await?;
        match data.get_mut(field).map(Value::take) {
            Some(rows) if !rows.is_null() => Ok(serde_json::from_value(rows)?),
            _ => Err(ErrorKind::Indexer(format!("missing {}", field)).into()),
        }
    }

    /// Messages between two accounts, newest first
    pub async fn direct_messages(
        &self,
        sender: &Address,
        recipient: &Address,
        limit: u32,
    ) -> Option<Vec<DirectMessage>> {
        self.rows(
            "GetDirectMessages",
            "direct_messages",
            DIRECT_MESSAGES_QUERY,
            json!({
                "sender": sender.as_str(),
                "recipient": recipient.as_str(),
                "limit": limit,
            }),
        )
        .await
    }

    /// A user's conversations, most recently active first
    pub async fn conversations(&self, user: &Address) -> Option<Vec<ConversationSummary>> {
        self.rows(
            "GetConversations",
            "conversations",
            CONVERSATIONS_QUERY,
            json!({ "userAddress": user.as_str() }),
        )
        .await
    }

    /// Community messages that were not deleted, newest first
    pub async fn recent_messages(&self, limit: u32) -> Option<Vec<CommunityMessage>> {
        self.rows(
            "GetRecentMessages",
            "messages",
            RECENT_MESSAGES_QUERY,
            json!({ "limit": limit }),
        )
        .await
    }

    pub async fn profile(&self, address: &Address) -> Option<IndexedProfile> {
        let rows: Vec<IndexedProfile> = self
            .rows(
                "GetProfile",
                "profiles",
                PROFILE_QUERY,
                json!({ "userAddress": address.as_str() }),
            )
            .await?;
        rows.into_iter().next()
    }

    /// Profiles by stars received, most first
    pub async fn top_profiles(&self, limit: u32) -> Option<Vec<IndexedProfile>> {
        self.rows(
            "GetTopProfiles",
            "profiles",
            TOP_PROFILES_QUERY,
            json!({ "limit": limit }),
        )
        .await
    }
}
