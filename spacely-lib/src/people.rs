use crate::address::Address;
use crate::contracts::{profile, u64_arg, Contracts, EntryFunctionPayload};
use crate::error::{Error, ErrorKind};
use crate::poller::{Poller, Subscription};
use crate::RunState;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Host,
    Participant,
}

impl Role {
    pub fn from_status(status: u64) -> Role {
        if status == 1 {
            Role::Host
        } else {
            Role::Participant
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Host => write!(f, "Host"),
            Role::Participant => write!(f, "Participant"),
        }
    }
}

/// An on-chain profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub address: Address,
    pub username: String,
    pub twitter: String,
    pub pfp: String,
    pub sent: u64,
    pub received: u64,
    pub role: Role,
}

impl Person {
    pub fn pfp(&self) -> Option<&str> {
        if self.pfp.is_empty() {
            None
        } else {
            Some(&self.pfp)
        }
    }

    /// The first letter of the username, for when there is no picture
    pub fn initial(&self) -> char {
        self.username
            .chars()
            .next()
            .map(|c| c.to_ascii_uppercase())
            .unwrap_or('?')
    }
}

/// Check a username: 3 to 20 characters after trimming
pub fn validate_username(username: &str) -> Result<&str, Error> {
    let username = username.trim();
    let len = username.chars().count();
    if len < USERNAME_MIN {
        return Err(ErrorKind::InvalidUsername(format!(
            "Username must be at least {} characters",
            USERNAME_MIN
        ))
        .into());
    }
    if len > USERNAME_MAX {
        return Err(ErrorKind::InvalidUsername(format!(
            "Username must be at most {} characters",
            USERNAME_MAX
        ))
        .into());
    }
    Ok(username)
}

/// Twitter serves small avatars by default. Ask for the 400x400 one.
pub fn upgrade_twitter_pfp(url: &str) -> String {
    if !url.contains("pbs.twimg.com") {
        return url.to_owned();
    }
    url.replacen("_normal", "_400x400", 1)
        .replacen("_bigger", "_400x400", 1)
        .replacen("_mini", "_400x400", 1)
}

/// Twitter handles are shown with a leading `@`
pub fn twitter_handle(handle: &str) -> String {
    let handle = handle.trim();
    if handle.is_empty() || handle.starts_with('@') {
        handle.to_owned()
    } else {
        format!("@{}", handle)
    }
}

impl Contracts {
    /// `profile::get_profile_with_status`, which returns
    /// `(username, twitter, pfp, sent, received, status)`
    pub async fn get_profile(&self, address: &Address) -> Result<Person, Error> {
        let r = self
            .view(profile::GET_PROFILE, vec![json!(address.as_str())])
            .await?;
        Ok(Person {
            address: address.clone(),
            username: r.string(0)?,
            twitter: r.string(1)?,
            pfp: r.string(2)?,
            sent: r.u64(3)?,
            received: r.u64(4)?,
            role: Role::from_status(r.u64(5)?),
        })
    }

    /// `profile::get_full_profile_info`, returned undecoded
    pub async fn get_full_profile_info(&self, address: &Address) -> Result<Vec<Value>, Error> {
        let r = self
            .view(profile::GET_FULL_PROFILE, vec![json!(address.as_str())])
            .await?;
        Ok(r.into_inner())
    }

    pub async fn has_profile(&self, address: &Address) -> Result<bool, Error> {
        self.view(profile::HAS_PROFILE, vec![json!(address.as_str())])
            .await?
            .bool(0)
    }

    pub fn create_profile_payload(
        &self,
        username: &str,
        twitter: &str,
        pfp: &str,
    ) -> Result<EntryFunctionPayload, Error> {
        let username = validate_username(username)?;
        Ok(self.payload(
            profile::CREATE_PROFILE,
            vec![
                json!(username),
                json!(twitter_handle(twitter)),
                json!(upgrade_twitter_pfp(pfp.trim())),
            ],
        ))
    }

    /// Tokens move in octas
    pub fn transfer_tokens_payload(
        &self,
        to: &Address,
        octas: u64,
    ) -> Result<EntryFunctionPayload, Error> {
        if octas == 0 {
            return Err(ErrorKind::InvalidAmount("Amount must be positive".to_owned()).into());
        }
        Ok(self.payload(
            profile::TRANSFER_TOKENS,
            vec![json!(to.as_str()), u64_arg(octas)],
        ))
    }
}

/// Profile pictures we have seen, by address. Entries are only ever added
/// or overwritten, never invalidated.
#[derive(Debug, Default)]
pub struct PictureCache {
    pictures: DashMap<Address, String>,
}

impl PictureCache {
    pub fn new() -> PictureCache {
        PictureCache::default()
    }

    pub fn get(&self, address: &Address) -> Option<String> {
        self.pictures.get(address).map(|r| r.value().clone())
    }

    /// Remember a picture. Empty URLs are ignored.
    pub fn insert(&self, address: &Address, url: &str) {
        if !url.is_empty() {
            self.pictures.insert(address.clone(), url.to_owned());
        }
    }

    pub fn len(&self) -> usize {
        self.pictures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pictures.is_empty()
    }
}

/// Polled profiles. Every successful read also feeds the picture cache.
#[derive(Clone)]
pub struct People {
    poller: Poller<Address, Person>,
}

impl People {
    pub fn new(
        contracts: Contracts,
        pictures: Arc<PictureCache>,
        interval: Duration,
        runstate: watch::Receiver<RunState>,
    ) -> People {
        let poller = Poller::with_shutdown(
            "profile",
            interval,
            move |address: Address| {
                let contracts = contracts.clone();
                let pictures = pictures.clone();
                async move {
                    let person = contracts.get_profile(&address).await?;
                    pictures.insert(&address, &person.pfp);
                    Ok(person)
                }
            },
            runstate,
        );
        People { poller }
    }

    pub fn watch(&self, address: Address) -> Subscription<Address, Person> {
        self.poller.subscribe(address)
    }

    pub fn refresh(&self, address: &Address) {
        self.poller.refresh(address)
    }

    pub fn num_watched(&self) -> usize {
        self.poller.len()
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::view::{ViewRequest, ViewSource};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Answers view calls from a table of canned results, by function name
    #[derive(Default)]
    pub(crate) struct MockChain {
        pub answers: Mutex<Vec<(String, Result<Vec<Value>, u16>)>>,
        pub calls: Mutex<Vec<ViewRequest>>,
    }

    impl MockChain {
        pub(crate) fn answer(&self, function: &str, values: Vec<Value>) {
            self.answers.lock().push((function.to_owned(), Ok(values)));
        }

        pub(crate) fn reject(&self, function: &str, status: u16) {
            self.answers.lock().push((function.to_owned(), Err(status)));
        }

        pub(crate) fn contracts(self: &Arc<Self>) -> Contracts {
            Contracts::new(self.clone(), "0x1")
        }
    }

    #[async_trait]
    impl ViewSource for MockChain {
        async fn view(&self, request: &ViewRequest) -> Result<Vec<Value>, Error> {
            self.calls.lock().push(request.clone());
            let answers = self.answers.lock();
            match answers
                .iter()
                .rev()
                .find(|(f, _)| request.function.ends_with(&format!("::{}", f)))
            {
                Some((_, Ok(values))) => Ok(values.clone()),
                Some((_, Err(status))) => Err(ErrorKind::ViewRejected {
                    status: *status,
                    message: "Move abort".to_owned(),
                }
                .into()),
                None => Err(ErrorKind::ViewStatus(reqwest::StatusCode::NOT_FOUND).into()),
            }
        }
    }

    pub(crate) fn alice() -> Address {
        Address::try_from_chain("0xa11ce").unwrap()
    }

    pub(crate) fn alice_profile() -> Vec<Value> {
        vec![
            json!("alice"),
            json!("@alice"),
            json!("https://pbs.twimg.com/profile_images/1/a_400x400.jpg"),
            json!("12"),
            json!("30"),
            json!(1),
        ]
    }

    #[tokio::test]
    async fn test_get_profile() {
        let chain = Arc::new(MockChain::default());
        chain.answer("profile::get_profile_with_status", alice_profile());
        let contracts = chain.contracts();

        let person = contracts.get_profile(&alice()).await.unwrap();
        assert_eq!(person.username, "alice");
        assert_eq!(person.twitter, "@alice");
        assert_eq!(person.sent, 12);
        assert_eq!(person.received, 30);
        assert_eq!(person.role, Role::Host);
        assert_eq!(person.initial(), 'A');

        let calls = chain.calls.lock();
        assert_eq!(calls[0].function, "0x1::profile::get_profile_with_status");
        assert_eq!(calls[0].arguments, vec![json!(alice().as_str())]);
    }

    #[tokio::test]
    async fn test_participant_and_short_tuple() {
        let chain = Arc::new(MockChain::default());
        let mut values = alice_profile();
        values[5] = json!(0);
        chain.answer("profile::get_profile_with_status", values);
        let contracts = chain.contracts();
        assert_eq!(
            contracts.get_profile(&alice()).await.unwrap().role,
            Role::Participant
        );

        chain.answer("profile::get_profile_with_status", vec![json!("alice")]);
        let e = contracts.get_profile(&alice()).await.unwrap_err();
        assert!(matches!(e.kind, ErrorKind::Decode(_)));
    }

    #[tokio::test]
    async fn test_has_profile() {
        let chain = Arc::new(MockChain::default());
        chain.answer("profile::has_profile", vec![json!(false)]);
        assert!(!chain.contracts().has_profile(&alice()).await.unwrap());
    }

    #[test]
    fn test_validate_username() {
        assert!(validate_username("al").is_err());
        assert_eq!(validate_username("  ali  ").unwrap(), "ali");
        assert!(validate_username(&"x".repeat(20)).is_ok());
        assert!(validate_username(&"x".repeat(21)).is_err());
    }

    #[test]
    fn test_upgrade_twitter_pfp() {
        assert_eq!(
            upgrade_twitter_pfp("https://pbs.twimg.com/profile_images/1/me_normal.jpg"),
            "https://pbs.twimg.com/profile_images/1/me_400x400.jpg"
        );
        assert_eq!(
            upgrade_twitter_pfp("https://pbs.twimg.com/profile_images/1/me_bigger.png"),
            "https://pbs.twimg.com/profile_images/1/me_400x400.png"
        );
        assert_eq!(
            upgrade_twitter_pfp("https://example.com/me_normal.jpg"),
            "https://example.com/me_normal.jpg"
        );
    }

    #[test]
    fn test_create_profile_payload() {
        let chain = Arc::new(MockChain::default());
        let contracts = chain.contracts();
        let payload = contracts
            .create_profile_payload(
                "alice",
                "alice",
                "https://pbs.twimg.com/profile_images/1/a_mini.jpg",
            )
            .unwrap();
        assert_eq!(payload.function(), "0x1::profile::create_profile");
        assert_eq!(
            payload.arguments(),
            &[
                json!("alice"),
                json!("@alice"),
                json!("https://pbs.twimg.com/profile_images/1/a_400x400.jpg")
            ]
        );

        let payload = contracts.create_profile_payload("bob", "", "").unwrap();
        assert_eq!(payload.arguments(), &[json!("bob"), json!(""), json!("")]);

        assert!(contracts.create_profile_payload("bo", "", "").is_err());
    }

    #[test]
    fn test_transfer_payload() {
        let contracts = Arc::new(MockChain::default()).contracts();
        let payload = contracts.transfer_tokens_payload(&alice(), 150_000_000).unwrap();
        assert_eq!(
            payload.arguments(),
            &[json!(alice().as_str()), json!("150000000")]
        );
        assert!(contracts.transfer_tokens_payload(&alice(), 0).is_err());
    }

    #[test]
    fn test_picture_cache_is_additive() {
        let cache = PictureCache::new();
        cache.insert(&alice(), "https://example.com/1.png");
        cache.insert(&alice(), "");
        assert_eq!(cache.get(&alice()).as_deref(), Some("https://example.com/1.png"));
        cache.insert(&alice(), "https://example.com/2.png");
        assert_eq!(cache.get(&alice()).as_deref(), Some("https://example.com/2.png"));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_people_feeds_picture_cache() {
        let chain = Arc::new(MockChain::default());
        chain.answer("profile::get_profile_with_status", alice_profile());
        let pictures = Arc::new(PictureCache::new());
        let (_write, read) = watch::channel(RunState::Online);
        let people = People::new(
            chain.contracts(),
            pictures.clone(),
            Duration::from_secs(30),
            read,
        );

        let mut sub = people.watch(alice());
        let polled = sub.changed().await.unwrap();
        assert_eq!(polled.value.unwrap().username, "alice");
        assert!(pictures.get(&alice()).is_some());
        assert_eq!(people.num_watched(), 1);
        drop(sub);
        assert_eq!(people.num_watched(), 0);
    }
}
