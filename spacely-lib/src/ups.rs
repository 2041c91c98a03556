//! UPS points, also shown as Stars: daily claims, streaks and transfers

use crate::address::Address;
use crate::contracts::{ups, u64_arg, Contracts, EntryFunction, EntryFunctionPayload};
use crate::decode::u64_from_value;
use crate::error::{Error, ErrorKind};
use crate::poller::{Poller, Subscription};
use crate::RunState;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tokio::sync::watch;

/// Octas per MOVE
pub const OCTAS_PER_MOVE: u64 = 100_000_000;
const MOVE_DECIMALS: usize = 8;

/// `ups::get_full_account_info`, which returns
/// `(balance, streak, last_claim, total_claimed, sent, received)`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsAccount {
    pub balance: u64,
    pub streak: u64,
    pub last_claim: u64,
    pub total_claimed: u64,
    pub sent: u64,
    pub received: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub address: Address,
    pub score: u64,
}

/// Parse a MOVE amount like `1.5` into octas
pub fn parse_move_amount(s: &str) -> Result<u64, Error> {
    let s = s.trim();
    let bad = || -> Error { ErrorKind::InvalidAmount(format!("{s:?} is not a MOVE amount")).into() };

    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };
    if (whole.is_empty() && frac.is_empty())
        || frac.len() > MOVE_DECIMALS
        || !whole.chars().all(|c| c.is_ascii_digit())
        || !frac.chars().all(|c| c.is_ascii_digit())
        || (s.contains('.') && frac.is_empty())
    {
        return Err(bad());
    }

    let whole: u64 = if whole.is_empty() { 0 } else { whole.parse()? };
    let frac: u64 = if frac.is_empty() {
        0
    } else {
        format!("{:0<width$}", frac, width = MOVE_DECIMALS).parse()?
    };
    let octas = whole
        .checked_mul(OCTAS_PER_MOVE)
        .and_then(|w| w.checked_add(frac))
        .ok_or_else(bad)?;
    if octas == 0 {
        return Err(ErrorKind::InvalidAmount("Amount must be positive".to_owned()).into());
    }
    Ok(octas)
}

/// Stars are whole and positive
pub fn parse_stars_amount(s: &str) -> Result<u64, Error> {
    let s = s.trim();
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
        return Err(ErrorKind::InvalidAmount(format!("{s:?} is not a whole number")).into());
    }
    let n: u64 = s.parse()?;
    if n == 0 {
        return Err(ErrorKind::InvalidAmount("Amount must be positive".to_owned()).into());
    }
    Ok(n)
}

/// Octas as MOVE with trailing zeros dropped
pub fn format_move(octas: u64) -> String {
    let whole = octas / OCTAS_PER_MOVE;
    let frac = octas % OCTAS_PER_MOVE;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{:08}", frac);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}

impl Contracts {
    pub async fn get_ups_account(&self, address: &Address) -> Result<UpsAccount, Error> {
        let r = self
            .view(ups::GET_FULL_ACCOUNT_INFO, vec![json!(address.as_str())])
            .await?;
        Ok(UpsAccount {
            balance: r.u64(0)?,
            streak: r.u64(1)?,
            last_claim: r.u64(2)?,
            total_claimed: r.u64(3)?,
            sent: r.u64(4)?,
            received: r.u64(5)?,
        })
    }

    async fn ups_u64(
        &self,
        function: EntryFunction,
        address: &Address,
    ) -> Result<u64, Error> {
        self.view(function, vec![json!(address.as_str())])
            .await?
            .u64(0)
    }

    async fn ups_bool(
        &self,
        function: EntryFunction,
        address: &Address,
    ) -> Result<bool, Error> {
        self.view(function, vec![json!(address.as_str())])
            .await?
            .bool(0)
    }

    pub async fn get_balance(&self, address: &Address) -> Result<u64, Error> {
        self.ups_u64(ups::GET_BALANCE, address).await
    }

    pub async fn get_streak(&self, address: &Address) -> Result<u64, Error> {
        self.ups_u64(ups::GET_STREAK, address).await
    }

    pub async fn get_total_claimed(&self, address: &Address) -> Result<u64, Error> {
        self.ups_u64(ups::GET_TOTAL_CLAIMED, address).await
    }

    pub async fn get_ups_sent(&self, address: &Address) -> Result<u64, Error> {
        self.ups_u64(ups::GET_UPS_SENT, address).await
    }

    pub async fn get_ups_received(&self, address: &Address) -> Result<u64, Error> {
        self.ups_u64(ups::GET_UPS_RECEIVED, address).await
    }

    pub async fn get_next_claim_amount(&self, address: &Address) -> Result<u64, Error> {
        self.ups_u64(ups::GET_NEXT_CLAIM_AMOUNT, address).await
    }

    /// Seconds until the next daily claim opens
    pub async fn get_time_until_next_claim(&self, address: &Address) -> Result<u64, Error> {
        self.ups_u64(ups::GET_TIME_UNTIL_NEXT_CLAIM, address).await
    }

    pub async fn can_claim_today(&self, address: &Address) -> Result<bool, Error> {
        self.ups_bool(ups::CAN_CLAIM, address).await
    }

    pub async fn has_ups_account(&self, address: &Address) -> Result<bool, Error> {
        self.ups_bool(ups::HAS_ACCOUNT, address).await
    }

    /// `ups::get_leaderboard_data` returns parallel vectors of addresses and
    /// scores. Ranked highest first.
    pub async fn get_leaderboard(&self) -> Result<Vec<LeaderboardEntry>, Error> {
        let r = self.view(ups::GET_LEADERBOARD, vec![]).await?;
        let addresses: Vec<Address> = r.vec(0)?;
        let scores: Vec<serde_json::Value> = r.vec(1)?;
        if addresses.len() != scores.len() {
            return Err(ErrorKind::Decode(format!(
                "leaderboard has {} addresses but {} scores",
                addresses.len(),
                scores.len()
            ))
            .into());
        }
        let mut entries = addresses
            .into_iter()
            .zip(scores.iter())
            .map(|(address, score)| -> Result<LeaderboardEntry, Error> {
                Ok(LeaderboardEntry {
                    address,
                    score: u64_from_value(score)?,
                })
            })
            .collect::<Result<Vec<LeaderboardEntry>, Error>>()?;
        entries.sort_by(|a, b| b.score.cmp(&a.score));
        Ok(entries)
    }

    pub fn initialize_ups_account_payload(&self) -> EntryFunctionPayload {
        self.payload(ups::INITIALIZE_ACCOUNT, vec![])
    }

    pub fn claim_daily_payload(&self) -> EntryFunctionPayload {
        self.payload(ups::CLAIM_DAILY, vec![])
    }

    pub fn send_ups_payload(&self, to: &Address, amount: u64) -> Result<EntryFunctionPayload, Error> {
        if amount == 0 {
            return Err(ErrorKind::InvalidAmount("Amount must be positive".to_owned()).into());
        }
        Ok(self.payload(ups::SEND_UPS, vec![json!(to.as_str()), u64_arg(amount)]))
    }

    /// Mint new stars straight to someone else
    pub fn generate_and_send_ups_payload(
        &self,
        to: &Address,
        amount: u64,
    ) -> Result<EntryFunctionPayload, Error> {
        if amount == 0 {
            return Err(ErrorKind::InvalidAmount("Amount must be positive".to_owned()).into());
        }
        Ok(self.payload(
            ups::GENERATE_AND_SEND_UPS,
            vec![json!(to.as_str()), u64_arg(amount)],
        ))
    }
}

/// Polled UPS accounts
#[derive(Clone)]
pub struct Ups {
    poller: Poller<Address, UpsAccount>,
}

impl Ups {
    pub fn new(
        contracts: Contracts,
        interval: Duration,
        runstate: watch::Receiver<RunState>,
    ) -> Ups {
        let poller = Poller::with_shutdown(
            "ups",
            interval,
            move |address: Address| {
                let contracts = contracts.clone();
                async move { contracts.get_ups_account(&address).await }
            },
            runstate,
        );
        Ups { poller }
    }

    pub fn watch(&self, address: Address) -> Subscription<Address, UpsAccount> {
        self.poller.subscribe(address)
    }

    /// After a claim or a send the numbers are stale
    pub fn refresh(&self, address: &Address) {
        self.poller.refresh(address)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::people::test::{alice, MockChain};
    use std::sync::Arc;

    fn account_values() -> Vec<serde_json::Value> {
        vec![
            json!("120"),
            json!("4"),
            json!("1714588200"),
            json!("100"),
            json!("5"),
            json!("25"),
        ]
    }

    #[tokio::test]
    async fn test_get_ups_account() {
        let chain = Arc::new(MockChain::default());
        chain.answer("ups::get_full_account_info", account_values());
        chain.answer("ups::can_claim_today", vec![json!(true)]);
        chain.answer("ups::get_time_until_next_claim", vec![json!("3600")]);
        let contracts = chain.contracts();

        let account = contracts.get_ups_account(&alice()).await.unwrap();
        assert_eq!(account.balance, 120);
        assert_eq!(account.streak, 4);
        assert_eq!(account.received, 25);
        assert!(contracts.can_claim_today(&alice()).await.unwrap());
        assert_eq!(
            contracts.get_time_until_next_claim(&alice()).await.unwrap(),
            3600
        );

        chain.reject("ups::get_balance", 400);
        let e = contracts.get_balance(&alice()).await.unwrap_err();
        assert!(!e.is_transient());
    }

    #[tokio::test]
    async fn test_leaderboard() {
        let chain = Arc::new(MockChain::default());
        chain.answer(
            "ups::get_leaderboard_data",
            vec![json!(["0x1", "0xa11ce"]), json!(["3", "9"])],
        );
        let contracts = chain.contracts();
        let board = contracts.get_leaderboard().await.unwrap();
        assert_eq!(board[0].address, alice());
        assert_eq!(board[0].score, 9);

        chain.answer(
            "ups::get_leaderboard_data",
            vec![json!(["0x1"]), json!([])],
        );
        assert!(contracts.get_leaderboard().await.is_err());
    }

    #[test]
    fn test_parse_move_amount() {
        assert_eq!(parse_move_amount("1").unwrap(), 100_000_000);
        assert_eq!(parse_move_amount(" 1.5 ").unwrap(), 150_000_000);
        assert_eq!(parse_move_amount("0.00000001").unwrap(), 1);
        assert_eq!(parse_move_amount(".25").unwrap(), 25_000_000);
        assert!(parse_move_amount("0").is_err());
        assert!(parse_move_amount("1.").is_err());
        assert!(parse_move_amount("0.000000001").is_err());
        assert!(parse_move_amount("-1").is_err());
        assert!(parse_move_amount("abc").is_err());
        assert!(parse_move_amount("").is_err());
        assert!(parse_move_amount("999999999999").is_err());
    }

    #[test]
    fn test_parse_stars_amount() {
        assert_eq!(parse_stars_amount("10").unwrap(), 10);
        assert!(parse_stars_amount("0").is_err());
        assert!(parse_stars_amount("1.5").is_err());
        assert!(parse_stars_amount("").is_err());
    }

    #[test]
    fn test_format_move() {
        assert_eq!(format_move(150_000_000), "1.5");
        assert_eq!(format_move(200_000_000), "2");
        assert_eq!(format_move(1), "0.00000001");
    }

    #[test]
    fn test_ups_payloads() {
        let contracts = Arc::new(MockChain::default()).contracts();
        assert!(contracts.send_ups_payload(&alice(), 0).is_err());
        let payload = contracts.send_ups_payload(&alice(), 5).unwrap();
        assert_eq!(payload.function(), "0x1::ups::send_ups");
        assert_eq!(payload.arguments(), &[json!(alice().as_str()), json!("5")]);
        assert_eq!(
            contracts.claim_daily_payload().function(),
            "0x1::ups::claim_daily"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_ups_poller() {
        let chain = Arc::new(MockChain::default());
        chain.answer("ups::get_full_account_info", account_values());
        let (_write, read) = watch::channel(RunState::Online);
        let ups = Ups::new(chain.contracts(), Duration::from_secs(10), read);
        let mut sub = ups.watch(alice());
        let polled = sub.changed().await.unwrap();
        assert_eq!(polled.value.unwrap().balance, 120);
    }
}
