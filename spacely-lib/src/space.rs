use crate::address::Address;
use crate::contracts::{space, u64_arg, Contracts, EntryFunctionPayload};
use crate::decode::{de_u64, first_vec};
use crate::error::{Error, ErrorKind};
use crate::misc::datetime;
use crate::poller::{Poller, Subscription};
use crate::RunState;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeSet;
use std::time::Duration;
use time::macros::format_description;
use time::{Date, Month, PrimitiveDateTime, Time};
use tokio::sync::watch;

/// An event on the `space` contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceEvent {
    #[serde(deserialize_with = "de_u64")]
    pub id: u64,
    pub creator: Address,
    #[serde(alias = "event_name")]
    pub name: String,
    #[serde(deserialize_with = "de_u64")]
    pub start_time: u64,
    #[serde(deserialize_with = "de_u64")]
    pub end_time: u64,
    #[serde(default)]
    pub banner_uri: String,
    #[serde(default)]
    pub genres: Vec<String>,
}

impl SpaceEvent {
    pub fn starts_on(&self, year: i32, month: Month) -> Option<u8> {
        let dt = datetime(self.start_time)?;
        if dt.year() == year && dt.month() == month {
            Some(dt.day())
        } else {
            None
        }
    }
}

/// Genres are typed as one comma separated string
pub fn parse_genres(genres: &str) -> Vec<String> {
    genres
        .split(',')
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map(|g| g.to_owned())
        .collect()
}

/// The fields of the event creation form, as typed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventForm {
    pub event_name: String,
    /// `YYYY-MM-DD`
    pub event_date: String,
    /// `HH:MM`
    pub start_time: String,
    /// `HH:MM`
    pub end_time: String,
    pub banner_uri: String,
    pub genres: String,
}

impl EventForm {
    /// Start and end as unix seconds, reading the date and times as UTC
    pub fn to_times(&self) -> Result<(u64, u64), Error> {
        let date = Date::parse(
            self.event_date.trim(),
            format_description!("[year]-[month]-[day]"),
        )
        .map_err(|e| -> Error { ErrorKind::InvalidEvent(format!("bad date: {e}")).into() })?;
        let start = parse_clock(&self.start_time)?;
        let end = parse_clock(&self.end_time)?;
        Ok((unix_secs(date, start)?, unix_secs(date, end)?))
    }

    pub fn payload(&self, contracts: &Contracts) -> Result<EntryFunctionPayload, Error> {
        let (start, end) = self.to_times()?;
        contracts.create_event_payload(
            &self.event_name,
            start,
            end,
            self.banner_uri.trim(),
            &parse_genres(&self.genres),
        )
    }
}

fn parse_clock(s: &str) -> Result<Time, Error> {
    Time::parse(s.trim(), format_description!("[hour]:[minute]"))
        .map_err(|e| ErrorKind::InvalidEvent(format!("bad time {s:?}: {e}")).into())
}

fn unix_secs(date: Date, time: Time) -> Result<u64, Error> {
    let secs = PrimitiveDateTime::new(date, time).assume_utc().unix_timestamp();
    u64::try_from(secs)
        .map_err(|_| ErrorKind::InvalidEvent("date is before 1970".to_owned()).into())
}

/// Days of the month on which some event starts
pub fn days_with_events(events: &[SpaceEvent], year: i32, month: Month) -> BTreeSet<u8> {
    events
        .iter()
        .filter_map(|e| e.starts_on(year, month))
        .collect()
}

/// How many blank cells precede the 1st in a week starting on Sunday, and
/// how many days the month has
pub fn month_layout(year: i32, month: Month) -> Result<(u8, u8), Error> {
    let first = Date::from_calendar_date(year, month, 1)
        .map_err(|e| -> Error { ErrorKind::General(format!("{e}")).into() })?;
    Ok((
        first.weekday().number_days_from_sunday(),
        time::util::days_in_year_month(year, month),
    ))
}

impl Contracts {
    pub async fn get_all_events(&self) -> Result<Vec<SpaceEvent>, Error> {
        let r = self.view(space::GET_ALL_EVENTS, vec![]).await?;
        first_vec(&r.into_inner())
    }

    pub async fn get_events_by_creator(&self, creator: &Address) -> Result<Vec<SpaceEvent>, Error> {
        let r = self
            .view(space::GET_EVENTS_BY_CREATOR, vec![json!(creator.as_str())])
            .await?;
        first_vec(&r.into_inner())
    }

    pub async fn get_global_event_count(&self) -> Result<u64, Error> {
        self.view(space::GET_GLOBAL_EVENT_COUNT, vec![]).await?.u64(0)
    }

    pub fn create_event_payload(
        &self,
        name: &str,
        start_time: u64,
        end_time: u64,
        banner_uri: &str,
        genres: &[String],
    ) -> Result<EntryFunctionPayload, Error> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ErrorKind::InvalidEvent("Event name is required".to_owned()).into());
        }
        if end_time <= start_time {
            return Err(
                ErrorKind::InvalidEvent("End time must be after start time".to_owned()).into(),
            );
        }
        Ok(self.payload(
            space::CREATE_EVENT,
            vec![
                json!(name),
                u64_arg(start_time),
                u64_arg(end_time),
                json!(banner_uri),
                json!(genres),
            ],
        ))
    }

    pub fn delete_event_payload(&self, event_id: u64) -> EntryFunctionPayload {
        self.payload(space::DELETE_EVENT, vec![u64_arg(event_id)])
    }

    pub fn initialize_space_payload(&self) -> EntryFunctionPayload {
        self.payload(space::INITIALIZE_GLOBAL, vec![])
    }
}

/// The polled list of all events
#[derive(Clone)]
pub struct Events {
    poller: Poller<(), Vec<SpaceEvent>>,
}

impl Events {
    pub fn new(
        contracts: Contracts,
        interval: Duration,
        runstate: watch::Receiver<RunState>,
    ) -> Events {
        let poller = Poller::with_shutdown(
            "events",
            interval,
            move |()| {
                let contracts = contracts.clone();
                async move { contracts.get_all_events().await }
            },
            runstate,
        );
        Events { poller }
    }

    pub fn watch(&self) -> Subscription<(), Vec<SpaceEvent>> {
        self.poller.subscribe(())
    }

    pub fn refresh(&self) {
        self.poller.refresh(&())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::people::test::{alice, MockChain};
    use serde_json::Value;
    use std::sync::Arc;

    fn event_json(id: u64, start: u64) -> Value {
        json!({
            "id": id.to_string(),
            "creator": "0xa11ce",
            "event_name": format!("event {id}"),
            "start_time": start.to_string(),
            "end_time": (start + 3600).to_string(),
            "banner_uri": "",
            "genres": ["Social"]
        })
    }

    #[tokio::test]
    async fn test_get_events() {
        let chain = Arc::new(MockChain::default());
        // 2024-05-01 18:30 and 2024-05-20 00:00 UTC
        chain.answer(
            "space::get_all_events",
            vec![json!([event_json(1, 1714588200), event_json(2, 1716163200)])],
        );
        chain.answer("space::get_global_event_count", vec![json!("2")]);
        chain.answer("space::get_events_by_creator", vec![json!([])]);
        let contracts = chain.contracts();

        let events = contracts.get_all_events().await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].name, "event 1");
        assert_eq!(events[0].creator, alice());
        assert_eq!(events[1].end_time, 1716163200 + 3600);

        assert_eq!(contracts.get_global_event_count().await.unwrap(), 2);
        assert!(contracts
            .get_events_by_creator(&alice())
            .await
            .unwrap()
            .is_empty());

        let days = days_with_events(&events, 2024, Month::May);
        assert_eq!(days.into_iter().collect::<Vec<u8>>(), vec![1, 20]);
        assert!(days_with_events(&events, 2024, Month::June).is_empty());
    }

    #[test]
    fn test_parse_genres() {
        assert_eq!(
            parse_genres(" Social, Tech ,,Music "),
            vec!["Social".to_owned(), "Tech".to_owned(), "Music".to_owned()]
        );
        assert!(parse_genres("  ").is_empty());
    }

    #[test]
    fn test_create_event_validation() {
        let contracts = Arc::new(MockChain::default()).contracts();
        assert!(contracts.create_event_payload(" ", 1, 2, "", &[]).is_err());
        assert!(contracts.create_event_payload("party", 2, 2, "", &[]).is_err());
        let payload = contracts
            .create_event_payload("party", 1, 2, "ipfs://x", &["Social".to_owned()])
            .unwrap();
        assert_eq!(payload.function(), "0x1::space::create_event");
        assert_eq!(
            payload.arguments(),
            &[json!("party"), json!("1"), json!("2"), json!("ipfs://x"), json!(["Social"])]
        );
    }

    #[test]
    fn test_event_form() {
        let form = EventForm {
            event_name: "Meetup".to_owned(),
            event_date: "2024-05-01".to_owned(),
            start_time: "18:30".to_owned(),
            end_time: "20:00".to_owned(),
            banner_uri: String::new(),
            genres: "Social, Networking".to_owned(),
        };
        assert_eq!(form.to_times().unwrap(), (1714588200, 1714593600));

        let contracts = Arc::new(MockChain::default()).contracts();
        let payload = form.payload(&contracts).unwrap();
        assert_eq!(payload.arguments()[4], json!(["Social", "Networking"]));

        let backwards = EventForm {
            end_time: "17:00".to_owned(),
            ..form.clone()
        };
        assert!(backwards.payload(&contracts).is_err());

        let bad = EventForm {
            event_date: "May 1".to_owned(),
            ..form
        };
        assert!(matches!(
            bad.to_times().unwrap_err().kind,
            ErrorKind::InvalidEvent(_)
        ));
    }

    #[test]
    fn test_month_layout() {
        // May 2024 starts on a Wednesday
        assert_eq!(month_layout(2024, Month::May).unwrap(), (3, 31));
        assert_eq!(month_layout(2024, Month::February).unwrap(), (4, 29));
    }
}
