use serde_json::Value;
use spacely_lib::chat::load_conversation;
use spacely_lib::contacts::lookup_contact;
use spacely_lib::contracts::{all_entry_functions, find_entry_function};
use spacely_lib::misc::{format_duration, format_timestamp, now_secs};
use spacely_lib::space::{days_with_events, month_layout, EventForm};
use spacely_lib::ups::{format_move, parse_move_amount, parse_stars_amount};
use spacely_lib::{Address, EntryFunctionPayload, Error, ErrorKind, Settings, GLOBALS};
use std::env;
use time::{Month, OffsetDateTime};
use tokio::runtime::Runtime;

#[derive(Debug, Clone)]
pub struct Command {
    cmd: &'static str,
    usage_params: &'static str,
    desc: &'static str,
}

impl Command {
    fn usage<T>(&self, msg: String) -> Result<T, Error> {
        Err(ErrorKind::Usage(msg, format!("spacely {} {}", self.cmd, self.usage_params)).into())
    }
}

const COMMANDS: [Command; 30] = [
    Command {
        cmd: "add_contact",
        usage_params: "<owner> <address>",
        desc: "add <address> to the contacts of <owner>, named from their profile",
    },
    Command {
        cmd: "calendar",
        usage_params: "[<year> <month>]",
        desc: "show a month (default this one) with the days events start on marked",
    },
    Command {
        cmd: "claim_payload",
        usage_params: "",
        desc: "print the payload that claims today's UPS",
    },
    Command {
        cmd: "contacts",
        usage_params: "<owner>",
        desc: "list the contacts of <owner>",
    },
    Command {
        cmd: "conversation",
        usage_params: "<me> <other>",
        desc: "print the direct messages between two accounts, oldest first",
    },
    Command {
        cmd: "conversations",
        usage_params: "<address>",
        desc: "list the conversations of <address>",
    },
    Command {
        cmd: "create_event_payload",
        usage_params: "<name> <YYYY-MM-DD> <HH:MM> <HH:MM> [<genres>] [<banner_uri>]",
        desc: "print the payload that creates an event. Times are UTC, genres are comma separated.",
    },
    Command {
        cmd: "create_profile_payload",
        usage_params: "<username> [<twitter>] [<pfp_url>]",
        desc: "print the payload that creates a profile",
    },
    Command {
        cmd: "entry_functions",
        usage_params: "",
        desc: "list every contract entry function",
    },
    Command {
        cmd: "events",
        usage_params: "[<creator>]",
        desc: "list all events, or those created by <creator>",
    },
    Command {
        cmd: "help",
        usage_params: "<command>",
        desc: "show this list",
    },
    Command {
        cmd: "leaderboard",
        usage_params: "",
        desc: "show the UPS leaderboard",
    },
    Command {
        cmd: "messages",
        usage_params: "[<limit>]",
        desc: "print recent community messages",
    },
    Command {
        cmd: "mint_poap_payload",
        usage_params: "<event_id> <password>",
        desc: "print the payload that mints a POAP, after checking the password",
    },
    Command {
        cmd: "payload",
        usage_params: "<function> [<arg> ...]",
        desc: "print a payload for any entry function. Arguments are read as JSON, or else as strings.",
    },
    Command {
        cmd: "poap",
        usage_params: "<event_id>",
        desc: "show a POAP collection and its mint status",
    },
    Command {
        cmd: "poap_holders",
        usage_params: "<event_id>",
        desc: "list the holders of a POAP",
    },
    Command {
        cmd: "profile",
        usage_params: "<address>",
        desc: "show the profile of <address>",
    },
    Command {
        cmd: "remove_contact",
        usage_params: "<owner> <address>",
        desc: "remove <address> from the contacts of <owner>",
    },
    Command {
        cmd: "send_dm_payload",
        usage_params: "<recipient> <text>",
        desc: "print the payload that sends a direct message",
    },
    Command {
        cmd: "send_stars_payload",
        usage_params: "<recipient> <amount>",
        desc: "print the payload that sends stars",
    },
    Command {
        cmd: "set_setting",
        usage_params: "<name> <value>",
        desc: "change a setting. Values are read as JSON, or else as strings.",
    },
    Command {
        cmd: "settings",
        usage_params: "",
        desc: "print all settings",
    },
    Command {
        cmd: "stats",
        usage_params: "",
        desc: "print storage and gateway statistics",
    },
    Command {
        cmd: "top_profiles",
        usage_params: "[<limit>]",
        desc: "list the profiles with the most stars received (needs the indexer)",
    },
    Command {
        cmd: "transfer_payload",
        usage_params: "<recipient> <amount>",
        desc: "print the payload that sends MOVE, e.g. 1.5",
    },
    Command {
        cmd: "unread",
        usage_params: "<address> [--watch]",
        desc: "print the unread direct message count of <address>. With --watch, keep printing it as it changes, until ctrl-c.",
    },
    Command {
        cmd: "ups",
        usage_params: "<address>",
        desc: "show the UPS account of <address>",
    },
    Command {
        cmd: "view",
        usage_params: "<function> [<arg> ...]",
        desc: "call any view function and print what it returns",
    },
    Command {
        cmd: "watch_profile",
        usage_params: "<address>",
        desc: "poll a profile and print it whenever it changes, until ctrl-c",
    },
];

pub fn handle_command(mut args: env::Args, rt: &Runtime) -> Result<(), Error> {
    let command_string = match args.next() {
        Some(s) => s,
        None => return help_all(),
    };

    let command = match COMMANDS.iter().find(|c| c.cmd == command_string) {
        None => return Err(ErrorKind::UnknownCommand(command_string).into()),
        Some(c) => c.to_owned(),
    };

    match command.cmd {
        "add_contact" => add_contact(command, args, rt),
        "calendar" => calendar(command, args, rt),
        "claim_payload" => claim_payload(),
        "contacts" => contacts(command, args),
        "conversation" => conversation(command, args, rt),
        "conversations" => conversations(command, args, rt),
        "create_event_payload" => create_event_payload(command, args),
        "create_profile_payload" => create_profile_payload(command, args),
        "entry_functions" => entry_functions(),
        "events" => events(command, args, rt),
        "help" => help(command, args),
        "leaderboard" => leaderboard(rt),
        "messages" => messages(command, args, rt),
        "mint_poap_payload" => mint_poap_payload(command, args, rt),
        "payload" => payload(command, args),
        "poap" => poap(command, args, rt),
        "poap_holders" => poap_holders(command, args, rt),
        "profile" => profile(command, args, rt),
        "remove_contact" => remove_contact(command, args),
        "send_dm_payload" => send_dm_payload(command, args),
        "send_stars_payload" => send_stars_payload(command, args),
        "set_setting" => set_setting(command, args),
        "settings" => settings(),
        "stats" => stats(),
        "top_profiles" => top_profiles(command, args, rt),
        "transfer_payload" => transfer_payload(command, args),
        "unread" => unread(command, args, rt),
        "ups" => ups(command, args, rt),
        "view" => view(command, args, rt),
        "watch_profile" => watch_profile(command, args, rt),
        other => Err(ErrorKind::UnknownCommand(other.to_owned()).into()),
    }
}

fn help_all() -> Result<(), Error> {
    for c in COMMANDS.iter() {
        println!("  {} {}", c.cmd, c.usage_params);
    }
    Ok(())
}

pub fn help(_cmd: Command, mut args: env::Args) -> Result<(), Error> {
    if let Some(sub) = args.next() {
        for c in COMMANDS.iter() {
            if sub == c.cmd {
                println!("spacely {} {}", c.cmd, c.usage_params);
                println!("    {}", c.desc);
                return Ok(());
            }
        }
        println!("No such command {}", sub);
        Ok(())
    } else {
        help_all()
    }
}

fn next_param(cmd: &Command, args: &mut env::Args, name: &str) -> Result<String, Error> {
    match args.next() {
        Some(s) => Ok(s),
        None => cmd.usage(format!("Missing {} parameter", name)),
    }
}

fn next_address(cmd: &Command, args: &mut env::Args, name: &str) -> Result<Address, Error> {
    let s = next_param(cmd, args, name)?;
    Address::try_from_input(&s)
}

fn next_u64(cmd: &Command, args: &mut env::Args, name: &str) -> Result<u64, Error> {
    let s = next_param(cmd, args, name)?;
    match s.parse::<u64>() {
        Ok(n) => Ok(n),
        Err(_) => cmd.usage(format!("{} must be a whole number", name)),
    }
}

fn json_arg(s: String) -> Value {
    serde_json::from_str(&s).unwrap_or(Value::String(s))
}

fn print_payload(payload: &EntryFunctionPayload) -> Result<(), Error> {
    println!("{}", serde_json::to_string_pretty(payload)?);
    Ok(())
}

pub fn add_contact(cmd: Command, mut args: env::Args, rt: &Runtime) -> Result<(), Error> {
    let owner = next_address(&cmd, &mut args, "owner")?;
    let address = next_address(&cmd, &mut args, "address")?;
    if owner == address {
        return cmd.usage("You cannot add yourself".to_string());
    }

    let contracts = GLOBALS.contracts()?;
    let contact = rt.block_on(lookup_contact(contracts, &GLOBALS.pictures, &address));
    let list = GLOBALS.db()?.add_contact(&owner, contact)?;
    println!("{} now has {} contacts", owner.short(), list.len());
    Ok(())
}

pub fn calendar(cmd: Command, mut args: env::Args, rt: &Runtime) -> Result<(), Error> {
    let now = OffsetDateTime::now_utc();
    let (year, month) = match args.next() {
        None => (now.year(), now.month()),
        Some(y) => {
            let year: i32 = match y.parse() {
                Ok(y) => y,
                Err(_) => return cmd.usage("Bad year".to_string()),
            };
            let month = next_u64(&cmd, &mut args, "month")?;
            match u8::try_from(month).ok().and_then(|m| Month::try_from(m).ok()) {
                Some(m) => (year, m),
                None => return cmd.usage("Month must be 1 to 12".to_string()),
            }
        }
    };

    let events = match rt.block_on(GLOBALS.contracts()?.get_all_events()) {
        Ok(events) => events,
        Err(e) => {
            GLOBALS.status_error("Could not load events", &e);
            vec![]
        }
    };
    let marked = days_with_events(&events, year, month);
    let (offset, days) = month_layout(year, month)?;

    println!("{} {}", month, year);
    println!(" Sun  Mon  Tue  Wed  Thu  Fri  Sat");
    let mut line = "     ".repeat(offset as usize);
    for day in 1..=days {
        let mark = if marked.contains(&day) { '*' } else { ' ' };
        line.push_str(&format!(" {:>2}{} ", day, mark));
        if (offset + day) % 7 == 0 {
            println!("{}", line.trim_end());
            line.clear();
        }
    }
    if !line.is_empty() {
        println!("{}", line.trim_end());
    }
    Ok(())
}

pub fn claim_payload() -> Result<(), Error> {
    print_payload(&GLOBALS.contracts()?.claim_daily_payload())
}

pub fn contacts(cmd: Command, mut args: env::Args) -> Result<(), Error> {
    let owner = next_address(&cmd, &mut args, "owner")?;
    for c in GLOBALS.db()?.get_contacts(&owner)? {
        println!(
            "{} {} (added {})",
            c.address,
            c.display_name(),
            format_timestamp(c.added_at)
        );
    }
    Ok(())
}

pub fn conversation(cmd: Command, mut args: env::Args, rt: &Runtime) -> Result<(), Error> {
    let me = next_address(&cmd, &mut args, "me")?;
    let other = next_address(&cmd, &mut args, "other")?;
    let contracts = GLOBALS.contracts()?;
    let messages = rt.block_on(load_conversation(
        contracts,
        GLOBALS.indexer(),
        &me,
        &other,
    ))?;
    for m in messages {
        let who = if m.is_from(&me) { "me" } else { "them" };
        println!("[{}] {}: {}", format_timestamp(m.timestamp), who, m.content);
    }
    Ok(())
}

pub fn conversations(cmd: Command, mut args: env::Args, rt: &Runtime) -> Result<(), Error> {
    let user = next_address(&cmd, &mut args, "address")?;
    let list = match rt.block_on(GLOBALS.contracts()?.get_conversations(&user)) {
        Ok(list) => list,
        Err(e) => match GLOBALS.indexer() {
            Some(indexer) => {
                tracing::warn!("Conversations view failed ({}), trying the indexer", e);
                match rt.block_on(indexer.conversations(&user)) {
                    Some(list) => list,
                    None => return Err(e),
                }
            }
            None => return Err(e),
        },
    };
    for c in list {
        let name = if c.other_party_username.is_empty() {
            c.other_party.short()
        } else {
            c.other_party_username.clone()
        };
        println!(
            "{} {} last {} unread {}",
            c.other_party,
            name,
            format_timestamp(c.last_message_timestamp),
            c.unread_count
        );
    }
    Ok(())
}

pub fn create_event_payload(cmd: Command, mut args: env::Args) -> Result<(), Error> {
    let form = EventForm {
        event_name: next_param(&cmd, &mut args, "name")?,
        event_date: next_param(&cmd, &mut args, "date")?,
        start_time: next_param(&cmd, &mut args, "start")?,
        end_time: next_param(&cmd, &mut args, "end")?,
        genres: args.next().unwrap_or_default(),
        banner_uri: args.next().unwrap_or_default(),
    };
    print_payload(&form.payload(GLOBALS.contracts()?)?)
}

pub fn create_profile_payload(cmd: Command, mut args: env::Args) -> Result<(), Error> {
    let username = next_param(&cmd, &mut args, "username")?;
    let twitter = args.next().unwrap_or_default();
    let pfp = args.next().unwrap_or_default();
    let payload = GLOBALS
        .contracts()?
        .create_profile_payload(&username, &twitter, &pfp)?;
    print_payload(&payload)
}

pub fn entry_functions() -> Result<(), Error> {
    let contracts = GLOBALS.contracts()?;
    for f in all_entry_functions() {
        println!("{}", f.qualified(contracts.module_address()));
    }
    Ok(())
}

pub fn events(_cmd: Command, mut args: env::Args, rt: &Runtime) -> Result<(), Error> {
    let contracts = GLOBALS.contracts()?;
    let events = match args.next() {
        Some(creator) => {
            let creator = Address::try_from_input(&creator)?;
            rt.block_on(contracts.get_events_by_creator(&creator))?
        }
        None => rt.block_on(contracts.get_all_events())?,
    };
    for e in events {
        println!(
            "#{} {} [{} - {}] by {} {}",
            e.id,
            e.name,
            format_timestamp(e.start_time),
            format_timestamp(e.end_time),
            e.creator.short(),
            e.genres.join(", ")
        );
    }
    Ok(())
}

pub fn leaderboard(rt: &Runtime) -> Result<(), Error> {
    let board = rt.block_on(GLOBALS.contracts()?.get_leaderboard())?;
    for (i, entry) in board.iter().enumerate() {
        println!("{:>3}. {} {}", i + 1, entry.address, entry.score);
    }
    Ok(())
}

pub fn messages(cmd: Command, mut args: env::Args, rt: &Runtime) -> Result<(), Error> {
    let limit = match args.next() {
        Some(s) => match s.parse::<u32>() {
            Ok(n) => n,
            Err(_) => return cmd.usage("limit must be a whole number".to_string()),
        },
        None => 50,
    };
    let messages = match rt.block_on(GLOBALS.contracts()?.get_recent_messages(limit as u64)) {
        Ok(m) => m,
        Err(e) => match GLOBALS
            .indexer()
            .and_then(|i| rt.block_on(i.recent_messages(limit)))
        {
            Some(m) => m,
            None => return Err(e),
        },
    };
    for m in messages {
        println!(
            "[{}] {}: {}",
            format_timestamp(m.timestamp),
            m.author(),
            m.content
        );
    }
    Ok(())
}

pub fn mint_poap_payload(cmd: Command, mut args: env::Args, rt: &Runtime) -> Result<(), Error> {
    let event_id = next_u64(&cmd, &mut args, "event_id")?;
    let password = next_param(&cmd, &mut args, "password")?;
    let contracts = GLOBALS.contracts()?;
    if !rt.block_on(contracts.verify_password(event_id, &password))? {
        return Err(ErrorKind::General("Wrong password".to_owned()).into());
    }
    print_payload(&contracts.mint_poap_payload(event_id, &password)?)
}

pub fn payload(cmd: Command, mut args: env::Args) -> Result<(), Error> {
    let name = next_param(&cmd, &mut args, "function")?;
    let function = match find_entry_function(&name) {
        Some(f) => f,
        None => return cmd.usage(format!("No such entry function: {}", name)),
    };
    let arguments: Vec<Value> = args.map(json_arg).collect();
    print_payload(&GLOBALS.contracts()?.payload(function, arguments))
}

pub fn poap(cmd: Command, mut args: env::Args, rt: &Runtime) -> Result<(), Error> {
    let event_id = next_u64(&cmd, &mut args, "event_id")?;
    let info = rt.block_on(GLOBALS.contracts()?.get_poap_info(event_id))?;
    println!("{} (event #{})", info.name, info.event_id);
    if !info.description.is_empty() {
        println!("  {}", info.description);
    }
    println!(
        "  mint {} to {}",
        format_timestamp(info.start_time),
        format_timestamp(info.end_time)
    );
    println!(
        "  status: {}, minted: {}",
        info.status(now_secs()),
        info.minted
    );
    Ok(())
}

pub fn poap_holders(cmd: Command, mut args: env::Args, rt: &Runtime) -> Result<(), Error> {
    let event_id = next_u64(&cmd, &mut args, "event_id")?;
    for holder in rt.block_on(GLOBALS.contracts()?.get_holders(event_id))? {
        println!("{}", holder);
    }
    Ok(())
}

pub fn profile(cmd: Command, mut args: env::Args, rt: &Runtime) -> Result<(), Error> {
    let address = next_address(&cmd, &mut args, "address")?;
    let person = rt.block_on(GLOBALS.contracts()?.get_profile(&address))?;
    println!("{} ({})", person.username, person.role);
    if !person.twitter.is_empty() {
        println!("  twitter: {}", person.twitter);
    }
    if let Some(pfp) = person.pfp() {
        println!("  picture: {}", pfp);
    }
    println!("  stars sent: {}, received: {}", person.sent, person.received);
    Ok(())
}

pub fn remove_contact(cmd: Command, mut args: env::Args) -> Result<(), Error> {
    let owner = next_address(&cmd, &mut args, "owner")?;
    let address = next_address(&cmd, &mut args, "address")?;
    let list = GLOBALS.db()?.remove_contact(&owner, &address)?;
    println!("{} now has {} contacts", owner.short(), list.len());
    Ok(())
}

pub fn send_dm_payload(cmd: Command, mut args: env::Args) -> Result<(), Error> {
    let recipient = next_address(&cmd, &mut args, "recipient")?;
    let text: Vec<String> = args.collect();
    if text.is_empty() {
        return cmd.usage("Missing text parameter".to_string());
    }
    let payload = GLOBALS
        .contracts()?
        .send_direct_message_payload(&recipient, &text.join(" "))?;
    print_payload(&payload)
}

pub fn send_stars_payload(cmd: Command, mut args: env::Args) -> Result<(), Error> {
    let recipient = next_address(&cmd, &mut args, "recipient")?;
    let amount = parse_stars_amount(&next_param(&cmd, &mut args, "amount")?)?;
    print_payload(&GLOBALS.contracts()?.send_ups_payload(&recipient, amount)?)
}

pub fn set_setting(cmd: Command, mut args: env::Args) -> Result<(), Error> {
    let name = next_param(&cmd, &mut args, "name")?;
    let value = next_param(&cmd, &mut args, "value")?;
    let storage = GLOBALS.db()?;
    let mut settings = Settings::load(storage);
    settings.set(&name, &value)?;
    settings.save(storage)?;
    println!("{} saved. It takes effect on the next run.", name);
    Ok(())
}

pub fn settings() -> Result<(), Error> {
    let settings = Settings::load(GLOBALS.db()?);
    for (name, value) in settings.entries()? {
        println!("{} = {}", name, value);
    }
    Ok(())
}

pub fn stats() -> Result<(), Error> {
    let storage = GLOBALS.db()?;
    println!("general records: {}", storage.get_general_len()?);
    println!("contact lists: {}", storage.get_contacts_len()?);
    println!("{}", GLOBALS.gateway()?.stats());
    Ok(())
}

pub fn top_profiles(cmd: Command, mut args: env::Args, rt: &Runtime) -> Result<(), Error> {
    let limit = match args.next() {
        Some(s) => match s.parse::<u32>() {
            Ok(n) => n,
            Err(_) => return cmd.usage("limit must be a whole number".to_string()),
        },
        None => 20,
    };
    let indexer = match GLOBALS.indexer() {
        Some(i) => i,
        None => return Err(ErrorKind::General("The indexer is turned off".to_owned()).into()),
    };
    let profiles = match rt.block_on(indexer.top_profiles(limit)) {
        Some(p) => p,
        None => return Err(ErrorKind::Indexer("query failed".to_owned()).into()),
    };
    for (i, p) in profiles.iter().enumerate() {
        println!("{:>3}. {} {} received {}", i + 1, p.username, p.address.short(), p.received);
    }
    Ok(())
}

pub fn transfer_payload(cmd: Command, mut args: env::Args) -> Result<(), Error> {
    let recipient = next_address(&cmd, &mut args, "recipient")?;
    let octas = parse_move_amount(&next_param(&cmd, &mut args, "amount")?)?;
    println!("Sending {} MOVE ({} octas)", format_move(octas), octas);
    print_payload(&GLOBALS.contracts()?.transfer_tokens_payload(&recipient, octas)?)
}

pub fn unread(cmd: Command, mut args: env::Args, rt: &Runtime) -> Result<(), Error> {
    let address = next_address(&cmd, &mut args, "address")?;
    match args.next().as_deref() {
        None => {
            let n = rt.block_on(GLOBALS.contracts()?.get_unread_count(&address))?;
            println!("{}", n);
            return Ok(());
        }
        Some("--watch") => {}
        Some(other) => return cmd.usage(format!("Unexpected parameter {}", other)),
    }

    if GLOBALS.db()?.read_setting_offline() {
        return Err(ErrorKind::Offline.into());
    }

    let mut unread = GLOBALS.unread_dms.subscribe();
    start_background(rt, Some(address));
    rt.block_on(async {
        loop {
            tokio::select! {
                changed = unread.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    if let Some(n) = *unread.borrow_and_update() {
                        println!("[{}] {} unread", format_timestamp(now_secs()), n);
                    }
                },
                _ = tokio::signal::ctrl_c() => break,
            }
        }
    });
    Ok(())
}

pub fn ups(cmd: Command, mut args: env::Args, rt: &Runtime) -> Result<(), Error> {
    let address = next_address(&cmd, &mut args, "address")?;
    let contracts = GLOBALS.contracts()?;
    rt.block_on(async {
        if !contracts.has_ups_account(&address).await? {
            println!("{} has no UPS account", address.short());
            return Ok::<(), Error>(());
        }
        let account = contracts.get_ups_account(&address).await?;
        println!("balance: {}", account.balance);
        println!("streak: {} days", account.streak);
        println!("total claimed: {}", account.total_claimed);
        println!("sent: {}, received: {}", account.sent, account.received);
        if account.last_claim > 0 {
            println!("last claim: {}", format_timestamp(account.last_claim));
        }
        if contracts.can_claim_today(&address).await? {
            let next = contracts.get_next_claim_amount(&address).await?;
            println!("can claim {} now", next);
        } else {
            let wait = contracts.get_time_until_next_claim(&address).await?;
            println!("next claim in {}", format_duration(wait));
        }
        Ok::<(), Error>(())
    })
}

pub fn view(cmd: Command, mut args: env::Args, rt: &Runtime) -> Result<(), Error> {
    let name = next_param(&cmd, &mut args, "function")?;
    let function = match find_entry_function(&name) {
        Some(f) => f,
        None => return cmd.usage(format!("No such function: {}", name)),
    };
    let arguments: Vec<Value> = args.map(json_arg).collect();
    let returns = rt.block_on(GLOBALS.contracts()?.view(function, arguments))?;
    println!(
        "{}",
        serde_json::to_string_pretty(&Value::Array(returns.into_inner()))?
    );
    Ok(())
}

pub fn watch_profile(cmd: Command, mut args: env::Args, rt: &Runtime) -> Result<(), Error> {
    let address = next_address(&cmd, &mut args, "address")?;
    let people = GLOBALS.people()?;
    start_background(rt, None);
    rt.block_on(async {
        let mut subscription = people.watch(address);
        loop {
            tokio::select! {
                polled = subscription.changed() => {
                    let polled = polled?;
                    match (&polled.value, &polled.last_error) {
                        (_, Some(e)) => println!("[{}] error: {}", polled.generation, e),
                        (Some(p), None) => println!(
                            "[{}] {} ({}) sent {} received {}",
                            polled.generation, p.username, p.role, p.sent, p.received
                        ),
                        (None, None) => {}
                    }
                },
                _ = tokio::signal::ctrl_c() => break,
            }
        }
        Ok::<(), Error>(())
    })
}

// Run the library's background tasks while a watching command runs. They
// stop when main shuts the library down.
fn start_background(rt: &Runtime, account: Option<Address>) {
    spacely_lib::set_account(account);
    rt.spawn(spacely_lib::run());
}
