use crate::decode::Returns;
use crate::error::Error;
use crate::view::{ViewRequest, ViewSource};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Where the Spacely modules are published on Movement testnet
pub const MODULE_ADDRESS: &str =
    "0xe9001a042dffbfc16b68bd3b3bbeb51efab4abded5b038d4a8f138a5b6d95988";

pub const REST_URL: &str = "https://testnet.movementnetwork.xyz/v1";
pub const INDEXER_URL: &str = "https://hasura.testnet.movementnetwork.xyz/v1/graphql";
pub const FAUCET_URL: &str = "https://faucet.testnet.movementnetwork.xyz/";
pub const EXPLORER_URL: &str = "https://explorer.movementnetwork.xyz";

/// A contract entry point, by module and function name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryFunction {
    pub module: &'static str,
    pub name: &'static str,
}

impl EntryFunction {
    pub const fn new(module: &'static str, name: &'static str) -> EntryFunction {
        EntryFunction { module, name }
    }

    /// `address::module::name`
    pub fn qualified(&self, module_address: &str) -> String {
        format!("{}::{}::{}", module_address, self.module, self.name)
    }
}

impl fmt::Display for EntryFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.module, self.name)
    }
}

macro_rules! entry_functions {
    ($modname:ident, $module:literal, [ $( ($constname:ident, $fname:literal) ),* $(,)? ]) => {
        pub mod $modname {
            use super::EntryFunction;
            $(
                pub const $constname: EntryFunction = EntryFunction::new($module, $fname);
            )*
            pub const ALL: &[EntryFunction] = &[ $( $constname ),* ];
        }
    };
}

entry_functions!(profile, "profile", [
    (CREATE_PROFILE, "create_profile"),
    (GET_PROFILE, "get_profile_with_status"),
    (GET_FULL_PROFILE, "get_full_profile_info"),
    (HAS_PROFILE, "has_profile"),
    (TRANSFER_TOKENS, "transfer_tokens"),
]);

entry_functions!(space, "space", [
    (INITIALIZE_GLOBAL, "initialize_global"),
    (CREATE_EVENT, "create_event"),
    (GET_ALL_EVENTS, "get_all_events"),
    (GET_EVENTS_BY_CREATOR, "get_events_by_creator"),
    (GET_GLOBAL_EVENT_COUNT, "get_global_event_count"),
    (DELETE_EVENT, "delete_event"),
]);

entry_functions!(chat, "chat", [
    (INITIALIZE_GLOBAL_CHAT, "initialize_global_chat"),
    (INITIALIZE_INBOX, "initialize_inbox"),
    (POST_MESSAGE, "post_message"),
    (POST_ANONYMOUS, "post_anonymous"),
    (SEND_DIRECT_MESSAGE, "send_direct_message"),
    (MARK_CONVERSATION_READ, "mark_conversation_read"),
    (GET_ALL_MESSAGES, "get_all_messages"),
    (GET_RECENT_MESSAGES, "get_recent_messages"),
    (GET_MESSAGE_COUNT, "get_message_count"),
    (GET_DIRECT_MESSAGES, "get_direct_messages"),
    (GET_CONVERSATION, "get_conversation"),
    (GET_CONVERSATIONS, "get_conversations"),
    (GET_UNREAD_COUNT, "get_unread_count"),
    (HAS_INBOX, "has_inbox"),
]);

entry_functions!(poap, "poap", [
    (CREATE_COLLECTION, "create_collection"),
    (MINT_POAP, "mint_poap"),
    (SET_PAUSED, "set_paused"),
    (GET_HOLDERS, "get_holders"),
    (UPDATE_TIME, "update_time"),
    (END_MINT, "end_mint"),
    (INITIALIZE_MODULE, "initialize_module"),
    (HAS_POAP, "has_poap"),
    (IS_PAUSED, "is_paused"),
    (GET_POAP_INFO, "get_poap_info"),
    (VERIFY_PASSWORD, "verify_password"),
]);

entry_functions!(ups, "ups", [
    (INITIALIZE_ACCOUNT, "initialize_account"),
    (CLAIM_DAILY, "claim_daily"),
    (SEND_UPS, "send_ups"),
    (GENERATE_AND_SEND_UPS, "generate_and_send_ups"),
    (GET_BALANCE, "get_balance"),
    (GET_STREAK, "get_streak"),
    (GET_TOTAL_CLAIMED, "get_total_claimed"),
    (GET_UPS_SENT, "get_ups_sent"),
    (GET_UPS_RECEIVED, "get_ups_received"),
    (GET_FULL_ACCOUNT_INFO, "get_full_account_info"),
    (CAN_CLAIM, "can_claim_today"),
    (GET_NEXT_CLAIM_AMOUNT, "get_next_claim_amount"),
    (GET_TIME_UNTIL_NEXT_CLAIM, "get_time_until_next_claim"),
    (HAS_ACCOUNT, "has_account"),
    (GET_LEADERBOARD, "get_leaderboard_data"),
]);

/// Every entry point we know about
pub fn all_entry_functions() -> impl Iterator<Item = &'static EntryFunction> {
    profile::ALL
        .iter()
        .chain(space::ALL.iter())
        .chain(chat::ALL.iter())
        .chain(poap::ALL.iter())
        .chain(ups::ALL.iter())
}

/// Look up an entry point by `module::name` (or just `name` if unambiguous)
pub fn find_entry_function(s: &str) -> Option<EntryFunction> {
    let mut found = all_entry_functions().filter(|f| {
        format!("{}", f) == s || f.name == s
    });
    let first = found.next().copied();
    if found.next().is_some() {
        return None;
    }
    first
}

/// The transaction payload handed to a wallet for signing and submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryFunctionPayload {
    pub data: EntryFunctionData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryFunctionData {
    pub function: String,
    pub type_arguments: Vec<String>,
    pub function_arguments: Vec<Value>,
}

impl EntryFunctionPayload {
    pub fn function(&self) -> &str {
        &self.data.function
    }

    pub fn arguments(&self) -> &[Value] {
        &self.data.function_arguments
    }
}

/// A handle on the deployed Spacely modules: typed view calls and payload builders.
///
/// The per-contract operations are implemented in their own modules
/// (`people`, `chat`, `space`, `poap`, `ups`).
#[derive(Clone)]
pub struct Contracts {
    source: Arc<dyn ViewSource>,
    module_address: String,
}

impl Contracts {
    pub fn new(source: Arc<dyn ViewSource>, module_address: &str) -> Contracts {
        Contracts {
            source,
            module_address: module_address.to_owned(),
        }
    }

    pub fn module_address(&self) -> &str {
        &self.module_address
    }

    pub fn source(&self) -> &Arc<dyn ViewSource> {
        &self.source
    }

    pub fn view_request(&self, function: EntryFunction, arguments: Vec<Value>) -> ViewRequest {
        ViewRequest {
            function: function.qualified(&self.module_address),
            type_arguments: vec![],
            arguments,
        }
    }

    /// Call a view function and wrap its return values for positional decoding
    pub async fn view(
        &self,
        function: EntryFunction,
        arguments: Vec<Value>,
    ) -> Result<Returns, Error> {
        let request = self.view_request(function, arguments);
        tracing::debug!(target: "view", "VIEW {}", request.function);
        let values = self.source.view(&request).await?;
        Ok(Returns::new(values))
    }

    pub fn payload(&self, function: EntryFunction, arguments: Vec<Value>) -> EntryFunctionPayload {
        EntryFunctionPayload {
            data: EntryFunctionData {
                function: function.qualified(&self.module_address),
                type_arguments: vec![],
                function_arguments: arguments,
            },
        }
    }
}

/// Move `u64` arguments travel as decimal strings
pub fn u64_arg(n: u64) -> Value {
    Value::String(n.to_string())
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_qualified() {
        assert_eq!(
            profile::CREATE_PROFILE.qualified(MODULE_ADDRESS),
            format!("{}::profile::create_profile", MODULE_ADDRESS)
        );
        assert_eq!(format!("{}", ups::CAN_CLAIM), "ups::can_claim_today");
    }

    #[test]
    fn test_catalogue() {
        assert_eq!(all_entry_functions().count(), 5 + 6 + 14 + 11 + 15);
        assert_eq!(
            find_entry_function("chat::post_anonymous"),
            Some(chat::POST_ANONYMOUS)
        );
        assert_eq!(find_entry_function("claim_daily"), Some(ups::CLAIM_DAILY));
        assert_eq!(find_entry_function("no_such_thing"), None);
    }

    #[test]
    fn test_payload_wire_format() {
        let payload = EntryFunctionPayload {
            data: EntryFunctionData {
                function: "0x1::profile::create_profile".to_owned(),
                type_arguments: vec![],
                function_arguments: vec![json!("alice"), json!(""), json!("")],
            },
        };
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "data": {
                    "function": "0x1::profile::create_profile",
                    "typeArguments": [],
                    "functionArguments": ["alice", "", ""]
                }
            })
        );
    }
}
