use crate::misc::now_secs;

/// A status line and when it was written
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusMessage {
    pub text: String,
    pub at: u64,
}

/// A queue of up to three status messages, generally representing errors
/// from background reads that have nowhere else to go.
pub struct StatusQueue {
    head: usize,
    messages: [StatusMessage; 3],
}

impl Default for StatusQueue {
    fn default() -> StatusQueue {
        StatusQueue {
            head: 0,
            messages: Default::default(),
        }
    }
}

impl StatusQueue {
    pub fn new(initial: String) -> StatusQueue {
        let mut sq: StatusQueue = Default::default();
        sq.write(initial);
        sq
    }

    /// Newest first, skipping empty or dismissed slots
    pub fn read_all(&self) -> Vec<StatusMessage> {
        (0..3)
            .map(|offset| &self.messages[(self.head + offset) % 3])
            .filter(|m| !m.text.is_empty())
            .cloned()
            .collect()
    }

    pub fn read_last(&self) -> String {
        self.messages[self.head].text.clone()
    }

    pub fn write(&mut self, text: String) {
        self.head = (self.head + 2) % 3; // like -1, but modular safe
        self.messages[self.head] = StatusMessage {
            text,
            at: now_secs(),
        };
    }

    /// Dismiss by position, 0 being the newest
    pub fn dismiss(&mut self, offset: usize) {
        self.messages[(self.head + offset) % 3] = StatusMessage::default();
    }
}
