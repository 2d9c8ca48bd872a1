use serde::{Deserialize, Serialize};

/// Represents the current state of the user dialogue
#[derive(Clone, Serialize, Deserialize, Default)]
pub enum State {
    /// Initial state; free-form code messages are accepted here
    #[default]
    Start,
    /// User pressed /test and the next message is treated as code
    AwaitingCode,
}
