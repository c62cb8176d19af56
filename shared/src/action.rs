use crate::ProtocolError;
use serde::{Deserialize, Serialize};

/// Client intents. On the wire an action is its `u8` code, so an unknown code
/// survives decoding and is rejected here instead.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    MoveDown,
    MoveUp,
    Fire,
}

impl Action {
    pub const ALL: [Action; 3] = [Action::MoveDown, Action::MoveUp, Action::Fire];

    pub fn code(self) -> u8 {
        match self {
            Action::MoveDown => 0,
            Action::MoveUp => 1,
            Action::Fire => 2,
        }
    }
}

impl TryFrom<u8> for Action {
    type Error = ProtocolError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Action::MoveDown),
            1 => Ok(Action::MoveUp),
            2 => Ok(Action::Fire),
            other => Err(ProtocolError::InvalidAction(other)),
        }
    }
}

impl From<Action> for u8 {
    fn from(action: Action) -> Self {
        action.code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_codes() {
        for action in Action::ALL {
            assert_eq!(Action::try_from(action.code()), Ok(action));
        }
    }

    #[test]
    fn test_unknown_codes_rejected() {
        for code in 3..=u8::MAX {
            assert_eq!(
                Action::try_from(code),
                Err(ProtocolError::InvalidAction(code))
            );
        }
    }
}
