use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Identifier of one of the members sharing the bank.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerId {
    Alan,
    Carlitos,
    Criss,
    Foquita,
    Tommy,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    pub name: &'static str,
}

/// The closed roster, in display order.
pub const PLAYERS: [Player; 5] = [
    Player {
        id: PlayerId::Alan,
        name: "Alan",
    },
    Player {
        id: PlayerId::Carlitos,
        name: "Carlitos",
    },
    Player {
        id: PlayerId::Criss,
        name: "Criss",
    },
    Player {
        id: PlayerId::Foquita,
        name: "Foquita",
    },
    Player {
        id: PlayerId::Tommy,
        name: "Tommy",
    },
];

impl PlayerId {
    pub const ALL: [PlayerId; 5] = [
        PlayerId::Alan,
        PlayerId::Carlitos,
        PlayerId::Criss,
        PlayerId::Foquita,
        PlayerId::Tommy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerId::Alan => "alan",
            PlayerId::Carlitos => "carlitos",
            PlayerId::Criss => "criss",
            PlayerId::Foquita => "foquita",
            PlayerId::Tommy => "tommy",
        }
    }

    /// Display name, as written in the sheet's name column.
    pub fn name(&self) -> &'static str {
        PLAYERS[*self as usize].name
    }

    /// Looks a player up by display name (exact match).
    pub fn from_name(name: &str) -> Option<Self> {
        PLAYERS.iter().find(|p| p.name == name).map(|p| p.id)
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown player: {0}")]
pub struct UnknownPlayer(pub String);

impl FromStr for PlayerId {
    type Err = UnknownPlayer;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        PlayerId::ALL
            .into_iter()
            .find(|id| id.as_str().eq_ignore_ascii_case(needle))
            .ok_or_else(|| UnknownPlayer(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roster_order_matches_ids() {
        for (i, player) in PLAYERS.iter().enumerate() {
            assert_eq!(player.id, PlayerId::ALL[i]);
            assert_eq!(player.id.name(), player.name);
        }
    }

    #[test]
    fn test_parse_and_lookup() {
        assert_eq!("Alan".parse::<PlayerId>(), Ok(PlayerId::Alan));
        assert_eq!(" tommy ".parse::<PlayerId>(), Ok(PlayerId::Tommy));
        assert!("bob".parse::<PlayerId>().is_err());

        assert_eq!(PlayerId::from_name("Foquita"), Some(PlayerId::Foquita));
        assert_eq!(PlayerId::from_name("foquita"), None);
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&PlayerId::Carlitos).unwrap();
        assert_eq!(json, "\"carlitos\"");
        let id: PlayerId = serde_json::from_str("\"criss\"").unwrap();
        assert_eq!(id, PlayerId::Criss);
    }
}
