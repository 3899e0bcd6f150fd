use std::fmt;

/// Logical namespaces of the leaderboard's key-value layout.
/// This enum is the only place the on-disk prefixes are spelled out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Namespace {
    /// Registered players, keyed by player id
    Players,
    /// Season bodies, keyed by season id
    Seasons,
    /// Single record holding the latest season id
    LatestSeason,
}

impl Namespace {
    pub const ALL: [Namespace; 3] = [
        Namespace::Players,
        Namespace::Seasons,
        Namespace::LatestSeason,
    ];

    pub fn prefix(self) -> &'static str {
        match self {
            Namespace::Players => "leaderboard_players",
            Namespace::Seasons => "leaderboard_seasons",
            Namespace::LatestSeason => "leaderboard_season_id",
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|ns| ns.prefix() == prefix)
    }
}

/// Fully qualified key: a namespace plus an optional record id.
/// Singleton namespaces such as `LatestSeason` have no id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key {
    pub namespace: Namespace,
    pub id: Option<String>,
}

impl Key {
    pub fn player(player_id: &str) -> Self {
        Self {
            namespace: Namespace::Players,
            id: Some(player_id.to_string()),
        }
    }

    pub fn season(season_id: &str) -> Self {
        Self {
            namespace: Namespace::Seasons,
            id: Some(season_id.to_string()),
        }
    }

    pub fn latest_season() -> Self {
        Self {
            namespace: Namespace::LatestSeason,
            id: None,
        }
    }

    /// Parses the rendered form produced by `Display`
    pub fn parse(raw: &str) -> Option<Self> {
        let (prefix, id) = match raw.split_once('/') {
            Some((prefix, id)) => (prefix, Some(id.to_string())),
            None => (raw, None),
        };
        let namespace = Namespace::from_prefix(prefix)?;
        Some(Self { namespace, id })
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "{}/{}", self.namespace.prefix(), id),
            None => f.write_str(self.namespace.prefix()),
        }
    }
}
