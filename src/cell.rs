use strum::EnumIs;

/// The fixed symbol for each non-portal cell kind.
pub(crate) const START: char = 'H';
pub(crate) const LAND: char = '.';
pub(crate) const WATER: char = '~';
pub(crate) const BLOCKER: char = 'W';
pub(crate) const BONUS: char = 'C';
pub(crate) const GOLD_BONUS: char = 'G';
pub(crate) const HAZARD: char = 'S';

/// What occupies a cell of a [`Board`](crate::Board).
///
/// Kinds are fixed once a board is built.
/// [`Blocker`](CellKind::Blocker) never appears on an input board; it marks cells chosen by the solver in a [`Solution`](crate::Solution).
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, EnumIs)]
pub enum CellKind {
    /// Open land, the only kind a blocker may be placed on.
    #[default]
    Land,
    /// Impassable and never reachable.
    Water,
    /// The cell reachability is measured from.
    Start,
    /// A placed blocker.
    Blocker,
    /// One end of a portal; a portal links to the other cell carrying the same symbol.
    Portal {
        /// Digit or lowercase letter shared by both ends of the pair.
        symbol: char,
    },
    /// Worth extra points when reachable.
    Bonus,
    /// Worth many extra points when reachable.
    GoldBonus,
    /// Costs points when reachable.
    Hazard,
}

impl CellKind {
    /// Whether a portal may use `symbol`.
    pub(crate) fn is_portal_symbol(symbol: char) -> bool {
        symbol.is_ascii_digit() || symbol.is_ascii_lowercase()
    }

    /// Score added on top of the base point when a cell of this kind is reachable.
    pub fn bonus(&self) -> i64 {
        match self {
            Self::Bonus => 3,
            Self::GoldBonus => 10,
            Self::Hazard => -5,
            _ => 0,
        }
    }

    /// Total score of a reachable cell of this kind.
    pub fn weight(&self) -> i64 {
        1 + self.bonus()
    }

    /// Whether a blocker may ever occupy a cell of this kind.
    pub fn blockable(&self) -> bool {
        matches!(self, Self::Land)
    }

    /// Kinds which are forced unreachable when they sit on the border of the board.
    /// Border portals are handled separately since they also drag their exit along.
    pub(crate) fn sealed_on_border(&self) -> bool {
        matches!(self, Self::Land | Self::Bonus | Self::GoldBonus | Self::Hazard)
    }

    pub(crate) fn symbol(&self) -> char {
        match self {
            Self::Land => LAND,
            Self::Water => WATER,
            Self::Start => START,
            Self::Blocker => BLOCKER,
            Self::Portal { symbol } => *symbol,
            Self::Bonus => BONUS,
            Self::GoldBonus => GOLD_BONUS,
            Self::Hazard => HAZARD,
        }
    }
}

impl TryFrom<char> for CellKind {
    type Error = char;

    fn try_from(value: char) -> Result<Self, Self::Error> {
        Ok(match value {
            START => Self::Start,
            LAND => Self::Land,
            WATER => Self::Water,
            BONUS => Self::Bonus,
            GOLD_BONUS => Self::GoldBonus,
            HAZARD => Self::Hazard,
            symbol if Self::is_portal_symbol(symbol) => Self::Portal { symbol },
            other => return Err(other),
        })
    }
}
