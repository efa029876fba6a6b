use crate::{Message, catalog, token::Token};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitKind {
    Army,
    Fleet,
}

impl UnitKind {
    pub fn token(self) -> Token {
        match self {
            UnitKind::Army => catalog::AMY,
            UnitKind::Fleet => catalog::FLT,
        }
    }

    pub fn from_token(token: Token) -> Option<Self> {
        Some(match token {
            catalog::AMY => UnitKind::Army,
            catalog::FLT => UnitKind::Fleet,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Season {
    Spring,
    Summer,
    Fall,
    Autumn,
    Winter,
}

impl Season {
    pub fn token(self) -> Token {
        match self {
            Season::Spring => catalog::SPR,
            Season::Summer => catalog::SUM,
            Season::Fall => catalog::FAL,
            Season::Autumn => catalog::AUT,
            Season::Winter => catalog::WIN,
        }
    }

    pub fn from_token(token: Token) -> Option<Self> {
        Some(match token {
            catalog::SPR => Season::Spring,
            catalog::SUM => Season::Summer,
            catalog::FAL => Season::Fall,
            catalog::AUT => Season::Autumn,
            catalog::WIN => Season::Winter,
            _ => return None,
        })
    }

    /// Spring and Fall take movement orders.
    pub fn is_movement(self) -> bool {
        matches!(self, Season::Spring | Season::Fall)
    }

    /// Summer and Autumn take retreats and disbands.
    pub fn is_retreat(self) -> bool {
        matches!(self, Season::Summer | Season::Autumn)
    }

    /// Winter takes builds, removals and waives.
    pub fn is_adjustment(self) -> bool {
        matches!(self, Season::Winter)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Turn {
    pub season: Season,
    pub year: i32,
}

impl Turn {
    pub fn new(season: Season, year: i32) -> Self {
        Self { season, year }
    }

    /// `( season year )`. None if the year cannot be carried as an
    /// integer literal, which wire-installed turns never hit.
    pub fn message(&self) -> Option<Message> {
        let year = Token::integer(self.year).ok()?;
        Some(
            Message::of(self.season.token())
                .concat(Message::of(year))
                .wrap(),
        )
    }
}

/// A province, plus the coast a fleet sits on in a bicoastal one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Location {
    pub province: Token,
    pub coast: Option<Token>,
}

impl Location {
    pub fn province(province: Token) -> Self {
        Self {
            province,
            coast: None,
        }
    }

    pub fn with_coast(province: Token, coast: Token) -> Self {
        Self {
            province,
            coast: Some(coast),
        }
    }

    /// Bare province token, or `( province coast )`.
    pub fn message(&self) -> Message {
        match self.coast {
            None => Message::of(self.province),
            Some(coast) => Message::of(self.province)
                .concat(Message::of(coast))
                .wrap(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Unit {
    pub power: Token,
    pub kind: UnitKind,
    pub location: Location,
}

impl Unit {
    pub fn new(power: Token, kind: UnitKind, location: Location) -> Self {
        Self {
            power,
            kind,
            location,
        }
    }

    pub fn is_army(&self) -> bool {
        self.kind == UnitKind::Army
    }

    pub fn is_fleet(&self) -> bool {
        self.kind == UnitKind::Fleet
    }

    /// `power kind location`
    pub fn tokenize(&self) -> Message {
        Message::of(self.power)
            .concat(Message::of(self.kind.token()))
            .concat(self.location.message())
    }

    /// `( power kind location )`
    pub fn wrap(&self) -> Message {
        self.tokenize().wrap()
    }
}

#[cfg(test)]
mod test {
    use super::{Location, Season, Turn, Unit, UnitKind};
    use crate::catalog;

    #[test]
    fn unit_tokenizes_with_and_without_coast() {
        let fleet = Unit::new(catalog::ENG, UnitKind::Fleet, Location::province(catalog::LON));
        assert_eq!(fleet.wrap().to_string(), "( ENG FLT LON )");

        let bicoastal = Unit::new(
            catalog::RUS,
            UnitKind::Fleet,
            Location::with_coast(catalog::STP, catalog::SCS),
        );
        assert_eq!(bicoastal.wrap().to_string(), "( RUS FLT ( STP SCS ) )");
    }

    #[test]
    fn season_phases() {
        assert!(Season::Spring.is_movement());
        assert!(Season::Fall.is_movement());
        assert!(Season::Summer.is_retreat());
        assert!(Season::Autumn.is_retreat());
        assert!(Season::Winter.is_adjustment());
        assert!(!Season::Winter.is_movement());
    }

    #[test]
    fn turn_message() {
        let turn = Turn::new(Season::Spring, 1901);
        assert_eq!(turn.message().unwrap().to_string(), "( SPR 1901 )");
    }
}
