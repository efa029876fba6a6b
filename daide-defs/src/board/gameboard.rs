use std::collections::HashMap;

use itertools::Itertools as _;
use thiserror::Error;

use crate::{
    DecodeError, Message, Node, catalog,
    token::{Category, Token},
};

use super::{
    order::{Order, OrderPhase},
    unit::{Location, Season, Turn, Unit, UnitKind},
};

#[derive(Error, Debug)]
pub enum GameError {
    #[error("No map received yet")]
    NoMap,
    #[error("Power unknown to the gameboard")]
    UnknownPower,
    #[error("Not a province: {0:?}")]
    UnknownProvince(Token),
    #[error("Order is illegal in the current phase")]
    BadPhaseForOrder,
    #[error("Malformed game message: {0}")]
    Malformed(&'static str),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// How a province is entered: army, fleet, or fleet on a named coast
/// of a bicoastal province.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AdjacencyKey {
    pub kind: UnitKind,
    pub coast: Option<Token>,
}

impl AdjacencyKey {
    pub fn army() -> Self {
        Self {
            kind: UnitKind::Army,
            coast: None,
        }
    }

    pub fn fleet(coast: Option<Token>) -> Self {
        Self {
            kind: UnitKind::Fleet,
            coast,
        }
    }
}

/// An order queued for submission, decorated with the server's
/// result once the ORD for it arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderEntry {
    pub order: Order,
    pub result: Option<Vec<Token>>,
}

/// The typed game-state store. Static map data is filled once from
/// the MDF and never changes; unit positions, ownership, retreats
/// and the order book track SCO/NOW/ORD messages.
#[derive(Debug)]
pub struct Gameboard {
    power_played: Option<Token>,
    powers: Vec<Token>,
    home_centers: HashMap<Token, Vec<Token>>,
    non_sc_provinces: Vec<Token>,
    adjacencies: HashMap<Token, HashMap<AdjacencyKey, Vec<Location>>>,
    coasts: HashMap<Token, Vec<Token>>,

    supply_centers: HashMap<Token, Vec<Token>>,
    units: HashMap<Token, Vec<Unit>>,
    turn: Option<Turn>,
    retreat_opts: HashMap<Unit, Vec<Location>>,
    orders: HashMap<Turn, Vec<OrderEntry>>,
}

fn as_list(node: &Node) -> Result<&[Node], GameError> {
    node.as_list()
        .ok_or(GameError::Malformed("expected a parenthesised list"))
}

fn as_token(node: &Node) -> Result<Token, GameError> {
    node.as_token()
        .ok_or(GameError::Malformed("expected a single token"))
}

fn as_power(node: &Node) -> Result<Token, GameError> {
    let token = as_token(node)?;
    if token.category() == Category::Power || token == catalog::UNO {
        Ok(token)
    } else {
        Err(GameError::UnknownPower)
    }
}

fn as_province(node: &Node) -> Result<Token, GameError> {
    let token = as_token(node)?;
    match token.category() {
        Category::Province(_) => Ok(token),
        _ => Err(GameError::UnknownProvince(token)),
    }
}

/// A location is a bare province or `( province coast )`.
fn as_location(node: &Node) -> Result<Location, GameError> {
    match node {
        Node::List(items) => match items.as_slice() {
            [province, coast] => {
                let coast = as_token(coast)?;
                if coast.category() != Category::Coast {
                    return Err(GameError::Malformed("expected a coast token"));
                }
                Ok(Location::with_coast(as_province(province)?, coast))
            }
            _ => Err(GameError::Malformed("expected ( province coast )")),
        },
        _ => Ok(Location::province(as_province(node)?)),
    }
}

impl Gameboard {
    /// Builds the static map data from a folded MDF:
    /// `MDF (powers) ((home center lists) (non-SC provinces))
    /// (adjacencies)`.
    pub fn from_mdf(message: &Message) -> Result<Self, GameError> {
        let folded = message.fold()?;
        let [head, powers_node, centers_node, adjacencies_node] = folded.as_slice() else {
            return Err(GameError::Malformed("MDF takes three argument lists"));
        };
        if head.as_token() != Some(catalog::MDF) {
            return Err(GameError::Malformed("expected MDF"));
        }

        let mut board = Self {
            power_played: None,
            powers: Vec::new(),
            home_centers: HashMap::new(),
            non_sc_provinces: Vec::new(),
            adjacencies: HashMap::new(),
            coasts: HashMap::new(),
            supply_centers: HashMap::new(),
            units: HashMap::new(),
            turn: None,
            retreat_opts: HashMap::new(),
            orders: HashMap::new(),
        };

        for power in as_list(powers_node)? {
            let power = as_token(power)?;
            if power.category() != Category::Power {
                return Err(GameError::UnknownPower);
            }
            board.powers.push(power);
            board.units.insert(power, Vec::new());
        }

        let [home_lists, non_sc] = as_list(centers_node)? else {
            return Err(GameError::Malformed(
                "expected ((home center lists) (non-SC provinces))",
            ));
        };
        for group in as_list(home_lists)? {
            let group = as_list(group)?;
            let [power, centers @ ..] = group else {
                return Err(GameError::Malformed("empty home center group"));
            };
            let power = as_power(power)?;
            let centers = centers.iter().map(as_province).collect::<Result<_, _>>()?;
            board.home_centers.insert(power, centers);
        }
        board.non_sc_provinces = as_list(non_sc)?
            .iter()
            .map(as_province)
            .collect::<Result<_, _>>()?;

        for entry in as_list(adjacencies_node)? {
            let entry = as_list(entry)?;
            let [province, edges @ ..] = entry else {
                return Err(GameError::Malformed("empty adjacency entry"));
            };
            let province = as_province(province)?;
            let per_kind = board.adjacencies.entry(province).or_default();
            for edge in edges {
                let edge = as_list(edge)?;
                let [key, neighbours @ ..] = edge else {
                    return Err(GameError::Malformed("empty adjacency edge"));
                };
                let key = match key {
                    Node::List(items) => match items.as_slice() {
                        [kind, coast] => {
                            let kind = UnitKind::from_token(as_token(kind)?)
                                .ok_or(GameError::Malformed("expected a unit type"))?;
                            let coast = as_token(coast)?;
                            board.coasts.entry(province).or_default().push(coast);
                            AdjacencyKey {
                                kind,
                                coast: Some(coast),
                            }
                        }
                        _ => return Err(GameError::Malformed("expected ( unit type coast )")),
                    },
                    _ => AdjacencyKey {
                        kind: UnitKind::from_token(as_token(key)?)
                            .ok_or(GameError::Malformed("expected a unit type"))?,
                        coast: None,
                    },
                };
                let neighbours = neighbours
                    .iter()
                    .map(as_location)
                    .collect::<Result<_, _>>()?;
                per_kind.insert(key, neighbours);
            }
        }

        Ok(board)
    }

    pub fn set_power_played(&mut self, power: Token) {
        self.power_played = Some(power);
    }

    pub fn power_played(&self) -> Option<Token> {
        self.power_played
    }

    pub fn powers(&self) -> &[Token] {
        &self.powers
    }

    pub fn home_centers(&self, power: Token) -> &[Token] {
        self.home_centers.get(&power).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn coasts(&self, province: Token) -> &[Token] {
        self.coasts.get(&province).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Provinces that are not supply centers.
    pub fn non_sc_provinces(&self) -> &[Token] {
        &self.non_sc_provinces
    }

    pub fn turn(&self) -> Option<Turn> {
        self.turn
    }

    pub fn season(&self) -> Option<Season> {
        self.turn.map(|turn| turn.season)
    }

    /// `( season year )` of the installed turn.
    pub fn current_turn(&self) -> Option<Message> {
        self.turn.and_then(|turn| turn.message())
    }

    /// `SCO (power centre...) ... (UNO centre...)`: replaces supply
    /// center ownership wholesale.
    pub fn process_sco(&mut self, message: &Message) -> Result<(), GameError> {
        let folded = message.fold()?;
        let [head, groups @ ..] = folded.as_slice() else {
            return Err(GameError::Malformed("empty SCO"));
        };
        if head.as_token() != Some(catalog::SCO) {
            return Err(GameError::Malformed("expected SCO"));
        }
        for centers in self.supply_centers.values_mut() {
            centers.clear();
        }
        for group in groups {
            let group = as_list(group)?;
            let [power, centers @ ..] = group else {
                return Err(GameError::Malformed("empty SCO group"));
            };
            let power = as_power(power)?;
            let centers = centers.iter().map(as_province).collect::<Result<_, _>>()?;
            self.supply_centers.insert(power, centers);
        }
        Ok(())
    }

    /// `NOW (season year) (power kind location (MRT (options))?)...`:
    /// installs the turn, replaces every unit position, records
    /// retreat options, and opens the order slot for the new turn.
    pub fn process_now(&mut self, message: &Message) -> Result<(), GameError> {
        let folded = message.fold()?;
        let [head, turn_node, positions @ ..] = folded.as_slice() else {
            return Err(GameError::Malformed("NOW takes a turn and positions"));
        };
        if head.as_token() != Some(catalog::NOW) {
            return Err(GameError::Malformed("expected NOW"));
        }
        let [season, year] = as_list(turn_node)? else {
            return Err(GameError::Malformed("expected ( season year )"));
        };
        let season = Season::from_token(as_token(season)?)
            .ok_or(GameError::Malformed("unknown season"))?;
        let year = year
            .as_integer()
            .ok_or(GameError::Malformed("expected a year literal"))?;
        let turn = Turn::new(season, year);
        self.turn = Some(turn);

        for units in self.units.values_mut() {
            units.clear();
        }
        self.retreat_opts.clear();

        for position in positions {
            let position = as_list(position)?;
            let [power, kind, location, rest @ ..] = position else {
                return Err(GameError::Malformed("short unit position"));
            };
            let power = as_power(power)?;
            if !self.powers.contains(&power) {
                return Err(GameError::UnknownPower);
            }
            let kind = UnitKind::from_token(as_token(kind)?)
                .ok_or(GameError::Malformed("expected a unit type"))?;
            let unit = Unit::new(power, kind, as_location(location)?);
            self.units.entry(power).or_default().push(unit);

            match rest {
                [] => {}
                [mrt, options] if mrt.as_token() == Some(catalog::MRT) => {
                    let options = as_list(options)?
                        .iter()
                        .map(as_location)
                        .collect::<Result<_, _>>()?;
                    self.retreat_opts.insert(unit, options);
                }
                _ => return Err(GameError::Malformed("trailing unit position data")),
            }
        }

        self.orders.entry(turn).or_default();
        Ok(())
    }

    /// `ORD (turn) (order) (result)`: attaches the result to the
    /// stored order with the matching body. Returns whether one
    /// matched; a miss is tolerated.
    pub fn process_ord(&mut self, message: &Message) -> Result<bool, GameError> {
        let folded = message.fold()?;
        let [head, turn_node, body, result] = folded.as_slice() else {
            return Err(GameError::Malformed("ORD takes turn, order and result"));
        };
        if head.as_token() != Some(catalog::ORD) {
            return Err(GameError::Malformed("expected ORD"));
        }
        let [season, year] = as_list(turn_node)? else {
            return Err(GameError::Malformed("expected ( season year )"));
        };
        let season = Season::from_token(as_token(season)?)
            .ok_or(GameError::Malformed("unknown season"))?;
        let year = year
            .as_integer()
            .ok_or(GameError::Malformed("expected a year literal"))?;
        let result = as_list(result)?
            .iter()
            .map(as_token)
            .collect::<Result<Vec<_>, _>>()?;

        let Some(entries) = self.orders.get_mut(&Turn::new(season, year)) else {
            return Ok(false);
        };
        let mut matched = false;
        for entry in entries.iter_mut() {
            if entry.order.matches(body) {
                entry.result = Some(result.clone());
                matched = true;
            }
        }
        Ok(matched)
    }

    fn own_power(&self) -> Result<Token, GameError> {
        self.power_played.ok_or(GameError::UnknownPower)
    }

    pub fn get_units(&self, power: Token) -> &[Unit] {
        self.units.get(&power).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn get_own_units(&self) -> &[Unit] {
        self.power_played
            .map(|power| self.get_units(power))
            .unwrap_or(&[])
    }

    pub fn get_supply_centers(&self, power: Token) -> &[Token] {
        self.supply_centers
            .get(&power)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn get_unit_of_province(&self, province: Token) -> Option<&Unit> {
        self.units
            .values()
            .flatten()
            .find(|unit| unit.location.province == province)
    }

    /// Locations the unit can reach from where it stands, by its own
    /// movement kind (a fleet on a named coast moves by that coast).
    pub fn get_moveable_adjacencies(&self, unit: &Unit) -> &[Location] {
        self.adjacencies
            .get(&unit.location.province)
            .and_then(|per_kind| {
                per_kind.get(&AdjacencyKey {
                    kind: unit.kind,
                    coast: unit.location.coast,
                })
            })
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Provinces reachable from here by both an army and a fleet,
    /// the candidate hops of a convoy.
    pub fn get_adjacent_provinces(&self, province: Token, coast: Option<Token>) -> Vec<Token> {
        let Some(per_kind) = self.adjacencies.get(&province) else {
            return Vec::new();
        };
        let by_key = |key: AdjacencyKey| {
            per_kind
                .get(&key)
                .map(Vec::as_slice)
                .unwrap_or(&[])
                .iter()
                .map(|location| location.province)
        };
        let fleet: Vec<Token> = by_key(AdjacencyKey::fleet(coast)).collect();
        by_key(AdjacencyKey::army())
            .filter(|province| fleet.contains(province))
            .unique()
            .collect()
    }

    /// Queues an order for the current turn, displacing any earlier
    /// non-waive order for the same unit.
    pub fn add(&mut self, order: Order) -> Result<(), GameError> {
        let turn = self.turn.ok_or(GameError::BadPhaseForOrder)?;
        let legal = match order.phase() {
            OrderPhase::Movement => turn.season.is_movement(),
            OrderPhase::Retreat => turn.season.is_retreat(),
            OrderPhase::Adjustment => turn.season.is_adjustment(),
        };
        if !legal {
            return Err(GameError::BadPhaseForOrder);
        }
        let entries = self.orders.entry(turn).or_default();
        if let Some(unit) = order.unit() {
            entries.retain(|entry| entry.order.unit() != Some(unit));
        }
        entries.push(OrderEntry {
            order,
            result: None,
        });
        Ok(())
    }

    /// The queued orders of the current turn as `(order) (order) ...`
    /// in insertion order; the caller prefixes SUB.
    pub fn get_orders(&self) -> Message {
        self.current_orders()
            .iter()
            .fold(Message::new(), |acc, entry| {
                acc.concat(entry.order.message())
            })
    }

    pub fn orders_for(&self, turn: &Turn) -> &[OrderEntry] {
        self.orders.get(turn).map(Vec::as_slice).unwrap_or(&[])
    }

    fn current_orders(&self) -> &[OrderEntry] {
        self.turn
            .map(|turn| self.orders_for(&turn))
            .unwrap_or(&[])
    }

    pub fn is_ordered(&self, unit: &Unit) -> bool {
        self.current_orders()
            .iter()
            .any(|entry| entry.order.unit() == Some(unit))
    }

    pub fn get_ordered(&self) -> Vec<Unit> {
        self.current_orders()
            .iter()
            .filter_map(|entry| entry.order.unit().copied())
            .collect()
    }

    pub fn get_unordered(&self) -> Vec<Unit> {
        self.get_own_units()
            .iter()
            .filter(|unit| !self.is_ordered(unit))
            .copied()
            .collect()
    }

    /// Whether some own unit still has no order this turn.
    pub fn missing_orders(&self) -> bool {
        !self.get_unordered().is_empty()
    }

    /// Own units that must retreat, with their options. An empty
    /// option list means the unit can only disband.
    pub fn get_dislodged(&self) -> Vec<(Unit, Vec<Location>)> {
        let Some(power) = self.power_played else {
            return Vec::new();
        };
        self.retreat_opts
            .iter()
            .filter(|(unit, _)| unit.power == power)
            .map(|(unit, options)| (*unit, options.clone()))
            .sorted_by_key(|(unit, _)| (unit.location.province, unit.location.coast))
            .collect()
    }

    /// Supply centers held minus units owned; positive means builds
    /// are due, negative removals.
    pub fn sc_surplus(&self) -> Result<i32, GameError> {
        let power = self.own_power()?;
        Ok(self.get_supply_centers(power).len() as i32 - self.get_units(power).len() as i32)
    }

    /// `(builds, waives)` for the adjustment phase: as many builds as
    /// open home centers allow, the rest of the surplus waived.
    pub fn build_numbers(&self) -> Result<(i32, i32), GameError> {
        let surplus = self.sc_surplus()?.max(0);
        let builds = surplus.min(self.open_home_centers()?.len() as i32);
        Ok((builds, surplus - builds))
    }

    /// Home centers still owned and not occupied by an own unit, the
    /// only places a build may go.
    pub fn open_home_centers(&self) -> Result<Vec<Token>, GameError> {
        let power = self.own_power()?;
        let owned = self.get_supply_centers(power);
        let occupied: Vec<Token> = self
            .get_units(power)
            .iter()
            .map(|unit| unit.location.province)
            .collect();
        Ok(self
            .home_centers(power)
            .iter()
            .filter(|province| owned.contains(province) && !occupied.contains(province))
            .copied()
            .collect())
    }
}
