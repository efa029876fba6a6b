use crate::{
    Message, Node, catalog,
    token::Token,
};

use super::unit::{Location, Unit};

/// Which turn kind an order belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OrderPhase {
    Movement,
    Retreat,
    Adjustment,
}

/// An order for one unit (or a power-level waive). Each variant has
/// a fixed wire rendering; result reconciliation compares the folded
/// wire forms structurally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Order {
    Hold {
        unit: Unit,
    },
    Move {
        unit: Unit,
        dest: Location,
    },
    SupportHold {
        unit: Unit,
        supported: Unit,
    },
    /// The destination of a supported move carries no coast.
    SupportMove {
        unit: Unit,
        supported: Unit,
        dest: Token,
    },
    Convoy {
        fleet: Unit,
        army: Unit,
        dest: Token,
    },
    MoveViaConvoy {
        army: Unit,
        dest: Token,
        path: Vec<Token>,
    },
    Retreat {
        unit: Unit,
        dest: Location,
    },
    Disband {
        unit: Unit,
    },
    Build {
        unit: Unit,
    },
    Remove {
        unit: Unit,
    },
    Waive {
        power: Token,
    },
}

impl Order {
    /// The commanded unit; a waive commands none.
    pub fn unit(&self) -> Option<&Unit> {
        match self {
            Order::Hold { unit }
            | Order::Move { unit, .. }
            | Order::SupportHold { unit, .. }
            | Order::SupportMove { unit, .. }
            | Order::Retreat { unit, .. }
            | Order::Disband { unit }
            | Order::Build { unit }
            | Order::Remove { unit } => Some(unit),
            Order::Convoy { fleet, .. } => Some(fleet),
            Order::MoveViaConvoy { army, .. } => Some(army),
            Order::Waive { .. } => None,
        }
    }

    pub(crate) fn phase(&self) -> OrderPhase {
        match self {
            Order::Hold { .. }
            | Order::Move { .. }
            | Order::SupportHold { .. }
            | Order::SupportMove { .. }
            | Order::Convoy { .. }
            | Order::MoveViaConvoy { .. } => OrderPhase::Movement,
            Order::Retreat { .. } | Order::Disband { .. } => OrderPhase::Retreat,
            Order::Build { .. } | Order::Remove { .. } | Order::Waive { .. } => {
                OrderPhase::Adjustment
            }
        }
    }

    /// Canonical wire form, already wrapped for a SUB list.
    pub fn message(&self) -> Message {
        match self {
            Order::Hold { unit } => unit.wrap().concat(Message::of(catalog::HLD)).wrap(),
            Order::Move { unit, dest } => unit
                .wrap()
                .concat(Message::of(catalog::MTO))
                .concat(dest.message())
                .wrap(),
            Order::SupportHold { unit, supported } => unit
                .wrap()
                .concat(Message::of(catalog::SUP))
                .concat(supported.wrap())
                .wrap(),
            Order::SupportMove {
                unit,
                supported,
                dest,
            } => unit
                .wrap()
                .concat(Message::of(catalog::SUP))
                .concat(supported.wrap())
                .concat(Message::of(catalog::MTO))
                .concat(Message::of(*dest))
                .wrap(),
            Order::Convoy { fleet, army, dest } => fleet
                .wrap()
                .concat(Message::of(catalog::CVY))
                .concat(army.wrap())
                .concat(Message::of(catalog::CTO))
                .concat(Message::of(*dest))
                .wrap(),
            Order::MoveViaConvoy { army, dest, path } => army
                .wrap()
                .concat(Message::of(catalog::CTO))
                .concat(Message::of(*dest))
                .concat(Message::of(catalog::VIA))
                .concat(path.iter().copied().collect::<Message>().wrap())
                .wrap(),
            Order::Retreat { unit, dest } => unit
                .wrap()
                .concat(Message::of(catalog::RTO))
                .concat(dest.message())
                .wrap(),
            Order::Disband { unit } => unit.wrap().concat(Message::of(catalog::DSB)).wrap(),
            Order::Build { unit } => unit.wrap().concat(Message::of(catalog::BLD)).wrap(),
            Order::Remove { unit } => unit.wrap().concat(Message::of(catalog::REM)).wrap(),
            Order::Waive { power } => Message::of(*power)
                .concat(Message::of(catalog::WVE))
                .wrap(),
        }
    }

    /// Whether an ORD order body refers to this order.
    pub fn matches(&self, body: &Node) -> bool {
        self.message()
            .fold()
            .ok()
            .and_then(|mut nodes| nodes.pop())
            .is_some_and(|own| own == *body)
    }
}

#[cfg(test)]
mod test {
    use super::Order;
    use crate::board::unit::{Location, Unit, UnitKind};
    use crate::catalog;

    fn eng_fleet_lon() -> Unit {
        Unit::new(catalog::ENG, UnitKind::Fleet, Location::province(catalog::LON))
    }

    #[test]
    #[rustfmt::skip]
    fn hold_order_wire_bytes() {
        let order = Order::Hold { unit: eng_fleet_lon() };
        assert_eq!(order.message().to_string(), "( ( ENG FLT LON ) HLD )");
        assert_eq!(
            order.message().pack(),
            [0x40, 0x00, 0x40, 0x00, 0x41, 0x01, 0x42, 0x01, 0x55, 0x3A, 0x40, 0x01, 0x43, 0x22, 0x40, 0x01]
        );
    }

    #[test]
    fn wire_forms() {
        let unit = eng_fleet_lon();
        let army = Unit::new(catalog::ENG, UnitKind::Army, Location::province(catalog::WAL));
        let other = Unit::new(catalog::FRA, UnitKind::Fleet, Location::province(catalog::ECH));

        assert_eq!(
            Order::Move { unit, dest: Location::province(catalog::NTH) }
                .message()
                .to_string(),
            "( ( ENG FLT LON ) MTO NTH )"
        );
        assert_eq!(
            Order::Move {
                unit,
                dest: Location::with_coast(catalog::SPA, catalog::NCS),
            }
            .message()
            .to_string(),
            "( ( ENG FLT LON ) MTO ( SPA NCS ) )"
        );
        assert_eq!(
            Order::SupportHold { unit, supported: other }.message().to_string(),
            "( ( ENG FLT LON ) SUP ( FRA FLT ECH ) )"
        );
        assert_eq!(
            Order::SupportMove { unit, supported: other, dest: catalog::BRE }
                .message()
                .to_string(),
            "( ( ENG FLT LON ) SUP ( FRA FLT ECH ) MTO BRE )"
        );
        assert_eq!(
            Order::Convoy { fleet: other, army, dest: catalog::BRE }
                .message()
                .to_string(),
            "( ( FRA FLT ECH ) CVY ( ENG AMY WAL ) CTO BRE )"
        );
        assert_eq!(
            Order::MoveViaConvoy {
                army,
                dest: catalog::BRE,
                path: vec![catalog::ECH],
            }
            .message()
            .to_string(),
            "( ( ENG AMY WAL ) CTO BRE VIA ( ECH ) )"
        );
        assert_eq!(
            Order::Retreat { unit, dest: Location::province(catalog::YOR) }
                .message()
                .to_string(),
            "( ( ENG FLT LON ) RTO YOR )"
        );
        assert_eq!(
            Order::Disband { unit }.message().to_string(),
            "( ( ENG FLT LON ) DSB )"
        );
        assert_eq!(
            Order::Build { unit }.message().to_string(),
            "( ( ENG FLT LON ) BLD )"
        );
        assert_eq!(
            Order::Remove { unit }.message().to_string(),
            "( ( ENG FLT LON ) REM )"
        );
        assert_eq!(
            Order::Waive { power: catalog::ENG }.message().to_string(),
            "( ENG WVE )"
        );
    }

    #[test]
    fn matches_its_own_folded_body() {
        let order = Order::Hold { unit: eng_fleet_lon() };
        let folded = order.message().fold().unwrap();
        assert!(order.matches(&folded[0]));

        let other = Order::Disband { unit: eng_fleet_lon() };
        assert!(!other.matches(&folded[0]));
    }
}
