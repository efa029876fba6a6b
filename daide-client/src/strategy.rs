use daide_defs::board::{GameError, Gameboard, Location, Order, Unit, UnitKind};
use rand::seq::{IndexedRandom as _, SliceRandom as _};

/// Produces orders for the current phase by queueing them on the
/// board. Leaving a unit unordered is fine, the server holds it.
pub trait OrderStrategy {
    fn generate(&mut self, board: &mut Gameboard) -> Result<(), GameError>;
}

/// Holds every unit, takes the first retreat option, builds armies
/// on open home centers and waives whatever is left over.
#[derive(Debug, Default)]
pub struct HoldStrategy;

impl OrderStrategy for HoldStrategy {
    fn generate(&mut self, board: &mut Gameboard) -> Result<(), GameError> {
        let Some(season) = board.season() else {
            return Ok(());
        };
        if season.is_movement() {
            for unit in board.get_own_units().to_vec() {
                board.add(Order::Hold { unit })?;
            }
        } else if season.is_retreat() {
            for (unit, options) in board.get_dislodged() {
                match options.first() {
                    None => board.add(Order::Disband { unit })?,
                    Some(dest) => board.add(Order::Retreat { unit, dest: *dest })?,
                }
            }
        } else {
            let surplus = board.sc_surplus()?;
            if surplus < 0 {
                let removals = board.get_unordered();
                for unit in removals.into_iter().take(surplus.unsigned_abs() as usize) {
                    board.add(Order::Remove { unit })?;
                }
            } else if surplus > 0 {
                let power = board.power_played().ok_or(GameError::UnknownPower)?;
                let (builds, waives) = board.build_numbers()?;
                let open = board.open_home_centers()?;
                for province in open.into_iter().take(builds as usize) {
                    board.add(Order::Build {
                        unit: Unit::new(power, UnitKind::Army, Location::province(province)),
                    })?;
                }
                for _ in 0..waives {
                    board.add(Order::Waive { power })?;
                }
            }
        }
        Ok(())
    }
}

/// Coin-flips every unit between holding and a random legal move;
/// retreats, builds and removals are sampled uniformly.
#[derive(Debug, Default)]
pub struct RandomStrategy;

impl OrderStrategy for RandomStrategy {
    fn generate(&mut self, board: &mut Gameboard) -> Result<(), GameError> {
        let mut rng = rand::rng();
        let Some(season) = board.season() else {
            return Ok(());
        };
        if season.is_movement() {
            for unit in board.get_own_units().to_vec() {
                let destinations = board.get_moveable_adjacencies(&unit).to_vec();
                match destinations.choose(&mut rng) {
                    Some(dest) if rand::random_bool(0.5) => {
                        board.add(Order::Move { unit, dest: *dest })?
                    }
                    _ => board.add(Order::Hold { unit })?,
                }
            }
        } else if season.is_retreat() {
            for (unit, options) in board.get_dislodged() {
                match options.choose(&mut rng) {
                    None => board.add(Order::Disband { unit })?,
                    Some(dest) => board.add(Order::Retreat { unit, dest: *dest })?,
                }
            }
        } else {
            let surplus = board.sc_surplus()?;
            if surplus < 0 {
                let mut removals = board.get_unordered();
                removals.shuffle(&mut rng);
                for unit in removals.into_iter().take(surplus.unsigned_abs() as usize) {
                    board.add(Order::Remove { unit })?;
                }
            } else if surplus > 0 {
                let power = board.power_played().ok_or(GameError::UnknownPower)?;
                let (builds, waives) = board.build_numbers()?;
                let open = board.open_home_centers()?;
                let sites: Vec<_> = open
                    .choose_multiple(&mut rng, builds as usize)
                    .copied()
                    .collect();
                for province in sites {
                    board.add(Order::Build {
                        unit: Unit::new(power, UnitKind::Army, Location::province(province)),
                    })?;
                }
                for _ in 0..waives {
                    board.add(Order::Waive { power })?;
                }
            }
        }
        Ok(())
    }
}
