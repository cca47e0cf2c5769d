//! Authoritative match state and the fixed-timestep tick.
//!
//! Only the server calls [`Game::update`]; clients display decoded snapshots.
//! Each tick moves every live player, then resolves collisions against the
//! frozen post-move state so that the outcome does not depend on player order.

use crate::config::GameConfig;
use crate::controls::Controls;
use crate::error::GameError;
use crate::map::{Cell, Map};
use crate::spawn::{free_cells, sample_cells, SpawnReport};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

/// Server update interval in seconds.
pub const TICK: f32 = 1.0 / 30.0;

/// Downward acceleration applied to the jump arc, units per second squared.
pub const GRAVITY: f32 = 5.0;

/// Jump velocity as a multiple of the player's grid velocity.
pub const JUMP_SPEED_FACTOR: f32 = 3.0;

/// Height of a player standing on the ground.
pub const REST_HEIGHT: f32 = 0.5;

// Absorbs f32 rounding in `elapsed` so a step due exactly at a tick boundary
// is not pushed into the next tick.
const MOVE_TIMER_EPSILON: f64 = 1e-6;

/// Facing / movement direction. The discriminant is the wire tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Direction {
    Left = 0,
    #[default]
    Right = 1,
    Up = 2,
    Down = 3,
}

impl Direction {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Direction::Left),
            1 => Some(Direction::Right),
            2 => Some(Direction::Up),
            3 => Some(Direction::Down),
            _ => None,
        }
    }

    /// Unit step on the grid; up is +y.
    pub fn offset(self) -> (i32, i32) {
        match self {
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
            Direction::Up => (0, 1),
            Direction::Down => (0, -1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum AppleType {
    #[default]
    Normal = 0,
}

impl AppleType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(AppleType::Normal),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Apple {
    pub position: Cell,
    pub kind: AppleType,
}

impl Apple {
    pub fn new(position: Cell, kind: AppleType) -> Self {
        Self { position, kind }
    }
}

/// Stable handle to a player. A handle outlives its player: once the player
/// is removed the handle no longer resolves, even if the slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerId {
    index: u32,
    generation: u32,
}

impl PlayerId {
    pub fn index(self) -> u32 {
        self.index
    }
}

/// One snake.
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    /// Input accumulated from the client since the last tick.
    pub controls: Controls,
    pub color: [f32; 3],
    pub direction: Direction,
    /// Grid steps per second.
    pub velocity: f32,
    /// Seconds until the next grid step.
    pub move_timer: f64,
    pub jump_velocity: f32,
    /// Cosmetic height of the jump arc; never affects occupancy.
    pub height: f32,
    pub alive: bool,
    /// Occupied cells, tail first, head last.
    pub body: Vec<Cell>,
    pub name: String,
}

impl Player {
    pub fn new(body: Vec<Cell>, direction: Direction, velocity: f32) -> Self {
        Self {
            controls: Controls::default(),
            color: [1.0, 1.0, 1.0],
            direction,
            velocity,
            move_timer: 1.0 / f64::from(velocity),
            jump_velocity: 0.0,
            height: REST_HEIGHT,
            alive: true,
            body,
            name: String::new(),
        }
    }

    pub fn head(&self) -> Option<Cell> {
        self.body.last().copied()
    }

    /// The segment right behind the head.
    pub fn neck(&self) -> Option<Cell> {
        self.body.len().checked_sub(2).map(|i| self.body[i])
    }

    /// A move is refused only if it would put the head onto the neck.
    pub fn can_move(&self, direction: Direction) -> bool {
        match (self.head(), self.neck()) {
            (Some(head), Some(neck)) => {
                let (dx, dy) = direction.offset();
                head.offset(dx, dy) != neck
            }
            _ => true,
        }
    }

    /// First held direction button, in priority order left, right, down, up,
    /// that does not reverse into the neck.
    pub fn requested_direction(&self) -> Option<Direction> {
        [
            (Direction::Left, self.controls.left.pressed),
            (Direction::Right, self.controls.right.pressed),
            (Direction::Down, self.controls.down.pressed),
            (Direction::Up, self.controls.up.pressed),
        ]
        .into_iter()
        .find(|&(direction, held)| held && self.can_move(direction))
        .map(|(direction, _)| direction)
    }

    fn update_jump(&mut self, elapsed: f32) {
        if self.controls.jump.pressed {
            self.jump_velocity = JUMP_SPEED_FACTOR * self.velocity;
        } else {
            self.jump_velocity -= GRAVITY * elapsed;
        }
        self.height += self.jump_velocity * elapsed;
        if self.height <= REST_HEIGHT {
            self.height = REST_HEIGHT;
            self.jump_velocity = 0.0;
        }
    }

    /// Cell the head moves to on the next step.
    fn next_head(&self) -> Option<Cell> {
        let (dx, dy) = self.direction.offset();
        Some(self.head()?.offset(dx, dy))
    }

    /// Moves the head onto `head`. Eating an apple grows the body by one,
    /// otherwise every segment shifts one place towards the tail. Returns
    /// whether an apple was eaten.
    fn step(&mut self, head: Cell, apples: &mut Vec<Apple>) -> bool {
        if let Some(index) = apples.iter().position(|apple| apple.position == head) {
            apples.remove(index);
            self.body.push(head);
            return true;
        }

        if let Some(last) = self.body.len().checked_sub(1) {
            self.body.copy_within(1.., 0);
            self.body[last] = head;
        }
        false
    }
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    player: Option<Player>,
}

/// Slot arena of players. Removal vacates a slot without moving any other
/// player, so iteration order and outstanding handles stay stable.
#[derive(Debug, Clone, Default)]
pub struct Players {
    slots: Vec<Slot>,
}

impl Players {
    pub fn insert(&mut self, player: Player) -> PlayerId {
        if let Some(index) = self.slots.iter().position(|slot| slot.player.is_none()) {
            let slot = &mut self.slots[index];
            slot.player = Some(player);
            return PlayerId {
                index: index as u32,
                generation: slot.generation,
            };
        }
        self.slots.push(Slot {
            generation: 0,
            player: Some(player),
        });
        PlayerId {
            index: (self.slots.len() - 1) as u32,
            generation: 0,
        }
    }

    pub fn remove(&mut self, id: PlayerId) -> Option<Player> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let player = slot.player.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        Some(player)
    }

    pub fn get(&self, id: PlayerId) -> Option<&Player> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.player.as_ref())
    }

    pub fn get_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.player.as_mut())
    }

    /// Occupied slots in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (PlayerId, &Player)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.player.as_ref().map(|player| {
                (
                    PlayerId {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    player,
                )
            })
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (PlayerId, &mut Player)> {
        self.slots.iter_mut().enumerate().filter_map(|(index, slot)| {
            let generation = slot.generation;
            slot.player.as_mut().map(|player| {
                (
                    PlayerId {
                        index: index as u32,
                        generation,
                    },
                    player,
                )
            })
        })
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.player.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What happened during one [`Game::update`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub apples_eaten: usize,
    pub deaths: Vec<PlayerId>,
    /// Apples that could not be replaced for lack of free cells.
    pub apple_shortfall: usize,
}

/// Root aggregate for one match.
#[derive(Debug, Clone)]
pub struct Game {
    map: Map,
    players: Players,
    apples: Vec<Apple>,
    rng: StdRng,
    config: GameConfig,
    next_player_number: u32,
    pub tick: u64,
}

impl Game {
    /// Builds the configured map and places the initial apples.
    pub fn new(config: GameConfig) -> Result<Self, GameError> {
        let map = config.build_map()?;
        Self::with_map(map, config)
    }

    /// Like [`Game::new`] but with an explicit map; `config.map` is ignored.
    pub fn with_map(map: Map, config: GameConfig) -> Result<Self, GameError> {
        config.validate()?;
        let mut game = Self {
            map,
            players: Players::default(),
            apples: Vec::new(),
            rng: StdRng::seed_from_u64(config.seed),
            config,
            next_player_number: 1,
            tick: 0,
        };
        let report = game.spawn_apples(game.config.target_apples as usize);
        if report.is_insufficient() {
            warn!(
                "only {} of {} initial apples fit on the map",
                report.placed.len(),
                report.requested
            );
        }
        Ok(game)
    }

    pub fn map(&self) -> &Map {
        &self.map
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn apples(&self) -> &[Apple] {
        &self.apples
    }

    pub fn players(&self) -> &Players {
        &self.players
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(id)
    }

    /// Cells free for a new apple or player: not a barrier, not part of any
    /// body, not holding an apple.
    pub fn free_cells(&self) -> Vec<Cell> {
        let bodies = self
            .players
            .iter()
            .flat_map(|(_, player)| player.body.iter().copied());
        let apples = self.apples.iter().map(|apple| apple.position);
        free_cells(&self.map, bodies.chain(apples))
    }

    /// Places up to `count` new apples on random free cells.
    pub fn spawn_apples(&mut self, count: usize) -> SpawnReport {
        let free = self.free_cells();
        let report = sample_cells(&mut self.rng, free, count);
        self.apples.extend(
            report
                .placed
                .iter()
                .map(|cell| Apple::new(*cell, AppleType::Normal)),
        );
        report
    }

    /// Puts an apple on a specific free cell. Returns false if the cell is
    /// blocked or occupied.
    pub fn place_apple(&mut self, cell: Cell) -> bool {
        if !self.is_cell_free(cell) {
            return false;
        }
        self.apples.push(Apple::new(cell, AppleType::Normal));
        true
    }

    /// Adds a player on a random free cell with a random colour.
    pub fn spawn_player(&mut self) -> Result<PlayerId, GameError> {
        let free = self.free_cells();
        let report = sample_cells(&mut self.rng, free, 1);
        let cell = *report.placed.first().ok_or(GameError::NoSpawnSpace)?;
        Ok(self.insert_player(vec![cell], Direction::Right))
    }

    /// Adds a player with a given body (tail first). Every cell must be free.
    pub fn place_player(
        &mut self,
        body: Vec<Cell>,
        direction: Direction,
    ) -> Result<PlayerId, GameError> {
        if body.is_empty() {
            return Err(GameError::EmptyBody);
        }
        if let Some(cell) = body.iter().find(|cell| !self.is_cell_free(**cell)) {
            return Err(GameError::CellUnavailable {
                x: cell.x,
                y: cell.y,
            });
        }
        Ok(self.insert_player(body, direction))
    }

    pub fn remove_player(&mut self, id: PlayerId) -> Option<Player> {
        let player = self.players.remove(id)?;
        info!("{} left the game", player.name);
        Some(player)
    }

    fn is_cell_free(&self, cell: Cell) -> bool {
        !self.map.is_blocked(cell)
            && !self.apples.iter().any(|apple| apple.position == cell)
            && !self
                .players
                .iter()
                .any(|(_, player)| player.body.contains(&cell))
    }

    fn insert_player(&mut self, body: Vec<Cell>, direction: Direction) -> PlayerId {
        let mut player = Player::new(body, direction, self.config.player_velocity);
        player.color = self.random_color();
        player.name = format!("Player {}", self.next_player_number);
        self.next_player_number += 1;

        info!("{} joined at {:?}", player.name, player.head());
        self.players.insert(player)
    }

    fn random_color(&mut self) -> [f32; 3] {
        loop {
            let color: [f32; 3] = [self.rng.gen(), self.rng.gen(), self.rng.gen()];
            let length = color.iter().map(|c| c * c).sum::<f32>().sqrt();
            if length > 0.0 {
                return color.map(|c| c / length);
            }
        }
    }

    /// Advances the simulation by `elapsed` seconds.
    pub fn update(&mut self, elapsed: f32) -> TickReport {
        let mut report = TickReport::default();
        let mut left_grid = Vec::new();

        for (id, player) in self.players.iter_mut() {
            if player.alive {
                let advance = advance_player(player, &self.map, &mut self.apples, elapsed);
                report.apples_eaten += advance.eaten;
                if advance.left_grid {
                    left_grid.push(id);
                }
            }
        }

        report.deaths = self.detect_collisions(&left_grid);
        for id in &report.deaths {
            if let Some(player) = self.players.get_mut(*id) {
                player.alive = false;
                info!("{} died at {:?}", player.name, player.head());
            }
        }

        let missing = (self.config.target_apples as usize).saturating_sub(self.apples.len());
        if missing > 0 {
            let spawned = self.spawn_apples(missing);
            report.apple_shortfall = spawned.shortfall();
            if spawned.is_insufficient() {
                warn!(
                    "no room for {} of {} apples",
                    spawned.shortfall(),
                    spawned.requested
                );
            }
        }

        self.tick += 1;
        #[cfg(debug_assertions)]
        self.debug_validate();

        if report.apples_eaten > 0 || !report.deaths.is_empty() {
            debug!(
                "tick {}: {} apples eaten, {} deaths",
                self.tick,
                report.apples_eaten,
                report.deaths.len()
            );
        }
        report
    }

    /// Live players whose head sits on a barrier, on another player's body
    /// (heads included) or on their own body, plus those in `left_grid` that
    /// tried to step off the map. Evaluated on the current state without
    /// mutating it.
    fn detect_collisions(&self, left_grid: &[PlayerId]) -> Vec<PlayerId> {
        let mut owners: HashMap<Cell, Vec<PlayerId>> = HashMap::new();
        for (id, player) in self.players.iter() {
            for cell in &player.body {
                let entry = owners.entry(*cell).or_default();
                if !entry.contains(&id) {
                    entry.push(id);
                }
            }
        }

        self.players
            .iter()
            .filter(|(_, player)| player.alive)
            .filter_map(|(id, player)| {
                let head = player.head()?;
                let (_, rest) = player.body.split_last()?;
                let hits_map = left_grid.contains(&id) || self.map.is_blocked(head);
                let hits_self = rest.contains(&head);
                let hits_other = owners
                    .get(&head)
                    .map_or(false, |ids| ids.iter().any(|owner| *owner != id));
                (hits_map || hits_self || hits_other).then_some(id)
            })
            .collect()
    }

    #[cfg(debug_assertions)]
    fn debug_validate(&self) {
        for (_, player) in self.players.iter() {
            debug_assert!(
                !player.alive || !player.body.is_empty(),
                "{} is alive without a body",
                player.name
            );
            debug_assert!(
                player.body.iter().all(|cell| self.map.contains(*cell)),
                "{} has a cell outside the grid",
                player.name
            );
        }
        for apple in &self.apples {
            debug_assert!(!self.map.is_blocked(apple.position), "apple on a barrier");
            debug_assert!(
                !self
                    .players
                    .iter()
                    .any(|(_, player)| player.body.contains(&apple.position)),
                "apple under a player"
            );
        }
    }
}

/// Result of advancing one player through a tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Advance {
    eaten: usize,
    /// The player tried to step off the map and stayed where it was.
    left_grid: bool,
}

/// Direction, jump arc and grid steps for one live player.
fn advance_player(player: &mut Player, map: &Map, apples: &mut Vec<Apple>, elapsed: f32) -> Advance {
    if let Some(direction) = player.requested_direction() {
        player.direction = direction;
    }
    player.update_jump(elapsed);

    let mut advance = Advance::default();
    player.move_timer -= f64::from(elapsed);
    while player.move_timer < MOVE_TIMER_EPSILON {
        player.move_timer += 1.0 / f64::from(player.velocity);
        let Some(head) = player.next_head() else {
            break;
        };
        if !map.contains(head) {
            advance.left_grid = true;
            break;
        }
        if player.step(head, apples) {
            advance.eaten += 1;
        }
        if map.is_blocked(head) {
            break;
        }
    }

    player.controls.reset_downs();
    advance
}
