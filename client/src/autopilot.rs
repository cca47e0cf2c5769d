//! Headless steering: heads for the nearest apple without hitting anything
//!
//! Stands in for a human at the keyboard so the client can play unattended.
//! It only looks one step ahead.

use shared::{Cell, Direction, Snapshot};
use std::collections::HashSet;

const DIRECTIONS: [Direction; 4] = [
    Direction::Left,
    Direction::Right,
    Direction::Up,
    Direction::Down,
];

fn distance(a: Cell, b: Cell) -> u32 {
    a.x.abs_diff(b.x) + a.y.abs_diff(b.y)
}

/// Picks a direction for the local player, or `None` if every neighbour is
/// blocked or the snapshot has no local player.
///
/// Among the safe neighbours the one closest to any apple wins; ties keep
/// the current facing.
pub fn choose_direction(snapshot: &Snapshot) -> Option<Direction> {
    let me = snapshot.local_player()?;
    let head = me.head()?;

    let occupied: HashSet<Cell> = snapshot
        .players
        .iter()
        .flat_map(|player| player.body.iter().copied())
        .collect();

    let safe = DIRECTIONS.into_iter().filter_map(|direction| {
        let (dx, dy) = direction.offset();
        let next = head.offset(dx, dy);
        let free = !snapshot.map.is_blocked(next) && !occupied.contains(&next);
        free.then_some((direction, next))
    });

    safe.min_by_key(|&(direction, next)| {
        let to_apple = snapshot
            .apples
            .iter()
            .map(|apple| distance(next, apple.position))
            .min()
            .unwrap_or(0);
        (to_apple, direction != me.direction)
    })
    .map(|(direction, _)| direction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{Apple, AppleType, Map, PlayerState};

    fn snapshot(map: Map, apples: &[Cell], players: Vec<PlayerState>) -> Snapshot {
        Snapshot {
            map,
            apples: apples
                .iter()
                .map(|cell| Apple::new(*cell, AppleType::Normal))
                .collect(),
            players,
        }
    }

    fn player(body: Vec<Cell>, direction: Direction) -> PlayerState {
        PlayerState {
            color: [1.0, 0.0, 0.0],
            direction,
            body,
            name: "Player 1".to_string(),
        }
    }

    #[test]
    fn test_heads_for_apple() {
        let snap = snapshot(
            Map::open(10, 10).unwrap(),
            &[Cell::new(5, 8)],
            vec![player(vec![Cell::new(5, 5)], Direction::Right)],
        );
        assert_eq!(choose_direction(&snap), Some(Direction::Up));
    }

    #[test]
    fn test_keeps_facing_on_tie() {
        let snap = snapshot(
            Map::open(10, 10).unwrap(),
            &[],
            vec![player(vec![Cell::new(5, 5)], Direction::Down)],
        );
        assert_eq!(choose_direction(&snap), Some(Direction::Down));
    }

    #[test]
    fn test_avoids_walls_and_bodies() {
        let other = player(vec![Cell::new(1, 2), Cell::new(1, 1)], Direction::Down);
        let snap = snapshot(
            Map::parse(&["...", "...", ".#."]).unwrap(),
            &[Cell::new(2, 0)],
            vec![player(vec![Cell::new(0, 0)], Direction::Right), other],
        );
        // right is a barrier, up is free, left and down leave the grid
        assert_eq!(choose_direction(&snap), Some(Direction::Up));
    }

    #[test]
    fn test_trapped() {
        let snap = snapshot(
            Map::parse(&["#.", ".."]).unwrap(),
            &[],
            vec![player(vec![Cell::new(1, 1), Cell::new(1, 0), Cell::new(0, 0)], Direction::Left)],
        );
        assert_eq!(choose_direction(&snap), None);
    }

    #[test]
    fn test_no_local_player() {
        let snap = snapshot(Map::open(3, 3).unwrap(), &[], vec![]);
        assert_eq!(choose_direction(&snap), None);
    }
}
