//! The arena grid.

use crate::error::GameError;

/// A grid position. `x` grows to the right, `y` grows upwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
}

impl Cell {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

/// Kind of a single grid cell. Everything except [`MapBlock::Ground`] blocks
/// movement; the variants only differ in how they are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum MapBlock {
    #[default]
    Ground = 0,
    Barrier = 1,
    BarrierVertical = 2,
    BarrierHorizontal = 3,
    CornerUpRight = 4,
    CornerUpLeft = 5,
    CornerDownLeft = 6,
    CornerDownRight = 7,
}

impl MapBlock {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => MapBlock::Ground,
            1 => MapBlock::Barrier,
            2 => MapBlock::BarrierVertical,
            3 => MapBlock::BarrierHorizontal,
            4 => MapBlock::CornerUpRight,
            5 => MapBlock::CornerUpLeft,
            6 => MapBlock::CornerDownLeft,
            7 => MapBlock::CornerDownRight,
            _ => return None,
        })
    }

    pub fn is_barrier(self) -> bool {
        self != MapBlock::Ground
    }

    fn from_char(c: char) -> Option<Self> {
        Some(match c {
            '.' => MapBlock::Ground,
            '#' => MapBlock::Barrier,
            '|' => MapBlock::BarrierVertical,
            '-' => MapBlock::BarrierHorizontal,
            '7' => MapBlock::CornerUpRight,
            'F' => MapBlock::CornerUpLeft,
            'L' => MapBlock::CornerDownLeft,
            'J' => MapBlock::CornerDownRight,
            _ => return None,
        })
    }
}

/// Fixed `width x height` grid stored row-major from `y = 0` upwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Map {
    width: u32,
    height: u32,
    blocks: Vec<MapBlock>,
}

impl Map {
    pub fn new(width: u32, height: u32, blocks: Vec<MapBlock>) -> Result<Self, GameError> {
        if width == 0 || height == 0 {
            return Err(GameError::EmptyMap { width, height });
        }
        let expected = width as usize * height as usize;
        if blocks.len() != expected {
            return Err(GameError::MapSizeMismatch {
                width,
                height,
                expected,
                actual: blocks.len(),
            });
        }
        Ok(Self {
            width,
            height,
            blocks,
        })
    }

    /// An arena with no barriers.
    pub fn open(width: u32, height: u32) -> Result<Self, GameError> {
        Self::new(
            width,
            height,
            vec![MapBlock::Ground; width as usize * height as usize],
        )
    }

    /// Parses text rows; the first row is the top of the map.
    ///
    /// `.` ground, `#` barrier, `|` and `-` long barriers, `7` `F` `L` `J`
    /// corners (up-right, up-left, down-left, down-right).
    pub fn parse<S: AsRef<str>>(rows: &[S]) -> Result<Self, GameError> {
        let height = rows.len();
        let width = rows.first().map_or(0, |row| row.as_ref().chars().count());
        let mut blocks = vec![MapBlock::Ground; width * height];

        for (row, text) in rows.iter().enumerate() {
            let text = text.as_ref();
            let actual = text.chars().count();
            if actual != width {
                return Err(GameError::RaggedMapRow {
                    row,
                    expected: width,
                    actual,
                });
            }
            let y = height - 1 - row;
            for (column, c) in text.chars().enumerate() {
                let block = MapBlock::from_char(c).ok_or(GameError::UnknownMapChar {
                    found: c,
                    row,
                    column,
                })?;
                blocks[y * width + column] = block;
            }
        }

        Self::new(width as u32, height as u32, blocks)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn blocks(&self) -> &[MapBlock] {
        &self.blocks
    }

    pub fn contains(&self, cell: Cell) -> bool {
        cell.x >= 0 && cell.y >= 0 && (cell.x as u32) < self.width && (cell.y as u32) < self.height
    }

    /// Block at `cell`, or `None` outside the grid.
    pub fn get(&self, cell: Cell) -> Option<MapBlock> {
        if !self.contains(cell) {
            return None;
        }
        Some(self.blocks[cell.y as usize * self.width as usize + cell.x as usize])
    }

    /// True for barriers and for anything outside the grid.
    pub fn is_blocked(&self, cell: Cell) -> bool {
        self.get(cell).map_or(true, MapBlock::is_barrier)
    }

    /// All cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        (0..self.height as i32).flat_map(move |y| (0..self.width as i32).map(move |x| Cell::new(x, y)))
    }
}

impl Default for Map {
    fn default() -> Self {
        Self {
            width: 10,
            height: 10,
            blocks: vec![MapBlock::Ground; 100],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_map_is_open_10x10() {
        let map = Map::default();
        assert_eq!(map.width(), 10);
        assert_eq!(map.height(), 10);
        assert!(map.blocks().iter().all(|b| *b == MapBlock::Ground));
    }

    #[test]
    fn test_new_rejects_bad_sizes() {
        assert_eq!(
            Map::new(0, 3, vec![]),
            Err(GameError::EmptyMap { width: 0, height: 3 })
        );
        assert!(matches!(
            Map::new(2, 2, vec![MapBlock::Ground; 3]),
            Err(GameError::MapSizeMismatch { expected: 4, actual: 3, .. })
        ));
    }

    #[test]
    fn test_bounds_and_blocking() {
        let map = Map::open(4, 3).unwrap();
        assert!(map.contains(Cell::new(0, 0)));
        assert!(map.contains(Cell::new(3, 2)));
        assert!(!map.contains(Cell::new(4, 0)));
        assert!(!map.contains(Cell::new(0, -1)));
        assert!(!map.is_blocked(Cell::new(1, 1)));
        assert!(map.is_blocked(Cell::new(-1, 1)));
        assert_eq!(map.get(Cell::new(0, 3)), None);
    }

    #[test]
    fn test_parse_top_row_is_highest_y() {
        let map = Map::parse(&["#..", "...", "..|"]).unwrap();
        assert_eq!(map.width(), 3);
        assert_eq!(map.height(), 3);
        assert_eq!(map.get(Cell::new(0, 2)), Some(MapBlock::Barrier));
        assert_eq!(map.get(Cell::new(2, 0)), Some(MapBlock::BarrierVertical));
        assert!(map.is_blocked(Cell::new(0, 2)));
        assert!(!map.is_blocked(Cell::new(0, 0)));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            Map::parse(&["...", ".."]),
            Err(GameError::RaggedMapRow { row: 1, expected: 3, actual: 2 })
        );
        assert_eq!(
            Map::parse(&[".x."]),
            Err(GameError::UnknownMapChar { found: 'x', row: 0, column: 1 })
        );
        let empty: [&str; 0] = [];
        assert!(Map::parse(&empty).is_err());
    }

    #[test]
    fn test_block_tags() {
        for tag in 0..8 {
            let block = MapBlock::from_u8(tag).unwrap();
            assert_eq!(block as u8, tag);
            assert_eq!(block.is_barrier(), tag != 0);
        }
        assert_eq!(MapBlock::from_u8(8), None);
    }

    #[test]
    fn test_cells_row_major() {
        let map = Map::open(2, 2).unwrap();
        let cells: Vec<Cell> = map.cells().collect();
        assert_eq!(
            cells,
            vec![Cell::new(0, 0), Cell::new(1, 0), Cell::new(0, 1), Cell::new(1, 1)]
        );
    }
}
