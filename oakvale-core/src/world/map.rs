//! Tile grid, positions and movement directions

use serde::{Deserialize, Serialize};

/// Tile coordinates; `y` grows southwards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance
    pub fn distance(&self, other: &Position) -> f64 {
        let dx = f64::from(self.x - other.x);
        let dy = f64::from(self.y - other.y);
        (dx * dx + dy * dy).sqrt()
    }

    pub fn offset(&self, dx: i32, dy: i32) -> Position {
        Position::new(self.x + dx, self.y + dy)
    }

    pub fn step(&self, direction: Direction) -> Position {
        let (dx, dy) = direction.delta();
        self.offset(dx, dy)
    }

    /// One-tile step towards `target` along the dominant axis.
    ///
    /// Returns `None` when already there.
    pub fn step_toward(&self, target: &Position) -> Option<Direction> {
        let dx = target.x - self.x;
        let dy = target.y - self.y;
        if dx == 0 && dy == 0 {
            return None;
        }
        if dx.abs() > dy.abs() {
            Some(if dx > 0 { Direction::East } else { Direction::West })
        } else {
            Some(if dy > 0 { Direction::South } else { Direction::North })
        }
    }

    /// Compass direction in which `other` lies
    pub fn direction_to(&self, other: &Position) -> Option<Direction> {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        if dx == 0 && dy == 0 {
            return None;
        }

        if dx.abs() > dy.abs() * 2 {
            return Some(if dx > 0 { Direction::East } else { Direction::West });
        }
        if dy.abs() > dx.abs() * 2 {
            return Some(if dy > 0 { Direction::South } else { Direction::North });
        }

        Some(match (dx.signum(), dy.signum()) {
            (1, 1) => Direction::SouthEast,
            (1, -1) => Direction::NorthEast,
            (-1, 1) => Direction::SouthWest,
            (-1, -1) => Direction::NorthWest,
            (1, 0) => Direction::East,
            (-1, 0) => Direction::West,
            (0, 1) => Direction::South,
            _ => Direction::North,
        })
    }

    /// The eight surrounding tiles, clockwise from north
    pub fn neighbours(&self) -> impl Iterator<Item = Position> + '_ {
        Direction::ALL.iter().map(move |d| self.step(*d))
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Compass direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}

// Compound words come first so "northeast" is not read as "north".
const DIRECTION_WORDS: &[(&str, Direction)] = &[
    ("northeast", Direction::NorthEast),
    ("northwest", Direction::NorthWest),
    ("southeast", Direction::SouthEast),
    ("southwest", Direction::SouthWest),
    ("north", Direction::North),
    ("south", Direction::South),
    ("east", Direction::East),
    ("west", Direction::West),
    ("up", Direction::North),
    ("down", Direction::South),
    ("right", Direction::East),
    ("left", Direction::West),
    ("forward", Direction::North),
    ("backward", Direction::South),
];

impl Direction {
    pub const ALL: [Direction; 8] = [
        Direction::North,
        Direction::NorthEast,
        Direction::East,
        Direction::SouthEast,
        Direction::South,
        Direction::SouthWest,
        Direction::West,
        Direction::NorthWest,
    ];

    pub fn delta(&self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::NorthEast => (1, -1),
            Direction::East => (1, 0),
            Direction::SouthEast => (1, 1),
            Direction::South => (0, 1),
            Direction::SouthWest => (-1, 1),
            Direction::West => (-1, 0),
            Direction::NorthWest => (-1, -1),
        }
    }

    /// First whole direction word in free text
    pub fn find_in(text: &str) -> Option<Direction> {
        let text = text.to_lowercase().replace('-', "");
        text.split(|c: char| !c.is_alphanumeric())
            .find_map(|token| {
                DIRECTION_WORDS
                    .iter()
                    .find(|(word, _)| *word == token)
                    .map(|(_, dir)| *dir)
            })
    }

    /// Parse a single direction token (`n`, `north`, `ne`, ...)
    pub fn parse(token: &str) -> Option<Direction> {
        match token.trim().to_lowercase().as_str() {
            "n" => Some(Direction::North),
            "ne" => Some(Direction::NorthEast),
            "e" => Some(Direction::East),
            "se" => Some(Direction::SouthEast),
            "s" => Some(Direction::South),
            "sw" => Some(Direction::SouthWest),
            "w" => Some(Direction::West),
            "nw" => Some(Direction::NorthWest),
            other => DIRECTION_WORDS
                .iter()
                .find(|(word, _)| *word == other)
                .map(|(_, dir)| *dir),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::North => "north",
            Direction::NorthEast => "northeast",
            Direction::East => "east",
            Direction::SouthEast => "southeast",
            Direction::South => "south",
            Direction::SouthWest => "southwest",
            Direction::West => "west",
            Direction::NorthWest => "northwest",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terrain type of a tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Terrain {
    Grass,
    Forest,
    Mountain,
    Water,
    Road,
    Building,
    Cave,
}

impl Terrain {
    /// Water and mountains block movement
    pub fn passable(&self) -> bool {
        !matches!(self, Terrain::Water | Terrain::Mountain)
    }

    pub fn glyph(&self) -> char {
        match self {
            Terrain::Grass => '.',
            Terrain::Forest => 'T',
            Terrain::Mountain => '^',
            Terrain::Water => '~',
            Terrain::Road => '=',
            Terrain::Building => '#',
            Terrain::Cave => 'C',
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Terrain::Grass => "grass",
            Terrain::Forest => "forest",
            Terrain::Mountain => "mountain",
            Terrain::Water => "water",
            Terrain::Road => "road",
            Terrain::Building => "building",
            Terrain::Cave => "cave",
        }
    }
}

/// Rectangular terrain grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldMap {
    width: i32,
    height: i32,
    tiles: Vec<Terrain>,
}

impl WorldMap {
    /// All-grass map
    pub fn new(width: i32, height: i32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            tiles: vec![Terrain::Grass; (width * height) as usize],
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn in_bounds(&self, pos: &Position) -> bool {
        (0..self.width).contains(&pos.x) && (0..self.height).contains(&pos.y)
    }

    pub fn terrain_at(&self, pos: &Position) -> Option<Terrain> {
        self.in_bounds(pos)
            .then(|| self.tiles[(pos.y * self.width + pos.x) as usize])
    }

    pub fn is_passable(&self, pos: &Position) -> bool {
        self.terrain_at(pos).is_some_and(|t| t.passable())
    }

    /// Paint a rectangle, clipped to the map
    pub fn fill(&mut self, terrain: Terrain, x: i32, y: i32, width: i32, height: i32) {
        for ty in y.max(0)..(y + height).min(self.height) {
            for tx in x.max(0)..(x + width).min(self.width) {
                self.tiles[(ty * self.width + tx) as usize] = terrain;
            }
        }
    }

    /// Every row as terrain glyphs
    pub fn rows(&self) -> Vec<String> {
        self.tiles
            .chunks(self.width as usize)
            .map(|row| row.iter().map(Terrain::glyph).collect())
            .collect()
    }

    /// Terrain glyph rows within `range` of `center`.
    ///
    /// Tiles outside the sight circle or the map render as `?`.
    pub fn view(&self, center: &Position, range: i32) -> Vec<String> {
        let mut rows = Vec::with_capacity((range * 2 + 1) as usize);
        for y in (center.y - range)..=(center.y + range) {
            let row: String = ((center.x - range)..=(center.x + range))
                .map(|x| {
                    let pos = Position::new(x, y);
                    if pos.distance(center) > f64::from(range) {
                        return '?';
                    }
                    self.terrain_at(&pos).map(|t| t.glyph()).unwrap_or('?')
                })
                .collect();
            rows.push(row);
        }
        rows
    }
}

/// Named area of the map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub description: String,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    /// Bodies near a shrine can be revived
    pub shrine: bool,
}

impl Location {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            x,
            y,
            width,
            height,
            shrine: false,
        }
    }

    pub fn with_shrine(mut self) -> Self {
        self.shrine = true;
        self
    }

    pub fn contains(&self, pos: &Position) -> bool {
        (self.x..self.x + self.width).contains(&pos.x)
            && (self.y..self.y + self.height).contains(&pos.y)
    }

    pub fn center(&self) -> Position {
        Position::new(self.x + self.width / 2, self.y + self.height / 2)
    }

    /// Distance from `pos` to the nearest tile of this area (0 inside)
    pub fn distance_to(&self, pos: &Position) -> f64 {
        let nearest = Position::new(
            pos.x.clamp(self.x, (self.x + self.width - 1).max(self.x)),
            pos.y.clamp(self.y, (self.y + self.height - 1).max(self.y)),
        );
        pos.distance(&nearest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_words() {
        assert_eq!(Direction::find_in("head northeast now"), Some(Direction::NorthEast));
        assert_eq!(Direction::find_in("North"), Some(Direction::North));
        assert_eq!(Direction::find_in("to the left"), Some(Direction::West));
        assert_eq!(Direction::find_in("the tavern"), None);
        assert_eq!(Direction::find_in("restock supplies at the eastern stall"), None);
        assert_eq!(Direction::find_in("the leftover cart, then south-west"), Some(Direction::SouthWest));
        assert_eq!(Direction::parse("sw"), Some(Direction::SouthWest));
        assert_eq!(Direction::parse("sideways"), None);
    }

    #[test]
    fn test_step_toward_prefers_dominant_axis() {
        let from = Position::new(0, 0);
        assert_eq!(from.step_toward(&Position::new(5, 2)), Some(Direction::East));
        assert_eq!(from.step_toward(&Position::new(1, -3)), Some(Direction::North));
        assert_eq!(from.step_toward(&from), None);
    }

    #[test]
    fn test_direction_to() {
        let from = Position::new(5, 5);
        assert_eq!(from.direction_to(&Position::new(9, 5)), Some(Direction::East));
        assert_eq!(from.direction_to(&Position::new(7, 7)), Some(Direction::SouthEast));
        assert_eq!(from.direction_to(&Position::new(5, 1)), Some(Direction::North));
    }

    #[test]
    fn test_passability_and_bounds() {
        let mut map = WorldMap::new(4, 3);
        map.fill(Terrain::Water, 0, 1, 10, 1);
        assert!(map.is_passable(&Position::new(0, 0)));
        assert!(!map.is_passable(&Position::new(3, 1)));
        assert!(!map.is_passable(&Position::new(4, 0)));
        assert!(!map.is_passable(&Position::new(-1, 0)));
    }

    #[test]
    fn test_view_masks_outside_circle() {
        let map = WorldMap::new(10, 10);
        let rows = map.view(&Position::new(0, 0), 1);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], "???");
        assert_eq!(rows[1], "?..");
    }

    #[test]
    fn test_location_contains() {
        let temple = Location::new("Temple", "", 16, 10, 2, 2).with_shrine();
        assert!(temple.contains(&Position::new(17, 11)));
        assert!(!temple.contains(&Position::new(18, 11)));
        assert_eq!(temple.center(), Position::new(17, 11));
        assert_eq!(temple.distance_to(&Position::new(16, 10)), 0.0);
        assert_eq!(temple.distance_to(&Position::new(19, 11)), 2.0);
    }
}
