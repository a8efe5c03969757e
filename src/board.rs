use std::fmt;
use std::io::{Error, ErrorKind};
use std::ops::Neg;
use std::str::FromStr;
use bitvec::{prelude::*, slice::IterOnes};
use lazy_static::lazy_static;
use serde::Serialize;

pub const SIZE: usize = 8;
const CELLS: usize = SIZE * SIZE;
pub type BitBoard = BitArr!(for CELLS, in u64, Lsb0);
// one bit per cell, row-major from the top left corner, 0-indexed

pub trait BitArr2D {
    fn empty() -> Self;
    fn set_point(&mut self, row: usize, col: usize, value: bool);
    type IterPoints<'a>: Iterator<Item=(usize, usize)> + 'a where Self: 'a;
    fn iter_set_points(&'_ self) -> Self::IterPoints<'_>;
}

impl BitArr2D for BitBoard {
    fn empty() -> Self {
        bitarr!(u64, Lsb0; 0; CELLS)
    }

    fn set_point(&mut self, row: usize, col: usize, value: bool) {
        self.set(row * SIZE + col, value);
    }

    type IterPoints<'a> = std::iter::Map<IterOnes<'a, u64, Lsb0>, fn(usize) -> (usize, usize)>;

    fn iter_set_points(&'_ self) -> Self::IterPoints<'_> {
        self.iter_ones().map(|idx| (idx / SIZE, idx % SIZE))
    }
}

const DIRECTIONS: [(isize, isize); 8] = [
    (-1, -1), (-1, 0), (-1, 1),
    (0, -1),           (0, 1),
    (1, -1),  (1, 0),  (1, 1),
];

const MOBILITY_WEIGHT: i32 = 20;
const CORNER_WEIGHT: i32 = 200;
const EXPOSURE_WEIGHT: i32 = 10;

lazy_static! {
    /// For every cell, the mask of its in-bounds neighbours.
    static ref NEIGHBOR_MASKS: Vec<BitBoard> = {
        let mut masks = Vec::<BitBoard>::with_capacity(CELLS);
        for row in 0..SIZE {
            for col in 0..SIZE {
                let mut mask = BitBoard::empty();
                for (dr, dc) in DIRECTIONS {
                    if let Some((r, c)) = step(row, col, dr, dc) {
                        mask.set_point(r, c, true);
                    }
                }
                masks.push(mask);
            }
        }
        masks
    };
    static ref CORNER_MASK: BitBoard = {
        let mut mask = BitBoard::empty();
        for (row, col) in [(0, 0), (0, SIZE - 1), (SIZE - 1, 0), (SIZE - 1, SIZE - 1)] {
            mask.set_point(row, col, true);
        }
        mask
    };
}

fn step(row: usize, col: usize, dr: isize, dc: isize) -> Option<(usize, usize)> {
    let row = row.checked_add_signed(dr)?;
    let col = col.checked_add_signed(dc)?;
    (row < SIZE && col < SIZE).then_some((row, col))
}

/// One of the two players. Negating a side yields its opponent.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize)]
pub enum Side {
    Black,
    White,
}

impl Side {
    pub fn opponent(self) -> Side {
        match self {
            Side::Black => Side::White,
            Side::White => Side::Black,
        }
    }

    /// Signed unit value: +1 for black, -1 for white.
    pub fn value(self) -> i32 {
        match self {
            Side::Black => 1,
            Side::White => -1,
        }
    }

    pub fn cell(self) -> Cell {
        match self {
            Side::Black => Cell::Black,
            Side::White => Cell::White,
        }
    }
}

impl Neg for Side {
    type Output = Side;

    fn neg(self) -> Side {
        self.opponent()
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Cell {
    Empty,
    Black,
    White,
}

impl Cell {
    pub fn value(self) -> i32 {
        match self {
            Cell::Empty => 0,
            Cell::Black => 1,
            Cell::White => -1,
        }
    }

    fn symbol(self) -> char {
        match self {
            Cell::Empty => '_',
            Cell::Black => 'B',
            Cell::White => 'W',
        }
    }
}

/// A placement target, 1-indexed.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize)]
pub struct Move {
    pub row: usize,
    pub col: usize,
}

impl Move {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    pub(crate) fn from_point((row, col): (usize, usize)) -> Self {
        Self { row: row + 1, col: col + 1 }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// An 8x8 Othello position. Rows and columns are 1-indexed in every public method.
///
/// Cells only change through [`Board::apply_move`]; copies are plain values, so a
/// search can snapshot a board with `let saved = *board` and roll back with
/// `board.clone_from(&saved)`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Board {
    cells: [[Cell; SIZE]; SIZE],
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    /// The opening position: black on (4,4) and (5,5), white on (4,5) and (5,4).
    pub fn new() -> Self {
        let mut cells = [[Cell::Empty; SIZE]; SIZE];
        cells[3][3] = Cell::Black;
        cells[4][4] = Cell::Black;
        cells[3][4] = Cell::White;
        cells[4][3] = Cell::White;
        Self { cells }
    }

    fn to_point(row: usize, col: usize) -> Option<(usize, usize)> {
        if (1..=SIZE).contains(&row) && (1..=SIZE).contains(&col) {
            Some((row - 1, col - 1))
        } else {
            None
        }
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<Cell> {
        Self::to_point(row, col).map(|(r, c)| self.cells[r][c])
    }

    fn squares_where(&self, predicate: impl Fn(Cell) -> bool) -> BitBoard {
        let mut squares = BitBoard::empty();
        for (r, row) in self.cells.iter().enumerate() {
            for (c, &cell) in row.iter().enumerate() {
                if predicate(cell) {
                    squares.set_point(r, c, true);
                }
            }
        }
        squares
    }

    fn empty_squares(&self) -> BitBoard {
        self.squares_where(|cell| cell == Cell::Empty)
    }

    fn side_squares(&self, side: Side) -> BitBoard {
        self.squares_where(|cell| cell == side.cell())
    }

    /// Number of opponent pieces captured along one direction if `side` played at
    /// (r, c); zero when that direction does not capture.
    fn run_length(&self, r: usize, c: usize, (dr, dc): (isize, isize), side: Side) -> usize {
        let own = side.cell();
        let opponent = side.opponent().cell();
        let mut run = 0;
        let (mut r, mut c) = (r, c);
        while let Some((nr, nc)) = step(r, c, dr, dc) {
            match self.cells[nr][nc] {
                cell if cell == opponent => {
                    run += 1;
                    r = nr;
                    c = nc;
                }
                cell if cell == own => return run,
                _ => return 0,
            }
        }
        0
    }

    fn is_legal_point(&self, r: usize, c: usize, side: Side) -> bool {
        self.cells[r][c] == Cell::Empty
            && DIRECTIONS.iter().any(|&dir| self.run_length(r, c, dir, side) > 0)
    }

    pub fn is_legal(&self, row: usize, col: usize, side: Side) -> bool {
        match Self::to_point(row, col) {
            Some((r, c)) => self.is_legal_point(r, c, side),
            None => false,
        }
    }

    /// How many pieces playing (row, col) would flip; zero for an illegal move.
    pub fn flip_count(&self, row: usize, col: usize, side: Side) -> usize {
        match Self::to_point(row, col) {
            Some((r, c)) if self.cells[r][c] == Cell::Empty => DIRECTIONS
                .iter()
                .map(|&dir| self.run_length(r, c, dir, side))
                .sum(),
            _ => 0,
        }
    }

    /// Places a piece for `side` and flips every captured run. Returns false and
    /// leaves the board untouched when the move is illegal.
    pub fn apply_move(&mut self, row: usize, col: usize, side: Side) -> bool {
        let Some((r, c)) = Self::to_point(row, col) else {
            return false;
        };
        if !self.is_legal_point(r, c, side) {
            return false;
        }
        // runs are measured before placing; each direction is a disjoint ray
        let runs = DIRECTIONS.map(|dir| self.run_length(r, c, dir, side));
        self.cells[r][c] = side.cell();
        for (&(dr, dc), run) in DIRECTIONS.iter().zip(runs) {
            let (mut fr, mut fc) = (r, c);
            for _ in 0..run {
                if let Some((nr, nc)) = step(fr, fc, dr, dc) {
                    self.cells[nr][nc] = side.cell();
                    fr = nr;
                    fc = nc;
                }
            }
        }
        true
    }

    pub fn legal_moves(&self, side: Side) -> BitBoard {
        let mut moves = BitBoard::empty();
        for r in 0..SIZE {
            for c in 0..SIZE {
                if self.is_legal_point(r, c, side) {
                    moves.set_point(r, c, true);
                }
            }
        }
        moves
    }

    /// Legal placements in row-major order.
    pub fn legal_move_list(&self, side: Side) -> Vec<Move> {
        self.legal_moves(side).iter_set_points().map(Move::from_point).collect()
    }

    pub fn legal_move_count(&self, side: Side) -> usize {
        self.legal_moves(side).count_ones()
    }

    pub fn has_legal_move(&self, side: Side) -> bool {
        (0..SIZE).any(|r| (0..SIZE).any(|c| self.is_legal_point(r, c, side)))
    }

    pub fn is_full(&self) -> bool {
        self.cells.iter().flatten().all(|&cell| cell != Cell::Empty)
    }

    pub fn piece_count(&self, side: Side) -> usize {
        self.cells.iter().flatten().filter(|&&cell| cell == side.cell()).count()
    }

    /// Sum of all cell values; positive favours black.
    pub fn material_score(&self) -> i32 {
        self.cells.iter().flatten().map(|cell| cell.value()).sum()
    }

    /// Empty neighbours summed over every piece on `own`.
    fn exposure(own: &BitBoard, empty: &BitBoard) -> i32 {
        own.iter_ones()
            .map(|idx| (NEIGHBOR_MASKS[idx] & *empty).count_ones() as i32)
            .sum()
    }

    /// Heuristic score of a non-terminal position from `side`'s point of view:
    /// mobility, corner ownership and exposure to empty squares.
    ///
    /// `_depth` is carried for callers that want to weight by ply; it does not
    /// affect the score.
    pub fn evaluate(&self, side: Side, _depth: u32) -> i32 {
        let opponent = side.opponent();
        let mobility = self.legal_move_count(side) as i32 - self.legal_move_count(opponent) as i32;

        let own_squares = self.side_squares(side);
        let opp_squares = self.side_squares(opponent);
        let own_corners = (*CORNER_MASK & own_squares).count_ones() as i32;
        let opp_corners = (*CORNER_MASK & opp_squares).count_ones() as i32;

        let empty = self.empty_squares();
        let exposure = Self::exposure(&own_squares, &empty) - Self::exposure(&opp_squares, &empty);

        MOBILITY_WEIGHT * mobility + CORNER_WEIGHT * (own_corners - opp_corners) - EXPOSURE_WEIGHT * exposure
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, " ")?;
        for col in 1..=SIZE {
            write!(f, " {}", col)?;
        }
        writeln!(f)?;
        for (r, row) in self.cells.iter().enumerate() {
            write!(f, "{}|", r + 1)?;
            for cell in row {
                write!(f, "{}|", cell.symbol())?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl FromStr for Board {
    type Err = Error;

    /// Parses the diagram produced by `Display`. Row and column labels, `|` and
    /// whitespace are ignored; `B`, `W` and `_` (or `.`) are cells.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut cells = [[Cell::Empty; SIZE]; SIZE];
        let mut count = 0;
        for ch in s.chars() {
            let cell = match ch {
                'B' | 'b' => Cell::Black,
                'W' | 'w' => Cell::White,
                '_' | '.' => Cell::Empty,
                '|' => continue,
                ch if ch.is_ascii_digit() || ch.is_whitespace() => continue,
                other => {
                    return Err(Error::new(ErrorKind::InvalidInput, format!("Unexpected board character: {:?}", other)));
                }
            };
            if count < CELLS {
                cells[count / SIZE][count % SIZE] = cell;
            }
            count += 1;
        }
        if count != CELLS {
            return Err(Error::new(ErrorKind::InvalidInput, format!("Expected {} cells, found {}", CELLS, count)));
        }
        Ok(Self { cells })
    }
}
