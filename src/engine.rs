use rand::Rng;
use std::fmt;
use std::sync::OnceLock;

/// A direction to slide/merge tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Move {
    Up,
    Down,
    Left,
    Right,
}

impl Move {
    /// All four directions, in the order every search tries them.
    pub const ALL: [Move; 4] = [Move::Up, Move::Down, Move::Left, Move::Right];
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Move::Up => "up",
            Move::Down => "down",
            Move::Left => "left",
            Move::Right => "right",
        };
        f.write_str(name)
    }
}

const LINE_TABLE_SIZE: usize = 0x1_0000; // 65,536 possible 16-bit lines
const MAX_EXPONENT: u8 = 15;

type BoardRaw = u64;
pub(crate) type Line = u16;

/// Rejected tile values when building a board from plain numbers.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BoardError {
    #[error("tile {value} at ({row}, {col}) is not a power of two")]
    NotPowerOfTwo { row: usize, col: usize, value: u32 },
    #[error("tile {value} at ({row}, {col}) exceeds 32768")]
    TooLarge { row: usize, col: usize, value: u32 },
}

/// Packed 4x4 2048 board as 16 4-bit exponents in a `u64`.
///
/// Cell 0 is the top-left corner and lives in the most significant nibble;
/// cells run row-major. A nibble of 0 is an empty cell, `e > 0` is the tile `2^e`.
/// Boards are plain `Copy` values: every transition returns a new board.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Board(BoardRaw);

impl Board {
    /// A constant empty board (all zeros).
    pub const EMPTY: Board = Board(0);

    /// Construct a `Board` from its raw packed representation.
    #[inline]
    pub fn from_raw(raw: BoardRaw) -> Self { Board(raw) }

    /// Borrow the raw packed `u64` for this `Board`.
    #[inline]
    pub fn raw(&self) -> BoardRaw { self.0 }

    /// Build a board from tile values (0 for empty), validating every cell.
    ///
    /// ```
    /// use expectimax_2048::engine::Board;
    /// let b = Board::from_rows([[2048, 0, 0, 0], [0; 4], [0; 4], [0; 4]]).unwrap();
    /// assert_eq!(b.highest_tile(), 2048);
    /// assert!(Board::from_rows([[3, 0, 0, 0], [0; 4], [0; 4], [0; 4]]).is_err());
    /// ```
    pub fn from_rows(rows: [[u32; 4]; 4]) -> Result<Self, BoardError> {
        let mut board = Board::EMPTY;
        for (row, cells) in rows.iter().enumerate() {
            for (col, &value) in cells.iter().enumerate() {
                board = board.with_tile(row * 4 + col, tile_exponent(row, col, value)?);
            }
        }
        Ok(board)
    }

    /// Tile values row by row, 0 for empty cells.
    pub fn to_rows(self) -> [[u32; 4]; 4] {
        let mut rows = [[0; 4]; 4];
        for (idx, cell) in rows.iter_mut().flatten().enumerate() {
            *cell = self.tile_value(idx);
        }
        rows
    }

    /// Return the board resulting from sliding/merging tiles in `dir` (no random insert).
    ///
    /// A direction that changes nothing returns `self` bit-for-bit.
    #[inline]
    pub fn shift(self, dir: Move) -> Self {
        let t = tables();
        let raw = match dir {
            Move::Left => shift_rows(self.0, &t.left),
            Move::Right => shift_rows(self.0, &t.right),
            Move::Up => transpose(shift_rows(transpose(self.0), &t.left)),
            Move::Down => transpose(shift_rows(transpose(self.0), &t.right)),
        };
        Board(raw)
    }

    /// True if sliding in `dir` changes the board.
    #[inline]
    pub fn is_legal(self, dir: Move) -> bool { self.shift(dir) != self }

    /// Exponent stored at `idx` (0..16, row-major); 0 means empty.
    #[inline]
    pub fn exponent(self, idx: usize) -> u8 {
        ((self.0 >> nibble_shift(idx)) & 0xf) as u8
    }

    /// Tile value at `idx` (0..16, row-major), 0 for an empty cell.
    #[inline]
    pub fn tile_value(self, idx: usize) -> u32 {
        match self.exponent(idx) {
            0 => 0,
            e => 1 << e,
        }
    }

    /// A copy of this board with the cell at `idx` set to `2^exponent` (0 clears it).
    #[inline]
    pub fn with_tile(self, idx: usize, exponent: u8) -> Self {
        let shift = nibble_shift(idx);
        let cleared = self.0 & !(0xf << shift);
        Board(cleared | (u64::from(exponent & 0xf) << shift))
    }

    /// Indices of the empty cells, in row-major order.
    pub fn empty_cells(self) -> impl Iterator<Item = usize> {
        (0..16).filter(move |&idx| self.exponent(idx) == 0)
    }

    /// Count the number of empty cells on the board.
    // https://stackoverflow.com/questions/38225571/count-number-of-zero-nibbles-in-an-unsigned-64-bit-integer
    #[inline]
    pub fn count_empty(self) -> u32 {
        let mut folded = self.0;
        folded |= folded >> 1;
        folded |= folded >> 2;
        folded &= 0x1111_1111_1111_1111;
        16 - folded.count_ones()
    }

    /// Return the highest tile value present on the board (0 when empty).
    pub fn highest_tile(self) -> u32 {
        match (0..16).map(|idx| self.exponent(idx)).max().unwrap_or(0) {
            0 => 0,
            e => 1 << e,
        }
    }

    /// Return true if no direction changes the board.
    ///
    /// ```
    /// use expectimax_2048::engine::Board;
    /// // Nothing slides on an empty board.
    /// assert!(Board::EMPTY.is_game_over());
    /// ```
    pub fn is_game_over(self) -> bool {
        Move::ALL.iter().all(|&dir| !self.is_legal(dir))
    }

    /// Insert a random 2 (90%) or 4 (10%) tile into a random empty slot, using the provided RNG.
    ///
    /// A full board is returned unchanged.
    ///
    /// ```
    /// use expectimax_2048::engine::Board;
    /// use rand::{SeedableRng, rngs::StdRng};
    /// let mut rng = StdRng::seed_from_u64(123);
    /// let b = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
    /// assert_eq!(b.count_empty(), 14);
    /// ```
    pub fn with_random_tile<R: Rng + ?Sized>(self, rng: &mut R) -> Self {
        let empty = self.count_empty();
        if empty == 0 {
            return self;
        }
        let nth = rng.gen_range(0..empty) as usize;
        let exponent = if rng.gen_range(0..10) < 9 { 1 } else { 2 };
        match self.empty_cells().nth(nth) {
            Some(idx) => self.with_tile(idx, exponent),
            None => self,
        }
    }

    /// Perform a move then insert a random tile if the move changed the board.
    #[inline]
    pub fn make_move<R: Rng + ?Sized>(self, dir: Move, rng: &mut R) -> Self {
        let moved = self.shift(dir);
        if moved != self { moved.with_random_tile(rng) } else { self }
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Board({:#018x})", self.0)
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (row, cells) in self.to_rows().iter().enumerate() {
            if row > 0 {
                writeln!(f, "{}", "-".repeat(31))?;
            }
            let line: Vec<String> = cells
                .iter()
                .map(|&v| if v == 0 { " ".repeat(7) } else { format!("{v:^7}") })
                .collect();
            writeln!(f, "{}", line.join("|"))?;
        }
        Ok(())
    }
}

/// Board transition consumed by the search.
///
/// Implementations must be pure and must return the input board unchanged
/// when the move has no effect; that equality is the only legality signal.
pub trait MoveSimulator {
    fn apply(&self, board: Board, dir: Move) -> Board;
}

/// The lookup-table slide/merge used by [`Board::shift`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TableMoves;

impl MoveSimulator for TableMoves {
    #[inline]
    fn apply(&self, board: Board, dir: Move) -> Board { board.shift(dir) }
}

struct ShiftTables {
    left: Box<[Line]>,
    right: Box<[Line]>,
}

static TABLES: OnceLock<ShiftTables> = OnceLock::new();

/// Build the shift tables now instead of on first use. Safe to call multiple times.
pub fn new() {
    let _ = tables();
}

#[inline(always)]
fn tables() -> &'static ShiftTables {
    TABLES.get_or_init(build_tables)
}

fn build_tables() -> ShiftTables {
    // Heap allocated to avoid large stack frames
    let mut left = vec![0 as Line; LINE_TABLE_SIZE];
    let mut right = vec![0 as Line; LINE_TABLE_SIZE];
    for line in 0..LINE_TABLE_SIZE {
        let cells = unpack_line(line as Line);
        left[line] = pack_line(slide_front(cells));
        let mut reversed = cells;
        reversed.reverse();
        let mut slid = slide_front(reversed);
        slid.reverse();
        right[line] = pack_line(slid);
    }
    ShiftTables { left: left.into_boxed_slice(), right: right.into_boxed_slice() }
}

/// Slide tiles toward index 0, merging each pair of equal tiles at most once.
fn slide_front(cells: [u8; 4]) -> [u8; 4] {
    let mut out = [0u8; 4];
    let mut len = 0;
    let mut just_merged = false;
    for &cell in cells.iter().filter(|&&c| c != 0) {
        // 2^15 tiles do not merge; the nibble has no room for 2^16.
        if len > 0 && !just_merged && out[len - 1] == cell && cell < MAX_EXPONENT {
            out[len - 1] += 1;
            just_merged = true;
        } else {
            out[len] = cell;
            len += 1;
            just_merged = false;
        }
    }
    out
}

fn shift_rows(board: BoardRaw, table: &[Line]) -> BoardRaw {
    (0..4).fold(0, |acc, row_idx| {
        let row = extract_line(board, row_idx);
        acc | (u64::from(table[row as usize]) << ((3 - row_idx) * 16))
    })
}

// Credit to Nneonneo
pub(crate) fn transpose(x: BoardRaw) -> BoardRaw {
    let a1 = x & 0xF0F00F0FF0F00F0F;
    let a2 = x & 0x0000F0F00000F0F0;
    let a3 = x & 0x0F0F00000F0F0000;
    let a = a1 | (a2 << 12) | (a3 >> 12);
    let b1 = a & 0xFF00FF0000FF00FF;
    let b2 = a & 0x00FF00FF00000000;
    let b3 = a & 0x00000000FF00FF00;
    b1 | (b2 >> 24) | (b3 << 24)
}

/// Row `line_idx` (0 = top) of a packed board as a 16-bit line.
#[inline]
pub(crate) fn extract_line(board: BoardRaw, line_idx: u64) -> Line {
    ((board >> ((3 - line_idx) * 16)) & 0xffff) as Line
}

/// Exponents of a line, index 0 being the most significant nibble.
pub(crate) fn unpack_line(line: Line) -> [u8; 4] {
    [(line >> 12) as u8 & 0xf, (line >> 8) as u8 & 0xf, (line >> 4) as u8 & 0xf, line as u8 & 0xf]
}

fn pack_line(cells: [u8; 4]) -> Line {
    cells.iter().fold(0, |line, &c| (line << 4) | Line::from(c))
}

#[inline]
fn nibble_shift(idx: usize) -> u32 {
    debug_assert!(idx < 16);
    60 - 4 * idx as u32
}

fn tile_exponent(row: usize, col: usize, value: u32) -> Result<u8, BoardError> {
    if value == 0 {
        return Ok(0);
    }
    if value == 1 || !value.is_power_of_two() {
        return Err(BoardError::NotPowerOfTwo { row, col, value });
    }
    let exponent = value.trailing_zeros();
    if exponent > u32::from(MAX_EXPONENT) {
        return Err(BoardError::TooLarge { row, col, value });
    }
    Ok(exponent as u8)
}
