//! The 8x8 board as a plain value type.
//!
//! Cells are indexed `[file][rank]`: file 0..7 is `a`..`h`, rank 0..7 is
//! `1`..`8`. A board never changes in place from the outside; move
//! application returns a new board and the caller swaps it in.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{IllegalMove, ParseError};
use crate::notation::Move;
use crate::position;
use crate::rules::MoveRules;

pub const BOARD_LEN: usize = 8;

// ---- Sides and pieces ----

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    White,
    Black,
}

impl Side {
    pub fn opponent(self) -> Side {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }

    fn prefix(self) -> char {
        match self {
            Side::White => 'w',
            Side::Black => 'b',
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::White => f.write_str("white"),
            Side::Black => f.write_str("black"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

impl Kind {
    fn letter(self) -> char {
        match self {
            Kind::Pawn => 'P',
            Kind::Knight => 'N',
            Kind::Bishop => 'B',
            Kind::Rook => 'R',
            Kind::Queen => 'Q',
            Kind::King => 'K',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Piece {
    pub side: Side,
    pub kind: Kind,
}

impl Piece {
    pub const fn new(side: Side, kind: Kind) -> Self {
        Self { side, kind }
    }

    /// Wire token, e.g. `"wP"` or `"bK"`.
    pub fn token(self) -> String {
        let mut s = String::with_capacity(2);
        s.push(self.side.prefix());
        s.push(self.kind.letter());
        s
    }
}

// ---- Squares ----

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Square {
    file: u8,
    rank: u8,
}

impl Square {
    pub fn new(file: u8, rank: u8) -> Option<Square> {
        if (file as usize) < BOARD_LEN && (rank as usize) < BOARD_LEN {
            Some(Square { file, rank })
        } else {
            None
        }
    }

    pub fn file(self) -> u8 {
        self.file
    }

    pub fn rank(self) -> u8 {
        self.rank
    }
}

impl FromStr for Square {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != 2 {
            return Err(ParseError::Square(s.to_string()));
        }
        let file = bytes[0].wrapping_sub(b'a');
        let rank = bytes[1].wrapping_sub(b'1');
        Square::new(file, rank).ok_or_else(|| ParseError::Square(s.to_string()))
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", (b'a' + self.file) as char, (b'1' + self.rank) as char)
    }
}

// ---- Castling rights ----

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CastlingRights {
    pub white_king_side: bool,
    pub white_queen_side: bool,
    pub black_king_side: bool,
    pub black_queen_side: bool,
}

impl CastlingRights {
    pub const ALL: CastlingRights = CastlingRights {
        white_king_side: true,
        white_queen_side: true,
        black_king_side: true,
        black_queen_side: true,
    };

    pub const NONE: CastlingRights = CastlingRights {
        white_king_side: false,
        white_queen_side: false,
        black_king_side: false,
        black_queen_side: false,
    };

    /// Drop any right tied to a king or rook origin square that was touched.
    fn revoke_touching(&mut self, sq: Square) {
        match (sq.file, sq.rank) {
            (4, 0) => {
                self.white_king_side = false;
                self.white_queen_side = false;
            }
            (4, 7) => {
                self.black_king_side = false;
                self.black_queen_side = false;
            }
            (0, 0) => self.white_queen_side = false,
            (7, 0) => self.white_king_side = false,
            (0, 7) => self.black_queen_side = false,
            (7, 7) => self.black_king_side = false,
            _ => {}
        }
    }
}

// ---- Board ----

/// The wire rendering of a board: 8 files of 8 ranks of piece tokens,
/// `""` for an empty cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoardSnapshot(pub [[String; BOARD_LEN]; BOARD_LEN]);

impl BoardSnapshot {
    pub fn cell(&self, file: usize, rank: usize) -> &str {
        &self.0[file][rank]
    }
}

/// Halfmove clock and fullmove number, as carried in FEN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MoveClock {
    pub halfmoves: u32,
    pub fullmoves: u32,
}

impl MoveClock {
    pub const START: MoveClock = MoveClock {
        halfmoves: 0,
        fullmoves: 1,
    };

    /// Advance past a move by `side`. Pawn moves and captures reset the
    /// halfmove clock.
    fn tick(self, side: Side, resets: bool) -> MoveClock {
        MoveClock {
            halfmoves: if resets { 0 } else { self.halfmoves + 1 },
            fullmoves: match side {
                Side::White => self.fullmoves,
                Side::Black => self.fullmoves + 1,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Board {
    cells: [[Option<Piece>; BOARD_LEN]; BOARD_LEN],
    castling: CastlingRights,
    en_passant: Option<Square>,
    clock: MoveClock,
}

impl Default for Board {
    fn default() -> Self {
        Self::standard()
    }
}

impl Board {
    pub fn empty() -> Self {
        Self {
            cells: [[None; BOARD_LEN]; BOARD_LEN],
            castling: CastlingRights::NONE,
            en_passant: None,
            clock: MoveClock::START,
        }
    }

    /// The standard starting position.
    pub fn standard() -> Self {
        const BACK_RANK: [Kind; BOARD_LEN] = [
            Kind::Rook,
            Kind::Knight,
            Kind::Bishop,
            Kind::Queen,
            Kind::King,
            Kind::Bishop,
            Kind::Knight,
            Kind::Rook,
        ];

        let mut board = Self::empty();
        for (file, kind) in BACK_RANK.iter().enumerate() {
            board.cells[file][0] = Some(Piece::new(Side::White, *kind));
            board.cells[file][1] = Some(Piece::new(Side::White, Kind::Pawn));
            board.cells[file][6] = Some(Piece::new(Side::Black, Kind::Pawn));
            board.cells[file][7] = Some(Piece::new(Side::Black, *kind));
        }
        board.castling = CastlingRights::ALL;
        board
    }

    pub fn piece_at(&self, sq: Square) -> Option<Piece> {
        self.cells[sq.file as usize][sq.rank as usize]
    }

    pub fn castling(&self) -> CastlingRights {
        self.castling
    }

    pub fn en_passant(&self) -> Option<Square> {
        self.en_passant
    }

    pub fn clock(&self) -> MoveClock {
        self.clock
    }

    /// A copy of this board with `sq` set to `piece`.
    pub fn with_piece(&self, sq: Square, piece: Option<Piece>) -> Board {
        let mut next = self.clone();
        next.cells[sq.file as usize][sq.rank as usize] = piece;
        next
    }

    pub(crate) fn with_state(
        cells: [[Option<Piece>; BOARD_LEN]; BOARD_LEN],
        castling: CastlingRights,
        en_passant: Option<Square>,
        clock: MoveClock,
    ) -> Board {
        Board {
            cells,
            castling,
            en_passant,
            clock,
        }
    }

    pub fn king_square(&self, side: Side) -> Option<Square> {
        self.squares()
            .find(|sq| self.piece_at(*sq) == Some(Piece::new(side, Kind::King)))
    }

    /// All 64 squares, file-major.
    pub fn squares(&self) -> impl Iterator<Item = Square> {
        (0..BOARD_LEN as u8)
            .flat_map(|file| (0..BOARD_LEN as u8).map(move |rank| Square { file, rank }))
    }

    /// Validate `mv` for `side` under `rules` and return the resulting board.
    pub fn apply_move(
        &self,
        side: Side,
        mv: Move,
        rules: &dyn MoveRules,
    ) -> Result<Board, IllegalMove> {
        rules.apply(self, side, mv)
    }

    /// Move whatever stands on `mv.from` to `mv.to` with no rule checks,
    /// keeping castling rights and the clock in step and clearing en passant.
    pub(crate) fn relocate(&self, side: Side, mv: Move) -> Board {
        let mut next = self.clone();
        let moving = next.cells[mv.from.file as usize][mv.from.rank as usize].take();
        let captured = std::mem::replace(&mut next.cells[mv.to.file as usize][mv.to.rank as usize], moving);
        let pawn_move = moving.is_some_and(|p| p.kind == Kind::Pawn);
        next.castling.revoke_touching(mv.from);
        next.castling.revoke_touching(mv.to);
        next.en_passant = None;
        next.clock = self.clock.tick(side, pawn_move || captured.is_some());
        next
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        let cells = std::array::from_fn(|file| {
            std::array::from_fn(|rank| self.cells[file][rank].map(Piece::token).unwrap_or_default())
        });
        BoardSnapshot(cells)
    }

    /// FEN with `side` to move, rendered by shakmaty.
    pub fn to_fen(&self, side: Side) -> String {
        position::fen(self, side)
    }
}
