//! Conversion between our `Board` and shakmaty positions.
//!
//! The board is handed to shakmaty square by square through a `Setup`;
//! FEN text only ever comes out of shakmaty's own writer.

use std::num::NonZeroU32;

use shakmaty::fen::Fen;
use shakmaty::{
    Bitboard, CastlingMode, CastlingSide, Chess, Color, EnPassantMode, File, FromSetup, Position,
    PositionError, Rank, Role, Setup,
};

use crate::board::{Board, CastlingRights, Kind, MoveClock, Piece, Side, Square, BOARD_LEN};
use crate::error::IllegalMove;

pub(crate) fn to_sm_square(sq: Square) -> shakmaty::Square {
    shakmaty::Square::from_coords(File::new(sq.file() as u32), Rank::new(sq.rank() as u32))
}

fn to_color(side: Side) -> Color {
    match side {
        Side::White => Color::White,
        Side::Black => Color::Black,
    }
}

fn to_role(kind: Kind) -> Role {
    match kind {
        Kind::Pawn => Role::Pawn,
        Kind::Knight => Role::Knight,
        Kind::Bishop => Role::Bishop,
        Kind::Rook => Role::Rook,
        Kind::Queen => Role::Queen,
        Kind::King => Role::King,
    }
}

fn from_sm_piece(piece: shakmaty::Piece) -> Piece {
    let side = match piece.color {
        Color::White => Side::White,
        Color::Black => Side::Black,
    };
    let kind = match piece.role {
        Role::Pawn => Kind::Pawn,
        Role::Knight => Kind::Knight,
        Role::Bishop => Kind::Bishop,
        Role::Rook => Kind::Rook,
        Role::Queen => Kind::Queen,
        Role::King => Kind::King,
    };
    Piece::new(side, kind)
}

/// Castling rights as shakmaty wants them: the set of rook origin squares.
fn castling_bitboard(rights: CastlingRights) -> Bitboard {
    let mut rooks = Bitboard::EMPTY;
    for (held, sq) in [
        (rights.white_king_side, shakmaty::Square::H1),
        (rights.white_queen_side, shakmaty::Square::A1),
        (rights.black_king_side, shakmaty::Square::H8),
        (rights.black_queen_side, shakmaty::Square::A8),
    ] {
        if held {
            rooks |= Bitboard::from(sq);
        }
    }
    rooks
}

/// The raw setup for `board` with `side` to move. Not validated.
pub(crate) fn to_setup(board: &Board, side: Side) -> Setup {
    let mut placement = shakmaty::Board::empty();
    for sq in board.squares() {
        if let Some(piece) = board.piece_at(sq) {
            placement.set_piece_at(
                to_sm_square(sq),
                shakmaty::Piece {
                    color: to_color(piece.side),
                    role: to_role(piece.kind),
                },
            );
        }
    }

    let clock = board.clock();
    let mut setup = Setup::empty();
    setup.board = placement;
    setup.turn = to_color(side);
    setup.castling_rights = castling_bitboard(board.castling());
    setup.ep_square = board.en_passant().map(to_sm_square);
    setup.halfmoves = clock.halfmoves;
    setup.fullmoves = NonZeroU32::new(clock.fullmoves).unwrap_or(NonZeroU32::MIN);
    setup
}

/// A legal-chess position for `board`. Stale castling rights and en passant
/// squares are dropped rather than rejected.
pub(crate) fn to_chess(board: &Board, side: Side) -> Result<Chess, IllegalMove> {
    Chess::from_setup(to_setup(board, side), CastlingMode::Standard)
        .or_else(PositionError::ignore_invalid_castling_rights)
        .or_else(PositionError::ignore_invalid_ep_square)
        .map_err(|e| IllegalMove::Position(e.to_string()))
}

pub(crate) fn from_chess(pos: &Chess) -> Board {
    let mut cells = [[None; BOARD_LEN]; BOARD_LEN];
    for (file, column) in cells.iter_mut().enumerate() {
        for (rank, cell) in column.iter_mut().enumerate() {
            let sq = shakmaty::Square::from_coords(File::new(file as u32), Rank::new(rank as u32));
            *cell = pos.board().piece_at(sq).map(from_sm_piece);
        }
    }

    let castles = pos.castles();
    let castling = CastlingRights {
        white_king_side: castles.has(Color::White, CastlingSide::KingSide),
        white_queen_side: castles.has(Color::White, CastlingSide::QueenSide),
        black_king_side: castles.has(Color::Black, CastlingSide::KingSide),
        black_queen_side: castles.has(Color::Black, CastlingSide::QueenSide),
    };

    let en_passant = pos
        .ep_square(EnPassantMode::Legal)
        .and_then(|sq| Square::new(sq.file() as u8, sq.rank() as u8));

    let clock = MoveClock {
        halfmoves: pos.halfmoves(),
        fullmoves: pos.fullmoves().get(),
    };

    Board::with_state(cells, castling, en_passant, clock)
}

/// FEN for `board`. Boards that are not legal chess (possible under the
/// permissive rules, e.g. after a king capture) are written as-is.
pub(crate) fn fen(board: &Board, side: Side) -> String {
    match to_chess(board, side) {
        Ok(pos) => Fen::from_position(pos, EnPassantMode::Legal).to_string(),
        Err(_) => Fen::from_setup(to_setup(board, side)).to_string(),
    }
}

/// Test fixtures: parse a FEN through shakmaty into a board.
#[cfg(test)]
pub(crate) fn board_from_fen(fen: &str) -> (Board, Side) {
    let fen: Fen = fen.parse().expect("valid FEN");
    let pos: Chess = fen
        .into_position(CastlingMode::Standard)
        .expect("legal position");
    let side = match pos.turn() {
        Color::White => Side::White,
        Color::Black => Side::Black,
    };
    (from_chess(&pos), side)
}
