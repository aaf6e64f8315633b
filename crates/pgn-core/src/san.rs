//! SAN and UCI move conversion against a live board.

use chess::{Board, ChessMove, File, MoveGen, Piece, Rank, Square};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SanError {
    #[error("empty SAN token")]
    Empty,

    #[error("unknown piece letter '{0}'")]
    UnknownPiece(char),

    #[error("bad destination square in '{0}'")]
    BadDestination(String),

    #[error("no legal move matches '{0}'")]
    NoMatch(String),

    #[error("ambiguous SAN '{0}' ({1} candidates)")]
    Ambiguous(String, usize),
}

/// Format a move in UCI long-algebraic form, e.g. `e2e4` or `e7e8q`.
pub fn move_to_uci(m: ChessMove) -> String {
    let promo = match m.get_promotion() {
        Some(Piece::Queen) => "q",
        Some(Piece::Rook) => "r",
        Some(Piece::Bishop) => "b",
        Some(Piece::Knight) => "n",
        _ => "",
    };
    format!("{}{}{}", m.get_source(), m.get_dest(), promo)
}

/// Parse a UCI move string and check it is legal in `board`.
pub fn uci_to_move(board: &Board, uci: &str) -> Option<ChessMove> {
    let bytes = uci.as_bytes();
    if bytes.len() < 4 {
        return None;
    }

    let from = square_from_bytes(bytes[0], bytes[1])?;
    let to = square_from_bytes(bytes[2], bytes[3])?;

    let promotion = if bytes.len() > 4 {
        match bytes[4].to_ascii_lowercase() {
            b'q' => Some(Piece::Queen),
            b'r' => Some(Piece::Rook),
            b'b' => Some(Piece::Bishop),
            b'n' => Some(Piece::Knight),
            _ => return None,
        }
    } else {
        None
    };

    let m = ChessMove::new(from, to, promotion);
    board.legal(m).then_some(m)
}

fn square_from_bytes(file: u8, rank: u8) -> Option<Square> {
    if !(b'a'..=b'h').contains(&file) || !(b'1'..=b'8').contains(&rank) {
        return None;
    }
    Some(Square::make_square(
        Rank::from_index((rank - b'1') as usize),
        File::from_index((file - b'a') as usize),
    ))
}

/// Resolve a SAN token to the unique legal move it denotes.
///
/// Accepts check/mate/annotation suffixes, both castling spellings, and
/// file/rank disambiguation.
pub fn san_to_move(board: &Board, san: &str) -> Result<ChessMove, SanError> {
    let clean = san.trim_end_matches(|c: char| matches!(c, '+' | '#' | '!' | '?'));
    if clean.is_empty() {
        return Err(SanError::Empty);
    }

    let legal: Vec<ChessMove> = MoveGen::new_legal(board).collect();

    if clean == "O-O" || clean == "0-0" {
        return castling_move(board, &legal, true).ok_or_else(|| SanError::NoMatch(san.into()));
    }
    if clean == "O-O-O" || clean == "0-0-0" {
        return castling_move(board, &legal, false).ok_or_else(|| SanError::NoMatch(san.into()));
    }

    let (piece, rest) = split_piece(clean)?;
    let (rest, promotion) = split_promotion(rest);
    let rest = rest.replace('x', "");

    let bytes = rest.as_bytes();
    if bytes.len() < 2 {
        return Err(SanError::BadDestination(san.into()));
    }
    let dest = square_from_bytes(bytes[bytes.len() - 2], bytes[bytes.len() - 1])
        .ok_or_else(|| SanError::BadDestination(san.into()))?;
    let disambig = &rest[..rest.len() - 2];

    let mut candidates: Vec<ChessMove> = legal
        .into_iter()
        .filter(|m| {
            m.get_dest() == dest
                && board.piece_on(m.get_source()) == Some(piece)
                && m.get_promotion() == promotion
        })
        .collect();

    if candidates.len() > 1 && !disambig.is_empty() {
        candidates.retain(|m| source_matches(m.get_source(), disambig));
    }

    match candidates.len() {
        1 => Ok(candidates[0]),
        0 => Err(SanError::NoMatch(san.into())),
        n => Err(SanError::Ambiguous(san.into(), n)),
    }
}

fn castling_move(board: &Board, legal: &[ChessMove], kingside: bool) -> Option<ChessMove> {
    legal.iter().copied().find(|m| {
        if board.piece_on(m.get_source()) != Some(Piece::King) {
            return false;
        }
        let src = m.get_source().get_file().to_index() as i32;
        let dst = m.get_dest().get_file().to_index() as i32;
        if kingside {
            dst - src == 2
        } else {
            src - dst == 2
        }
    })
}

fn split_piece(clean: &str) -> Result<(Piece, &str), SanError> {
    let first = clean.as_bytes()[0];
    if !first.is_ascii_uppercase() {
        return Ok((Piece::Pawn, clean));
    }
    let piece = match first {
        b'K' => Piece::King,
        b'Q' => Piece::Queen,
        b'R' => Piece::Rook,
        b'B' => Piece::Bishop,
        b'N' => Piece::Knight,
        other => return Err(SanError::UnknownPiece(other as char)),
    };
    Ok((piece, &clean[1..]))
}

fn split_promotion(rest: &str) -> (&str, Option<Piece>) {
    match rest.find('=') {
        Some(pos) => {
            let promo = match rest.as_bytes().get(pos + 1) {
                Some(b'Q') => Some(Piece::Queen),
                Some(b'R') => Some(Piece::Rook),
                Some(b'B') => Some(Piece::Bishop),
                Some(b'N') => Some(Piece::Knight),
                _ => None,
            };
            (&rest[..pos], promo)
        }
        None => (rest, None),
    }
}

fn source_matches(src: Square, disambig: &str) -> bool {
    for &b in disambig.as_bytes() {
        if (b'a'..=b'h').contains(&b) {
            if src.get_file().to_index() != (b - b'a') as usize {
                return false;
            }
        } else if (b'1'..=b'8').contains(&b) {
            if src.get_rank().to_index() != (b - b'1') as usize {
                return false;
            }
        }
    }
    true
}
