//! Streaming PGN scanner — lightweight regex-based, one game at a time.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use chess::Board;
use regex::Regex;

use crate::game_data::GameRecord;
use crate::san;

const STANDARD_START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Lazily yields one [`GameRecord`] per game in the input.
///
/// Games whose `SetUp` tag declares a non-standard start position are
/// yielded with an empty move list, as are games whose movetext cannot be
/// parsed at all; a bad token mid-game truncates the sequence there. The
/// scan itself never fails on malformed input.
pub struct PgnScanner<R: BufRead> {
    reader: R,
    pending: Option<String>,
    header_re: Regex,
    comment_re: Regex,
    variation_re: Regex,
    move_re: Regex,
}

impl PgnScanner<BufReader<File>> {
    pub fn open(path: &Path) -> io::Result<Self> {
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: BufRead> PgnScanner<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            pending: None,
            header_re: Regex::new(r#"\[(\w+)\s+"([^"]*)"\]"#).expect("valid regex"),
            comment_re: Regex::new(r"\{[^}]*\}").expect("valid regex"),
            variation_re: Regex::new(r"\([^)]*\)").expect("valid regex"),
            move_re: Regex::new(
                r"[KQRBN]?[a-h]?[1-8]?x?[a-h][1-8](?:=[QRBN])?[+#]?|O-O-O|O-O",
            )
            .expect("valid regex"),
        }
    }

    /// Read the next game, or `None` at end of input.
    pub fn next_game(&mut self) -> Option<GameRecord> {
        let mut record = GameRecord::default();
        let mut movetext = String::new();
        let mut seen_any = false;
        let mut headers_closed = false;

        loop {
            let line = match self.pending.take() {
                Some(line) => line,
                None => {
                    let mut buf = String::new();
                    match self.reader.read_line(&mut buf) {
                        Ok(0) | Err(_) => break,
                        Ok(_) => buf,
                    }
                }
            };
            let trimmed = line.trim();

            if trimmed.is_empty() {
                if !movetext.is_empty() {
                    break;
                }
                // A blank line after the header block closes it; a header
                // seen after that point belongs to the next game even if
                // this game has no movetext.
                if !record.tags.is_empty() {
                    headers_closed = true;
                }
                continue;
            }

            if trimmed.starts_with('[') {
                if !movetext.is_empty() || headers_closed {
                    // Header of the following game; keep it for the next call.
                    self.pending = Some(line);
                    break;
                }
                if let Some(cap) = self.header_re.captures(trimmed) {
                    record.tags.insert(cap[1].to_string(), cap[2].to_string());
                }
                seen_any = true;
            } else {
                movetext.push_str(trimmed);
                movetext.push(' ');
                seen_any = true;
            }
        }

        if !seen_any {
            return None;
        }

        if !self.standard_start(&record) {
            return Some(record);
        }

        record.moves = self.moves_from_movetext(&movetext);
        Some(record)
    }

    fn standard_start(&self, record: &GameRecord) -> bool {
        if record.tag("SetUp") != Some("1") {
            return true;
        }
        match record.tag("FEN") {
            Some(fen) => fen == STANDARD_START_FEN,
            None => true,
        }
    }

    /// Convert movetext into UCI moves by replaying SAN tokens on a board.
    /// Stops at the first token that fails to resolve to a legal move.
    fn moves_from_movetext(&self, text: &str) -> Vec<String> {
        let no_comments = self.comment_re.replace_all(text, "");
        let no_variations = self.variation_re.replace_all(&no_comments, "");

        let mut board = Board::default();
        let mut ucis = Vec::new();
        for token in self.move_re.find_iter(&no_variations) {
            match san::san_to_move(&board, token.as_str()) {
                Ok(m) => {
                    ucis.push(san::move_to_uci(m));
                    board = board.make_move_new(m);
                }
                Err(_) => break,
            }
        }
        ucis
    }
}

impl<R: BufRead> Iterator for PgnScanner<R> {
    type Item = GameRecord;

    fn next(&mut self) -> Option<GameRecord> {
        self.next_game()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const TWO_GAMES: &str = r#"[Event "Test Open"]
[White "Alice"]
[Black "Bob"]
[Result "1-0"]
[Date "2020.05.??"]

1. e4 e5 2. Nf3 {a comment} Nc6 3. Bb5 (3. Bc4 Bc5) a6 1-0

[White "Carol"]
[Black "Dave"]
[Result "1/2-1/2"]

1. d4 d5 1/2-1/2
"#;

    fn scan(input: &str) -> Vec<GameRecord> {
        PgnScanner::new(Cursor::new(input)).collect()
    }

    #[test]
    fn yields_each_game_with_tags_and_uci_moves() {
        let games = scan(TWO_GAMES);
        assert_eq!(games.len(), 2);

        assert_eq!(games[0].tag("White"), Some("Alice"));
        assert_eq!(games[0].tag("Date"), Some("2020.05.??"));
        assert_eq!(
            games[0].moves,
            vec!["e2e4", "e7e5", "g1f3", "b8c6", "f1b5", "a7a6"]
        );

        assert_eq!(games[1].tag("Result"), Some("1/2-1/2"));
        assert_eq!(games[1].moves, vec!["d2d4", "d7d5"]);
    }

    #[test]
    fn bad_token_truncates_instead_of_aborting() {
        let pgn = "[White \"X\"]\n\n1. e4 Ke4 2. e5\n";
        let games = scan(pgn);
        assert_eq!(games.len(), 1);
        assert_eq!(games[0].moves, vec!["e2e4"]);
    }

    #[test]
    fn non_standard_setup_yields_no_moves() {
        let pgn = "[SetUp \"1\"]\n[FEN \"4k3/8/8/8/8/8/8/4K3 w - - 0 1\"]\n\n1. Kd1 Kd8\n";
        let games = scan(pgn);
        assert_eq!(games.len(), 1);
        assert!(games[0].moves.is_empty());
    }

    #[test]
    fn header_only_games_stay_separate() {
        // Abandoned games carry headers but no movetext; two in a row must
        // not collapse into one record.
        let pgn = "[White \"Alice\"]\n[Result \"*\"]\n\n[White \"Bob\"]\n[Result \"*\"]\n\n";
        let games = scan(pgn);
        assert_eq!(games.len(), 2);
        assert_eq!(games[0].tag("White"), Some("Alice"));
        assert_eq!(games[1].tag("White"), Some("Bob"));
        assert!(games[0].moves.is_empty());
        assert!(games[1].moves.is_empty());
    }

    #[test]
    fn header_only_game_followed_by_normal_game() {
        let pgn = "[White \"Alice\"]\n\n[White \"Bob\"]\n\n1. e4 e5\n";
        let games = scan(pgn);
        assert_eq!(games.len(), 2);
        assert_eq!(games[0].tag("White"), Some("Alice"));
        assert!(games[0].moves.is_empty());
        assert_eq!(games[1].tag("White"), Some("Bob"));
        assert_eq!(games[1].moves, vec!["e2e4", "e7e5"]);
    }

    #[test]
    fn empty_input_ends_immediately() {
        assert!(scan("").is_empty());
        assert!(scan("\n\n").is_empty());
    }
}
