use std::collections::HashMap;

/// One game as yielded by the PGN scanner: the flat header-tag mapping and
/// the main line converted to UCI long-algebraic moves.
///
/// `moves` may be shorter than the movetext if a token failed to parse or
/// was illegal in its position; the sequence is truncated at that point.
#[derive(Debug, Clone, Default)]
pub struct GameRecord {
    pub tags: HashMap<String, String>,
    pub moves: Vec<String>,
}

impl GameRecord {
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    pub fn ply_count(&self) -> usize {
        self.moves.len()
    }
}
