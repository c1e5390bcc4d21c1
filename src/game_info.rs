use crate::tree::Fields;


// Header shown above the board, read from the root node's properties.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct GameInfo {
    pub black: String,
    pub white: String,
    pub result: Option<String>,
    pub komi: Option<String>,
    pub date: Option<String>,
    pub ruleset: Option<String>,
}

impl GameInfo {
    pub fn from_fields(fields: &Fields) -> Self {
        let player = |name_key: &str, rank_key: &str, default: &str| {
            let name = fields.first(name_key).map(str::trim).filter(|s| !s.is_empty()).unwrap_or(default);
            match fields.first(rank_key).map(str::trim).filter(|s| !s.is_empty()) {
                Some(rank) => format!("{name} [{rank}]"),
                None => name.to_owned(),
            }
        };
        let text = |key: &str| fields.first(key).map(str::trim).filter(|s| !s.is_empty()).map(str::to_owned);
        GameInfo {
            black: player("PB", "BR", "Black"),
            white: player("PW", "WR", "White"),
            result: text("RE"),
            komi: text("KM"),
            date: text("DT"),
            ruleset: text("RU"),
        }
    }

    // (label, value) pairs in display order, skipping what is not known.
    pub fn rows(&self) -> Vec<(&'static str, &str)> {
        let mut rows = vec![("Black", self.black.as_str()), ("White", self.white.as_str())];
        let optional = [
            ("Result", &self.result),
            ("Komi", &self.komi),
            ("Date", &self.date),
            ("Ruleset", &self.ruleset),
        ];
        rows.extend(optional.into_iter().filter_map(|(label, value)| Some((label, value.as_deref()?))));
        rows
    }
}

impl Default for GameInfo {
    fn default() -> Self { GameInfo::from_fields(&Fields::new()) }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn players_with_ranks() {
        let mut fields = Fields::new();
        fields.add("PB", "Lee Sedol");
        fields.add("BR", "9p");
        fields.add("PW", "  ");
        fields.add("KM", "6.5");
        let info = GameInfo::from_fields(&fields);
        assert_eq!(info.black, "Lee Sedol [9p]");
        assert_eq!(info.white, "White");
        assert_eq!(info.rows(), vec![("Black", "Lee Sedol [9p]"), ("White", "White"), ("Komi", "6.5")]);
    }
}
