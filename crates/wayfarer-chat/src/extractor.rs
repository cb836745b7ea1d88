//! Coarse destination detection against a fixed list of well-known places.

/// Well-known destinations, in match priority order.
pub const KNOWN_DESTINATIONS: &[&str] = &[
    "New York",
    "Los Angeles",
    "San Francisco",
    "Rio de Janeiro",
    "Buenos Aires",
    "Cape Town",
    "Hong Kong",
    "Mexico City",
    "Paris",
    "London",
    "Tokyo",
    "Rome",
    "Barcelona",
    "Madrid",
    "Lisbon",
    "Amsterdam",
    "Berlin",
    "Prague",
    "Vienna",
    "Budapest",
    "Athens",
    "Istanbul",
    "Dubai",
    "Singapore",
    "Bangkok",
    "Bali",
    "Seoul",
    "Kyoto",
    "Sydney",
    "Melbourne",
    "Toronto",
    "Vancouver",
    "Cairo",
    "Marrakech",
    "Reykjavik",
    "Italy",
    "France",
    "Spain",
    "Japan",
    "Thailand",
    "Greece",
    "Portugal",
    "Iceland",
    "Mexico",
    "Australia",
];

/// Finds the first known destination mentioned in a message.
#[derive(Debug, Clone)]
pub struct DestinationExtractor {
    destinations: Vec<String>,
}

impl Default for DestinationExtractor {
    fn default() -> Self {
        Self::new(KNOWN_DESTINATIONS.iter().copied())
    }
}

impl DestinationExtractor {
    pub fn new<I, S>(destinations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            destinations: destinations.into_iter().map(Into::into).collect(),
        }
    }

    /// The first list entry contained in `text`, case-insensitively.
    pub fn extract(&self, text: &str) -> Option<&str> {
        let haystack = text.to_lowercase();
        self.destinations
            .iter()
            .find(|d| haystack.contains(&d.to_lowercase()))
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_case_insensitive() {
        let ex = DestinationExtractor::default();
        assert_eq!(ex.extract("thinking about PARIS in spring"), Some("Paris"));
        assert_eq!(ex.extract("what's on in tokyo?"), Some("Tokyo"));
    }

    #[test]
    fn test_extract_none() {
        let ex = DestinationExtractor::default();
        assert_eq!(ex.extract("what should I pack?"), None);
        assert_eq!(ex.extract(""), None);
    }

    #[test]
    fn test_first_match_in_list_order_wins() {
        let ex = DestinationExtractor::default();
        // "Paris" precedes "France" in the list regardless of message order.
        assert_eq!(ex.extract("France, specifically Paris"), Some("Paris"));
    }

    #[test]
    fn test_multi_word_destinations() {
        let ex = DestinationExtractor::default();
        assert_eq!(ex.extract("a week in new york city"), Some("New York"));
    }

    #[test]
    fn test_custom_list() {
        let ex = DestinationExtractor::new(["Zanzibar", "Zurich"]);
        assert_eq!(ex.extract("zurich or zanzibar"), Some("Zanzibar"));
    }
}
