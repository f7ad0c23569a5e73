/// Shared data structures for the asset state
///
/// These types flow between the manifest store, the caches and the
/// category selectors.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Visual category a bundle is selected for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Card face pack (one sprite per suit/rank)
    CardFaces,
    /// Card back (single sprite)
    CardBack,
    /// Table background (single sprite)
    Background,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::CardFaces, Category::CardBack, Category::Background];

    /// Whether every image of the bundle is extracted, or only the first one
    pub fn extracts_all_images(self) -> bool {
        matches!(self, Category::CardFaces)
    }

    /// Preference key holding the user's selection for this category
    pub fn preference_key(self) -> &'static str {
        match self {
            Category::CardFaces => "CardFaces",
            Category::CardBack => "CardBack",
            Category::Background => "Background",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::CardFaces => "card face",
            Category::CardBack => "card back",
            Category::Background => "background",
        };
        f.write_str(name)
    }
}

/// Catalog of available bundles per category
///
/// Mirrors the remote `AssetsInfo.json` document. Missing arrays decode as
/// empty and unknown fields are ignored.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Manifest {
    pub card_face_bundles: Vec<String>,
    pub card_back_bundles: Vec<String>,
    pub background_bundles: Vec<String>,
}

impl Manifest {
    /// Parse from the JSON wire format
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Convert to the JSON wire format
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn bundles(&self, category: Category) -> &[String] {
        match category {
            Category::CardFaces => &self.card_face_bundles,
            Category::CardBack => &self.card_back_bundles,
            Category::Background => &self.background_bundles,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CardSuit {
    Clubs,
    Diamonds,
    Hearts,
    Spades,
}

impl CardSuit {
    pub const ALL: [CardSuit; 4] = [CardSuit::Clubs, CardSuit::Diamonds, CardSuit::Hearts, CardSuit::Spades];
}

impl fmt::Display for CardSuit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Card rank with the numeric value used in sprite names.
/// There is no 11: the face cards start at 12.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CardRank {
    Two = 2,
    Three = 3,
    Four = 4,
    Five = 5,
    Six = 6,
    Seven = 7,
    Eight = 8,
    Nine = 9,
    Ten = 10,
    Jack = 12,
    Queen = 13,
    King = 14,
    Ace = 15,
}

impl CardRank {
    pub const ALL: [CardRank; 13] = [
        CardRank::Two,
        CardRank::Three,
        CardRank::Four,
        CardRank::Five,
        CardRank::Six,
        CardRank::Seven,
        CardRank::Eight,
        CardRank::Nine,
        CardRank::Ten,
        CardRank::Jack,
        CardRank::Queen,
        CardRank::King,
        CardRank::Ace,
    ];

    pub fn value(self) -> u8 {
        self as u8
    }
}

/// Name of the sprite for a card inside a face pack, e.g. `Hearts_12`
pub fn card_sprite_name(suit: CardSuit, rank: CardRank) -> String {
    format!("{}_{}", suit, rank.value())
}
