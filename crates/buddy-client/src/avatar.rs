//! Presentational catalogs: avatar options, roles and moods with their
//! Portuguese labels.

use rand::Rng;

use buddy_types::models::{Mood, Role};

pub const AVATAR_STYLES: [&str; 5] = [
    "fun-emoji",
    "adventurer",
    "big-smile",
    "bottts",
    "croodles-neutral",
];

const SEED_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const SEED_LEN: usize = 6;

pub fn avatar_url(style: &str, seed: &str) -> String {
    format!(
        "https://api.dicebear.com/7.x/{style}/svg?seed={seed}&size=120&backgroundColor=transparent"
    )
}

pub fn random_seed() -> String {
    let mut rng = rand::rng();
    (0..SEED_LEN)
        .map(|_| SEED_ALPHABET[rng.random_range(0..SEED_ALPHABET.len())] as char)
        .collect()
}

/// One fresh option per style.
pub fn avatar_options() -> Vec<String> {
    AVATAR_STYLES
        .iter()
        .map(|style| avatar_url(style, &random_seed()))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleOption {
    pub role: Role,
    pub title: &'static str,
    pub subtitle: &'static str,
}

pub const ROLE_OPTIONS: [RoleOption; 3] = [
    RoleOption {
        role: Role::Student,
        title: "Estudante",
        subtitle: "Sou uma criança que precisa de ajuda",
    },
    RoleOption {
        role: Role::Parent,
        title: "Pai/Mãe",
        subtitle: "Quero cuidar do meu filho",
    },
    RoleOption {
        role: Role::Educator,
        title: "Educador",
        subtitle: "Sou professor ou cuidador",
    },
];

pub fn mood_label(mood: Mood) -> &'static str {
    match mood {
        Mood::Happy => "😊 Feliz",
        Mood::Sad => "😢 Triste",
        Mood::Calm => "😌 Calmo",
        Mood::Excited => "🤩 Animado",
        Mood::Focused => "🎯 Focado",
    }
}

/// The mood selector, in display order.
pub fn mood_options() -> Vec<(Mood, &'static str)> {
    Mood::ALL.into_iter().map(|mood| (mood, mood_label(mood))).collect()
}
