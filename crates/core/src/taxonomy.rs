//! Keyword-driven tags, features and controls for catalogue entries.
//!
//! Scraped pages rarely carry usable metadata, so records are enriched from
//! their title, description and embed type. All derivations are pure.

use std::collections::BTreeMap;

use crate::models::{GameRecord, GameType};

const MAX_DERIVED_TAGS: usize = 5;
const MAX_FEATURES: usize = 6;
const MAX_STANDARD_TAGS: usize = 6;

const TITLE_TAGS: &[(&str, &[&str])] = &[
    ("papa", &["Cooking", "Restaurant", "Time Management"]),
    ("parkour", &["Action", "Platform", "Adventure"]),
    ("clicker", &["Clicker", "Idle", "Casual"]),
    ("brainrot", &["Fun", "Meme", "Casual"]),
    ("drift", &["Racing", "Cars", "Driving"]),
    ("run", &["Running", "Endless", "Platform"]),
    ("merge", &["Puzzle", "Strategy", "Merge"]),
    ("obby", &["Platform", "Adventure", "Roblox"]),
    ("simulator", &["Simulation", "Management", "Strategy"]),
    ("geometry", &["Rhythm", "Platform", "Arcade"]),
    ("traffic", &["Cars", "Management", "Strategy"]),
    ("love", &["Casual", "Fun", "Social"]),
    ("pixel", &["Retro", "Arcade", "Pixel Art"]),
    ("io", &["Multiplayer", "Online", "Competitive"]),
];

const DESCRIPTION_TAGS: &[(&str, &str)] = &[
    ("survival", "Survival"),
    ("puzzle", "Puzzle"),
    ("racing", "Racing"),
    ("cooking", "Cooking"),
    ("adventure", "Adventure"),
    ("action", "Action"),
    ("strategy", "Strategy"),
    ("multiplayer", "Multiplayer"),
    ("3d", "3D"),
    ("retro", "Retro"),
    ("arcade", "Arcade"),
    ("casual", "Casual"),
];

const GENRES: &[(&str, &[&str])] = &[
    ("Action", &["action", "fight", "combat", "battle", "war", "shoot", "gun", "zombie", "adventure"]),
    ("Strategy", &["strategy", "tower defense", "defense", "build", "manage", "city", "empire"]),
    ("Puzzle", &["puzzle", "brain", "logic", "solve", "match", "tetris", "block"]),
    ("Racing", &["race", "racing", "car", "drive", "speed", "drift", "bike", "motorcycle"]),
    ("Sports", &["sport", "football", "soccer", "basketball", "tennis", "golf", "baseball"]),
    ("Arcade", &["arcade", "classic", "retro", "pixel", "old school"]),
    ("Platform", &["platform", "jump", "run", "climb", "parkour"]),
    ("Simulation", &["simulation", "sim", "life", "city", "farm", "cooking", "restaurant"]),
    ("RPG", &["rpg", "role", "character", "level up", "quest", "adventure"]),
    ("Casual", &["casual", "relaxing", "simple", "easy", "family"]),
    ("Multiplayer", &["multiplayer", "online", "vs", "versus", "pvp", "co-op"]),
    ("Clicker", &["clicker", "click", "idle", "incremental", "tap"]),
    ("Educational", &["educational", "learn", "math", "quiz", "knowledge"]),
    ("Horror", &["horror", "scary", "fear", "nightmare", "ghost", "monster"]),
    ("Rhythm", &["rhythm", "music", "beat", "dance", "sound"]),
    ("Card", &["card", "poker", "blackjack", "solitaire", "deck"]),
];

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|existing| existing == value) {
        list.push(value.to_string());
    }
}

fn game_type(record: &GameRecord) -> Option<GameType> {
    record
        .game_type
        .or_else(|| record.embed_url.as_deref().map(GameType::from_embed_url))
}

/// Tags suggested by the embed type and title/description keywords.
pub fn derive_tags(record: &GameRecord) -> Vec<String> {
    let title = record.title.to_lowercase();
    let description = record.description.to_lowercase();
    let mut tags = Vec::new();

    match game_type(record) {
        Some(GameType::Flash) => push_unique(&mut tags, "Flash"),
        Some(GameType::Html5) => push_unique(&mut tags, "HTML5"),
        Some(GameType::Unity) => push_unique(&mut tags, "Unity"),
        _ => {}
    }

    for (keyword, keyword_tags) in TITLE_TAGS {
        if title.contains(keyword) {
            for tag in *keyword_tags {
                push_unique(&mut tags, tag);
            }
        }
    }
    for (keyword, tag) in DESCRIPTION_TAGS {
        if description.contains(keyword) {
            push_unique(&mut tags, tag);
        }
    }

    tags.truncate(MAX_DERIVED_TAGS);
    tags
}

/// Feature bullet points for the detail page.
pub fn derive_features(record: &GameRecord) -> Vec<String> {
    let title = record.title.to_lowercase();
    let mut features: Vec<String> = ["Free to play", "No download required", "Play in browser"]
        .iter()
        .map(|feature| feature.to_string())
        .collect();

    match game_type(record) {
        Some(GameType::Html5) => {
            features.push("HTML5 compatible".to_string());
            features.push("Mobile friendly".to_string());
        }
        Some(GameType::Flash) => features.push("Classic Flash game".to_string()),
        Some(GameType::Unity) => {
            features.push("Unity powered".to_string());
            features.push("3D graphics".to_string());
        }
        _ => {}
    }

    if record.description.to_lowercase().contains("multiplayer") {
        features.push("Multiplayer support".to_string());
    }
    if ["clicker", "idle"].iter().any(|word| title.contains(word)) {
        features.push("Idle gameplay".to_string());
    }
    if ["parkour", "run", "jump"].iter().any(|word| title.contains(word)) {
        features.push("Fast-paced action".to_string());
    }

    features.truncate(MAX_FEATURES);
    features
}

/// Input bindings guessed from the title.
pub fn derive_controls(record: &GameRecord) -> BTreeMap<String, String> {
    let title = record.title.to_lowercase();
    let has_any = |words: &[&str]| words.iter().any(|word| title.contains(word));

    let pairs: &[(&str, &str)] = if has_any(&["clicker", "click"]) {
        &[("Mouse", "Click to play"), ("Left Click", "Main action")]
    } else if has_any(&["parkour", "run", "jump", "geometry"]) {
        &[
            ("Arrow Keys", "Move left/right"),
            ("Spacebar", "Jump"),
            ("Mouse", "Navigate menus"),
        ]
    } else if has_any(&["drift", "racing", "car", "traffic"]) {
        &[
            ("Arrow Keys", "Steer and accelerate"),
            ("WASD", "Alternative controls"),
            ("Spacebar", "Handbrake"),
        ]
    } else if has_any(&["papa", "cooking"]) {
        &[
            ("Mouse", "Click and drag ingredients"),
            ("Left Click", "Select items"),
            ("Drag & Drop", "Prepare orders"),
        ]
    } else if title.contains("io") {
        &[
            ("Mouse", "Move and aim"),
            ("Left Click", "Primary action"),
            ("Right Click", "Secondary action"),
            ("WASD", "Alternative movement"),
        ]
    } else {
        &[
            ("Mouse", "Click and interact"),
            ("Arrow Keys", "Navigate"),
            ("Spacebar", "Action"),
        ]
    };

    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

/// Fill empty tags, features and controls in place.
pub fn enrich(record: &mut GameRecord) {
    if record.game_type.is_none() {
        record.game_type = record.embed_url.as_deref().map(GameType::from_embed_url);
    }
    if record.tags.is_empty() {
        record.tags = derive_tags(record);
    }
    if record.features.is_empty() {
        record.features = derive_features(record);
    }
    if record.controls.is_empty() {
        record.controls = derive_controls(record);
    }
}

/// Platform plus genre tags used for client-side filtering.
///
/// Every result carries a platform tag (`HTML5` or `Unity`) and at least one
/// genre.
pub fn standard_tags(record: &GameRecord) -> Vec<String> {
    let embed = record.embed_url.as_deref().unwrap_or_default().to_lowercase();
    let content = format!(
        "{} {} {}",
        record.title.to_lowercase(),
        record.description.to_lowercase(),
        record.category_name().to_lowercase()
    );
    let mut tags = Vec::new();

    if embed.contains("unity") && !embed.contains("html5") && !embed.contains("gamedistribution.com")
    {
        push_unique(&mut tags, "Unity");
    } else if !embed.is_empty() {
        push_unique(&mut tags, "HTML5");
    }

    for (genre, keywords) in GENRES {
        if keywords.iter().any(|keyword| content.contains(keyword)) {
            push_unique(&mut tags, genre);
        }
    }
    if content.contains("io") {
        push_unique(&mut tags, "IO Game");
    }
    if content.contains("3d") || content.contains("three dimensional") {
        push_unique(&mut tags, "3D");
    }
    if ["2d", "two dimensional", "pixel"]
        .iter()
        .any(|word| content.contains(word))
    {
        push_unique(&mut tags, "2D");
    }

    if !tags.iter().any(|tag| tag == "HTML5" || tag == "Unity") {
        tags.insert(0, "HTML5".to_string());
    }
    if !tags
        .iter()
        .any(|tag| GENRES.iter().any(|(genre, _)| genre == tag))
    {
        let fallback = if content.contains("game") { "Casual" } else { "Action" };
        push_unique(&mut tags, fallback);
    }

    tags.truncate(MAX_STANDARD_TAGS);
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(title: &str, description: &str, embed: &str) -> GameRecord {
        let mut record = GameRecord::new("https://www.onlinegames.io/x/", title);
        record.description = description.to_string();
        record.embed_url = Some(embed.to_string());
        record
    }

    #[test]
    fn derived_tags_follow_keywords() {
        let game = record(
            "Drift Boss",
            "A casual racing game.",
            "https://cloud.onlinegames.io/html5/drift",
        );
        assert_eq!(derive_tags(&game), vec!["HTML5", "Racing", "Cars", "Driving", "Casual"]);
    }

    #[test]
    fn controls_match_title_family() {
        let game = record("Cookie Clicker", "", "https://x.org/g");
        let controls = derive_controls(&game);
        assert_eq!(controls.get("Mouse").map(String::as_str), Some("Click to play"));
        assert_eq!(controls.len(), 2);

        let fallback = derive_controls(&record("Chess", "", "https://x.org/g"));
        assert_eq!(fallback.len(), 3);
        assert!(fallback.contains_key("Spacebar"));
    }

    #[test]
    fn enrich_keeps_existing_values() {
        let mut game = record("Stickman Parkour", "", "https://x.org/unity/g");
        game.tags = vec!["Custom".to_string()];
        enrich(&mut game);
        assert_eq!(game.tags, vec!["Custom"]);
        assert_eq!(game.game_type, Some(GameType::Unity));
        assert!(game.features.contains(&"Unity powered".to_string()));
        assert!(game.features.contains(&"Fast-paced action".to_string()));
        assert_eq!(game.controls.get("Spacebar").map(String::as_str), Some("Jump"));
    }

    #[test]
    fn standard_tags_always_have_platform_and_genre() {
        let tags = standard_tags(&record("Zen", "Relax.", ""));
        assert_eq!(tags[0], "HTML5");
        assert!(tags.len() >= 2);

        let tags = standard_tags(&record("Monster Shooter", "", "https://x.org/unity/g"));
        assert_eq!(tags[0], "Unity");
        assert!(tags.contains(&"Action".to_string()));
        assert!(tags.contains(&"Horror".to_string()));
    }
}
