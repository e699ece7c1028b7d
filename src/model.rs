//! Game model builder.
//!
//! Turns the declarative config (pair list, alternate-audio flag, player
//! count) into the entity graph the compiler works on: cards, pairs, player
//! slots and control fields, with every card's audio clip resolved against
//! the media directory (or a TTS `speak` entry when the template opts in).

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::error::{GenError, Result};
use crate::parser::GameConfig;

/// Sentinel for "no card picked" in the first/last-pick registers.
pub const NO_CARD: u16 = 0;

/// Audio file extensions probed in the media directory, in order.
pub const AUDIO_EXTENSIONS: [&str; 4] = [".wav", ".ogg", ".flac", ".mp3"];

/// Where a card clip's audio comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipSource {
    /// An audio file exists under the media path.
    File,
    /// Synthesized by the toolchain from a `speak` entry.
    Speak,
}

/// One touchable card. Immutable once built; the entry label on the printed
/// board and the script block share the same name.
#[derive(Debug, Clone)]
pub struct Card {
    /// 1-based device id; 0 is the "none" sentinel.
    pub id: u16,
    /// Index into `GameModel::pairs`.
    pub pair: usize,
    /// The single clip this card's block plays.
    pub clip: String,
    pub source: ClipSource,
}

impl Card {
    pub fn entry(&self) -> String {
        format!("c{}", self.id)
    }
}

/// Two cards sharing match semantics, identified by the input name.
#[derive(Debug, Clone)]
pub struct Pair {
    pub name: String,
    /// Card ids; always exactly two, and they sum to `pick_sum`.
    pub cards: [u16; 2],
}

/// A configured player slot. Slots exist up to `maxPlayers` regardless of how
/// many players join a session; unused slots are simply never incremented.
#[derive(Debug, Clone, Copy)]
pub struct PlayerSlot {
    /// 1-based slot number.
    pub id: u16,
}

impl PlayerSlot {
    pub fn entry(&self) -> String {
        format!("p{}", self.id)
    }
}

/// Non-card touch fields with fixed semantics and fixed short entry names
/// (the board renderer relies on these).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlField {
    Start,
    Question,
    Repeat,
}

impl ControlField {
    pub fn entry(self) -> &'static str {
        match self {
            ControlField::Start => "start",
            ControlField::Question => "q",
            ControlField::Repeat => "r",
        }
    }
}

/// Lookup of available audio assets. An explicit value rather than ambient
/// filesystem state so the builder stays testable.
#[derive(Debug)]
pub enum AssetCatalog {
    /// Probe `pattern` (with `%s` replaced by clip name + extension) relative
    /// to `base`.
    Media { pattern: String, base: PathBuf },
    /// Fixed set of clip names, for tests.
    Fixed(BTreeSet<String>),
}

impl AssetCatalog {
    pub fn media(pattern: impl Into<String>, base: impl Into<PathBuf>) -> Self {
        AssetCatalog::Media {
            pattern: pattern.into(),
            base: base.into(),
        }
    }

    pub fn fixed<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AssetCatalog::Fixed(names.into_iter().map(Into::into).collect())
    }

    /// True when an audio file for `clip` exists.
    pub fn has_clip(&self, clip: &str) -> bool {
        match self {
            AssetCatalog::Media { pattern, base } => AUDIO_EXTENSIONS.iter().any(|ext| {
                let rel = pattern.replace("%s", &format!("{clip}{ext}"));
                join_media(base, &rel).is_file()
            }),
            AssetCatalog::Fixed(names) => names.contains(clip),
        }
    }
}

fn join_media(base: &Path, rel: &str) -> PathBuf {
    let p = Path::new(rel);
    if p.is_absolute() { p.to_path_buf() } else { base.join(p) }
}

/// The fully built entity graph handed to the compiler passes.
#[derive(Debug)]
pub struct GameModel {
    pub pairs: Vec<Pair>,
    /// Ordered by id (index `i` holds the card with id `i + 1`).
    pub cards: Vec<Card>,
    pub slots: Vec<PlayerSlot>,
    /// Language prefix for the fixed prompt clips (`en_match`, ...).
    pub language: String,
    /// Clip played on session start and after a restart.
    pub welcome: String,
    pub alternative_sounds: bool,
    /// `speak` entries for the output document: explicit entries without an
    /// audio file, plus auto-added ones for unresolved card clips.
    pub speak: IndexMap<String, String>,
    /// Card clips that had no audio file (reported to the user).
    pub missing: Vec<String>,
}

impl GameModel {
    pub fn num_pairs(&self) -> u16 {
        self.pairs.len() as u16
    }

    pub fn num_cards(&self) -> u16 {
        self.cards.len() as u16
    }

    /// Ids of a pair's two cards always sum to this; the match check tests a
    /// single register against it.
    pub fn pick_sum(&self) -> u16 {
        self.num_cards() + 1
    }

    pub fn max_players(&self) -> u16 {
        self.slots.len() as u16
    }

    /// Name of a fixed prompt clip, e.g. `prompt("match")` -> `en_match`.
    pub fn prompt(&self, name: &str) -> String {
        format!("{}_{}", self.language, name)
    }

    pub fn card(&self, id: u16) -> &Card {
        &self.cards[(id - 1) as usize]
    }

    /// Build the entity graph and resolve every card clip.
    ///
    /// Clip resolution order: audio file in the media path, then a `speak`
    /// entry (explicit text, or the pair name when auto-added — only when the
    /// template carries a `speak` section). Anything else is a hard error:
    /// a program referencing a clip the image doesn't contain would be
    /// deployed broken.
    pub fn build(
        cfg: &GameConfig,
        catalog: &AssetCatalog,
        speak: Option<&Map<String, Value>>,
    ) -> Result<GameModel> {
        if cfg.pairs.is_empty() {
            return Err(GenError::config("`memory.pairs` must not be empty"));
        }
        if cfg.max_players <= 0 {
            return Err(GenError::config(format!(
                "`memory.maxPlayers` must be positive, got {}",
                cfg.max_players
            )));
        }
        // Card ids are u16 and a pair holds two, so the id space caps the
        // pair count before any arithmetic on it.
        if cfg.pairs.len() > (u16::MAX / 2) as usize {
            return Err(GenError::capacity(format!(
                "{} pairs exceed the device card id space",
                cfg.pairs.len()
            )));
        }
        {
            let mut seen = BTreeSet::new();
            for name in &cfg.pairs {
                if !seen.insert(name.as_str()) {
                    return Err(GenError::config(format!("duplicate pair name `{name}`")));
                }
            }
        }

        let num_pairs = cfg.pairs.len() as u16;
        let num_cards = num_pairs * 2;

        // Explicit speak entries survive unless an audio file shadows them.
        let mut speak_out = IndexMap::new();
        if let Some(section) = speak {
            for (clip, text) in section {
                let text = text.as_str().unwrap_or(clip).to_string();
                if catalog.has_clip(clip) {
                    log::debug!("speak entry `{clip}` dropped, audio file present");
                } else {
                    speak_out.insert(clip.clone(), text);
                }
            }
        }

        let mut pairs = Vec::with_capacity(cfg.pairs.len());
        let mut cards = Vec::with_capacity(num_cards as usize);
        let mut missing = Vec::new();

        for (index, name) in cfg.pairs.iter().enumerate() {
            // The two ids of a pair sum to num_cards + 1, which is what the
            // emitted match check relies on.
            let id_a = index as u16 + 1;
            let id_b = num_cards - index as u16;
            let (clip_a, clip_b) = if cfg.alternative_sounds {
                (format!("{name}_a"), format!("{name}_b"))
            } else {
                (name.clone(), name.clone())
            };

            for (id, clip) in [(id_a, &clip_a), (id_b, &clip_b)] {
                let source = if catalog.has_clip(clip) {
                    ClipSource::File
                } else if speak.is_some() {
                    if !speak_out.contains_key(clip) {
                        speak_out.insert(clip.clone(), name.clone());
                    }
                    if !missing.contains(clip) {
                        missing.push(clip.clone());
                    }
                    ClipSource::Speak
                } else {
                    return Err(GenError::AssetMissing {
                        pair: name.clone(),
                        clip: clip.clone(),
                    });
                };
                cards.push(Card {
                    id,
                    pair: index,
                    clip: clip.clone(),
                    source,
                });
            }

            pairs.push(Pair {
                name: name.clone(),
                cards: [id_a, id_b],
            });
        }

        // `cards` was pushed pair-wise; order it by id so lookups are direct.
        cards.sort_by_key(|c| c.id);

        let slots = (1..=cfg.max_players as u16).map(|id| PlayerSlot { id }).collect();

        Ok(GameModel {
            pairs,
            cards,
            slots,
            language: cfg.language.clone(),
            welcome: cfg.welcome.clone(),
            alternative_sounds: cfg.alternative_sounds,
            speak: speak_out,
            missing,
        })
    }
}
