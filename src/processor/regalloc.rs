//! Register allocation.
//!
//! Maps every piece of mutable game state to a named device register in a
//! fixed enumeration order, so a given model always yields the same slots
//! and the same rendered names — regeneration from unchanged input must be
//! byte-identical. Capacity limits of the target device are checked here.

use indexmap::IndexMap;

use crate::error::{GenError, Result};
use crate::model::GameModel;

use super::ast::Reg;

/// Persistent integer cells available on the device.
pub const REGISTER_BUDGET: usize = 100;

/// Winner announcement needs one score comparison per other slot plus the
/// phase guard, and a line takes at most 8 conditions.
pub const MAX_PLAYERS: u16 = 8;

/// Card entry codes live in a window of this many codes.
pub const MAX_CARDS: u16 = 1000;

/// The allocated register set. Handed to the emitter; `Reg` values clone
/// cheaply into instructions.
#[derive(Debug)]
pub struct RegisterFile {
    /// Session phase: 0 selecting, 1 playing, 2 finished.
    pub phase: Reg,
    /// Player count chosen at session start.
    pub players: Reg,
    /// Current player, 1-based.
    pub player: Reg,
    /// First picked card id, 0 = none.
    pub first: Reg,
    /// Last picked card id, for the repeat field.
    pub last: Reg,
    /// Pairs found so far.
    pub found: Reg,
    /// Match-check scratch: sum of the two picked ids.
    pub sum: Reg,
    /// One score register per slot, index 0 holds slot 1.
    pub scores: Vec<Reg>,
    /// One removed-flag per pair, index 0 holds pair 1. Set when the pair is
    /// matched; its cards answer "empty" from then on.
    pub taken: Vec<Reg>,
    /// Name -> device slot, in allocation order.
    slots: IndexMap<String, u16>,
}

impl RegisterFile {
    pub fn score(&self, slot: u16) -> Reg {
        self.scores[(slot - 1) as usize].clone()
    }

    pub fn pair_taken(&self, pair: u16) -> Reg {
        self.taken[(pair - 1) as usize].clone()
    }

    pub fn slot_of(&self, reg: &Reg) -> Option<u16> {
        self.slots.get(reg.name()).copied()
    }

    pub fn count(&self) -> usize {
        self.slots.len()
    }

    /// Registers paired with their reset values, in allocation order. This
    /// drives the document's `init` string and both reset chains.
    pub fn reset_values(&self) -> Vec<(Reg, u16)> {
        let mut values = vec![
            (self.phase.clone(), 0),
            (self.players.clone(), 0),
            (self.player.clone(), 1),
            (self.first.clone(), 0),
            (self.last.clone(), 0),
            (self.found.clone(), 0),
            (self.sum.clone(), 0),
        ];
        values.extend(self.scores.iter().map(|r| (r.clone(), 0)));
        values.extend(self.taken.iter().map(|r| (r.clone(), 0)));
        values
    }

    /// Per-session subset: what a player-slot tip must clear before play
    /// begins. Phase and player count are set by the slot block itself.
    pub fn session_values(&self) -> Vec<(Reg, u16)> {
        let mut values = vec![
            (self.player.clone(), 1),
            (self.first.clone(), 0),
            (self.last.clone(), 0),
            (self.found.clone(), 0),
            (self.sum.clone(), 0),
        ];
        values.extend(self.scores.iter().map(|r| (r.clone(), 0)));
        values.extend(self.taken.iter().map(|r| (r.clone(), 0)));
        values
    }
}

/// Allocate registers for a model, checking the device budgets.
pub fn allocate(model: &GameModel) -> Result<RegisterFile> {
    let players = model.max_players();
    if players > MAX_PLAYERS {
        return Err(GenError::capacity(format!(
            "maxPlayers is {players}, the device supports at most {MAX_PLAYERS} \
             (winner announcement needs one comparison per other player)"
        )));
    }
    if model.num_cards() > MAX_CARDS {
        return Err(GenError::capacity(format!(
            "{} cards exceed the {MAX_CARDS} card entry codes",
            model.num_cards()
        )));
    }

    let mut names = vec![
        "phase".to_string(),
        "players".to_string(),
        "player".to_string(),
        "first".to_string(),
        "last".to_string(),
        "found".to_string(),
        "sum".to_string(),
    ];
    names.extend((1..=players).map(|k| format!("score{k}")));
    names.extend((1..=model.num_pairs()).map(|p| format!("taken{p}")));

    let slots: IndexMap<String, u16> = names
        .iter()
        .enumerate()
        .map(|(i, name)| (name.clone(), i as u16))
        .collect();

    let score_end = 7 + players as usize;
    let file = RegisterFile {
        phase: Reg(names[0].clone()),
        players: Reg(names[1].clone()),
        player: Reg(names[2].clone()),
        first: Reg(names[3].clone()),
        last: Reg(names[4].clone()),
        found: Reg(names[5].clone()),
        sum: Reg(names[6].clone()),
        scores: names[7..score_end].iter().map(|n| Reg(n.clone())).collect(),
        taken: names[score_end..].iter().map(|n| Reg(n.clone())).collect(),
        slots,
    };

    if file.count() > REGISTER_BUDGET {
        return Err(GenError::capacity(format!(
            "{} registers needed, device has {REGISTER_BUDGET}",
            file.count()
        )));
    }
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AssetCatalog, GameModel};
    use crate::parser::GameConfig;

    fn model(players: i64) -> GameModel {
        let cfg = GameConfig {
            pairs: vec!["dog".into(), "cat".into()],
            alternative_sounds: false,
            max_players: players,
            title: "Memory".into(),
            img_width: 190.0,
            img_height: 270.0,
            pixel_size: 2.0,
            dpi: 1200,
            output_file: "out.json".into(),
            output_image: "out.png".into(),
            language: "en".into(),
            welcome: "en_welcome".into(),
            media_path: "media/%s".into(),
        };
        let catalog = AssetCatalog::fixed(["dog", "cat"]);
        GameModel::build(&cfg, &catalog, None).unwrap()
    }

    #[test]
    fn test_allocation_is_stable() {
        let m = model(3);
        let a = allocate(&m).unwrap();
        let b = allocate(&m).unwrap();
        assert_eq!(a.count(), b.count());
        assert_eq!(a.slot_of(&a.phase), Some(0));
        assert_eq!(a.slot_of(&a.players), Some(1));
        assert_eq!(a.slot_of(&a.score(1)), b.slot_of(&b.score(1)));
        assert_eq!(a.slot_of(&a.score(3)), Some(9));
        // Pair removal flags sit after the scores.
        assert_eq!(a.slot_of(&a.pair_taken(1)), Some(10));
        assert_eq!(a.slot_of(&a.pair_taken(2)), Some(11));
        assert_eq!(a.count(), 12);
    }

    #[test]
    fn test_reset_values_cover_every_register() {
        let a = allocate(&model(2)).unwrap();
        let reset = a.reset_values();
        assert_eq!(reset.len(), a.count());
        // player starts at 1, everything else at 0
        for (reg, value) in &reset {
            if reg.name() == "player" {
                assert_eq!(*value, 1);
            } else {
                assert_eq!(*value, 0);
            }
        }
    }

    #[test]
    fn test_player_cap() {
        let err = allocate(&model(9)).unwrap_err();
        assert!(
            matches!(err, crate::error::GenError::Capacity(_)),
            "got: {err}"
        );
    }

    #[test]
    fn test_register_budget() {
        // 7 fixed + 2 scores + 95 removal flags = 104 > 100.
        let pairs: Vec<String> = (0..95).map(|i| format!("pair{i}")).collect();
        let cfg = GameConfig {
            pairs: pairs.clone(),
            alternative_sounds: false,
            max_players: 2,
            title: "Memory".into(),
            img_width: 190.0,
            img_height: 270.0,
            pixel_size: 2.0,
            dpi: 1200,
            output_file: "out.json".into(),
            output_image: "out.png".into(),
            language: "en".into(),
            welcome: "en_welcome".into(),
            media_path: "media/%s".into(),
        };
        let m = GameModel::build(&cfg, &AssetCatalog::fixed(pairs), None).unwrap();
        let err = allocate(&m).unwrap_err();
        assert!(
            matches!(err, crate::error::GenError::Capacity(_)),
            "got: {err}"
        );
        assert!(err.to_string().contains("registers"), "got: {err}");
    }
}
