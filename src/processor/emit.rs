//! Script emitter: lowers the FSM rule table into instruction blocks.
//!
//! One block per touch entry point (`start`, `p1..pP`, `q`, `r`, `c1..cC`)
//! plus the shared subroutines reached by jumps: `check` (match test),
//! `advance` (turn handover), `wincheck` (finish test), the chunked
//! `newgame*`/`reset*` register chains and the empty `idle` terminal block.
//! Sharing the evaluation logic keeps the program O(cards + pairs + players)
//! instead of quadratic in the card count.
//!
//! Every state-mutating line ends in a jump, which on the device aborts the
//! remaining lines of the block; that is what makes the guard chains
//! single-fire without the re-entrancy flag the hardware doesn't need.
//! Pure control-transfer lines are emitted with a bare trailing `J(...)` —
//! the latency pass patches them afterwards.

use indexmap::IndexMap;

use crate::model::{GameModel, NO_CARD};

use super::ast::{Cmp, Guard, Line, Operand, Program, Reg};
use super::fsm::{Cond, Event, GameFsm, Phase, Rule, Step};
use super::regalloc::RegisterFile;

pub const IDLE: &str = "idle";
pub const CHECK: &str = "check";
pub const ADVANCE: &str = "advance";
pub const WINCHECK: &str = "wincheck";
const RESET_PREFIX: &str = "reset";
const NEWGAME_PREFIX: &str = "newgame";

/// Register writes per chain line, leaving room for the jump and a play
/// within the device's 8-command line limit.
const CHAIN_OPS_PER_LINE: usize = 6;

/// Lower the whole rule table. Block insertion order (and therefore the
/// serialized script order) is a fixed function of the model.
pub fn emit(model: &GameModel, fsm: &GameFsm, regs: &RegisterFile) -> Program {
    let mut program = Program::new();

    for rule in &fsm.rules {
        let line = lower_rule(rule, model, regs);
        program.block(block_label(rule.on)).push(line);
    }

    emit_chain(
        &mut program,
        NEWGAME_PREFIX,
        regs.session_values(),
        model.prompt("player1"),
    );
    emit_chain(
        &mut program,
        RESET_PREFIX,
        regs.reset_values(),
        model.welcome.clone(),
    );
    program.block(IDLE);

    program
}

/// Entry labels that physical touch codes point at. Everything else is
/// reached by jumps only.
pub fn touch_entries(model: &GameModel) -> Vec<String> {
    let mut entries = vec!["start".to_string()];
    entries.extend(model.slots.iter().map(|s| s.entry()));
    entries.push("q".into());
    entries.push("r".into());
    entries.extend(model.cards.iter().map(|c| c.entry()));
    entries
}

/// The `init` field of the output document: every register at its reset
/// value, for devices that run the init line instead of the start field.
pub fn init_string(regs: &RegisterFile) -> String {
    let mut line = Line::new();
    for (reg, value) in regs.reset_values() {
        line = line.set(reg, value);
    }
    line.to_string()
}

/// Deterministic touch codes per entry label. The question, repeat, player
/// and card fields get pinned windows so an already-printed board survives
/// regeneration; every remaining block is numbered in program order.
pub fn entry_codes(model: &GameModel, program: &Program) -> IndexMap<String, u16> {
    let mut codes = IndexMap::new();
    codes.insert("q".to_string(), 2000);
    codes.insert("r".to_string(), 2001);
    for slot in &model.slots {
        codes.insert(slot.entry(), 2001 + slot.id);
    }
    for card in &model.cards {
        codes.insert(card.entry(), 3000 + card.id - 1);
    }
    let mut next = 4000;
    for label in program.blocks.keys() {
        if !codes.contains_key(label.as_str()) {
            codes.insert(label.as_str().to_string(), next);
            next += 1;
        }
    }
    codes
}

fn block_label(event: Event) -> String {
    match event {
        Event::Start => "start".into(),
        Event::Slot(k) => format!("p{k}"),
        Event::Question => "q".into(),
        Event::Repeat => "r".into(),
        Event::Card(id) => format!("c{id}"),
        Event::MatchCheck => CHECK.into(),
        Event::TurnAdvance => ADVANCE.into(),
        Event::WinCheck => WINCHECK.into(),
    }
}

fn lower_rule(rule: &Rule, model: &GameModel, regs: &RegisterFile) -> Line {
    let mut line = Line::new();
    for cond in &rule.when {
        for Guard { reg, cmp, value } in lower_cond(*cond, model, regs) {
            line = line.guard(reg, cmp, value);
        }
    }
    lower_step(line, rule.then, model, regs)
}

fn lower_cond(cond: Cond, model: &GameModel, regs: &RegisterFile) -> Vec<Guard> {
    let guard = |reg: Reg, cmp: Cmp, value: Operand| Guard { reg, cmp, value };
    let konst = Operand::Const;
    match cond {
        Cond::InPhase(phase) => vec![guard(regs.phase.clone(), Cmp::Eq, konst(phase.value()))],
        Cond::SlotInactive(k) => vec![guard(regs.players.clone(), Cmp::Lt, konst(k))],
        Cond::ScoreIs(k, n) => vec![guard(regs.score(k), Cmp::Eq, konst(n))],
        Cond::NoFirstPick => vec![guard(regs.first.clone(), Cmp::Eq, konst(NO_CARD))],
        Cond::FirstPickIs(id) => vec![guard(regs.first.clone(), Cmp::Eq, konst(id))],
        Cond::OtherFirstPick(id) => vec![
            guard(regs.first.clone(), Cmp::Ge, konst(1)),
            guard(regs.first.clone(), Cmp::Ne, konst(id)),
        ],
        Cond::TurnIs(k) => vec![guard(regs.player.clone(), Cmp::Eq, konst(k))],
        Cond::LastPickIs(id) => vec![guard(regs.last.clone(), Cmp::Eq, konst(id))],
        Cond::PairTaken(p) => vec![guard(regs.pair_taken(p), Cmp::Eq, konst(1))],
        Cond::ScoreLeads(k) => (1..=model.max_players())
            .filter(|q| *q != k)
            .map(|q| guard(regs.score(k), Cmp::Ge, Operand::Reg(regs.score(q))))
            .collect(),
        Cond::PickSumMatches => vec![guard(regs.sum.clone(), Cmp::Eq, konst(model.pick_sum()))],
        Cond::PickSumDiffers => vec![guard(regs.sum.clone(), Cmp::Ne, konst(model.pick_sum()))],
        Cond::LastTurn => vec![guard(
            regs.player.clone(),
            Cmp::Eq,
            Operand::Reg(regs.players.clone()),
        )],
        Cond::AllPairsFound => vec![guard(regs.found.clone(), Cmp::Eq, konst(model.num_pairs()))],
        Cond::PairsRemain => vec![guard(regs.found.clone(), Cmp::Lt, konst(model.num_pairs()))],
    }
}

fn lower_step(line: Line, step: Step, model: &GameModel, regs: &RegisterFile) -> Line {
    match step {
        Step::InitSession => line.jump(format!("{RESET_PREFIX}0")),
        Step::BeginSession(k) => line
            .set(regs.players.clone(), k)
            .set(regs.phase.clone(), Phase::Playing.value())
            .jump(format!("{NEWGAME_PREFIX}0"))
            .play(model.prompt("shuffle")),
        Step::AnnounceNotPlaying => line.jump(IDLE).play(model.prompt("not_playing")),
        Step::AnnounceScore(_, n) => line.jump(IDLE).play(model.prompt(&format!("pairs{n}"))),
        Step::AnnounceNotStarted => line.jump(IDLE).play(model.prompt("not_started")),
        Step::AnnounceFinished => line.jump(IDLE).play(model.prompt("finished")),
        Step::AnnounceEmpty => line.jump(IDLE).play(model.prompt("empty")),
        Step::AnnounceTurn(k) => line.jump(IDLE).play(model.prompt(&format!("player{k}"))),
        // No jump on purpose: every tied winner's line must sound.
        Step::AnnounceWinner(k) => line.play(model.prompt(&format!("winner{k}"))),
        Step::FirstPick(id) => line
            .set(regs.first.clone(), id)
            .set(regs.last.clone(), id)
            .jump(IDLE)
            .play(model.card(id).clip.clone()),
        Step::ReplayCard(id) => line.jump(IDLE).play(model.card(id).clip.clone()),
        Step::SecondPick(id) => line
            .alu(
                regs.sum.clone(),
                super::ast::AluOp::Set,
                Operand::Reg(regs.first.clone()),
            )
            .add(regs.sum.clone(), id)
            .set(regs.first.clone(), NO_CARD)
            .set(regs.last.clone(), id)
            .jump(CHECK)
            .play(model.card(id).clip.clone()),
        Step::Restart => line.jump(format!("{RESET_PREFIX}0")),
        Step::ScoreMatch(k) => line
            .add(regs.score(k), 1)
            .add(regs.found.clone(), 1)
            .jump(WINCHECK)
            .play(model.prompt("match")),
        // No jump: control falls through to the scoring line of the block.
        Step::RetirePair(p) => line.set(regs.pair_taken(p), 1),
        Step::Miss => line.jump(ADVANCE),
        Step::WrapTurn => line
            .set(regs.player.clone(), 1)
            .jump(IDLE)
            .play(model.prompt("player1")),
        Step::NextTurn(k) => line
            .add(regs.player.clone(), 1)
            .jump(IDLE)
            .play(model.prompt(&format!("player{}", k + 1))),
        Step::FinishGame => line
            .set(regs.phase.clone(), Phase::Finished.value())
            .jump("q")
            .play(model.prompt("finished")),
        Step::ContinueTurn => line.jump(IDLE).play(model.prompt("continue")),
    }
}

/// Emit a register-write chain split across blocks so no line exceeds the
/// command budget. The final line returns to idle with the tail clip.
fn emit_chain(program: &mut Program, prefix: &str, values: Vec<(Reg, u16)>, tail_clip: String) {
    let chunks: Vec<&[(Reg, u16)]> = values.chunks(CHAIN_OPS_PER_LINE).collect();
    let count = chunks.len();
    for (i, chunk) in chunks.into_iter().enumerate() {
        let mut line = Line::new();
        for (reg, value) in chunk {
            line = line.set(reg.clone(), *value);
        }
        line = if i + 1 < count {
            line.jump(format!("{prefix}{}", i + 1))
        } else {
            line.jump(IDLE).play(tail_clip.clone())
        };
        program.block(format!("{prefix}{i}")).push(line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AssetCatalog;
    use crate::parser::GameConfig;
    use crate::processor::{fsm, regalloc};

    fn fixture(pairs: &[&str], players: i64, alt: bool) -> (GameModel, Program) {
        let cfg = GameConfig {
            pairs: pairs.iter().map(|s| s.to_string()).collect(),
            alternative_sounds: alt,
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
        let mut clips = Vec::new();
        for p in pairs {
            if alt {
                clips.push(format!("{p}_a"));
                clips.push(format!("{p}_b"));
            } else {
                clips.push(p.to_string());
            }
        }
        let model = GameModel::build(&cfg, &AssetCatalog::fixed(clips), None).unwrap();
        let regs = regalloc::allocate(&model).unwrap();
        let program = emit(&model, &fsm::design(&model), &regs);
        (model, program)
    }

    fn rendered(program: &Program, label: &str) -> Vec<String> {
        program
            .get(label)
            .unwrap_or_else(|| panic!("no block `{label}`"))
            .lines
            .iter()
            .map(|l| l.to_string())
            .collect()
    }

    #[test]
    fn test_card_block_golden() {
        let (_, program) = fixture(&["dog", "cat"], 2, false);
        assert_eq!(
            rendered(&program, "c1"),
            vec![
                "$phase==0? J(idle) P(en_not_started)",
                "$phase==2? J(idle) P(en_finished)",
                "$taken1==1? J(idle) P(en_empty)",
                "$first==1? J(idle) P(dog)",
                "$first==0? $first:=1 $last:=1 J(idle) P(dog)",
                "$first>=1? $first!=1? $sum:=$first $sum+=1 $first:=0 $last:=1 J(check) P(dog)",
            ]
        );
        // Partner card of `dog` is c4 (ids of a pair sum to 5).
        assert_eq!(
            rendered(&program, "c4")[4],
            "$first==0? $first:=4 $last:=4 J(idle) P(dog)"
        );
    }

    #[test]
    fn test_match_check_golden() {
        let (_, program) = fixture(&["dog", "cat"], 2, false);
        assert_eq!(
            rendered(&program, CHECK),
            vec![
                // Retirement lines have no jump; exactly one fires and falls
                // through to the scoring line for the current player.
                "$sum==5? $last==1? $taken1:=1",
                "$sum==5? $last==2? $taken2:=1",
                "$sum==5? $last==3? $taken2:=1",
                "$sum==5? $last==4? $taken1:=1",
                "$sum==5? $player==1? $score1+=1 $found+=1 J(wincheck) P(en_match)",
                "$sum==5? $player==2? $score2+=1 $found+=1 J(wincheck) P(en_match)",
                "$sum!=5? J(advance)",
            ]
        );
        assert_eq!(
            rendered(&program, ADVANCE),
            vec![
                "$player==$players? $player:=1 J(idle) P(en_player1)",
                "$player==1? $player+=1 J(idle) P(en_player2)",
            ]
        );
        assert_eq!(
            rendered(&program, WINCHECK),
            vec![
                "$found==2? $phase:=2 J(q) P(en_finished)",
                "$found<2? J(idle) P(en_continue)",
            ]
        );
    }

    #[test]
    fn test_slot_block_golden() {
        let (_, program) = fixture(&["dog", "cat"], 2, false);
        assert_eq!(
            rendered(&program, "p2"),
            vec![
                "$phase==0? $players:=2 $phase:=1 J(newgame0) P(en_shuffle)",
                "$players<2? J(idle) P(en_not_playing)",
                "$score2==0? J(idle) P(en_pairs0)",
                "$score2==1? J(idle) P(en_pairs1)",
                "$score2==2? J(idle) P(en_pairs2)",
            ]
        );
    }

    #[test]
    fn test_winner_lines_have_no_jump() {
        let (_, program) = fixture(&["dog", "cat"], 3, false);
        let q = program.get("q").unwrap();
        let winner_lines: Vec<_> = q
            .lines
            .iter()
            .filter(|l| l.to_string().contains("winner"))
            .collect();
        assert_eq!(winner_lines.len(), 3);
        for line in &winner_lines {
            assert_eq!(line.jump_targets().count(), 0, "winner lines must not jump");
        }
        assert_eq!(
            winner_lines[0].to_string(),
            "$phase==2? $score1>=$score2? $score1>=$score3? P(en_winner1)"
        );
    }

    #[test]
    fn test_chains_respect_command_budget() {
        let (_, program) = fixture(&["a", "b", "c", "d", "e", "f"], 8, false);
        for (label, block) in &program.blocks {
            for line in &block.lines {
                assert!(
                    line.actions.len() <= crate::processor::ast::MAX_LINE_ACTIONS,
                    "line too long in `{label}`: {line}"
                );
                assert!(
                    line.guards.len() <= crate::processor::ast::MAX_LINE_GUARDS,
                    "too many guards in `{label}`: {line}"
                );
            }
        }
        // 21 reset writes for 8 players and 6 pairs -> four chained blocks.
        assert!(program.get("reset0").is_some());
        assert!(program.get("reset3").is_some());
        assert!(program.get("reset4").is_none());
        let tail = rendered(&program, "reset3");
        assert!(tail[0].ends_with("J(idle) P(en_welcome)"), "got: {tail:?}");
    }

    #[test]
    fn test_alternative_sounds_one_variant_per_card() {
        let (model, program) = fixture(&["a", "b", "c", "d", "e", "f"], 2, true);
        for card in &model.cards {
            let block = program.get(&card.entry()).unwrap();
            let mut plays = std::collections::BTreeSet::new();
            for line in &block.lines {
                for action in &line.actions {
                    if let crate::processor::ast::Action::Play(clip) = action {
                        if clip.ends_with("_a") || clip.ends_with("_b") {
                            plays.insert(clip.clone());
                        }
                    }
                }
            }
            assert_eq!(
                plays.len(),
                1,
                "card {} must reference exactly one variant, got {plays:?}",
                card.id
            );
            assert!(plays.contains(&card.clip));
        }
    }

    #[test]
    fn test_init_string_and_codes() {
        let (model, program) = fixture(&["dog", "cat"], 2, false);
        let regs = regalloc::allocate(&model).unwrap();
        assert_eq!(
            init_string(&regs),
            "$phase:=0 $players:=0 $player:=1 $first:=0 $last:=0 $found:=0 $sum:=0 \
             $score1:=0 $score2:=0 $taken1:=0 $taken2:=0"
        );
        let codes = entry_codes(&model, &program);
        assert_eq!(codes["q"], 2000);
        assert_eq!(codes["r"], 2001);
        assert_eq!(codes["p1"], 2002);
        assert_eq!(codes["p2"], 2003);
        assert_eq!(codes["c1"], 3000);
        assert_eq!(codes["c4"], 3003);
        // Blocks reached only by jumps get the 4000 window, program order.
        assert_eq!(codes["start"], 4000);
        assert_eq!(codes["check"], 4001);
    }

    #[test]
    fn test_block_order_is_deterministic() {
        let (_, a) = fixture(&["dog", "cat"], 2, false);
        let (_, b) = fixture(&["dog", "cat"], 2, false);
        let order_a: Vec<_> = a.blocks.keys().cloned().collect();
        let order_b: Vec<_> = b.blocks.keys().cloned().collect();
        assert_eq!(order_a, order_b);
        assert_eq!(order_a[0].as_str(), "start");
        assert_eq!(order_a.last().unwrap().as_str(), "idle");
    }
}
