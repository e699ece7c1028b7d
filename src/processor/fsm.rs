//! Finite-state design of the matching game, independent of the target
//! instruction set.
//!
//! The session machine is `SelectingPlayers -> Playing -> Evaluating
//! (transient) -> Playing | Finished`, with an explicit restart edge from
//! `Finished` back to `SelectingPlayers`. It is represented as a flat rule
//! table: one `Rule` per (touch event, guard set) with a single semantic
//! effect. Rule order within an event is the dispatch order the emitter
//! must preserve — earlier rules that fire end the event, so later rules
//! rely on them (e.g. the second-pick rule assumes the re-tip rule already
//! handled `first == id`).
//!
//! Evaluation never rests in a state the device can observe: the second
//! pick's touch event runs match check, scoring, turn advance and win check
//! to completion. The transient `Evaluating` state shows up here as the
//! internal `MatchCheck`/`TurnAdvance`/`WinCheck` events, which the emitter
//! lowers to shared subroutine blocks.

use crate::model::GameModel;

/// Session phase as stored in the phase register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    SelectingPlayers,
    Playing,
    Finished,
}

impl Phase {
    pub fn value(self) -> u16 {
        match self {
            Phase::SelectingPlayers => 0,
            Phase::Playing => 1,
            Phase::Finished => 2,
        }
    }
}

/// What triggers a rule: a touch event, or an internal dispatch reached by a
/// jump from another rule's effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// The start field (product id on the board).
    Start,
    /// Player slot `k`, 1-based.
    Slot(u16),
    Question,
    Repeat,
    /// Card with this device id.
    Card(u16),
    // Internal events, one block each:
    MatchCheck,
    TurnAdvance,
    WinCheck,
}

/// Semantic guard, lowered to register comparisons by the emitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cond {
    InPhase(Phase),
    /// Fewer active players than this slot number.
    SlotInactive(u16),
    /// Slot's score register equals the count.
    ScoreIs(u16, u16),
    NoFirstPick,
    FirstPickIs(u16),
    /// A first pick exists and it is not this card.
    OtherFirstPick(u16),
    TurnIs(u16),
    LastPickIs(u16),
    /// The card's pair has already been matched and removed.
    PairTaken(u16),
    /// Slot's score is >= every other slot's (winner, ties included).
    ScoreLeads(u16),
    PickSumMatches,
    PickSumDiffers,
    /// The current player is the last active one (wrap on advance).
    LastTurn,
    AllPairsFound,
    PairsRemain,
}

/// Semantic effect of a fired rule; exactly one per rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Initialize every register to its reset value, play the welcome clip.
    InitSession,
    /// `activePlayers := k`, reset per-session state, prompt the players to
    /// shuffle the physical cards, announce player 1's turn. -> Playing.
    BeginSession(u16),
    AnnounceNotPlaying,
    /// Slot, pair count: read a slot's score out loud.
    AnnounceScore(u16, u16),
    AnnounceNotStarted,
    AnnounceFinished,
    /// A removed card was tipped: say the spot is empty.
    AnnounceEmpty,
    AnnounceTurn(u16),
    /// No jump: every winner rule whose guards hold sounds, ascending.
    AnnounceWinner(u16),
    /// Record the first pick and play the card.
    FirstPick(u16),
    /// Replay a card's clip without touching game state.
    ReplayCard(u16),
    /// Record the second pick, fold both ids into the pick-sum scratch
    /// register, clear the first pick and enter evaluation. -> Evaluating.
    SecondPick(u16),
    /// Full reset back to SelectingPlayers; only reachable from Finished.
    Restart,
    /// Match: credit the slot, count the pair, keep the turn. -> WinCheck.
    ScoreMatch(u16),
    /// Matched pair leaves the board: flag it so its cards answer "empty".
    /// Falls through to the scoring rules of the same dispatch.
    RetirePair(u16),
    /// Miss: hand over to the turn-advance block.
    Miss,
    /// Advance wraps past the last active player.
    WrapTurn,
    /// Advance from slot to slot + 1.
    NextTurn(u16),
    /// All pairs found: lock the session and announce. -> Finished.
    FinishGame,
    /// Match but pairs remain: same player picks again.
    ContinueTurn,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub on: Event,
    pub when: Vec<Cond>,
    pub then: Step,
}

impl Rule {
    fn new(on: Event, when: Vec<Cond>, then: Step) -> Self {
        Rule { on, when, then }
    }
}

#[derive(Debug)]
pub struct GameFsm {
    pub rules: Vec<Rule>,
}

/// Build the rule table for a game model. Pure function of the model, so the
/// table (and everything lowered from it) is deterministic.
pub fn design(model: &GameModel) -> GameFsm {
    use Cond::*;
    use Event::*;
    use Step::*;

    let players = model.max_players();
    let num_pairs = model.num_pairs();
    let mut rules = Vec::new();

    // Start field: registers come to life here.
    rules.push(Rule::new(Start, vec![], InitSession));

    // Player slots. In SelectingPlayers a tip starts the session; once
    // started, a slot reads its score out (or says it isn't playing).
    for k in 1..=players {
        rules.push(Rule::new(
            Slot(k),
            vec![InPhase(Phase::SelectingPlayers)],
            BeginSession(k),
        ));
        rules.push(Rule::new(Slot(k), vec![SlotInactive(k)], AnnounceNotPlaying));
        for n in 0..=num_pairs {
            rules.push(Rule::new(Slot(k), vec![ScoreIs(k, n)], AnnounceScore(k, n)));
        }
    }

    // Question: whose turn is it / who won. Never mutates state.
    rules.push(Rule::new(
        Question,
        vec![InPhase(Phase::SelectingPlayers)],
        AnnounceNotStarted,
    ));
    for k in 1..=players {
        rules.push(Rule::new(
            Question,
            vec![InPhase(Phase::Playing), TurnIs(k)],
            AnnounceTurn(k),
        ));
    }
    for k in 1..=players {
        rules.push(Rule::new(
            Question,
            vec![InPhase(Phase::Finished), ScoreLeads(k)],
            AnnounceWinner(k),
        ));
    }

    // Repeat: restart when finished, otherwise replay the last card.
    rules.push(Rule::new(Repeat, vec![InPhase(Phase::Finished)], Restart));
    for card in &model.cards {
        rules.push(Rule::new(
            Repeat,
            vec![LastPickIs(card.id)],
            ReplayCard(card.id),
        ));
    }

    // Cards. Order matters: the removed-card rule shields picking, and the
    // re-tip rule shields the second-pick rule.
    for card in &model.cards {
        let id = card.id;
        let pair = card.pair as u16 + 1;
        rules.push(Rule::new(
            Card(id),
            vec![InPhase(Phase::SelectingPlayers)],
            AnnounceNotStarted,
        ));
        rules.push(Rule::new(
            Card(id),
            vec![InPhase(Phase::Finished)],
            AnnounceFinished,
        ));
        rules.push(Rule::new(Card(id), vec![PairTaken(pair)], AnnounceEmpty));
        rules.push(Rule::new(Card(id), vec![FirstPickIs(id)], ReplayCard(id)));
        rules.push(Rule::new(Card(id), vec![NoFirstPick], FirstPick(id)));
        rules.push(Rule::new(Card(id), vec![OtherFirstPick(id)], SecondPick(id)));
    }

    // Evaluation (the transient state), as internal dispatch blocks. The
    // second pick's id identifies the matched pair, so retirement dispatches
    // on the last pick and falls through to the scoring rules.
    for card in &model.cards {
        rules.push(Rule::new(
            MatchCheck,
            vec![PickSumMatches, LastPickIs(card.id)],
            RetirePair(card.pair as u16 + 1),
        ));
    }
    for k in 1..=players {
        rules.push(Rule::new(
            MatchCheck,
            vec![PickSumMatches, TurnIs(k)],
            ScoreMatch(k),
        ));
    }
    rules.push(Rule::new(MatchCheck, vec![PickSumDiffers], Miss));

    rules.push(Rule::new(TurnAdvance, vec![LastTurn], WrapTurn));
    for k in 1..players {
        rules.push(Rule::new(TurnAdvance, vec![TurnIs(k)], NextTurn(k)));
    }

    rules.push(Rule::new(WinCheck, vec![AllPairsFound], FinishGame));
    rules.push(Rule::new(WinCheck, vec![PairsRemain], ContinueTurn));

    GameFsm { rules }
}
