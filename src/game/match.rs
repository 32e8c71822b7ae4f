//! Match state machine and the authoritative match task

use dashmap::DashMap;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::questions::{ProviderError, Question, QuestionProvider};
use crate::store::PlayerConfig;
use crate::util::time::{
    snapshot_interval_ticks, unix_millis, PHYSICS_TICK, ROUND_TIMER_PERIOD,
};
use crate::ws::protocol::{ClientMsg, GameEvent, MatchStats, PlayerMatchStats, ServerMsg};

use super::commentary::Mood;
use super::physics::{PhysicsSystem, RopeState};
use super::roster::{Character, CharacterCatalog, Roster};
use super::scoring::{RosterEffect, ScoringSystem};
use super::snapshot::SnapshotBuilder;
use super::tuning::{MatchTuning, TuningError};
use super::{PlayerInput, Side};

/// Top-level match phase, derived from the state flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    /// No match running (never started, or aborted)
    Idle,
    /// Match in progress
    Active,
    /// Match in progress but frozen
    Paused,
    /// Rope crossed a threshold
    Won,
}

/// Player state in a match (authoritative)
#[derive(Debug, Clone)]
pub struct PlayerState {
    pub side: Side,
    pub name: String,
    pub score: u32,
    /// Cached roster strength, rounded to one decimal
    pub strength: f64,
    pub roster: Roster,
    pub topics: Vec<String>,
    pub pending_question: Option<Question>,

    // Stats
    pub correct_answers: u32,
    pub incorrect_answers: u32,
}

impl PlayerState {
    pub fn new(side: Side, config: &PlayerConfig, starter: &Character) -> Self {
        let roster = Roster::starting(starter);
        Self {
            side,
            name: config.name.clone(),
            score: 0,
            strength: roster.total_strength(),
            roster,
            topics: config.topics.clone(),
            pending_question: None,
            correct_answers: 0,
            incorrect_answers: 0,
        }
    }

    fn refresh_strength(&mut self) {
        self.strength = self.roster.total_strength();
    }
}

/// Question fetch the match task should start
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionRequest {
    pub side: Side,
    pub topic_id: String,
    /// Match generation the answer belongs to
    pub generation: u64,
}

/// Output of a lifecycle step
#[derive(Debug, Default)]
pub struct Transition {
    pub events: Vec<GameEvent>,
    pub requests: Vec<QuestionRequest>,
}

/// Match state (owned by match task)
pub struct MatchState {
    pub tuning: MatchTuning,
    catalog: CharacterCatalog,
    rng: ChaCha8Rng,

    pub is_playing: bool,
    pub is_paused: bool,
    pub is_transitioning: bool,
    pub rope: RopeState,
    pub round: u32,
    pub time_left: u32,
    pub left: PlayerState,
    pub right: PlayerState,
    pub winner: Option<Side>,
    pub round_reward: Option<Character>,

    /// Physics steps taken this match
    pub tick: u64,
    /// Bumped on every start so stale question fetches are dropped
    pub generation: u64,
    pub started_at: Option<u64>,
    moods: [Mood; 2],
}

impl MatchState {
    pub fn new(seed: u64, catalog: CharacterCatalog) -> Self {
        let left = PlayerState::new(Side::Left, &default_config("Player 1"), catalog.starter());
        let right = PlayerState::new(Side::Right, &default_config("Player 2"), catalog.starter());
        let tuning = MatchTuning::default();

        Self {
            tuning,
            catalog,
            rng: ChaCha8Rng::seed_from_u64(seed),
            is_playing: false,
            is_paused: false,
            is_transitioning: false,
            rope: RopeState::default(),
            round: 1,
            time_left: tuning.round_duration,
            left,
            right,
            winner: None,
            round_reward: None,
            tick: 0,
            generation: 0,
            started_at: None,
            moods: [Mood::Tie; 2],
        }
    }

    pub fn phase(&self) -> MatchPhase {
        if self.winner.is_some() {
            MatchPhase::Won
        } else if !self.is_playing {
            MatchPhase::Idle
        } else if self.is_paused {
            MatchPhase::Paused
        } else {
            MatchPhase::Active
        }
    }

    pub fn player(&self, side: Side) -> &PlayerState {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    pub fn player_mut(&mut self, side: Side) -> &mut PlayerState {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }

    /// (answering side, opponent)
    fn sides_mut(&mut self, side: Side) -> (&mut PlayerState, &mut PlayerState) {
        match side {
            Side::Left => (&mut self.left, &mut self.right),
            Side::Right => (&mut self.right, &mut self.left),
        }
    }

    /// Reset everything and begin round 1.
    ///
    /// Valid from any phase; a running match is replaced.
    pub fn start(
        &mut self,
        left: &PlayerConfig,
        right: &PlayerConfig,
        tuning: MatchTuning,
    ) -> Result<Transition, MatchError> {
        tuning.validate()?;

        self.tuning = tuning;
        self.generation += 1;
        self.is_playing = true;
        self.is_paused = false;
        self.is_transitioning = false;
        self.rope = RopeState::default();
        self.round = 1;
        self.time_left = tuning.round_duration;
        self.left = PlayerState::new(Side::Left, left, self.catalog.starter());
        self.right = PlayerState::new(Side::Right, right, self.catalog.starter());
        self.winner = None;
        self.round_reward = Some(self.catalog.pick_reward(&mut self.rng));
        self.tick = 0;
        self.started_at = Some(unix_millis());
        self.moods = [Mood::Tie; 2];

        Ok(Transition {
            events: vec![self.round_start_event()],
            requests: self.question_requests(),
        })
    }

    /// One physics step. No-op unless playing and not paused.
    pub fn tick(&mut self) -> Vec<GameEvent> {
        if !self.is_playing || self.is_paused {
            return Vec::new();
        }

        self.tick += 1;
        self.left.refresh_strength();
        self.right.refresh_strength();

        self.rope = PhysicsSystem::step(
            self.rope,
            self.left.strength,
            self.right.strength,
            &self.tuning,
        );

        let mut events = Vec::new();
        if let Some(won) = self.check_win_condition() {
            events.push(won);
        } else {
            events.extend(self.update_moods());
        }
        events
    }

    /// One second of round countdown. Rolls the round over on reaching zero.
    pub fn round_timer_tick(&mut self) -> Transition {
        if !self.is_playing || self.is_paused {
            return Transition::default();
        }

        self.time_left = self.time_left.saturating_sub(1);
        if self.time_left == 0 && !self.is_transitioning {
            self.rollover()
        } else {
            Transition::default()
        }
    }

    /// End the current round early
    pub fn next_round(&mut self) -> Result<Transition, MatchError> {
        self.ensure_active()?;
        Ok(self.rollover())
    }

    fn rollover(&mut self) -> Transition {
        self.is_transitioning = true;

        let requests = self.question_requests();
        self.time_left = self.tuning.round_duration;
        self.round += 1;
        self.round_reward = Some(self.catalog.pick_reward(&mut self.rng));

        self.is_transitioning = false;

        debug!(round = self.round, "Round rollover");
        Transition {
            events: vec![self.round_start_event()],
            requests,
        }
    }

    fn round_start_event(&self) -> GameEvent {
        GameEvent::RoundStart {
            round: self.round,
            time_left: self.time_left,
            reward: self.round_reward.clone(),
        }
    }

    /// Fetches for every side without a pending question
    fn question_requests(&mut self) -> Vec<QuestionRequest> {
        if !self.is_playing {
            return Vec::new();
        }

        let mut requests = Vec::new();
        for side in Side::BOTH {
            let player = match side {
                Side::Left => &self.left,
                Side::Right => &self.right,
            };
            if player.pending_question.is_some() {
                continue;
            }
            let Some(topic_id) = player.topics.choose(&mut self.rng).cloned() else {
                continue;
            };
            requests.push(QuestionRequest {
                side,
                topic_id,
                generation: self.generation,
            });
        }
        requests
    }

    /// Deliver a fetched question.
    ///
    /// Ignored if it belongs to an earlier match, play stopped, or the side
    /// already has one.
    pub fn assign_question(
        &mut self,
        side: Side,
        generation: u64,
        question: Question,
    ) -> Option<GameEvent> {
        if generation != self.generation || !self.is_playing {
            return None;
        }

        let player = self.player_mut(side);
        if player.pending_question.is_some() {
            return None;
        }

        let question_id = question.id.clone();
        player.pending_question = Some(question);
        Some(GameEvent::QuestionAssigned { side, question_id })
    }

    /// Apply an answer from `side`.
    ///
    /// Rejected without touching state when the match is not active or the
    /// side has no pending question.
    pub fn answer_question(
        &mut self,
        side: Side,
        is_correct: bool,
    ) -> Result<Vec<GameEvent>, MatchError> {
        self.ensure_active()?;
        if self.player(side).pending_question.is_none() {
            return Err(MatchError::NoPendingQuestion(side));
        }

        let reward = self.round_reward.clone();
        let (own, opponent) = self.sides_mut(side);

        let effect = if is_correct {
            own.correct_answers += 1;
            ScoringSystem::apply_correct(
                &mut own.score,
                &mut own.roster,
                &mut opponent.roster,
                reward.as_ref(),
            )
        } else {
            own.incorrect_answers += 1;
            ScoringSystem::apply_incorrect(&mut own.roster)
        };
        let score = own.score;

        if effect.claims_reward() {
            self.round_reward = None;
        }

        self.left.refresh_strength();
        self.right.refresh_strength();
        self.left.pending_question = None;
        self.right.pending_question = None;

        let mut events = vec![if is_correct {
            GameEvent::AnswerCorrect { side, score }
        } else {
            GameEvent::AnswerIncorrect { side }
        }];

        match effect {
            RosterEffect::Recruited(member) => events.push(GameEvent::Recruit { side, member }),
            RosterEffect::Sabotaged(removed) => events.push(GameEvent::SabotageEliminate {
                side,
                victim: side.opponent(),
                removed,
            }),
            RosterEffect::SelfEliminated(removed) => {
                events.push(GameEvent::SelfEliminate { side, removed })
            }
            RosterEffect::SabotageBlocked | RosterEffect::None => {}
        }

        debug!(side = %side, is_correct, "Answer applied");
        Ok(events)
    }

    /// Flip pause. Returns the new paused flag.
    pub fn toggle_pause(&mut self) -> Result<bool, MatchError> {
        if !self.is_playing {
            return Err(MatchError::NotActive);
        }
        self.is_paused = !self.is_paused;
        Ok(self.is_paused)
    }

    /// Cancel the match without a winner
    pub fn abort(&mut self) -> Result<(), MatchError> {
        if !self.is_playing {
            return Err(MatchError::NotActive);
        }
        self.is_playing = false;
        self.is_paused = false;
        self.is_transitioning = false;
        self.round_reward = None;
        self.left.pending_question = None;
        self.right.pending_question = None;
        Ok(())
    }

    fn ensure_active(&self) -> Result<(), MatchError> {
        if !self.is_playing {
            return Err(MatchError::NotActive);
        }
        if self.is_paused {
            return Err(MatchError::Paused);
        }
        if self.is_transitioning {
            return Err(MatchError::Transitioning);
        }
        Ok(())
    }

    /// Check win condition
    fn check_win_condition(&mut self) -> Option<GameEvent> {
        if self.winner.is_some() {
            return None;
        }

        let winner =
            PhysicsSystem::winning_side(self.rope.displacement, self.tuning.winning_threshold)?;

        self.winner = Some(winner);
        self.is_playing = false;
        self.is_paused = false;
        self.is_transitioning = false;

        info!(
            winner = %winner,
            rope = self.rope.displacement,
            round = self.round,
            "Match won"
        );
        Some(GameEvent::MatchWon {
            winner,
            rope_position: self.rope.displacement,
        })
    }

    fn update_moods(&mut self) -> Vec<GameEvent> {
        let mut events = Vec::new();
        for side in Side::BOTH {
            let advantage = PhysicsSystem::advantage(
                self.rope.displacement,
                self.tuning.winning_threshold,
                side,
            );
            let mood = Mood::from_advantage(advantage);
            if mood != self.moods[side.index()] {
                self.moods[side.index()] = mood;
                events.push(GameEvent::Commentary {
                    side,
                    mood,
                    line: mood.pick_line(&mut self.rng).to_string(),
                });
            }
        }
        events
    }

    /// Build match stats
    pub fn stats(&self) -> MatchStats {
        let duration_secs = self
            .started_at
            .map(|start| (unix_millis().saturating_sub(start) / 1000) as u32)
            .unwrap_or(0);

        MatchStats {
            duration_secs,
            rounds: self.round,
            player_stats: Side::BOTH
                .iter()
                .map(|side| {
                    let p = self.player(*side);
                    PlayerMatchStats {
                        side: p.side,
                        name: p.name.clone(),
                        score: p.score,
                        correct_answers: p.correct_answers,
                        incorrect_answers: p.incorrect_answers,
                        final_crew_size: p.roster.len() as u32,
                        final_strength: p.strength,
                    }
                })
                .collect(),
        }
    }
}

fn default_config(name: &str) -> PlayerConfig {
    PlayerConfig {
        name: name.to_string(),
        topics: Vec::new(),
    }
}

/// Rejected match commands
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MatchError {
    #[error("No match is in progress")]
    NotActive,

    #[error("Match is paused")]
    Paused,

    #[error("Round is changing over")]
    Transitioning,

    #[error("The {0} player has no question to answer")]
    NoPendingQuestion(Side),

    #[error("Invalid tuning: {0}")]
    Tuning(#[from] TuningError),
}

impl MatchError {
    pub fn code(&self) -> &'static str {
        match self {
            MatchError::NotActive => "not_active",
            MatchError::Paused => "paused",
            MatchError::Transitioning => "transitioning",
            MatchError::NoPendingQuestion(_) => "no_pending_question",
            MatchError::Tuning(_) => "invalid_tuning",
        }
    }
}

/// Handle to a running match
#[derive(Clone)]
pub struct MatchHandle {
    pub id: Uuid,
    pub input_tx: mpsc::Sender<PlayerInput>,
    pub snapshot_tx: broadcast::Sender<ServerMsg>,
}

/// Registry of all active matches
pub struct MatchRegistry {
    matches: DashMap<Uuid, MatchHandle>,
}

impl MatchRegistry {
    pub fn new() -> Self {
        Self {
            matches: DashMap::new(),
        }
    }

    pub fn insert(&self, handle: MatchHandle) {
        self.matches.insert(handle.id, handle);
    }

    pub fn remove(&self, id: &Uuid) -> Option<MatchHandle> {
        self.matches.remove(id).map(|(_, h)| h)
    }

    pub fn active_matches(&self) -> usize {
        self.matches.len()
    }
}

impl Default for MatchRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Completed question fetch
struct FetchResult {
    side: Side,
    generation: u64,
    outcome: Result<Vec<Question>, ProviderError>,
}

/// The authoritative game match.
///
/// Owns the state and is its only writer. Physics ticks, the round timer,
/// client commands and question fetch results are all serialized through
/// the select loop in [`GameMatch::run`].
pub struct GameMatch {
    id: Uuid,
    state: MatchState,
    default_tuning: MatchTuning,
    provider: Arc<dyn QuestionProvider>,
    input_rx: mpsc::Receiver<PlayerInput>,
    snapshot_tx: broadcast::Sender<ServerMsg>,
    fetch_tx: mpsc::Sender<FetchResult>,
    fetch_rx: mpsc::Receiver<FetchResult>,
    snapshot_builder: SnapshotBuilder,
    physics_driver: Option<Interval>,
    round_driver: Option<Interval>,
}

impl GameMatch {
    /// Create a new match
    pub fn new(
        id: Uuid,
        seed: u64,
        catalog: CharacterCatalog,
        default_tuning: MatchTuning,
        provider: Arc<dyn QuestionProvider>,
    ) -> (Self, MatchHandle) {
        let (input_tx, input_rx) = mpsc::channel(64);
        let (snapshot_tx, _) = broadcast::channel(128);
        let (fetch_tx, fetch_rx) = mpsc::channel(8);

        let handle = MatchHandle {
            id,
            input_tx,
            snapshot_tx: snapshot_tx.clone(),
        };

        let game_match = Self {
            id,
            state: MatchState::new(seed, catalog),
            default_tuning,
            provider,
            input_rx,
            snapshot_tx,
            fetch_tx,
            fetch_rx,
            snapshot_builder: SnapshotBuilder::new(snapshot_interval_ticks()),
            physics_driver: None,
            round_driver: None,
        };

        (game_match, handle)
    }

    /// Run until the session leaves or its input channel closes
    pub async fn run(mut self) {
        info!(match_id = %self.id, "Match session opened");

        loop {
            tokio::select! {
                input = self.input_rx.recv() => {
                    let Some(input) = input else { break };
                    if !self.process_input(input) {
                        break;
                    }
                }
                Some(result) = self.fetch_rx.recv() => {
                    self.handle_fetch(result);
                }
                _ = next_tick(&mut self.physics_driver) => {
                    self.on_physics_tick();
                }
                _ = next_tick(&mut self.round_driver) => {
                    self.on_round_tick();
                }
            }
        }

        self.stop_drivers();
        info!(match_id = %self.id, "Match session closed");
    }

    /// Handle one client message. Returns false when the session is leaving.
    fn process_input(&mut self, input: PlayerInput) -> bool {
        trace!(
            match_id = %self.id,
            session_id = %input.session_id,
            queued_ms = unix_millis().saturating_sub(input.received_at),
            "Processing input"
        );

        match input.msg {
            ClientMsg::StartGame { left, right, tuning } => {
                let tuning = tuning.unwrap_or(self.default_tuning);
                match self.state.start(&left, &right, tuning) {
                    Ok(transition) => {
                        info!(
                            match_id = %self.id,
                            left = %left.name,
                            right = %right.name,
                            "Match started"
                        );
                        self.start_drivers();
                        self.apply_transition(transition);
                        self.send_snapshot();
                    }
                    Err(e) => self.reject(e),
                }
            }
            ClientMsg::Answer { side, option_index } => {
                let is_correct = self
                    .state
                    .player(side)
                    .pending_question
                    .as_ref()
                    .map(|q| q.is_correct(option_index))
                    .unwrap_or(false);

                match self.state.answer_question(side, is_correct) {
                    Ok(events) => {
                        self.broadcast_events(events);
                        self.send_snapshot();
                    }
                    Err(e) => self.reject(e),
                }
            }
            ClientMsg::NextRound => match self.state.next_round() {
                Ok(transition) => {
                    self.apply_transition(transition);
                    self.send_snapshot();
                }
                Err(e) => self.reject(e),
            },
            ClientMsg::TogglePause => match self.state.toggle_pause() {
                Ok(paused) => {
                    info!(match_id = %self.id, paused, "Pause toggled");
                    self.broadcast_events(vec![GameEvent::Paused { paused }]);
                    self.send_snapshot();
                }
                Err(e) => self.reject(e),
            },
            ClientMsg::Abort => match self.state.abort() {
                Ok(()) => {
                    info!(match_id = %self.id, "Match aborted");
                    self.stop_drivers();
                    self.broadcast_events(vec![GameEvent::MatchAborted]);
                    self.send_snapshot();
                    self.send(ServerMsg::MatchEnd {
                        winner: None,
                        stats: self.state.stats(),
                    });
                }
                Err(e) => self.reject(e),
            },
            ClientMsg::Ping { t } => self.send(ServerMsg::Pong { t }),
            ClientMsg::LeaveMatch => {
                info!(match_id = %self.id, session_id = %input.session_id, "Session left match");
                return false;
            }
        }
        true
    }

    fn on_physics_tick(&mut self) {
        let events = self.state.tick();
        let won = events
            .iter()
            .any(|e| matches!(e, GameEvent::MatchWon { .. }));
        self.broadcast_events(events);

        if won {
            self.finish_match();
            return;
        }

        if self.snapshot_builder.should_send() {
            self.send(self.snapshot_builder.build(&self.state));
        }
    }

    fn on_round_tick(&mut self) {
        let transition = self.state.round_timer_tick();
        let rolled = !transition.events.is_empty();
        self.apply_transition(transition);
        if rolled {
            self.snapshot_builder.force_next();
        }
    }

    fn finish_match(&mut self) {
        self.stop_drivers();
        self.send_snapshot();
        self.send(ServerMsg::MatchEnd {
            winner: self.state.winner,
            stats: self.state.stats(),
        });
    }

    fn apply_transition(&mut self, transition: Transition) {
        self.broadcast_events(transition.events);
        for request in transition.requests {
            self.spawn_fetch(request);
        }
    }

    /// Fetch off the match task so ticking never waits on content
    fn spawn_fetch(&self, request: QuestionRequest) {
        let provider = self.provider.clone();
        let fetch_tx = self.fetch_tx.clone();
        let match_id = self.id;

        tokio::spawn(async move {
            debug!(match_id = %match_id, side = %request.side, topic = %request.topic_id, "Fetching question");
            let outcome = provider.get_questions(&request.topic_id, 1).await;
            let _ = fetch_tx
                .send(FetchResult {
                    side: request.side,
                    generation: request.generation,
                    outcome,
                })
                .await;
        });
    }

    fn handle_fetch(&mut self, result: FetchResult) {
        let question = match result.outcome {
            Ok(questions) => questions.into_iter().next(),
            Err(e) => {
                warn!(match_id = %self.id, side = %result.side, error = %e, "Question fetch failed");
                return;
            }
        };

        let Some(question) = question else {
            warn!(match_id = %self.id, side = %result.side, "No questions available");
            return;
        };

        if let Some(event) = self
            .state
            .assign_question(result.side, result.generation, question)
        {
            self.broadcast_events(vec![event]);
            self.send_snapshot();
        }
    }

    fn start_drivers(&mut self) {
        let mut physics = interval(PHYSICS_TICK);
        physics.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut round = interval_at(Instant::now() + ROUND_TIMER_PERIOD, ROUND_TIMER_PERIOD);
        round.set_missed_tick_behavior(MissedTickBehavior::Skip);

        self.physics_driver = Some(physics);
        self.round_driver = Some(round);
    }

    fn stop_drivers(&mut self) {
        self.physics_driver = None;
        self.round_driver = None;
    }

    fn reject(&self, error: MatchError) {
        warn!(
            match_id = %self.id,
            phase = ?self.state.phase(),
            error = %error,
            "Rejected match command"
        );
        self.send(ServerMsg::error(error.code(), error.to_string()));
    }

    fn broadcast_events(&self, events: Vec<GameEvent>) {
        for event in events {
            self.send(ServerMsg::Event { event });
        }
    }

    fn send_snapshot(&self) {
        self.send(self.snapshot_builder.build(&self.state));
    }

    fn send(&self, msg: ServerMsg) {
        // No subscribers is fine
        let _ = self.snapshot_tx.send(msg);
    }
}

/// Wait for a driver's next tick; a stopped driver never fires
async fn next_tick(driver: &mut Option<Interval>) {
    match driver {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
