//! The per-table actor.
//!
//! One task owns all of a table's mutable state and consumes commands from a
//! single mpsc channel, so action application is serialized per table while
//! tables run fully in parallel. Turn timeouts feed back through the same
//! channel and are voided if the hand or turn has moved on by the time they
//! are processed.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::{
    self, AgentId, Chips, GameConfig, GameEvent, HandId, HandState, PlayerAction, PlayerStatus,
    SeatId, Transition,
};
use crate::engine::positions;
use crate::history::HandHistoryStore;
use crate::ledger::{ChipLedger, LedgerError, TransferReason};

use super::dedup::{DedupCache, DedupHit};
use super::ring::{EventRing, StoredEvent};
use super::seats::{SeatMap, SeatStatus};
use super::snapshot::{SeatSnapshot, TableSnapshot, TableStatus};
use super::timer::ActionTimer;
use super::{TableError, TableId};

const LOG_TARGET: &str = "pokerd::table";

const CMD_CHANNEL_CAPACITY: usize = 64;
const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct TableConfig {
    pub game: GameConfig,
    /// Window the acting player has before the table acts for them.
    pub action_timeout: Duration,
    pub ring_capacity: usize,
    pub dedup_capacity: usize,
    /// Fixed seed for replayable shuffles; entropy-seeded when absent.
    pub rng_seed: Option<u64>,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            game: GameConfig::no_limit(1, 2),
            action_timeout: Duration::from_secs(30),
            ring_capacity: 512,
            dedup_capacity: 256,
            rng_seed: None,
        }
    }
}

/// The cached, client-visible outcome of one accepted action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedAction {
    pub request_id: String,
    pub events: Vec<StoredEvent>,
    pub hand_complete: bool,
}

type ActionReply = Result<AppliedAction, TableError>;

pub enum TableCmd {
    Join {
        agent_id: AgentId,
        seat: SeatId,
        buy_in: Chips,
        reply: oneshot::Sender<Result<TableSnapshot, TableError>>,
    },
    Leave {
        agent_id: AgentId,
        reply: oneshot::Sender<Result<(), TableError>>,
    },
    Action {
        agent_id: AgentId,
        request_id: String,
        seq: u64,
        action: PlayerAction,
        reply: oneshot::Sender<ActionReply>,
    },
    StartHand {
        reply: oneshot::Sender<Result<Vec<StoredEvent>, TableError>>,
    },
    Snapshot {
        reply: oneshot::Sender<TableSnapshot>,
    },
    EventsSince {
        last_seen: u64,
        reply: oneshot::Sender<Option<Vec<StoredEvent>>>,
    },
    TurnTimeout {
        hand_id: HandId,
        seat: SeatId,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable client surface for one table's actor task.
#[derive(Clone)]
pub struct TableHandle {
    id: TableId,
    tx: mpsc::Sender<TableCmd>,
    events: broadcast::Sender<StoredEvent>,
}

impl TableHandle {
    pub fn id(&self) -> TableId {
        self.id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoredEvent> {
        self.events.subscribe()
    }

    pub async fn join(
        &self,
        agent_id: AgentId,
        seat: SeatId,
        buy_in: Chips,
    ) -> Result<TableSnapshot, TableError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(TableCmd::Join {
                agent_id,
                seat,
                buy_in,
                reply,
            })
            .await
            .map_err(|_| TableError::TableClosed)?;
        rx.await.map_err(|_| TableError::TableClosed)?
    }

    pub async fn leave(&self, agent_id: AgentId) -> Result<(), TableError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(TableCmd::Leave { agent_id, reply })
            .await
            .map_err(|_| TableError::TableClosed)?;
        rx.await.map_err(|_| TableError::TableClosed)?
    }

    pub async fn act(
        &self,
        agent_id: AgentId,
        request_id: String,
        seq: u64,
        action: PlayerAction,
    ) -> ActionReply {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(TableCmd::Action {
                agent_id,
                request_id,
                seq,
                action,
                reply,
            })
            .await
            .map_err(|_| TableError::TableClosed)?;
        rx.await.map_err(|_| TableError::TableClosed)?
    }

    pub async fn start_hand(&self) -> Result<Vec<StoredEvent>, TableError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(TableCmd::StartHand { reply })
            .await
            .map_err(|_| TableError::TableClosed)?;
        rx.await.map_err(|_| TableError::TableClosed)?
    }

    pub async fn snapshot(&self) -> Result<TableSnapshot, TableError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(TableCmd::Snapshot { reply })
            .await
            .map_err(|_| TableError::TableClosed)?;
        rx.await.map_err(|_| TableError::TableClosed)
    }

    pub async fn events_since(&self, last_seen: u64) -> Result<Option<Vec<StoredEvent>>, TableError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(TableCmd::EventsSince { last_seen, reply })
            .await
            .map_err(|_| TableError::TableClosed)?;
        rx.await.map_err(|_| TableError::TableClosed)
    }

    pub async fn close(&self) {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(TableCmd::Close { reply }).await.is_ok() {
            let _ = rx.await;
        }
    }
}

pub struct TableActor {
    id: TableId,
    config: TableConfig,
    seats: SeatMap,
    hand: Option<HandState>,
    dealer: Option<SeatId>,
    hands_played: u64,
    closed: bool,
    created_at: DateTime<Utc>,

    dedup: DedupCache<ActionReply>,
    seat_seq: HashMap<SeatId, u64>,
    ring: EventRing,
    timer: ActionTimer,
    rng: StdRng,

    ledger: Arc<ChipLedger>,
    history: Arc<dyn HandHistoryStore>,
    self_tx: mpsc::Sender<TableCmd>,
    events_tx: broadcast::Sender<StoredEvent>,
}

impl TableActor {
    /// Spawn the actor task and return its handle.
    pub fn spawn(
        id: TableId,
        config: TableConfig,
        ledger: Arc<ChipLedger>,
        history: Arc<dyn HandHistoryStore>,
    ) -> TableHandle {
        let (tx, rx) = mpsc::channel(CMD_CHANNEL_CAPACITY);
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let actor = TableActor {
            id,
            ring: EventRing::new(config.ring_capacity),
            dedup: DedupCache::new(config.dedup_capacity),
            config,
            seats: SeatMap::new(),
            hand: None,
            dealer: None,
            hands_played: 0,
            closed: false,
            created_at: Utc::now(),
            seat_seq: HashMap::new(),
            timer: ActionTimer::new(),
            rng,
            ledger,
            history,
            self_tx: tx.clone(),
            events_tx: events_tx.clone(),
        };
        tokio::spawn(actor.run(rx));
        TableHandle { id, tx, events: events_tx }
    }

    async fn run(mut self, mut rx: mpsc::Receiver<TableCmd>) {
        info!(target = LOG_TARGET, table_id = %self.id, "table actor started");
        while let Some(cmd) = rx.recv().await {
            match cmd {
                TableCmd::Join {
                    agent_id,
                    seat,
                    buy_in,
                    reply,
                } => {
                    let _ = reply.send(self.handle_join(agent_id, seat, buy_in));
                }
                TableCmd::Leave { agent_id, reply } => {
                    let _ = reply.send(self.handle_leave(&agent_id));
                }
                TableCmd::Action {
                    agent_id,
                    request_id,
                    seq,
                    action,
                    reply,
                } => {
                    let _ = reply.send(self.handle_action(&agent_id, request_id, seq, action));
                }
                TableCmd::StartHand { reply } => {
                    let _ = reply.send(self.handle_start_hand());
                }
                TableCmd::Snapshot { reply } => {
                    let _ = reply.send(self.snapshot());
                }
                TableCmd::EventsSince { last_seen, reply } => {
                    let _ = reply.send(self.ring.events_since(last_seen));
                }
                TableCmd::TurnTimeout { hand_id, seat } => {
                    self.handle_turn_timeout(hand_id, seat);
                }
                TableCmd::Close { reply } => {
                    self.timer.cancel();
                    self.closed = true;
                    // return all remaining escrow before the actor goes away
                    let seated: Vec<AgentId> = self
                        .seats
                        .iter()
                        .map(|info| info.agent_id.clone())
                        .collect();
                    for agent_id in seated {
                        self.release_escrow(&agent_id);
                    }
                    let _ = reply.send(());
                    break;
                }
            }
        }
        info!(target = LOG_TARGET, table_id = %self.id, "table actor stopped");
    }

    fn handle_join(
        &mut self,
        agent_id: AgentId,
        seat: SeatId,
        buy_in: Chips,
    ) -> Result<TableSnapshot, TableError> {
        if self.closed {
            return Err(TableError::TableClosed);
        }
        self.seats
            .join(seat, agent_id.clone(), buy_in, self.config.game.max_seats)?;
        // The buy-in leaves the bankroll and sits in a per-seat escrow
        // account until the seat frees, so it cannot be withdrawn or staked
        // at another table while live here.
        let escrow_ref = format!("table:{}:seat:{}:{}", self.id, seat, Uuid::new_v4());
        if let Err(err) = self.ledger.transfer(
            &escrow_ref,
            &agent_id,
            &self.escrow_account(&agent_id),
            buy_in,
            TransferReason::SeatEscrow,
        ) {
            self.seats.free(seat);
            return Err(match err {
                LedgerError::InsufficientBalance(_) => TableError::InsufficientFunds,
                other => TableError::Internal(other.to_string()),
            });
        }
        info!(
            target = LOG_TARGET,
            table_id = %self.id,
            agent_id,
            seat,
            buy_in,
            "agent seated"
        );
        Ok(self.snapshot())
    }

    fn handle_leave(&mut self, agent_id: &str) -> Result<(), TableError> {
        if self.closed {
            return Err(TableError::TableClosed);
        }
        let seat = self
            .seats
            .by_agent(agent_id)
            .ok_or(TableError::NotSeated)?
            .seat;

        let in_live_hand = self
            .hand
            .as_ref()
            .map(|hand| {
                !hand.complete
                    && hand
                        .player(seat)
                        .is_some_and(|p| p.status != PlayerStatus::Folded)
            })
            .unwrap_or(false);

        if !in_live_hand {
            self.seats.free(seat);
            self.seat_seq.remove(&seat);
            self.release_escrow(agent_id);
            info!(target = LOG_TARGET, table_id = %self.id, agent_id, seat, "seat freed");
            return Ok(());
        }

        // Committed chips must stay accounted for, so the live hand folds the
        // seat; the seat itself frees once the hand completes.
        if let Some(info) = self.seats.get_mut(seat) {
            info.status = SeatStatus::Leaving;
        }
        let hand = self.hand.as_mut().expect("live hand checked above");
        match engine::retire_seat(hand, seat) {
            Ok(transition) => {
                info!(target = LOG_TARGET, table_id = %self.id, agent_id, seat, "seat retiring mid-hand");
                self.publish_events(transition.events());
                self.finish_transition(transition);
                Ok(())
            }
            Err(err) => Err(TableError::Rule(err)),
        }
    }

    fn handle_action(
        &mut self,
        agent_id: &str,
        request_id: String,
        seq: u64,
        action: PlayerAction,
    ) -> ActionReply {
        if self.closed {
            return Err(TableError::TableClosed);
        }
        let seat = self
            .seats
            .by_agent(agent_id)
            .ok_or(TableError::NotSeated)?
            .seat;
        let fingerprint = action_fingerprint(agent_id, seat, seq, &action);

        // Retransmissions replay the stored reply without touching state; the
        // same id with different parameters is a client bug.
        match self.dedup.check(&request_id, fingerprint) {
            Some(DedupHit::Replay(reply)) => {
                debug!(target = LOG_TARGET, table_id = %self.id, request_id, "replayed cached reply");
                return reply.clone();
            }
            Some(DedupHit::Conflict) => {
                warn!(target = LOG_TARGET, table_id = %self.id, request_id, "request id reused with different parameters");
                return Err(TableError::RequestIdConflict(request_id));
            }
            None => {}
        }

        // Per-seat replay protection, independent of request ids.
        let last = self.seat_seq.get(&seat).copied().unwrap_or(0);
        if seq <= last {
            return Err(TableError::StaleSeq { seq, last });
        }

        let Some(hand) = self.hand.as_mut() else {
            return Err(TableError::NoHandInProgress);
        };
        let outcome = engine::apply_action(hand, seat, action);
        self.seat_seq.insert(seat, seq);

        let reply = match outcome {
            Ok(transition) => {
                let stored = self.publish_events(transition.events());
                let hand_complete = matches!(transition, Transition::HandComplete { .. });
                let applied = AppliedAction {
                    request_id: request_id.clone(),
                    events: stored,
                    hand_complete,
                };
                self.finish_transition(transition);
                Ok(applied)
            }
            Err(err) => Err(TableError::Rule(err)),
        };
        self.dedup.insert(request_id, fingerprint, reply.clone());
        reply
    }

    fn handle_start_hand(&mut self) -> Result<Vec<StoredEvent>, TableError> {
        if self.closed {
            return Err(TableError::TableClosed);
        }
        if self.hand.as_ref().is_some_and(|hand| !hand.complete) {
            return Err(TableError::HandInProgress);
        }
        let ready = self.seats.ready_seats();
        if ready.len() < 2 {
            return Err(TableError::NotEnoughPlayers);
        }
        let dealer = match self.dealer {
            Some(previous) => positions::next_dealer(&ready, previous),
            None => ready[0],
        };
        let entrants = ready
            .iter()
            .map(|&seat| {
                let info = self.seats.get(seat).expect("ready seat occupied");
                engine::Entrant {
                    seat,
                    agent_id: info.agent_id.clone(),
                    stack: info.chips,
                }
            })
            .collect();
        let hand_id = Uuid::new_v4();
        let (state, events) = engine::start_hand(
            self.config.game.clone(),
            hand_id,
            dealer,
            entrants,
            &mut self.rng,
        )
        .map_err(|err| TableError::Internal(err.to_string()))?;

        info!(
            target = LOG_TARGET,
            table_id = %self.id,
            %hand_id,
            dealer,
            players = ready.len(),
            "hand started"
        );
        self.dealer = Some(dealer);
        let stored = self.publish_events(&events);
        let complete = state.complete;
        self.hand = Some(state);
        if complete {
            self.complete_hand();
        } else {
            self.arm_timer();
        }
        Ok(stored)
    }

    fn handle_turn_timeout(&mut self, hand_id: HandId, seat: SeatId) {
        // Void unless the hand and turn the timer was armed for are still live.
        let still_current = self
            .hand
            .as_ref()
            .is_some_and(|hand| hand.hand_id == hand_id && !hand.complete && hand.to_act == seat);
        if !still_current {
            debug!(target = LOG_TARGET, table_id = %self.id, %hand_id, seat, "stale turn timeout ignored");
            return;
        }
        let hand = self.hand.as_mut().expect("checked above");
        match engine::apply_timeout_action(hand, seat) {
            Ok(transition) => {
                info!(target = LOG_TARGET, table_id = %self.id, %hand_id, seat, "auto-acted for timed-out seat");
                self.publish_events(transition.events());
                self.finish_transition(transition);
            }
            Err(err) => {
                warn!(target = LOG_TARGET, table_id = %self.id, %hand_id, seat, %err, "timeout auto-action rejected");
            }
        }
    }

    /// Post-transition bookkeeping shared by client actions, timeouts, and
    /// mid-hand retirements.
    fn finish_transition(&mut self, transition: Transition) {
        match transition {
            Transition::HandComplete { .. } => self.complete_hand(),
            Transition::Continued { .. } | Transition::StreetAdvanced { .. } => self.arm_timer(),
        }
    }

    fn arm_timer(&mut self) {
        let Some(hand) = self.hand.as_ref() else {
            return;
        };
        if hand.complete || hand.betting_locked_all_in {
            return;
        }
        self.timer.arm(
            self.self_tx.clone(),
            self.config.action_timeout,
            hand.hand_id,
            hand.to_act,
        );
    }

    fn escrow_account(&self, agent_id: &str) -> String {
        format!("table:{}:{}", self.id, agent_id)
    }

    /// Return everything left in an agent's seat escrow to their bankroll.
    fn release_escrow(&self, agent_id: &str) {
        let account = self.escrow_account(agent_id);
        let balance = self.ledger.balance(&account);
        if balance <= 0 {
            return;
        }
        let release_ref = format!("{}:release:{}", account, Uuid::new_v4());
        if let Err(err) = self.ledger.transfer(
            &release_ref,
            &account,
            agent_id,
            balance as Chips,
            TransferReason::SeatRelease,
        ) {
            warn!(target = LOG_TARGET, table_id = %self.id, agent_id, %err, "escrow release failed");
        }
    }

    /// Stamp events into the ring, persist them, and fan them out.
    fn publish_events(&mut self, events: &[GameEvent]) -> Vec<StoredEvent> {
        if events.is_empty() {
            return Vec::new();
        }
        let hand_id = events[0].hand_id;
        if let Err(err) = self.history.append_events(hand_id, events) {
            warn!(target = LOG_TARGET, table_id = %self.id, %hand_id, %err, "history append failed");
        }
        let mut stored = Vec::with_capacity(events.len());
        for event in events {
            let entry = self.ring.push(event.clone());
            let _ = self.events_tx.send(entry.clone());
            stored.push(entry);
        }
        stored
    }

    /// Settle the finished hand: sync seat stacks, move chips through the
    /// ledger with per-(hand, pot, winner) refs, and free leaving seats.
    fn complete_hand(&mut self) {
        self.timer.cancel();
        let Some(hand) = self.hand.take() else {
            return;
        };
        let Some(result) = hand.result.clone() else {
            warn!(target = LOG_TARGET, table_id = %self.id, hand_id = %hand.hand_id, "hand missing result at completion");
            return;
        };

        for player in &hand.players {
            if let Some(info) = self.seats.get_mut(player.seat) {
                info.chips = player.stack;
            }
        }

        // Double-entry settlement via a per-hand pot account. Refs are
        // derived from stable identifiers, so a retried completion replays
        // as no-ops.
        let pot_account = format!("pot:{}", hand.hand_id);
        for contribution in &result.contributions {
            let commit_ref = format!("{}:commit:{}", hand.hand_id, contribution.seat);
            if let Err(err) = self.ledger.transfer(
                &commit_ref,
                &self.escrow_account(&contribution.agent_id),
                &pot_account,
                contribution.amount,
                TransferReason::PotCommit,
            ) {
                warn!(target = LOG_TARGET, table_id = %self.id, %err, "pot commit transfer failed");
            }
        }
        for payout in &result.payouts {
            for (&winner, &share) in payout.winners.iter().zip(&payout.shares) {
                if share == 0 {
                    continue;
                }
                let Some(player) = hand.player(winner) else {
                    continue;
                };
                let payout_ref = format!("{}:{}:{}", hand.hand_id, payout.pot_index, winner);
                if let Err(err) = self.ledger.transfer(
                    &payout_ref,
                    &pot_account,
                    &self.escrow_account(&player.agent_id),
                    share,
                    TransferReason::PotPayout,
                ) {
                    warn!(target = LOG_TARGET, table_id = %self.id, %err, "pot payout transfer failed");
                }
            }
        }

        self.hands_played += 1;
        info!(
            target = LOG_TARGET,
            table_id = %self.id,
            hand_id = %hand.hand_id,
            hands_played = self.hands_played,
            winners = ?result.winners,
            "hand complete"
        );

        let leaving: Vec<(SeatId, AgentId)> = self
            .seats
            .iter()
            .filter(|info| info.status == SeatStatus::Leaving)
            .map(|info| (info.seat, info.agent_id.clone()))
            .collect();
        for (seat, agent_id) in leaving {
            self.seats.free(seat);
            self.seat_seq.remove(&seat);
            self.release_escrow(&agent_id);
            debug!(target = LOG_TARGET, table_id = %self.id, seat, "deferred seat release");
        }
    }

    fn snapshot(&self) -> TableSnapshot {
        let status = if self.closed {
            TableStatus::Closed
        } else if self.seats.occupied() >= 2 {
            TableStatus::Running
        } else {
            TableStatus::Open
        };
        TableSnapshot {
            id: self.id,
            variant: self.config.game.mode,
            status,
            seats: self
                .seats
                .iter()
                .map(|info| SeatSnapshot {
                    seat: info.seat,
                    agent_id: info.agent_id.clone(),
                    chips: info.chips,
                    status: info.status,
                })
                .collect(),
            hands_played: self.hands_played,
            current_hand_id: self
                .hand
                .as_ref()
                .filter(|hand| !hand.complete)
                .map(|hand| hand.hand_id),
            created_at: self.created_at,
        }
    }
}

fn action_fingerprint(agent_id: &str, seat: SeatId, seq: u64, action: &PlayerAction) -> u64 {
    let mut hasher = DefaultHasher::new();
    agent_id.hash(&mut hasher);
    seat.hash(&mut hasher);
    seq.hash(&mut hasher);
    serde_json::to_string(action)
        .expect("actions serialize")
        .hash(&mut hasher);
    hasher.finish()
}
