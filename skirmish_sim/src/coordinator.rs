// Coordinator: one machine's seat in a lockstep match.
//
// The coordinator is the glue between everything that is not deterministic
// (local input devices, the network, the host's frame clock) and the step
// scheduler, which is. It owns the scheduler, a `Transport`, and the input
// sources for the players hosted on this machine.
//
// ## One tick
//
// `tick(elapsed)` runs, in order:
//   1. **Receive.** Drain the transport. Only messages addressed to the
//      primary local player (the lowest one hosted here) are decoded, so a
//      machine hosting several players schedules each remote batch once. A
//      `Disconnected` event schedules a `StepSync` at `FOREVER` for that
//      player, which releases the step gate from waiting on them.
//   2. **Input.** Poll every local input once. Actions are stamped
//      `now + offset`, scheduled locally and queued for broadcast. Decision
//      functions become local commands due now; they never leave the
//      machine.
//   3. **Advance.** Run the scheduler for `elapsed` ms. Each `StepEnded`
//      becomes a `StepSync` from every local player, stamped
//      `step_start + offset`; each `Decision` is issued like a player action.
//      Because a local player's own sync is only issued after its step ends,
//      the scheduler can stall on a local player mid-update; the coordinator
//      then resumes it with the remaining budget, so a stall left standing
//      is only ever on players whose syncs have not been issued.
//
//      The very first sync is the `StartSync` sent by `start()`, stamped
//      `step_start + offset - step_duration` as if for a step before the
//      first.
//   4. **Flush.** Encode the outbox once and send it from the primary to every
//      roster player that is neither local nor departed.
//
// Sync errors, undecodable payloads and transport failures come back as
// `CoordinatorError`. A bad payload or failed send does not cut the phase
// short: the rest of the inbox (including disconnects) is still handled and
// the batch still goes to the other peers, then the first error is
// returned. After a sync error the scheduler is halted and every later tick
// reports `StepStatus::Halted` without touching the network.
//
// See also: `scheduler.rs` (the lockstep rules), `wire.rs` (batch codec),
// `ai.rs` (an `InputSource`), `skirmish_protocol::transport`.

use skirmish_protocol::{PeerId, Transport, TransportError, TransportEvent};
use tracing::{debug, info, warn};

use crate::command::{Action, Command, DecisionFn, LocalCommand, SyncStamp};
use crate::event::{SimEvent, SimEventKind};
use crate::scheduler::{SchedulerEvent, StepScheduler, StepStatus, SyncError};
use crate::sim::Match;
use crate::types::{FOREVER, PerPlayer, PlayerId, SimTime};
use crate::wire::{WireError, decode_batch, encode_batch};

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("the transport hosts no players")]
    NoLocalPlayers,
    #[error("{0} does not map to a player in this match")]
    NotInRoster(PeerId),
    #[error("input source for {0}, who is not hosted on this machine")]
    ForeignInput(PlayerId),
}

/// What an input source wants to do this tick.
#[derive(Clone, Copy, Debug)]
pub enum Intent {
    /// A player action, stamped `now + offset`.
    Act(Action),
    /// A command with a caller-chosen time. The issuing player is always the
    /// source's own.
    Stamped(Command),
    /// Decide against the state as of the next update.
    Decide(DecisionFn),
}

/// A local producer of player intent: a human's input device, a replay, an
/// AI. Polled once per tick.
pub trait InputSource {
    fn player(&self) -> PlayerId;

    fn update(&mut self, elapsed: SimTime) -> Option<Intent>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TickReport {
    /// Simulation events produced during this tick.
    pub events: Vec<SimEvent>,
    pub steps_ended: u32,
    pub status: StepStatus,
    pub blocked_on: Vec<PlayerId>,
    /// Simulated time after the tick.
    pub time: SimTime,
    /// Commands discarded as illegal.
    pub rejected: u32,
}

fn peer_of(player: PlayerId) -> PeerId {
    PeerId(player.raw())
}

pub struct Coordinator<T: Transport> {
    scheduler: StepScheduler,
    transport: T,
    inputs: Vec<Box<dyn InputSource>>,
    local: PerPlayer<bool>,
    departed: PerPlayer<bool>,
    primary: PlayerId,
    outbox: Vec<Command>,
    started: bool,
}

impl<T: Transport> Coordinator<T> {
    /// Seat the players hosted by `transport` in `state`. Every local peer
    /// must be a roster player and every input must belong to one of them.
    pub fn new(state: Match, transport: T, inputs: Vec<Box<dyn InputSource>>) -> Result<Self, CoordinatorError> {
        let roster = state.roster();
        let mut local = PerPlayer::<bool>::default();
        for &peer in transport.local_peers() {
            match PlayerId::new(peer.0) {
                Some(player) if roster.contains(&player) => local[player] = true,
                _ => return Err(CoordinatorError::NotInRoster(peer)),
            }
        }
        let primary = roster
            .iter()
            .copied()
            .find(|&p| local[p])
            .ok_or(CoordinatorError::NoLocalPlayers)?;
        if let Some(input) = inputs.iter().find(|input| !local[input.player()]) {
            return Err(CoordinatorError::ForeignInput(input.player()));
        }

        Ok(Self {
            scheduler: StepScheduler::new(state),
            transport,
            inputs,
            local,
            departed: PerPlayer::default(),
            primary,
            outbox: Vec::new(),
            started: false,
        })
    }

    pub fn scheduler(&self) -> &StepScheduler {
        &self.scheduler
    }

    pub fn state(&self) -> &Match {
        self.scheduler.state()
    }

    pub fn now(&self) -> SimTime {
        self.scheduler.now()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// The local player that receives and sends on behalf of this machine.
    pub fn primary(&self) -> PlayerId {
        self.primary
    }

    pub fn local_players(&self) -> Vec<PlayerId> {
        self.scheduler
            .roster()
            .iter()
            .copied()
            .filter(|&p| self.local[p])
            .collect()
    }

    pub fn has_departed(&self, player: PlayerId) -> bool {
        self.departed[player]
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Announce readiness: a `StartSync` carrying the pre-game digest from
    /// every local player. Called by the first `tick` if not called earlier.
    ///
    /// The start sync stands in for the step before the first one, so it is
    /// stamped one step earlier than the first `StepSync` will be. Inputs
    /// polled at `t = 0` are stamped `offset`, which must stay beyond what
    /// the start sync lets a peer run to.
    pub fn start(&mut self) -> Result<(), CoordinatorError> {
        if self.started {
            return Ok(());
        }
        self.started = true;
        let stamp = SyncStamp {
            hash: self.scheduler.state().state_hash(),
            hash_time: self.scheduler.now(),
        };
        let lead = self.scheduler.scheduling_offset() - self.scheduler.step_duration();
        let time = self.scheduler.step_start() + lead;
        for player in self.local_players() {
            self.issue(Command {
                time,
                player,
                action: Action::StartSync(stamp),
            })?;
        }
        info!(local = ?self.local_players(), hash = stamp.hash, "match start announced");
        self.flush()
    }

    pub fn tick(&mut self, elapsed: SimTime) -> Result<TickReport, CoordinatorError> {
        self.start()?;
        if self.scheduler.is_halted() {
            return Ok(TickReport {
                events: self.drain_sim_events(),
                steps_ended: 0,
                status: StepStatus::Halted,
                blocked_on: Vec::new(),
                time: self.scheduler.now(),
                rejected: 0,
            });
        }

        self.receive()?;
        self.poll_inputs(elapsed)?;
        let mut report = self.advance(elapsed)?;
        self.flush()?;
        report.events = self.drain_sim_events();
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Tick phases
    // -----------------------------------------------------------------------

    /// Handles every polled event even after a failure; the first error is
    /// returned once the inbox is drained.
    fn receive(&mut self) -> Result<(), CoordinatorError> {
        let primary = peer_of(self.primary);
        let mut first_error = None;
        for event in self.transport.poll() {
            let handled = match event {
                TransportEvent::Message { from, to, payload } => {
                    if to != primary {
                        continue;
                    }
                    self.schedule_batch(from, &payload)
                }
                TransportEvent::Disconnected { peer } => self.depart(peer),
            };
            if let Err(err) = handled {
                first_error = first_error.or(Some(err));
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn schedule_batch(&mut self, from: PeerId, payload: &[u8]) -> Result<(), CoordinatorError> {
        let commands = decode_batch(payload).inspect_err(|err| {
            warn!(%from, %err, bytes = payload.len(), "undecodable batch");
        })?;
        for command in commands {
            self.scheduler.schedule_command(command)?;
        }
        Ok(())
    }

    fn depart(&mut self, peer: PeerId) -> Result<(), CoordinatorError> {
        let Some(player) = PlayerId::new(peer.0).filter(|p| self.scheduler.roster().contains(p)) else {
            debug!(%peer, "disconnect from a peer outside the match");
            return Ok(());
        };
        if self.local[player] || self.departed[player] {
            return Ok(());
        }
        self.departed[player] = true;
        info!(%player, "peer disconnected");
        self.scheduler.schedule_command(Command {
            time: FOREVER,
            player,
            action: Action::StepSync(SyncStamp {
                hash: 0,
                hash_time: FOREVER,
            }),
        })?;
        Ok(())
    }

    fn poll_inputs(&mut self, elapsed: SimTime) -> Result<(), CoordinatorError> {
        let intents: Vec<(PlayerId, Intent)> = self
            .inputs
            .iter_mut()
            .filter_map(|input| {
                let player = input.player();
                input.update(elapsed).map(|intent| (player, intent))
            })
            .collect();

        let now = self.scheduler.now();
        for (player, intent) in intents {
            match intent {
                Intent::Act(action) => self.act(player, action)?,
                Intent::Stamped(command) => {
                    let command = Command { player, ..command };
                    if command.action.is_sync() || command.time <= now {
                        warn!(?command, now, "dropping unusable stamped command");
                        continue;
                    }
                    self.issue(command)?;
                }
                Intent::Decide(decide) => self.scheduler.schedule_local(LocalCommand {
                    time: now,
                    player,
                    decide,
                }),
            }
        }
        Ok(())
    }

    /// Stamp a player action `now + offset` and issue it.
    fn act(&mut self, player: PlayerId, action: Action) -> Result<(), CoordinatorError> {
        if action.is_sync() {
            warn!(%player, ?action, "inputs may not issue synchronization actions");
            return Ok(());
        }
        let time = self.scheduler.now() + self.scheduler.scheduling_offset();
        self.issue(Command { time, player, action })
    }

    /// Schedule locally and queue for every remote peer.
    fn issue(&mut self, command: Command) -> Result<(), CoordinatorError> {
        self.scheduler.schedule_command(command)?;
        self.outbox.push(command);
        Ok(())
    }

    fn advance(&mut self, elapsed: SimTime) -> Result<TickReport, CoordinatorError> {
        let target = self.scheduler.now().saturating_add(elapsed.max(0));
        let mut budget = elapsed;
        let mut steps_ended = 0;
        let mut rejected = 0;
        loop {
            let step = self.scheduler.update(budget);
            steps_ended += step.steps_ended;
            rejected += step.rejected;
            let synced = self.handle_scheduler_events()?;

            let self_blocked = step.blocked_on.iter().any(|&p| self.local[p]);
            if step.status == StepStatus::Stalled && self_blocked && synced {
                budget = target - self.scheduler.now();
                continue;
            }
            return Ok(TickReport {
                events: Vec::new(),
                steps_ended,
                status: step.status,
                blocked_on: step.blocked_on,
                time: step.time,
                rejected,
            });
        }
    }

    /// Returns whether any step syncs were issued.
    fn handle_scheduler_events(&mut self) -> Result<bool, CoordinatorError> {
        let mut synced = false;
        for event in self.scheduler.take_events() {
            match event {
                SchedulerEvent::StepEnded {
                    step_start,
                    hash,
                    hash_time,
                } => {
                    let time = step_start + self.scheduler.scheduling_offset();
                    for player in self.local_players() {
                        self.issue(Command {
                            time,
                            player,
                            action: Action::StepSync(SyncStamp { hash, hash_time }),
                        })?;
                    }
                    synced = true;
                }
                SchedulerEvent::Decision { player, action } => self.act(player, action)?,
            }
        }
        Ok(synced)
    }

    /// Sends to every remote peer even if one send fails; the first failure
    /// is returned afterwards.
    fn flush(&mut self) -> Result<(), CoordinatorError> {
        if self.outbox.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(&mut self.outbox);
        let payload = encode_batch(&batch)?;

        let from = peer_of(self.primary);
        let remotes: Vec<PlayerId> = self
            .scheduler
            .roster()
            .iter()
            .copied()
            .filter(|&p| !self.local[p] && !self.departed[p])
            .collect();
        let mut first_error = None;
        for player in remotes {
            match self.transport.send(from, peer_of(player), payload.clone()) {
                Ok(()) => {}
                Err(TransportError::Disconnected(peer)) => {
                    debug!(%peer, "batch not delivered; peer is gone");
                }
                Err(err) => {
                    warn!(%player, %err, "batch not sent");
                    first_error = first_error.or(Some(CoordinatorError::from(err)));
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn drain_sim_events(&mut self) -> Vec<SimEvent> {
        let events = self.scheduler.take_sim_events();
        for event in &events {
            match event.kind {
                SimEventKind::PlayerEliminated { player, by } => {
                    info!(time = event.time, %player, %by, "player eliminated");
                }
                SimEventKind::MatchEnded { winner } => {
                    info!(time = event.time, %winner, "match ended");
                }
                _ => {}
            }
        }
        events
    }
}
