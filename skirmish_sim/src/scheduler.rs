// Step scheduler: lockstep time control for one peer.
//
// The scheduler owns the match and the queue of pending commands. It moves
// simulated time forward, executing each command exactly at its time, but
// never lets time cross a step boundary until every player has promised (by a
// synchronization command) that they will send nothing earlier than it.
//
// ## Steps and readiness
//
// Time is cut into steps of `step_duration_ms`. Each player has a
// ready-until time: the `time` of the latest sync command received from
// them. Because every command a player issues is stamped `now + offset` on
// their own clock, and their sync for a finished step is stamped
// `step_start + offset`, nothing they send later can be earlier than their
// ready-until. Crossing boundary `E` is therefore safe once
// `E <= min(ready_until)`.
//
// Crossing a boundary runs the match to `E - 1`, checks the gate, samples
// the state digest and emits `SchedulerEvent::StepEnded` for the step that
// just finished. The coordinator turns that into this peer's own sync
// commands. If the gate is closed the update stops at `E - 1`, reports the
// blocking players, and the rest of the elapsed time is dropped.
//
// ## Digests
//
// Every sync carries `(hash, hash_time)`. The first report for a hash time
// is recorded; later reports must match it. A tally is forgotten once every
// still-connected roster player has confirmed it; confirmations from players
// who later departed do not count. A mismatch (or any other
// `SyncError`) halts the scheduler for good: the peers have diverged and
// nothing after that point can be trusted.
//
// ## Departures
//
// A sync stamped `FOREVER` marks a player gone. Their ready-until becomes
// infinite, so they never block again, and they stop counting toward digest
// confirmations.
//
// See also: `coordinator.rs` (feeds commands in, ships sync commands out),
// `queue.rs`, `command.rs`, `sim.rs`.
//
// **Critical constraint: determinism.** Commands execute in `Ord` order at
// exactly their stamped time. Digest tallies live in a `BTreeMap`.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use tracing::{debug, error, info, trace};

use crate::command::{Action, Command, LocalCommand, SyncStamp};
use crate::queue::CommandQueue;
use crate::sim::Match;
use crate::types::{FOREVER, PerPlayer, PlayerId, SimTime};

// ---------------------------------------------------------------------------
// Errors, events, reports
// ---------------------------------------------------------------------------

/// The peers have diverged or broken the protocol. Fatal.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error("digest mismatch at t={hash_time}: recorded {recorded:#018x}, {player} reported {reported:#018x}")]
    DigestMismatch {
        player: PlayerId,
        hash_time: SimTime,
        recorded: u64,
        reported: u64,
    },
    #[error("{player} synced for t={time}, more than {limit} ms ahead of local t={now}")]
    TooFarAhead {
        player: PlayerId,
        time: SimTime,
        now: SimTime,
        limit: SimTime,
    },
    #[error("{player}'s command for t={time} arrived after local time reached t={now}")]
    LateCommand {
        player: PlayerId,
        time: SimTime,
        now: SimTime,
    },
    #[error("command from {0}, who is not in this match")]
    UnknownPlayer(PlayerId),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// The step starting at `step_start` finished; `hash` was sampled at
    /// `hash_time`, the last millisecond of that step.
    StepEnded {
        step_start: SimTime,
        hash: u64,
        hash_time: SimTime,
    },
    /// A local decision produced an action for `player` to issue.
    Decision { player: PlayerId, action: Action },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepStatus {
    /// Reached the requested time.
    Advanced,
    /// Waiting at a step boundary for other players' input.
    Stalled,
    /// Stopped for good after a `SyncError`.
    Halted,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepReport {
    pub status: StepStatus,
    /// Simulated time after the update.
    pub time: SimTime,
    /// Time the update was aiming for.
    pub target: SimTime,
    pub executed: u32,
    pub rejected: u32,
    pub steps_ended: u32,
    pub blocked_on: Vec<PlayerId>,
}

// ---------------------------------------------------------------------------
// Queue entries
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug)]
enum Pending {
    Wire(Command),
    Local(LocalCommand),
}

impl Pending {
    fn time(&self) -> SimTime {
        match self {
            Pending::Wire(c) => c.time,
            Pending::Local(c) => c.time,
        }
    }

    fn player(&self) -> PlayerId {
        match self {
            Pending::Wire(c) => c.player,
            Pending::Local(c) => c.player,
        }
    }
}

/// `(time, player)`, then wire commands before local decisions. Local
/// decisions never reach other peers, so their relative order only has to
/// be stable on this machine.
impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.time(), self.player())
            .cmp(&(other.time(), other.player()))
            .then_with(|| match (self, other) {
                (Pending::Wire(a), Pending::Wire(b)) => a.action.cmp(&b.action),
                (Pending::Wire(_), Pending::Local(_)) => Ordering::Less,
                (Pending::Local(_), Pending::Wire(_)) => Ordering::Greater,
                (Pending::Local(_), Pending::Local(_)) => Ordering::Equal,
            })
    }
}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Pending {}

#[derive(Clone, Debug, PartialEq, Eq)]
struct DigestTally {
    hash: u64,
    confirmed: PerPlayer<bool>,
}

impl DigestTally {
    /// Confirmations from players who have not departed.
    fn live_confirmations(&self, ready_until: &PerPlayer<SimTime>) -> usize {
        self.confirmed
            .iter()
            .filter(|&(player, &confirmed)| confirmed && ready_until[player] != FOREVER)
            .count()
    }
}

// ---------------------------------------------------------------------------
// StepScheduler
// ---------------------------------------------------------------------------

pub struct StepScheduler {
    state: Match,
    queue: CommandQueue<Pending>,
    roster: Vec<PlayerId>,
    step_start: SimTime,
    ready_until: PerPlayer<SimTime>,
    digests: BTreeMap<SimTime, DigestTally>,
    blocked_on: Vec<PlayerId>,
    events: Vec<SchedulerEvent>,
    halted: bool,
}

impl StepScheduler {
    pub fn new(state: Match) -> Self {
        let step_start = state.time();
        let roster = state.roster();
        Self {
            state,
            queue: CommandQueue::new(),
            roster,
            step_start,
            ready_until: PerPlayer::from_fn(|_| step_start),
            digests: BTreeMap::new(),
            blocked_on: Vec::new(),
            events: Vec::new(),
            halted: false,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn state(&self) -> &Match {
        &self.state
    }

    pub fn now(&self) -> SimTime {
        self.state.time()
    }

    pub fn step_start(&self) -> SimTime {
        self.step_start
    }

    pub fn step_duration(&self) -> SimTime {
        self.state.config().step_duration_ms
    }

    pub fn scheduling_offset(&self) -> SimTime {
        self.state.config().scheduling_offset_ms
    }

    pub fn roster(&self) -> &[PlayerId] {
        &self.roster
    }

    pub fn ready_until(&self, player: PlayerId) -> SimTime {
        self.ready_until[player]
    }

    /// Players holding up the last stalled boundary.
    pub fn blocked_on(&self) -> &[PlayerId] {
        &self.blocked_on
    }

    /// Queued wire commands in execution order.
    pub fn pending_commands(&self) -> impl Iterator<Item = &Command> {
        self.queue.iter().filter_map(|p| match p {
            Pending::Wire(c) => Some(c),
            Pending::Local(_) => None,
        })
    }

    /// Outstanding digest tallies as `(hash_time, hash, confirmations)`.
    pub fn pending_digests(&self) -> impl Iterator<Item = (SimTime, u64, usize)> + '_ {
        self.digests
            .iter()
            .map(|(&t, tally)| (t, tally.hash, tally.confirmed.values().filter(|&&c| c).count()))
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn take_events(&mut self) -> Vec<SchedulerEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn take_sim_events(&mut self) -> Vec<crate::event::SimEvent> {
        self.state.take_events()
    }

    // -----------------------------------------------------------------------
    // Scheduling
    // -----------------------------------------------------------------------

    /// Accept a command from any player, local or remote. After the first
    /// error the scheduler is halted and further commands are ignored.
    pub fn schedule_command(&mut self, command: Command) -> Result<(), SyncError> {
        if self.halted {
            debug!(?command, "scheduler halted; ignoring command");
            return Ok(());
        }
        let result = self.admit(command);
        if let Err(err) = &result {
            error!(%err, "peers out of sync; halting");
            self.halted = true;
        }
        result
    }

    /// Queue a local decision. One already due runs on the next update.
    pub fn schedule_local(&mut self, command: LocalCommand) {
        if self.halted {
            return;
        }
        let time = command.time.max(self.now());
        self.queue.add(Pending::Local(LocalCommand { time, ..command }));
    }

    fn admit(&mut self, command: Command) -> Result<(), SyncError> {
        if !self.roster.contains(&command.player) {
            return Err(SyncError::UnknownPlayer(command.player));
        }
        if let Some(stamp) = command.action.sync_stamp() {
            return self.admit_sync(command.player, command.time, stamp);
        }
        let now = self.now();
        if command.time <= now {
            return Err(SyncError::LateCommand {
                player: command.player,
                time: command.time,
                now,
            });
        }
        self.queue.add(Pending::Wire(command));
        Ok(())
    }

    fn admit_sync(&mut self, player: PlayerId, time: SimTime, stamp: SyncStamp) -> Result<(), SyncError> {
        if time == FOREVER {
            if self.ready_until[player] != FOREVER {
                info!(%player, "player departed; no longer waiting on them");
            }
            self.ready_until[player] = FOREVER;
            let connected = self.connected_count();
            let ready_until = &self.ready_until;
            self.digests
                .retain(|_, tally| tally.live_confirmations(ready_until) < connected);
            return Ok(());
        }

        let now = self.now();
        let limit = self.scheduling_offset() + self.step_duration();
        if time.saturating_sub(now) > limit {
            return Err(SyncError::TooFarAhead {
                player,
                time,
                now,
                limit,
            });
        }
        self.record_digest(player, stamp)?;
        let ready = &mut self.ready_until[player];
        *ready = (*ready).max(time);
        Ok(())
    }

    fn record_digest(&mut self, player: PlayerId, stamp: SyncStamp) -> Result<(), SyncError> {
        let connected = self.connected_count();
        let ready_until = &self.ready_until;
        match self.digests.entry(stamp.hash_time) {
            Entry::Occupied(mut entry) => {
                let tally = entry.get_mut();
                if tally.hash != stamp.hash {
                    return Err(SyncError::DigestMismatch {
                        player,
                        hash_time: stamp.hash_time,
                        recorded: tally.hash,
                        reported: stamp.hash,
                    });
                }
                tally.confirmed[player] = true;
                if tally.live_confirmations(ready_until) >= connected {
                    entry.remove();
                }
            }
            Entry::Vacant(entry) => {
                if connected > 1 {
                    let mut confirmed = PerPlayer::default();
                    confirmed[player] = true;
                    entry.insert(DigestTally {
                        hash: stamp.hash,
                        confirmed,
                    });
                }
            }
        }
        Ok(())
    }

    fn connected_count(&self) -> usize {
        self.roster
            .iter()
            .filter(|&&p| self.ready_until[p] != FOREVER)
            .count()
    }

    // -----------------------------------------------------------------------
    // Advancing time
    // -----------------------------------------------------------------------

    /// Advance by up to `elapsed` ms, executing every command that falls due.
    pub fn update(&mut self, elapsed: SimTime) -> StepReport {
        let start = self.now();
        let target = start.saturating_add(elapsed.max(0));
        let mut report = StepReport {
            status: StepStatus::Advanced,
            time: start,
            target,
            executed: 0,
            rejected: 0,
            steps_ended: 0,
            blocked_on: Vec::new(),
        };
        if self.halted {
            report.status = StepStatus::Halted;
            return report;
        }
        self.blocked_on.clear();
        let events_before = self.events.len();

        let mut reached = true;
        while !self.queue.is_empty() && self.queue.peek().time() <= target {
            let due = self.queue.peek().time();
            if !self.advance_to(due) {
                reached = false;
                break;
            }
            match self.queue.pop() {
                Pending::Wire(command) => match command.execute(&mut self.state) {
                    Ok(()) => report.executed += 1,
                    Err(err) => {
                        debug!(%err, "discarding command");
                        report.rejected += 1;
                    }
                },
                Pending::Local(local) => {
                    if let Some(action) = (local.decide)(&self.state, local.player) {
                        self.events.push(SchedulerEvent::Decision {
                            player: local.player,
                            action,
                        });
                    }
                }
            }
        }
        if reached {
            reached = self.advance_to(target);
        }

        report.time = self.now();
        report.steps_ended = self.events[events_before..]
            .iter()
            .filter(|e| matches!(e, SchedulerEvent::StepEnded { .. }))
            .count() as u32;
        if !reached {
            report.status = StepStatus::Stalled;
            report.blocked_on = self.blocked_on.clone();
        }
        report
    }

    /// Run the match up to `time`, crossing step boundaries while the gate
    /// allows. Returns false if stopped short at a boundary.
    fn advance_to(&mut self, time: SimTime) -> bool {
        let step = self.step_duration();
        loop {
            let now = self.now();
            let boundary = self.step_start + step;
            if time < boundary {
                self.state.update(time - now);
                return true;
            }
            self.state.update(boundary - 1 - now);

            let gate = self
                .roster
                .iter()
                .map(|&p| self.ready_until[p])
                .min()
                .unwrap_or(FOREVER);
            if boundary > gate {
                self.blocked_on = self
                    .roster
                    .iter()
                    .copied()
                    .filter(|&p| self.ready_until[p] < boundary)
                    .collect();
                debug!(boundary, blocked_on = ?self.blocked_on, "stalled at step boundary");
                return false;
            }

            let hash = self.state.state_hash();
            let hash_time = self.now();
            trace!(step_start = self.step_start, hash, "step ended");
            self.events.push(SchedulerEvent::StepEnded {
                step_start: self.step_start,
                hash,
                hash_time,
            });
            self.step_start = boundary;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    fn sync(time: SimTime, player: PlayerId, hash: u64, hash_time: SimTime) -> Command {
        Command {
            time,
            player,
            action: Action::StepSync(SyncStamp { hash, hash_time }),
        }
    }

    fn place(time: SimTime, player: PlayerId, row: i16, col: i16) -> Command {
        Command {
            time,
            player,
            action: Action::Place { at: loc(row, col) },
        }
    }

    fn step_ends(events: &[SchedulerEvent]) -> Vec<(SimTime, SimTime)> {
        events
            .iter()
            .filter_map(|e| match *e {
                SchedulerEvent::StepEnded {
                    step_start,
                    hash_time,
                    ..
                } => Some((step_start, hash_time)),
                SchedulerEvent::Decision { .. } => None,
            })
            .collect()
    }

    /// Both corridor players promise input up to `until`.
    fn released(until: SimTime) -> StepScheduler {
        let mut scheduler = StepScheduler::new(corridor_match(0));
        let hash = scheduler.state().state_hash();
        scheduler.schedule_command(sync(until, P0, hash, 0)).unwrap();
        scheduler.schedule_command(sync(until, P1, hash, 0)).unwrap();
        scheduler
    }

    #[test]
    fn time_stops_at_the_first_boundary_without_everyones_sync() {
        let mut scheduler = StepScheduler::new(corridor_match(0));
        let hash = scheduler.state().state_hash();
        scheduler.schedule_command(sync(200, P0, hash, 0)).unwrap();

        let report = scheduler.update(500);
        assert_eq!(report.status, StepStatus::Stalled);
        assert_eq!(report.time, 99);
        assert_eq!(report.blocked_on, vec![P1]);
        assert_eq!(scheduler.blocked_on(), &[P1]);
        assert!(scheduler.take_events().is_empty());

        // Stalled time is not banked.
        assert_eq!(scheduler.update(500).time, 99);

        scheduler.schedule_command(sync(200, P1, hash, 0)).unwrap();
        let report = scheduler.update(50);
        assert_eq!(report.status, StepStatus::Advanced);
        assert_eq!(report.time, 149);
        assert_eq!(report.steps_ended, 1);
        assert_eq!(step_ends(&scheduler.take_events()), vec![(0, 99)]);
        assert_eq!(scheduler.step_start(), 100);
    }

    #[test]
    fn one_update_can_cross_several_boundaries() {
        let mut scheduler = released(300);
        let report = scheduler.update(450);
        // Boundary 400 is past everyone's promise.
        assert_eq!(report.status, StepStatus::Stalled);
        assert_eq!(report.time, 399);
        assert_eq!(
            step_ends(&scheduler.take_events()),
            vec![(0, 99), (100, 199), (200, 299)]
        );
    }

    #[test]
    fn step_digest_is_sampled_on_the_last_millisecond() {
        let mut scheduler = released(200);
        scheduler.update(150);
        let mut probe = corridor_match(0);
        probe.update(99);
        let events = scheduler.take_events();
        assert_eq!(
            events[0],
            SchedulerEvent::StepEnded {
                step_start: 0,
                hash: probe.state_hash(),
                hash_time: 99
            }
        );
    }

    #[test]
    fn commands_execute_at_their_stamped_time() {
        let mut scheduler = released(300);
        scheduler.schedule_command(place(150, P0, 0, 0)).unwrap();
        scheduler.schedule_command(place(120, P1, 0, 3)).unwrap();

        let report = scheduler.update(140);
        assert_eq!(report.executed, 1);
        assert_eq!(scheduler.pending_commands().count(), 1);

        let report = scheduler.update(100);
        assert_eq!(report.executed, 1);
        let placements: Vec<(SimTime, PlayerId)> = scheduler
            .take_sim_events()
            .into_iter()
            .filter_map(|e| match e.kind {
                crate::event::SimEventKind::PiecePlaced { player, .. } => Some((e.time, player)),
                _ => None,
            })
            .collect();
        assert_eq!(placements, vec![(120, P1), (150, P0)]);
    }

    #[test]
    fn illegal_commands_are_discarded_not_fatal() {
        let mut scheduler = released(300);
        let into_unowned = Command {
            time: 50,
            player: P0,
            action: Action::Move {
                from: loc(0, 0),
                to: loc(0, 1),
            },
        };
        scheduler.schedule_command(into_unowned).unwrap();
        let report = scheduler.update(100);
        assert_eq!(report.rejected, 1);
        assert_eq!(report.status, StepStatus::Advanced);
        assert!(!scheduler.is_halted());
    }

    #[test]
    fn late_commands_halt_the_scheduler() {
        let mut scheduler = released(300);
        scheduler.update(150);
        let late = place(150, P1, 0, 3);
        assert_eq!(
            scheduler.schedule_command(late),
            Err(SyncError::LateCommand {
                player: P1,
                time: 150,
                now: 150
            })
        );
        assert!(scheduler.is_halted());
        assert_eq!(scheduler.update(100).status, StepStatus::Halted);
        assert_eq!(scheduler.now(), 150);
        // Already halted: no second error.
        assert_eq!(scheduler.schedule_command(place(400, P1, 0, 3)), Ok(()));
    }

    #[test]
    fn syncs_too_far_ahead_are_rejected() {
        let mut scheduler = StepScheduler::new(corridor_match(0));
        scheduler.schedule_command(sync(300, P0, 1, 0)).unwrap();
        assert_eq!(
            scheduler.schedule_command(sync(301, P1, 1, 0)),
            Err(SyncError::TooFarAhead {
                player: P1,
                time: 301,
                now: 0,
                limit: 300
            })
        );
    }

    #[test]
    fn commands_from_outside_the_roster_are_rejected() {
        let mut scheduler = StepScheduler::new(corridor_match(0));
        assert_eq!(
            scheduler.schedule_command(place(10, P2, 0, 0)),
            Err(SyncError::UnknownPlayer(P2))
        );
    }

    #[test]
    fn departed_players_never_block() {
        let mut scheduler = StepScheduler::new(corridor_match(0));
        scheduler.schedule_command(sync(200, P0, 7, 0)).unwrap();
        scheduler.schedule_command(sync(FOREVER, P1, 0, FOREVER)).unwrap();
        assert_eq!(scheduler.ready_until(P1), FOREVER);
        assert_eq!(scheduler.pending_digests().count(), 0);

        let report = scheduler.update(350);
        assert_eq!(report.time, 299, "still gated by P0's own promise");
        assert_eq!(report.blocked_on, vec![P0]);
    }

    #[test]
    fn tallies_clear_once_every_connected_player_confirms() {
        let mut scheduler = StepScheduler::new(corridor_match(0));
        scheduler.schedule_command(sync(200, P0, 42, 0)).unwrap();
        assert_eq!(scheduler.pending_digests().collect::<Vec<_>>(), vec![(0, 42, 1)]);
        scheduler.schedule_command(sync(200, P1, 42, 0)).unwrap();
        assert_eq!(scheduler.pending_digests().count(), 0);
    }

    #[test]
    fn a_departure_keeps_tallies_the_remaining_players_have_not_confirmed() {
        let mut scheduler = StepScheduler::new(grid_match(&[P0, P1, P2], 5));
        scheduler.schedule_command(sync(200, P0, 0xA, 0)).unwrap();
        scheduler.schedule_command(sync(200, P1, 0xA, 0)).unwrap();
        scheduler.schedule_command(sync(FOREVER, P1, 0, FOREVER)).unwrap();
        // P1's confirmation no longer counts; P2 still owes one.
        assert_eq!(scheduler.pending_digests().collect::<Vec<_>>(), vec![(0, 0xA, 2)]);

        assert_eq!(
            scheduler.schedule_command(sync(200, P2, 0xB, 0)),
            Err(SyncError::DigestMismatch {
                player: P2,
                hash_time: 0,
                recorded: 0xA,
                reported: 0xB
            })
        );
        assert!(scheduler.is_halted());
    }

    #[test]
    fn a_departed_players_confirmation_does_not_close_a_tally() {
        let mut scheduler = StepScheduler::new(grid_match(&[P0, P1, P2], 5));
        scheduler.schedule_command(sync(200, P1, 0xA, 0)).unwrap();
        scheduler.schedule_command(sync(FOREVER, P1, 0, FOREVER)).unwrap();
        scheduler.schedule_command(sync(200, P0, 0xA, 0)).unwrap();
        assert_eq!(scheduler.pending_digests().collect::<Vec<_>>(), vec![(0, 0xA, 2)]);

        scheduler.schedule_command(sync(200, P2, 0xA, 0)).unwrap();
        assert_eq!(scheduler.pending_digests().count(), 0);
    }

    #[test]
    fn a_mismatch_is_reported_once_and_leaves_other_tallies_alone() {
        let mut scheduler = StepScheduler::new(grid_match(&[P0, P1, P2], 5));
        scheduler.schedule_command(sync(200, P0, 0xA, 0)).unwrap();
        scheduler.schedule_command(sync(300, P0, 0xB, 99)).unwrap();
        scheduler.schedule_command(sync(200, P1, 0xA, 0)).unwrap();
        let before: Vec<_> = scheduler.pending_digests().collect();
        assert_eq!(before, vec![(0, 0xA, 2), (99, 0xB, 1)]);

        assert_eq!(
            scheduler.schedule_command(sync(300, P1, 0xC, 99)),
            Err(SyncError::DigestMismatch {
                player: P1,
                hash_time: 99,
                recorded: 0xB,
                reported: 0xC
            })
        );
        assert_eq!(scheduler.pending_digests().collect::<Vec<_>>(), before);
        assert_eq!(scheduler.schedule_command(sync(300, P2, 0xD, 99)), Ok(()));
        assert_eq!(scheduler.update(50).status, StepStatus::Halted);
    }

    fn place_on_home(state: &Match, player: PlayerId) -> Option<Action> {
        state
            .graph()
            .iter()
            .find(|(id, t)| t.owner == Some(player) && state.can_place(player, *id))
            .map(|(_, t)| Action::Place { at: t.location })
    }

    #[test]
    fn local_decisions_surface_as_events() {
        let mut scheduler = released(300);
        scheduler.schedule_local(LocalCommand {
            time: 40,
            player: P1,
            decide: place_on_home,
        });
        assert_eq!(scheduler.pending_commands().count(), 0);

        scheduler.update(60);
        assert_eq!(
            scheduler.take_events(),
            vec![SchedulerEvent::Decision {
                player: P1,
                action: Action::Place { at: loc(0, 3) }
            }]
        );
    }

    #[test]
    fn overdue_local_decisions_run_on_the_next_update() {
        let mut scheduler = released(300);
        scheduler.update(60);
        scheduler.schedule_local(LocalCommand {
            time: 0,
            player: P0,
            decide: place_on_home,
        });
        scheduler.update(0);
        assert_eq!(scheduler.take_events().len(), 1);
    }
}
