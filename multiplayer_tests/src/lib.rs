// Test-only machines for multiplayer integration tests.
//
// A `TestMachine` is one player's computer: a real `Coordinator` over a
// real `LoopbackEndpoint`, fed by scripted inputs (or any other
// `InputSource`, such as the AI). Several machines share one `LoopbackHub`
// and are ticked in turn from a single test thread, which exercises the
// full pipeline:
// input -> stamp -> local scheduler + wire batch -> remote decode ->
// remote scheduler -> step gate -> digest exchange -> identical state.
//
// The only test-specific code is the scripting and the frame loops here.
// Everything else runs the same code paths as a live session.
//
// See also: `tests/full_pipeline.rs` for the scenarios.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

use skirmish_protocol::{LoopbackEndpoint, LoopbackHub, PeerId};
use skirmish_sim::command::Action;
use skirmish_sim::coordinator::{Coordinator, CoordinatorError, InputSource, Intent, TickReport};
use skirmish_sim::event::SimEvent;
use skirmish_sim::sim::Match;
use skirmish_sim::types::{PlayerId, SimTime};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Upper bound on frames for the convergence helpers.
const MAX_FRAMES: usize = 10_000;

/// Route `tracing` output through the test harness. Honors `RUST_LOG`.
/// Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ---------------------------------------------------------------------------
// Scripted input
// ---------------------------------------------------------------------------

type Script = Rc<RefCell<VecDeque<Intent>>>;

/// An input source that replays intents pushed by the test, one per tick.
pub struct ScriptedInput {
    player: PlayerId,
    script: Script,
}

impl InputSource for ScriptedInput {
    fn player(&self) -> PlayerId {
        self.player
    }

    fn update(&mut self, _elapsed: SimTime) -> Option<Intent> {
        self.script.borrow_mut().pop_front()
    }
}

// ---------------------------------------------------------------------------
// TestMachine
// ---------------------------------------------------------------------------

pub struct TestMachine {
    pub name: &'static str,
    coordinator: Coordinator<LoopbackEndpoint>,
    scripts: BTreeMap<PlayerId, Script>,
    /// Every simulation event seen so far.
    pub events: Vec<SimEvent>,
    /// Commands discarded as illegal so far.
    pub rejected: u32,
    pub last_report: Option<TickReport>,
}

impl TestMachine {
    /// A machine hosting `players`, each driven by a script.
    pub fn scripted(name: &'static str, hub: &LoopbackHub, state: Match, players: &[PlayerId]) -> Self {
        let mut scripts = BTreeMap::new();
        let mut inputs: Vec<Box<dyn InputSource>> = Vec::new();
        for &player in players {
            let script = Script::default();
            scripts.insert(player, Rc::clone(&script));
            inputs.push(Box::new(ScriptedInput { player, script }));
        }
        let mut machine = Self::with_inputs(name, hub, state, players, inputs);
        machine.scripts = scripts;
        machine
    }

    /// A machine hosting `players` with caller-supplied inputs.
    pub fn with_inputs(
        name: &'static str,
        hub: &LoopbackHub,
        state: Match,
        players: &[PlayerId],
        inputs: Vec<Box<dyn InputSource>>,
    ) -> Self {
        let peers: Vec<PeerId> = players.iter().map(|p| PeerId(p.raw())).collect();
        let endpoint = hub.endpoint(&peers).expect("TestMachine: peer already hosted");
        let coordinator = Coordinator::new(state, endpoint, inputs).expect("TestMachine: bad seating");
        Self {
            name,
            coordinator,
            scripts: BTreeMap::new(),
            events: Vec::new(),
            rejected: 0,
            last_report: None,
        }
    }

    /// Queue an action for `player`, issued on a later tick.
    pub fn act(&self, player: PlayerId, action: Action) {
        self.scripts
            .get(&player)
            .unwrap_or_else(|| panic!("{}: {player} is not scripted here", self.name))
            .borrow_mut()
            .push_back(Intent::Act(action));
    }

    pub fn try_tick(&mut self, elapsed: SimTime) -> Result<TickReport, CoordinatorError> {
        let report = self.coordinator.tick(elapsed)?;
        debug!(machine = self.name, time = report.time, status = ?report.status, "tick");
        self.events.extend(report.events.iter().cloned());
        self.rejected += report.rejected;
        self.last_report = Some(report.clone());
        Ok(report)
    }

    pub fn tick(&mut self, elapsed: SimTime) -> TickReport {
        match self.try_tick(elapsed) {
            Ok(report) => report,
            Err(err) => panic!("{}: tick failed: {err}", self.name),
        }
    }

    pub fn state(&self) -> &Match {
        self.coordinator.state()
    }

    pub fn now(&self) -> SimTime {
        self.coordinator.now()
    }

    pub fn coordinator(&self) -> &Coordinator<LoopbackEndpoint> {
        &self.coordinator
    }

    /// Leave the session, as if the process died.
    pub fn disconnect(&mut self) {
        self.coordinator.transport_mut().disconnect();
    }
}

// ---------------------------------------------------------------------------
// Frame loops
// ---------------------------------------------------------------------------

/// Tick every machine once per frame, in order, `frames` times.
pub fn run_frames(machines: &mut [&mut TestMachine], frame: SimTime, frames: usize) {
    for _ in 0..frames {
        for machine in machines.iter_mut() {
            machine.tick(frame);
        }
    }
}

/// Tick each machine with its own frame length until all have reached
/// `time`. Machines already there sit out.
pub fn run_until(machines: &mut [(&mut TestMachine, SimTime)], time: SimTime) {
    for _ in 0..MAX_FRAMES {
        let mut behind = false;
        for (machine, frame) in machines.iter_mut() {
            let now = machine.now();
            if now < time {
                behind = true;
                machine.tick((*frame).min(time - now));
            }
        }
        if !behind {
            return;
        }
    }
    panic!("machines never reached t={time}");
}

/// Bring every machine to the time of the one furthest ahead, so their
/// states can be compared directly.
pub fn converge(machines: &mut [&mut TestMachine], frame: SimTime) -> SimTime {
    let time = machines.iter().map(|m| m.now()).max().unwrap_or(0);
    let mut paced: Vec<(&mut TestMachine, SimTime)> = machines.iter_mut().map(|m| (&mut **m, frame)).collect();
    run_until(&mut paced, time);
    time
}
