//! Scripted user sessions.
//!
//! A [`Scenario`] is the script a [`SimDriver`] plays: user inputs, pauses on
//! the virtual clock and broker-side activity (a peer posting, the network
//! dropping every connection). Scripts are built by hand for example tests or
//! drawn from a seed for property tests.
//!
//! When the script runs out the driver reports its input as closed and the
//! runtime quits.

use std::{collections::VecDeque, fmt, sync::Arc, time::Duration};

use rand::{Rng, SeedableRng, seq::SliceRandom};
use rand_chacha::ChaCha8Rng;
use roomline_app::{Runtime, RuntimeError, UserInput};
use roomline_client::{MemoryCredentialStore, SessionConfig};
use roomline_proto::{
    MessageId, RoomId, UserId,
    payloads::{SendMessageRequest, TokenPair},
};

use crate::{
    SimDriver, SimDriverError, SimEnv,
    invariants::{ClientSnapshot, InvariantRegistry, SystemSnapshot, Violation},
    sim_broker::{SharedSimBroker, SimBroker},
};

/// Runtime wired to the simulation.
pub type SimRuntime = Runtime<SimDriver, SimEnv>;

/// Server-side activity run between user inputs.
pub type BrokerAction = Box<dyn FnOnce(&mut SimBroker) + Send>;

/// One step of a script.
pub enum ScriptStep {
    /// Something the user does.
    Input(UserInput),
    /// Let virtual time pass.
    Wait(Duration),
    /// Act on the broker.
    Broker(BrokerAction),
}

impl fmt::Debug for ScriptStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input(input) => f.debug_tuple("Input").field(input).finish(),
            Self::Wait(duration) => f.debug_tuple("Wait").field(duration).finish(),
            Self::Broker(_) => f.write_str("Broker(..)"),
        }
    }
}

/// Builder for a scripted session.
#[derive(Debug, Default)]
pub struct Scenario {
    steps: VecDeque<ScriptStep>,
}

impl Scenario {
    /// Create an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a user input.
    #[must_use]
    pub fn input(mut self, input: UserInput) -> Self {
        self.steps.push_back(ScriptStep::Input(input));
        self
    }

    /// Append a typed line, parsed the way the CLI parses it. Lines that do
    /// not parse are typed as plain text.
    #[must_use]
    pub fn line(self, line: &str) -> Self {
        let input = UserInput::parse(line).unwrap_or_else(|_| UserInput::Text(line.to_string()));
        self.input(input)
    }

    /// Send `text` to the open room.
    #[must_use]
    pub fn text(self, text: &str) -> Self {
        self.input(UserInput::Text(text.to_string()))
    }

    /// Open a room.
    #[must_use]
    pub fn open(self, room_id: RoomId) -> Self {
        self.input(UserInput::Open(room_id))
    }

    /// Return to the room list.
    #[must_use]
    pub fn back(self) -> Self {
        self.input(UserInput::Back)
    }

    /// Quit explicitly.
    #[must_use]
    pub fn quit(self) -> Self {
        self.input(UserInput::Quit)
    }

    /// Let `duration` of virtual time pass.
    #[must_use]
    pub fn wait(mut self, duration: Duration) -> Self {
        self.steps.push_back(ScriptStep::Wait(duration));
        self
    }

    /// Run `action` on the broker.
    #[must_use]
    pub fn broker(mut self, action: impl FnOnce(&mut SimBroker) + Send + 'static) -> Self {
        self.steps.push_back(ScriptStep::Broker(Box::new(action)));
        self
    }

    /// Fail every open connection from the network side.
    #[must_use]
    pub fn drop_connections(self) -> Self {
        self.broker(SimBroker::drop_all)
    }

    /// `sender` posts `text` to `room_id`.
    #[must_use]
    pub fn post(self, room_id: RoomId, sender: UserId, text: &str) -> Self {
        let request = SendMessageRequest::text(text);
        self.broker(move |broker| {
            broker.post_message(room_id, sender, &request);
        })
    }

    /// `reader` reads `room_id` up to `message_id`.
    #[must_use]
    pub fn mark_read(self, room_id: RoomId, reader: UserId, message_id: MessageId) -> Self {
        self.broker(move |broker| broker.mark_read(room_id, reader, message_id))
    }

    /// Draw a script of `len` steps from `seed`.
    ///
    /// The user navigates between `rooms`, types, pages history and waits
    /// while `peer` posts and reads in the same rooms and connections drop.
    /// The same seed always yields the same script.
    pub fn random(seed: u64, len: usize, rooms: &[RoomId], peer: UserId) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut scenario = Self::new();
        if rooms.is_empty() {
            return scenario;
        }

        for n in 0..len {
            let room_id = rooms.choose(&mut rng).copied().unwrap_or_default();
            scenario = match rng.gen_range(0..100) {
                0..20 => scenario.open(room_id),
                20..30 => scenario.back(),
                30..45 => scenario.text(&format!("message {n}")),
                45..50 => scenario.input(UserInput::More),
                50..52 => scenario.input(UserInput::Refresh),
                52..70 => scenario.wait(Duration::from_millis(rng.gen_range(0..8_000))),
                70..85 => scenario.post(room_id, peer, &format!("peer {n}")),
                85..93 => scenario.mark_read(room_id, peer, rng.gen_range(1..40)),
                _ => scenario.drop_connections(),
            };
        }

        scenario
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the script is empty.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Take the steps.
    pub fn into_steps(self) -> VecDeque<ScriptStep> {
        self.steps
    }

    /// Build a runtime for `user_id` that plays this script against `broker`.
    ///
    /// The user's credential store holds `token` as the access token.
    pub fn into_runtime(
        self,
        broker: &SharedSimBroker,
        user_id: UserId,
        token: &str,
    ) -> SimRuntime {
        let credentials = MemoryCredentialStore::with_tokens(TokenPair {
            access_token: token.to_string(),
            refresh_token: format!("{token}-refresh"),
        });
        let driver = SimDriver::new(user_id, Arc::clone(broker), self);
        let config = SessionConfig::default();
        Runtime::new(driver, SimEnv::new(), user_id, Arc::new(credentials), config)
    }
}

/// Why a checked run stopped early.
#[derive(Debug)]
pub enum ScenarioError {
    /// The runtime failed.
    Runtime(RuntimeError<SimDriverError>),
    /// Invariants failed after the given number of cycles.
    Violations {
        /// Cycles completed before the check failed.
        step: usize,
        /// Everything that failed.
        violations: Vec<Violation>,
    },
}

impl fmt::Display for ScenarioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Runtime(e) => write!(f, "runtime failed: {e}"),
            Self::Violations { step, violations } => {
                write!(f, "invariants failed after {step} cycles:")?;
                for violation in violations {
                    write!(f, "\n  {violation}")?;
                }
                Ok(())
            },
        }
    }
}

impl std::error::Error for ScenarioError {}

impl From<RuntimeError<SimDriverError>> for ScenarioError {
    fn from(e: RuntimeError<SimDriverError>) -> Self {
        Self::Runtime(e)
    }
}

/// Start `runtime` and play its script until the driver is idle.
///
/// Stops before the exhausted script would quit the runtime, so the session
/// is still up for inspection. Returns `true` if the script quit on its own.
pub async fn play(
    runtime: &mut SimRuntime,
    open: Option<RoomId>,
) -> Result<bool, RuntimeError<SimDriverError>> {
    if runtime.start(open).await? {
        return Ok(true);
    }
    resume(runtime).await
}

/// Keep playing a started `runtime` until the driver is idle again, after
/// more script was appended with [`SimDriver::extend_script`].
pub async fn resume(runtime: &mut SimRuntime) -> Result<bool, RuntimeError<SimDriverError>> {
    while !runtime.driver().is_idle() {
        if runtime.step().await? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Run `runtime` to completion, checking `registry` against the App and the
/// Client after every cycle.
///
/// Returns the number of cycles run.
pub async fn run_checked(
    runtime: &mut SimRuntime,
    open: Option<RoomId>,
    registry: &InvariantRegistry,
) -> Result<usize, ScenarioError> {
    let mut step = 0;
    let mut should_quit = runtime.start(open).await?;
    check(runtime, registry, step)?;

    while !should_quit {
        should_quit = runtime.step().await?;
        step += 1;
        check(runtime, registry, step)?;
    }

    Ok(step)
}

fn check(
    runtime: &SimRuntime,
    registry: &InvariantRegistry,
    step: usize,
) -> Result<(), ScenarioError> {
    let snapshot =
        SystemSnapshot::single(ClientSnapshot::from_runtime(runtime.app(), runtime.bridge()));
    registry
        .check_all(&snapshot)
        .map_err(|violations| ScenarioError::Violations { step, violations })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_appends_in_order() {
        let scenario = Scenario::new().open(3).wait(Duration::from_secs(1)).text("hi").back();

        let steps: Vec<String> = scenario.into_steps().iter().map(|s| format!("{s:?}")).collect();
        assert_eq!(steps, vec![
            "Input(Open(3))",
            "Wait(1s)",
            "Input(Text(\"hi\"))",
            "Input(Back)"
        ]);
    }

    #[test]
    fn lines_parse_like_the_cli() {
        let steps = Scenario::new().line("/open 4").line("/bogus").into_steps();

        assert!(matches!(steps[0], ScriptStep::Input(UserInput::Open(4))));
        assert!(matches!(&steps[1], ScriptStep::Input(UserInput::Text(t)) if t == "/bogus"));
    }

    #[test]
    fn random_is_deterministic() {
        let a = Scenario::random(7, 50, &[1, 2], 9).into_steps();
        let b = Scenario::random(7, 50, &[1, 2], 9).into_steps();

        let a: Vec<String> = a.iter().map(|s| format!("{s:?}")).collect();
        let b: Vec<String> = b.iter().map(|s| format!("{s:?}")).collect();
        assert_eq!(a, b);
        assert_eq!(a.len(), 50);
    }

    #[test]
    fn random_without_rooms_is_empty() {
        assert!(Scenario::random(1, 10, &[], 9).is_empty());
    }
}
