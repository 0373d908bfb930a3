//! Engine configuration: standard streams, occurs check and the step
//! limit.

use crate::machine::code::{BuiltinType, CodeIndex};
use crate::machine::foreign::ForeignHandle;
use crate::machine::machine_state::MachineState;
use crate::machine::registry::Registries;
use crate::machine::streams::Stream;
use crate::Machine;

use fxhash::FxBuildHasher;
use indexmap::IndexMap;
use tracing::debug;

#[derive(Debug, Default)]
enum OutputStreamConfigInner {
    #[default]
    Null,
    Memory,
    Stdout,
    Stderr,
}

/// Configuration for an output stream.
#[derive(Debug, Default)]
pub struct OutputStreamConfig {
    inner: OutputStreamConfigInner,
}

impl OutputStreamConfig {
    /// Ignores all output.
    pub fn null() -> Self {
        Self {
            inner: OutputStreamConfigInner::Null,
        }
    }
    /// Sends output to stdout.
    pub fn stdout() -> Self {
        Self {
            inner: OutputStreamConfigInner::Stdout,
        }
    }
    /// Sends output to stderr.
    pub fn stderr() -> Self {
        Self {
            inner: OutputStreamConfigInner::Stderr,
        }
    }
    /// Keeps output in a memory buffer.
    pub fn memory() -> Self {
        Self {
            inner: OutputStreamConfigInner::Memory,
        }
    }

    fn into_stream(self) -> Stream {
        match self.inner {
            OutputStreamConfigInner::Null => Stream::null_output(),
            OutputStreamConfigInner::Memory => Stream::memory(),
            OutputStreamConfigInner::Stdout => Stream::stdout(),
            OutputStreamConfigInner::Stderr => Stream::stderr(),
        }
    }
}

#[derive(Debug, Default)]
enum InputStreamConfigInner {
    #[default]
    Null,
    Stdin,
    Bytes(Vec<u8>),
}

/// Configuration for an input stream.
#[derive(Debug, Default)]
pub struct InputStreamConfig {
    inner: InputStreamConfigInner,
}

impl InputStreamConfig {
    /// Ignores all input.
    pub fn null() -> Self {
        Self {
            inner: InputStreamConfigInner::Null,
        }
    }
    /// Gets input from stdin.
    pub fn stdin() -> Self {
        Self {
            inner: InputStreamConfigInner::Stdin,
        }
    }
    /// Reads input from a fixed buffer.
    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            inner: InputStreamConfigInner::Bytes(bytes.into()),
        }
    }

    fn into_stream(self) -> Stream {
        match self.inner {
            InputStreamConfigInner::Null => Stream::null_input(),
            InputStreamConfigInner::Stdin => Stream::stdin(),
            InputStreamConfigInner::Bytes(bytes) => Stream::from_bytes(bytes),
        }
    }
}

/// Describes how the streams of a [`Machine`](crate::Machine) will be handled.
#[derive(Debug)]
pub struct StreamConfig {
    /// The configuration for the stdin of the [`Machine`](crate::Machine).
    pub stdin: InputStreamConfig,
    /// The configuration for the stdout of the [`Machine`](crate::Machine).
    pub stdout: OutputStreamConfig,
    /// The configuration for the stderr of the [`Machine`](crate::Machine).
    pub stderr: OutputStreamConfig,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl StreamConfig {
    /// Binds the input, output and error streams to stdin, stdout and stderr.
    pub fn stdio() -> Self {
        StreamConfig {
            stdin: InputStreamConfig::stdin(),
            stdout: OutputStreamConfig::stdout(),
            stderr: OutputStreamConfig::stderr(),
        }
    }

    /// Binds the output stream to a memory buffer, and the error stream to stderr.
    ///
    /// The input stream is ignored.
    pub fn in_memory() -> Self {
        StreamConfig {
            stdin: InputStreamConfig::null(),
            stdout: OutputStreamConfig::memory(),
            stderr: OutputStreamConfig::stderr(),
        }
    }

    fn into_streams(self) -> (Stream, Stream, Stream) {
        (
            self.stdin.into_stream(),
            self.stdout.into_stream(),
            self.stderr.into_stream(),
        )
    }
}

/// Describes how a [`Machine`](crate::Machine) will be configured.
pub struct MachineBuilder {
    pub(crate) streams: StreamConfig,
    pub(crate) registries: Registries,
    pub(crate) occurs_check: bool,
    pub(crate) step_limit: Option<u64>,
}

impl Default for MachineBuilder {
    /// Defaults to in-memory streams, fresh registries, no occurs check
    /// and no step limit.
    fn default() -> Self {
        MachineBuilder {
            streams: Default::default(),
            registries: Default::default(),
            occurs_check: false,
            step_limit: None,
        }
    }
}

impl MachineBuilder {
    /// Creates a default configuration.
    pub fn new() -> Self {
        Default::default()
    }

    /// Uses the given `crate::StreamConfig` in this configuration.
    pub fn with_streams(mut self, streams: StreamConfig) -> Self {
        self.streams = streams;
        self
    }

    /// Resolves aliases through `registries`, which may be shared with
    /// other engines.
    pub fn with_registries(mut self, registries: Registries) -> Self {
        self.registries = registries;
        self
    }

    /// Makes every unification performed by the engine use the occurs
    /// check.
    pub fn with_occurs_check(mut self, occurs_check: bool) -> Self {
        self.occurs_check = occurs_check;
        self
    }

    /// Bounds the number of goals a query may execute. Exceeding it
    /// abandons the query with an uncatchable `resource_error(steps)`.
    pub fn with_step_limit(mut self, step_limit: Option<u64>) -> Self {
        self.step_limit = step_limit;
        self
    }

    /// Builds the [`Machine`](crate::Machine) from this configuration.
    pub fn build(self) -> Machine {
        let (user_input, user_output, user_error) = self.streams.into_streams();

        let user_input = ForeignHandle::from_stream(user_input);
        let user_output = ForeignHandle::from_stream(user_output);
        let user_error = ForeignHandle::from_stream(user_error);

        let mut code_dir = IndexMap::with_hasher(FxBuildHasher::default());

        for ty in BuiltinType::ALL {
            code_dir.insert(ty.key(), CodeIndex::Builtin(ty));
        }

        let mut wam = Machine {
            machine_st: MachineState::new(self.occurs_check),
            code_dir,
            registries: self.registries,
            user_input,
            user_output,
            user_error,
            registered_aliases: vec![],
            step_limit: self.step_limit,
            steps: 0,
        };

        let standard_streams = [
            (atom!("user_input"), wam.user_input.clone()),
            (atom!("user_output"), wam.user_output.clone()),
            (atom!("user_error"), wam.user_error.clone()),
        ];

        for (alias, handle) in standard_streams {
            handle.with_stream(|stream| stream.options_mut().set_alias_to_atom_opt(Some(alias)));

            if wam.registries.streams.register(alias, handle.clone()) {
                wam.registered_aliases.push((alias, handle));
            } else {
                debug!(alias = %alias, "standard stream alias already registered");
            }
        }

        wam
    }
}
