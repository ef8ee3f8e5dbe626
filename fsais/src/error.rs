//! The fatal-error type shared by every component in this crate.
//!
//! Per the engine's error-handling policy, every failure kind here is meant to propagate all the
//! way to the top-level driver and abort the construction; there is no local recovery or retry.

use std::fmt::{Debug, Display, Formatter};

use prototk_derive::Message;

use zerror::{iotoz, Z};
use zerror_core::ErrorCore;

use biometrics::Counter;

//////////////////////////////////////////// biometrics ////////////////////////////////////////////

static CONFIGURATION: Counter = Counter::new("fsais.error.configuration");
static TYPE_CAPACITY: Counter = Counter::new("fsais.error.type_capacity");
static IO: Counter = Counter::new("fsais.error.io");
static INVARIANT_VIOLATION: Counter = Counter::new("fsais.error.invariant_violation");

pub fn register_biometrics(collector: &biometrics::Collector) {
    collector.register_counter(&CONFIGURATION);
    collector.register_counter(&TYPE_CAPACITY);
    collector.register_counter(&IO);
    collector.register_counter(&INVARIANT_VIOLATION);
}

/////////////////////////////////////////////// Error //////////////////////////////////////////////

/// The crate-wide fatal error type.  One variant per error kind named by the engine's error
/// handling policy, each carrying an [ErrorCore] for structured diagnostics.
#[derive(Clone, Debug, Message)]
pub enum Error {
    #[prototk(223488, message)]
    Configuration {
        #[prototk(1, message)]
        core: ErrorCore,
    },
    #[prototk(223489, message)]
    TypeCapacity {
        #[prototk(1, message)]
        core: ErrorCore,
        #[prototk(2, uint64)]
        required: u64,
        #[prototk(3, uint64)]
        capacity: u64,
    },
    #[prototk(223490, message)]
    Io {
        #[prototk(1, message)]
        core: ErrorCore,
        #[prototk(2, string)]
        path: String,
    },
    #[prototk(223491, message)]
    InvariantViolation {
        #[prototk(1, message)]
        core: ErrorCore,
        #[prototk(2, string)]
        context: String,
    },
}

impl Error {
    /// A configuration error: the caller supplied an unusable combination of inputs.
    pub fn configuration(short: &str) -> Self {
        Error::Configuration {
            core: ErrorCore::new("fsais@rescrv.net", short, &CONFIGURATION),
        }
    }

    /// An integer type chosen for this instance is too narrow to represent `required`.
    pub fn type_capacity(short: &str, required: u64, capacity: u64) -> Self {
        Error::TypeCapacity {
            core: ErrorCore::new("fsais@rescrv.net", short, &TYPE_CAPACITY),
            required,
            capacity,
        }
    }

    /// Wrap a [std::io::Error] observed while operating on `path`.
    pub fn io(path: impl Into<String>, err: &std::io::Error) -> Self {
        let path = path.into();
        Error::Io {
            core: ErrorCore::new("fsais@rescrv.net", &format!("{}", err), &IO).with_info("path", &path),
            path,
        }
    }

    /// An internal invariant was violated (e.g. an out-of-order heap push, an unexpectedly
    /// empty buffer).  This always indicates a bug in this crate, not a bad input.
    pub fn invariant_violation(context: impl Into<String>) -> Self {
        let context = context.into();
        Error::InvariantViolation {
            core: ErrorCore::new("fsais@rescrv.net", &context, &INVARIANT_VIOLATION),
            context,
        }
    }

    fn core(&self) -> &ErrorCore {
        match self {
            Error::Configuration { core } => core,
            Error::TypeCapacity { core, .. } => core,
            Error::Io { core, .. } => core,
            Error::InvariantViolation { core, .. } => core,
        }
    }

    fn core_mut(&mut self) -> &mut ErrorCore {
        match self {
            Error::Configuration { core } => core,
            Error::TypeCapacity { core, .. } => core,
            Error::Io { core, .. } => core,
            Error::InvariantViolation { core, .. } => core,
        }
    }
}

impl Default for Error {
    fn default() -> Self {
        Error::Configuration {
            core: ErrorCore::default(),
        }
    }
}

impl Display for Error {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            Error::Configuration { core: _ } => fmt.debug_struct("Configuration").finish(),
            Error::TypeCapacity { core: _, required, capacity } => fmt
                .debug_struct("TypeCapacity")
                .field("required", required)
                .field("capacity", capacity)
                .finish(),
            Error::Io { core: _, path } => fmt.debug_struct("Io").field("path", path).finish(),
            Error::InvariantViolation { core: _, context } => fmt
                .debug_struct("InvariantViolation")
                .field("context", context)
                .finish(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(what: std::io::Error) -> Error {
        Error::Io {
            core: ErrorCore::new("fsais@rescrv.net", &format!("{}", what), &IO),
            path: String::new(),
        }
    }
}

impl Z for Error {
    type Error = Self;

    fn long_form(&self) -> String {
        format!("{}", self) + "\n" + &self.core().long_form()
    }

    #[allow(deprecated)]
    fn with_token(mut self, identifier: &str, value: &str) -> Self::Error {
        self.core_mut().set_token(identifier, value);
        self
    }

    #[allow(deprecated)]
    fn with_url(mut self, identifier: &str, url: &str) -> Self::Error {
        self.core_mut().set_url(identifier, url);
        self
    }

    #[allow(deprecated)]
    fn with_variable<X: Debug>(mut self, variable: &str, x: X) -> Self::Error {
        self.core_mut().set_variable(variable, x);
        self
    }

    fn with_info<X: Debug>(mut self, name: &str, x: X) -> Self::Error {
        self.core_mut().set_variable(name, x);
        self
    }

    fn with_lazy_info<F: FnOnce() -> String>(mut self, name: &str, value: F) -> Self::Error {
        self.core_mut().set_variable(name, value());
        self
    }
}

iotoz! {Error}

/// The result type returned by almost every fallible function in this crate.
pub type Result<T> = std::result::Result<T, Error>;
