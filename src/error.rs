use derive_more::{Display, Error};

#[derive(Debug, Display, Error)]
pub enum ConfigError {
    #[display("failed to read config file")]
    ReadFile,
    #[display("failed to parse config: {reason}")]
    Parse { reason: String },
    #[display("invalid config: {field}")]
    Validation { field: String },
}

/// Failure of a single kernel invocation. Reported back to the caller as a
/// failed response; the host keeps running.
#[derive(Debug, Display, Error)]
pub enum ComputeError {
    #[display("unknown timezone: {timezone}")]
    InvalidTimezone { timezone: String },
    #[display("invalid anchor time \"{value}\", expected HH:MM")]
    InvalidAnchorTime { value: String },
    #[display("band multiplier must be a positive number, got {value}")]
    InvalidMultiplier { value: f64 },
    #[display("invalid bar at index {index}: {reason}")]
    InvalidBar { index: usize, reason: String },
}

/// Caller-side failure of a request sent through a `RequestManager`.
#[derive(Debug, Display, Error)]
pub enum RequestError {
    #[display("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[display("execution host error")]
    HostFault,
    #[display("failed to start execution host")]
    HostSpawn,
    #[display("computation failed: {message}")]
    Computation { message: String },
    #[display("execution host terminated")]
    Terminated,
}
