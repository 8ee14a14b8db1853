//! Centralized configuration for Splice.
//!
//! All tunable parameters and settings are defined here to avoid
//! hard-coded values scattered throughout the codebase.

use std::time::Duration;

/// Central configuration for all Splice components.
///
/// Groups related configuration settings into logical sections.
/// Supports environment variable overrides for runtime customization.
#[derive(Debug, Clone, Default)]
pub struct SpliceConfig {
    pub reader: ReaderConfig,
    pub simulation: SimulationConfig,
}

/// Media source reader configuration.
///
/// Controls reader selection tolerances and the actor's command queue.
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Tolerance used when matching a playback time against buffered ranges.
    ///
    /// Segment durations are estimates, so reader ends rarely line up exactly
    /// with the start of the next segment. Matches Blink's default buffer
    /// duration.
    pub eos_fuzz: Duration,
    /// Capacity of the actor's external command channel
    pub command_buffer: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            eos_fuzz: Duration::from_millis(125),
            command_buffer: 100,
        }
    }
}

/// Simulation mode configuration for testing and development.
///
/// Controls the deterministic scenario generator used by `splice-sim`
/// and the `splice` CLI.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Deterministic seed for reproducible simulations
    pub deterministic_seed: Option<u64>,
    /// Simulated per-operation segment reader latency in milliseconds
    pub reader_latency_ms: u64,
    /// Maximum error applied to each segment's reported buffered end
    pub duration_jitter_ms: u64,
    /// How long the playback driver waits for data before retrying
    pub wait_timeout_ms: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            deterministic_seed: None,
            reader_latency_ms: 2,
            duration_jitter_ms: 40,
            wait_timeout_ms: 50,
        }
    }
}

impl SimulationConfig {
    /// Creates a configuration for deterministic testing.
    pub fn deterministic_testing() -> Self {
        Self {
            deterministic_seed: Some(42), // Fixed seed for reproducible tests
            reader_latency_ms: 0,         // No latency for fast tests
            duration_jitter_ms: 40,
            wait_timeout_ms: 20,
        }
    }
}

impl SpliceConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Allows runtime configuration via environment variables while
    /// maintaining sensible defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(fuzz) = std::env::var("SPLICE_EOS_FUZZ_MS") {
            if let Ok(millis) = fuzz.parse::<u64>() {
                config.reader.eos_fuzz = Duration::from_millis(millis);
            }
        }

        if let Ok(buffer) = std::env::var("SPLICE_COMMAND_BUFFER") {
            if let Ok(capacity) = buffer.parse::<usize>() {
                // tokio channels reject a zero capacity
                config.reader.command_buffer = capacity.max(1);
            }
        }

        if let Ok(seed) = std::env::var("SPLICE_SIMULATION_SEED") {
            if let Ok(seed_value) = seed.parse::<u64>() {
                config.simulation.deterministic_seed = Some(seed_value);
            }
        }

        if let Ok(latency) = std::env::var("SPLICE_SIMULATION_LATENCY_MS") {
            if let Ok(millis) = latency.parse::<u64>() {
                config.simulation.reader_latency_ms = millis;
            }
        }

        config
    }

    /// Creates a configuration optimized for testing.
    pub fn for_testing() -> Self {
        Self {
            simulation: SimulationConfig::deterministic_testing(),
            ..Default::default()
        }
    }
}
