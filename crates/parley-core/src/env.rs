//! Environment abstraction for deterministic testing.
//!
//! Decouples protocol logic from system resources (time, randomness). The
//! session engine never reads a clock or an RNG directly, it asks its
//! [`Environment`]. Production uses [`SystemEnv`]; tests and simulations use
//! [`SimEnv`] with a seeded RNG and manually advanced clocks.

use std::{
    ops::Sub,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use rand::{CryptoRng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// Abstract environment providing time and randomness.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// - `now()` never goes backwards
/// - `random_bytes()` uses cryptographically secure entropy in production
/// - Methods are infallible except in exceptional circumstances (e.g., OS
///   entropy exhaustion)
pub trait Environment: Clone + Send + Sync + 'static {
    /// The instant type used for rekey intervals.
    ///
    /// Production environments use `std::time::Instant`, simulations use a
    /// virtual elapsed-time counter.
    type Instant: Copy + Ord + Send + Sync + Sub<Output = Duration>;

    /// Current time (monotonic).
    ///
    /// # Invariants
    ///
    /// - Subsequent calls must return times >= previous calls.
    fn now(&self) -> Self::Instant;

    /// Wall-clock seconds since the Unix epoch.
    ///
    /// Stamped into every frame and compared against the peer's clock, so it
    /// must track real time, unlike [`Environment::now`].
    fn wall_clock_secs(&self) -> u64;

    /// Fills the provided buffer with random bytes.
    ///
    /// # Invariants
    ///
    /// - Given the same RNG seed, this produces the same sequence of bytes
    /// - Uses cryptographically secure RNG
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }
}

/// Adapts an [`Environment`] into a `rand` generator for key generation.
///
/// Only as strong as the environment's `random_bytes`.
pub struct EnvRng<'a, E: Environment> {
    env: &'a E,
}

impl<'a, E: Environment> EnvRng<'a, E> {
    /// Borrow `env` as an RNG.
    pub fn new(env: &'a E) -> Self {
        Self { env }
    }
}

impl<E: Environment> RngCore for EnvRng<'_, E> {
    fn next_u32(&mut self) -> u32 {
        let mut bytes = [0u8; 4];
        self.env.random_bytes(&mut bytes);
        u32::from_le_bytes(bytes)
    }

    fn next_u64(&mut self) -> u64 {
        let mut bytes = [0u8; 8];
        self.env.random_bytes(&mut bytes);
        u64::from_le_bytes(bytes)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.env.random_bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.env.random_bytes(dest);
        Ok(())
    }
}

impl<E: Environment> CryptoRng for EnvRng<'_, E> {}

/// Production environment using system clocks and OS randomness.
///
/// # Panics
///
/// Panics if the OS RNG fails. A session without functioning cryptographic
/// randomness cannot generate keys or nonces, and continuing would compromise
/// every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = std::time::Instant;

    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    #[allow(clippy::expect_used)]
    fn wall_clock_secs(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("invariant: system clock is after Unix epoch (1970-01-01)")
            .as_secs()
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer)
            .expect("invariant: OS RNG failure is unrecoverable - session cannot operate securely");
    }
}

/// Wall-clock start used by [`SimEnv::new`] (2023-11-14T22:13:20Z).
pub const SIM_EPOCH_SECS: u64 = 1_700_000_000;

/// Deterministic environment: seeded ChaCha20 RNG and manual clocks.
///
/// Clones share state, so a test can hold one handle and drive the clock of
/// a session that owns another.
#[derive(Clone)]
pub struct SimEnv {
    inner: Arc<SimState>,
}

struct SimState {
    /// Virtual monotonic time in milliseconds
    elapsed_ms: AtomicU64,
    /// Virtual wall clock in seconds since the Unix epoch
    wall_secs: AtomicU64,
    rng: Mutex<ChaCha20Rng>,
}

impl SimEnv {
    /// Seeded environment starting at [`SIM_EPOCH_SECS`].
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self::with_wall_clock(seed, SIM_EPOCH_SECS)
    }

    /// Seeded environment with an explicit wall-clock start.
    #[must_use]
    pub fn with_wall_clock(seed: u64, wall_secs: u64) -> Self {
        Self {
            inner: Arc::new(SimState {
                elapsed_ms: AtomicU64::new(0),
                wall_secs: AtomicU64::new(wall_secs),
                rng: Mutex::new(ChaCha20Rng::seed_from_u64(seed)),
            }),
        }
    }

    /// Advance both clocks.
    pub fn advance(&self, duration: Duration) {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self.inner.elapsed_ms.fetch_add(millis, Ordering::SeqCst);
        self.inner.wall_secs.fetch_add(duration.as_secs(), Ordering::SeqCst);
    }

    /// Set the wall clock without touching monotonic time.
    ///
    /// Models clock skew between peers.
    pub fn set_wall_clock(&self, secs: u64) {
        self.inner.wall_secs.store(secs, Ordering::SeqCst);
    }
}

impl Environment for SimEnv {
    type Instant = Duration;

    fn now(&self) -> Self::Instant {
        Duration::from_millis(self.inner.elapsed_ms.load(Ordering::SeqCst))
    }

    fn wall_clock_secs(&self) -> u64 {
        self.inner.wall_secs.load(Ordering::SeqCst)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        self.inner.rng.lock().unwrap_or_else(PoisonError::into_inner).fill_bytes(buffer);
    }
}
