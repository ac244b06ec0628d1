use typed_builder::TypedBuilder;

use crate::history::DEFAULT_HISTORY_CAPACITY;
use crate::timer::TimerMode;

/// Interpreter settings.
///
/// ```
/// use chip8vm_core::{Config, TimerMode};
///
/// let config = Config::builder().timer_mode(TimerMode::Ticked).rng_seed(Some(7)).build();
/// assert_eq!(config.rng_seed, Some(7));
/// ```
#[derive(Debug, Clone, TypedBuilder)]
pub struct Config {
    #[builder(default)]
    pub timer_mode: TimerMode,
    /// Number of executed instructions kept for fault diagnostics.
    #[builder(default = DEFAULT_HISTORY_CAPACITY)]
    pub history_capacity: usize,
    /// Fixed seed for `CXKK`. Seeded from the OS when unset.
    #[builder(default)]
    pub rng_seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Config::builder().build()
    }
}
