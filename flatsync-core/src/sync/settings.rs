use std::time::Duration;

/// Tuning knobs for one sync pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    pub movie_concurrency: usize,
    pub show_concurrency: usize,
    pub season_concurrency: usize,
    /// Cap on simultaneous episode tasks across all shows.
    pub episode_concurrency: usize,
    /// Use the server's hash manifest when it offers one.
    pub hash_based: bool,
    pub probe_timeout: Duration,
    /// Pause before each show's batch; zero disables it.
    pub batch_delay: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            movie_concurrency: 20,
            show_concurrency: 20,
            season_concurrency: 20,
            episode_concurrency: 120,
            hash_based: true,
            probe_timeout: Duration::from_secs(2),
            batch_delay: Duration::ZERO,
        }
    }
}

impl SyncSettings {
    /// Clamps every concurrency cap to at least one.
    pub fn normalized(mut self) -> Self {
        self.movie_concurrency = self.movie_concurrency.max(1);
        self.show_concurrency = self.show_concurrency.max(1);
        self.season_concurrency = self.season_concurrency.max(1);
        self.episode_concurrency = self.episode_concurrency.max(1);
        self
    }
}
