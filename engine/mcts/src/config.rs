//! MCTS configuration parameters.

/// Configuration for one search engine instance.
#[derive(Debug, Clone)]
pub struct MctsConfig {
    /// Number of descents run by each call to `search`.
    pub num_simulations: u32,

    /// Exploration constant for the UCB formula (Cpuct).
    /// Higher values encourage exploration, lower values favor exploitation.
    pub c_puct: f32,

    /// Dirichlet noise shape for root exploration.
    pub dirichlet_alpha: f32,

    /// Fraction of the root prior that comes from Dirichlet noise.
    /// 0.25 means 75% prior + 25% noise.
    pub dirichlet_epsilon: f32,

    /// Exploration mode (self-play): mix Dirichlet noise into root priors.
    pub add_root_noise: bool,
}

impl Default for MctsConfig {
    fn default() -> Self {
        Self {
            num_simulations: 100,
            c_puct: 1.0,
            dirichlet_alpha: 0.3,
            dirichlet_epsilon: 0.25,
            add_root_noise: true,
        }
    }
}

impl MctsConfig {
    /// Create config for self-play (with exploration noise).
    pub fn for_training() -> Self {
        Self::default()
    }

    /// Create config for evaluation and exhibition play (no noise).
    pub fn for_evaluation() -> Self {
        Self {
            add_root_noise: false,
            ..Self::default()
        }
    }

    /// Create a fast, noise-free config for testing.
    pub fn for_testing() -> Self {
        Self {
            num_simulations: 50,
            add_root_noise: false,
            ..Self::default()
        }
    }

    /// Builder pattern: set number of simulations.
    pub fn with_simulations(mut self, n: u32) -> Self {
        self.num_simulations = n;
        self
    }

    /// Builder pattern: set c_puct exploration constant.
    pub fn with_c_puct(mut self, c: f32) -> Self {
        self.c_puct = c;
        self
    }

    /// Builder pattern: set Dirichlet shape and mixing weight.
    pub fn with_noise(mut self, alpha: f32, epsilon: f32) -> Self {
        self.dirichlet_alpha = alpha;
        self.dirichlet_epsilon = epsilon;
        self
    }

    /// Builder pattern: toggle exploration mode.
    pub fn with_root_noise(mut self, enabled: bool) -> Self {
        self.add_root_noise = enabled;
        self
    }
}
