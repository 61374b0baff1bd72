/// Store and collector settings for a [`Machine`](crate::Machine).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Registry slots reserved up front.
    pub initial_capacity: usize,
    /// Live object count at which the evaluator collects on its own. `None` leaves collection
    /// entirely to the host.
    pub gc_threshold: Option<usize>,
    /// After an automatic cycle the next one is scheduled at `live * growth_factor`, but never
    /// below `gc_threshold`.
    pub growth_factor: usize,
    /// Hard ceiling on live objects; allocating past it fails.
    pub max_objects: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            initial_capacity: 1024,
            gc_threshold: Some(1024),
            growth_factor: 2,
            max_objects: None,
        }
    }
}

impl Config {
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    pub fn gc_threshold(mut self, threshold: impl Into<Option<usize>>) -> Self {
        self.gc_threshold = threshold.into();
        self
    }

    pub fn growth_factor(mut self, factor: usize) -> Self {
        self.growth_factor = factor.max(1);
        self
    }

    pub fn max_objects(mut self, limit: impl Into<Option<usize>>) -> Self {
        self.max_objects = limit.into();
        self
    }
}
