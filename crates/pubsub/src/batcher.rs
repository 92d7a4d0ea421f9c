/// Options the framework uses to batch calls into a subscription driver.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BatcherOptions {
    /// Largest batch the driver should be asked for in a single receive.
    pub max_batch_size: usize,

    /// Maximum number of concurrent receive calls.
    pub max_handlers: usize,
}

impl BatcherOptions {
    /// Creates batcher options, raising zero values to one.
    #[must_use]
    pub fn new(max_batch_size: usize, max_handlers: usize) -> Self {
        Self {
            max_batch_size: max_batch_size.max(1),
            max_handlers: max_handlers.max(1),
        }
    }
}

impl Default for BatcherOptions {
    fn default() -> Self {
        Self::new(1, 1)
    }
}
