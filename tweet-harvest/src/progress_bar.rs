pub trait ProgressBar: Send + Sync + Sized + 'static {
    fn init(total: usize, description: &str) -> Self;
    fn increment(&self);
    fn destroy(self);
}

/// Progress reporting that does nothing.
pub struct NoProgress;

impl ProgressBar for NoProgress {
    fn init(_total: usize, _description: &str) -> Self {
        Self
    }

    fn increment(&self) {}

    fn destroy(self) {}
}
