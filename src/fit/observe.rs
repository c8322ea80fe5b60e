//! Progress callbacks for the iterative optimizers.

/// Observes optimizer progress and can steer it.
///
/// Called once per outer iteration by both optimizers.
pub trait Observer<E, A> {
    /// Observes a solver event and optionally returns a control action.
    fn observe(&mut self, event: &E) -> Option<A>;
}

/// Blanket implementation for observer closures.
impl<E, A, F> Observer<E, A> for F
where
    F: FnMut(&E) -> Option<A>,
{
    fn observe(&mut self, event: &E) -> Option<A> {
        self(event)
    }
}

/// A no-op observer that always returns `None`.
impl<E, A> Observer<E, A> for () {
    fn observe(&mut self, _event: &E) -> Option<A> {
        None
    }
}

/// Snapshot handed to observers after each outer iteration.
#[derive(Debug, Clone, Copy)]
pub struct Event<'a> {
    /// One-based outer iteration.
    pub iter: usize,
    /// Sum of squared residuals at `params`.
    pub cost: f64,
    pub params: &'a [f64],
}

/// Control actions supported by the optimizers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Stop and return the current parameters.
    StopEarly,
}
