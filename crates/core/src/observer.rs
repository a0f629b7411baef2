/// Watches an iterative solver and optionally steers it.
///
/// A solver hands each event of type `E` to `observe` and acts on the returned
/// `Some(action)`; `None` means carry on. Logging, progress reporting and
/// early termination are all written as observers.
///
/// Closures of the form `FnMut(&E) -> Option<A>` are observers, and `()` is an
/// observer that never intervenes.
pub trait Observer<E, A> {
    fn observe(&mut self, event: &E) -> Option<A>;
}

impl<E, A, F> Observer<E, A> for F
where
    F: FnMut(&E) -> Option<A>,
{
    fn observe(&mut self, event: &E) -> Option<A> {
        self(event)
    }
}

impl<E, A> Observer<E, A> for () {
    fn observe(&mut self, _event: &E) -> Option<A> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drive<O: Observer<usize, &'static str>>(mut observer: O) -> Option<(usize, &'static str)> {
        (0..10).find_map(|i| observer.observe(&i).map(|action| (i, action)))
    }

    #[test]
    fn closure_can_stop_a_loop() {
        let stop_at_three = |i: &usize| (*i == 3).then_some("stop");
        assert_eq!(drive(stop_at_three), Some((3, "stop")));
    }

    #[test]
    fn unit_never_intervenes() {
        assert_eq!(drive(()), None);
    }
}
