use tokio::sync::watch;

type Combine<S, V> = Box<dyn Fn(&S) -> V + Send + Sync>;

/// A value derived from a set of sources by a pure function.
///
/// Recomputation is pushed: every source write re-evaluates before returning,
/// so no reader ever sees a value computed from older sources. Writes that leave
/// the sources equal to what was last evaluated are skipped.
pub struct Derived<S, V> {
    sources: S,
    value: V,
    combine: Combine<S, V>,
    /// Bumped whenever the sources actually change
    revision: u64,
    evaluations: u64,
    notifier: watch::Sender<V>,
}

impl<S, V> Derived<S, V>
where
    S: Clone + PartialEq,
    V: Clone + PartialEq,
{
    /// Bind `combine` to `sources`, evaluating once up front.
    pub fn bind<F>(sources: S, combine: F) -> Self
    where
        F: Fn(&S) -> V + Send + Sync + 'static,
    {
        let value = combine(&sources);
        let (notifier, _) = watch::channel(value.clone());
        Self {
            sources,
            value,
            combine: Box::new(combine),
            revision: 0,
            evaluations: 1,
            notifier,
        }
    }

    pub fn get(&self) -> &V {
        &self.value
    }

    pub fn sources(&self) -> &S {
        &self.sources
    }

    /// Number of source changes since binding
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Number of times `combine` has run
    pub fn evaluations(&self) -> u64 {
        self.evaluations
    }

    /// Replace the sources. Returns `true` if the derived value was recomputed.
    pub fn set_sources(&mut self, sources: S) -> bool {
        if sources == self.sources {
            return false;
        }
        self.sources = sources;
        self.revision += 1;
        self.refresh();
        true
    }

    /// Edit the sources in place. Returns `true` if the derived value was recomputed.
    pub fn update<F>(&mut self, edit: F) -> bool
    where
        F: FnOnce(&mut S),
    {
        let mut next = self.sources.clone();
        edit(&mut next);
        self.set_sources(next)
    }

    /// Receiver that observes every change of the derived value
    pub fn subscribe(&self) -> watch::Receiver<V> {
        self.notifier.subscribe()
    }

    fn refresh(&mut self) {
        let value = (self.combine)(&self.sources);
        self.evaluations += 1;
        if value != self.value {
            self.value = value.clone();
            self.notifier.send_replace(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_evaluates_immediately() {
        let derived = Derived::bind((2, 3), |(a, b)| a + b);
        assert_eq!(*derived.get(), 5);
        assert_eq!(derived.evaluations(), 1);
    }

    #[test]
    fn test_unchanged_sources_skip_recompute() {
        let mut derived = Derived::bind((2, 3), |(a, b)| a * b);
        assert!(!derived.set_sources((2, 3)));
        assert!(!derived.update(|s| s.0 = 2));
        assert_eq!(derived.evaluations(), 1);

        assert!(derived.update(|s| s.1 = 4));
        assert_eq!(*derived.get(), 8);
        assert_eq!(derived.evaluations(), 2);
    }

    #[test]
    fn test_revision_counts_real_source_changes() {
        let mut derived = Derived::bind((1, 2), |(a, b)| a + b);
        assert_eq!(derived.revision(), 0);

        derived.set_sources((1, 2));
        assert_eq!(derived.revision(), 0);

        derived.set_sources((2, 1));
        derived.update(|s| s.0 = 5);
        assert_eq!(derived.revision(), 2);
        assert_eq!(derived.evaluations(), derived.revision() + 1);
        assert_eq!(*derived.get(), 6);
    }

    #[test]
    fn test_subscribers_see_changes_only() {
        let mut derived = Derived::bind((1, 1), |(a, b)| a * b);
        let mut rx = derived.subscribe();
        assert!(!rx.has_changed().unwrap());

        // Sources change but the product does not.
        derived.set_sources((1, 1));
        assert!(!rx.has_changed().unwrap());

        derived.set_sources((3, 1));
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), 3);

        derived.set_sources((1, 3));
        assert_eq!(derived.evaluations(), 3);
        assert!(!rx.has_changed().unwrap());
    }
}
