use tokio::sync::watch;

/// Cancellation signal for an in-flight query.
///
/// Each query layer owns one watch channel carrying this state; `cancel()`
/// raises it from any thread. The task driving the exchange observes it at
/// its `select!` points, alongside the layer's own deadline arm, so the
/// three-way outcome (completion, timeout, cancellation) is decided at a
/// single serialized point. Raising is idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum Interrupt {
    #[default]
    None,
    Cancelled,
}

pub(crate) fn channel() -> (watch::Sender<Interrupt>, watch::Receiver<Interrupt>) {
    watch::channel(Interrupt::None)
}

pub(crate) fn raise(sender: &watch::Sender<Interrupt>) {
    sender.send_if_modified(|current| {
        if *current == Interrupt::None {
            *current = Interrupt::Cancelled;
            true
        } else {
            false
        }
    });
}
