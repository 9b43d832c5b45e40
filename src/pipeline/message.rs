//! Queue message envelope

/// A message on a pipeline queue.
///
/// `Done` is the termination sentinel. Producers send exactly one `Done` per consumer
/// so every consumer's shutdown condition is unambiguous even when several
/// producers and consumers share one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message<T> {
    Item(T),
    Done,
}

impl<T> Message<T> {
    pub fn is_done(&self) -> bool {
        matches!(self, Message::Done)
    }
}
