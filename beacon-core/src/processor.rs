use beacon_types::protocol::{Event, Transaction};

use crate::hint::Hint;

/// A processing stage that can enrich or veto items before sending.
///
/// Processors registered on a scope run before the globally configured ones;
/// within each group they run in ascending [`order`](EventProcessor::order).
/// Returning `None` drops the item. A processor that panics is skipped and
/// the item continues unchanged.
pub trait EventProcessor: Send + Sync {
    /// A diagnostic name used in log lines about this processor.
    fn name(&self) -> &str {
        std::any::type_name_of_val(self)
    }

    /// Position of this processor among the globally configured ones.
    fn order(&self) -> i32 {
        0
    }

    /// Processes an error event.
    fn process_event(&self, event: Event, hint: &Hint) -> Option<Event> {
        let _ = hint;
        Some(event)
    }

    /// Processes a transaction.
    fn process_transaction(&self, transaction: Transaction, hint: &Hint) -> Option<Transaction> {
        let _ = hint;
        Some(transaction)
    }
}

impl<F> EventProcessor for F
where
    F: Fn(Event, &Hint) -> Option<Event> + Send + Sync,
{
    fn process_event(&self, event: Event, hint: &Hint) -> Option<Event> {
        self(event, hint)
    }
}
