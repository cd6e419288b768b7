mod notifier;

pub use notifier::{MutationFailure, Notifier, SubscriptionId};
