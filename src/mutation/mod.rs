mod pending;

pub use pending::{
    MutationId, MutationKind, MutationOutcome, MutationState, MutationTarget, PendingMutation,
    RollbackSnapshot,
};
