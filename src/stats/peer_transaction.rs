//! Peer-storage transaction (spec §4.7): applies an incoming shard's
//! df-change batch, detecting terms the sender believed were new but that
//! this shard already tracks, and replying with this shard's own
//! contribution so the peer can fold it into its global view. Grounded in
//! `storage/peerStorageTransaction.cpp`'s provisional-id / reply-on-commit
//! protocol, re-expressed over (type, value) strings rather than raw
//! term-ids since term-id resolution is this crate's symbol-table's job.

/// One df-change as pushed by a peer shard.
#[derive(Debug, Clone)]
pub struct PeerDfChange {
    pub term_type: String,
    pub term_value: String,
    pub delta: i32,
    /// The sender believes this term does not yet exist anywhere in the
    /// cluster.
    pub is_new: bool,
}

/// One entry in the reply blob: tells the peer this shard's own
/// contribution to a term it thought was new.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerReplyEntry {
    pub term_type: String,
    pub term_value: String,
    pub delta: i32,
    pub is_new: bool,
}

/// A (type, value, signed delta) to fold into the statistics cache once
/// the caller resolves (type, value) to a term-id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDelta {
    pub term_type: String,
    pub term_value: String,
    pub delta: i32,
}

#[derive(Debug, Default)]
pub struct PeerTransaction {
    staged: Vec<PeerDfChange>,
}

impl PeerTransaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, change: PeerDfChange) {
        self.staged.push(change);
    }

    /// `local_df` resolves a (type, value) pair to this shard's own
    /// already-tracked df, if any; `None` means the term does not exist
    /// here yet.
    pub fn commit(&mut self, local_df: impl Fn(&str, &str) -> Option<i64>) -> (Vec<ResolvedDelta>, Vec<PeerReplyEntry>) {
        let mut deltas = Vec::with_capacity(self.staged.len());
        let mut reply = Vec::new();

        for change in std::mem::take(&mut self.staged) {
            if change.is_new {
                if let Some(existing_df) = local_df(&change.term_type, &change.term_value) {
                    reply.push(PeerReplyEntry {
                        term_type: change.term_type.clone(),
                        term_value: change.term_value.clone(),
                        delta: existing_df as i32,
                        is_new: false,
                    });
                }
            }
            deltas.push(ResolvedDelta { term_type: change.term_type, term_value: change.term_value, delta: change.delta });
        }
        (deltas, reply)
    }

    /// Clears staging without applying anything.
    pub fn rollback(&mut self) {
        self.staged.clear();
    }
}
