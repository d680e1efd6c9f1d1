use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::api::VoteReceipt;
use crate::data::InteractionService;
use crate::storage::Store;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VoteTarget {
    Item(String),
    Comment(String),
}

impl VoteTarget {
    // Stable storage key shared by items and comments; the prefix keeps a
    // paper id and a comment id from colliding.
    pub fn key(&self) -> String {
        match self {
            VoteTarget::Item(id) => format!("paper/{id}"),
            VoteTarget::Comment(id) => format!("comment/{id}"),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            VoteTarget::Item(id) | VoteTarget::Comment(id) => id,
        }
    }
}

pub struct VoteStore {
    interactions: Arc<dyn InteractionService>,
    store: Arc<Store>,
    flags: HashSet<String>,
}

impl VoteStore {
    pub fn load(store: Arc<Store>, interactions: Arc<dyn InteractionService>) -> Result<Self> {
        let flags = store
            .load_vote_flags()
            .context("votes: load persisted flags")?;
        Ok(Self {
            interactions,
            store,
            flags,
        })
    }

    pub fn has_voted(&self, target: &VoteTarget) -> bool {
        self.flags.contains(&target.key())
    }

    // Requests "set my vote to NOT(current local flag)" and commits only on
    // success; a failed toggle changes nothing. The returned count is the
    // server's, never a local guess.
    pub fn toggle(&mut self, target: &VoteTarget) -> Result<VoteReceipt> {
        let receipt = match target {
            VoteTarget::Item(id) => self.interactions.vote_item(id),
            VoteTarget::Comment(id) => self.interactions.vote_comment(id),
        }?;
        self.apply(target, &receipt)?;
        Ok(receipt)
    }

    // Reconciles the local flag with the server's echo. Split out of
    // toggle() so the UI can dispatch the network half on a worker thread
    // and commit here when the response lands.
    pub fn apply(&mut self, target: &VoteTarget, receipt: &VoteReceipt) -> Result<()> {
        let key = target.key();
        if receipt.user_voted {
            self.flags.insert(key.clone());
        } else {
            self.flags.remove(&key);
        }
        self.store
            .set_vote_flag(&key, receipt.user_voted)
            .context("votes: persist flag")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, Comment, VoteReceipt};
    use crate::storage::{Options, Store};
    use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
    use tempfile::tempdir;

    // Flips user_voted on every call the way the board does, or fails on
    // demand without touching anything.
    struct ScriptedService {
        fail: AtomicBool,
        count: AtomicI64,
        voted: AtomicBool,
    }

    impl ScriptedService {
        fn new(count: i64) -> Self {
            Self {
                fail: AtomicBool::new(false),
                count: AtomicI64::new(count),
                voted: AtomicBool::new(false),
            }
        }

        fn receipt(&self) -> Result<VoteReceipt, ApiError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(ApiError::Api {
                    status: 500,
                    message: "boom".into(),
                });
            }
            let voted = !self.voted.load(Ordering::SeqCst);
            self.voted.store(voted, Ordering::SeqCst);
            let delta = if voted { 1 } else { -1 };
            let count = self.count.fetch_add(delta, Ordering::SeqCst) + delta;
            Ok(VoteReceipt {
                vote_count: count,
                user_voted: voted,
            })
        }
    }

    impl InteractionService for ScriptedService {
        fn vote_item(&self, _item_id: &str) -> Result<VoteReceipt, ApiError> {
            self.receipt()
        }

        fn vote_comment(&self, _comment_id: &str) -> Result<VoteReceipt, ApiError> {
            self.receipt()
        }

        fn post_comment(
            &self,
            _item_id: &str,
            _body: &str,
            _parent_id: Option<&str>,
        ) -> Result<Comment, ApiError> {
            unimplemented!("not used by vote tests")
        }

        fn delete_comment(&self, _comment_id: &str) -> Result<(), ApiError> {
            unimplemented!("not used by vote tests")
        }
    }

    fn fixture(count: i64) -> (VoteStore, Arc<ScriptedService>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = Arc::new(
            Store::open(Options {
                path: Some(dir.path().join("state.db")),
            })
            .unwrap(),
        );
        let service = Arc::new(ScriptedService::new(count));
        let votes = VoteStore::load(store, service.clone()).unwrap();
        (votes, service, dir)
    }

    #[test]
    fn successful_toggle_flips_the_flag_and_takes_the_server_count() {
        let (mut votes, _service, _dir) = fixture(5);
        let target = VoteTarget::Item("p1".into());

        assert!(!votes.has_voted(&target));
        let receipt = votes.toggle(&target).unwrap();
        assert!(votes.has_voted(&target));
        assert!(receipt.user_voted);
        assert_eq!(receipt.vote_count, 6);
    }

    #[test]
    fn failed_toggle_changes_nothing() {
        let (mut votes, service, _dir) = fixture(5);
        let target = VoteTarget::Item("p1".into());

        service.fail.store(true, Ordering::SeqCst);
        assert!(votes.toggle(&target).is_err());
        assert!(!votes.has_voted(&target));

        // a voted flag survives a later failure too
        service.fail.store(false, Ordering::SeqCst);
        votes.toggle(&target).unwrap();
        service.fail.store(true, Ordering::SeqCst);
        assert!(votes.toggle(&target).is_err());
        assert!(votes.has_voted(&target));
    }

    #[test]
    fn double_toggle_restores_the_original_flag() {
        let (mut votes, _service, _dir) = fixture(5);
        let target = VoteTarget::Comment("c1".into());

        assert!(!votes.has_voted(&target));
        let first = votes.toggle(&target).unwrap();
        let second = votes.toggle(&target).unwrap();
        assert!(!votes.has_voted(&target));
        assert_eq!(first.vote_count, 6);
        assert_eq!(second.vote_count, 5);
    }

    #[test]
    fn item_and_comment_targets_do_not_collide() {
        let (mut votes, _service, _dir) = fixture(0);
        let item = VoteTarget::Item("41".into());
        let comment = VoteTarget::Comment("41".into());

        votes.toggle(&item).unwrap();
        assert!(votes.has_voted(&item));
        assert!(!votes.has_voted(&comment));
    }

    #[test]
    fn applied_receipts_persist_across_a_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.db");
        let service = Arc::new(ScriptedService::new(0));
        {
            let store = Arc::new(
                Store::open(Options {
                    path: Some(path.clone()),
                })
                .unwrap(),
            );
            let mut votes = VoteStore::load(store, service.clone()).unwrap();
            votes.toggle(&VoteTarget::Item("p1".into())).unwrap();
        }

        let store = Arc::new(Store::open(Options { path: Some(path) }).unwrap());
        let votes = VoteStore::load(store, service).unwrap();
        assert!(votes.has_voted(&VoteTarget::Item("p1".into())));
    }
}
