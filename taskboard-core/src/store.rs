//! Board store: owns the [`BoardState`], applies actions and broadcasts
//! change events and user-facing notices to subscribers.
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::action::Action;
use crate::error::BoardError;
use crate::reducer::BoardState;
use crate::types::Board;

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Transient message for the user (a toast in a UI, a stderr line in the CLI).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// Events emitted by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BoardEvent {
    Changed { revision: u64, action: String },
    Notice(Notice),
}

pub struct BoardStore {
    state: BoardState,
    event_tx: broadcast::Sender<BoardEvent>,
}

impl BoardStore {
    pub fn new(board: Board) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: BoardState::new(board),
            event_tx,
        }
    }

    pub fn state(&self) -> &BoardState {
        &self.state
    }

    pub fn board(&self) -> &Board {
        &self.state.board
    }

    pub fn revision(&self) -> u64 {
        self.state.revision
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BoardEvent> {
        self.event_tx.subscribe()
    }

    /// Apply an action and tell subscribers. Returns the new revision.
    pub fn dispatch(&mut self, action: Action) -> Result<u64, BoardError> {
        let kind = action.kind();
        if let Err(e) = self.state.reduce(action) {
            log::warn!("[taskboard.store] Rejected {}: {}", kind, e);
            return Err(e);
        }
        log::trace!("[taskboard.store] {} -> revision {}", kind, self.state.revision);
        // No subscribers is fine.
        let _ = self.event_tx.send(BoardEvent::Changed {
            revision: self.state.revision,
            action: kind.to_string(),
        });
        Ok(self.state.revision)
    }

    pub fn notify(&self, level: NoticeLevel, message: impl Into<String>) {
        let notice = Notice {
            level,
            message: message.into(),
        };
        match level {
            NoticeLevel::Error => log::warn!("[taskboard.store] Notice: {}", notice.message),
            NoticeLevel::Info => log::info!("[taskboard.store] Notice: {}", notice.message),
        }
        let _ = self.event_tx.send(BoardEvent::Notice(notice));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures::board;
    use crate::types::ColumnId;

    #[test]
    fn test_dispatch_broadcasts_change() {
        let mut store = BoardStore::new(board(vec![(1, "Todo", 0.0, vec![])]));
        let mut rx = store.subscribe();
        let revision = store
            .dispatch(Action::ColumnRenamed {
                column_id: ColumnId(1),
                name: "Doing".into(),
            })
            .unwrap();
        assert_eq!(revision, 1);
        assert_eq!(
            rx.try_recv().unwrap(),
            BoardEvent::Changed {
                revision: 1,
                action: "column.renamed".into()
            }
        );
    }

    #[test]
    fn test_rejected_action_emits_nothing() {
        let mut store = BoardStore::new(board(vec![(1, "Todo", 0.0, vec![])]));
        let mut rx = store.subscribe();
        assert!(store
            .dispatch(Action::ColumnDeleted {
                column_id: ColumnId(2)
            })
            .is_err());
        assert!(rx.try_recv().is_err());
        assert_eq!(store.revision(), 0);
    }

    #[test]
    fn test_notice_reaches_subscribers() {
        let store = BoardStore::new(Board::default());
        let mut rx = store.subscribe();
        store.notify(NoticeLevel::Error, "boom");
        match rx.try_recv().unwrap() {
            BoardEvent::Notice(n) => {
                assert_eq!(n.level, NoticeLevel::Error);
                assert_eq!(n.message, "boom");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_event_wire_shape() {
        let json = serde_json::to_value(BoardEvent::Notice(Notice {
            level: NoticeLevel::Info,
            message: "saved".into(),
        }))
        .unwrap();
        assert_eq!(json["type"], "Notice");
        assert_eq!(json["level"], "info");
    }
}
