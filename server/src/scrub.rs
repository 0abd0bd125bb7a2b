//! Per-viewer projection of the action log

use shared::{Action, SessionStatus};

/// Who an action is being rendered for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    /// A player seated in a live game
    Seat(usize),
    Spectator,
    /// Someone looking at a finished game
    Replay,
}

impl Viewer {
    /// Role a session plays with respect to a game. Only a seated player in a
    /// live game has anything hidden from them, whatever their status says.
    pub fn for_session(status: SessionStatus, seat: Option<usize>, live: bool) -> Self {
        match seat {
            Some(seat) if live => Viewer::Seat(seat),
            _ if status.is_replay() => Viewer::Replay,
            _ => Viewer::Spectator,
        }
    }
}

/// Copy of `action` with everything `viewer` may not see removed
pub fn scrub(action: &Action, viewer: Viewer) -> Action {
    match (action, viewer) {
        (Action::Draw { who, order, .. }, Viewer::Seat(seat)) if *who == seat => Action::Draw {
            who: *who,
            order: *order,
            card: None,
        },
        _ => action.clone(),
    }
}

pub fn scrub_all(actions: &[Action], viewer: Viewer) -> Vec<Action> {
    actions.iter().map(|a| scrub(a, viewer)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{CardIdentity, Clue, EndCondition};

    fn sample_log() -> Vec<Action> {
        let card = CardIdentity { suit: 2, rank: 1 };
        vec![
            Action::Draw {
                who: 0,
                order: 0,
                card: Some(card),
            },
            Action::Draw {
                who: 1,
                order: 1,
                card: Some(CardIdentity { suit: 0, rank: 4 }),
            },
            Action::Clue {
                giver: 1,
                target: 0,
                clue: Clue::Color(2),
                list: vec![0],
                turn: 0,
            },
            Action::Play {
                who: 0,
                order: 0,
                card,
            },
            Action::Turn { num: 1, who: 1 },
            Action::GameOver {
                end_condition: EndCondition::Normal,
                score: 1,
                loss: false,
            },
        ]
    }

    const VIEWERS: [Viewer; 4] = [
        Viewer::Seat(0),
        Viewer::Seat(1),
        Viewer::Spectator,
        Viewer::Replay,
    ];

    #[test]
    fn test_own_draw_hidden() {
        let log = sample_log();
        let scrubbed = scrub_all(&log, Viewer::Seat(0));
        assert_eq!(
            scrubbed[0],
            Action::Draw {
                who: 0,
                order: 0,
                card: None
            }
        );
        assert_eq!(scrubbed[1], log[1]);
    }

    #[test]
    fn test_spectator_and_replay_see_everything() {
        let log = sample_log();
        assert_eq!(scrub_all(&log, Viewer::Spectator), log);
        assert_eq!(scrub_all(&log, Viewer::Replay), log);
    }

    #[test]
    fn test_scrub_is_idempotent() {
        for action in sample_log() {
            for viewer in VIEWERS {
                let once = scrub(&action, viewer);
                assert_eq!(scrub(&once, viewer), once);
            }
        }
    }

    #[test]
    fn test_scrub_preserves_order_and_length() {
        let log = sample_log();
        for viewer in VIEWERS {
            let scrubbed = scrub_all(&log, viewer);
            assert_eq!(scrubbed.len(), log.len());
            for (before, after) in log.iter().zip(&scrubbed) {
                assert_eq!(before.kind(), after.kind());
            }
        }
    }

    #[test]
    fn test_viewer_for_session() {
        assert_eq!(
            Viewer::for_session(SessionStatus::Playing, Some(2), true),
            Viewer::Seat(2)
        );
        assert_eq!(
            Viewer::for_session(SessionStatus::Playing, Some(2), false),
            Viewer::Spectator
        );
        assert_eq!(
            Viewer::for_session(SessionStatus::Spectating, None, true),
            Viewer::Spectator
        );
        assert_eq!(
            Viewer::for_session(SessionStatus::Spectating, Some(1), true),
            Viewer::Seat(1)
        );
        assert_eq!(
            Viewer::for_session(SessionStatus::Lobby, Some(0), true),
            Viewer::Seat(0)
        );
        assert_eq!(
            Viewer::for_session(SessionStatus::Replay, Some(0), false),
            Viewer::Replay
        );
        assert_eq!(
            Viewer::for_session(SessionStatus::SharedReplay, None, true),
            Viewer::Replay
        );
    }
}
