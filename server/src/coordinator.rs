//! The global lock around the lobby and the timer tasks that re-enter it

use crate::lobby::Lobby;
use crate::session::EventSender;
use crate::timers::TimerRequest;
use log::debug;
use shared::{Command, SessionId, UserId};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::sleep;

/// Cloneable handle to the one lobby in the process. Every mutation of game
/// or session state goes through [`Coordinator::with_lobby`], so the order of
/// mutations is the order the lock is acquired in.
#[derive(Clone)]
pub struct Coordinator {
    lobby: Arc<Mutex<Lobby>>,
}

impl Coordinator {
    pub fn new(lobby: Lobby) -> Self {
        Self {
            lobby: Arc::new(Mutex::new(lobby)),
        }
    }

    /// Runs `f` under the lock. Timers requested inside are spawned after
    /// the lock is released.
    pub async fn with_lobby<R>(&self, f: impl FnOnce(&mut Lobby) -> R) -> R {
        let (result, timers) = {
            let mut lobby = self.lobby.lock().await;
            let result = f(&mut lobby);
            (result, lobby.take_timers())
        };
        self.spawn_timers(timers);
        result
    }

    fn spawn_timers(&self, timers: Vec<TimerRequest>) {
        for request in timers {
            let coordinator = self.clone();
            tokio::spawn(async move {
                let delay = request.delay();
                debug!("Timer armed for {:?}: {:?}", delay, request);
                sleep(delay).await;
                coordinator.with_lobby(|lobby| lobby.fire_timer(&request)).await;
            });
        }
    }

    pub async fn connect(&self, user_id: UserId, username: String, sender: EventSender) -> SessionId {
        self.with_lobby(|lobby| lobby.connect(user_id, username, sender))
            .await
    }

    pub async fn disconnect(&self, session_id: SessionId) {
        self.with_lobby(|lobby| lobby.disconnect(session_id)).await
    }

    pub async fn dispatch(&self, session_id: SessionId, command: Command) {
        self.with_lobby(|lobby| lobby.dispatch(session_id, command))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::store::MemoryStore;
    use shared::{Options, ServerEvent};
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn coordinator(config: ServerConfig) -> Coordinator {
        Coordinator::new(Lobby::new(config, Arc::new(MemoryStore::new())))
    }

    #[tokio::test]
    async fn test_with_lobby_returns_result() {
        let coordinator = coordinator(ServerConfig::default());
        let (tx, _rx) = mpsc::unbounded_channel();
        let session = coordinator.connect(1, "ann".to_string(), tx).await;
        let count = coordinator.with_lobby(|lobby| lobby.sessions_len()).await;
        assert_eq!(count, 1);

        coordinator.disconnect(session).await;
        let count = coordinator.with_lobby(|lobby| lobby.sessions_len()).await;
        assert_eq!(count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_timer_spawned_and_fires() {
        let config = ServerConfig::default().with_idle_timeout(Duration::from_secs(60));
        let coordinator = coordinator(config);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let session = coordinator.connect(1, "ann".to_string(), tx).await;

        coordinator
            .dispatch(
                session,
                Command::CreateTable {
                    name: "idle".to_string(),
                    password: String::new(),
                    options: Options::default(),
                },
            )
            .await;
        assert_eq!(coordinator.with_lobby(|l| l.games_len()).await, 1);

        sleep(Duration::from_secs(62)).await;
        tokio::task::yield_now().await;

        assert_eq!(coordinator.with_lobby(|l| l.games_len()).await, 0);
        let mut last_status = None;
        while let Ok(event) = rx.try_recv() {
            if let ServerEvent::SessionStatus { status, .. } = event {
                last_status = Some(status);
            }
        }
        assert_eq!(last_status, Some(shared::SessionStatus::Lobby));
    }
}
