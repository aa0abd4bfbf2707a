//! Worker host: a dedicated OS thread owning one `pls-engine` instance,
//! processing a FIFO queue of commands (spec §4.4, §5 "two logical
//! threads"). Grounded in the teacher's `AppState`/Tauri-command pairing
//! (`engine_state.rs`, `commands.rs`), generalized from Tauri's
//! request-handler-per-command model into an explicit channel-based
//! dispatcher that any caller (the controller, a CLI, a test) can drive.

mod command;
mod state;

pub use command::{Command, Response};
pub use state::{ProjectState, StateError};

use std::sync::mpsc;
use std::thread::{self, JoinHandle};

struct Envelope {
    command: Command,
    reply: mpsc::Sender<Response>,
}

/// A handle to the worker thread. Dropping it sends `DISPOSE` and joins the
/// thread, releasing engine resources (spec §4.4 `DISPOSE`).
pub struct WorkerHost {
    command_tx: mpsc::Sender<Envelope>,
    join_handle: Option<JoinHandle<()>>,
}

impl WorkerHost {
    pub fn spawn() -> Self {
        let (command_tx, command_rx) = mpsc::channel::<Envelope>();

        let join_handle = thread::Builder::new()
            .name("pls-worker".into())
            .spawn(move || run_worker_loop(command_rx))
            .expect("spawning the worker thread");

        WorkerHost {
            command_tx,
            join_handle: Some(join_handle),
        }
    }

    /// Enqueue `command` and block until its response is produced. Because
    /// the worker processes one command at a time and replies before
    /// starting the next, callers that invoke `dispatch` from a single
    /// thread observe strict FIFO ordering (spec §5 "Ordering guarantees").
    pub fn dispatch(&self, command: Command) -> Response {
        let (reply_tx, reply_rx) = mpsc::channel();
        let envelope = Envelope { command, reply: reply_tx };
        if self.command_tx.send(envelope).is_err() {
            return Response::Error {
                message: "worker thread has already shut down".to_string(),
            };
        }
        reply_rx.recv().unwrap_or(Response::Error {
            message: "worker thread dropped its reply channel".to_string(),
        })
    }
}

impl Drop for WorkerHost {
    fn drop(&mut self) {
        let _ = self.dispatch(Command::Dispose);
        if let Some(handle) = self.join_handle.take() {
            let _ = handle.join();
        }
    }
}

fn run_worker_loop(command_rx: mpsc::Receiver<Envelope>) {
    let mut state = ProjectState::new();

    while let Ok(envelope) = command_rx.recv() {
        let dispose = matches!(envelope.command, Command::Dispose);
        let response = handle_command(&mut state, envelope.command);
        let _ = envelope.reply.send(response);
        if dispose {
            break;
        }
    }
}

fn handle_command(state: &mut ProjectState, command: Command) -> Response {
    match command {
        Command::Initialize { tasks, calendar } => {
            if let Err(e) = pls_core::validate_project(&tasks) {
                return Response::Error { message: e.to_string() };
            }
            state.initialize(tasks, calendar);
            Response::Initialized
        }
        Command::AddTask { task } => match state.add_task(task) {
            Ok(()) => recalculate(state),
            Err(e) => Response::Error { message: e.to_string() },
        },
        Command::UpdateTask { id, patch } => match state.update_task(&id, &patch) {
            Ok(()) => recalculate(state),
            Err(e) => Response::Error { message: e.to_string() },
        },
        Command::DeleteTask { id } => match state.delete_task(&id) {
            Ok(()) => recalculate(state),
            Err(e) => Response::Error { message: e.to_string() },
        },
        Command::SyncTasks { tasks } => {
            if let Err(e) = pls_core::validate_project(&tasks) {
                return Response::Error { message: e.to_string() };
            }
            state.sync_tasks(tasks);
            let result = pls_engine::calculate(state.tasks(), state.calendar());
            Response::TasksSynced {
                tasks: result.tasks,
                stats: result.stats,
            }
        }
        Command::UpdateCalendar { calendar } => {
            state.set_calendar(calendar);
            recalculate(state)
        }
        Command::Calculate => recalculate(state),
        Command::Dispose => {
            state.clear();
            Response::Ready
        }
    }
}

fn recalculate(state: &ProjectState) -> Response {
    let result = pls_engine::calculate(state.tasks(), state.calendar());
    if let Some(error) = result.stats.error.clone() {
        tracing::warn!(%error, "calculation returned a fatal error; surfacing to caller");
    }
    for warning in &result.stats.warnings {
        tracing::warn!(%warning, "calculation warning");
    }
    Response::CalculationResult {
        tasks: result.tasks,
        stats: result.stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pls_core::{Calendar, Task};

    #[test]
    fn initialize_then_calculate_round_trips() {
        let host = WorkerHost::spawn();
        let mut a = Task::new("a", "V", 3);
        a.start = Some("2024-01-01".into());
        let response = host.dispatch(Command::Initialize {
            tasks: vec![a],
            calendar: Calendar::default(),
        });
        assert_eq!(response, Response::Initialized);

        let response = host.dispatch(Command::Calculate);
        match response {
            Response::CalculationResult { tasks, .. } => {
                assert_eq!(tasks[0].end.as_deref(), Some("2024-01-03"));
            }
            other => panic!("expected CalculationResult, got {other:?}"),
        }
    }

    #[test]
    fn commands_are_processed_fifo() {
        let host = WorkerHost::spawn();
        host.dispatch(Command::Initialize {
            tasks: Vec::new(),
            calendar: Calendar::default(),
        });
        for i in 0..5 {
            let response = host.dispatch(Command::AddTask {
                task: Task::new(format!("t{i}"), "V", 1),
            });
            match response {
                Response::CalculationResult { tasks, .. } => {
                    assert_eq!(tasks.len(), i + 1);
                }
                other => panic!("expected CalculationResult, got {other:?}"),
            }
        }
    }

    #[test]
    fn update_unknown_task_surfaces_error_without_panicking() {
        let host = WorkerHost::spawn();
        host.dispatch(Command::Initialize {
            tasks: Vec::new(),
            calendar: Calendar::default(),
        });
        let response = host.dispatch(Command::UpdateTask {
            id: "missing".into(),
            patch: Default::default(),
        });
        assert!(matches!(response, Response::Error { .. }));
    }

    #[test]
    fn dispose_shuts_down_the_worker_thread() {
        let host = WorkerHost::spawn();
        let response = host.dispatch(Command::Dispose);
        assert_eq!(response, Response::Ready);
    }
}
