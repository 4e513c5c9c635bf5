//! Background evaluation worker.
//!
//! The UI thread owns the session and the controller state machine; the worker
//! only runs `EvalJob`s and sends the outcomes back over `mpsc`. Evaluation
//! fans out on a private rayon pool, not the global one.

use std::io;
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use macrodash_core::{EvalJob, EvalOutcome, SeriesEvaluator};

/// Commands sent from the UI to the worker.
#[derive(Debug)]
pub enum WorkerCommand {
    Evaluate(EvalJob),
    Shutdown,
}

/// Responses sent from the worker back to the UI.
#[derive(Debug)]
pub enum WorkerResponse {
    Outcome(EvalOutcome),
}

/// Spawn the evaluation thread.
pub fn spawn_worker(
    evaluator: Arc<SeriesEvaluator>,
    rx: Receiver<WorkerCommand>,
    tx: Sender<WorkerResponse>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("macrodash-worker".into())
        .spawn(move || worker_loop(&evaluator, rx, tx))
}

fn worker_loop(evaluator: &SeriesEvaluator, rx: Receiver<WorkerCommand>, tx: Sender<WorkerResponse>) {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(evaluator.plan().len().max(1))
        .thread_name(|i| format!("macrodash-pool-{i}"))
        .build()
        .map_err(|e| warn!(error = %e, "private pool unavailable; using the global pool"))
        .ok();

    loop {
        match rx.recv() {
            Ok(WorkerCommand::Shutdown) | Err(_) => break,
            Ok(WorkerCommand::Evaluate(job)) => {
                debug!(cycle = job.cycle, "worker evaluating");
                let outcome = match &pool {
                    Some(pool) => pool.install(|| job.run(evaluator)),
                    None => job.run(evaluator),
                };
                if tx.send(WorkerResponse::Outcome(outcome)).is_err() {
                    break;
                }
            }
        }
    }
    debug!("worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use macrodash_core::{CycleFailure, DashboardConfig, SeriesBundle, Session};
    use std::sync::mpsc;
    use std::time::{Duration, Instant};

    #[test]
    fn worker_runs_jobs_and_shuts_down() {
        let mut session = Session::new(
            DashboardConfig::builtin(),
            mpsc::channel::<Arc<SeriesBundle>>().0,
            mpsc::channel::<CycleFailure>().0,
        )
        .unwrap();
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (resp_tx, resp_rx) = mpsc::channel();
        let handle = spawn_worker(session.evaluator(), cmd_rx, resp_tx).unwrap();

        let job = session.next_job(Instant::now()).unwrap();
        let cycle = job.cycle;
        cmd_tx.send(WorkerCommand::Evaluate(job)).unwrap();

        let WorkerResponse::Outcome(outcome) = resp_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(outcome.cycle, cycle);
        assert!(outcome.result.is_ok());

        cmd_tx.send(WorkerCommand::Shutdown).unwrap();
        handle.join().unwrap();
    }
}
