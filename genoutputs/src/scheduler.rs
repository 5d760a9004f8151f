//! Bounded worker pool: one task per module, results logged in completion order.
//!
//! A feeder thread turns incoming module paths into jobs. `jobs` worker
//! threads pull from the shared queue and send each finished batch back to the
//! calling thread, which is the only writer of the output log.

use std::any::Any;
use std::fs;
use std::io::Write;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Mutex;
use std::thread;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::core::module::module_base;
use crate::core::result::{ErrorInfo, OutcomeRecord};
use crate::io::config::CampaignConfig;
use crate::io::driver::Driver;
use crate::io::output_log::OutputLog;
use crate::io::progress::Progress;
use crate::io::seeds::SeedSet;
use crate::io::worker::{ModuleJob, run_module};

/// Counts for one pool run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolSummary {
    pub submitted: u64,
    pub completed: u64,
    /// Modules whose task failed outside the driver (logged as `Error`).
    pub failed: u64,
}

struct Failure {
    exception: &'static str,
    message: String,
}

struct Completion {
    job: ModuleJob,
    result: Result<Vec<OutcomeRecord>, Failure>,
}

enum Event {
    Submitted,
    Finished(Completion),
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn next_job(queue: &Mutex<Receiver<ModuleJob>>) -> Option<ModuleJob> {
    let receiver = match queue.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    receiver.recv().ok()
}

fn execute<D: Driver + ?Sized>(
    driver: &D,
    job: &ModuleJob,
    seeds: &SeedSet,
    config: &CampaignConfig,
) -> Result<Vec<OutcomeRecord>, Failure> {
    let attempt = catch_unwind(AssertUnwindSafe(|| {
        fs::create_dir_all(&job.worker_dir)
            .with_context(|| format!("create {}", job.worker_dir.display()))?;
        run_module(driver, job, seeds, &config.driver)
    }));
    match attempt {
        Ok(Ok(records)) => Ok(records),
        Ok(Err(err)) => Err(Failure {
            exception: "Error",
            message: format!("{err:#}"),
        }),
        Err(payload) => Err(Failure {
            exception: "panic",
            message: panic_message(payload),
        }),
    }
}

fn worker_loop<D: Driver + ?Sized>(
    driver: &D,
    queue: &Mutex<Receiver<ModuleJob>>,
    events: Sender<Event>,
    abort: &AtomicBool,
    seeds: &SeedSet,
    config: &CampaignConfig,
) {
    while let Some(job) = next_job(queue) {
        if abort.load(Ordering::SeqCst) {
            break;
        }
        let result = execute(driver, &job, seeds, config);
        if events.send(Event::Finished(Completion { job, result })).is_err() {
            break;
        }
    }
}

/// Run every module yielded by `modules` and append its records to `log`.
///
/// `expected` is the announced module count, used only for progress. Failures
/// outside the driver become `N` `Error` records for the module, unless
/// `config.raise_errors` is set, in which case the first one stops the pool
/// (modules already running finish, nothing new starts) and is returned.
#[instrument(skip_all, fields(jobs = config.job_limit(), expected))]
pub fn run_pool<D, I, W>(
    driver: &D,
    modules: I,
    expected: u64,
    seeds: &SeedSet,
    config: &CampaignConfig,
    log: &mut OutputLog<W>,
) -> Result<PoolSummary>
where
    D: Driver + Sync + ?Sized,
    I: IntoIterator<Item = PathBuf>,
    I::IntoIter: Send,
    W: Write,
{
    let jobs = config.job_limit().max(1);
    let iterations = config.driver.num_iterations as usize;
    let function_name = config.driver.function_name.as_str();
    let (job_tx, job_rx) = mpsc::channel::<ModuleJob>();
    let queue = Mutex::new(job_rx);
    let abort = AtomicBool::new(false);
    let modules = modules.into_iter();

    thread::scope(|scope| {
        let (event_tx, event_rx) = mpsc::channel::<Event>();

        let feeder_events = event_tx.clone();
        let abort_ref = &abort;
        let output_dir = config.output_dir.as_path();
        scope.spawn(move || {
            for module_path in modules {
                if abort_ref.load(Ordering::SeqCst) {
                    break;
                }
                let job = ModuleJob {
                    worker_dir: output_dir.join(module_base(&module_path)),
                    module_path,
                };
                debug!(module = %job.module_path.display(), "submitting module");
                if job_tx.send(job).is_err() || feeder_events.send(Event::Submitted).is_err() {
                    break;
                }
            }
        });

        for _ in 0..jobs {
            let events = event_tx.clone();
            let queue = &queue;
            let abort = &abort;
            scope.spawn(move || worker_loop(driver, queue, events, abort, seeds, config));
        }
        drop(event_tx);

        let mut progress = Progress::new(config.progress, "modules", expected);
        let mut summary = PoolSummary::default();
        for event in event_rx {
            let completion = match event {
                Event::Submitted => {
                    summary.submitted += 1;
                    progress.grow_to(summary.submitted);
                    continue;
                }
                Event::Finished(completion) => completion,
            };
            let module = completion.job.module_str();
            let records = match completion.result {
                Ok(records) => records,
                Err(failure) => {
                    if config.raise_errors {
                        abort.store(true, Ordering::SeqCst);
                        progress.finish();
                        return Err(anyhow!(
                            "module {module} failed: {}: {}",
                            failure.exception,
                            failure.message
                        ));
                    }
                    warn!(module = %module, exception = failure.exception, message = %failure.message, "module task failed");
                    summary.failed += 1;
                    let error = ErrorInfo::new(failure.exception, failure.message, &module);
                    vec![OutcomeRecord::scheduling_error(&module, function_name, error); iterations]
                }
            };
            if let Err(err) = log.append_all(&records) {
                abort.store(true, Ordering::SeqCst);
                progress.finish();
                return Err(err).with_context(|| format!("log records for {module}"));
            }
            summary.completed += 1;
            progress.inc();
            debug!(module = %module, records = records.len(), "module completed");
        }
        progress.finish();
        info!(
            submitted = summary.submitted,
            completed = summary.completed,
            failed = summary.failed,
            "all modules finished"
        );
        Ok(summary)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::result::ResultKind;
    use crate::io::config::ProgressMode;
    use crate::io::driver::DriverExit;
    use crate::test_support::{ScriptedDriver, ScriptedRun, log_records, write_module};
    use std::io;
    use std::path::Path;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn config(root: &Path, n: u32, jobs: usize) -> CampaignConfig {
        let mut config = CampaignConfig {
            output_dir: root.join("out"),
            jobs: Some(jobs),
            progress: ProgressMode::Hidden,
            ..CampaignConfig::default()
        };
        config.driver.num_iterations = n;
        config
    }

    fn run(
        driver: &ScriptedDriver,
        modules: Vec<PathBuf>,
        config: &CampaignConfig,
    ) -> (Result<PoolSummary>, Vec<OutcomeRecord>) {
        let mut log = OutputLog::create(Vec::new(), config).expect("log");
        let expected = modules.len() as u64;
        let result = run_pool(driver, modules, expected, &SeedSet::default(), config, &mut log);
        (result, log_records(&log.into_inner()))
    }

    #[test]
    fn every_module_gets_n_records() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mods = temp.path().join("mods");
        let a = write_module(&mods, "var_0000.complete.py");
        let b = write_module(&mods, "var_0001.infilled.py");
        let driver = ScriptedDriver::new().with(
            "var_0000.complete.py",
            ScriptedRun::records(vec![ResultKind::Success, ResultKind::Timeout]),
        );
        let cfg = config(temp.path(), 4, 2);
        let (result, records) = run(&driver, vec![a.clone(), b.clone()], &cfg);
        let summary = result.expect("pool");
        assert_eq!(summary.submitted, 2);
        assert_eq!(summary.completed, 2);
        assert_eq!(records.len(), 8);
        for module in [&a, &b] {
            let path = module.display().to_string();
            assert_eq!(records.iter().filter(|r| r.module_path == path).count(), 4);
        }
        assert!(temp.path().join("out/var_0000.complete").is_dir());
    }

    #[test]
    fn records_arrive_in_completion_order() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mods = temp.path().join("mods");
        let slow = write_module(&mods, "var_0000.complete.py");
        let fast = write_module(&mods, "var_0001.complete.py");
        let driver = ScriptedDriver::new()
            .with(
                "var_0000.complete.py",
                ScriptedRun::records(vec![ResultKind::Success]).after(Duration::from_millis(400)),
            )
            .with(
                "var_0001.complete.py",
                ScriptedRun::records(vec![ResultKind::Success]),
            );
        let cfg = config(temp.path(), 1, 2);
        let (result, records) = run(&driver, vec![slow.clone(), fast.clone()], &cfg);
        result.expect("pool");
        let order: Vec<&str> = records.iter().map(|r| r.module_path.as_str()).collect();
        let (slow, fast) = (slow.display().to_string(), fast.display().to_string());
        assert_eq!(order, vec![fast.as_str(), slow.as_str()]);
    }

    #[test]
    fn panicking_task_is_logged_as_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mods = temp.path().join("mods");
        let module = write_module(&mods, "var_0000.diffmode.py");
        let driver = ScriptedDriver::new().with("var_0000.diffmode.py", ScriptedRun::panicking("kaboom"));
        let cfg = config(temp.path(), 3, 1);
        let (result, records) = run(&driver, vec![module], &cfg);
        let summary = result.expect("pool");
        assert_eq!(summary.failed, 1);
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.result_type == ResultKind::Error));
        let error = records[0].error.as_ref().expect("error");
        assert_eq!(error.exception, "panic");
        assert_eq!(error.message, "kaboom");
    }

    #[test]
    fn missing_module_is_logged_as_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = config(temp.path(), 2, 1);
        let (result, records) = run(
            &ScriptedDriver::new(),
            vec![temp.path().join("mods/var_0009.complete.py")],
            &cfg,
        );
        assert_eq!(result.expect("pool").failed, 1);
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.result_type == ResultKind::Error));
    }

    #[test]
    fn raise_errors_stops_the_pool() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mods = temp.path().join("mods");
        let module = write_module(&mods, "var_0000.complete.py");
        let driver = ScriptedDriver::new().with("var_0000.complete.py", ScriptedRun::panicking("boom"));
        let mut cfg = config(temp.path(), 2, 1);
        cfg.raise_errors = true;
        let (result, records) = run(&driver, vec![module], &cfg);
        let err = result.unwrap_err();
        assert!(err.to_string().contains("boom"));
        assert!(records.is_empty());
    }

    /// Takes the header, then fails every write.
    #[derive(Default)]
    struct FullDisk {
        header_done: bool,
    }

    impl Write for FullDisk {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.header_done {
                Err(io::Error::other("disk full"))
            } else {
                Ok(buf.len())
            }
        }

        fn flush(&mut self) -> io::Result<()> {
            self.header_done = true;
            Ok(())
        }
    }

    #[test]
    fn log_write_failure_stops_reading_modules() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = config(temp.path(), 2, 1);
        let mods = temp.path().join("mods");
        let pulled = AtomicUsize::new(0);
        let pulled_ref = &pulled;
        let modules = (0..20).map(move |i| {
            if pulled_ref.fetch_add(1, Ordering::SeqCst) > 0 {
                thread::sleep(Duration::from_millis(50));
            }
            mods.join(format!("var_{i:04}.complete.py"))
        });

        let mut log = OutputLog::create(FullDisk::default(), &cfg).expect("header");
        let err = run_pool(&ScriptedDriver::new(), modules, 20, &SeedSet::default(), &cfg, &mut log)
            .unwrap_err();
        assert!(format!("{err:#}").contains("disk full"));
        assert!(pulled.load(Ordering::SeqCst) < 10, "feeder kept reading modules");
    }

    #[test]
    fn driver_failures_are_not_scheduling_errors() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mods = temp.path().join("mods");
        let module = write_module(&mods, "var_0000.complete.py");
        let driver = ScriptedDriver::new().with(
            "var_0000.complete.py",
            ScriptedRun::exit(DriverExit::SpawnFailed("no such file".to_string())),
        );
        let mut cfg = config(temp.path(), 2, 1);
        cfg.raise_errors = true;
        let (result, records) = run(&driver, vec![module], &cfg);
        assert_eq!(result.expect("pool").failed, 0);
        assert!(records.iter().all(|r| r.result_type == ResultKind::RunError));
    }

    #[test]
    fn empty_module_list_finishes() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = config(temp.path(), 2, 3);
        let (result, records) = run(&ScriptedDriver::new(), Vec::new(), &cfg);
        assert_eq!(result.expect("pool"), PoolSummary::default());
        assert!(records.is_empty());
    }
}
