//! Process queue.
//!
//! Runs processes against one project strictly in the order they were
//! queued. Immediate processes run as soon as they are queued, after
//! everything queued before them; deferred ones wait for [`ProcessQueue::drain`].
//! A failing process is recorded and the queue moves on.

use std::collections::VecDeque;

use crate::error::ProjectError;
use crate::logs::{log_error_indent, log_info_indent};
use crate::operations::Process;
use crate::project::Project;

/// A process waiting in the queue, tagged with the recipe step it came from.
pub struct QueuedProcess {
    pub index: usize,
    pub kind: String,
    pub process: Box<dyn Process>,
}

/// What happened to one queued process.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessOutcome {
    pub index: usize,
    pub kind: String,
    pub description: String,
    pub result: Result<(), ProjectError>,
}

/// FIFO of processes bound to one project.
#[derive(Default)]
pub struct ProcessQueue {
    pending: VecDeque<QueuedProcess>,
    outcomes: Vec<ProcessOutcome>,
}

impl ProcessQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a process. Immediate processes (the default) drain the queue
    /// right away so they see the project as left by every earlier step.
    pub fn queue_process(
        &mut self,
        project: &mut Project,
        index: usize,
        kind: impl Into<String>,
        process: Box<dyn Process>,
    ) {
        let immediate = process.is_immediate();
        self.pending.push_back(QueuedProcess {
            index,
            kind: kind.into(),
            process,
        });

        if immediate {
            self.drain(project);
        }
    }

    /// Run every pending process in queue order.
    pub fn drain(&mut self, project: &mut Project) {
        while let Some(queued) = self.pending.pop_front() {
            let outcome = run_one(project, queued);
            self.outcomes.push(outcome);
        }
    }

    /// Number of processes still waiting.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Outcomes recorded so far, in execution order.
    pub fn take_outcomes(&mut self) -> Vec<ProcessOutcome> {
        std::mem::take(&mut self.outcomes)
    }
}

fn run_one(project: &mut Project, queued: QueuedProcess) -> ProcessOutcome {
    let QueuedProcess { index, kind, process } = queued;
    let description = process.describe();

    let result = process.run(project).and_then(|()| {
        // A process that leaves ragged rows is reported, and the grid padded
        // so the next step still sees one cell per column.
        project.check_consistency().map_err(|err| {
            project.update();
            err
        })
    });

    match &result {
        Ok(()) => log_info_indent(format!("[{}] {}", index, description), 1),
        Err(err) => log_error_indent(format!("[{}] {} failed: {}", index, description, err), 1),
    }

    ProcessOutcome {
        index,
        kind,
        description,
        result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProjectResult;
    use crate::project::Column;
    use std::sync::{Arc, Mutex};

    /// Appends its label to a shared log and optionally to a column named after it.
    struct Record {
        label: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
        immediate: bool,
        fail: bool,
    }

    impl Process for Record {
        fn describe(&self) -> String {
            self.label.to_string()
        }

        fn is_immediate(&self) -> bool {
            self.immediate
        }

        fn run(self: Box<Self>, project: &mut Project) -> ProjectResult<()> {
            self.log.lock().unwrap().push(self.label);
            if self.fail {
                return Err(ProjectError::UnknownColumn(self.label.into()));
            }
            let position = project.column_count();
            project.add_column(position, Column::new(self.label))
        }
    }

    fn record(label: &'static str, log: &Arc<Mutex<Vec<&'static str>>>, immediate: bool, fail: bool) -> Box<dyn Process> {
        Box::new(Record { label, log: log.clone(), immediate, fail })
    }

    #[test]
    fn test_immediate_runs_on_queue() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut project = Project::new();
        let mut queue = ProcessQueue::new();

        queue.queue_process(&mut project, 0, "t", record("a", &log, true, false));

        assert_eq!(queue.pending(), 0);
        assert_eq!(project.column_names(), vec!["a"]);
    }

    #[test]
    fn test_deferred_keep_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut project = Project::new();
        let mut queue = ProcessQueue::new();

        queue.queue_process(&mut project, 0, "t", record("a", &log, false, false));
        queue.queue_process(&mut project, 1, "t", record("b", &log, false, false));
        assert_eq!(queue.pending(), 2);
        assert!(log.lock().unwrap().is_empty());

        // An immediate process waits behind the deferred ones
        queue.queue_process(&mut project, 2, "t", record("c", &log, true, false));

        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
        assert_eq!(project.column_names(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_failure_is_isolated() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut project = Project::new();
        let mut queue = ProcessQueue::new();

        queue.queue_process(&mut project, 0, "t", record("a", &log, false, false));
        queue.queue_process(&mut project, 1, "t", record("bad", &log, false, true));
        queue.queue_process(&mut project, 2, "t", record("c", &log, false, false));
        queue.drain(&mut project);

        let outcomes = queue.take_outcomes();
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].result.is_ok());
        assert!(outcomes[1].result.is_err());
        assert_eq!(outcomes[1].index, 1);
        assert!(outcomes[2].result.is_ok());
        assert_eq!(project.column_names(), vec!["a", "c"]);
    }
}
