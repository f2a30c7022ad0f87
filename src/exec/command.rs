// src/exec/command.rs

//! Shell command action: the built-in way to run a task from a DAG file.

use std::process::Stdio;

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::exec::action::{ActionFuture, ActionOutput, TaskAction, TaskContext};

/// Runs `cmd` through the platform shell.
///
/// - exit status 0 is success, anything else is a failure
/// - the last non-empty stdout line becomes the task output
/// - the child is killed if the attempt is dropped (e.g. on timeout)
///
/// The process sees `DAGFLOW_DAG_ID`, `DAGFLOW_TASK_ID`,
/// `DAGFLOW_LOGICAL_DATE` and `DAGFLOW_TRY_NUMBER`, plus one
/// `DAGFLOW_UPSTREAM_<TASK>` variable per upstream output.
#[derive(Debug, Clone)]
pub struct CommandAction {
    cmd: String,
}

impl CommandAction {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self { cmd: cmd.into() }
    }

    pub fn cmd(&self) -> &str {
        &self.cmd
    }

    fn build(&self, ctx: &TaskContext) -> Command {
        // Build a shell command appropriate for the platform.
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.cmd);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&self.cmd);
            c
        };

        cmd.env("DAGFLOW_DAG_ID", &ctx.dag_id)
            .env("DAGFLOW_TASK_ID", &ctx.task_id)
            .env("DAGFLOW_LOGICAL_DATE", ctx.logical_date.to_rfc3339())
            .env("DAGFLOW_TRY_NUMBER", ctx.try_number.to_string());

        for (task, output) in &ctx.upstream_outputs {
            cmd.env(upstream_env_name(task), output);
        }

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    async fn run(&self, ctx: TaskContext) -> Result<ActionOutput> {
        info!(
            dag = %ctx.dag_id,
            task = %ctx.task_id,
            try_number = ctx.try_number,
            cmd = %self.cmd,
            "starting task process"
        );

        let mut child = self
            .build(&ctx)
            .spawn()
            .with_context(|| format!("spawning process for task '{}'", ctx.task_id))?;

        // Always consume stderr so buffers don't fill; log at debug.
        if let Some(stderr) = child.stderr.take() {
            let task_name = ctx.task_id.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(task = %task_name, "stderr: {}", line);
                }
            });
        }

        let mut last_line: Option<String> = None;
        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            while let Some(line) = lines
                .next_line()
                .await
                .with_context(|| format!("reading stdout of task '{}'", ctx.task_id))?
            {
                debug!(task = %ctx.task_id, "stdout: {}", line);
                if !line.trim().is_empty() {
                    last_line = Some(line);
                }
            }
        }

        let status = child
            .wait()
            .await
            .with_context(|| format!("waiting for process of task '{}'", ctx.task_id))?;

        info!(
            task = %ctx.task_id,
            exit_code = status.code(),
            success = status.success(),
            "task process exited"
        );

        if !status.success() {
            match status.code() {
                Some(code) => bail!("command exited with status {code}"),
                None => bail!("command terminated by signal"),
            }
        }

        Ok(ActionOutput { value: last_line })
    }
}

impl TaskAction for CommandAction {
    fn execute(&self, ctx: TaskContext) -> ActionFuture<'_> {
        Box::pin(self.run(ctx))
    }
}

/// `DAGFLOW_UPSTREAM_<TASK>` with the task id upper-cased and anything
/// outside `[A-Z0-9_]` replaced by `_`.
pub fn upstream_env_name(task: &str) -> String {
    let suffix: String = task
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("DAGFLOW_UPSTREAM_{suffix}")
}
