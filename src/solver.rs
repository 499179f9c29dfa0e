//! Client for an external WCSP solver process (toulbar2-compatible I/O).
//!
//! The solver binary is treated as a black box: it accepts a path to a
//! problem file in the WCSP text format and reports solutions on stdout.
//! All invocations are synchronous, blocking calls; concurrent use from
//! several threads or processes is safe because every invocation writes its
//! own uniquely named scratch file.

use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use tracing::{debug, warn};

use crate::error::{Result, WcspError};
use crate::model::constraint::Assignment;
use crate::model::problem::Wcsp;

/// Invokes the external solver on serialized problems.
///
/// The configured program name (or path) is resolved against `PATH` lazily,
/// on first use, and the result is cached in the instance. There is no
/// process-wide solver lookup; tests can point a client at a fake binary.
#[derive(Debug)]
pub struct SolverClient {
    program: PathBuf,
    resolved: OnceLock<Option<PathBuf>>,
}

impl SolverClient {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            resolved: OnceLock::new(),
        }
    }

    /// The resolved path of the solver binary.
    ///
    /// Fails with [`WcspError::SolverNotFound`] before any scratch file is
    /// written when the binary is missing or not executable.
    pub fn executable(&self) -> Result<&Path> {
        self.resolved
            .get_or_init(|| resolve_program(&self.program))
            .as_deref()
            .ok_or_else(|| WcspError::SolverNotFound(self.program.display().to_string()).into())
    }

    /// Solves the problem in streaming/anytime mode.
    ///
    /// The returned [`SolutionStream`] yields every intermediate solution
    /// the solver reports, as it is found. The sequence ends when the
    /// process closes its output; a non-zero exit code surfaces as a final
    /// `Err` item. Dropping the stream early abandons the running process
    /// (there is no cancellation; kill it out of band if needed).
    pub fn solutions(&self, problem: &mut Wcsp) -> Result<SolutionStream> {
        let exe = self.executable()?;
        let scratch = ScratchFile::create(&problem.name, false);
        let mut buf = Vec::new();
        problem.write(&mut buf)?;
        std::fs::write(scratch.path(), &buf)?;

        debug!(file = %scratch.path().display(), "solving WCSP");
        let mut child = Command::new(exe)
            .arg("-s")
            .arg("-a")
            .arg(scratch.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;
        // stdout was requested as a pipe above.
        let stdout = child.stdout.take().unwrap();
        Ok(SolutionStream {
            child,
            lines: BufReader::new(stdout).lines(),
            scratch,
            done: false,
        })
    }

    /// Solves the problem in best-solution mode and returns the last (best)
    /// assignment the solver reported together with its cost, or `None`
    /// when the process reported no solution at all.
    pub fn solve(&self, problem: &mut Wcsp) -> Result<Option<(Assignment, u64)>> {
        let exe = self.executable()?;
        let mut scratch = ScratchFile::create(&problem.name, true);
        let mut buf = Vec::new();
        problem.write(&mut buf)?;
        std::fs::write(scratch.path(), &buf)?;

        debug!(file = %scratch.path().display(), "solving WCSP");
        let mut child = Command::new(exe)
            .arg("-s")
            .arg(scratch.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;
        let stdout = child.stdout.take().unwrap();

        let mut parser = BestSolutionParser::default();
        for line in BufReader::new(stdout).lines() {
            match line {
                Ok(line) => parser.feed(&line),
                Err(err) => {
                    // Reap the process so a read failure cannot leave a
                    // zombie behind.
                    let _ = child.kill();
                    let _ = child.wait();
                    scratch.remove();
                    return Err(err.into());
                }
            }
        }
        let status = child.wait()?;
        debug!(code = ?status.code(), "solver process exited");
        scratch.remove();
        if !status.success() {
            return Err(WcspError::SolverFailed(status.code().unwrap_or(-1)).into());
        }
        Ok(parser.into_best())
    }
}

impl Default for SolverClient {
    fn default() -> Self {
        Self::new("toulbar2")
    }
}

fn resolve_program(program: &Path) -> Option<PathBuf> {
    // An explicit path is checked directly; a bare name is searched on PATH.
    if program.components().count() > 1 {
        return is_executable(program).then(|| program.to_path_buf());
    }
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.is_file()
        && path
            .metadata()
            .map(|m| m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

static SCRATCH_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A uniquely named problem file in the OS temp directory, removed on drop.
///
/// The name embeds the process id, optionally the thread id, and a
/// process-wide serial, so concurrent invocations never collide.
#[derive(Debug)]
struct ScratchFile {
    path: PathBuf,
    removed: bool,
}

impl ScratchFile {
    fn create(name: &str, per_thread: bool) -> Self {
        let mut stem: String = name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '-'
                }
            })
            .collect();
        if stem.is_empty() {
            stem.push_str("wcsp");
        }
        let mut file = format!("{stem}-{}", std::process::id());
        if per_thread {
            let tid: String = format!("{:?}", std::thread::current().id())
                .chars()
                .filter(char::is_ascii_digit)
                .collect();
            file.push('-');
            file.push_str(&tid);
        }
        let serial = SCRATCH_COUNTER.fetch_add(1, Ordering::Relaxed);
        file.push_str(&format!("-{serial}.wcsp"));
        Self {
            path: std::env::temp_dir().join(file),
            removed: false,
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    /// Best-effort removal; a failure is logged, never an error.
    fn remove(&mut self) {
        if self.removed {
            return;
        }
        self.removed = true;
        if let Err(err) = std::fs::remove_file(&self.path) {
            warn!(file = %self.path.display(), %err, "could not remove scratch file");
        }
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        self.remove();
    }
}

/// Lazily reads a solver process's stdout, yielding one `(index,
/// assignment)` pair per reported intermediate solution.
#[derive(Debug)]
pub struct SolutionStream {
    child: Child,
    lines: Lines<BufReader<ChildStdout>>,
    scratch: ScratchFile,
    done: bool,
}

impl SolutionStream {
    fn finish(&mut self) -> Result<()> {
        let status = self.child.wait()?;
        debug!(code = ?status.code(), "solver process exited");
        self.scratch.remove();
        if !status.success() {
            return Err(WcspError::SolverFailed(status.code().unwrap_or(-1)).into());
        }
        Ok(())
    }
}

impl Iterator for SolutionStream {
    type Item = Result<(u64, Assignment)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            match self.lines.next() {
                Some(Ok(line)) => {
                    if let Some(solution) = parse_solution_line(&line) {
                        return Some(Ok(solution));
                    }
                    // Anything else on stdout is solver chatter, skip it.
                }
                Some(Err(err)) => {
                    self.done = true;
                    // Reap the process so a read failure cannot leave a
                    // zombie behind.
                    let _ = self.child.kill();
                    let _ = self.child.wait();
                    self.scratch.remove();
                    return Some(Err(err.into()));
                }
                None => {
                    self.done = true;
                    return match self.finish() {
                        Ok(()) => None,
                        Err(err) => Some(Err(err)),
                    };
                }
            }
        }
    }
}

/// Parses one streaming-mode output line of the form
/// `<N> solution: <v0> <v1> ...`. Lines that do not match are not
/// solutions and yield `None`.
fn parse_solution_line(line: &str) -> Option<(u64, Assignment)> {
    let (head, tail) = line.split_once("solution:")?;
    let index: u64 = head.trim().parse().ok()?;
    let values: Assignment = tail
        .split_whitespace()
        .map(str::parse)
        .collect::<std::result::Result<_, _>>()
        .ok()?;
    if values.is_empty() {
        return None;
    }
    Some((index, values))
}

#[derive(Debug, Clone, Copy, Default)]
enum ParseState {
    #[default]
    Scanning,
    AwaitingAssignment {
        cost: u64,
    },
}

/// Line-oriented state machine for best-solution mode output.
///
/// A `New solution <cost> ...` marker arms the parser; the following line
/// is taken as the assignment. Later markers overwrite earlier ones, so the
/// final state holds the best solution the process reported. Lines that fit
/// neither role are skipped.
#[derive(Debug, Default)]
struct BestSolutionParser {
    state: ParseState,
    best: Option<(Assignment, u64)>,
}

impl BestSolutionParser {
    fn feed(&mut self, line: &str) {
        match self.state {
            ParseState::Scanning => {
                if line.starts_with("New solution") {
                    // third whitespace-separated token carries the cost
                    if let Some(cost) = line.split_whitespace().nth(2).and_then(|t| t.parse().ok())
                    {
                        self.state = ParseState::AwaitingAssignment { cost };
                    }
                }
            }
            ParseState::AwaitingAssignment { cost } => {
                self.state = ParseState::Scanning;
                let values: std::result::Result<Assignment, _> =
                    line.split_whitespace().map(str::parse).collect();
                if let Ok(assignment) = values {
                    if !assignment.is_empty() {
                        self.best = Some((assignment, cost));
                    }
                }
            }
        }
    }

    fn into_best(self) -> Option<(Assignment, u64)> {
        self.best
    }
}
