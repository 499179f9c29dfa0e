//! End-to-end tests for the solver client against scripted fake solver
//! binaries.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use pretty_assertions::assert_eq;
use tempfile::TempDir;
use wcsp::error::WcspError;
use wcsp::model::{Constraint, Cost, Wcsp};
use wcsp::solver::SolverClient;

fn init_logging() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init()
        .ok();
}

fn fake_solver(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("fake-solver");
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path
}

fn problem(name: &str) -> Wcsp {
    let mut wcsp = Wcsp::new(name, vec![2, 2]);
    let mut c = Constraint::new(vec![0, 1], Cost::Real(0.0));
    c.tuple(vec![0, 0], Cost::Real(1.0)).unwrap();
    wcsp.insert(c).unwrap();
    wcsp
}

/// Scratch files embed the problem name and the process id, so leftovers
/// from this test run are recognizable.
fn scratch_leftovers(name: &str) -> Vec<PathBuf> {
    let prefix = format!("{name}-{}", std::process::id());
    fs::read_dir(std::env::temp_dir())
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(&prefix))
        })
        .collect()
}

#[test]
fn streaming_mode_yields_each_solution_and_cleans_up() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let solver = fake_solver(
        &dir,
        r#"echo "preprocessing costs"
echo "1 solution: 0 1 0"
echo "some chatter"
echo "2 solution: 1 1 0""#,
    );

    let client = SolverClient::new(solver);
    let mut wcsp = problem("itest-stream");
    let solutions: Vec<_> = client
        .solutions(&mut wcsp)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(solutions, vec![(1, vec![0, 1, 0]), (2, vec![1, 1, 0])]);
    assert_eq!(scratch_leftovers("itest-stream"), Vec::<PathBuf>::new());
}

#[test]
fn best_mode_returns_the_last_reported_solution() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let solver = fake_solver(
        &dir,
        r#"echo "New solution: 10 (12 backtracks)"
echo "0 1"
echo "New solution: 4 (20 backtracks)"
echo "1 0"
echo "Optimum: 4""#,
    );

    let client = SolverClient::new(solver);
    let mut wcsp = problem("itest-best");
    let best = client.solve(&mut wcsp).unwrap();

    assert_eq!(best, Some((vec![1, 0], 4)));
    assert_eq!(scratch_leftovers("itest-best"), Vec::<PathBuf>::new());
}

#[test]
fn best_mode_without_solutions_returns_none() {
    let dir = TempDir::new().unwrap();
    let solver = fake_solver(&dir, r#"echo "no solution found""#);

    let client = SolverClient::new(solver);
    let mut wcsp = problem("itest-none");
    assert_eq!(client.solve(&mut wcsp).unwrap(), None);
}

#[test]
fn failing_solver_reports_its_exit_code_after_cleanup() {
    let dir = TempDir::new().unwrap();
    let solver = fake_solver(&dir, "exit 3");

    let client = SolverClient::new(solver);
    let mut wcsp = problem("itest-fail");
    let err = client.solve(&mut wcsp).unwrap_err();

    assert!(matches!(err.kind(), WcspError::SolverFailed(3)));
    assert_eq!(scratch_leftovers("itest-fail"), Vec::<PathBuf>::new());
}

#[test]
fn streaming_failure_surfaces_as_the_final_item() {
    let dir = TempDir::new().unwrap();
    let solver = fake_solver(
        &dir,
        r#"echo "1 solution: 0 0"
exit 2"#,
    );

    let client = SolverClient::new(solver);
    let mut wcsp = problem("itest-stream-fail");
    let mut stream = client.solutions(&mut wcsp).unwrap();

    assert_eq!(stream.next().unwrap().unwrap(), (1, vec![0, 0]));
    let err = stream.next().unwrap().unwrap_err();
    assert!(matches!(err.kind(), WcspError::SolverFailed(2)));
    assert!(stream.next().is_none());
    assert_eq!(scratch_leftovers("itest-stream-fail"), Vec::<PathBuf>::new());
}

#[test]
fn undecodable_best_mode_output_fails_after_cleanup() {
    let dir = TempDir::new().unwrap();
    // The stray 0xff byte makes the output line undecodable as UTF-8.
    let solver = fake_solver(
        &dir,
        r#"echo "New solution: 4 (20 backtracks)"
printf '\377\n'"#,
    );

    let client = SolverClient::new(solver);
    let mut wcsp = problem("itest-binary");
    let err = client.solve(&mut wcsp).unwrap_err();

    assert!(matches!(err.kind(), WcspError::Io(_)));
    assert_eq!(scratch_leftovers("itest-binary"), Vec::<PathBuf>::new());
}

#[test]
fn undecodable_streaming_output_ends_the_stream_with_an_error() {
    let dir = TempDir::new().unwrap();
    let solver = fake_solver(
        &dir,
        r#"echo "1 solution: 0 0"
printf '\377\n'"#,
    );

    let client = SolverClient::new(solver);
    let mut wcsp = problem("itest-stream-binary");
    let mut stream = client.solutions(&mut wcsp).unwrap();

    assert_eq!(stream.next().unwrap().unwrap(), (1, vec![0, 0]));
    let err = stream.next().unwrap().unwrap_err();
    assert!(matches!(err.kind(), WcspError::Io(_)));
    assert!(stream.next().is_none());
    assert_eq!(
        scratch_leftovers("itest-stream-binary"),
        Vec::<PathBuf>::new()
    );
}

#[test]
fn missing_solver_fails_before_writing_any_scratch_file() {
    let client = SolverClient::new("/nonexistent/toulbar2-nowhere");
    let mut wcsp = problem("itest-missing");
    let err = client.solve(&mut wcsp).unwrap_err();

    assert!(matches!(err.kind(), WcspError::SolverNotFound(_)));
    assert_eq!(scratch_leftovers("itest-missing"), Vec::<PathBuf>::new());
}
