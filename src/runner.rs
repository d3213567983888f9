//! Suite registry, filtering, and the run loop with pass/fail reporting

use std::future::Future;
use std::pin::Pin;
use std::time::Instant;

use tracing::{error, info};

use crate::config::HarnessConfig;
use crate::error::HarnessResult;
use crate::harness::Harness;

/// Boxed future returned by a registered test function
pub type TestFuture<'a> = Pin<Box<dyn Future<Output = HarnessResult<()>> + 'a>>;

/// A registered test function. Async fns register through a capture-free
/// closure: `TestCase::new("test_foo", |h| Box::pin(test_foo(h)))`.
pub type TestFn = for<'a> fn(&'a mut Harness) -> TestFuture<'a>;

pub struct TestCase {
    pub name: &'static str,
    pub run: TestFn,
}

impl TestCase {
    pub fn new(name: &'static str, run: TestFn) -> Self {
        Self { name, run }
    }
}

/// One concrete test module
pub struct Suite {
    /// File-name stem the CLI file filter matches against
    pub file: &'static str,
    pub cases: Vec<TestCase>,
}

/// Outcome of one test case
#[derive(Debug, Clone)]
pub struct CaseResult {
    pub suite: &'static str,
    pub name: &'static str,
    pub passed: bool,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// Outcome of the whole run
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub results: Vec<CaseResult>,
}

/// Keep the suites and cases the positional CLI filters select.
///
/// `file_pattern` is a substring match on suite file names;
/// `function_prefix` narrows the usual `test` name prefix down to
/// `test_<prefix>`. Suites left without cases are dropped.
pub fn filter_suites(
    suites: Vec<Suite>,
    file_pattern: Option<&str>,
    function_prefix: Option<&str>,
) -> Vec<Suite> {
    let method_prefix = match function_prefix {
        Some(prefix) => format!("test_{}", prefix),
        None => "test".to_string(),
    };

    suites
        .into_iter()
        .filter(|suite| file_pattern.map_or(true, |pattern| suite.file.contains(pattern)))
        .map(|mut suite| {
            suite.cases.retain(|case| case.name.starts_with(&method_prefix));
            suite
        })
        .filter(|suite| !suite.cases.is_empty())
        .collect()
}

/// Runs suites sequentially, one fixture per suite.
pub struct TestRunner {
    config: HarnessConfig,
}

impl TestRunner {
    pub fn new(config: HarnessConfig) -> Self {
        Self { config }
    }

    /// Run every suite. An individual case failure is recorded and the
    /// suite continues; a fixture setup failure aborts the whole run.
    pub async fn run(&self, suites: Vec<Suite>) -> HarnessResult<RunReport> {
        let start = Instant::now();
        let mut report = RunReport::default();

        info!("Running {} suite(s)...", suites.len());

        for suite in suites {
            info!("== Running {} ==", suite.file);
            let mut harness = Harness::setup(self.config.clone()).await?;

            for case in &suite.cases {
                let case_start = Instant::now();
                let outcome = (case.run)(&mut harness).await;
                let duration_ms = case_start.elapsed().as_millis() as u64;

                match outcome {
                    Ok(()) => {
                        report.passed += 1;
                        info!("✓ {} ({} ms)", case.name, duration_ms);
                        report.results.push(CaseResult {
                            suite: suite.file,
                            name: case.name,
                            passed: true,
                            duration_ms,
                            error: None,
                        });
                    }
                    Err(e) => {
                        report.failed += 1;
                        error!("✗ {} - {}", case.name, e);
                        report.results.push(CaseResult {
                            suite: suite.file,
                            name: case.name,
                            passed: false,
                            duration_ms,
                            error: Some(e.to_string()),
                        });
                    }
                }
            }

            harness.teardown().await?;
        }

        report.total = report.results.len();
        report.duration_ms = start.elapsed().as_millis() as u64;

        info!("");
        info!(
            "Test Results: {} passed, {} failed ({} ms)",
            report.passed, report.failed, report.duration_ms
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> TestFn {
        |_harness| Box::pin(async { Ok(()) })
    }

    fn sample_suites() -> Vec<Suite> {
        vec![
            Suite {
                file: "viewer_errors",
                cases: vec![
                    TestCase::new("test_viewer_embedded", noop()),
                    TestCase::new("test_viewer_embedded_no_linkouts", noop()),
                ],
            },
            Suite {
                file: "sponsorship",
                cases: vec![TestCase::new("test_sponsor_page", noop())],
            },
        ]
    }

    #[test]
    fn test_no_filters_keep_everything() {
        let kept = filter_suites(sample_suites(), None, None);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].cases.len(), 2);
    }

    #[test]
    fn test_file_pattern_is_a_substring_match() {
        let kept = filter_suites(sample_suites(), Some("viewer"), None);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].file, "viewer_errors");
    }

    #[test]
    fn test_function_prefix_extends_the_test_prefix() {
        let kept = filter_suites(sample_suites(), None, Some("viewer_embedded"));
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].cases.len(), 2);
        assert!(kept[0]
            .cases
            .iter()
            .all(|c| c.name.starts_with("test_viewer_embedded")));
    }

    #[test]
    fn test_suites_left_empty_are_dropped() {
        let kept = filter_suites(sample_suites(), Some("sponsorship"), Some("viewer"));
        assert!(kept.is_empty());
    }
}
