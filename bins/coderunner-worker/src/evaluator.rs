/// Result Aggregator - Language-Agnostic Comparison
///
/// **Core Responsibility:**
/// Compare raw execution records against expected outputs and build the report.
///
/// **Critical Properties:**
/// - Knows nothing about Docker
/// - Knows nothing about language runtimes
/// - Pure function: (compile outcome, execution records, test cases) → report
///
/// **Normalization Rules (Applied to All Languages):**
/// - Trim leading and trailing whitespace on both sides
/// - Everything else must match exactly (case, internal whitespace, line endings)
/// - A run killed by the timeout never passes, whatever it printed first

use coderunner_common::types::{ExecutionReport, TestCase, TestResult};

/// Exit status the in-sandbox `timeout` wrapper reports: 124 after TERM,
/// 137 (128 + SIGKILL) after KILL.
const TIMEOUT_EXIT_CODES: [i64; 2] = [124, 137];

/// Outcome of the compile stage
#[derive(Debug, Clone, PartialEq)]
pub struct CompileOutcome {
    pub success: bool,
    pub output: String,
}

impl CompileOutcome {
    /// Nothing to compile
    pub fn skipped() -> Self {
        Self {
            success: true,
            output: String::new(),
        }
    }
}

/// Raw result of one instrumented run, produced by the runner, consumed here
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionRecord {
    pub stdout: String,
    pub exit_code: i64,
    pub elapsed_seconds: Option<f64>,
    pub peak_memory_kb: Option<u64>,
}

impl ExecutionRecord {
    /// Inferred from the wrapper's conventional exit status, which a program
    /// can also produce on its own. Either way the test does not pass.
    pub fn timed_out(&self) -> bool {
        TIMEOUT_EXIT_CODES.contains(&self.exit_code)
    }
}

fn normalize_output(output: &str) -> &str {
    output.trim()
}

/// Evaluate a single record against its test case
pub fn evaluate_test(record: &ExecutionRecord, test_case: &TestCase) -> TestResult {
    let actual = normalize_output(&record.stdout);
    let expected = normalize_output(&test_case.expected_output);

    TestResult {
        stdout: actual.to_string(),
        stderr: None,
        elapsed_seconds: record.elapsed_seconds,
        peak_memory_kb: record.peak_memory_kb,
        passed: !record.timed_out() && actual == expected,
    }
}

/// Pair records with test cases in input order and assemble the report.
///
/// Records and test cases must line up one-to-one; the runner produces one
/// record per test case in order.
pub fn aggregate(
    compile: CompileOutcome,
    records: &[ExecutionRecord],
    test_cases: &[TestCase],
) -> ExecutionReport {
    debug_assert_eq!(records.len(), test_cases.len());

    let tests = records
        .iter()
        .zip(test_cases)
        .map(|(record, test_case)| evaluate_test(record, test_case))
        .collect();

    ExecutionReport {
        compile_success: compile.success,
        compile_output: Some(compile.output),
        tests,
    }
}

/// Report for a submission that never got past compilation
pub fn compile_failure_report(compile: CompileOutcome) -> ExecutionReport {
    ExecutionReport {
        compile_success: false,
        compile_output: Some(compile.output),
        tests: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_test_case(expected_output: &str) -> TestCase {
        TestCase {
            input: "input".to_string(),
            expected_output: expected_output.to_string(),
        }
    }

    fn make_record(stdout: &str, exit_code: i64) -> ExecutionRecord {
        ExecutionRecord {
            stdout: stdout.to_string(),
            exit_code,
            elapsed_seconds: Some(0.01),
            peak_memory_kb: Some(4096),
        }
    }

    #[test]
    fn test_normalize_output() {
        assert_eq!(normalize_output("hello"), "hello");
        assert_eq!(normalize_output("  hello  "), "hello");
        assert_eq!(normalize_output("\nhello\n"), "hello");
        assert_eq!(normalize_output("hello\r\n"), "hello");
        assert_eq!(normalize_output("   "), "");
    }

    #[test]
    fn test_evaluate_test_exact_match() {
        let result = evaluate_test(&make_record("120", 0), &make_test_case("120"));

        assert!(result.passed);
        assert_eq!(result.stdout, "120");
        assert_eq!(result.stderr, None);
        assert_eq!(result.elapsed_seconds, Some(0.01));
        assert_eq!(result.peak_memory_kb, Some(4096));
    }

    #[test]
    fn test_evaluate_test_with_whitespace() {
        let result = evaluate_test(&make_record("  hello  \n", 0), &make_test_case("\nhello"));
        assert!(result.passed);
        assert_eq!(result.stdout, "hello");
    }

    #[test]
    fn test_internal_whitespace_matters() {
        let result = evaluate_test(&make_record("1  2", 0), &make_test_case("1 2"));
        assert!(!result.passed);

        let result = evaluate_test(&make_record("a\r\nb", 0), &make_test_case("a\nb"));
        assert!(!result.passed);
    }

    #[test]
    fn test_case_sensitivity() {
        let result = evaluate_test(&make_record("Hello", 0), &make_test_case("hello"));
        assert!(!result.passed);
    }

    #[test]
    fn test_timed_out_run_does_not_pass() {
        let record = ExecutionRecord {
            stdout: String::new(),
            exit_code: 137,
            elapsed_seconds: None,
            peak_memory_kb: None,
        };
        assert!(record.timed_out());

        let result = evaluate_test(&record, &make_test_case("42"));
        assert!(!result.passed);
        assert_eq!(result.elapsed_seconds, None);
        assert_eq!(result.peak_memory_kb, None);
    }

    #[test]
    fn test_correct_output_before_kill_does_not_pass() {
        // Answer flushed, then spun until the wrapper killed it
        let record = ExecutionRecord {
            stdout: "42\n".to_string(),
            exit_code: 137,
            elapsed_seconds: None,
            peak_memory_kb: None,
        };

        let result = evaluate_test(&record, &make_test_case("42"));
        assert!(!result.passed);
        assert_eq!(result.stdout, "42");

        let terminated = make_record("42", 124);
        assert!(!evaluate_test(&terminated, &make_test_case("42")).passed);
    }

    #[test]
    fn test_nonzero_exit_with_correct_output_passes() {
        let result = evaluate_test(&make_record("42", 1), &make_test_case("42"));
        assert!(result.passed);
    }

    #[test]
    fn test_timeout_inference() {
        assert!(make_record("", 124).timed_out());
        assert!(make_record("", 137).timed_out());
        assert!(!make_record("", 0).timed_out());
        assert!(!make_record("", 1).timed_out());
    }

    #[test]
    fn test_aggregate_preserves_order() {
        let tests = vec![
            make_test_case("1"),
            make_test_case("2"),
            make_test_case("3"),
        ];
        let records = vec![
            make_record("1", 0),
            make_record("wrong", 0),
            make_record("", 137),
        ];

        let report = aggregate(CompileOutcome::skipped(), &records, &tests);

        assert!(report.compile_success);
        assert_eq!(report.compile_output.as_deref(), Some(""));
        let passed: Vec<bool> = report.tests.iter().map(|t| t.passed).collect();
        assert_eq!(passed, vec![true, false, false]);
        assert_eq!(report.tests[1].stdout, "wrong");
    }

    #[test]
    fn test_output_matching_later_expectation_still_fails() {
        // Outputs are compared positionally, never matched across tests
        let tests = vec![make_test_case("a"), make_test_case("b")];
        let records = vec![make_record("b", 0), make_record("a", 0)];

        let report = aggregate(CompileOutcome::skipped(), &records, &tests);
        assert!(report.tests.iter().all(|t| !t.passed));
    }

    #[test]
    fn test_compile_failure_report() {
        let report = compile_failure_report(CompileOutcome {
            success: false,
            output: "main.cpp:1:1: error: expected ';'".to_string(),
        });

        assert!(!report.compile_success);
        assert!(report.compile_output.unwrap().contains("error"));
        assert!(report.tests.is_empty());
    }

    #[test]
    fn test_empty_submission() {
        let report = aggregate(CompileOutcome::skipped(), &[], &[]);
        assert!(report.compile_success);
        assert!(report.tests.is_empty());
    }
}
