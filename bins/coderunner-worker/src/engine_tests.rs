/// End-to-end tests against a real Docker daemon
///
/// These verify the whole path through the Docker engine:
/// 1. Interpreted submissions run and pass
/// 2. Compilation failures gate every test
/// 3. Infinite loops are killed by the in-sandbox timeout
/// 4. Scratch storage persists between tests of one submission
/// 5. No container outlives its submission
///
/// They need a running daemon and the runner image (`RUNNER_IMAGE`, default
/// `testportal/runner:latest`), so they are ignored by default:
/// `cargo test -- --ignored`

#[cfg(test)]
mod docker_scenarios {
    use crate::engine::DockerEngine;
    use crate::executor::Harness;
    use crate::profile::ProfileTable;
    use bollard::container::ListContainersOptions;
    use bollard::Docker;
    use coderunner_common::config::RunnerConfig;
    use coderunner_common::types::{ExecutionRequest, TestCase};
    use std::collections::HashMap;
    use std::sync::Arc;

    fn harness(config: RunnerConfig) -> Harness {
        let engine = DockerEngine::connect(config.pull_missing_images)
            .expect("Failed to connect to Docker");
        let profiles = ProfileTable::load(&config).expect("Failed to load language profiles");
        Harness::new(Arc::new(engine), profiles, config)
    }

    fn config() -> RunnerConfig {
        RunnerConfig::from_env().expect("Invalid RUNNER_* configuration")
    }

    fn request(language: &str, code: &str, tests: &[(&str, &str)]) -> ExecutionRequest {
        ExecutionRequest {
            code: code.to_string(),
            language: language.to_string(),
            tests: tests
                .iter()
                .map(|(input, expected)| TestCase {
                    input: input.to_string(),
                    expected_output: expected.to_string(),
                })
                .collect(),
        }
    }

    /// Sandboxes still present on the daemon
    async fn live_sandboxes() -> usize {
        let docker = Docker::connect_with_local_defaults().expect("Failed to connect to Docker");
        let mut filters = HashMap::new();
        filters.insert("label", vec!["coderunner.sandbox=true"]);

        docker
            .list_containers(Some(ListContainersOptions {
                all: true,
                filters,
                ..Default::default()
            }))
            .await
            .expect("Failed to list containers")
            .len()
    }

    #[tokio::test]
    #[ignore] // Requires Docker
    async fn test_python_echo_passes() {
        let harness = harness(config());

        let report = harness
            .execute(&request("python", "print(input())", &[("5\n", "5")]))
            .await
            .expect("Execution failed");

        assert!(report.compile_success);
        assert_eq!(report.compile_output.as_deref(), Some(""));
        assert_eq!(report.tests.len(), 1);
        assert_eq!(report.tests[0].stdout, "5");
        assert_eq!(report.tests[0].stderr, None);
        assert!(report.tests[0].passed);
        assert!(report.tests[0].elapsed_seconds.is_some());
        assert!(report.tests[0].peak_memory_kb.is_some());
    }

    #[tokio::test]
    #[ignore] // Requires Docker
    async fn test_cpp_syntax_error_gates_tests() {
        let harness = harness(config());

        let code = "#include <iostream>\nint main() { std::cout << 1 }\n";
        let report = harness
            .execute(&request("cpp", code, &[("", "1"), ("", "1")]))
            .await
            .expect("Execution failed");

        assert!(!report.compile_success);
        assert!(!report.compile_output.unwrap_or_default().trim().is_empty());
        assert!(report.tests.is_empty());
    }

    #[tokio::test]
    #[ignore] // Requires Docker
    async fn test_infinite_loop_is_killed() {
        let harness = harness(RunnerConfig {
            timeout_seconds: 5,
            ..config()
        });

        let started = std::time::Instant::now();
        let report = harness
            .execute(&request("python", "print('start', flush=True)\nwhile True:\n    pass\n", &[("", "done")]))
            .await
            .expect("Execution failed");

        assert!(report.compile_success);
        assert_eq!(report.tests.len(), 1);
        assert!(!report.tests[0].passed);
        assert!(started.elapsed().as_secs() < 30);
    }

    #[tokio::test]
    #[ignore] // Requires Docker
    async fn test_scratch_persists_between_tests() {
        let harness = harness(config());

        let code = r#"
import os
if os.path.exists("marker.txt"):
    print("seen")
else:
    open("marker.txt", "w").write("x")
    print("first")
"#;
        let report = harness
            .execute(&request("python", code, &[("", "first"), ("", "seen")]))
            .await
            .expect("Execution failed");

        let passed: Vec<bool> = report.tests.iter().map(|t| t.passed).collect();
        assert_eq!(passed, vec![true, true]);
    }

    #[tokio::test]
    #[ignore] // Requires Docker
    async fn test_java_compile_once_run_many() {
        let harness = harness(config());

        let code = r#"
import java.util.Scanner;
public class Main {
    public static void main(String[] args) {
        Scanner sc = new Scanner(System.in);
        int n = sc.nextInt();
        System.out.println(n * 2);
    }
}
"#;
        let report = harness
            .execute(&request("java", code, &[("5", "10"), ("10", "20"), ("-3", "6")]))
            .await
            .expect("Execution failed");

        assert!(report.compile_success);
        let passed: Vec<bool> = report.tests.iter().map(|t| t.passed).collect();
        assert_eq!(passed, vec![true, true, false]);
        assert_eq!(report.tests[2].stdout, "-6");
    }

    #[tokio::test]
    #[ignore] // Requires Docker
    async fn test_sandbox_has_no_network_or_writable_root() {
        let harness = harness(config());

        let code = r#"
import socket
try:
    socket.create_connection(("1.1.1.1", 53), timeout=2)
    print("network")
except OSError:
    print("isolated")
try:
    open("/etc/pwned", "w")
    print("writable")
except OSError:
    print("readonly")
"#;
        let report = harness
            .execute(&request("python", code, &[("", "isolated\nreadonly")]))
            .await
            .expect("Execution failed");

        assert!(report.tests[0].passed, "stdout was: {}", report.tests[0].stdout);
    }

    #[tokio::test]
    #[ignore] // Requires Docker
    async fn test_no_sandbox_outlives_submission() {
        let harness = harness(config());
        let before = live_sandboxes().await;

        harness
            .execute(&request("cpp", "int main( {", &[("", "")]))
            .await
            .expect("Execution failed");
        harness
            .execute(&request("python", "print(1)", &[("", "1")]))
            .await
            .expect("Execution failed");

        assert_eq!(live_sandboxes().await, before);
    }
}
