use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Languages the runner knows how to compile and execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Java,
    Cpp,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::Python, Language::Java, Language::Cpp];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Java => "java",
            Language::Cpp => "cpp",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = String;

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "python" => Ok(Language::Python),
            "java" => Ok(Language::Java),
            "cpp" => Ok(Language::Cpp),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub input: String,
    pub expected_output: String,
}

/// Inbound submission. `language` stays a plain string so that an unknown
/// identifier surfaces as an unsupported-language rejection rather than a
/// deserialization failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub code: String,
    pub language: String,
    pub tests: Vec<TestCase>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub stdout: String,
    /// Program stderr is not captured separately; always serialized as null.
    pub stderr: Option<String>,
    pub elapsed_seconds: Option<f64>,
    pub peak_memory_kb: Option<u64>,
    pub passed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub compile_success: bool,
    pub compile_output: Option<String>,
    pub tests: Vec<TestResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_parsing_is_case_insensitive() {
        assert_eq!("python".parse::<Language>(), Ok(Language::Python));
        assert_eq!("Python".parse::<Language>(), Ok(Language::Python));
        assert_eq!(" CPP ".parse::<Language>(), Ok(Language::Cpp));
        assert_eq!("java".parse::<Language>(), Ok(Language::Java));
    }

    #[test]
    fn test_unknown_language_is_rejected() {
        assert_eq!("brainfuck".parse::<Language>(), Err("brainfuck".to_string()));
        assert!("".parse::<Language>().is_err());
    }

    #[test]
    fn test_language_display_roundtrips_through_parse() {
        for lang in Language::ALL {
            assert_eq!(lang.to_string().parse::<Language>(), Ok(lang));
        }
    }

    #[test]
    fn test_report_wire_shape() {
        let report = ExecutionReport {
            compile_success: true,
            compile_output: Some(String::new()),
            tests: vec![TestResult {
                stdout: "5".to_string(),
                stderr: None,
                elapsed_seconds: None,
                peak_memory_kb: Some(9120),
                passed: true,
            }],
        };

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["compile_success"], true);
        assert_eq!(value["compile_output"], "");
        assert!(value["tests"][0]["stderr"].is_null());
        assert!(value["tests"][0]["elapsed_seconds"].is_null());
        assert_eq!(value["tests"][0]["peak_memory_kb"], 9120);
        assert_eq!(value["tests"][0]["passed"], true);
    }

    #[test]
    fn test_request_accepts_unknown_language_string() {
        let json = r#"{"code":"print(1)","language":"cobol","tests":[{"input":"","expected_output":"1"}]}"#;
        let request: ExecutionRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.language, "cobol");
        assert_eq!(request.tests.len(), 1);
    }
}
