//! Fixed table of supported languages and their build recipes.

use serde::Serialize;

use crate::error::{ExecutorError, Result};

/// Substitution token for the source filename in command templates.
pub const FILE_TOKEN: &str = "{file}";

/// Build and run recipe for one language.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LanguageProfile {
    pub id: &'static str,
    pub name: &'static str,
    pub version: &'static str,
    pub file_extension: &'static str,
    pub compile_cmd: Option<&'static str>,
    pub run_cmd: &'static str,
    #[serde(skip)]
    pub image: &'static str,
    pub default_wall_ms: u64,
    pub default_memory_mb: u64,
    #[serde(skip)]
    pub env: &'static [(&'static str, &'static str)],
}

static PROFILES: &[LanguageProfile] = &[
    LanguageProfile {
        id: "python",
        name: "Python",
        version: "3.11",
        file_extension: ".py",
        compile_cmd: None,
        run_cmd: "python3 {file}",
        image: "python:3.11-alpine",
        default_wall_ms: 5_000,
        default_memory_mb: 128,
        env: &[("PYTHONDONTWRITEBYTECODE", "1"), ("PYTHONUNBUFFERED", "1")],
    },
    LanguageProfile {
        id: "javascript",
        name: "JavaScript",
        version: "Node.js 20",
        file_extension: ".js",
        compile_cmd: None,
        run_cmd: "node {file}",
        image: "node:20-alpine",
        default_wall_ms: 5_000,
        default_memory_mb: 256,
        env: &[],
    },
    LanguageProfile {
        id: "java",
        name: "Java",
        version: "17",
        file_extension: ".java",
        compile_cmd: None,
        run_cmd: "java -Xss64m -XX:+UseSerialGC {file}",
        image: "eclipse-temurin:17-jdk-alpine",
        default_wall_ms: 10_000,
        default_memory_mb: 512,
        env: &[],
    },
    LanguageProfile {
        id: "cpp",
        name: "C++",
        version: "GCC 13 (C++17)",
        file_extension: ".cpp",
        compile_cmd: Some("g++ -O2 -std=c++17 -o main {file}"),
        run_cmd: "./main",
        image: "gcc:13",
        default_wall_ms: 2_000,
        default_memory_mb: 256,
        env: &[],
    },
    LanguageProfile {
        id: "go",
        name: "Go",
        version: "1.22",
        file_extension: ".go",
        compile_cmd: Some("go build -o main {file}"),
        run_cmd: "./main",
        image: "golang:1.22-alpine",
        default_wall_ms: 2_000,
        default_memory_mb: 256,
        env: &[
            ("GOCACHE", "/tmp/go-cache"),
            ("GOPATH", "/tmp/go"),
            ("CGO_ENABLED", "0"),
        ],
    },
    LanguageProfile {
        id: "rust",
        name: "Rust",
        version: "1.79",
        file_extension: ".rs",
        compile_cmd: Some("rustc -O -o main {file}"),
        run_cmd: "./main",
        image: "rust:1.79-slim",
        default_wall_ms: 2_000,
        default_memory_mb: 256,
        env: &[],
    },
];

/// All registered profiles, in display order.
pub fn all() -> &'static [LanguageProfile] {
    PROFILES
}

pub fn lookup(id: &str) -> Result<&'static LanguageProfile> {
    PROFILES
        .iter()
        .find(|p| p.id == id)
        .ok_or_else(|| ExecutorError::UnknownLanguage(id.to_string()))
}

pub fn is_registered(id: &str) -> bool {
    PROFILES.iter().any(|p| p.id == id)
}

impl LanguageProfile {
    pub fn source_file(&self) -> String {
        format!("source{}", self.file_extension)
    }

    pub fn compile_command(&self) -> Option<String> {
        self.compile_cmd.map(|t| self.render(t))
    }

    pub fn run_command(&self) -> String {
        self.render(self.run_cmd)
    }

    fn render(&self, template: &str) -> String {
        template.replace(FILE_TOKEN, &self.source_file())
    }
}
