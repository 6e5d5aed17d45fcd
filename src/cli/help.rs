//! Topic help with examples for the benchmark CLI

use crate::{config::env::EnvManager, suite::SuiteOperation, types::BackendKind};
use colored::*;

/// Help text renderer for `--help-topic`
pub struct HelpSystem {
    version: &'static str,
}

impl Default for HelpSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl HelpSystem {
    pub const TOPICS: [&'static str; 5] = ["backends", "modes", "policies", "env", "examples"];

    pub fn new() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
        }
    }

    /// Overview of every topic
    pub fn display_main_help(&self, use_colors: bool) -> String {
        let mut help = String::new();
        help.push_str(&self.format_header(use_colors));
        help.push('\n');
        help.push_str(&self.format_usage_section(use_colors));
        help.push('\n');
        help.push_str(&self.format_operations_section(use_colors));
        help.push('\n');
        help.push_str(&self.format_examples_section(use_colors));
        help
    }

    pub fn display_topic_help(&self, topic: &str, use_colors: bool) -> Option<String> {
        match topic.to_lowercase().as_str() {
            "backends" | "backend" => Some(self.format_backends_help(use_colors)),
            "modes" | "mode" => Some(self.format_modes_help(use_colors)),
            "policies" | "policy" | "failures" => Some(self.format_policies_help(use_colors)),
            "env" | "environment" | "config" => Some(EnvManager::display_env_help()),
            "examples" => Some(self.format_examples_section(use_colors)),
            _ => None,
        }
    }

    fn section(&self, title: &str, use_colors: bool) -> String {
        if use_colors {
            format!("{}\n", title.bright_green().bold())
        } else {
            format!("{}\n", title)
        }
    }

    fn format_header(&self, use_colors: bool) -> String {
        let title = "Cache Latency Bench";
        let subtitle = "Round-trip latency of TCP, HTTP and Redis cache backends";
        if use_colors {
            format!(
                "{}\n{}\nVersion: {}\n",
                title.bright_cyan().bold(),
                subtitle.bright_blue(),
                self.version.green()
            )
        } else {
            format!("{}\n{}\nVersion: {}\n", title, subtitle, self.version)
        }
    }

    fn format_usage_section(&self, use_colors: bool) -> String {
        let mut usage = self.section("USAGE:", use_colors);
        for pattern in [
            "clb [OPTIONS]",
            "clb --operation <OPERATION> --backend <BACKEND> [OPTIONS]",
            "clb --serve --tcp-addr <HOST:PORT>",
            "clb --help-topic <TOPIC>",
        ] {
            usage.push_str(&format!("  {}\n", pattern));
        }
        usage
    }

    fn format_operations_section(&self, use_colors: bool) -> String {
        let mut output = self.section("OPERATIONS:", use_colors);
        for op in SuiteOperation::ALL {
            let description = match op {
                SuiteOperation::Set => "one timed SET per backend",
                SuiteOperation::Get => "one timed GET per backend",
                SuiteOperation::SetHighload => "N sequential SETs per backend",
                SuiteOperation::GetHighload => "N sequential GETs per backend",
                SuiteOperation::SetHighloadParallel => "N concurrent SETs per backend",
                SuiteOperation::GetHighloadParallel => "N concurrent GETs per backend",
                SuiteOperation::All => "SET then GET using --mode",
            };
            output.push_str(&format!("  {:<24} {}\n", op.as_str(), description));
        }
        output
    }

    fn format_backends_help(&self, use_colors: bool) -> String {
        let mut output = self.section("BACKENDS:", use_colors);
        for kind in BackendKind::ALL {
            let description = match kind {
                BackendKind::Tcp => "one persistent connection speaking GET/SET lines",
                BackendKind::TcpPool => "--pool-size line connections chosen round-robin",
                BackendKind::Http => "POST {base}/set and GET {base}/get?key=",
                BackendKind::Redis => "GET and SET EX through a connection manager",
            };
            output.push_str(&format!("  {:<10} {:<12} {}\n", kind.id(), kind.display_name(), description));
        }
        output.push_str("\n  Select with --backend tcp,http or BENCH_BACKENDS=all\n");
        output
    }

    fn format_modes_help(&self, use_colors: bool) -> String {
        let mut output = self.section("EXECUTION MODES:", use_colors);
        output.push_str("  sequential     each call completes before the next starts\n");
        output.push_str("  concurrent     all N calls start at once, then wait for every one\n");
        output.push_str("  bounded[:k]    at most k calls in flight (default k: --concurrency)\n");
        output.push_str("\n  Concurrent cells give up after --barrier-timeout seconds; calls\n");
        output.push_str("  still outstanding then count as timeouts.\n");
        output
    }

    fn format_policies_help(&self, use_colors: bool) -> String {
        let mut output = self.section("FAILURE POLICIES:", use_colors);
        output.push_str("  abort          the first failed call fails the whole cell\n");
        output.push_str("  exclude        failed calls are counted but give no sample (default)\n");
        output.push_str("  retry          a failed call is retried once; the retry is timed\n");
        output
    }

    fn format_examples_section(&self, use_colors: bool) -> String {
        let examples = [
            ExampleHelp {
                title: "Local smoke test",
                command: "clb --serve --tcp-addr 127.0.0.1:6060 & clb --backend tcp -n 1000",
                description: "Start the bundled server and benchmark it",
            },
            ExampleHelp {
                title: "Compare every backend under concurrency",
                command: "clb --operation get-highload-parallel --backend all -n 10000",
                description: "10,000 concurrent GETs against each backend",
            },
            ExampleHelp {
                title: "Bounded load with retries",
                command: "clb --mode bounded:32 --failure-policy retry --backend tcp-pool --pool-size 32",
                description: "32 calls in flight spread over 32 pooled connections",
            },
            ExampleHelp {
                title: "Machine-readable output",
                command: "clb --operation set-highload --backend redis --json",
                description: "Print {\"RedisSet\": {\"min\", \"max\", \"average\"}} style JSON",
            },
        ];

        let mut output = self.section("EXAMPLES:", use_colors);
        for example in examples {
            output.push_str(&example.format(use_colors));
            output.push('\n');
        }
        output
    }
}

struct ExampleHelp {
    title: &'static str,
    command: &'static str,
    description: &'static str,
}

impl ExampleHelp {
    fn format(&self, use_colors: bool) -> String {
        if use_colors {
            format!(
                "  {}:\n    {}\n    {}\n",
                self.title.bright_yellow().bold(),
                self.command.bright_white(),
                self.description.bright_blue().italic()
            )
        } else {
            format!("  {}:\n    {}\n    {}\n", self.title, self.command, self.description)
        }
    }
}
