//! Interactive session loop
//!
//! Keeps per-session conversation history and statistics. Session commands
//! are resolved here; only free-text tasks reach the orchestrator.

use crate::detect;
use anyhow::Result;
use repoagent_agent::Orchestrator;
use repoagent_core::{RunState, TaskKind};
use std::io::{BufRead, Write};
use std::sync::Arc;

struct HistoryEntry {
    task: String,
    task_kind: TaskKind,
    overall_score: Option<f64>,
    iterations: u32,
}

pub struct Session {
    orchestrator: Arc<Orchestrator>,
    history: Vec<HistoryEntry>,
}

impl Session {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            history: Vec::new(),
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        print_header();

        let stdin = std::io::stdin();
        loop {
            print!("You: ");
            std::io::stdout().flush()?;

            let mut line = String::new();
            if stdin.lock().read_line(&mut line)? == 0 {
                break; // EOF
            }
            let input = line.trim();
            if input.is_empty() {
                continue;
            }

            match input.to_lowercase().as_str() {
                "exit" | "quit" | "q" => {
                    println!("Goodbye.");
                    break;
                }
                "clear" => {
                    // ANSI clear screen + cursor home
                    print!("\x1b[2J\x1b[H");
                    std::io::stdout().flush()?;
                    continue;
                }
                "history" => {
                    self.show_history();
                    continue;
                }
                "stats" => {
                    self.show_stats();
                    continue;
                }
                _ => {}
            }

            let task_kind = detect::detect_task_kind(input);
            println!("\nAgent: working ({} task)...\n", task_kind.as_str());

            let state = self.orchestrator.run(input.to_string(), task_kind).await;
            print_result(&state);

            self.history.push(HistoryEntry {
                task: input.to_string(),
                task_kind,
                overall_score: state.scores.as_ref().map(|s| s.overall),
                iterations: state.iteration,
            });
        }

        Ok(())
    }

    fn show_history(&self) {
        if self.history.is_empty() {
            println!("No conversation history yet.\n");
            return;
        }
        println!("Conversation history:");
        for (i, entry) in self.history.iter().enumerate() {
            println!(
                "{:>3}. [{}] {} (score {})",
                i + 1,
                entry.task_kind.as_str(),
                entry.task,
                entry
                    .overall_score
                    .map(|s| format!("{s:.1}"))
                    .unwrap_or_else(|| "-".to_string()),
            );
        }
        println!();
    }

    fn show_stats(&self) {
        if self.history.is_empty() {
            println!("No queries this session yet.\n");
            return;
        }
        let scored: Vec<f64> = self.history.iter().filter_map(|e| e.overall_score).collect();
        let average = if scored.is_empty() {
            0.0
        } else {
            scored.iter().sum::<f64>() / scored.len() as f64
        };
        let total_iterations: u32 = self.history.iter().map(|e| e.iterations).sum();

        println!("Session statistics:");
        println!("  Total queries: {}", self.history.len());
        println!("  Average score: {average:.1}");
        println!("  Total iterations: {total_iterations}");
        println!();
    }
}

fn print_header() {
    println!("repoagent - autonomous repository agent");
    println!("Commands: exit/quit, history, stats, clear");
    println!();
}

pub fn print_result(state: &RunState) {
    if let Some(output) = &state.final_output {
        println!("{output}");
    } else {
        println!("(no output produced)");
    }

    if let Some(scores) = &state.scores {
        println!("\n--- evaluation ---");
        println!(
            "overall {:.1} | completion {:.1} | reasoning {:.1} | tools {:.1} | reflection {:.1} | output {:.1}",
            scores.overall,
            scores.task_completion,
            scores.reasoning_quality,
            scores.tool_effectiveness,
            scores.reflection_quality,
            scores.output_quality,
        );
    }
    println!();
}
