//! Interactive prompt surface backed by stdin/stderr.

use async_trait::async_trait;
use colored::Colorize;
use loft::Result;
use loft::collaborators::Prompt;
use tokio::io::{AsyncBufReadExt, BufReader};

pub struct StdinPrompt;

impl StdinPrompt {
	async fn read_line(&self) -> Result<String> {
		let mut line = String::new();
		BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
		Ok(line.trim().to_string())
	}
}

#[async_trait]
impl Prompt for StdinPrompt {
	async fn confirm(&self, question: &str) -> Result<bool> {
		eprint!("{} {} ", question.bold(), "[y/N]".dimmed());
		let answer = self.read_line().await?;
		Ok(matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes"))
	}

	async fn select(&self, question: &str, options: &[String]) -> Result<Option<usize>> {
		eprintln!("{}", question.bold());
		for (index, option) in options.iter().enumerate() {
			eprintln!("  {}) {option}", index + 1);
		}
		eprint!("{} ", "choice (enter to cancel):".dimmed());
		let answer = self.read_line().await?;
		if answer.is_empty() {
			return Ok(None);
		}
		Ok(answer
			.parse::<usize>()
			.ok()
			.filter(|choice| (1..=options.len()).contains(choice))
			.map(|choice| choice - 1))
	}
}
