//! Terminal prompts for the purchase decisions.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

use ticketgate_core::{PaymentOutcome, PurchaseConfirmer, PurchaseSnapshot, ResourceId};

/// Asks the buyer on stdin before paying and before every retry.
pub struct StdinConfirmer {
    lines: Mutex<Lines<BufReader<Stdin>>>,
}

impl StdinConfirmer {
    pub fn new() -> Self {
        Self {
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }

    async fn ask(&self, prompt: &str) -> bool {
        let mut stdout = tokio::io::stdout();
        let _ = stdout.write_all(format!("{} [y/N] ", prompt).as_bytes()).await;
        let _ = stdout.flush().await;

        let mut lines = self.lines.lock().await;
        match lines.next_line().await {
            Ok(Some(answer)) => is_yes(&answer),
            _ => false,
        }
    }
}

impl Default for StdinConfirmer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PurchaseConfirmer for StdinConfirmer {
    async fn confirm_purchase(&self, _resource: ResourceId, snapshot: &PurchaseSnapshot) -> bool {
        let prompt = format!(
            "Buy \"{}\" for {} at {} ({} left)?",
            snapshot.ticket_name,
            snapshot.festival_title,
            snapshot.ticket_price,
            snapshot.remaining_quantity
        );
        self.ask(&prompt).await
    }

    async fn retry_payment(&self, _resource: ResourceId, outcome: &PaymentOutcome) -> bool {
        let reason = outcome
            .failure()
            .map(|f| f.message)
            .unwrap_or_else(|| outcome.label().to_string());
        self.ask(&format!("{} Try again with a new payment?", reason))
            .await
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
