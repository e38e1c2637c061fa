//! Runs parsed commands against a table and renders what happened.

use private_blackjack::{GameError, SessionId, TableService, TableUpdate};
use std::fmt::Write;

use crate::commands::Command;

pub const HELP: &str = "\
Commands:
  new                   Open a game at this table
  join NAME BET         Sit down with an opening bet
  leave NAME            Stand up before the deal (bet refunded)
  deal                  Deal the cards
  double NAME           Double down on the current hand
  split NAME            Split the current pair
  insure NAME           Take insurance against a dealer ace
  decline NAME          Pass on special bets
  hit NAME              Draw a card
  stand NAME            End the current hand
  finish                Stand every open hand and play the dealer
  cancel                Call off an undealt game (bets refunded)
  show                  Show the table
  balance NAME          Show a wallet balance
  history NAME          Show recent results
  quit                  Leave the table
";

fn render(update: &TableUpdate) -> String {
    let mut out = String::new();
    for event in &update.events {
        let _ = writeln!(out, "* {event}");
    }
    let _ = write!(out, "{}", update.view);
    if let Some(settlement) = &update.settlement {
        for result in &settlement.results {
            let _ = writeln!(
                out,
                "  {} {} ({}) paid ${}",
                result.hand_id,
                result.outcome,
                result.score,
                result.total_credit()
            );
        }
    }
    out
}

/// Executes one command and returns the text to show.
///
/// # Errors
///
/// Whatever the table rejects the command with.
pub async fn execute(
    service: &TableService,
    session_id: &SessionId,
    command: Command,
) -> Result<String, GameError> {
    let output = match command {
        Command::New => format!("{}", service.create_game(session_id).await?),
        Command::Join(participant, bet) => {
            render(&service.join(session_id, &participant, bet).await?)
        }
        Command::Leave(participant) => render(&service.leave(session_id, &participant).await?),
        Command::Deal => render(&service.start_dealing(session_id).await?),
        Command::Hit(participant) => {
            let (card, update) = service.hit(session_id, &participant).await?;
            format!("{participant} drew {card}\n{}", render(&update))
        }
        Command::Stand(participant) => render(&service.stand(session_id, &participant).await?),
        Command::DoubleDown(participant) => {
            let (_, update) = service.double_down(session_id, &participant).await?;
            render(&update)
        }
        Command::Split(participant) => {
            let (_, update) = service.split(session_id, &participant).await?;
            render(&update)
        }
        Command::Insure(participant) => {
            render(&service.place_insurance(session_id, &participant).await?)
        }
        Command::Decline(participant) => {
            render(&service.decline_special_bets(session_id, &participant).await?)
        }
        Command::Finish => render(&service.force_complete(session_id).await?),
        Command::Cancel => {
            let refunds = service.cancel(session_id).await?;
            let mut out = String::from("game cancelled\n");
            for (participant, bet) in refunds {
                let _ = writeln!(out, "  refunded ${bet} to {participant}");
            }
            out
        }
        Command::Show => format!("{}", service.view(session_id).await?),
        Command::Balance(participant) => {
            format!("{participant}: ${}\n", service.balance(&participant).await?)
        }
        Command::History(participant) => {
            let records = service.history(&participant, 10).await?;
            let mut out = String::new();
            for record in records {
                let _ = writeln!(
                    out,
                    "{} dealer {}",
                    record.completed_at.format("%Y-%m-%d %H:%M"),
                    record.dealer_score
                );
                for result in record
                    .results
                    .iter()
                    .filter(|result| result.hand_id.participant == participant)
                {
                    let _ = writeln!(
                        out,
                        "  {} {} ({}) paid ${}",
                        result.hand_id, result.outcome, result.score, result.total_credit()
                    );
                }
            }
            if out.is_empty() {
                out = format!("no games yet for {participant}\n");
            }
            out
        }
        Command::Help | Command::Quit => HELP.to_string(),
    };
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::parse_command;
    use private_blackjack::TableConfig;

    async fn run(service: &TableService, line: &str) -> Result<String, GameError> {
        execute(service, &SessionId::from("cli"), parse_command(line).unwrap()).await
    }

    #[tokio::test]
    async fn test_join_and_balance() {
        let service = TableService::in_memory(TableConfig::default());
        run(&service, "new").await.unwrap();
        let out = run(&service, "join alice 100").await.unwrap();
        assert!(out.contains("alice joined with $100"));
        assert_eq!(run(&service, "balance alice").await.unwrap(), "alice: $900\n");
    }

    #[tokio::test]
    async fn test_cancel_lists_refunds() {
        let service = TableService::in_memory(TableConfig::default());
        run(&service, "new").await.unwrap();
        run(&service, "join alice 100").await.unwrap();
        let out = run(&service, "cancel").await.unwrap();
        assert!(out.contains("refunded $100 to alice"));
    }

    #[tokio::test]
    async fn test_errors_pass_through() {
        let service = TableService::in_memory(TableConfig::default());
        assert!(run(&service, "deal").await.is_err());
    }

    #[tokio::test]
    async fn test_empty_history() {
        let service = TableService::in_memory(TableConfig::default());
        assert_eq!(
            run(&service, "history bob").await.unwrap(),
            "no games yet for bob\n"
        );
    }
}
