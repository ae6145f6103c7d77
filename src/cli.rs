//! One-shot commands that print server state and exit

use anyhow::{bail, Result};
use colored::*;
use dockfra_core::diff::{classify_diff, DiffLineKind};
use dockfra_core::panels::ProcessStatus;
use dockfra_core::ticket::priority_icon;
use dockfra_core::{FormSnapshot, WizardClient};

use crate::Commands;

pub async fn run(client: &WizardClient, command: Commands) -> Result<()> {
    match command {
        Commands::Tickets => list_tickets(client).await,
        Commands::Diff { id } => show_diff(client, &id).await,
        Commands::Logs { lines } => show_logs(client, lines).await,
        Commands::Action { value } => send_action(client, &value).await,
        Commands::Engines => list_engines(client).await,
        Commands::DevHealth => show_developer_health(client).await,
        Commands::Processes => list_processes(client).await,
    }
}

async fn list_tickets(client: &WizardClient) -> Result<()> {
    let tickets = client.tickets().await?;
    println!("\n{}", "🎫 Tickety".bold().blue());
    if tickets.is_empty() {
        println!("{}", "Brak ticketów".dimmed());
        return Ok(());
    }
    for ticket in &tickets {
        println!(
            "{} {} {} {}",
            ticket.status.icon(),
            priority_icon(&ticket.priority),
            ticket.id.bold().yellow(),
            ticket.title
        );
        if let Some(assignee) = &ticket.assigned_to {
            println!("    👤 {}", assignee.dimmed());
        }
    }
    println!("\n{} ticketów", tickets.len().to_string().bold());
    Ok(())
}

async fn show_diff(client: &WizardClient, id: &str) -> Result<()> {
    let diff = client.ticket_diff(id).await?;
    if let Some(error) = &diff.error {
        bail!("{}", error);
    }

    let title = diff.title.as_deref().unwrap_or("");
    println!("\n{}", format!("📄 {} {}", id, title).bold().green());

    if diff.has_commits() {
        println!("\n{}", "Commity:".bold().blue());
        for commit in &diff.commits {
            println!(
                "  {} [{}] {}",
                commit.hash.yellow(),
                commit.repo.dimmed(),
                commit.subject
            );
        }
    }

    if !diff.has_diff() {
        println!(
            "\n{}",
            format!("Brak zmian w kodzie, commity muszą zawierać ID ticketu (np. feat({}): ...)", id)
                .dimmed()
        );
        return Ok(());
    }
    println!();
    for (kind, line) in classify_diff(&diff.diff) {
        let styled = match kind {
            DiffLineKind::File => line.bold(),
            DiffLineKind::Hunk => line.cyan(),
            DiffLineKind::Added => line.green(),
            DiffLineKind::Removed => line.red(),
            DiffLineKind::Meta => line.yellow(),
            DiffLineKind::Context => line.normal(),
        };
        println!("{}", styled);
    }
    Ok(())
}

async fn show_logs(client: &WizardClient, lines: usize) -> Result<()> {
    let tail = client.logs_tail(lines).await?;
    for line in &tail.lines {
        println!("{}", line.text());
    }
    eprintln!("{}", format!("({} linii łącznie)", tail.total).dimmed());
    Ok(())
}

async fn send_action(client: &WizardClient, value: &str) -> Result<()> {
    println!("▶ {}", value.bold().cyan());
    let response = client.action(value, &FormSnapshot::new()).await?;
    if let Some(error) = &response.error {
        bail!("{}", error);
    }
    if response.ok {
        println!("{}", "✅ OK".green());
    }
    if !response.result.is_null() {
        println!("{}", serde_json::to_string_pretty(&response.result)?);
    }
    Ok(())
}

async fn list_engines(client: &WizardClient) -> Result<()> {
    let status = client.engine_status().await?;
    println!("\n{}", "⚙ Silniki".bold().blue());
    for engine in &status.engines {
        let mark = if engine.ok { "✅".green() } else { "❌".red() };
        let preferred = if status.is_preferred(engine) {
            " ★".yellow().to_string()
        } else {
            String::new()
        };
        print!("  {} {}{}", mark, engine.name.bold(), preferred);
        match &engine.message {
            Some(message) => println!(" {}", message.dimmed()),
            None => println!(),
        }
    }
    Ok(())
}

async fn show_developer_health(client: &WizardClient) -> Result<()> {
    let health = client.developer_health().await?;
    println!("\n{}", "👩‍💻 Developer".bold().blue());
    for (ok, label) in health.badges() {
        if ok {
            println!("  {} {}", "✅".green(), label);
        } else {
            println!("  {} {}", "❌".red(), label);
        }
    }
    Ok(())
}

async fn list_processes(client: &WizardClient) -> Result<()> {
    let processes = client.processes().await?;
    println!("\n{}", "⚙ Procesy".bold().blue());
    for process in &processes {
        let name = match process.status {
            ProcessStatus::Running => process.name.green(),
            ProcessStatus::Stopped => process.name.red(),
            ProcessStatus::Unknown => process.name.dimmed(),
        };
        print!("  {} {}", process.status.export_label(), name.bold());
        if let Some(ports) = process.ports.as_ref().filter(|p| !p.is_empty()) {
            print!(" :{}", ports);
        }
        println!();
        if !process.details.is_empty() {
            println!("      {}", process.details.dimmed());
        }
    }
    Ok(())
}
