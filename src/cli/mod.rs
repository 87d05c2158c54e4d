use crate::db::{self, PresentationRepository};
use crate::global;
use anyhow::Result;
use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "podium")]
#[command(about = "Presentation recording pipeline service", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Print version information
    Version,
    /// List stored presentations and their pipeline status
    Presentations(PresentationsCliArgs),
}

#[derive(ClapArgs, Debug)]
pub struct PresentationsCliArgs {
    /// User whose presentations to list
    #[arg(short, long)]
    pub user: String,
    /// Maximum number of results to show
    #[arg(short, long, default_value = "20")]
    pub limit: usize,
}

pub fn handle_presentations_command(args: PresentationsCliArgs) -> Result<()> {
    let db_path = global::db_file()?;
    let conn = db::open(&db_path)?;
    db::migrate(&conn)?;

    let presentations = PresentationRepository::list(&conn, &args.user)?;

    if presentations.is_empty() {
        println!("No presentations found for user {}.", args.user);
        return Ok(());
    }

    println!("Found {} presentation(s):\n", presentations.len());

    for presentation in presentations.iter().take(args.limit) {
        println!("ID: {}", presentation.id);
        println!("Name: {}", presentation.name);
        println!("Created: {}", presentation.created_at.to_rfc3339());
        println!(
            "Slides: {} ({})",
            presentation.slides_status.as_str(),
            presentation.slides.len()
        );
        println!(
            "Status: {} | Clips: {}",
            presentation.presentation_status.as_str(),
            presentation.clips.len()
        );
        println!("---");
    }

    Ok(())
}
